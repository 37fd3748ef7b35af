//! Null collaborators: used for anything not wired into the client.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fnkit_core::{
    CollaboratorError, DeploymentResult, Function, Instance, ListItem, PacMetadata, Platform,
};

use crate::collaborators::{
    Builder, Deployer, Describer, DnsProvider, Lister, PipelinesProvider, Pusher, Remover,
    Templates,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBuilder;

#[async_trait]
impl Builder for NoopBuilder {
    async fn build(
        &self,
        _ctx: &CancellationToken,
        _f: &Function,
        _platforms: &[Platform],
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Reports an empty digest, which leaves the image reference unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPusher;

#[async_trait]
impl Pusher for NoopPusher {
    async fn push(&self, _ctx: &CancellationToken, _f: &Function) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }
}

/// Reports a deployment into the function's desired namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDeployer;

#[async_trait]
impl Deployer for NoopDeployer {
    async fn deploy(
        &self,
        _ctx: &CancellationToken,
        f: &Function,
    ) -> Result<DeploymentResult, CollaboratorError> {
        Ok(DeploymentResult {
            namespace: f.namespace.clone(),
            ..DeploymentResult::default()
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRemover;

#[async_trait]
impl Remover for NoopRemover {
    async fn remove(
        &self,
        _ctx: &CancellationToken,
        _name: &str,
        _namespace: &str,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLister;

#[async_trait]
impl Lister for NoopLister {
    async fn list(&self, _ctx: &CancellationToken) -> Result<Vec<ListItem>, CollaboratorError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDescriber;

#[async_trait]
impl Describer for NoopDescriber {
    async fn describe(
        &self,
        _ctx: &CancellationToken,
        _name: &str,
        _namespace: &str,
    ) -> Result<Instance, CollaboratorError> {
        Ok(Instance::default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPipelinesProvider;

#[async_trait]
impl PipelinesProvider for NoopPipelinesProvider {
    async fn run(&self, _ctx: &CancellationToken, _f: &Function) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }

    async fn remove(&self, _ctx: &CancellationToken, _f: &Function) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn configure_pac(
        &self,
        _ctx: &CancellationToken,
        _f: &Function,
        _metadata: &PacMetadata,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn remove_pac(
        &self,
        _ctx: &CancellationToken,
        _f: &Function,
        _metadata: &PacMetadata,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDnsProvider;

#[async_trait]
impl DnsProvider for NoopDnsProvider {
    async fn provide(&self, _f: &Function) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Writes nothing and returns the function as given.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTemplates;

#[async_trait]
impl Templates for NoopTemplates {
    async fn write(&self, f: &Function) -> Result<Function, CollaboratorError> {
        Ok(f.clone())
    }
}
