//! Contracts for the external systems the client drives.
//!
//! Every call receives the caller's [`CancellationToken`]; implementations
//! are expected to return promptly once it is cancelled. Errors are
//! [`CollaboratorError`] and are propagated by the client unchanged.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fnkit_core::{
    CollaboratorError, DeploymentResult, Function, Instance, ListItem, PacMetadata, Platform,
};

/// Produces a container image from the function's source.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        platforms: &[Platform],
    ) -> Result<(), CollaboratorError>;
}

/// Pushes the built image, returning its digest.
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, ctx: &CancellationToken, f: &Function) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(
        &self,
        ctx: &CancellationToken,
        f: &Function,
    ) -> Result<DeploymentResult, CollaboratorError>;
}

#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(
        &self,
        ctx: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(&self, ctx: &CancellationToken) -> Result<Vec<ListItem>, CollaboratorError>;
}

/// Looks up a deployed function. Returns [`CollaboratorError::NotFound`]
/// when nothing is deployed under that name.
#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(
        &self,
        ctx: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<Instance, CollaboratorError>;
}

/// Remote build-and-deploy pipelines.
#[async_trait]
pub trait PipelinesProvider: Send + Sync {
    /// Run the pipeline, returning the URL of the deployed function.
    async fn run(&self, ctx: &CancellationToken, f: &Function) -> Result<String, CollaboratorError>;

    async fn remove(&self, ctx: &CancellationToken, f: &Function) -> Result<(), CollaboratorError>;

    async fn configure_pac(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        metadata: &PacMetadata,
    ) -> Result<(), CollaboratorError>;

    async fn remove_pac(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        metadata: &PacMetadata,
    ) -> Result<(), CollaboratorError>;
}

/// Ensures the function's route is resolvable.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn provide(&self, f: &Function) -> Result<(), CollaboratorError>;
}

/// Materializes the function's template into its root at init.
#[async_trait]
pub trait Templates: Send + Sync {
    /// Write the template files; may return an updated function.
    async fn write(&self, f: &Function) -> Result<Function, CollaboratorError>;
}
