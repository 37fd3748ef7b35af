#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use fnkit_client::{
    Builder, Client, ClientBuilder, Deployer, Describer, DnsProvider, PipelinesProvider, Pusher,
    Remover, Templates,
};
use fnkit_core::{
    CollaboratorError, DeploymentResult, Function, Instance, PacMetadata, Platform,
};
use fnkit_runner::{Job, RunError, Runner};

pub const TEST_REGISTRY: &str = "example.com/alice";

#[derive(Default)]
pub struct MockBuilder {
    pub images: Mutex<Vec<String>>,
    pub fail: Mutex<Option<String>>,
}

impl MockBuilder {
    pub fn calls(&self) -> usize {
        self.images.lock().unwrap().len()
    }
}

#[async_trait]
impl Builder for MockBuilder {
    async fn build(
        &self,
        _ctx: &CancellationToken,
        f: &Function,
        _platforms: &[Platform],
    ) -> Result<(), CollaboratorError> {
        if let Some(msg) = self.fail.lock().unwrap().clone() {
            return Err(CollaboratorError::other(msg));
        }
        self.images.lock().unwrap().push(f.build.image.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPusher {
    pub digest: String,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Pusher for MockPusher {
    async fn push(&self, _ctx: &CancellationToken, _f: &Function) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.digest.clone())
    }
}

/// Deploys into the desired namespace, or `default_namespace` when the
/// function names none.
#[derive(Default)]
pub struct MockDeployer {
    pub default_namespace: String,
    pub deployed: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn deploy(
        &self,
        _ctx: &CancellationToken,
        f: &Function,
    ) -> Result<DeploymentResult, CollaboratorError> {
        let namespace = if f.namespace.is_empty() {
            self.default_namespace.clone()
        } else {
            f.namespace.clone()
        };
        self.deployed
            .lock()
            .unwrap()
            .push((f.deploy.image.clone(), namespace.clone()));
        Ok(DeploymentResult {
            url: format!("http://{}.{namespace}.example.com", f.name),
            namespace,
            ..DeploymentResult::default()
        })
    }
}

pub enum Failure {
    NotFound,
    Other(&'static str),
}

impl Failure {
    fn to_error(&self) -> CollaboratorError {
        match self {
            Failure::NotFound => CollaboratorError::NotFound,
            Failure::Other(msg) => CollaboratorError::other(*msg),
        }
    }
}

#[derive(Default)]
pub struct MockRemover {
    pub removed: Mutex<Vec<(String, String)>>,
    pub fail: Option<Failure>,
}

#[async_trait]
impl Remover for MockRemover {
    async fn remove(
        &self,
        _ctx: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<(), CollaboratorError> {
        self.removed
            .lock()
            .unwrap()
            .push((name.to_string(), namespace.to_string()));
        match &self.fail {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MockPipelinesProvider {
    pub removed: Mutex<Vec<String>>,
    pub fail_remove: Option<Failure>,
    pub runs: AtomicUsize,
    pub pac_configured: AtomicUsize,
}

#[async_trait]
impl PipelinesProvider for MockPipelinesProvider {
    async fn run(&self, _ctx: &CancellationToken, f: &Function) -> Result<String, CollaboratorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(format!("http://{}.pipelines.example.com", f.name))
    }

    async fn remove(&self, _ctx: &CancellationToken, f: &Function) -> Result<(), CollaboratorError> {
        self.removed.lock().unwrap().push(f.name.clone());
        match &self.fail_remove {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn configure_pac(
        &self,
        _ctx: &CancellationToken,
        _f: &Function,
        _metadata: &PacMetadata,
    ) -> Result<(), CollaboratorError> {
        self.pac_configured.fetch_add(1, Ordering::SeqCst);
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

/// Answers for the functions registered with [`MockDescriber::deployed`];
/// `NotFound` otherwise.
#[derive(Default)]
pub struct MockDescriber {
    pub instances: Mutex<HashMap<(String, String), Instance>>,
}

impl MockDescriber {
    pub fn deployed(&self, name: &str, namespace: &str, route: &str) {
        self.instances.lock().unwrap().insert(
            (name.to_string(), namespace.to_string()),
            Instance {
                route: route.to_string(),
                routes: vec![route.to_string()],
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Instance::default()
            },
        );
    }
}

#[async_trait]
impl Describer for MockDescriber {
    async fn describe(
        &self,
        _ctx: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<Instance, CollaboratorError> {
        self.instances
            .lock()
            .unwrap()
            .get(&(name.to_string(), namespace.to_string()))
            .cloned()
            .ok_or(CollaboratorError::NotFound)
    }
}

#[derive(Default)]
pub struct MockDnsProvider {
    pub provided: AtomicUsize,
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn provide(&self, _f: &Function) -> Result<(), CollaboratorError> {
        self.provided.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Writes a Go handler into the function root.
#[derive(Default)]
pub struct MockTemplates;

#[async_trait]
impl Templates for MockTemplates {
    async fn write(&self, f: &Function) -> Result<Function, CollaboratorError> {
        std::fs::write(f.root.join("handle.go"), "package function\n")
            .map_err(|e| CollaboratorError::Other(Box::new(e)))?;
        Ok(f.clone())
    }
}

/// Registers a job without starting a process.
#[derive(Default)]
pub struct MockRunner {
    pub calls: Mutex<Vec<(Option<String>, Duration)>>,
}

pub const MOCK_RUN_PORT: u16 = 8181;

#[async_trait]
impl Runner for MockRunner {
    async fn run(
        &self,
        _ctx: &CancellationToken,
        f: &Function,
        address: Option<&str>,
        start_timeout: Duration,
    ) -> Result<Job, RunError> {
        self.calls
            .lock()
            .unwrap()
            .push((address.map(str::to_string), start_timeout));
        Job::new(f.clone(), "127.0.0.1", MOCK_RUN_PORT, None, None)
    }
}

/// A client wired to recording mocks, with handles kept for assertions.
pub struct Harness {
    pub client: Client,
    pub builder: Arc<MockBuilder>,
    pub pusher: Arc<MockPusher>,
    pub deployer: Arc<MockDeployer>,
    pub remover: Arc<MockRemover>,
    pub pipelines: Arc<MockPipelinesProvider>,
    pub describer: Arc<MockDescriber>,
    pub dns: Arc<MockDnsProvider>,
    pub runner: Arc<MockRunner>,
}

#[derive(Default)]
pub struct HarnessOptions {
    pub registry: Option<String>,
    pub digest: String,
    pub default_namespace: String,
    pub remover_failure: Option<Failure>,
    pub pipelines_failure: Option<Failure>,
    pub start_timeout: Option<Duration>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(opts: HarnessOptions) -> Self {
        let builder = Arc::new(MockBuilder::default());
        let pusher = Arc::new(MockPusher {
            digest: opts.digest,
            ..MockPusher::default()
        });
        let deployer = Arc::new(MockDeployer {
            default_namespace: opts.default_namespace,
            ..MockDeployer::default()
        });
        let remover = Arc::new(MockRemover {
            fail: opts.remover_failure,
            ..MockRemover::default()
        });
        let pipelines = Arc::new(MockPipelinesProvider {
            fail_remove: opts.pipelines_failure,
            ..MockPipelinesProvider::default()
        });
        let describer = Arc::new(MockDescriber::default());
        let dns = Arc::new(MockDnsProvider::default());
        let runner = Arc::new(MockRunner::default());

        let mut client = ClientBuilder::new()
            .with_registry(opts.registry.unwrap_or_else(|| TEST_REGISTRY.to_string()))
            .with_builder(builder.clone())
            .with_pusher(pusher.clone())
            .with_deployer(deployer.clone())
            .with_remover(remover.clone())
            .with_pipelines_provider(pipelines.clone())
            .with_describer(describer.clone())
            .with_dns_provider(dns.clone())
            .with_templates(Arc::new(MockTemplates))
            .with_runner(runner.clone());
        if let Some(timeout) = opts.start_timeout {
            client = client.with_start_timeout(timeout);
        }

        Self {
            client: client.build().expect("client"),
            builder,
            pusher,
            deployer,
            remover,
            pipelines,
            describer,
            dns,
            runner,
        }
    }

    /// Init a Go function at `root`.
    pub async fn init(&self, root: &Path) -> Function {
        self.client
            .init(&Function {
                runtime: "go".into(),
                ..Function::new(root)
            })
            .await
            .expect("init")
    }
}

pub fn ctx() -> CancellationToken {
    CancellationToken::new()
}
