//! The lifecycle orchestrator.
//!
//! A function moves `Uninitialized → Initialized → Built → Deployed`, and
//! each [`Client`] method checks the state it needs. Methods take a function
//! by reference and return the updated copy; the on-disk manifest is the
//! shared record between calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use fnkit_core::paths::LAST_SPEC_VERSION;
use fnkit_core::{
    manifest, without_digest, Function, Instance, ListItem, PacMetadata, Platform,
};
use fnkit_runner::paths::DEFAULT_START_TIMEOUT;
use fnkit_runner::{DefaultRunner, Job, Runner, Scaffolding, SourceScaffolding};

use crate::collaborators::{
    Builder, Deployer, Describer, DnsProvider, Lister, PipelinesProvider, Pusher, Remover,
    Templates,
};
use crate::config::ClientConfig;
use crate::error::{io_err, ClientError, LifecycleError};
use crate::instances::{deployed_namespace, Instances};
use crate::invoke::{self, InvokeMessage, InvokeResponse, INVOKE_TIMEOUT};
use crate::noop::{
    NoopBuilder, NoopDeployer, NoopDescriber, NoopDnsProvider, NoopLister, NoopPipelinesProvider,
    NoopPusher, NoopRemover, NoopTemplates,
};
use crate::progress::watch_build;
use crate::root::{assert_empty_root, ensure_funcignore, ensure_run_data_dir};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Target platforms; empty means the builder's default.
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Deploy even if the source changed since the last build.
    pub skip_built_check: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides the function's and the client's start timeout.
    pub start_timeout: Option<Duration>,
    /// `host:port` to bind; overrides the client's run address.
    pub address: Option<String>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`Client`]. Anything not set falls back to a null
/// collaborator, and the runner to [`DefaultRunner`].
#[derive(Default)]
pub struct ClientBuilder {
    registry: String,
    verbose: bool,
    start_timeout: Option<Duration>,
    run_address: Option<String>,
    builder: Option<Arc<dyn Builder>>,
    pusher: Option<Arc<dyn Pusher>>,
    deployer: Option<Arc<dyn Deployer>>,
    remover: Option<Arc<dyn Remover>>,
    lister: Option<Arc<dyn Lister>>,
    describer: Option<Arc<dyn Describer>>,
    pipelines_provider: Option<Arc<dyn PipelinesProvider>>,
    dns_provider: Option<Arc<dyn DnsProvider>>,
    templates: Option<Arc<dyn Templates>>,
    runner: Option<Arc<dyn Runner>>,
    scaffolding: Option<Arc<dyn Scaffolding>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        let mut builder = Self::new().with_verbose(cfg.verbose);
        if let Some(registry) = &cfg.registry {
            builder = builder.with_registry(registry);
        }
        builder.start_timeout = cfg.start_timeout();
        builder.run_address = cfg.run_address.clone();
        builder
    }

    /// Registry for functions that do not set their own.
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Default readiness timeout for [`Client::run`].
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = Some(timeout);
        self
    }

    pub fn with_run_address(mut self, address: impl Into<String>) -> Self {
        self.run_address = Some(address.into());
        self
    }

    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn with_pusher(mut self, pusher: Arc<dyn Pusher>) -> Self {
        self.pusher = Some(pusher);
        self
    }

    pub fn with_deployer(mut self, deployer: Arc<dyn Deployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn with_remover(mut self, remover: Arc<dyn Remover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn with_lister(mut self, lister: Arc<dyn Lister>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn with_describer(mut self, describer: Arc<dyn Describer>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn with_pipelines_provider(mut self, provider: Arc<dyn PipelinesProvider>) -> Self {
        self.pipelines_provider = Some(provider);
        self
    }

    pub fn with_dns_provider(mut self, provider: Arc<dyn DnsProvider>) -> Self {
        self.dns_provider = Some(provider);
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn Templates>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_scaffolding(mut self, scaffolding: Arc<dyn Scaffolding>) -> Self {
        self.scaffolding = Some(scaffolding);
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let http = reqwest::Client::builder().timeout(INVOKE_TIMEOUT).build()?;
        let scaffolding = self
            .scaffolding
            .unwrap_or_else(|| Arc::new(SourceScaffolding));
        let runner = match self.runner {
            Some(runner) => runner,
            None => Arc::new(DefaultRunner::new(self.verbose).with_scaffolding(scaffolding.clone())),
        };
        Ok(Client {
            registry: self.registry,
            verbose: self.verbose,
            start_timeout: self.start_timeout.unwrap_or(DEFAULT_START_TIMEOUT),
            run_address: self.run_address,
            builder: self.builder.unwrap_or_else(|| Arc::new(NoopBuilder)),
            pusher: self.pusher.unwrap_or_else(|| Arc::new(NoopPusher)),
            deployer: self.deployer.unwrap_or_else(|| Arc::new(NoopDeployer)),
            remover: self.remover.unwrap_or_else(|| Arc::new(NoopRemover)),
            lister: self.lister.unwrap_or_else(|| Arc::new(NoopLister)),
            describer: self.describer.unwrap_or_else(|| Arc::new(NoopDescriber)),
            pipelines_provider: self
                .pipelines_provider
                .unwrap_or_else(|| Arc::new(NoopPipelinesProvider)),
            dns_provider: self.dns_provider.unwrap_or_else(|| Arc::new(NoopDnsProvider)),
            templates: self.templates.unwrap_or_else(|| Arc::new(NoopTemplates)),
            runner,
            scaffolding,
            http,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct Client {
    registry: String,
    verbose: bool,
    start_timeout: Duration,
    run_address: Option<String>,
    builder: Arc<dyn Builder>,
    pusher: Arc<dyn Pusher>,
    deployer: Arc<dyn Deployer>,
    remover: Arc<dyn Remover>,
    lister: Arc<dyn Lister>,
    describer: Arc<dyn Describer>,
    pipelines_provider: Arc<dyn PipelinesProvider>,
    dns_provider: Arc<dyn DnsProvider>,
    templates: Arc<dyn Templates>,
    runner: Arc<dyn Runner>,
    scaffolding: Arc<dyn Scaffolding>,
    http: reqwest::Client,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn instances(&self) -> Instances {
        Instances::new(self.describer.clone())
    }

    // -- composite lifecycle ------------------------------------------------

    /// Create the function if `f` is not initialized, otherwise update it.
    ///
    /// Returns the route and the resulting function.
    pub async fn apply(
        &self,
        ctx: &CancellationToken,
        f: &Function,
    ) -> Result<(String, Function), LifecycleError> {
        if f.initialized() {
            self.update(ctx, f).await
        } else {
            self.create(ctx, f).await
        }
    }

    /// Init, build, push, deploy and route a new function.
    pub async fn create(
        &self,
        ctx: &CancellationToken,
        cfg: &Function,
    ) -> Result<(String, Function), LifecycleError> {
        let f = step(cfg, self.init(cfg).await)?;
        let f = step(&f, self.build(ctx, &f, &BuildOptions::default()).await)?;
        let f = step(&f, self.push(ctx, &f).await)?;
        let f = step(&f, self.deploy(ctx, &f, DeployOptions::default()).await)?;
        let route = step(&f, self.route(ctx, &f).await)?;
        tracing::info!(name = %f.name, %route, "function created");
        Ok((route, f))
    }

    /// Rebuild, push, redeploy and route an initialized function.
    pub async fn update(
        &self,
        ctx: &CancellationToken,
        f: &Function,
    ) -> Result<(String, Function), LifecycleError> {
        if !f.initialized() {
            return Err(LifecycleError {
                function: Box::new(f.clone()),
                source: ClientError::NotInitialized {
                    path: f.root.clone(),
                },
            });
        }
        let f = step(f, self.build(ctx, f, &BuildOptions::default()).await)?;
        let f = step(&f, self.push(ctx, &f).await)?;
        let f = step(&f, self.deploy(ctx, &f, DeployOptions::default()).await)?;
        let route = step(&f, self.route(ctx, &f).await)?;
        tracing::info!(name = %f.name, %route, "function updated");
        Ok((route, f))
    }

    // -- init ---------------------------------------------------------------

    /// Scaffold a new function at `cfg.root` and persist it.
    pub async fn init(&self, cfg: &Function) -> Result<Function, ClientError> {
        let mut f = cfg.clone();
        let root = if f.root.as_os_str().is_empty() {
            std::env::current_dir().map_err(|e| io_err(".", e))?
        } else {
            std::path::absolute(&f.root).map_err(|e| io_err(&f.root, e))?
        };
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

        if manifest::has_initialized_function(&root)? {
            return Err(ClientError::AlreadyInitialized { path: root });
        }
        if f.name.is_empty() {
            f.name = Function::name_from_root(&root);
        }
        assert_empty_root(&root)?;
        if f.runtime.is_empty() {
            return Err(ClientError::RuntimeRequired);
        }

        f.root = root.clone();
        f.spec_version = LAST_SPEC_VERSION.to_string();
        let f = f.with_defaults();

        ensure_run_data_dir(&root)?;
        ensure_funcignore(&root)?;

        let mut f = self.templates.write(&f).await?;
        f.root = root.clone();
        f.created = Some(Utc::now());
        f.write()?;
        tracing::info!(name = %f.name, runtime = %f.runtime, root = %root.display(), "function initialized");

        Ok(Function::load(&root)?)
    }

    // -- build / push / deploy ---------------------------------------------

    /// Build the function's image and stamp its source as built.
    pub async fn build(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        opts: &BuildOptions,
    ) -> Result<Function, ClientError> {
        if !f.initialized() {
            return Err(ClientError::NotInitialized {
                path: f.root.clone(),
            });
        }
        let mut f = f.clone();
        if f.registry.is_empty() {
            f.registry = self.registry.clone();
        }
        f.build.image = build_image(&f)?;
        f.image_digest.clear();

        tracing::info!(name = %f.name, image = %f.build.image, "building function image");
        {
            let _progress = watch_build(ctx, self.verbose);
            self.builder.build(ctx, &f, &opts.platforms).await?;
        }

        f.write()?;
        fnkit_stamp::stamp(&f.root, self.verbose)?;
        tracing::info!(image = %f.build.image, "function built");
        Ok(f)
    }

    /// Push the built image, pinning the recorded image to its digest.
    pub async fn push(&self, ctx: &CancellationToken, f: &Function) -> Result<Function, ClientError> {
        if !fnkit_stamp::built(&f.root)? {
            return Err(ClientError::NotBuilt);
        }
        let digest = self.pusher.push(ctx, f).await?;
        let mut f = f.clone();
        f.build.image = f.image_name_with_digest(&digest);
        f.image_digest = digest;
        f.write()?;
        tracing::info!(image = %f.build.image, "function image pushed");
        Ok(f)
    }

    /// Deploy the function, cleaning up a deployment left in a previous
    /// namespace.
    pub async fn deploy(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        opts: DeployOptions,
    ) -> Result<Function, ClientError> {
        if !opts.skip_built_check && !fnkit_stamp::built(&f.root)? {
            return Err(ClientError::NotBuilt);
        }
        if f.name.is_empty() {
            return Err(ClientError::NameRequired);
        }

        let mut f = f.clone();
        if !f.build.image.is_empty() {
            f.deploy.image = f.build.image.clone();
        } else if f.deploy.image.is_empty() {
            f.deploy.image = f.image.clone();
        }
        let previous = f.deploy.namespace.clone();

        let result = self.deployer.deploy(ctx, &f).await?;
        let namespace = if result.namespace.is_empty() {
            f.namespace.clone()
        } else {
            result.namespace.clone()
        };
        tracing::info!(
            name = %f.name,
            status = %result.status,
            url = %result.url,
            %namespace,
            "function deployed"
        );

        if !previous.is_empty() && !namespace.is_empty() && previous != namespace {
            match self.remover.remove(ctx, &f.name, &previous).await {
                Ok(()) => tracing::info!(name = %f.name, namespace = %previous, "removed deployment from previous namespace"),
                Err(err) if err.is_not_found() => {
                    tracing::debug!(name = %f.name, namespace = %previous, "nothing deployed in previous namespace")
                }
                Err(err) => return Err(err.into()),
            }
        }

        f.deploy.namespace = namespace;
        f.write()?;
        Ok(f)
    }

    /// Make the function's route resolvable and return it.
    pub async fn route(&self, ctx: &CancellationToken, f: &Function) -> Result<String, ClientError> {
        self.dns_provider.provide(f).await?;
        let instance = self
            .instances()
            .remote(ctx, &f.name, deployed_namespace(f))
            .await?;
        if instance.route.is_empty() {
            return Err(ClientError::NoRoute);
        }
        Ok(instance.route)
    }

    // -- local execution ----------------------------------------------------

    /// Run the function locally, returning once it is ready.
    ///
    /// The start timeout is the first of: `opts`, the function's
    /// `run.startTimeout`, the client default.
    pub async fn run(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        opts: RunOptions,
    ) -> Result<Job, ClientError> {
        if !f.initialized() {
            return Err(ClientError::NotInitialized {
                path: f.root.clone(),
            });
        }
        let timeout = opts
            .start_timeout
            .or_else(|| f.run.start_timeout())
            .unwrap_or(self.start_timeout);
        let address = opts.address.or_else(|| self.run_address.clone());
        let job = self.runner.run(ctx, f, address.as_deref(), timeout).await?;
        Ok(job)
    }

    /// Write a runnable copy of the function's source to `dest`.
    pub async fn scaffold(&self, f: &Function, dest: &Path) -> Result<(), ClientError> {
        if !f.initialized() {
            return Err(ClientError::NotInitialized {
                path: f.root.clone(),
            });
        }
        self.scaffolding
            .write(dest, &f.root, &f.runtime, &f.invoke)
            .await?;
        Ok(())
    }

    // -- remote state -------------------------------------------------------

    /// Describe a deployed function by `name`, or, when `name` is empty,
    /// the function `f`.
    pub async fn describe(
        &self,
        ctx: &CancellationToken,
        name: &str,
        namespace: &str,
        f: &Function,
    ) -> Result<Instance, ClientError> {
        if !name.is_empty() {
            return Ok(self.describer.describe(ctx, name, namespace).await?);
        }
        if !f.initialized() {
            return Err(ClientError::NotInitialized {
                path: f.root.clone(),
            });
        }
        if f.name.is_empty() {
            return Err(ClientError::NameRequired);
        }
        Ok(self
            .describer
            .describe(ctx, &f.name, deployed_namespace(f))
            .await?)
    }

    pub async fn list(&self, ctx: &CancellationToken) -> Result<Vec<ListItem>, ClientError> {
        Ok(self.lister.list(ctx).await?)
    }

    /// Remove a deployed function.
    ///
    /// The target is `cfg.name` if set, otherwise the function at
    /// `cfg.root`. A named target without a namespace takes the one the
    /// function at `cfg.root` was deployed to. With `delete_all`, the function's pipeline resources are
    /// removed concurrently; if both removals fail both errors are reported.
    pub async fn remove(
        &self,
        ctx: &CancellationToken,
        cfg: &Function,
        delete_all: bool,
    ) -> Result<(), ClientError> {
        let target = if cfg.name.is_empty() {
            let f = Function::load(&cfg.root)?;
            if !f.initialized() {
                return Err(ClientError::NotInitialized { path: f.root });
            }
            f
        } else {
            let mut target = cfg.clone();
            if deployed_namespace(&target).is_empty() && !cfg.root.as_os_str().is_empty() {
                let at_root = Function::load(&cfg.root)?;
                target.deploy.namespace = deployed_namespace(&at_root).to_string();
            }
            target
        };
        if target.name.is_empty() {
            return Err(ClientError::NameRequired);
        }
        let namespace = deployed_namespace(&target);
        if namespace.is_empty() {
            return Err(ClientError::NamespaceRequired);
        }
        tracing::info!(name = %target.name, %namespace, delete_all, "removing function");

        let (service, resources) = tokio::join!(
            self.remover.remove(ctx, &target.name, namespace),
            async {
                if delete_all {
                    self.pipelines_provider.remove(ctx, &target).await
                } else {
                    Ok(())
                }
            }
        );
        match (service, resources) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(service), Ok(())) => Err(service.into()),
            (Ok(()), Err(resources)) => Err(resources.into()),
            (Err(service), Err(resources)) => Err(ClientError::RemoveFailed { service, resources }),
        }
    }

    // -- pipelines ----------------------------------------------------------

    /// Build and deploy on the remote via the pipelines provider.
    ///
    /// Returns the deployed URL and the function with registry and image
    /// defaults applied.
    pub async fn run_pipeline(
        &self,
        ctx: &CancellationToken,
        f: &Function,
    ) -> Result<(String, Function), ClientError> {
        let f = self.with_image_defaults(f)?;
        let url = self.pipelines_provider.run(ctx, &f).await?;
        tracing::info!(name = %f.name, %url, "pipeline run finished");
        Ok((url, f))
    }

    /// Set up pipelines-as-code for the function.
    ///
    /// When local resources are requested the function is persisted first;
    /// the source is not restamped.
    pub async fn configure_pac(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        metadata: &PacMetadata,
    ) -> Result<Function, ClientError> {
        let f = self.with_image_defaults(f)?;
        if metadata.configure_local {
            f.write()?;
        }
        self.pipelines_provider.configure_pac(ctx, &f, metadata).await?;
        Ok(f)
    }

    pub async fn remove_pac(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        metadata: &PacMetadata,
    ) -> Result<(), ClientError> {
        if f.name.is_empty() {
            return Err(ClientError::NameRequired);
        }
        Ok(self.pipelines_provider.remove_pac(ctx, f, metadata).await?)
    }

    fn with_image_defaults(&self, f: &Function) -> Result<Function, ClientError> {
        let mut f = f.clone();
        if f.registry.is_empty() {
            f.registry = self.registry.clone();
        }
        f.build.image = build_image(&f)?;
        Ok(f)
    }

    // -- invoke -------------------------------------------------------------

    /// Send `message` to the function at `root`.
    ///
    /// `target` is `local`, `remote`, empty (local if running, else remote)
    /// or a URL used verbatim.
    pub async fn invoke(
        &self,
        ctx: &CancellationToken,
        root: &Path,
        target: &str,
        message: &InvokeMessage,
    ) -> Result<InvokeResponse, ClientError> {
        let f = Function::load(root)?;
        if !f.initialized() {
            return Err(ClientError::NotInitialized { path: f.root });
        }
        let route = invoke::invocation_route(ctx, &self.instances(), &f, target).await?;
        tracing::info!(name = %f.name, %route, "invoking function");
        invoke::send(ctx, &self.http, &f, &route, message).await
    }
}

/// Image to build: the explicit override, else the image recorded by an
/// earlier build or deploy (with any pushed digest dropped), else one derived
/// from registry and name.
fn build_image(f: &Function) -> Result<String, ClientError> {
    if !f.image.is_empty() {
        return Ok(f.image.clone());
    }
    for stored in [&f.build.image, &f.deploy.image] {
        if !stored.is_empty() {
            return Ok(without_digest(stored));
        }
    }
    Ok(f.image_name()?)
}

fn step<T>(last: &Function, result: Result<T, ClientError>) -> Result<T, LifecycleError> {
    result.map_err(|source| LifecycleError {
        function: Box::new(last.clone()),
        source,
    })
}
