//! Local execution: scaffold, prepare, launch, and wait for readiness.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use fnkit_core::{env, Function};

use crate::error::RunError;
use crate::job::{Job, JobResult};
use crate::paths::{
    CONTAINER_ONLY_RUNTIMES, READINESS_DIAL_TIMEOUT, READINESS_ENDPOINT, READINESS_POLL_INTERVAL,
};
use crate::port::{choose_port, host_port, resolve_address};
use crate::scaffold::{Scaffolding, SourceScaffolding};
use crate::strategy::{GoStrategy, LaunchContext, LaunchStrategy, PythonStrategy};

/// Runs a function locally.
///
/// `run` returns once the function answers its readiness endpoint. The
/// process keeps running until the returned [`Job`] is stopped or dropped.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        address: Option<&str>,
        start_timeout: Duration,
    ) -> Result<Job, RunError>;
}

/// Process-based runner with one [`LaunchStrategy`] per runtime.
pub struct DefaultRunner {
    strategies: HashMap<String, Arc<dyn LaunchStrategy>>,
    scaffolding: Arc<dyn Scaffolding>,
    verbose: bool,
}

impl DefaultRunner {
    pub fn new(verbose: bool) -> Self {
        let mut strategies: HashMap<String, Arc<dyn LaunchStrategy>> = HashMap::new();
        strategies.insert("go".into(), Arc::new(GoStrategy::default()));
        strategies.insert("python".into(), Arc::new(PythonStrategy::default()));
        Self {
            strategies,
            scaffolding: Arc::new(SourceScaffolding),
            verbose,
        }
    }

    /// Register or replace the strategy used for `runtime`.
    pub fn with_strategy(mut self, runtime: impl Into<String>, strategy: Arc<dyn LaunchStrategy>) -> Self {
        self.strategies.insert(runtime.into(), strategy);
        self
    }

    pub fn with_scaffolding(mut self, scaffolding: Arc<dyn Scaffolding>) -> Self {
        self.scaffolding = scaffolding;
        self
    }

    fn strategy(&self, runtime: &str) -> Result<Arc<dyn LaunchStrategy>, RunError> {
        if runtime.is_empty() {
            return Err(RunError::RuntimeRequired);
        }
        if let Some(strategy) = self.strategies.get(runtime) {
            return Ok(strategy.clone());
        }
        if CONTAINER_ONLY_RUNTIMES.contains(&runtime) {
            return Err(RunError::RuntimeNotImplemented(runtime.to_string()));
        }
        Err(RunError::RuntimeNotRecognized(runtime.to_string()))
    }

    async fn start(
        &self,
        ctx: &CancellationToken,
        launch: LaunchContext<'_>,
        strategy: &dyn LaunchStrategy,
        stop_rx: oneshot::Receiver<()>,
        result_tx: oneshot::Sender<JobResult>,
        start_timeout: Duration,
    ) -> Result<(), RunError> {
        let f = launch.function;
        self.scaffolding
            .write(launch.dir, &f.root, &f.runtime, &f.invoke)
            .await?;
        strategy.prepare(&launch).await?;

        let envs = env::interpolate(&f.run.envs)?;
        let mut cmd = strategy.command(&launch);
        cmd.current_dir(launch.dir)
            .env("PORT", launch.port.to_string())
            .env("LISTEN_ADDRESS", host_port(launch.host, launch.port))
            .env("PWD", launch.dir)
            .envs(envs)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        let child = cmd
            .spawn()
            .map_err(|source| RunError::Spawn { program, source })?;
        tracing::info!(
            name = %f.name,
            pid = child.id().unwrap_or_default(),
            host = %launch.host,
            port = launch.port,
            "function process started"
        );
        tokio::spawn(supervise(child, stop_rx, result_tx));

        wait_for_ready(ctx, launch.host, launch.port, start_timeout).await
    }
}

impl Default for DefaultRunner {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl Runner for DefaultRunner {
    async fn run(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        address: Option<&str>,
        start_timeout: Duration,
    ) -> Result<Job, RunError> {
        let strategy = self.strategy(&f.runtime)?;
        let (host, preferred) = resolve_address(address)?;
        let port = choose_port(&host, preferred)?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (result_tx, result_rx) = oneshot::channel::<JobResult>();
        let mut job = Job::new(
            f.clone(),
            host,
            port,
            Some(result_rx),
            Some(Box::new(move || {
                let _ = stop_tx.send(());
                Ok(())
            })),
        )?;

        let launch = LaunchContext {
            function: f,
            dir: job.dir(),
            host: &job.host,
            port,
            verbose: self.verbose,
        };
        let started = self
            .start(ctx, launch, strategy.as_ref(), stop_rx, result_tx, start_timeout)
            .await;
        match started {
            Ok(()) => {
                tracing::info!(name = %f.name, port, "function ready");
                Ok(job)
            }
            Err(err) => {
                if let Err(stop_err) = job.stop() {
                    tracing::warn!(error = %stop_err, "failed to clean up job after run error");
                }
                Err(err)
            }
        }
    }
}

/// Own the child until it exits or the job is stopped, then report once.
///
/// Dropping the stop sender counts as a stop, so an abandoned job does not
/// leave its process behind.
async fn supervise(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    result_tx: oneshot::Sender<JobResult>,
) {
    let result = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(RunError::Exited { status: status.to_string() }),
            Err(err) => Err(RunError::Exited { status: err.to_string() }),
        },
        _ = stop_rx => {
            if let Err(err) = child.kill().await {
                tracing::warn!(error = %err, "failed to kill function process");
            }
            Ok(())
        }
    };
    if let Err(err) = &result {
        tracing::warn!(error = %err, "function process failed");
    }
    let _ = result_tx.send(result);
}

/// Poll `GET http://{host}:{port}/health/readiness` until it answers 200.
///
/// The deadline is authoritative: `Timeout` is only ever produced here, and
/// cancelling `ctx` yields `Canceled`.
pub async fn wait_for_ready(
    ctx: &CancellationToken,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<(), RunError> {
    let url = format!("http://{}{READINESS_ENDPOINT}", host_port(host, port));
    let client = reqwest::Client::builder()
        .timeout(READINESS_DIAL_TIMEOUT)
        .build()?;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(READINESS_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => return Err(RunError::Timeout(timeout)),
            _ = ctx.cancelled() => return Err(RunError::Canceled),
            _ = ticker.tick() => {}
        }
        // The request races the deadline too: a server that accepts and never
        // answers must not outlast it.
        let answer = tokio::select! {
            biased;
            _ = &mut deadline => return Err(RunError::Timeout(timeout)),
            _ = ctx.cancelled() => return Err(RunError::Canceled),
            answer = client.get(&url).send() => answer,
        };
        match answer {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => return Ok(()),
            Ok(resp) => tracing::debug!(%url, status = %resp.status(), "function not ready"),
            Err(err) => tracing::debug!(%url, error = %err, "function not ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_selection() {
        let runner = DefaultRunner::default();
        assert!(matches!(runner.strategy(""), Err(RunError::RuntimeRequired)));
        assert!(runner.strategy("go").is_ok());
        assert!(runner.strategy("python").is_ok());
        for runtime in ["java", "node", "typescript", "rust", "quarkus", "springboot"] {
            match runner.strategy(runtime) {
                Err(RunError::RuntimeNotImplemented(name)) => assert_eq!(name, runtime),
                Err(other) => panic!("expected not implemented, got {other:?}"),
                Ok(_) => panic!("{runtime} should not be runnable"),
            }
        }
        assert!(matches!(
            runner.strategy("cobol"),
            Err(RunError::RuntimeNotRecognized(_))
        ));
    }

    #[tokio::test]
    async fn readiness_times_out_against_closed_port() {
        let port = choose_port("127.0.0.1", 0).expect("port");
        let started = std::time::Instant::now();
        let err = wait_for_ready(
            &CancellationToken::new(),
            "127.0.0.1",
            port,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)), "got: {err}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn readiness_honors_cancellation() {
        let port = choose_port("127.0.0.1", 0).expect("port");
        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = wait_for_ready(&ctx, "127.0.0.1", port, Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Canceled), "got: {err}");
    }

    /// Accepts connections and never answers them.
    async fn silent_listener() -> (u16, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn readiness_deadline_bounds_a_silent_server() {
        let (port, server) = silent_listener().await;
        let started = std::time::Instant::now();
        let err = wait_for_ready(
            &CancellationToken::new(),
            "127.0.0.1",
            port,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)), "got: {err}");
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "took {:?}",
            started.elapsed()
        );
        server.abort();
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_silent_server() {
        let (port, server) = silent_listener().await;
        let ctx = CancellationToken::new();
        let cancel = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let started = std::time::Instant::now();
        let err = wait_for_ready(&ctx, "127.0.0.1", port, Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Canceled), "got: {err}");
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "took {:?}",
            started.elapsed()
        );
        server.abort();
    }
}
