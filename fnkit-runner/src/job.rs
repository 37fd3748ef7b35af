//! Handle to a locally running function instance.
//!
//! Each job owns `<root>/.func/runs/<port>`; the directory's existence is
//! what marks the function as running locally (see [`job_ports`]). The host
//! the job was bound to is recorded inside it (see [`job_host`]).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::oneshot;

use fnkit_core::Function;

use crate::error::{io_err, RunError};
use crate::paths::{job_dir, runs_dir, DEFAULT_RUN_HOST, JOB_HOST_FILE};
use crate::port::port_is_free;

/// Terminal result of the function process, delivered at most once.
pub type JobResult = Result<(), RunError>;

/// Invoked once when the job is stopped.
pub type StopHook = Box<dyn FnOnce() -> Result<(), RunError> + Send>;

pub struct Job {
    pub function: Function,
    pub host: String,
    pub port: u16,
    dir: PathBuf,
    errors: Option<oneshot::Receiver<JobResult>>,
    on_stop: Option<StopHook>,
    stopped: bool,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("root", &self.function.root)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dir", &self.dir)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl Job {
    /// Register a job for an initialized function on `port`.
    ///
    /// Removes job directories left behind by runs whose port is no longer
    /// bound, then creates this job's directory.
    pub fn new(
        function: Function,
        host: impl Into<String>,
        port: u16,
        errors: Option<oneshot::Receiver<JobResult>>,
        on_stop: Option<StopHook>,
    ) -> Result<Job, RunError> {
        if !function.initialized() {
            return Err(RunError::NotInitialized {
                path: function.root.clone(),
            });
        }
        if port == 0 {
            return Err(RunError::PortRequired);
        }

        remove_orphans(&function.root, port)?;

        let host = host.into();
        let dir = job_dir(&function.root, port);
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let host_file = dir.join(JOB_HOST_FILE);
        std::fs::write(&host_file, &host).map_err(|e| io_err(&host_file, e))?;
        tracing::debug!(dir = %dir.display(), %host, "job directory created");

        Ok(Job {
            function,
            host,
            port,
            dir,
            errors,
            on_stop,
            stopped: false,
        })
    }

    /// Job-private working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take the channel carrying the process's terminal result.
    ///
    /// Returns `None` on the second call, or if the job was created without
    /// one.
    pub fn take_errors(&mut self) -> Option<oneshot::Receiver<JobResult>> {
        self.errors.take()
    }

    /// Wait for the process to exit and return its result.
    pub async fn wait(&mut self) -> JobResult {
        match self.errors.take() {
            Some(rx) => rx.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }

    /// Terminate the process and remove the job directory.
    ///
    /// The stop hook runs exactly once; later calls only retry the directory
    /// removal.
    pub fn stop(&mut self) -> Result<(), RunError> {
        let hook_result = match self.on_stop.take() {
            Some(hook) => hook(),
            None => Ok(()),
        };
        self.stopped = true;
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&self.dir, err)),
        }
        tracing::debug!(port = self.port, "job stopped");
        hook_result
    }
}

/// An abandoned job is stopped, so its directory never outlives the process.
impl Drop for Job {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        if let Err(err) = self.stop() {
            tracing::warn!(port = self.port, error = %err, "failed to stop dropped job");
        }
    }
}

/// Ports of the jobs currently registered for the function at `root`,
/// ascending.
pub fn job_ports(root: &Path) -> Result<Vec<u16>, RunError> {
    let dir = runs_dir(root);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(&dir, err)),
    };
    let mut ports = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        if let Some(port) = entry.file_name().to_str().and_then(|n| n.parse::<u16>().ok()) {
            ports.push(port);
        }
    }
    ports.sort_unstable();
    Ok(ports)
}

/// Host the job on `port` was bound to; the loopback default when the job
/// directory does not record one.
pub fn job_host(root: &Path, port: u16) -> Result<String, RunError> {
    let path = job_dir(root, port).join(JOB_HOST_FILE);
    match std::fs::read_to_string(&path) {
        Ok(host) if !host.trim().is_empty() => Ok(host.trim().to_string()),
        Ok(_) => Ok(DEFAULT_RUN_HOST.to_string()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(DEFAULT_RUN_HOST.to_string()),
        Err(err) => Err(io_err(&path, err)),
    }
}

fn remove_orphans(root: &Path, keep: u16) -> Result<(), RunError> {
    for port in job_ports(root)? {
        if port == keep || !port_is_free(port) {
            continue;
        }
        let dir = job_dir(root, port);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => tracing::info!(port, "removed orphaned job directory"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&dir, err)),
        }
    }
    Ok(())
}
