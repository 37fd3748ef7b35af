use std::time::Duration;

pub const DEFAULT_RUN_HOST: &str = "127.0.0.1";
pub const DEFAULT_RUN_PORT: u16 = 8080;

pub const READINESS_ENDPOINT: &str = "/health/readiness";
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Per-request bound on a single readiness check.
pub const READINESS_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtimes known to exist but only runnable as containers.
pub const CONTAINER_ONLY_RUNTIMES: &[&str] =
    &["java", "node", "typescript", "rust", "quarkus", "springboot"];

/// Inside a job directory, the host the function was bound to.
pub const JOB_HOST_FILE: &str = ".host";

pub use fnkit_core::paths::{job_dir, runs_dir};
