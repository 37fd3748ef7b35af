//! Local execution of functions: jobs, launch strategies and readiness.
//!
//! A [`Runner`] scaffolds a job-private copy of the function under
//! `<root>/.func/runs/<port>`, prepares it with the runtime's
//! [`LaunchStrategy`], launches the process and blocks until
//! `GET /health/readiness` answers 200. The returned [`Job`] owns the process.

mod error;
pub mod job;
pub mod paths;
pub mod port;
pub mod runner;
pub mod scaffold;
pub mod strategy;

pub use error::RunError;
pub use job::{job_host, job_ports, Job, JobResult, StopHook};
pub use port::{choose_port, host_port, resolve_address};
pub use runner::{wait_for_ready, DefaultRunner, Runner};
pub use scaffold::{Scaffolding, SourceScaffolding};
pub use strategy::{GoStrategy, LaunchContext, LaunchStrategy, PythonStrategy};
