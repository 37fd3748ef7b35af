//! # fnkit-client
//!
//! Lifecycle orchestration for functions: init, build, push, deploy, run,
//! invoke and remove.
//!
//! [`Client`] composes the pieces below it (manifest persistence from
//! `fnkit-core`, the build stamp from `fnkit-stamp`, local execution from
//! `fnkit-runner`) with the external systems described in
//! [`collaborators`]. Every collaborator defaults to a null object from
//! [`noop`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use fnkit_client::{ClientBuilder, ClientConfig};
//! use fnkit_core::Function;
//! use tokio_util::sync::CancellationToken;
//!
//! let client = ClientBuilder::from_config(&ClientConfig::from_env()).build()?;
//! let ctx = CancellationToken::new();
//! let f = client
//!     .init(&Function {
//!         runtime: "go".into(),
//!         ..Function::new("./hello")
//!     })
//!     .await?;
//! let f = client.build(&ctx, &f, &Default::default()).await?;
//! let mut job = client.run(&ctx, &f, Default::default()).await?;
//! job.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod collaborators;
pub mod config;
mod error;
pub mod instances;
pub mod invoke;
pub mod logging;
pub mod noop;
mod progress;
pub mod root;

pub use client::{BuildOptions, Client, ClientBuilder, DeployOptions, RunOptions};
pub use collaborators::{
    Builder, Deployer, Describer, DnsProvider, Lister, PipelinesProvider, Pusher, Remover,
    Templates,
};
pub use config::ClientConfig;
pub use error::{ClientError, LifecycleError};
pub use instances::{Instances, ENVIRONMENT_LOCAL, ENVIRONMENT_REMOTE};
pub use invoke::{InvokeMessage, InvokeResponse};
pub use logging::init_tracing;
