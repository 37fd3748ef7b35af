//! fnkit core library: the function data model, manifest persistence,
//! runtime-data layout and shared error types.
//!
//! - [`function`]: [`Function`] and its build/run/deploy specs
//! - [`manifest`]: load / write of `func.yaml` plus `.func/` metadata
//! - [`env`]: manifest envs and `{{ env:NAME }}` interpolation
//! - [`types`]: instances, deployment results and other collaborator payloads
//! - [`error`]: [`FunctionError`], [`CollaboratorError`]

pub mod env;
pub mod error;
pub mod function;
pub mod manifest;
pub mod paths;
pub mod types;

pub use env::Env;
pub use error::{CollaboratorError, FunctionError};
pub use function::{with_digest, without_digest, BuildSpec, DeploySpec, Function, RunSpec};
pub use types::{
    DeployStatus, DeploymentOptions, DeploymentResult, GitSpec, Instance, Label, ListItem,
    PacMetadata, Platform, ScaleOptions, Subscription,
};
