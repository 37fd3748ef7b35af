use std::path::PathBuf;

use thiserror::Error;

use fnkit_core::{CollaboratorError, Function, FunctionError};
use fnkit_runner::RunError;
use fnkit_stamp::StampError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not built")]
    NotBuilt,

    #[error("function name required")]
    NameRequired,

    #[error("function namespace required")]
    NamespaceRequired,

    #[error("'{}' does not contain an initialized function", .path.display())]
    NotInitialized { path: PathBuf },

    #[error("function runtime required")]
    RuntimeRequired,

    #[error("function at '{}' already initialized", .path.display())]
    AlreadyInitialized { path: PathBuf },

    /// Init refuses to scaffold into a directory holding user files.
    #[error("the chosen directory '{}' contains contentious files: {}. Has the function already been created? Try a different path.", .path.display(), .files.join(", "))]
    Contentious { path: PathBuf, files: Vec<String> },

    #[error("environment not found: '{0}'")]
    EnvironmentNotFound(String),

    #[error("function not running")]
    NotRunning,

    #[error("function not found")]
    FunctionNotFound,

    #[error("function is not running locally or in the remote")]
    NotRunningAnywhere,

    #[error("function was not deployed: no route available")]
    NoRoute,

    /// Both the service and its pipeline resources failed to delete.
    #[error("{service}\n{resources}")]
    RemoveFailed {
        service: CollaboratorError,
        resources: CollaboratorError,
    },

    #[error("format '{0}' not supported")]
    UnsupportedFormat(String),

    #[error("invoke does not support the '{0}' request type, please use either 'POST' or 'GET'")]
    UnsupportedMethod(String),

    #[error("failure invoking '{route}' (HTTP {status})")]
    InvokeStatus { route: String, status: u16 },

    #[error("cloudevent not delivered to '{route}': {reason}")]
    Undelivered { route: String, reason: String },

    #[error("context canceled")]
    Canceled,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error(transparent)]
    Stamp(#[from] StampError),

    #[error(transparent)]
    Run(#[from] RunError),

    /// Collaborator failures pass through untouched.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl ClientError {
    /// Whether a collaborator reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Collaborator(CollaboratorError::NotFound))
    }
}

/// A composite lifecycle operation failed part way.
///
/// `function` is the function as of the last step that succeeded.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct LifecycleError {
    pub function: Box<Function>,
    #[source]
    pub source: ClientError,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ClientError {
    ClientError::Io {
        path: path.into(),
        source,
    }
}
