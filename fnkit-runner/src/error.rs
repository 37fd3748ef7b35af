use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use fnkit_core::{CollaboratorError, FunctionError};

/// Error surface for local execution: job setup, launch and readiness.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("runner requires the function have runtime set")]
    RuntimeRequired,

    #[error("the {0:?} runtime is not recognized")]
    RuntimeNotRecognized(String),

    #[error("the {0:?} runtime may only be run containerized")]
    RuntimeNotImplemented(String),

    #[error("timed out waiting for function to be ready for {0:?}")]
    Timeout(Duration),

    #[error("run canceled before the function became ready")]
    Canceled,

    #[error("function at {path} is not initialized")]
    NotInitialized { path: PathBuf },

    #[error("job requires a port")]
    PortRequired,

    #[error("invalid run address '{0}': expected host:port")]
    InvalidAddress(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed (status {status}): {detail}")]
    Prepare {
        step: &'static str,
        status: String,
        detail: String,
    },

    #[error("function process exited with {status}")]
    Exited { status: String },

    #[error("scaffolding error: {0}")]
    Scaffold(#[from] CollaboratorError),

    #[error("function error: {0}")]
    Function(#[from] FunctionError),

    #[error("readiness client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RunError {
    RunError::Io {
        path: path.into(),
        source,
    }
}
