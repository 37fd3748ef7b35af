//! Error types for fnkit-stamp.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from fingerprinting and stamping.
#[derive(Debug, Error)]
pub enum StampError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (stamp record).
    #[error("stamp JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`StampError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StampError {
    StampError::Io {
        path: path.into(),
        source,
    }
}
