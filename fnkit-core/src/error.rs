//! Error types for fnkit-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from function metadata operations.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse function manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Image derivation needs a registry and none was configured.
    #[error("registry required to build function, please set with `--registry` or the FNKIT_REGISTRY environment variable")]
    RegistryRequired,

    #[error("function name is required")]
    NameRequired,

    #[error("registry should be either 'namespace', 'registry/namespace' or 'registry:port/namespace', got '{0}'")]
    InvalidRegistry(String),

    /// Bundled validation failures, one line per problem.
    #[error("'func.yaml' contains errors:{}", .0.iter().map(|e| format!("\n\t{e}")).collect::<String>())]
    Validation(Vec<String>),

    #[error("required local environment variable '{0}' is not set")]
    MissingEnv(String),

    #[error("env name may not be empty")]
    EnvNameRequired,
}

/// Error returned by every external collaborator (builder, pusher, deployer, …).
///
/// `NotFound` is the only condition this layer inspects; everything else is
/// propagated unchanged.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CollaboratorError {
    /// Wrap a plain message as [`CollaboratorError::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into().into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Convenience constructor for [`FunctionError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FunctionError {
    FunctionError::Io {
        path: path.into(),
        source,
    }
}
