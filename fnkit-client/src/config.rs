//! Client configuration.
//!
//! Loading from files is left to the caller; [`ClientConfig`] deserializes
//! from any serde format and can be seeded from `FNKIT_*` environment
//! variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_REGISTRY: &str = "FNKIT_REGISTRY";
pub const ENV_VERBOSE: &str = "FNKIT_VERBOSE";
pub const ENV_START_TIMEOUT: &str = "FNKIT_START_TIMEOUT";
pub const ENV_RUN_ADDRESS: &str = "FNKIT_RUN_ADDRESS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Registry used for functions that do not set their own.
    pub registry: Option<String>,
    pub verbose: bool,
    /// Seconds to wait for a locally run function to become ready.
    pub start_timeout: Option<u64>,
    /// `host:port` locally run functions bind to.
    pub run_address: Option<String>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            registry: non_empty(ENV_REGISTRY),
            verbose: non_empty(ENV_VERBOSE)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            start_timeout: non_empty(ENV_START_TIMEOUT).and_then(|v| match v.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring invalid {ENV_START_TIMEOUT}");
                    None
                }
            }),
            run_address: non_empty(ENV_RUN_ADDRESS),
        }
    }

    pub fn start_timeout(&self) -> Option<Duration> {
        self.start_timeout.filter(|s| *s > 0).map(Duration::from_secs)
    }
}
