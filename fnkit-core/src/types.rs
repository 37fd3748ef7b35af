//! Supporting domain types shared by the orchestrator and its collaborators.
//!
//! Persisted types are serializable via serde + serde_yaml; the runtime-only
//! snapshots ([`Instance`], [`DeploymentResult`], [`ListItem`]) are never
//! written to disk.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Manifest building blocks
// ---------------------------------------------------------------------------

/// Git source used by remote (pipeline) builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GitSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_dir: String,
}

impl GitSpec {
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.revision.is_empty() && self.context_dir.is_empty()
    }
}

/// A deployment label. Values support `{{ env:NAME }}` interpolation like envs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScaleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeploymentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleOptions>,
}

impl DeploymentOptions {
    pub fn is_empty(&self) -> bool {
        self.scale.is_none()
    }
}

/// An event subscription of a deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Subscription {
    pub source: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// Target platform for a multi-arch build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.os, self.architecture, variant),
            None => write!(f, "{}/{}", self.os, self.architecture),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployStatus {
    #[default]
    Deployed,
    Updated,
    Failed,
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStatus::Deployed => write!(f, "deployed"),
            DeployStatus::Updated => write!(f, "updated"),
            DeployStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeploymentResult {
    pub status: DeployStatus,
    pub url: String,
    pub namespace: String,
}

/// Point-in-time snapshot of a function in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Instance {
    /// Primary route; empty when the function exposes none.
    pub route: String,
    pub routes: Vec<String>,
    pub name: String,
    pub image: String,
    pub namespace: String,
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListItem {
    pub name: String,
    pub namespace: String,
    pub runtime: String,
    pub url: String,
    pub ready: String,
}

/// Pipelines-as-code settings handed to the pipelines provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacMetadata {
    pub repository: String,
    pub webhook_secret: Option<String>,
    pub configure_local: bool,
    pub configure_cluster: bool,
    pub configure_remote: bool,
}
