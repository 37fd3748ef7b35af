//! The [`Function`] data model.
//!
//! A function is keyed by its root directory. User-authored fields are
//! persisted to `<root>/func.yaml`; build- and deploy-derived fields are
//! `#[serde(skip)]` and live under `<root>/.func/` (see [`crate::manifest`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::env::{self, Env};
use crate::error::FunctionError;
use crate::paths::{DEFAULT_INVOKE, DEFAULT_REGISTRY, DEFAULT_TEMPLATE};
use crate::types::{DeploymentOptions, GitSpec, Label, Subscription};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    /// Absolute path of the function's source; never serialized.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Desired deployment namespace. The namespace the function currently
    /// runs in is [`DeploySpec::namespace`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime: String,

    /// Template used at init; only meaningful during `Init`.
    #[serde(skip)]
    pub template: String,

    /// Invocation hint: `http` or `cloudevent`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub invoke: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry: String,

    /// Explicit image override, e.g. `quay.io/alice/hello:v1`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Digest reported by the most recent push.
    #[serde(skip)]
    pub image_digest: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub build: BuildSpec,

    #[serde(default)]
    pub run: RunSpec,

    #[serde(default)]
    pub deploy: DeploySpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    /// Image produced by the most recent build.
    #[serde(skip)]
    pub image: String,

    #[serde(default, skip_serializing_if = "GitSpec::is_empty")]
    pub git: GitSpec,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub builder: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub builder_images: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_envs: Vec<Env>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<Env>,

    /// Seconds to wait for a locally run function to become ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timeout: Option<u64>,
}

impl RunSpec {
    pub fn start_timeout(&self) -> Option<Duration> {
        self.start_timeout.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
    /// Namespace of the current deployment, as reported by the deployer.
    #[serde(skip)]
    pub namespace: String,

    /// Image of the current deployment.
    #[serde(skip)]
    pub image: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "DeploymentOptions::is_empty")]
    pub options: DeploymentOptions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<Subscription>,
}

impl Function {
    /// An uninitialized function rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Fill in template and invoke defaults for a freshly scaffolded function.
    pub fn with_defaults(mut self) -> Self {
        if self.template.is_empty() {
            self.template = DEFAULT_TEMPLATE.to_string();
        }
        if self.invoke.is_empty() {
            self.invoke = DEFAULT_INVOKE.to_string();
        }
        self
    }

    /// A function is initialized once it carries a creation timestamp.
    pub fn initialized(&self) -> bool {
        self.created.is_some()
    }

    /// Derive the image name from registry and name.
    ///
    /// | registry                  | image                                       |
    /// |---------------------------|---------------------------------------------|
    /// | `alice`                   | `index.docker.io/alice/<name>:latest`       |
    /// | `quay.io/alice`           | `quay.io/alice/<name>:latest`               |
    /// | `localhost:5000/org/team` | `localhost:5000/org/team/<name>:latest`     |
    pub fn image_name(&self) -> Result<String, FunctionError> {
        let registry = self.registry.trim_matches('/');
        if registry.is_empty() {
            return Err(FunctionError::RegistryRequired);
        }
        if self.name.is_empty() {
            return Err(FunctionError::NameRequired);
        }
        let tokens = registry.split('/').count();
        let image = match tokens {
            1 => format!("{DEFAULT_REGISTRY}/{registry}/{}", self.name),
            2 | 3 => format!("{registry}/{}", self.name),
            _ => return Err(FunctionError::InvalidRegistry(self.registry.clone())),
        };
        Ok(format!("{image}:latest"))
    }

    /// Current built image pinned to `digest`.
    pub fn image_name_with_digest(&self, digest: &str) -> String {
        with_digest(&self.build.image, digest)
    }

    /// Name of the directory at `root`, used when no name was given.
    pub fn name_from_root(root: &Path) -> String {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Check the function is logically correct. Enforced on write only, so a
    /// function may be transiently invalid in memory.
    pub fn validate(&self) -> Result<(), FunctionError> {
        let mut errors = Vec::new();
        if self.root.as_os_str().is_empty() {
            errors.push("function root path is required".to_string());
        }
        errors.extend(env::validate(&self.build.build_envs, "buildEnvs"));
        errors.extend(env::validate(&self.run.envs, "envs"));
        errors.extend(validate_labels(&self.deploy.labels));
        errors.extend(validate_options(&self.deploy.options));
        errors.extend(validate_git(&self.build.git));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FunctionError::Validation(errors))
        }
    }
}

/// Replace any tag or existing digest on `image` with `@<digest>`.
///
/// An empty digest leaves the image unchanged.
pub fn with_digest(image: &str, digest: &str) -> String {
    if digest.is_empty() {
        return image.to_string();
    }
    if let Some(idx) = image.find('@') {
        return format!("{}@{digest}", &image[..idx]);
    }
    let (prefix, last) = match image.rfind('/') {
        Some(idx) => image.split_at(idx + 1),
        None => ("", image),
    };
    let repo = last.split(':').next().unwrap_or(last);
    format!("{prefix}{repo}@{digest}")
}

/// Undo [`with_digest`]: drop `@<digest>` and tag the repository `latest`.
///
/// Images without a digest are returned unchanged.
pub fn without_digest(image: &str) -> String {
    match image.split_once('@') {
        Some((repo, _)) => {
            let last = repo.rsplit('/').next().unwrap_or(repo);
            if last.contains(':') {
                repo.to_string()
            } else {
                format!("{repo}:latest")
            }
        }
        None => image.to_string(),
    }
}

fn validate_labels(labels: &[Label]) -> Vec<String> {
    let mut errors = Vec::new();
    for (idx, label) in labels.iter().enumerate() {
        let key = label.key.as_str();
        let (prefix, name) = key.rsplit_once('/').unwrap_or(("", key));
        let name_ok = !name.is_empty()
            && name.len() <= 63
            && name.starts_with(|c: char| c.is_ascii_alphanumeric())
            && name.ends_with(|c: char| c.is_ascii_alphanumeric())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        let prefix_ok = prefix.len() <= 253
            && prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.'));
        if !name_ok || !prefix_ok {
            errors.push(format!("labels entry #{idx} has invalid key '{key}'"));
        }
    }
    errors
}

fn validate_options(options: &DeploymentOptions) -> Vec<String> {
    let Some(scale) = &options.scale else {
        return Vec::new();
    };
    match (scale.min, scale.max) {
        (_, Some(0)) => vec!["options.scale.max must be greater than 0".to_string()],
        (Some(min), Some(max)) if min > max => vec![format!(
            "options.scale.min ({min}) must not exceed options.scale.max ({max})"
        )],
        _ => Vec::new(),
    }
}

fn validate_git(git: &GitSpec) -> Vec<String> {
    if git.url.is_empty() && (!git.revision.is_empty() || !git.context_dir.is_empty()) {
        vec!["git.url is required when git.revision or git.contextDir is set".to_string()]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScaleOptions;
    use rstest::rstest;

    fn named(registry: &str) -> Function {
        Function {
            name: "hello".into(),
            registry: registry.into(),
            ..Function::new("/tmp/hello")
        }
    }

    #[rstest]
    #[case("alice", "index.docker.io/alice/hello:latest")]
    #[case("/alice/", "index.docker.io/alice/hello:latest")]
    #[case("quay.io/alice", "quay.io/alice/hello:latest")]
    #[case("localhost:5000/org/team", "localhost:5000/org/team/hello:latest")]
    fn image_name_derivation(#[case] registry: &str, #[case] expected: &str) {
        assert_eq!(named(registry).image_name().expect("image"), expected);
    }

    #[test]
    fn image_name_rejects_deep_registry() {
        let err = named("a/b/c/d").image_name().unwrap_err();
        assert!(matches!(err, FunctionError::InvalidRegistry(_)), "got: {err}");
    }

    #[test]
    fn image_name_requires_registry_and_name() {
        assert!(matches!(
            named("").image_name(),
            Err(FunctionError::RegistryRequired)
        ));
        let mut f = named("alice");
        f.name.clear();
        assert!(matches!(f.image_name(), Err(FunctionError::NameRequired)));
    }

    #[rstest]
    #[case("quay.io/alice/hello:latest", "quay.io/alice/hello@sha256:abc")]
    #[case("quay.io/alice/hello", "quay.io/alice/hello@sha256:abc")]
    #[case("localhost:5000/alice/hello:v1", "localhost:5000/alice/hello@sha256:abc")]
    #[case("quay.io/alice/hello@sha256:old", "quay.io/alice/hello@sha256:abc")]
    fn digest_replaces_tag(#[case] image: &str, #[case] expected: &str) {
        assert_eq!(with_digest(image, "sha256:abc"), expected);
    }

    #[rstest]
    #[case("quay.io/alice/hello@sha256:abc", "quay.io/alice/hello:latest")]
    #[case("localhost:5000/hello@sha256:abc", "localhost:5000/hello:latest")]
    #[case("quay.io/alice/hello:v2", "quay.io/alice/hello:v2")]
    fn digest_is_stripped_back_to_a_tag(#[case] image: &str, #[case] expected: &str) {
        assert_eq!(without_digest(image), expected);
    }

    #[test]
    fn pinned_build_image() {
        let mut f = named("alice");
        f.build.image = "index.docker.io/alice/hello:latest".into();
        assert_eq!(
            f.image_name_with_digest("sha256:abc"),
            "index.docker.io/alice/hello@sha256:abc"
        );
    }

    #[test]
    fn empty_digest_keeps_image() {
        assert_eq!(with_digest("quay.io/a/b:latest", ""), "quay.io/a/b:latest");
    }

    #[test]
    fn initialized_tracks_created() {
        let mut f = Function::new("/tmp/x");
        assert!(!f.initialized());
        f.created = Some(Utc::now());
        assert!(f.initialized());
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut f = Function::new("/tmp/x");
        f.run.envs.push(Env::new("1BAD", "x"));
        f.deploy.labels.push(Label {
            key: "-nope".into(),
            value: None,
        });
        f.deploy.options.scale = Some(ScaleOptions {
            min: Some(5),
            max: Some(2),
        });
        f.build.git.revision = "main".into();

        let err = f.validate().unwrap_err();
        match err {
            FunctionError::Validation(errors) => assert_eq!(errors.len(), 4, "got: {errors:?}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn default_function_is_valid_once_rooted() {
        assert!(Function::new("/tmp/x").validate().is_ok());
        assert!(Function::default().validate().is_err());
    }

    #[test]
    fn start_timeout_zero_means_unset() {
        let run = RunSpec {
            start_timeout: Some(0),
            ..RunSpec::default()
        };
        assert_eq!(run.start_timeout(), None);
    }
}
