//! Environment variables declared in a function manifest.
//!
//! A value of the form `{{ env:NAME }}` is substituted with the host's
//! `NAME` variable when the envs are interpolated; any other value is used
//! verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FunctionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Env {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Env {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }
}

/// Resolve a list of envs into a name → value map.
///
/// Envs without a value are omitted. Interpolated references to unset host
/// variables are an error.
pub fn interpolate(envs: &[Env]) -> Result<BTreeMap<String, String>, FunctionError> {
    interpolate_with(envs, |name| std::env::var(name).ok())
}

/// [`interpolate`] with an explicit lookup; used by tests.
pub fn interpolate_with<F>(envs: &[Env], lookup: F) -> Result<BTreeMap<String, String>, FunctionError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut resolved = BTreeMap::new();
    for env in envs {
        let Some(name) = env.name.as_deref().filter(|n| !n.is_empty()) else {
            return Err(FunctionError::EnvNameRequired);
        };
        let Some(value) = env.value.as_deref() else {
            continue;
        };
        match parse_reference(value) {
            Some(("env", var)) => {
                let host = lookup(var).ok_or_else(|| FunctionError::MissingEnv(var.to_string()))?;
                resolved.insert(name.to_string(), host);
            }
            _ => {
                resolved.insert(name.to_string(), value.to_string());
            }
        }
    }
    Ok(resolved)
}

/// Validation messages for a list of envs (empty when valid).
pub fn validate(envs: &[Env], field: &str) -> Vec<String> {
    let mut errors = Vec::new();
    for (idx, env) in envs.iter().enumerate() {
        match env.name.as_deref() {
            None | Some("") => errors.push(format!("{field} entry #{idx} is missing a name")),
            Some(name) if !is_valid_env_name(name) => errors.push(format!(
                "{field} entry #{idx} has invalid name '{name}': must consist of alphanumeric characters, '-', '_' or '.', and must not start with a digit"
            )),
            Some(_) => {}
        }
        if let Some(value) = env.value.as_deref() {
            if value.starts_with("{{") && parse_reference(value).is_none() {
                errors.push(format!(
                    "{field} entry #{idx} has invalid value '{value}': expected '{{{{ env:NAME }}}}'"
                ));
            }
        }
    }
    errors
}

pub(crate) fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first.is_ascii_digit() {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Split `{{ kind:NAME }}` into `(kind, NAME)`.
fn parse_reference(value: &str) -> Option<(&str, &str)> {
    let inner = value.trim().strip_prefix("{{")?.strip_suffix("}}")?.trim();
    let (kind, name) = inner.split_once(':')?;
    let (kind, name) = (kind.trim(), name.trim());
    let word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    (word(kind) && word(name)).then_some((kind, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        (name == "API_KEY").then(|| "s3cr3t".to_string())
    }

    #[test]
    fn plain_values_pass_through() {
        let envs = vec![Env::new("MODE", "debug")];
        let resolved = interpolate_with(&envs, lookup).expect("interpolate");
        assert_eq!(resolved.get("MODE").map(String::as_str), Some("debug"));
    }

    #[test]
    fn env_references_are_substituted() {
        let envs = vec![Env::new("KEY", "{{ env:API_KEY }}"), Env::new("K2", "{{env:API_KEY}}")];
        let resolved = interpolate_with(&envs, lookup).expect("interpolate");
        assert_eq!(resolved["KEY"], "s3cr3t");
        assert_eq!(resolved["K2"], "s3cr3t");
    }

    #[test]
    fn missing_host_variable_is_an_error() {
        let envs = vec![Env::new("KEY", "{{ env:NOPE }}")];
        let err = interpolate_with(&envs, lookup).unwrap_err();
        assert!(matches!(err, FunctionError::MissingEnv(ref n) if n == "NOPE"), "got: {err}");
    }

    #[test]
    fn non_env_references_are_preserved() {
        let envs = vec![Env::new("S", "{{ secret:mysecret }}")];
        let resolved = interpolate_with(&envs, lookup).expect("interpolate");
        assert_eq!(resolved["S"], "{{ secret:mysecret }}");
    }

    #[test]
    fn valueless_envs_are_skipped() {
        let envs = vec![Env {
            name: Some("EMPTY".into()),
            value: None,
        }];
        assert!(interpolate_with(&envs, lookup).expect("interpolate").is_empty());
    }

    #[test]
    fn validate_flags_bad_names_and_references() {
        let envs = vec![
            Env::new("9LIVES", "x"),
            Env::new("OK_NAME", "{{ env: }}"),
            Env::default(),
        ];
        let errors = validate(&envs, "envs");
        assert_eq!(errors.len(), 3, "got: {errors:?}");
    }
}
