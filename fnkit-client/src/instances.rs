//! Where is a function running?

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fnkit_core::{Function, Instance};
use fnkit_runner::{host_port, job_host, job_ports};

use crate::collaborators::Describer;
use crate::error::ClientError;

pub const ENVIRONMENT_LOCAL: &str = "local";
pub const ENVIRONMENT_REMOTE: &str = "remote";

/// Resolves [`Instance`]s of a function per environment.
#[derive(Clone)]
pub struct Instances {
    describer: Arc<dyn Describer>,
}

impl Instances {
    pub fn new(describer: Arc<dyn Describer>) -> Self {
        Self { describer }
    }

    /// Instance of `f` in `environment`: `local` or `remote`.
    pub async fn get(
        &self,
        ctx: &CancellationToken,
        f: &Function,
        environment: &str,
    ) -> Result<Instance, ClientError> {
        match environment {
            ENVIRONMENT_LOCAL => self.local(f),
            ENVIRONMENT_REMOTE => self.remote(ctx, &f.name, deployed_namespace(f)).await,
            other => Err(ClientError::EnvironmentNotFound(other.to_string())),
        }
    }

    /// The locally running instance, keyed by the function's root.
    ///
    /// A function is running locally while it has a job directory; the
    /// lowest port wins when several jobs exist. The route uses the host the
    /// job was bound to.
    pub fn local(&self, f: &Function) -> Result<Instance, ClientError> {
        if !f.initialized() {
            return Err(ClientError::NotInitialized {
                path: f.root.clone(),
            });
        }
        let ports = job_ports(&f.root)?;
        let Some(&port) = ports.first() else {
            return Err(ClientError::NotRunning);
        };
        let host = job_host(&f.root, port)?;
        let route = format!("http://{}/", host_port(&host, port));
        Ok(Instance {
            routes: vec![route.clone()],
            route,
            name: f.name.clone(),
            image: f.build.image.clone(),
            ..Instance::default()
        })
    }

    /// The deployed instance, as described by the platform.
    pub async fn remote(
        &self,
        ctx: &CancellationToken,
        name: &str,
        namespace: &str,
    ) -> Result<Instance, ClientError> {
        if name.is_empty() {
            return Err(ClientError::NameRequired);
        }
        if namespace.is_empty() {
            return Err(ClientError::NamespaceRequired);
        }
        let mut instance = match self.describer.describe(ctx, name, namespace).await {
            Ok(instance) => instance,
            Err(err) if err.is_not_found() => return Err(ClientError::FunctionNotFound),
            Err(err) => return Err(err.into()),
        };
        if instance.route.is_empty() {
            if let Some(first) = instance.routes.first() {
                instance.route = first.clone();
            }
        }
        Ok(instance)
    }
}

/// Namespace the function is deployed to, falling back to the one it asks
/// for.
pub(crate) fn deployed_namespace(f: &Function) -> &str {
    if f.deploy.namespace.is_empty() {
        &f.namespace
    } else {
        &f.deploy.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopDescriber;
    use chrono::Utc;
    use tempfile::TempDir;

    fn instances() -> Instances {
        Instances::new(Arc::new(NoopDescriber))
    }

    #[tokio::test]
    async fn unknown_environment_is_rejected() {
        let tmp = TempDir::new().expect("root");
        let f = Function::new(tmp.path());
        let err = instances()
            .get(&CancellationToken::new(), &f, "staging")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EnvironmentNotFound(ref e) if e == "staging"));
    }

    #[test]
    fn local_requires_a_job() {
        let tmp = TempDir::new().expect("root");
        let f = Function {
            name: "hello".into(),
            created: Some(Utc::now()),
            ..Function::new(tmp.path())
        };
        assert!(matches!(instances().local(&f), Err(ClientError::NotRunning)));

        std::fs::create_dir_all(fnkit_core::paths::job_dir(tmp.path(), 8081)).expect("mkdir");
        let instance = instances().local(&f).expect("local");
        assert_eq!(instance.route, "http://127.0.0.1:8081/");
        assert_eq!(instance.name, "hello");
    }

    #[test]
    fn local_route_uses_the_job_host() {
        let tmp = TempDir::new().expect("root");
        let f = Function {
            name: "hello".into(),
            created: Some(Utc::now()),
            ..Function::new(tmp.path())
        };
        let job = fnkit_runner::Job::new(f.clone(), "::1", 8082, None, None).expect("job");
        let instance = instances().local(&f).expect("local");
        assert_eq!(instance.route, "http://[::1]:8082/");
        assert_eq!(instance.routes, vec!["http://[::1]:8082/".to_string()]);
        drop(job);
        assert!(matches!(instances().local(&f), Err(ClientError::NotRunning)));
    }

    #[tokio::test]
    async fn remote_requires_name_and_namespace() {
        let ctx = CancellationToken::new();
        assert!(matches!(
            instances().remote(&ctx, "", "ns").await,
            Err(ClientError::NameRequired)
        ));
        assert!(matches!(
            instances().remote(&ctx, "hello", "").await,
            Err(ClientError::NamespaceRequired)
        ));
    }
}
