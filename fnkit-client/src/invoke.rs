//! Ad-hoc invocation of a running function.
//!
//! The route is resolved from the target (`local`, `remote`, empty for
//! "local, else remote", or a literal URL), then the message is sent as a
//! plain HTTP request or as a binary-mode CloudEvent.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use fnkit_core::paths::DEFAULT_INVOKE;
use fnkit_core::Function;

use crate::error::ClientError;
use crate::instances::{Instances, ENVIRONMENT_LOCAL, ENVIRONMENT_REMOTE};

pub const DEFAULT_INVOKE_SOURCE: &str = "/boson/fn";
pub const DEFAULT_INVOKE_TYPE: &str = "boson.fn";
pub const DEFAULT_INVOKE_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_INVOKE_DATA: &str = r#"{"message":"Hello World"}"#;
pub const DEFAULT_INVOKE_REQUEST_TYPE: &str = "POST";

pub const FORMAT_HTTP: &str = "http";
pub const FORMAT_CLOUDEVENT: &str = "cloudevent";

const CLOUDEVENTS_SPEC_VERSION: &str = "1.0";
pub(crate) const INVOKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Message sent by [`crate::Client::invoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeMessage {
    pub id: String,
    pub source: String,
    pub r#type: String,
    pub content_type: String,
    pub data: String,
    /// Overrides the function's invoke format for this call only.
    pub format: Option<String>,
    /// `GET` or `POST`.
    pub request_type: String,
}

impl Default for InvokeMessage {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: DEFAULT_INVOKE_SOURCE.to_string(),
            r#type: DEFAULT_INVOKE_TYPE.to_string(),
            content_type: DEFAULT_INVOKE_CONTENT_TYPE.to_string(),
            data: DEFAULT_INVOKE_DATA.to_string(),
            format: None,
            request_type: DEFAULT_INVOKE_REQUEST_TYPE.to_string(),
        }
    }
}

/// Response headers (multi-valued) and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeResponse {
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Resolve the route for `target`.
///
/// An empty target prefers a local instance and falls back to the remote
/// one; any target other than `local`/`remote` is used verbatim.
pub(crate) async fn invocation_route(
    ctx: &CancellationToken,
    instances: &Instances,
    f: &Function,
    target: &str,
) -> Result<String, ClientError> {
    match target {
        ENVIRONMENT_LOCAL | ENVIRONMENT_REMOTE => {
            Ok(instances.get(ctx, f, target).await?.route)
        }
        "" => {
            match instances.get(ctx, f, ENVIRONMENT_LOCAL).await {
                Ok(instance) => return Ok(instance.route),
                Err(ClientError::NotRunning) => {}
                Err(err) => return Err(err),
            }
            match instances.get(ctx, f, ENVIRONMENT_REMOTE).await {
                Ok(instance) if !instance.route.is_empty() => Ok(instance.route),
                Ok(_)
                | Err(ClientError::FunctionNotFound)
                | Err(ClientError::NamespaceRequired) => Err(ClientError::NotRunningAnywhere),
                Err(err) => Err(err),
            }
        }
        url => Ok(url.to_string()),
    }
}

/// Send `message` to `route` in the format chosen for `f`.
pub(crate) async fn send(
    ctx: &CancellationToken,
    http: &reqwest::Client,
    f: &Function,
    route: &str,
    message: &InvokeMessage,
) -> Result<InvokeResponse, ClientError> {
    let format = message
        .format
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(Some(f.invoke.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or(DEFAULT_INVOKE);
    let method = request_method(&message.request_type)?;
    tracing::debug!(%route, format, method = %method, id = %message.id, "invoking function");

    match format {
        FORMAT_HTTP => cancellable(ctx, send_http(http, route, method, message)).await,
        FORMAT_CLOUDEVENT => cancellable(ctx, send_event(http, route, method, message)).await,
        other => Err(ClientError::UnsupportedFormat(other.to_string())),
    }
}

fn request_method(request_type: &str) -> Result<Method, ClientError> {
    match request_type.to_ascii_uppercase().as_str() {
        "" | "POST" => Ok(Method::POST),
        "GET" => Ok(Method::GET),
        _ => Err(ClientError::UnsupportedMethod(request_type.to_string())),
    }
}

async fn cancellable<F>(ctx: &CancellationToken, fut: F) -> Result<InvokeResponse, ClientError>
where
    F: Future<Output = Result<InvokeResponse, ClientError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(ClientError::Canceled),
        result = fut => result,
    }
}

async fn send_http(
    http: &reqwest::Client,
    route: &str,
    method: Method,
    message: &InvokeMessage,
) -> Result<InvokeResponse, ClientError> {
    let mut request = http.request(method.clone(), route);
    if method == Method::POST {
        request = request
            .header(CONTENT_TYPE, &message.content_type)
            .body(message.data.clone());
    }
    let response = request.send().await?;
    let status = response.status();
    if status.as_u16() > 299 {
        return Err(ClientError::InvokeStatus {
            route: route.to_string(),
            status: status.as_u16(),
        });
    }
    let headers = header_map(response.headers());
    let body = response.text().await?;
    Ok(InvokeResponse { headers, body })
}

/// Binary-mode CloudEvent over HTTP. `GET` carries the context attributes
/// as headers and no data.
async fn send_event(
    http: &reqwest::Client,
    route: &str,
    method: Method,
    message: &InvokeMessage,
) -> Result<InvokeResponse, ClientError> {
    let mut request = http
        .request(method.clone(), route)
        .header("ce-specversion", CLOUDEVENTS_SPEC_VERSION)
        .header("ce-id", &message.id)
        .header("ce-source", &message.source)
        .header("ce-type", &message.r#type);
    if method == Method::POST {
        request = request
            .header(CONTENT_TYPE, &message.content_type)
            .body(message.data.clone());
    }

    let response = request.send().await.map_err(|err| ClientError::Undelivered {
        route: route.to_string(),
        reason: err.to_string(),
    })?;
    let status = response.status();
    if status.as_u16() > 299 {
        return Err(ClientError::InvokeStatus {
            route: route.to_string(),
            status: status.as_u16(),
        });
    }
    let headers = header_map(response.headers());
    let body = response.text().await?;
    Ok(InvokeResponse { headers, body })
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}
