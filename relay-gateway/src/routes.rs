//! Axum handler for the task endpoint.
//!
//! The gateway exposes one endpoint on every path. Validation is fail-fast
//! and the first failure decides the response:
//! 1. method must be POST (405)
//! 2. a protocol source and a `host` header must be present (400)
//! 3. the body must be JSON and not `null` (400)
//! 4. the body must carry `type` ∈ {invoke, resume} and a non-empty `task` (400)

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{header::HOST, HeaderMap, Method, Uri},
    Json, Router,
};
use relay_core::{Task, TaskKind};
use relay_executor::EngineStatus;
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::{bridge::Bridge, error::GatewayError};

// ── Shared state ─────────────────────────────────────────────────────────────

/// State shared by every request. Read-only after start-up.
pub struct AppState {
    pub bridge: Bridge,
    /// Scheme used when neither `x-forwarded-proto` nor the URI names one.
    pub listener_scheme: Option<String>,
    pub verbose: bool,
}

type Shared = Arc<AppState>;

// ── Response types ────────────────────────────────────────────────────────────

/// Successful outcome of one task.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskResponse {
    Completed {
        result: Value,
        #[serde(rename = "requestUrl")]
        request_url: String,
    },
    Suspended {
        #[serde(rename = "requestUrl")]
        request_url: String,
    },
}

impl TaskResponse {
    fn from_status(status: EngineStatus, request_url: String) -> Self {
        match status {
            EngineStatus::Completed { value } => Self::Completed { result: value, request_url },
            EngineStatus::Suspended => Self::Suspended { request_url },
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router. Every path and method reaches
/// [`handle_task`].
pub fn create_router(state: Shared) -> Router {
    Router::new()
        .fallback(handle_task)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// `POST /<any>`: run one task as an ephemeral worker.
///
/// # Errors
/// See the module docs for validation failures; engine failures map to
/// [`GatewayError::Processing`] and context construction failures to
/// [`GatewayError::Handler`].
pub async fn handle_task(
    State(state): State<Shared>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TaskResponse>, GatewayError> {
    if method != Method::POST {
        return Err(GatewayError::MethodNotAllowed);
    }
    let url = request_url(&headers, &uri, state.listener_scheme.as_deref())?;
    let body = parse_body(&body)?;
    let kind = task_kind(&body)?;
    let base = callback_base(&body)?;
    let task = Task::new(kind, body["task"].clone(), base);

    match state.bridge.process(task, &url).await {
        Ok(status) => {
            tracing::info!(request_url = %url, ?status, "task finished");
            Ok(Json(TaskResponse::from_status(status, url)))
        }
        Err(e) => {
            if state.verbose {
                tracing::error!(request_url = %url, error = ?e, "task processing failed");
            } else {
                tracing::error!(request_url = %url, error = %e, "task processing failed");
            }
            Err(e)
        }
    }
}

// ── Request parsing ───────────────────────────────────────────────────────────

/// Derive `scheme://host/path?query` of the inbound request.
///
/// The scheme comes from the first `x-forwarded-proto` entry, then the
/// request URI, then `fallback_scheme`.
///
/// # Errors
/// Returns [`GatewayError::MissingHeaders`] if no scheme or no host is known.
pub fn request_url(
    headers: &HeaderMap,
    uri: &Uri,
    fallback_scheme: Option<&str>,
) -> Result<String, GatewayError> {
    let forwarded = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let proto = forwarded
        .or_else(|| uri.scheme_str())
        .or(fallback_scheme)
        .ok_or(GatewayError::MissingHeaders)?;
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(GatewayError::MissingHeaders)?;
    let path = uri.path_and_query().map_or("", |pq| pq.as_str());
    Ok(format!("{proto}://{host}{path}"))
}

/// Deserialize the request body. Empty, `null` or malformed bodies are all
/// reported as missing.
///
/// # Errors
/// Returns [`GatewayError::BodyMissing`].
pub fn parse_body(raw: &[u8]) -> Result<Value, GatewayError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::BodyMissing);
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Null) | Err(_) => Err(GatewayError::BodyMissing),
        Ok(body) => Ok(body),
    }
}

/// Check `type` and `task`, returning the task kind.
///
/// # Errors
/// Returns [`GatewayError::InvalidBody`] if `type` is not `invoke`/`resume`
/// or `task` is absent or empty.
pub fn task_kind(body: &Value) -> Result<TaskKind, GatewayError> {
    let kind = body
        .get("type")
        .and_then(Value::as_str)
        .and_then(TaskKind::parse)
        .ok_or(GatewayError::InvalidBody)?;
    if !body.get("task").is_some_and(is_present) {
        return Err(GatewayError::InvalidBody);
    }
    Ok(kind)
}

/// Orchestrator base URL the transport must call back to.
///
/// # Errors
/// Returns [`GatewayError::Handler`] if `href.base` is absent or not a string.
pub fn callback_base(body: &Value) -> Result<String, GatewayError> {
    body.pointer("/href/base")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| GatewayError::Handler("request body has no string href.base".to_owned()))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
