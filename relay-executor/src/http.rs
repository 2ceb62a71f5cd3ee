//! HTTP transport to the orchestrator.
//!
//! Built on hyper's pooled legacy client behind a rustls connector that
//! accepts both `http` and `https` bases. One [`HttpTransport`] is shared
//! by the whole process; every request gets its own [`HttpNetwork`] bound
//! to that request's callback base URL and credentials.

use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use relay_core::{
    DurablePromise, EncodedValue, PromiseState, TaskKind, TaskRef, WorkerIdentity,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::network::{CallbackOutcome, ClaimedTask, Connector, Network};
use crate::{ExecutorError, TransportConfig};

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest<'a> {
    id: &'a str,
    counter: u64,
    process_id: &'a str,
    ttl: u64,
}

#[derive(Debug, Deserialize)]
struct ClaimResponse {
    #[serde(rename = "type")]
    kind: TaskKind,
    promises: ClaimedPromises,
}

#[derive(Debug, Deserialize)]
struct ClaimedPromises {
    root: PromiseEnvelope,
}

#[derive(Debug, Deserialize)]
struct PromiseEnvelope {
    data: DurablePromise,
}

#[derive(Debug, Serialize)]
struct CompleteRequest<'a> {
    id: &'a str,
    counter: u64,
}

#[derive(Debug, Serialize)]
struct SettleRequest {
    state: PromiseState,
    value: EncodedValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackRequest<'a> {
    root_promise_id: &'a str,
    timeout: i64,
    recv: &'a str,
}

#[derive(Debug, Deserialize)]
struct CallbackResponse {
    #[serde(default)]
    callback: Option<Value>,
    promise: DurablePromise,
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Process-wide HTTP connector producing per-request networks.
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    /// Create a transport with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self { client: build_client() }
    }
}

fn build_client() -> HttpClient {
    // Errs once a provider is installed; the first one stays.
    let _ = rustls::crypto::ring::default_provider().install_default();
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new()).build(https)
}

/// Path of the promise `id`, encoded as a single segment.
fn promise_path(id: &str) -> String {
    format!("/promises/{}", urlencoding::encode(id))
}

/// Path of the callback endpoint for promise `id`.
fn callback_path(id: &str) -> String {
    format!("/promises/callback/{}", urlencoding::encode(id))
}

/// `err` followed by each of its sources, joined with `: `.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for HttpTransport {
    fn connect(&self, config: TransportConfig) -> Result<Arc<dyn Network>, ExecutorError> {
        Ok(Arc::new(HttpNetwork::new(self.client.clone(), config)?))
    }
}

/// Orchestrator client bound to one callback base URL.
pub struct HttpNetwork {
    client: HttpClient,
    config: TransportConfig,
    authorization: Option<HeaderValue>,
}

impl HttpNetwork {
    /// Bind `client` to the orchestrator in `config`.
    ///
    /// # Errors
    /// Returns [`ExecutorError::InvalidConfig`] if the base URL is not an
    /// absolute URL or the credentials cannot form a header.
    pub fn new(client: HttpClient, config: TransportConfig) -> Result<Self, ExecutorError> {
        let uri: Uri = config.base_url.parse().map_err(|e| {
            ExecutorError::InvalidConfig(format!("base URL {:?}: {e}", config.base_url))
        })?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ExecutorError::InvalidConfig(format!(
                "base URL {:?} must be absolute",
                config.base_url
            )));
        }
        let authorization = config
            .authorization_header()
            .map(|value| {
                let mut header = HeaderValue::from_str(&value)
                    .map_err(|e| ExecutorError::InvalidConfig(format!("credentials: {e}")))?;
                header.set_sensitive(true);
                Ok::<_, ExecutorError>(header)
            })
            .transpose()?;
        Ok(Self { client, config, authorization })
    }

    /// The `Authorization` header sent with every call, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.authorization.as_ref()
    }

    async fn call<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Bytes, ExecutorError> {
        let target = format!("{}{path}", self.config.base_url);
        let uri: Uri = target
            .parse()
            .map_err(|e| ExecutorError::InvalidConfig(format!("URI {target}: {e}")))?;

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACCEPT, "application/json");
        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth.clone());
        }

        let body_bytes = match body {
            Some(b) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Bytes::from(
                    serde_json::to_vec(b)
                        .map_err(|e| ExecutorError::Protocol(format!("encode {path}: {e}")))?,
                )
            }
            None => Bytes::new(),
        };

        let req = builder
            .body(Full::new(body_bytes))
            .map_err(|e| ExecutorError::Transport(format!("build request: {e}")))?;

        let exchange = async {
            let resp = self
                .client
                .request(req)
                .await
                .map_err(|e| ExecutorError::Transport(format!("send {path}: {}", error_chain(&e))))?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ExecutorError::Transport(format!("read {path}: {}", error_chain(&e))))?
                .to_bytes();
            Ok::<_, ExecutorError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| ExecutorError::Timeout {
                path: path.to_owned(),
                after: self.config.timeout,
            })??;

        tracing::debug!(path, status = status.as_u16(), "orchestrator call");

        if !status.is_success() {
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                path: path.to_owned(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes)
    }

    async fn call_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ExecutorError> {
        let bytes = self.call(method, path, body).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ExecutorError::Protocol(format!("decode {path}: {e}")))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn claim_task(
        &self,
        task: &TaskRef,
        identity: &WorkerIdentity,
    ) -> Result<ClaimedTask, ExecutorError> {
        let request = ClaimRequest {
            id: &task.id,
            counter: task.counter,
            process_id: identity.process_id.as_str(),
            ttl: u64::try_from(identity.lease_ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let resp: ClaimResponse =
            self.call_json(Method::POST, "/tasks/claim", Some(&request)).await?;
        Ok(ClaimedTask::new(resp.kind, resp.promises.root.data))
    }

    async fn complete_task(&self, task: &TaskRef) -> Result<(), ExecutorError> {
        let request = CompleteRequest { id: &task.id, counter: task.counter };
        self.call(Method::POST, "/tasks/complete", Some(&request)).await?;
        Ok(())
    }

    async fn read_promise(&self, id: &str) -> Result<DurablePromise, ExecutorError> {
        self.call_json::<(), _>(Method::GET, &promise_path(id), None).await
    }

    async fn settle_promise(
        &self,
        id: &str,
        state: PromiseState,
        value: EncodedValue,
    ) -> Result<DurablePromise, ExecutorError> {
        let request = SettleRequest { state, value };
        self.call_json(Method::PATCH, &promise_path(id), Some(&request)).await
    }

    async fn create_callback(
        &self,
        promise_id: &str,
        root_promise_id: &str,
        timeout: i64,
        recv: &str,
    ) -> Result<CallbackOutcome, ExecutorError> {
        let request = CallbackRequest { root_promise_id, timeout, recv };
        let resp: CallbackResponse = self
            .call_json(Method::POST, &callback_path(promise_id), Some(&request))
            .await?;
        Ok(match resp.callback {
            Some(_) => CallbackOutcome::Registered,
            None => CallbackOutcome::AlreadySettled(resp.promise),
        })
    }
}
