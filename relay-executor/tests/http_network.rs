//! Integration test: the HTTP transport against a local mock orchestrator.
//!
//! Verifies the wire shape of claim/complete calls, that basic-auth is sent
//! on every call exactly when credentials are configured, and that the
//! per-call timeout and non-success statuses surface as errors. Promise ids
//! travel as single percent-encoded path segments, and `https` bases go
//! through the TLS connector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use relay_core::{TaskKind, TaskRef, WorkerIdentity};
use relay_executor::{
    Connector, Credentials, ExecutorError, HttpTransport, Network, TransportConfig,
};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Recorded {
    auth: Arc<Mutex<Vec<Option<String>>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
    promise_ids: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    fn record(&self, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.auth.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(auth);
        self.bodies.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(body);
    }

    fn auth(&self) -> Vec<Option<String>> {
        self.auth.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn promise_ids(&self) -> Vec<String> {
        self.promise_ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

async fn claim(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.record(&headers, body);
    Json(json!({
        "type": "invoke",
        "promises": {
            "root": {"id": "root", "data": {"id": "root", "state": "PENDING", "timeout": 99}}
        }
    }))
}

async fn complete(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.record(&headers, body);
    Json(json!({}))
}

async fn read_promise(State(rec): State<Recorded>, Path(id): Path<String>) -> Json<Value> {
    if id == "slow" {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    rec.promise_ids
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(id.clone());
    Json(json!({"id": id, "state": "PENDING"}))
}

async fn spawn_orchestrator() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/tasks/claim", post(claim))
        .route("/api/tasks/complete", post(complete))
        .route("/api/promises/{id}", get(read_promise))
        .with_state(recorded.clone());

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) => panic!("failed to bind mock orchestrator: {e}"),
    };
    let addr = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => panic!("failed to read listener addr: {e}"),
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api/"), recorded)
}

fn task_ref() -> TaskRef {
    TaskRef { id: "t1".to_owned(), counter: 2 }
}

#[tokio::test]
async fn every_call_carries_basic_auth_when_configured() {
    let (base, recorded) = spawn_orchestrator().await;
    let config = TransportConfig::new(&base, Some(Credentials::new("user", "pass")));
    let network = match HttpTransport::new().connect(config) {
        Ok(n) => n,
        Err(e) => panic!("connect failed: {e}"),
    };

    let identity = WorkerIdentity::ephemeral();
    let claimed = match network.claim_task(&task_ref(), &identity).await {
        Ok(c) => c,
        Err(e) => panic!("claim failed: {e}"),
    };
    assert_eq!(claimed.kind, TaskKind::Invoke);
    assert_eq!(claimed.root.id, "root");
    assert_eq!(claimed.root.timeout, 99);

    if let Err(e) = network.complete_task(&task_ref()).await {
        panic!("complete failed: {e}");
    }

    let expected = Some("Basic dXNlcjpwYXNz".to_owned());
    assert_eq!(recorded.auth(), vec![expected.clone(), expected], "both calls must authenticate");

    let bodies = recorded.bodies();
    assert_eq!(bodies[0]["id"], "t1");
    assert_eq!(bodies[0]["counter"], 2);
    assert_eq!(bodies[0]["processId"], identity.process_id.as_str());
    assert_eq!(bodies[0]["ttl"], 30_000, "lease is sent in milliseconds");
    assert_eq!(bodies[1], json!({"id": "t1", "counter": 2}));
}

#[tokio::test]
async fn no_auth_header_without_credentials() {
    let (base, recorded) = spawn_orchestrator().await;
    let network = match HttpTransport::new().connect(TransportConfig::new(&base, None)) {
        Ok(n) => n,
        Err(e) => panic!("connect failed: {e}"),
    };
    if let Err(e) = network.complete_task(&task_ref()).await {
        panic!("complete failed: {e}");
    }
    assert_eq!(recorded.auth(), vec![None], "no credentials, no Authorization header");
}

#[tokio::test]
async fn slow_orchestrator_hits_transport_timeout() {
    let (base, _recorded) = spawn_orchestrator().await;
    let config = TransportConfig::new(&base, None).with_timeout(Duration::from_millis(100));
    let network = match HttpTransport::new().connect(config) {
        Ok(n) => n,
        Err(e) => panic!("connect failed: {e}"),
    };
    let result = network.read_promise("slow").await;
    assert!(
        matches!(result, Err(ExecutorError::Timeout { .. })),
        "expected timeout, got {result:?}"
    );
}

#[tokio::test]
async fn unknown_route_surfaces_status_error() {
    let (base, _recorded) = spawn_orchestrator().await;
    let network = match HttpTransport::new().connect(TransportConfig::new(&base, None)) {
        Ok(n) => n,
        Err(e) => panic!("connect failed: {e}"),
    };
    let result = network
        .create_callback("p", "root", 0, "https://gw.example.com/run")
        .await;
    assert!(
        matches!(result, Err(ExecutorError::Status { status: 404, .. })),
        "expected 404, got {result:?}"
    );
}

#[tokio::test]
async fn promise_ids_with_reserved_characters_stay_one_segment() {
    let (base, recorded) = spawn_orchestrator().await;
    let network = match HttpTransport::new().connect(TransportConfig::new(&base, None)) {
        Ok(n) => n,
        Err(e) => panic!("connect failed: {e}"),
    };
    for id in ["order 42", "a?b", "x#y/z"] {
        let promise = match network.read_promise(id).await {
            Ok(p) => p,
            Err(e) => panic!("read of {id:?} failed: {e}"),
        };
        assert_eq!(promise.id, id, "orchestrator must see the id unchanged");
    }
    assert_eq!(recorded.promise_ids(), vec!["order 42", "a?b", "x#y/z"]);
}

#[tokio::test]
async fn https_base_opens_a_tcp_connection() {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) => panic!("failed to bind listener: {e}"),
    };
    let addr = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => panic!("failed to read listener addr: {e}"),
    };
    let accepted = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&accepted);
    tokio::spawn(async move {
        // Not a TLS server: accept, then hang up so the handshake fails.
        if let Ok((stream, _)) = listener.accept().await {
            seen.store(true, Ordering::SeqCst);
            drop(stream);
        }
    });

    let config = TransportConfig::new(&format!("https://{addr}/x"), None)
        .with_timeout(Duration::from_secs(5));
    let network = match HttpTransport::new().connect(config) {
        Ok(n) => n,
        Err(e) => panic!("connect failed: {e}"),
    };
    let result = network.claim_task(&task_ref(), &WorkerIdentity::ephemeral()).await;

    assert!(accepted.load(Ordering::SeqCst), "https base must reach the TCP listener");
    match result {
        Err(ExecutorError::Transport(message)) => {
            assert!(
                message.starts_with("send /tasks/claim: client error (Connect): "),
                "transport error must carry its cause, got {message:?}"
            );
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
}
