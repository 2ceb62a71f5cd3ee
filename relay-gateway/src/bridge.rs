//! Execution bridge: turns one validated request into one ephemeral worker.
//!
//! Per request the bridge builds a fresh [`WorkerIdentity`], routes every
//! follow-up back to the gateway's own URL, points the transport at the
//! task's callback base, and runs the engine on its own tokio task. The
//! engine reports back through a oneshot channel, so the result is
//! delivered at most once and a panicking engine surfaces as a missing
//! status instead of taking the request down with it.
//!
//! State machine: `received → validated → dispatched → {completed |
//! suspended | failed}`. There is no retry; resumption arrives as a new
//! request.

use std::sync::Arc;
use std::time::Duration;

use relay_core::{Clock, Registry, RoutingAddresses, Task, WallClock, WorkerIdentity};
use relay_executor::{
    Connector, Credentials, Engine, EngineStatus, ExecutorError, Heartbeat, NoopHeartbeat,
    TransportConfig, WorkerContext,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::GatewayError;

/// An engine run in flight.
pub struct Dispatched {
    /// Resolves exactly once with the engine's verdict.
    pub completion: oneshot::Receiver<Result<EngineStatus, ExecutorError>>,
    handle: JoinHandle<()>,
}

/// Shared, read-only collaborators plus the per-request dispatch logic.
pub struct Bridge {
    registry: Arc<Registry>,
    engine: Arc<dyn Engine>,
    connector: Arc<dyn Connector>,
    credentials: Option<Credentials>,
    heartbeat: Arc<dyn Heartbeat>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl Bridge {
    /// Create a bridge over a frozen registry.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        engine: Arc<dyn Engine>,
        connector: Arc<dyn Connector>,
        credentials: Option<Credentials>,
        deadline: Duration,
    ) -> Self {
        Self {
            registry,
            engine,
            connector,
            credentials,
            heartbeat: Arc::new(NoopHeartbeat),
            clock: Arc::new(WallClock),
            deadline,
        }
    }

    /// Build the worker context for `task` and start the engine.
    ///
    /// # Errors
    /// Returns [`GatewayError::Handler`] if the transport cannot be built
    /// for the task's callback base URL.
    pub fn dispatch(
        &self,
        task: Task,
        identity: WorkerIdentity,
        routing: RoutingAddresses,
    ) -> Result<Dispatched, GatewayError> {
        let transport = TransportConfig::new(&task.callback_base, self.credentials.clone());
        let network = self
            .connector
            .connect(transport)
            .map_err(|e| GatewayError::Handler(e.to_string()))?;

        let span = tracing::info_span!(
            "worker",
            process_id = %identity.process_id,
            request_url = %routing.unicast,
        );
        let worker = WorkerContext::new(
            identity,
            routing,
            network,
            Arc::clone(&self.registry),
            Arc::clone(&self.heartbeat),
            Arc::clone(&self.clock),
        );

        let (tx, rx) = oneshot::channel();
        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(
            async move {
                let result = engine.process(task, worker).await;
                let _ = tx.send(result);
            }
            .instrument(span),
        );
        Ok(Dispatched { completion: rx, handle })
    }

    /// Run `task` as a fresh worker addressed at `request_url` and wait for
    /// its terminal state.
    ///
    /// # Errors
    /// - [`GatewayError::Handler`] if the worker context cannot be built.
    /// - [`GatewayError::Processing`] if the engine fails, never reports,
    ///   or misses the deadline.
    pub async fn process(
        &self,
        task: Task,
        request_url: &str,
    ) -> Result<EngineStatus, GatewayError> {
        let identity = WorkerIdentity::ephemeral();
        let routing = RoutingAddresses::self_addressed(request_url);
        tracing::debug!(
            process_id = %identity.process_id,
            kind = ?task.kind,
            callback_base = %task.callback_base,
            "dispatching task"
        );

        let Dispatched { completion, handle } = self.dispatch(task, identity, routing)?;
        match tokio::time::timeout(self.deadline, completion).await {
            Ok(Ok(Ok(status))) => Ok(status),
            Ok(Ok(Err(e))) => Err(GatewayError::processing(e.to_string())),
            Ok(Err(_)) => {
                Err(GatewayError::processing("engine finished without reporting a status"))
            }
            Err(_) => {
                handle.abort();
                Err(GatewayError::processing(format!(
                    "no completion within {}s",
                    self.deadline.as_secs()
                )))
            }
        }
    }
}
