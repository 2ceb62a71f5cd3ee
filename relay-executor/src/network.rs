//! Orchestrator transport abstraction.
//!
//! Allows swapping the HTTP transport for an in-memory orchestrator without
//! changing the engine.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    CoreError, DurablePromise, EncodedValue, PromiseSource, PromiseState, TaskKind, TaskRef,
    WorkerIdentity,
};

use crate::{ExecutorError, TransportConfig};

/// A task the orchestrator handed to this worker.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClaimedTask {
    pub kind: TaskKind,
    /// Promise the invocation settles.
    pub root: DurablePromise,
}

impl ClaimedTask {
    /// Create a claimed task.
    #[must_use]
    pub fn new(kind: TaskKind, root: DurablePromise) -> Self {
        Self { kind, root }
    }
}

/// Result of registering a resume callback on a promise.
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// The orchestrator will dispatch a resume task once the promise settles.
    Registered,
    /// The promise settled before the callback could be registered.
    AlreadySettled(DurablePromise),
}

/// Calls the engine makes against the orchestrator.
///
/// Implementations must be `Send + Sync`; one instance serves one request.
#[async_trait]
pub trait Network: Send + Sync {
    /// Claim `task` for the worker described by `identity`.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Status`] if the claim is refused.
    async fn claim_task(
        &self,
        task: &TaskRef,
        identity: &WorkerIdentity,
    ) -> Result<ClaimedTask, ExecutorError>;

    /// Mark `task` complete, releasing the lease.
    ///
    /// # Errors
    /// Returns a transport or status error if the orchestrator refuses.
    async fn complete_task(&self, task: &TaskRef) -> Result<(), ExecutorError>;

    /// Read a promise.
    ///
    /// # Errors
    /// Returns a transport or status error if the promise cannot be read.
    async fn read_promise(&self, id: &str) -> Result<DurablePromise, ExecutorError>;

    /// Settle a promise and return its stored form.
    ///
    /// # Errors
    /// Returns a transport or status error if the orchestrator refuses.
    async fn settle_promise(
        &self,
        id: &str,
        state: PromiseState,
        value: EncodedValue,
    ) -> Result<DurablePromise, ExecutorError>;

    /// Ask the orchestrator to send a resume task to `recv` once
    /// `promise_id` settles.
    ///
    /// # Errors
    /// Returns a transport or status error if the orchestrator refuses.
    async fn create_callback(
        &self,
        promise_id: &str,
        root_promise_id: &str,
        timeout: i64,
        recv: &str,
    ) -> Result<CallbackOutcome, ExecutorError>;
}

/// Builds a [`Network`] for one request's transport configuration.
pub trait Connector: Send + Sync {
    /// Connect to the orchestrator described by `config`.
    ///
    /// # Errors
    /// Returns [`ExecutorError::InvalidConfig`] if the config is unusable.
    fn connect(&self, config: TransportConfig) -> Result<Arc<dyn Network>, ExecutorError>;
}

/// Exposes a [`Network`] as the promise source functions read through.
pub struct NetworkPromises(pub Arc<dyn Network>);

#[async_trait]
impl PromiseSource for NetworkPromises {
    async fn read_promise(&self, id: &str) -> Result<DurablePromise, CoreError> {
        self.0
            .read_promise(id)
            .await
            .map_err(|e| CoreError::PromiseSource(e.to_string()))
    }
}
