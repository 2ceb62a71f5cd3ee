//! Task execution engine.
//!
//! Drives one claimed task to a terminal state:
//! 1. Claims the task for the worker identity
//! 2. Decodes the root promise into a function invocation
//! 3. Runs the function, re-running it while awaited promises settle
//!    during callback registration
//! 4. Settles the root promise or registers resume callbacks
//! 5. Completes the task
//!
//! Suspension is a normal outcome: the task is completed and the
//! orchestrator will dispatch a separate resume task later.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    codec, Clock, Context, FunctionError, Invocation, PromiseState, Registry, RoutingAddresses,
    Task, WorkerIdentity,
};
use serde_json::Value;

use crate::network::{CallbackOutcome, Network, NetworkPromises};
use crate::{ExecutorError, Heartbeat};

/// Upper bound on function re-runs within one task.
const MAX_ATTEMPTS: usize = 8;

/// Terminal state of one processed task.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    /// The root promise is settled; `value` is its value.
    Completed { value: Value },
    /// The function awaits promises; a resume task will follow.
    Suspended,
}

/// Everything the engine needs to act as one ephemeral worker.
#[non_exhaustive]
pub struct WorkerContext {
    pub identity: WorkerIdentity,
    pub routing: RoutingAddresses,
    pub network: Arc<dyn Network>,
    pub registry: Arc<Registry>,
    pub heartbeat: Arc<dyn Heartbeat>,
    pub clock: Arc<dyn Clock>,
}

impl WorkerContext {
    /// Assemble a worker context.
    #[must_use]
    pub fn new(
        identity: WorkerIdentity,
        routing: RoutingAddresses,
        network: Arc<dyn Network>,
        registry: Arc<Registry>,
        heartbeat: Arc<dyn Heartbeat>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { identity, routing, network, registry, heartbeat, clock }
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("identity", &self.identity)
            .field("routing", &self.routing)
            .finish_non_exhaustive()
    }
}

/// Processes tasks on behalf of an ephemeral worker.
///
/// # Cancel Safety
/// Not cancel safe. Dropping the future mid-flight leaves the task claimed
/// until its lease expires, after which the orchestrator re-dispatches it.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Drive `task` to completion or suspension.
    ///
    /// # Errors
    /// Returns [`ExecutorError`] on transport, protocol or lookup failures.
    async fn process(&self, task: Task, worker: WorkerContext)
        -> Result<EngineStatus, ExecutorError>;
}

/// Engine speaking the orchestrator's task and promise protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskEngine;

impl TaskEngine {
    /// Create an engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn run(
        task: &Task,
        worker: &WorkerContext,
        root: relay_core::DurablePromise,
    ) -> Result<EngineStatus, ExecutorError> {
        if root.state.is_settled() {
            tracing::debug!(root = %root.id, "root promise already settled");
            return Ok(EngineStatus::Completed { value: root.decoded_value()? });
        }

        let invocation = Invocation::decode(&root.param)?;
        let func = worker
            .registry
            .get(&invocation.func, invocation.version)
            .ok_or_else(|| ExecutorError::FunctionNotFound {
                name: invocation.func.clone(),
                version: invocation.version,
            })?;

        let ctx = Context::new(
            root.id.clone(),
            worker.identity.process_id.clone(),
            Arc::new(NetworkPromises(Arc::clone(&worker.network))),
            Arc::clone(&worker.clock),
        );

        tracing::info!(
            func = %invocation.func,
            version = invocation.version,
            kind = ?task.kind,
            root = %root.id,
            "running function"
        );

        for attempt in 1..=MAX_ATTEMPTS {
            let outcome = func.call(ctx.clone(), invocation.args.clone()).await;
            let (state, value) = match outcome {
                Ok(value) => (PromiseState::Resolved, value),
                Err(FunctionError::Failed(message)) => {
                    (PromiseState::Rejected, Value::String(message))
                }
                Err(FunctionError::Suspend { awaiting }) => {
                    if Self::register_callbacks(worker, &root, &awaiting).await? {
                        return Ok(EngineStatus::Suspended);
                    }
                    tracing::debug!(attempt, "awaited promise already settled, re-running");
                    continue;
                }
                Err(FunctionError::Core(e)) => return Err(e.into()),
                Err(other) => return Err(ExecutorError::Function(other.to_string())),
            };

            let settled = worker
                .network
                .settle_promise(&root.id, state, codec::encode(&value)?)
                .await?;
            return Ok(EngineStatus::Completed { value: settled.decoded_value()? });
        }

        Err(ExecutorError::Protocol(format!(
            "function did not settle or suspend after {MAX_ATTEMPTS} attempts"
        )))
    }

    /// Returns `true` when every awaited promise is still pending and a
    /// callback now routes its settlement back to this gateway.
    async fn register_callbacks(
        worker: &WorkerContext,
        root: &relay_core::DurablePromise,
        awaiting: &[String],
    ) -> Result<bool, ExecutorError> {
        let mut all_pending = true;
        for id in awaiting {
            let outcome = worker
                .network
                .create_callback(id, &root.id, root.timeout, &worker.routing.anycast_preference)
                .await?;
            if let CallbackOutcome::AlreadySettled(_) = outcome {
                all_pending = false;
            }
        }
        Ok(all_pending)
    }
}

#[async_trait]
impl Engine for TaskEngine {
    async fn process(
        &self,
        task: Task,
        worker: WorkerContext,
    ) -> Result<EngineStatus, ExecutorError> {
        let task_ref = task.reference()?;
        let process_id = &worker.identity.process_id;

        let claimed = worker.network.claim_task(&task_ref, &worker.identity).await?;
        tracing::debug!(task = %task_ref.id, %process_id, kind = ?claimed.kind, "task claimed");

        worker.heartbeat.start(process_id, worker.identity.lease_ttl);
        let outcome = Self::run(&task, &worker, claimed.root).await;
        worker.heartbeat.stop();
        let status = outcome?;

        worker.network.complete_task(&task_ref).await?;
        tracing::info!(task = %task_ref.id, %process_id, ?status, "task completed");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use relay_core::{from_fn, TaskKind, WallClock};
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryOrchestrator;
    use crate::NoopHeartbeat;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        let add = from_fn(|_ctx: Context, args: Vec<Value>| async move {
            Ok::<_, FunctionError>(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        });
        let wait = from_fn(|ctx: Context, _args: Vec<Value>| async move {
            let approval = ctx.promise("approval").await?;
            Ok::<_, FunctionError>(json!({"approved": approval}))
        });
        let fail = from_fn(|_ctx: Context, _args: Vec<Value>| async move {
            Err::<Value, _>(FunctionError::Failed("nope".to_owned()))
        });
        for (name, func) in [
            ("add", Arc::new(add) as Arc<dyn relay_core::DurableFunction>),
            ("wait", Arc::new(wait) as Arc<dyn relay_core::DurableFunction>),
            ("fail", Arc::new(fail) as Arc<dyn relay_core::DurableFunction>),
        ] {
            if let Err(e) = registry.add(func, name, 1) {
                panic!("registration failed: {e}");
            }
        }
        Arc::new(registry)
    }

    fn worker(orchestrator: &Arc<MemoryOrchestrator>, registry: &Arc<Registry>) -> WorkerContext {
        WorkerContext::new(
            WorkerIdentity::ephemeral(),
            RoutingAddresses::self_addressed("https://gw.example.com/run"),
            Arc::clone(orchestrator) as Arc<dyn Network>,
            Arc::clone(registry),
            Arc::new(NoopHeartbeat),
            Arc::new(WallClock),
        )
    }

    fn dispatch(orchestrator: &MemoryOrchestrator, func: &str, args: Vec<Value>) -> Task {
        let body = match orchestrator.dispatch("t1", "root", func, args) {
            Ok(b) => b,
            Err(e) => panic!("dispatch failed: {e}"),
        };
        Task::new(TaskKind::Invoke, body, "http://orchestrator")
    }

    #[tokio::test]
    async fn completed_function_resolves_root_and_completes_task() {
        let orchestrator = MemoryOrchestrator::new();
        let registry = registry();
        let task = dispatch(&orchestrator, "add", vec![json!(40), json!(2)]);

        let status = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(
            matches!(status, Ok(EngineStatus::Completed { ref value }) if *value == json!(42)),
            "expected completion with 42, got {status:?}"
        );
        let root = orchestrator.promise("root").map(|p| p.state);
        assert_eq!(root, Some(PromiseState::Resolved));
        assert!(orchestrator.is_completed("t1"), "task must be completed");
    }

    #[tokio::test]
    async fn pending_promise_suspends_and_routes_callback_to_gateway() {
        let orchestrator = MemoryOrchestrator::new();
        orchestrator.create_promise("approval");
        let registry = registry();
        let task = dispatch(&orchestrator, "wait", Vec::new());

        let status = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(matches!(status, Ok(EngineStatus::Suspended)), "got {status:?}");

        let callbacks = orchestrator.callbacks();
        assert_eq!(callbacks.len(), 1);
        assert_eq!(callbacks[0].promise_id, "approval");
        assert_eq!(callbacks[0].root_promise_id, "root");
        assert_eq!(callbacks[0].recv, "https://gw.example.com/run");
        assert_eq!(
            orchestrator.promise("root").map(|p| p.state),
            Some(PromiseState::Pending),
            "suspension must not settle the root"
        );
        assert!(orchestrator.is_completed("t1"), "suspended task is still completed");
    }

    #[tokio::test]
    async fn resume_after_settlement_completes() {
        let orchestrator = MemoryOrchestrator::new();
        orchestrator.create_promise("approval");
        let registry = registry();
        let task = dispatch(&orchestrator, "wait", Vec::new());
        let first = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(matches!(first, Ok(EngineStatus::Suspended)));

        if let Err(e) = orchestrator.resolve("approval", &json!(true)) {
            panic!("resolve failed: {e}");
        }
        let Some(body) = orchestrator.redispatch("t1") else {
            panic!("task vanished");
        };
        let resume = Task::new(TaskKind::Resume, body, "http://orchestrator");
        let second = TaskEngine::new().process(resume, worker(&orchestrator, &registry)).await;
        assert!(
            matches!(
                second,
                Ok(EngineStatus::Completed { ref value }) if *value == json!({"approved": true})
            ),
            "got {second:?}"
        );
        assert_eq!(orchestrator.claims().len(), 2, "each attempt claims with its own worker");
    }

    #[tokio::test]
    async fn failing_function_rejects_root_but_completes() {
        let orchestrator = MemoryOrchestrator::new();
        let registry = registry();
        let task = dispatch(&orchestrator, "fail", Vec::new());

        let status = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(
            matches!(status, Ok(EngineStatus::Completed { ref value }) if *value == json!("nope")),
            "got {status:?}"
        );
        assert_eq!(orchestrator.promise("root").map(|p| p.state), Some(PromiseState::Rejected));
    }

    #[tokio::test]
    async fn unknown_function_is_an_error_and_leaves_task_open() {
        let orchestrator = MemoryOrchestrator::new();
        let registry = registry();
        let task = dispatch(&orchestrator, "missing", Vec::new());

        let status = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(
            matches!(
                status,
                Err(ExecutorError::FunctionNotFound { ref name, .. }) if name == "missing"
            ),
            "got {status:?}"
        );
        assert!(!orchestrator.is_completed("t1"), "failed task must be left for lease expiry");
    }

    #[tokio::test]
    async fn malformed_task_body_fails_before_claiming() {
        let orchestrator = MemoryOrchestrator::new();
        let registry = registry();
        let task = Task::new(TaskKind::Invoke, json!({"nothing": "here"}), "http://orchestrator");

        let status = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(matches!(status, Err(ExecutorError::Core(_))), "got {status:?}");
        assert!(orchestrator.claims().is_empty(), "no claim without a task reference");
    }

    #[tokio::test]
    async fn double_claim_is_refused() {
        let orchestrator = MemoryOrchestrator::new();
        let registry = registry();
        let task = dispatch(&orchestrator, "add", vec![json!(1)]);

        let first = TaskEngine::new().process(task.clone(), worker(&orchestrator, &registry)).await;
        assert!(first.is_ok());
        let second = TaskEngine::new().process(task, worker(&orchestrator, &registry)).await;
        assert!(
            matches!(second, Err(ExecutorError::Status { status: 409, .. })),
            "stale task must not be claimed twice, got {second:?}"
        );
    }
}
