//! In-process orchestrator for tests.
//!
//! Holds promises and tasks in memory and records every transport config it
//! is connected with, so callers can assert on what a real transport would
//! have been told.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use relay_core::{
    codec, DurablePromise, EncodedValue, PromiseState, TaskKind, TaskRef, WorkerIdentity,
};
use serde_json::{json, Value};

use crate::network::{CallbackOutcome, ClaimedTask, Connector, Network};
use crate::{ExecutorError, TransportConfig};

#[derive(Debug)]
struct MemoryTask {
    root_id: String,
    counter: u64,
    kind: TaskKind,
    claimed_by: Option<String>,
    completed: bool,
}

/// A resume callback registered by a suspended worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredCallback {
    pub promise_id: String,
    pub root_promise_id: String,
    pub recv: String,
}

#[derive(Debug, Default)]
struct State {
    promises: HashMap<String, DurablePromise>,
    tasks: HashMap<String, MemoryTask>,
    callbacks: Vec<RegisteredCallback>,
    configs: Vec<TransportConfig>,
    claims: Vec<String>,
}

/// Orchestrator double implementing both [`Connector`] and [`Network`].
#[derive(Debug, Default)]
pub struct MemoryOrchestrator {
    state: Mutex<State>,
}

impl MemoryOrchestrator {
    /// Create an empty orchestrator.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a pending root promise invoking `func(args)` and an unclaimed
    /// invoke task for it. Returns the task body a dispatcher would send.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] if the invocation cannot be encoded.
    pub fn dispatch(
        &self,
        task_id: &str,
        root_id: &str,
        func: &str,
        args: Vec<Value>,
    ) -> Result<Value, ExecutorError> {
        let param = codec::encode(&json!({"func": func, "args": args, "version": 0}))?;
        let mut state = self.lock();
        state.promises.insert(
            root_id.to_owned(),
            DurablePromise {
                id: root_id.to_owned(),
                state: PromiseState::Pending,
                param,
                value: EncodedValue::default(),
                timeout: i64::MAX,
                tags: None,
            },
        );
        state.tasks.insert(
            task_id.to_owned(),
            MemoryTask {
                root_id: root_id.to_owned(),
                counter: 1,
                kind: TaskKind::Invoke,
                claimed_by: None,
                completed: false,
            },
        );
        Ok(json!({"id": task_id, "counter": 1}))
    }

    /// Re-open a completed task as a resume task, as the orchestrator does
    /// when an awaited promise settles. Returns the new task body.
    #[must_use]
    pub fn redispatch(&self, task_id: &str) -> Option<Value> {
        let mut state = self.lock();
        let task = state.tasks.get_mut(task_id)?;
        task.counter += 1;
        task.kind = TaskKind::Resume;
        task.claimed_by = None;
        task.completed = false;
        Some(json!({"id": task_id, "counter": task.counter}))
    }

    /// Create a pending promise a function can await.
    pub fn create_promise(&self, id: &str) {
        self.lock().promises.insert(
            id.to_owned(),
            DurablePromise {
                id: id.to_owned(),
                state: PromiseState::Pending,
                param: EncodedValue::default(),
                value: EncodedValue::default(),
                timeout: i64::MAX,
                tags: None,
            },
        );
    }

    /// Resolve a promise from outside the worker.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Core`] if the value cannot be encoded.
    pub fn resolve(&self, id: &str, value: &Value) -> Result<(), ExecutorError> {
        let encoded = codec::encode(value)?;
        if let Some(promise) = self.lock().promises.get_mut(id) {
            promise.state = PromiseState::Resolved;
            promise.value = encoded;
        }
        Ok(())
    }

    /// Current state of a promise.
    #[must_use]
    pub fn promise(&self, id: &str) -> Option<DurablePromise> {
        self.lock().promises.get(id).cloned()
    }

    /// Whether the task has been completed by a worker.
    #[must_use]
    pub fn is_completed(&self, task_id: &str) -> bool {
        self.lock().tasks.get(task_id).is_some_and(|t| t.completed)
    }

    /// Callbacks registered so far.
    #[must_use]
    pub fn callbacks(&self) -> Vec<RegisteredCallback> {
        self.lock().callbacks.clone()
    }

    /// Transport configs this orchestrator was connected with.
    #[must_use]
    pub fn configs(&self) -> Vec<TransportConfig> {
        self.lock().configs.clone()
    }

    /// Process ids that claimed tasks, in claim order.
    #[must_use]
    pub fn claims(&self) -> Vec<String> {
        self.lock().claims.clone()
    }
}

fn not_found(path: String) -> ExecutorError {
    ExecutorError::Status { status: 404, path, body: "not found".to_owned() }
}

impl Connector for Arc<MemoryOrchestrator> {
    fn connect(&self, config: TransportConfig) -> Result<Arc<dyn Network>, ExecutorError> {
        self.lock().configs.push(config);
        Ok(self.clone())
    }
}

#[async_trait]
impl Network for MemoryOrchestrator {
    async fn claim_task(
        &self,
        task: &TaskRef,
        identity: &WorkerIdentity,
    ) -> Result<ClaimedTask, ExecutorError> {
        let mut state = self.lock();
        let path = format!("/tasks/claim/{}", task.id);
        let entry = state.tasks.get_mut(&task.id).ok_or_else(|| not_found(path.clone()))?;
        if entry.counter != task.counter || entry.completed || entry.claimed_by.is_some() {
            return Err(ExecutorError::Status { status: 409, path, body: "conflict".to_owned() });
        }
        entry.claimed_by = Some(identity.process_id.to_string());
        let kind = entry.kind;
        let root_id = entry.root_id.clone();
        state.claims.push(identity.process_id.to_string());
        let root = state.promises.get(&root_id).cloned().ok_or_else(|| not_found(path))?;
        Ok(ClaimedTask::new(kind, root))
    }

    async fn complete_task(&self, task: &TaskRef) -> Result<(), ExecutorError> {
        let mut state = self.lock();
        let entry = state
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| not_found(format!("/tasks/complete/{}", task.id)))?;
        entry.completed = true;
        Ok(())
    }

    async fn read_promise(&self, id: &str) -> Result<DurablePromise, ExecutorError> {
        self.promise(id).ok_or_else(|| not_found(format!("/promises/{id}")))
    }

    async fn settle_promise(
        &self,
        id: &str,
        state: PromiseState,
        value: EncodedValue,
    ) -> Result<DurablePromise, ExecutorError> {
        let mut guard = self.lock();
        let promise = guard
            .promises
            .get_mut(id)
            .ok_or_else(|| not_found(format!("/promises/{id}")))?;
        if !promise.state.is_settled() {
            promise.state = state;
            promise.value = value;
        }
        Ok(promise.clone())
    }

    async fn create_callback(
        &self,
        promise_id: &str,
        root_promise_id: &str,
        _timeout: i64,
        recv: &str,
    ) -> Result<CallbackOutcome, ExecutorError> {
        let mut state = self.lock();
        let promise = state
            .promises
            .get(promise_id)
            .cloned()
            .ok_or_else(|| not_found(format!("/promises/callback/{promise_id}")))?;
        if promise.state.is_settled() {
            return Ok(CallbackOutcome::AlreadySettled(promise));
        }
        state.callbacks.push(RegisteredCallback {
            promise_id: promise_id.to_owned(),
            root_promise_id: root_promise_id.to_owned(),
            recv: recv.to_owned(),
        });
        Ok(CallbackOutcome::Registered)
    }
}
