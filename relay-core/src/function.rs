//! Durable function authoring surface.
//!
//! A function receives a [`Context`] and its decoded arguments. Awaiting a
//! durable promise through [`Context::promise`] either yields the settled
//! value or short-circuits the function with [`FunctionError::Suspend`],
//! which the engine turns into a suspension of the whole task.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{clock::Clock, id::ProcessId, promise::DurablePromise, CoreError};

/// Ways a durable function can stop without producing a value.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FunctionError {
    /// The function awaits promises that are still pending.
    #[error("suspended awaiting {}", .awaiting.join(", "))]
    Suspend { awaiting: Vec<String> },

    /// The function failed; the root promise is rejected with this message.
    #[error("{0}")]
    Failed(String),

    /// Infrastructure failure while the function was running.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Read access to durable promises, provided by the engine's transport.
#[async_trait]
pub trait PromiseSource: Send + Sync {
    /// Fetch the current state of a promise.
    ///
    /// # Errors
    /// Returns [`CoreError::PromiseSource`] if the promise cannot be read.
    async fn read_promise(&self, id: &str) -> Result<DurablePromise, CoreError>;
}

/// Execution context handed to a durable function.
///
/// Cheap to clone; all clones refer to the same invocation.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    root_id: String,
    process_id: ProcessId,
    promises: Arc<dyn PromiseSource>,
    clock: Arc<dyn Clock>,
}

impl Context {
    /// Create a context for the invocation rooted at `root_id`.
    #[must_use]
    pub fn new(
        root_id: impl Into<String>,
        process_id: ProcessId,
        promises: Arc<dyn PromiseSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner { root_id: root_id.into(), process_id, promises, clock }),
        }
    }

    /// Id of the root promise this invocation settles.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.root_id
    }

    /// Worker currently running the invocation.
    #[must_use]
    pub fn process_id(&self) -> &ProcessId {
        &self.inner.process_id
    }

    /// Current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Await a durable promise.
    ///
    /// # Errors
    /// - [`FunctionError::Suspend`] while the promise is pending.
    /// - [`FunctionError::Failed`] if it was rejected, carrying its value.
    /// - [`FunctionError::Core`] if it cannot be read or decoded.
    pub async fn promise(&self, id: &str) -> Result<Value, FunctionError> {
        let promise = self.inner.promises.read_promise(id).await?;
        if !promise.state.is_settled() {
            return Err(FunctionError::Suspend { awaiting: vec![promise.id] });
        }
        let value = promise.decoded_value()?;
        if promise.state.is_rejected() {
            return Err(FunctionError::Failed(match value {
                Value::String(s) => s,
                other => other.to_string(),
            }));
        }
        Ok(value)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("root_id", &self.inner.root_id)
            .field("process_id", &self.inner.process_id)
            .finish_non_exhaustive()
    }
}

/// A function the engine can invoke by name and version.
#[async_trait]
pub trait DurableFunction: Send + Sync {
    /// Run the function.
    ///
    /// # Errors
    /// See [`FunctionError`].
    async fn call(&self, ctx: Context, args: Vec<Value>) -> Result<Value, FunctionError>;

    /// Name used when the function is registered without an explicit one.
    fn name(&self) -> Option<&str> {
        None
    }
}

/// Adapter turning an async closure into a [`DurableFunction`].
pub struct FnFunction<F> {
    f: F,
}

/// Wrap an async closure as a [`DurableFunction`].
pub fn from_fn<F, Fut>(f: F) -> FnFunction<F>
where
    F: Fn(Context, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
{
    FnFunction { f }
}

#[async_trait]
impl<F, Fut> DurableFunction for FnFunction<F>
where
    F: Fn(Context, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
{
    async fn call(&self, ctx: Context, args: Vec<Value>) -> Result<Value, FunctionError> {
        (self.f)(ctx, args).await
    }
}
