//! The unit of work dispatched to a worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Whether the task starts a computation or resumes a suspended one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Invoke,
    Resume,
}

impl TaskKind {
    /// Parses the wire spelling (`"invoke"` / `"resume"`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "invoke" => Some(Self::Invoke),
            "resume" => Some(Self::Resume),
            _ => None,
        }
    }
}

/// A task owned by exactly one inbound request.
///
/// `body` is opaque to the gateway; `callback_base` is the orchestrator's
/// address and is never the gateway's own URL.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Task {
    pub kind: TaskKind,
    pub body: Value,
    pub callback_base: String,
}

impl Task {
    /// Create a task.
    #[must_use]
    pub fn new(kind: TaskKind, body: Value, callback_base: impl Into<String>) -> Self {
        Self { kind, body, callback_base: callback_base.into() }
    }

    /// Extracts the `{id, counter}` reference used to claim and complete.
    ///
    /// # Errors
    /// Returns [`CoreError::MalformedTask`] if the body lacks either field.
    pub fn reference(&self) -> Result<TaskRef, CoreError> {
        TaskRef::deserialize(&self.body).map_err(|e| CoreError::MalformedTask(e.to_string()))
    }
}

/// Claim coordinates of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub counter: u64,
}
