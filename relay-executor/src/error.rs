//! Error types for the executor crate.

use std::time::Duration;

use relay_core::CoreError;

/// Errors that can occur while driving a task through the orchestrator.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// Transport configuration is unusable (bad base URL, bad credentials).
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),

    /// Connection or I/O failure talking to the orchestrator.
    #[error("transport failed: {0}")]
    Transport(String),

    /// An outbound call exceeded the transport timeout.
    #[error("orchestrator call {path} timed out after {}s", .after.as_secs())]
    Timeout { path: String, after: Duration },

    /// The orchestrator answered with a non-success status.
    #[error("HTTP {status} from {path}: {body}")]
    Status { status: u16, path: String, body: String },

    /// The orchestrator answered with something the engine cannot use.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The root promise names a function that is not registered.
    #[error("function '{name}' version {version} is not registered")]
    FunctionNotFound { name: String, version: u32 },

    /// A function stopped in a way the engine does not recognise.
    #[error("function failed: {0}")]
    Function(String),

    /// Error from the core types (encoding, malformed task).
    #[error(transparent)]
    Core(#[from] CoreError),
}
