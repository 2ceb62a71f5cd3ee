//! Execution engine and orchestrator transport for the relay gateway.
//!
//! Claims a dispatched task, runs the registered durable function, settles
//! the root promise and reports whether the task completed or suspended.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod engine;
pub mod error;
pub mod heartbeat;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod network;

pub use config::{Credentials, TransportConfig, TRANSPORT_TIMEOUT};
pub use engine::{Engine, EngineStatus, TaskEngine, WorkerContext};
pub use error::ExecutorError;
pub use heartbeat::{Heartbeat, NoopHeartbeat};
pub use http::{HttpNetwork, HttpTransport};
pub use network::{CallbackOutcome, ClaimedTask, Connector, Network, NetworkPromises};
