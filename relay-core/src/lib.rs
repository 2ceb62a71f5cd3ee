//! Core types for the relay durable-execution worker gateway.
//!
//! Defines the per-request worker model (task, identity, routing), the
//! durable promise wire types and value codec, and the versioned function
//! registry that the execution engine resolves invocations against.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod codec;
pub mod error;
pub mod function;
pub mod id;
pub mod promise;
pub mod registry;
pub mod task;
pub mod worker;

pub use clock::{Clock, WallClock};
pub use error::CoreError;
pub use function::{from_fn, Context, DurableFunction, FnFunction, FunctionError, PromiseSource};
pub use id::ProcessId;
pub use promise::{DurablePromise, EncodedValue, Invocation, PromiseState};
pub use registry::Registry;
pub use task::{Task, TaskKind, TaskRef};
pub use worker::{RoutingAddresses, WorkerIdentity, LEASE_TTL};
