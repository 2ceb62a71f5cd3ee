//! HTTP gateway that lets serverless compute act as a durable-execution
//! worker.
//!
//! Accepts one `invoke` or `resume` task per POST, runs it as a fresh
//! ephemeral worker and answers with the task's terminal state.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod bridge;
pub mod builtin;
pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

pub use gateway::{Gateway, RegisterOptions};
