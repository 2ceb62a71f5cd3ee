//! Functions the stock binary registers.
//!
//! These give a freshly deployed gateway something to run so the full
//! claim / settle / suspend cycle can be exercised against a real
//! orchestrator.

use relay_core::{from_fn, Context, CoreError, FunctionError};
use serde_json::{json, Value};

use crate::gateway::{Gateway, RegisterOptions};

/// Register `echo`, `add` and `await`.
///
/// - `echo(args...)` returns its arguments as an array.
/// - `add(a, b, ...)` returns the integer sum.
/// - `await(id)` suspends until promise `id` settles, then returns its value.
///
/// # Errors
/// Returns [`CoreError::DuplicateFunction`] if any name is already taken.
pub fn register_builtins(gateway: &mut Gateway) -> Result<(), CoreError> {
    gateway.register(
        Some("echo"),
        from_fn(|_ctx: Context, args: Vec<Value>| async move {
            Ok::<_, FunctionError>(Value::Array(args))
        }),
        RegisterOptions::default(),
    )?;

    gateway.register(
        Some("add"),
        from_fn(|_ctx: Context, args: Vec<Value>| async move {
            let mut sum: i64 = 0;
            for arg in &args {
                let n = arg
                    .as_i64()
                    .ok_or_else(|| FunctionError::Failed(format!("add: {arg} is not an integer")))?;
                sum = sum
                    .checked_add(n)
                    .ok_or_else(|| FunctionError::Failed("add: overflow".to_owned()))?;
            }
            Ok::<_, FunctionError>(json!(sum))
        }),
        RegisterOptions::default(),
    )?;

    gateway.register(
        Some("await"),
        from_fn(|ctx: Context, args: Vec<Value>| async move {
            let id = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| FunctionError::Failed("await: expected a promise id".to_owned()))?;
            ctx.promise(id).await
        }),
        RegisterOptions::default(),
    )?;

    Ok(())
}
