//! Value codec for durable promise payloads.
//!
//! Values travel as `{headers, data}` where `data` is the standard base64
//! encoding of the value's JSON text. A missing `data` field decodes to
//! `null`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::{promise::EncodedValue, CoreError};

/// Encode a JSON value into its wire form.
///
/// # Errors
/// Returns [`CoreError::Encoding`] if the value cannot be serialized.
pub fn encode(value: &Value) -> Result<EncodedValue, CoreError> {
    let text = serde_json::to_vec(value).map_err(|e| CoreError::Encoding(e.to_string()))?;
    Ok(EncodedValue { headers: None, data: Some(STANDARD.encode(text)) })
}

/// Decode a wire value back into JSON.
///
/// # Errors
/// Returns [`CoreError::Encoding`] if `data` is not valid base64 or does not
/// contain valid JSON.
pub fn decode(encoded: &EncodedValue) -> Result<Value, CoreError> {
    let Some(data) = encoded.data.as_deref() else {
        return Ok(Value::Null);
    };
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| CoreError::Encoding(format!("invalid base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| CoreError::Encoding(format!("invalid JSON: {e}")))
}
