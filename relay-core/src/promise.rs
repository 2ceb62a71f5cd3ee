//! Durable promise wire types shared by the engine and functions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{codec, CoreError};

/// A value as it travels on the wire: optional headers plus base64 data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Settlement state of a durable promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromiseState {
    Pending,
    Resolved,
    Rejected,
    RejectedCanceled,
    RejectedTimedout,
}

impl PromiseState {
    /// Returns `true` once the promise can no longer change.
    #[must_use]
    pub fn is_settled(self) -> bool {
        self != Self::Pending
    }

    /// Returns `true` for any of the rejected variants.
    #[must_use]
    pub fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected | Self::RejectedCanceled | Self::RejectedTimedout)
    }
}

/// A durable promise as stored by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurablePromise {
    pub id: String,
    pub state: PromiseState,
    #[serde(default)]
    pub param: EncodedValue,
    #[serde(default)]
    pub value: EncodedValue,
    /// Absolute expiry in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timeout: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

impl DurablePromise {
    /// Decodes the settled value.
    ///
    /// # Errors
    /// Returns [`CoreError::Encoding`] if the stored value is malformed.
    pub fn decoded_value(&self) -> Result<Value, CoreError> {
        codec::decode(&self.value)
    }
}

/// The call a root promise asks the worker to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub func: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// `0` selects the latest registered version.
    #[serde(default)]
    pub version: u32,
}

impl Invocation {
    /// Decodes an invocation from a root promise `param`.
    ///
    /// # Errors
    /// Returns [`CoreError::Encoding`] if the param is not an encoded
    /// `{func, args, version}` object.
    pub fn decode(param: &EncodedValue) -> Result<Self, CoreError> {
        let value = codec::decode(param)?;
        serde_json::from_value(value).map_err(|e| {
            CoreError::Encoding(format!("root promise param is not an invocation: {e}"))
        })
    }
}
