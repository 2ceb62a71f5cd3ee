use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifies one ephemeral worker for the lifetime of a single request.
///
/// Format: `pid-<seq><suffix>` where `seq` is a process-local hex counter
/// and `suffix` is eight random hex characters. Uniqueness only has to hold
/// within a lease window, so the token stays short.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProcessId(pub String);

impl ProcessId {
    /// Generates a fresh process id.
    #[must_use]
    pub fn generate() -> Self {
        let seq = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("pid-{seq:x}{}", &random[..8]))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
