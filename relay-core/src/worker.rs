//! Per-request worker identity and self-routing addresses.

use std::time::Duration;

use crate::id::ProcessId;

/// How long the orchestrator lets one worker hold a claimed task.
pub const LEASE_TTL: Duration = Duration::from_secs(30);

/// Identity of the ephemeral worker serving one request.
///
/// Never pooled, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct WorkerIdentity {
    pub process_id: ProcessId,
    pub lease_ttl: Duration,
}

impl WorkerIdentity {
    /// Builds a fresh identity with the standard lease.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self { process_id: ProcessId::generate(), lease_ttl: LEASE_TTL }
    }
}

/// Addresses the orchestrator uses to route follow-up work to this worker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RoutingAddresses {
    pub unicast: String,
    pub anycast_preference: String,
    pub anycast_no_preference: String,
}

impl RoutingAddresses {
    /// Routes every kind of follow-up back to `url`, the gateway's own
    /// externally visible address.
    #[must_use]
    pub fn self_addressed(url: &str) -> Self {
        Self {
            unicast: url.to_owned(),
            anycast_preference: url.to_owned(),
            anycast_no_preference: url.to_owned(),
        }
    }
}
