//! Lease renewal seam.

use std::time::Duration;

use relay_core::ProcessId;

/// Keeps a worker's lease alive while it runs.
pub trait Heartbeat: Send + Sync {
    /// Begin renewing the lease held by `process_id`.
    fn start(&self, process_id: &ProcessId, lease_ttl: Duration);

    /// Stop renewing.
    fn stop(&self);
}

/// Heartbeat that never renews.
///
/// The gateway finishes well inside one lease, so nothing is renewed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHeartbeat;

impl Heartbeat for NoopHeartbeat {
    fn start(&self, process_id: &ProcessId, lease_ttl: Duration) {
        tracing::trace!(%process_id, lease_ms = lease_ttl.as_millis(), "heartbeat disabled");
    }

    fn stop(&self) {}
}
