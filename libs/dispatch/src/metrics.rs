//! Dispatcher counters.
//!
//! Routing decisions and fault paths are observable here; tests use the
//! snapshot to verify that local sends never frame and remote sends
//! always do.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Sends that resolved to a local mailbox.
    pub local_sends: AtomicU64,
    /// Sends that were framed and redirected to the bridge.
    pub remote_sends: AtomicU64,
    /// Messages consumed by worker drains.
    pub messages_drained: AtomicU64,
    /// Cycle timer ticks injected.
    pub timer_fires: AtomicU64,
    /// Payloads dropped at the send boundary by a schema check.
    pub schema_rejects: AtomicU64,
    /// Pending-queue pushes that failed (dedup invariant breach).
    pub pending_overflows: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub local_sends: u64,
    pub remote_sends: u64,
    pub messages_drained: u64,
    pub timer_fires: u64,
    pub schema_rejects: u64,
    pub pending_overflows: u64,
}

impl DispatchMetrics {
    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            local_sends: self.local_sends.load(Ordering::Relaxed),
            remote_sends: self.remote_sends.load(Ordering::Relaxed),
            messages_drained: self.messages_drained.load(Ordering::Relaxed),
            timer_fires: self.timer_fires.load(Ordering::Relaxed),
            schema_rejects: self.schema_rejects.load(Ordering::Relaxed),
            pending_overflows: self.pending_overflows.load(Ordering::Relaxed),
        }
    }
}
