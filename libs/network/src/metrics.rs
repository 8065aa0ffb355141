//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking link and frame activity.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Frames handed to a peer writer.
    pub frames_out: AtomicU64,
    /// Frames read off peer links (including undecodable ones).
    pub frames_in: AtomicU64,
    /// Forwards dropped because no peer hosts the destination.
    pub no_route_drops: AtomicU64,
    /// Inbound links dropped for presenting the wrong key.
    pub auth_rejects: AtomicU64,
    /// Links that completed the hello handshake.
    pub links_opened: AtomicU64,
    /// Links torn down after handshake.
    pub links_closed: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub frames_out: u64,
    pub frames_in: u64,
    pub no_route_drops: u64,
    pub auth_rejects: u64,
    pub links_opened: u64,
    pub links_closed: u64,
}

impl EngineMetrics {
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            frames_out: self.frames_out.load(Ordering::Relaxed),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            no_route_drops: self.no_route_drops.load(Ordering::Relaxed),
            auth_rejects: self.auth_rejects.load(Ordering::Relaxed),
            links_opened: self.links_opened.load(Ordering::Relaxed),
            links_closed: self.links_closed.load(Ordering::Relaxed),
        }
    }
}
