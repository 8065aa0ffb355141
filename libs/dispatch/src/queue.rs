//! The bounded pending queue.
//!
//! Holds ids of services that have unprocessed mail. Capacity is sized to
//! the maximum number of distinct ids, so with the per-service pending
//! flag deduplicating entries a push can only fail if that invariant is
//! broken; the caller treats it as an internal fault.
//!
//! `pop` blocks but is interruptible: it also selects on the shutdown
//! channel, so dropping that channel's sender wakes every blocked worker.

use crossbeam_channel::{bounded, Receiver, Sender};

use types::ServiceId;

#[derive(Debug)]
pub(crate) struct PendingQueue {
    tx: Sender<ServiceId>,
    rx: Receiver<ServiceId>,
}

impl PendingQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Non-blocking push; false means the queue is full.
    pub(crate) fn push(&self, sid: ServiceId) -> bool {
        self.tx.try_send(sid).is_ok()
    }

    /// Block until an id is available or `stop` disconnects.
    pub(crate) fn pop(&self, stop: &Receiver<()>) -> Option<ServiceId> {
        crossbeam_channel::select! {
            recv(self.rx) -> sid => sid.ok(),
            recv(stop) -> _ => None,
        }
    }
}
