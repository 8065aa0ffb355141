//! The service trait and the context handed to running services.

use std::time::Duration;

use types::{Envelope, MessageKind, ServiceId, Value};

use crate::dispatcher::DispatcherCore;

/// One isolated unit of logic with a private mailbox.
///
/// Methods are invoked by exactly one worker at a time, in mailbox order;
/// a service never needs its own locking for state touched only from
/// these callbacks. All outbound traffic goes through the [`Context`].
pub trait Service: Send + 'static {
    /// A user message (or, for the bridge, a frame) arrived.
    fn handle(&mut self, ctx: &Context<'_>, env: Envelope);

    /// A cycle timer tick arrived. Only called when [`Service::cycle_period`]
    /// returned a period.
    fn on_tick(&mut self, _ctx: &Context<'_>) {}

    /// A set of ids became reachable: locally at start, or at a peer
    /// once its link handshake completes.
    fn on_peers_joined(&mut self, _ctx: &Context<'_>, _ids: &[ServiceId], _remote: bool) {}

    /// Period for a recurring tick; `None` (or a zero duration) disables
    /// the timer. Read once, at registration.
    fn cycle_period(&self) -> Option<Duration> {
        None
    }
}

/// The dispatcher surface available to a service while it runs.
pub struct Context<'a> {
    core: &'a DispatcherCore,
    sid: ServiceId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(core: &'a DispatcherCore, sid: ServiceId) -> Self {
        Self { core, sid }
    }

    /// Id of the service being called.
    pub fn id(&self) -> ServiceId {
        self.sid
    }

    /// Auto-routed send: local if `dest` is registered here, otherwise
    /// framed and forwarded through the bridge.
    pub fn send(&self, dest: ServiceId, kind: MessageKind, args: Vec<Value>) {
        self.core.send(self.sid, dest, kind, args);
    }

    /// Force local delivery.
    pub fn send_local(&self, dest: ServiceId, kind: MessageKind, args: Vec<Value>) {
        self.core.send_local(self.sid, dest, kind, args);
    }

    /// Force the network path, bypassing the locality check.
    pub fn send_remote(&self, dest: ServiceId, kind: MessageKind, args: Vec<Value>) {
        self.core.send_remote(self.sid, dest, kind, args);
    }

    /// Self-scheduling hook: flag `sid` as having work even though no
    /// message was appended.
    pub fn mark_pending(&self, sid: ServiceId) {
        self.core.mark_pending(sid);
    }

    /// Ids registered in this process.
    pub fn local_ids(&self) -> Vec<ServiceId> {
        self.core.registry.local_ids()
    }
}

/// Cheap handle returned by registration, carrying the assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHandle {
    id: ServiceId,
}

impl ServiceHandle {
    pub(crate) fn new(id: ServiceId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }
}
