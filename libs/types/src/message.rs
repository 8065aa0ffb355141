//! Service identity and the in-process message envelope.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::value::Value;

/// Bounded integer identity of one service within a dispatcher.
pub type ServiceId = u16;

/// Numeric tag selecting how a destination interprets a payload.
pub type MessageKind = u16;

/// Highest assignable service id. User services occupy `1..=MAX_SERVICE_ID`.
pub const MAX_SERVICE_ID: ServiceId = 1024;

/// Reserved id of the bridging service that forwards frames to remote
/// peers. Auto-provisioned at dispatcher start, never user-assignable.
pub const BRIDGE_ID: ServiceId = 0;

/// Reserved message kinds. User kinds start at [`kinds::USER_KIND_BASE`].
pub mod kinds {
    use super::MessageKind;

    /// Recurring tick injected by the cycle timer scheduler.
    pub const CYCLE_TICK: MessageKind = 1;
    /// Topology broadcast: a set of ids became reachable.
    pub const PEERS_JOINED: MessageKind = 2;
    /// Carries an encoded wire frame to the bridging service.
    pub const FORWARD_REMOTE: MessageKind = 3;
    /// Link handshake frame exchanged between peer engines.
    pub const PEER_HELLO: MessageKind = 4;

    /// First kind available to user services.
    pub const USER_KIND_BASE: MessageKind = 16;
}

/// Payload of an [`Envelope`].
#[derive(Debug, Clone)]
pub enum Body {
    /// Typed in-process argument list.
    Args(Vec<Value>),
    /// Encoded wire frame riding to the bridging service; `dest` is the
    /// remote destination the frame is ultimately addressed to.
    Frame { dest: ServiceId, bytes: Bytes },
    /// Cycle timer tick carrying the owning timer's period.
    Tick { period: Duration },
    /// Topology change: `ids` became reachable, locally or via a peer.
    PeersJoined {
        ids: Arc<[ServiceId]>,
        remote: bool,
    },
}

/// One message: source, destination, kind, payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub src: ServiceId,
    pub dest: ServiceId,
    pub kind: MessageKind,
    pub body: Body,
}

impl Envelope {
    /// Typed local message.
    pub fn args(src: ServiceId, dest: ServiceId, kind: MessageKind, args: Vec<Value>) -> Self {
        Self {
            src,
            dest,
            kind,
            body: Body::Args(args),
        }
    }

    /// Frame bound for the bridge; `remote_dest` is where the frame is
    /// ultimately headed, the envelope itself targets [`BRIDGE_ID`].
    pub fn frame(src: ServiceId, remote_dest: ServiceId, bytes: Bytes) -> Self {
        Self {
            src,
            dest: BRIDGE_ID,
            kind: kinds::FORWARD_REMOTE,
            body: Body::Frame {
                dest: remote_dest,
                bytes,
            },
        }
    }

    /// Recurring tick addressed to the timer's owner.
    pub fn tick(owner: ServiceId, period: Duration) -> Self {
        Self {
            src: owner,
            dest: owner,
            kind: kinds::CYCLE_TICK,
            body: Body::Tick { period },
        }
    }

    /// Topology broadcast to one local service.
    pub fn peers_joined(dest: ServiceId, ids: Arc<[ServiceId]>, remote: bool) -> Self {
        Self {
            src: BRIDGE_ID,
            dest,
            kind: kinds::PEERS_JOINED,
            body: Body::PeersJoined { ids, remote },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_envelope_targets_bridge() {
        let env = Envelope::frame(5, 200, Bytes::from_static(b"\x00\x04abcd"));
        assert_eq!(env.dest, BRIDGE_ID);
        assert_eq!(env.kind, kinds::FORWARD_REMOTE);
        match env.body {
            Body::Frame { dest, .. } => assert_eq!(dest, 200),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn reserved_kinds_below_user_base() {
        assert!(kinds::CYCLE_TICK < kinds::USER_KIND_BASE);
        assert!(kinds::PEERS_JOINED < kinds::USER_KIND_BASE);
        assert!(kinds::FORWARD_REMOTE < kinds::USER_KIND_BASE);
        assert!(kinds::PEER_HELLO < kinds::USER_KIND_BASE);
    }
}
