//! The bridging service (id 0).
//!
//! Fronts the link engine inside the dispatcher: frames routed remote
//! arrive in its mailbox like any other message and are handed to the
//! engine from a worker thread, so network handoff competes fairly with
//! ordinary service work.

use tracing::warn;

use std::sync::Arc;

use network::NetEngine;
use types::{kinds, Body, Envelope};

use crate::service::{Context, Service};

pub(crate) struct BridgeService {
    engine: Arc<NetEngine>,
}

impl BridgeService {
    pub(crate) fn new(engine: Arc<NetEngine>) -> Self {
        Self { engine }
    }
}

impl Service for BridgeService {
    fn handle(&mut self, _ctx: &Context<'_>, env: Envelope) {
        match (env.kind, env.body) {
            (kinds::FORWARD_REMOTE, Body::Frame { dest, bytes }) => {
                self.engine.forward(dest, bytes);
            }
            (kind, _) => {
                warn!(src = env.src, kind, "bridge received an unroutable message");
            }
        }
    }
}
