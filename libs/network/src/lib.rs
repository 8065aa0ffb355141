//! # Switchyard Network - Peer Link Engine
//!
//! The I/O collaborator of the dispatcher core: everything that touches a
//! socket lives here. The dispatcher stays thread-based and runtime-free;
//! this crate owns a private tokio runtime and exposes a synchronous
//! surface (`start`, `stop`, `forward`).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  forward(dest, frame)  ┌─────────────────────┐
//! │ Bridge service   │───────────────────────▶│ NetEngine           │
//! │ (dispatch, id 0) │                        │  route table        │
//! └──────────────────┘                        │  id → peer link     │
//!          ▲                                  │  per-peer writer    │
//!          │ FrameSink::deliver               │  accept / connect   │
//!          └──────────────────────────────────│  hello + key auth   │
//!                                             └─────────────────────┘
//! ```
//!
//! A link opens with a hello frame carrying the presented key and the
//! sender's local service ids. The accepting side validates the key
//! against its listen key; a completed handshake populates the route
//! table and reports the ids through [`FrameSink::peers_joined`]. Data
//! frames read off a link are decoded and handed to
//! [`FrameSink::deliver`].
//!
//! Retransmission and flow control are out of scope; a broken link is
//! torn down and outbound links redial on an interval.

pub mod config;
pub mod engine;
pub mod error;
mod link;
pub mod metrics;

pub use config::{EngineConfig, ListenConfig, PeerConfig};
pub use engine::{FrameSink, NetEngine};
pub use error::NetworkError;
pub use metrics::{EngineMetrics, EngineStats};
