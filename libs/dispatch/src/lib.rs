//! # Switchyard Dispatch - Scheduling & Routing Core
//!
//! A process hosts many independent logical services (actors), each with
//! private state and a private FIFO mailbox, executed by a shared pool of
//! worker threads. This crate guarantees that each service's messages are
//! processed strictly in arrival order by exactly one worker at a time,
//! while unrelated services run concurrently, and makes delivery
//! location-transparent: a sender writes the same call whether the
//! destination lives in this process or behind a peer link.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Dispatcher                                                  │
//! │                                                             │
//! │  Registry (arena, id → service)    CycleScheduler (timers)  │
//! │        │                                  │                 │
//! │  send ─┤ local? ──▶ mailbox ──▶ pending queue ◀── tick      │
//! │        │                            │                       │
//! │        └ remote? ─▶ frame ─▶ id 0   │  worker threads       │
//! │                    (bridge)  │      ▼                       │
//! │                              │   drain mailbox to empty     │
//! │                              ▼                              │
//! │                        NetEngine (peer links)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use dispatch::{Context, Dispatcher, DispatcherConfig, Envelope, Service};
//!
//! struct Greeter;
//!
//! impl Service for Greeter {
//!     fn handle(&mut self, ctx: &Context<'_>, env: Envelope) {
//!         tracing::info!(src = env.src, "greeted");
//!         // Location-transparent: 42 may live here or at a peer.
//!         ctx.send(42, 17, vec!["hello".into()]);
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new(DispatcherConfig::default());
//! dispatcher.register(7, Greeter).unwrap();
//! dispatcher.start(4).unwrap();
//! dispatcher.send(0, 7, 16, vec![]);
//! dispatcher.stop();
//! ```

mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
mod mailbox;
pub mod metrics;
mod queue;
mod registry;
pub mod service;
mod timer;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, RegistryError};
pub use metrics::{DispatchMetrics, DispatchStats};
pub use service::{Context, Service, ServiceHandle};

// The data vocabulary callers need for every send.
pub use codec::Schema;
pub use types::{
    kinds, Body, Envelope, FieldKind, MessageKind, ServiceId, Value, BRIDGE_ID, MAX_SERVICE_ID,
};
