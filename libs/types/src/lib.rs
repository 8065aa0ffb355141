//! Pure data types shared across the Switchyard workspace.
//!
//! This crate is the "data" layer: service identifiers, message envelopes,
//! and the typed field values that message payloads are built from. It
//! contains no I/O, no scheduling, and no encoding rules.
//!
//! ## Architecture Role
//!
//! ```text
//! types → codec → network
//!   ↑        ↑       ↑
//!   └────── dispatch ┘
//! Pure Data   Wire Rules   Transport / Scheduling
//! ```
//!
//! ## What This Crate Contains
//! - `ServiceId` / `MessageKind` and their reserved ranges
//! - `Envelope` / `Body`: the in-process message representation
//! - `Value` / `FieldKind`: the schema'd field system for payloads
//!
//! ## What This Crate Does NOT Contain
//! - Byte-level encoding (belongs in `codec`)
//! - Socket or link management (belongs in `network`)
//! - Registry, queueing, or worker logic (belongs in `dispatch`)

pub mod message;
pub mod value;

pub use message::{kinds, Body, Envelope, MessageKind, ServiceId, BRIDGE_ID, MAX_SERVICE_ID};
pub use value::{FieldKind, Value};
