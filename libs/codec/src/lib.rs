//! # Switchyard Codec - Wire Rules
//!
//! ## Purpose
//!
//! This crate contains the "rules" layer of the workspace:
//! - Tag-prefixed field encoding/decoding with a paired size probe
//! - Wire-frame construction and parsing
//! - Per-kind payload schemas checked at the send boundary
//!
//! ## Wire Format
//!
//! A frame is the unit handed to the bridging service and sent over a peer
//! link:
//!
//! ```text
//! [u16 frame_size][u16 dest_id][u16 message_kind][encoded fields...]
//! ```
//!
//! `frame_size` counts everything after the size field itself. Every field
//! is a one-byte tag followed by its payload; strings, byte blobs and lists
//! are length-prefixed. All integers are big-endian. The encoding is stable
//! across versions that agree on field order.
//!
//! ## The Probe/Encode Invariant
//!
//! Frame construction computes the exact encoded size first, then writes
//! into a buffer of that size, then verifies the two agree. A mismatch is a
//! bug in the probe/encode pair, never bad input, and surfaces as
//! [`CodecError::SizeMismatch`].
//!
//! ## What This Crate Does NOT Contain
//! - Socket or link management (belongs in `network`)
//! - Routing decisions (belongs in `dispatch`)

pub mod error;
pub mod frame;
pub mod schema;
pub mod wire;

pub use error::CodecError;
pub use frame::WireFrame;
pub use schema::Schema;
