//! Codec errors with diagnostic context.
//!
//! Each variant carries the numbers a reader needs to see what went wrong:
//! how many bytes were expected versus present, which tag was unknown, how
//! far a probe and an encode disagreed.

use thiserror::Error;

use types::FieldKind;

/// Errors from field encoding/decoding, frame handling, and schema checks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Buffer ended before the value it claimed to hold.
    #[error("truncated input: need {need} more bytes, got {got}")]
    Truncated { need: usize, got: usize },

    /// Decoder met a tag byte it does not know.
    #[error("unknown field tag {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A string, blob or list exceeds its u16 length prefix.
    #[error("field too long: {len} exceeds maximum {max}")]
    FieldTooLong { len: usize, max: usize },

    /// Encoded frame would not fit the u16 size field.
    #[error("frame too large: {len} bytes exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The size probe and the actual encode disagreed. This is a bug in
    /// the probe/encode pair, not bad input.
    #[error("serializer contract violation: probed {probed} bytes, wrote {written}")]
    SizeMismatch { probed: usize, written: usize },

    /// A frame's declared size does not match the bytes that follow it.
    #[error("frame size mismatch: header declares {declared} bytes, {actual} present")]
    FrameSizeMismatch { declared: usize, actual: usize },

    /// Payload has the wrong number of fields for its schema.
    #[error("schema arity mismatch: expected {expected} fields, got {got}")]
    Arity { expected: usize, got: usize },

    /// A payload field has the wrong type for its schema slot.
    #[error("schema field {index} mismatch: expected {expected:?}, got {got:?}")]
    FieldType {
        index: usize,
        expected: FieldKind,
        got: FieldKind,
    },
}
