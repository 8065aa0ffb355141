//! Wire-frame construction and parsing.
//!
//! Layout: `[u16 frame_size][u16 dest_id][u16 message_kind][fields...]`,
//! where `frame_size` counts everything after the size field itself.
//! Encoding probes the exact size first, writes into a buffer of that
//! size, then verifies the probe against the bytes actually written.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use types::{MessageKind, ServiceId, Value};

use crate::error::CodecError;
use crate::wire;

/// Bytes of header inside the sized region: dest id + message kind.
pub const HEADER_LEN: usize = 4;

/// Largest value the u16 size field can declare.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// A decoded frame: the remote destination, the kind, and the fields.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub dest: ServiceId,
    pub kind: MessageKind,
    pub args: Vec<Value>,
}

impl WireFrame {
    /// Encode `(dest, kind, args)` into a complete frame, size prefix
    /// included.
    ///
    /// Returns [`CodecError::SizeMismatch`] if the size probe and the
    /// encode pass disagree: a programming-error fault in the codec, to
    /// be logged by the caller, never retried.
    pub fn encode(
        dest: ServiceId,
        kind: MessageKind,
        args: &[Value],
    ) -> Result<Bytes, CodecError> {
        let body_len = HEADER_LEN + wire::args_len(args);
        if body_len > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge {
                len: body_len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(2 + body_len);
        buf.put_u16(body_len as u16);
        buf.put_u16(dest);
        buf.put_u16(kind);
        wire::encode_args(&mut buf, args)?;

        let written = buf.len() - 2;
        if written != body_len {
            return Err(CodecError::SizeMismatch {
                probed: body_len,
                written,
            });
        }
        Ok(buf.freeze())
    }

    /// Parse a complete frame, size prefix included. The declared size
    /// must match the bytes present exactly.
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < 2 {
            return Err(CodecError::Truncated {
                need: 2,
                got: frame.len(),
            });
        }
        let declared = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        let body = &frame[2..];
        if body.len() != declared {
            return Err(CodecError::FrameSizeMismatch {
                declared,
                actual: body.len(),
            });
        }
        Self::decode_body(body)
    }

    /// Parse the sized region of a frame (everything after the size
    /// field), as read off a peer link.
    pub fn decode_body(body: &[u8]) -> Result<Self, CodecError> {
        if body.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                need: HEADER_LEN,
                got: body.len(),
            });
        }
        let mut buf = body;
        let dest = buf.get_u16();
        let kind = buf.get_u16();
        let args = wire::decode_args(&mut buf, body.len() - HEADER_LEN)?;
        Ok(Self { dest, kind, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_size_counts_bytes_after_size_field() {
        let args = vec![Value::U32(42), Value::Str("abc".into())];
        let frame = WireFrame::encode(7, 21, &args).unwrap();
        let declared = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(declared, frame.len() - 2);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let args = vec![
            Value::U16(9),
            Value::I64(-1),
            Value::List(vec![Value::Str("n".into()), Value::Bool(true)]),
        ];
        let bytes = WireFrame::encode(300, 33, &args).unwrap();
        let frame = WireFrame::decode(&bytes).unwrap();
        assert_eq!(frame.dest, 300);
        assert_eq!(frame.kind, 33);
        assert_eq!(frame.args, args);
    }

    #[test]
    fn empty_args_is_a_header_only_frame() {
        let bytes = WireFrame::encode(1, 16, &[]).unwrap();
        assert_eq!(bytes.len(), 2 + HEADER_LEN);
        let frame = WireFrame::decode(&bytes).unwrap();
        assert!(frame.args.is_empty());
    }

    #[test]
    fn size_prefix_mismatch_rejected() {
        let mut raw = WireFrame::encode(1, 16, &[Value::U8(1)]).unwrap().to_vec();
        raw.pop();
        let err = WireFrame::decode(&raw).unwrap_err();
        assert!(matches!(err, CodecError::FrameSizeMismatch { .. }));
    }

    #[test]
    fn oversized_frame_rejected() {
        // Two blobs just under the field cap overflow the frame cap.
        let args = vec![
            Value::Bytes(vec![0u8; wire::MAX_FIELD_LEN]),
            Value::Bytes(vec![0u8; wire::MAX_FIELD_LEN]),
        ];
        let err = WireFrame::encode(1, 16, &args).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge { .. }));
    }
}
