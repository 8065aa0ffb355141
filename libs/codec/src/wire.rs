//! Tag-prefixed field encoding with a paired size probe.
//!
//! Every encoder here has a matching entry in [`encoded_len`]; the two are
//! maintained as a pair and the frame layer checks their agreement on every
//! encode. Integers are big-endian; variable-length payloads carry a u16
//! length (or element-count) prefix.

use bytes::{Buf, BufMut, BytesMut};

use types::Value;

use crate::error::CodecError;

/// One-byte tags identifying the field type on the wire.
mod tag {
    pub const U8: u8 = 0x01;
    pub const U16: u8 = 0x02;
    pub const U32: u8 = 0x03;
    pub const U64: u8 = 0x04;
    pub const I32: u8 = 0x05;
    pub const I64: u8 = 0x06;
    pub const BOOL: u8 = 0x07;
    pub const STR: u8 = 0x08;
    pub const BYTES: u8 = 0x09;
    pub const LIST: u8 = 0x0a;
}

/// Longest string/blob payload and largest list element count.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Exact number of bytes [`encode_value`] will write for `value`.
pub fn encoded_len(value: &Value) -> usize {
    1 + match value {
        Value::U8(_) | Value::Bool(_) => 1,
        Value::U16(_) => 2,
        Value::U32(_) | Value::I32(_) => 4,
        Value::U64(_) | Value::I64(_) => 8,
        Value::Str(s) => 2 + s.len(),
        Value::Bytes(b) => 2 + b.len(),
        Value::List(items) => 2 + items.iter().map(encoded_len).sum::<usize>(),
    }
}

/// Exact number of bytes [`encode_args`] will write for `args`.
pub fn args_len(args: &[Value]) -> usize {
    args.iter().map(encoded_len).sum()
}

/// Append one tagged field to `buf`.
pub fn encode_value(buf: &mut BytesMut, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::U8(v) => {
            buf.put_u8(tag::U8);
            buf.put_u8(*v);
        }
        Value::U16(v) => {
            buf.put_u8(tag::U16);
            buf.put_u16(*v);
        }
        Value::U32(v) => {
            buf.put_u8(tag::U32);
            buf.put_u32(*v);
        }
        Value::U64(v) => {
            buf.put_u8(tag::U64);
            buf.put_u64(*v);
        }
        Value::I32(v) => {
            buf.put_u8(tag::I32);
            buf.put_i32(*v);
        }
        Value::I64(v) => {
            buf.put_u8(tag::I64);
            buf.put_i64(*v);
        }
        Value::Bool(v) => {
            buf.put_u8(tag::BOOL);
            buf.put_u8(u8::from(*v));
        }
        Value::Str(s) => {
            let len = s.len();
            if len > MAX_FIELD_LEN {
                return Err(CodecError::FieldTooLong {
                    len,
                    max: MAX_FIELD_LEN,
                });
            }
            buf.put_u8(tag::STR);
            buf.put_u16(len as u16);
            buf.put_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            let len = b.len();
            if len > MAX_FIELD_LEN {
                return Err(CodecError::FieldTooLong {
                    len,
                    max: MAX_FIELD_LEN,
                });
            }
            buf.put_u8(tag::BYTES);
            buf.put_u16(len as u16);
            buf.put_slice(b);
        }
        Value::List(items) => {
            let count = items.len();
            if count > MAX_FIELD_LEN {
                return Err(CodecError::FieldTooLong {
                    len: count,
                    max: MAX_FIELD_LEN,
                });
            }
            buf.put_u8(tag::LIST);
            buf.put_u16(count as u16);
            for item in items {
                encode_value(buf, item)?;
            }
        }
    }
    Ok(())
}

/// Append a whole argument list to `buf`.
pub fn encode_args(buf: &mut BytesMut, args: &[Value]) -> Result<(), CodecError> {
    for value in args {
        encode_value(buf, value)?;
    }
    Ok(())
}

fn need(buf: &impl Buf, n: usize) -> Result<(), CodecError> {
    if buf.remaining() < n {
        return Err(CodecError::Truncated {
            need: n,
            got: buf.remaining(),
        });
    }
    Ok(())
}

/// Decode one tagged field. `offset` is consumed-so-far, for diagnostics.
pub fn decode_value(buf: &mut impl Buf, offset: usize) -> Result<Value, CodecError> {
    need(buf, 1)?;
    let tag = buf.get_u8();
    let value = match tag {
        tag::U8 => {
            need(buf, 1)?;
            Value::U8(buf.get_u8())
        }
        tag::U16 => {
            need(buf, 2)?;
            Value::U16(buf.get_u16())
        }
        tag::U32 => {
            need(buf, 4)?;
            Value::U32(buf.get_u32())
        }
        tag::U64 => {
            need(buf, 8)?;
            Value::U64(buf.get_u64())
        }
        tag::I32 => {
            need(buf, 4)?;
            Value::I32(buf.get_i32())
        }
        tag::I64 => {
            need(buf, 8)?;
            Value::I64(buf.get_i64())
        }
        tag::BOOL => {
            need(buf, 1)?;
            Value::Bool(buf.get_u8() != 0)
        }
        tag::STR => {
            need(buf, 2)?;
            let len = buf.get_u16() as usize;
            need(buf, len)?;
            let mut raw = vec![0u8; len];
            buf.copy_to_slice(&mut raw);
            // Strings are encoded from &str, so invalid UTF-8 means a
            // corrupt or foreign stream; replacement keeps decode total.
            Value::Str(String::from_utf8_lossy(&raw).into_owned())
        }
        tag::BYTES => {
            need(buf, 2)?;
            let len = buf.get_u16() as usize;
            need(buf, len)?;
            let mut raw = vec![0u8; len];
            buf.copy_to_slice(&mut raw);
            Value::Bytes(raw)
        }
        tag::LIST => {
            need(buf, 2)?;
            let count = buf.get_u16() as usize;
            let mut items = Vec::with_capacity(count.min(256));
            for _ in 0..count {
                items.push(decode_value(buf, offset)?);
            }
            Value::List(items)
        }
        other => return Err(CodecError::UnknownTag { tag: other, offset }),
    };
    Ok(value)
}

/// Decode fields until the buffer is exhausted.
pub fn decode_args(buf: &mut impl Buf, total_len: usize) -> Result<Vec<Value>, CodecError> {
    let mut args = Vec::new();
    while buf.has_remaining() {
        let offset = total_len - buf.remaining();
        args.push(decode_value(buf, offset)?);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) {
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &value).unwrap();
        assert_eq!(buf.len(), encoded_len(&value), "probe mismatch for {value:?}");
        let mut bytes = buf.freeze();
        let decoded = decode_value(&mut bytes, 0).unwrap();
        assert_eq!(decoded, value);
        assert!(!bytes.has_remaining());
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(Value::U8(0xff));
        roundtrip(Value::U16(1024));
        roundtrip(Value::U32(u32::MAX));
        roundtrip(Value::U64(1 << 40));
        roundtrip(Value::I32(-17));
        roundtrip(Value::I64(i64::MIN));
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
    }

    #[test]
    fn string_and_bytes_roundtrip() {
        roundtrip(Value::Str(String::new()));
        roundtrip(Value::Str("héllo wörld".into()));
        roundtrip(Value::Bytes(vec![0, 1, 2, 255]));
    }

    #[test]
    fn nested_list_roundtrip() {
        roundtrip(Value::List(vec![
            Value::U32(1),
            Value::Str("inner".into()),
            Value::List(vec![Value::I64(-5), Value::List(vec![])]),
        ]));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &Value::U64(9)).unwrap();
        let mut short = buf.freeze().slice(0..4);
        let err = decode_value(&mut short, 0).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let mut buf = bytes::Bytes::from_static(&[0x7f, 0, 0]);
        let err = decode_value(&mut buf, 0).unwrap_err();
        assert_eq!(err, CodecError::UnknownTag { tag: 0x7f, offset: 0 });
    }

    #[test]
    fn oversized_string_rejected() {
        let s = "x".repeat(MAX_FIELD_LEN + 1);
        let mut buf = BytesMut::new();
        let err = encode_value(&mut buf, &Value::Str(s)).unwrap_err();
        assert!(matches!(err, CodecError::FieldTooLong { .. }));
    }
}
