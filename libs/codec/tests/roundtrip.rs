//! Property tests for the probe/encode/decode triple.
//!
//! Random argument lists (scalars, strings, nested sequences) must
//! survive a frame round-trip exactly, and the size probe must equal the
//! bytes actually written for every shape proptest can find.

use proptest::collection::vec;
use proptest::prelude::*;

use codec::{wire, WireFrame};
use types::Value;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<u8>().prop_map(Value::U8),
        any::<u16>().prop_map(Value::U16),
        any::<u32>().prop_map(Value::U32),
        any::<u64>().prop_map(Value::U64),
        any::<i32>().prop_map(Value::I32),
        any::<i64>().prop_map(Value::I64),
        any::<bool>().prop_map(Value::Bool),
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::Str),
        vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(3, 64, 8, |inner| {
        vec(inner, 0..8).prop_map(Value::List)
    })
}

proptest! {
    #[test]
    fn frame_roundtrip(
        dest in 1u16..=1024,
        kind in 16u16..1000,
        args in vec(value_strategy(), 0..6),
    ) {
        let bytes = WireFrame::encode(dest, kind, &args).unwrap();

        // Declared size equals the byte count following the size field.
        let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        prop_assert_eq!(declared, bytes.len() - 2);

        // The probe pass predicted the encode pass exactly.
        prop_assert_eq!(declared, codec::frame::HEADER_LEN + wire::args_len(&args));

        let frame = WireFrame::decode(&bytes).unwrap();
        prop_assert_eq!(frame.dest, dest);
        prop_assert_eq!(frame.kind, kind);
        prop_assert_eq!(frame.args, args);
    }
}
