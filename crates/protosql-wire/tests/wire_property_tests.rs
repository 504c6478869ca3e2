use proptest::prelude::*;
use protosql_wire::varint::{read_varint, write_varint, zigzag_decode64, zigzag_encode64};
use protosql_wire::{RawValue, WireMessage};

fn raw_value() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        any::<u64>().prop_map(RawValue::Varint),
        any::<u64>().prop_map(RawValue::Fixed64),
        any::<u32>().prop_map(RawValue::Fixed32),
        proptest::collection::vec(any::<u8>(), 0..16).prop_map(RawValue::Bytes),
    ]
}

fn message() -> impl Strategy<Value = WireMessage> {
    proptest::collection::vec((1u32..40, raw_value()), 0..24).prop_map(|records| {
        let mut msg = WireMessage::new();
        for (field_number, value) in records {
            msg.push(field_number, value, false);
        }
        msg
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn varint_round_trips(v in any::<u64>()) {
        let mut buf = Vec::new();
        write_varint(v, &mut buf);
        prop_assert_eq!(read_varint(&buf, 0).unwrap(), (v, buf.len()));
    }

    #[test]
    fn zigzag64_round_trips(v in any::<i64>()) {
        prop_assert_eq!(zigzag_decode64(zigzag_encode64(v)), v);
    }

    #[test]
    fn scan_of_encode_is_identity(msg in message()) {
        let bytes = msg.encode();
        let scanned = WireMessage::scan(&bytes).unwrap();
        prop_assert_eq!(&scanned, &msg);
        prop_assert_eq!(scanned.encode(), bytes);
    }

    #[test]
    fn wire_json_round_trips(msg in message()) {
        let json = msg.to_json();
        let back = WireMessage::from_json(&json).unwrap();
        prop_assert_eq!(back, msg);
    }
}
