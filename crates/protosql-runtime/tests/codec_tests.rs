mod common;

use common::{sample, sample_index};
use proptest::prelude::*;
use protosql_runtime::codec::{decode, encode, DecodeOptions};
use protosql_runtime::ErrorKind;
use serde_json::{json, Value};

fn decode_default(bytes: &[u8]) -> protosql_runtime::Result<Value> {
    let index = sample_index();
    decode(&index, sample(&index), bytes, &DecodeOptions::default())
}

fn encode_doc(doc: &Value) -> protosql_runtime::Result<Vec<u8>> {
    let index = sample_index();
    encode(&index, sample(&index), doc)
}

#[test]
fn scalar_round_trip() {
    assert_eq!(encode_doc(&json!({"1": 123})).unwrap(), vec![0x08, 0x7b]);
    assert_eq!(decode_default(&[0x08, 0x7b]).unwrap(), json!({"1": 123}));
}

#[test]
fn encode_orders_by_field_number() {
    let bytes = encode_doc(&json!({"3": "a", "1": 1})).unwrap();
    assert_eq!(bytes, vec![0x08, 0x01, 0x1a, 0x01, b'a']);
}

#[test]
fn repeated_scalars_pack_and_accept_both_layouts() {
    assert_eq!(
        encode_doc(&json!({"4": [1, 2, 3]})).unwrap(),
        vec![0x22, 0x03, 0x01, 0x02, 0x03]
    );
    assert_eq!(
        decode_default(&[0x20, 0x01, 0x20, 0x02]).unwrap(),
        json!({"4": [1, 2]})
    );
    assert_eq!(
        decode_default(&[0x22, 0x01, 0x07, 0x20, 0x08]).unwrap(),
        json!({"4": [7, 8]})
    );
}

#[test]
fn repeated_bools_decode_as_booleans() {
    assert_eq!(
        decode_default(&[0x2a, 0x02, 0x01, 0x00]).unwrap(),
        json!({"5": [true, false]})
    );
}

#[test]
fn last_oneof_member_wins() {
    let bytes = [0x50, 0x05, 0x5a, 0x01, b'a'];
    assert_eq!(decode_default(&bytes).unwrap(), json!({"11": "a"}));
}

#[test]
fn singular_messages_merge() {
    let bytes = [0x32, 0x02, 0x08, 0x01, 0x32, 0x02, 0x10, 0x02];
    assert_eq!(
        decode_default(&bytes).unwrap(),
        json!({"6": {"1": 1, "2": 2}})
    );
}

#[test]
fn map_entries_replace_by_key() {
    let entry = |v: u8| vec![0x62, 0x05, 0x0a, 0x01, b'a', 0x10, v];
    let mut bytes = entry(5);
    bytes.extend(entry(6));
    assert_eq!(
        decode_default(&bytes).unwrap(),
        json!({"12": [{"1": "a", "2": 6}]})
    );
}

#[test]
fn floats_and_large_integers_keep_their_bits() {
    let doc = json!({
        "2": "binary64:0x400921fb54442d18",
        "13": u64::MAX,
        "14": "binary32:0x3fc00000",
    });
    let bytes = encode_doc(&doc).unwrap();
    assert_eq!(decode_default(&bytes).unwrap(), doc);
}

#[test]
fn unknown_fields_are_dropped_or_kept() {
    let bytes = [0x08, 0x01, 0x98, 0x06, 0x01];
    assert_eq!(decode_default(&bytes).unwrap(), json!({"1": 1}));

    let index = sample_index();
    let kept = decode(&index, sample(&index), &bytes, &DecodeOptions::round_trip()).unwrap();
    assert_eq!(
        kept,
        json!({"1": 1, "_u": {"99": [{"i": 0, "t": 0, "v": 1}]}})
    );
    assert_eq!(encode(&index, sample(&index), &kept).unwrap(), bytes);
}

#[test]
fn null_fields_are_absent() {
    assert_eq!(encode_doc(&json!({"1": null, "3": "x"})).unwrap(), vec![0x1a, 0x01, b'x']);
}

#[test]
fn error_kinds() {
    let kind = |r: protosql_runtime::Result<Vec<u8>>| r.unwrap_err().kind();
    assert_eq!(kind(encode_doc(&json!({"77": 1}))), ErrorKind::UnknownField);
    assert_eq!(kind(encode_doc(&json!({"name": 1}))), ErrorKind::MalformedJson);
    assert_eq!(kind(encode_doc(&json!({"1": 4294967296i64}))), ErrorKind::RangeError);
    assert_eq!(kind(encode_doc(&json!({"4": 1}))), ErrorKind::TypeMismatch);

    let err = decode_default(&[0x08]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedWire);
    assert_eq!(err.sqlstate(), "45000");

    let err = decode_default(&[0x0a, 0x00]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DescriptorMismatch);
    assert!(err.to_string().starts_with("DescriptorMismatch: "));
}

fn sample_doc() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(any::<i32>()),
        proptest::option::of("[a-z]{0,8}"),
        proptest::collection::vec(any::<i32>(), 0..6),
        proptest::option::of(-1.0e9f64..1.0e9),
        proptest::option::of(any::<i64>()),
    )
        .prop_map(|(int, name, tags, pi, child)| {
            let mut doc = serde_json::Map::new();
            if let Some(v) = int {
                doc.insert("1".into(), json!(v));
            }
            if let Some(v) = pi {
                doc.insert("2".into(), json!(protosql_runtime::float::tag_f64(v)));
            }
            if let Some(v) = name {
                doc.insert("3".into(), json!(v));
            }
            if !tags.is_empty() {
                doc.insert("4".into(), json!(tags));
            }
            if let Some(v) = child {
                doc.insert("6".into(), json!({"1": v}));
            }
            Value::Object(doc)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn decode_inverts_encode(doc in sample_doc()) {
        let bytes = encode_doc(&doc).unwrap();
        prop_assert_eq!(decode_default(&bytes).unwrap(), doc);
    }

    #[test]
    fn encode_inverts_decode_of_canonical_bytes(doc in sample_doc()) {
        let bytes = encode_doc(&doc).unwrap();
        let again = encode_doc(&decode_default(&bytes).unwrap()).unwrap();
        prop_assert_eq!(again, bytes);
    }
}
