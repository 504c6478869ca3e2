//! The NumberJSON, WireJSON and bytes surfaces must agree on every field op.

mod common;

use common::{sample, sample_index};
use proptest::prelude::*;
use protosql_descriptor::FieldKind;
use protosql_runtime::api::{message_to_wire_json, wire_json_to_message};
use protosql_runtime::codec::{decode, encode, DecodeOptions};
use protosql_runtime::routine::{call, SqlValue};
use protosql_runtime::ErrorKind;
use protosql_wire::varint::{write_tag, write_varint};
use protosql_wire::WireType;
use serde_json::{json, Value};

fn blob(v: SqlValue) -> Vec<u8> {
    match v {
        SqlValue::Blob(b) => b,
        other => panic!("expected a blob, got {other}"),
    }
}

fn wire_json(v: SqlValue) -> Value {
    match v {
        SqlValue::Json(j) => j,
        other => panic!("expected JSON, got {other}"),
    }
}

/// Runs `op` on the bytes surface and the WireJSON surface and checks both
/// land on the same bytes.
fn both_surfaces(op: &str, kind: &str, bytes: &[u8], rest: &[SqlValue]) -> Vec<u8> {
    let mut message_args = vec![SqlValue::Blob(bytes.to_vec())];
    message_args.extend_from_slice(rest);
    let via_bytes = blob(call(&format!("message_{op}_{kind}_field"), &message_args).unwrap());

    let mut wire_args = vec![SqlValue::Json(message_to_wire_json(bytes).unwrap())];
    wire_args.extend_from_slice(rest);
    let via_wire = wire_json(call(&format!("wire_{op}_{kind}_field"), &wire_args).unwrap());
    assert_eq!(wire_json_to_message(&via_wire).unwrap(), via_bytes);
    via_bytes
}

#[test]
fn set_on_every_surface_matches_the_codec() {
    let index = sample_index();
    let message = sample(&index);
    let bytes = encode(&index, message, &json!({"3": "x", "4": [1, 2]})).unwrap();

    let out = both_surfaces("set", "int32", &bytes, &[SqlValue::Int(1), SqlValue::Int(-1)]);
    let decoded = decode(&index, message, &out, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded, json!({"1": -1, "3": "x", "4": [1, 2]}));

    let doc = call(
        "number_json_set_int32_field",
        &[SqlValue::Json(json!({"3": "x", "4": [1, 2]})), SqlValue::Int(1), SqlValue::Int(-1)],
    )
    .unwrap();
    assert_eq!(doc, SqlValue::Json(decoded));
}

#[test]
fn repeated_ops_keep_packing() {
    let bytes = [0x22, 0x02, 0x01, 0x02];
    let out = both_surfaces("add_repeated", "int32", &bytes, &[SqlValue::Int(4), SqlValue::Int(3)]);
    assert_eq!(out, vec![0x22, 0x03, 0x01, 0x02, 0x03]);

    let out = both_surfaces("remove_repeated", "int32", &out, &[SqlValue::Int(4), SqlValue::Int(0)]);
    assert_eq!(out, vec![0x22, 0x02, 0x02, 0x03]);

    let out = both_surfaces(
        "insert_repeated",
        "int32",
        &out,
        &[SqlValue::Int(4), SqlValue::Int(2), SqlValue::Int(9)],
    );
    assert_eq!(out, vec![0x22, 0x03, 0x02, 0x03, 0x09]);

    let count = call("message_count_repeated_int32_field", &[SqlValue::Blob(out), SqlValue::Int(4)]).unwrap();
    assert_eq!(count, SqlValue::Int(3));
}

#[test]
fn reads_agree_across_surfaces() {
    let bytes = [0x08, 0x05, 0x1a, 0x02, b'h', b'i', 0x08, 0x07];
    let wire = SqlValue::Json(message_to_wire_json(&bytes).unwrap());
    let index = sample_index();
    let doc = SqlValue::Json(decode(&index, sample(&index), &bytes, &DecodeOptions::default()).unwrap());

    for surface_doc in [SqlValue::Blob(bytes.to_vec()), wire.clone(), doc.clone()] {
        let prefix = match surface_doc {
            SqlValue::Blob(_) => "message",
            SqlValue::Json(ref j) if j.get("1").is_some_and(Value::is_array) => "wire",
            _ => "number_json",
        };
        let get = |name: &str, n: i64| call(&format!("{prefix}_{name}_field"), &[surface_doc.clone(), SqlValue::Int(n)]).unwrap();
        assert_eq!(get("get_int32", 1), SqlValue::Int(7));
        assert_eq!(get("get_string", 3), SqlValue::Text("hi".into()));
        assert_eq!(get("has_string", 3), SqlValue::Bool(true));
        assert_eq!(get("has_int32", 2), SqlValue::Bool(false));
        assert_eq!(get("get_double", 2), SqlValue::Double(0.0));
    }
}

#[test]
fn message_fields_travel_as_bytes_on_record_surfaces() {
    let bytes = [0x32, 0x02, 0x08, 0x01];
    let got = call("message_get_message_field", &[SqlValue::Blob(bytes.to_vec()), SqlValue::Int(6)]).unwrap();
    assert_eq!(got, SqlValue::Blob(vec![0x08, 0x01]));

    let doc = json!({"6": {"1": 1}});
    let got = call("number_json_get_message_field", &[SqlValue::Json(doc), SqlValue::Int(6)]).unwrap();
    assert_eq!(got, SqlValue::Json(json!({"1": 1})));
}

#[test]
fn index_errors_surface_with_their_kind() {
    let err = call(
        "number_json_get_repeated_int32_field",
        &[SqlValue::Json(json!({"4": [1]})), SqlValue::Int(4), SqlValue::Int(1)],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);

    let err = call(
        "wire_insert_repeated_int32_field",
        &[SqlValue::Json(json!({})), SqlValue::Int(4), SqlValue::Int(1), SqlValue::Int(5)],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsertIndexOutOfBounds);
}

/// The zero value of `kind` as a routine argument, for a surface that stores
/// messages as objects (`number_json`) or as bytes (`wire`, `message`).
fn zero_argument(kind: FieldKind, messages_as_bytes: bool) -> SqlValue {
    match kind {
        FieldKind::Double => SqlValue::Double(0.0),
        FieldKind::Float => SqlValue::Float(0.0),
        FieldKind::Bool => SqlValue::Bool(false),
        FieldKind::String => SqlValue::Text(String::new()),
        FieldKind::Bytes => SqlValue::Blob(Vec::new()),
        FieldKind::Message if messages_as_bytes => SqlValue::Blob(Vec::new()),
        FieldKind::Message => SqlValue::Json(json!({})),
        FieldKind::UInt64 | FieldKind::Fixed64 => SqlValue::UInt(0),
        _ => SqlValue::Int(0),
    }
}

#[test]
fn zero_values_are_present_after_set_on_every_kind() {
    for kind in FieldKind::ALL {
        for (prefix, empty) in [
            ("number_json", SqlValue::Json(json!({}))),
            ("wire", SqlValue::Json(json!({}))),
            ("message", SqlValue::Blob(Vec::new())),
        ] {
            let zero = zero_argument(kind, prefix != "number_json");
            let set = call(
                &format!("{prefix}_set_{kind}_field"),
                &[empty, SqlValue::Int(9), zero],
            )
            .unwrap();
            let has = call(&format!("{prefix}_has_{kind}_field"), &[set.clone(), SqlValue::Int(9)]).unwrap();
            assert_eq!(has, SqlValue::Bool(true), "{prefix} {kind}");

            let cleared = call(&format!("{prefix}_clear_{kind}_field"), &[set, SqlValue::Int(9)]).unwrap();
            let has = call(&format!("{prefix}_has_{kind}_field"), &[cleared, SqlValue::Int(9)]).unwrap();
            assert_eq!(has, SqlValue::Bool(false), "{prefix} {kind}");
        }
    }
}

/// A scalar kind with a value of it, as both the `set` argument and the
/// expected `get` result.
fn scalar_value() -> impl Strategy<Value = (FieldKind, SqlValue)> {
    prop_oneof![
        any::<i32>().prop_map(|v| (FieldKind::Int32, SqlValue::Int(v.into()))),
        any::<i32>().prop_map(|v| (FieldKind::SInt32, SqlValue::Int(v.into()))),
        any::<i32>().prop_map(|v| (FieldKind::SFixed32, SqlValue::Int(v.into()))),
        any::<i32>().prop_map(|v| (FieldKind::Enum, SqlValue::Int(v.into()))),
        any::<u32>().prop_map(|v| (FieldKind::UInt32, SqlValue::Int(v.into()))),
        any::<u32>().prop_map(|v| (FieldKind::Fixed32, SqlValue::Int(v.into()))),
        any::<i64>().prop_map(|v| (FieldKind::Int64, SqlValue::Int(v))),
        any::<i64>().prop_map(|v| (FieldKind::SInt64, SqlValue::Int(v))),
        any::<i64>().prop_map(|v| (FieldKind::SFixed64, SqlValue::Int(v))),
        any::<u64>().prop_map(|v| (FieldKind::UInt64, SqlValue::UInt(v))),
        any::<u64>().prop_map(|v| (FieldKind::Fixed64, SqlValue::UInt(v))),
        (-1e30f32..1e30f32).prop_map(|v| (FieldKind::Float, SqlValue::Float(v))),
        (-1e300f64..1e300f64).prop_map(|v| (FieldKind::Double, SqlValue::Double(v))),
        any::<bool>().prop_map(|v| (FieldKind::Bool, SqlValue::Bool(v))),
        "[a-z0-9 ]{0,12}".prop_map(|v| (FieldKind::String, SqlValue::Text(v))),
        proptest::collection::vec(any::<u8>(), 0..12)
            .prop_map(|v| (FieldKind::Bytes, SqlValue::Blob(v))),
    ]
}

fn int64_message() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec((1u32..6, any::<i64>()), 0..8).prop_map(|records| {
        let mut buf = Vec::new();
        for (n, v) in records {
            write_tag(n, WireType::Varint, &mut buf);
            write_varint(v as u64, &mut buf);
        }
        buf
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn set_get_clear_agree(bytes in int64_message(), n in 1i64..6, v in any::<i64>()) {
        let set = both_surfaces("set", "int64", &bytes, &[SqlValue::Int(n), SqlValue::Int(v)]);
        let got = call("message_get_int64_field", &[SqlValue::Blob(set.clone()), SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(got, SqlValue::Int(v));

        let cleared = both_surfaces("clear", "int64", &set, &[SqlValue::Int(n)]);
        let has = call("message_has_int64_field", &[SqlValue::Blob(cleared), SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(has, SqlValue::Bool(false));
    }

    #[test]
    fn scalar_ops_agree_on_every_surface(
        bytes in int64_message(),
        (kind, v) in scalar_value(),
        n in 20i64..30,
    ) {
        let set = both_surfaces("set", kind.name(), &bytes, &[SqlValue::Int(n), v.clone()]);
        let got = call(&format!("message_get_{kind}_field"), &[SqlValue::Blob(set.clone()), SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(&got, &v);
        let wire = SqlValue::Json(message_to_wire_json(&set).unwrap());
        let got = call(&format!("wire_get_{kind}_field"), &[wire.clone(), SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(&got, &v);
        let has = call(&format!("wire_has_{kind}_field"), &[wire, SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(has, SqlValue::Bool(true));

        let doc = call(
            &format!("number_json_set_{kind}_field"),
            &[SqlValue::Json(json!({})), SqlValue::Int(n), v.clone()],
        )
        .unwrap();
        let got = call(&format!("number_json_get_{kind}_field"), &[doc.clone(), SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(&got, &v);

        let cleared = both_surfaces("clear", kind.name(), &set, &[SqlValue::Int(n)]);
        prop_assert_eq!(cleared, bytes);
        let doc = call(&format!("number_json_clear_{kind}_field"), &[doc, SqlValue::Int(n)]).unwrap();
        prop_assert_eq!(doc, SqlValue::Json(json!({})));
    }
}
