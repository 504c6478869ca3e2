//! The generated surface executed in process, with bare routine names.

use std::sync::Arc;

use prost_types::field_descriptor_proto::Type;
use protosql_codegen::{GenerateConfig, OpaqueApi};
use protosql_descriptor::builder::{EnumBuilder, FileBuilder, MessageBuilder};
use protosql_descriptor::DescriptorIndex;
use protosql_runtime::routine::SqlValue;
use protosql_runtime::ErrorKind;
use serde_json::json;

fn api() -> OpaqueApi {
    let file = FileBuilder::new("scenario.proto", "scenario")
        .enumeration(
            EnumBuilder::new("Status")
                .value("STATUS_UNSPECIFIED", 0)
                .value("STATUS_ACTIVE", 1)
                .value("STATUS_INACTIVE", 2),
        )
        .message(
            MessageBuilder::new("Test")
                .oneof_field("choice", "number", 1, Type::Int32, None)
                .oneof_field("choice", "name", 2, Type::String, None)
                .optional("optional_pi", 3, Type::Double)
                .repeated("values", 4, Type::Int32)
                .repeated("flags", 5, Type::Bool)
                .enum_field("status", 6, "Status"),
        )
        .build();
    let index = Arc::new(DescriptorIndex::from_files(&[file]).unwrap());
    let config = GenerateConfig::new().with_type_prefix("");
    OpaqueApi::generate(index, &["scenario.proto".into()], &config).unwrap()
}

fn doc(v: serde_json::Value) -> SqlValue {
    SqlValue::Json(v)
}

#[test]
fn optional_double_is_stored_tagged() {
    let api = api();
    let empty = api.invoke("new", &[]).unwrap();
    assert_eq!(empty, doc(json!({})));

    let pi = api
        .invoke("set_optional_pi", &[empty.clone(), SqlValue::Double(std::f64::consts::PI)])
        .unwrap();
    assert_eq!(pi, doc(json!({"3": "binary64:0x400921fb54442d18"})));
    assert_eq!(
        api.invoke("get_optional_pi", &[pi.clone()]).unwrap(),
        SqlValue::Double(std::f64::consts::PI)
    );

    let zero = api.invoke("set_optional_pi", &[empty, SqlValue::Double(0.0)]).unwrap();
    assert_eq!(api.invoke("has_optional_pi", &[zero]).unwrap(), SqlValue::Bool(true));
}

#[test]
fn oneof_members_exclude_each_other() {
    let api = api();
    let named = api
        .invoke("set_name", &[SqlValue::Null, SqlValue::Text("world".into())])
        .unwrap();
    assert_eq!(named, doc(json!({"2": "world"})));
    assert_eq!(
        api.invoke("which_choice", &[named.clone()]).unwrap(),
        SqlValue::Text("name".into())
    );
    assert_eq!(api.invoke("get_number", &[named.clone()]).unwrap(), SqlValue::Int(0));

    let numbered = api.invoke("set_number", &[named, SqlValue::Int(5)]).unwrap();
    assert_eq!(numbered, doc(json!({"1": 5})));
    assert_eq!(api.invoke("clear_choice", &[numbered.clone()]).unwrap(), doc(json!({})));
    assert_eq!(
        api.invoke("which_choice", &[doc(json!({}))]).unwrap(),
        SqlValue::Null
    );
}

#[test]
fn repeated_add_count_remove() {
    let api = api();
    let mut d = api.invoke("new", &[]).unwrap();
    for v in [10, 20, 30] {
        d = api.invoke("add_values", &[d, SqlValue::Int(v)]).unwrap();
    }
    assert_eq!(d, doc(json!({"4": [10, 20, 30]})));
    assert_eq!(api.invoke("count_values", &[d.clone()]).unwrap(), SqlValue::Int(3));
    assert_eq!(
        api.invoke("get_values", &[d.clone(), SqlValue::Int(1)]).unwrap(),
        SqlValue::Int(20)
    );

    d = api.invoke("remove_values", &[d, SqlValue::Int(1)]).unwrap();
    assert_eq!(d, doc(json!({"4": [10, 30]})));
    d = api.invoke("insert_values", &[d, SqlValue::Int(2), SqlValue::Int(40)]).unwrap();
    assert_eq!(d, doc(json!({"4": [10, 30, 40]})));

    for _ in 0..3 {
        d = api.invoke("remove_values", &[d, SqlValue::Int(0)]).unwrap();
    }
    assert_eq!(d, doc(json!({})));
    assert_eq!(api.invoke("count_values", &[d.clone()]).unwrap(), SqlValue::Int(0));

    let err = api.invoke("remove_values", &[d, SqlValue::Int(0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);
}

#[test]
fn enum_strings_round_trip_and_pass_nulls() {
    let api = api();
    assert_eq!(
        api.invoke("status_from_string", &[SqlValue::Text("STATUS_ACTIVE".into())]).unwrap(),
        SqlValue::Int(1)
    );
    assert_eq!(
        api.invoke("status_to_string", &[SqlValue::Int(2)]).unwrap(),
        SqlValue::Text("STATUS_INACTIVE".into())
    );
    assert_eq!(api.invoke("status_to_string", &[SqlValue::Int(999)]).unwrap(), SqlValue::Null);
    assert_eq!(
        api.invoke("status_from_string", &[SqlValue::Text("UNKNOWN".into())]).unwrap(),
        SqlValue::Null
    );
    assert_eq!(api.invoke("status_from_string", &[SqlValue::Null]).unwrap(), SqlValue::Null);
    assert_eq!(api.invoke("status_to_string", &[SqlValue::Null]).unwrap(), SqlValue::Null);

    let d = api
        .invoke(
            "set_status__from_name",
            &[SqlValue::Null, SqlValue::Text("STATUS_INACTIVE".into())],
        )
        .unwrap();
    assert_eq!(d, doc(json!({"6": 2})));
    assert_eq!(
        api.invoke("get_status__as_name", &[d]).unwrap(),
        SqlValue::Text("STATUS_INACTIVE".into())
    );
}

#[test]
fn repeated_bools_are_json_booleans() {
    let api = api();
    let mut d = SqlValue::Null;
    for b in [true, false, true] {
        d = api.invoke("add_flags", &[d, SqlValue::Bool(b)]).unwrap();
    }
    assert_eq!(d, doc(json!({"5": [true, false, true]})));
    assert_eq!(
        api.invoke("get_all_flags", &[d]).unwrap(),
        doc(json!([true, false, true]))
    );
}

#[test]
fn bool_arguments_accept_sql_tinyint() {
    let api = api();
    let d = api.invoke("add_flags", &[doc(json!({})), SqlValue::Int(1)]).unwrap();
    let d = api.invoke("add_flags", &[d, SqlValue::Int(0)]).unwrap();
    assert_eq!(d, doc(json!({"5": [true, false]})));

    let err = api.invoke("add_flags", &[d, SqlValue::Int(7)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn converters_round_trip_through_wire_and_json() {
    let api = api();
    let d = doc(json!({"2": "x", "4": [1, 2]}));
    let wire = api.invoke("to_protobuf", &[d.clone()]).unwrap();
    assert_eq!(wire, SqlValue::Blob(vec![0x12, 0x01, b'x', 0x22, 0x02, 0x01, 0x02]));
    assert_eq!(api.invoke("from_protobuf", &[wire]).unwrap(), d);

    let text = api.invoke("to_json", &[d.clone()]).unwrap();
    assert_eq!(text, SqlValue::Text(r#"{"name":"x","values":[1,2]}"#.into()));
    assert_eq!(api.invoke("from_json", &[text]).unwrap(), d);
}
