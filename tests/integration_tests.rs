//! End-to-end tests across the protosql crates:
//! - descriptor set bytes → registry → ProtoJSON / wire conversions
//! - the three field-routine surfaces against the codec
//! - protoc plugin request → SQL artifacts
//! - the generated Opaque API against the runtime conversions
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;

use prost::Message;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::field_descriptor_proto::Type;
use protosql_codegen::{GenerateConfig, OpaqueApi};
use protosql_descriptor::builder::{descriptor_set, EnumBuilder, FileBuilder, MessageBuilder};
use protosql_descriptor::DescriptorIndex;
use protosql_runtime::api;
use protosql_runtime::routine::{call, SqlValue};
use protosql_runtime::{ErrorKind, Registry};
use serde_json::json;

fn shop_file() -> prost_types::FileDescriptorProto {
    FileBuilder::new("shop/order.proto", "shop")
        .enumeration(
            EnumBuilder::new("Status")
                .value("STATUS_UNSPECIFIED", 0)
                .value("OPEN", 1)
                .value("SHIPPED", 2),
        )
        .message(
            MessageBuilder::new("Order")
                .field("int32_field", 1, Type::Int32)
                .repeated("skus", 2, Type::String)
                .enum_field("status", 3, "Status")
                .message_field("placed_at", 4, ".google.protobuf.Timestamp")
                .oneof_field("payment", "card", 5, Type::String, None)
                .oneof_field("payment", "voucher", 6, Type::Int64, None),
        )
        .build()
}

fn shop_set_bytes() -> Vec<u8> {
    descriptor_set(vec![shop_file()]).encode_to_vec()
}

// ============================================================================
// Registry + whole-message conversions
// ============================================================================

#[test]
fn int32_field_json_and_wire_agree() {
    let registry = Registry::new();
    registry.load("shop", &shop_set_bytes()).unwrap();

    let wire = registry
        .json_to_message("shop", "shop.Order", r#"{"int32Field":123}"#)
        .unwrap();
    assert_eq!(wire, vec![0x08, 0x7b]);
    assert_eq!(
        registry.message_to_json("shop", "shop.Order", &wire).unwrap(),
        r#"{"int32Field":123}"#
    );
    assert_eq!(
        registry.message_to_json("shop", "shop.Order", &[0x08, 0x00]).unwrap(),
        "{}"
    );
}

#[test]
fn full_message_round_trips_through_every_form() {
    let registry = Registry::new();
    registry.load("shop", &shop_set_bytes()).unwrap();
    let json = r#"{"int32Field":7,"skus":["a","b"],"status":"SHIPPED","placedAt":"2024-05-01T12:00:00Z","voucher":"99"}"#;

    let wire = registry.json_to_message("shop", "shop.Order", json).unwrap();
    let doc = registry
        .message_to_number_json("shop", "shop.Order", &wire)
        .unwrap();
    assert_eq!(
        doc,
        json!({"1": 7, "2": ["a", "b"], "3": 2, "4": {"1": 1714564800}, "6": 99})
    );
    assert_eq!(
        registry.number_json_to_message("shop", "shop.Order", &doc).unwrap(),
        wire
    );
    assert_eq!(registry.message_to_json("shop", "shop.Order", &wire).unwrap(), json);

    let wire_json = api::message_to_wire_json(&wire).unwrap();
    assert_eq!(api::wire_json_to_message(&wire_json).unwrap(), wire);
}

#[test]
fn global_registry_lifecycle() {
    let handle = "integration-global-lifecycle";
    api::descriptor_set_load(handle, &shop_set_bytes()).unwrap();
    let err = api::descriptor_set_load(handle, &shop_set_bytes()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateHandle);
    assert_eq!(err.sqlstate(), "45000");

    assert_eq!(
        api::json_to_message(handle, "shop.Order", r#"{"status":"OPEN"}"#).unwrap(),
        vec![0x18, 0x01]
    );
    let err = api::json_to_message(handle, "shop.Nope", "{}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownType);

    api::descriptor_set_delete(handle).unwrap();
    let err = api::message_to_json(handle, "shop.Order", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchHandle);
    assert!(err.to_string().starts_with("NoSuchHandle: "));
}

#[test]
fn descriptor_json_conversions() {
    let set = r#"{"file": [{
        "name": "t.proto", "package": "t", "syntax": "proto3",
        "messageType": [{"name": "T", "field": [
            {"name": "amount", "number": 1, "type": "TYPE_DOUBLE", "label": "LABEL_OPTIONAL", "jsonName": "amount"},
            {"name": "big", "number": 2, "type": "TYPE_UINT64", "label": "LABEL_OPTIONAL", "jsonName": "big"}
        ]}]
    }]}"#;
    let doc = api::json_to_number_json(set, "t.T", r#"{"amount": 1.5, "big": "42"}"#).unwrap();
    assert_eq!(doc, json!({"1": "binary64:0x3ff8000000000000", "2": 42}));
    assert_eq!(
        api::number_json_to_json(set, "t.T", &doc, false).unwrap(),
        r#"{"amount":1.5,"big":"42"}"#
    );
    assert_eq!(
        api::number_json_to_json(set, "t.T", &json!({}), true).unwrap(),
        r#"{"amount":0.0,"big":"0"}"#
    );
}

// ============================================================================
// Field routines
// ============================================================================

#[test]
fn field_routines_agree_with_the_codec() {
    let registry = Registry::new();
    registry.load("shop", &shop_set_bytes()).unwrap();
    let wire = registry
        .json_to_message("shop", "shop.Order", r#"{"skus":["a"]}"#)
        .unwrap();

    let wire = match call(
        "message_add_repeated_string_field",
        &[SqlValue::Blob(wire), SqlValue::Int(2), SqlValue::Text("b".into())],
    )
    .unwrap()
    {
        SqlValue::Blob(bytes) => bytes,
        other => panic!("expected bytes, got {other}"),
    };
    assert_eq!(
        registry.message_to_json("shop", "shop.Order", &wire).unwrap(),
        r#"{"skus":["a","b"]}"#
    );

    let count = call(
        "wire_count_repeated_string_field",
        &[SqlValue::Json(api::message_to_wire_json(&wire).unwrap()), SqlValue::Int(2)],
    )
    .unwrap();
    assert_eq!(count, SqlValue::Int(2));
}

// ============================================================================
// Code generation
// ============================================================================

#[test]
fn plugin_request_yields_sql() {
    let request = CodeGeneratorRequest {
        file_to_generate: vec!["shop/order.proto".into()],
        parameter: Some("descriptor_set_name=shop,type_prefix={package}_{name}".into()),
        proto_file: vec![shop_file()],
        ..Default::default()
    };
    let bytes = protosql_codegen::plugin::process(&request.encode_to_vec()).unwrap();
    let response = CodeGeneratorResponse::decode(bytes.as_slice()).unwrap();
    assert_eq!(response.error, None);
    assert_eq!(response.file.len(), 1);

    let sql = response.file[0].content();
    assert_eq!(response.file[0].name(), "shop/order.sql");
    assert!(sql.contains("-- descriptor set: shop"));
    assert!(sql.contains("CREATE FUNCTION `shop_order_get_int32_field`(`doc` JSON) RETURNS INT DETERMINISTIC"));
    assert!(sql.contains("CREATE FUNCTION `shop_order_which_payment`"));
    assert!(sql.contains("CREATE FUNCTION `shop_status_from_string`(`name` LONGTEXT) RETURNS BIGINT"));
    assert!(sql.contains("RETURN number_json_to_message('shop', 'shop.Order', `doc`);"));
}

#[test]
fn opaque_api_matches_the_runtime_conversions() {
    let index = Arc::new(DescriptorIndex::from_files(&[shop_file()]).unwrap());
    let api = OpaqueApi::generate(
        index,
        &["shop/order.proto".into()],
        &GenerateConfig::new().with_descriptor_set_name("shop"),
    )
    .unwrap();
    let registry = Registry::new();
    registry.load("shop", &shop_set_bytes()).unwrap();

    let mut doc = api.invoke("order_new", &[]).unwrap();
    doc = api.invoke("order_set_int32_field", &[doc, SqlValue::Int(5)]).unwrap();
    doc = api.invoke("order_add_skus", &[doc, SqlValue::Text("x".into())]).unwrap();
    doc = api
        .invoke("order_set_status__from_name", &[doc, SqlValue::Text("OPEN".into())])
        .unwrap();
    doc = api.invoke("order_set_card", &[doc, SqlValue::Text("visa".into())]).unwrap();
    doc = api.invoke("order_set_voucher", &[doc, SqlValue::Int(3)]).unwrap();
    assert_eq!(
        api.invoke("order_which_payment", &[doc.clone()]).unwrap(),
        SqlValue::Text("voucher".into())
    );
    assert_eq!(api.invoke("order_has_card", &[doc.clone()]).unwrap(), SqlValue::Bool(false));

    let SqlValue::Blob(wire) = api.invoke("order_to_protobuf", &[doc.clone()]).unwrap() else {
        panic!("expected wire bytes");
    };
    assert_eq!(
        registry.message_to_json("shop", "shop.Order", &wire).unwrap(),
        r#"{"int32Field":5,"skus":["x"],"status":"OPEN","voucher":"3"}"#
    );
    assert_eq!(api.invoke("order_from_protobuf", &[SqlValue::Blob(wire)]).unwrap(), doc);
}
