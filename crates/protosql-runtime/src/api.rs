//! Whole-message conversions under their stable routine names.
//!
//! Handle-based conversions exist twice: as [`Registry`] methods and as free
//! functions over [`Registry::global`].

use protosql_descriptor::{DescriptorIndex, MessageDescriptor};
use protosql_wire::WireMessage;
use serde_json::Value;
use tracing::trace;

use crate::codec::{self, DecodeOptions};
use crate::error::{Error, Result};
use crate::proto_json::{self, JsonParseOptions, JsonPrintOptions};
use crate::registry::Registry;

fn message<'i>(index: &'i DescriptorIndex, type_name: &str) -> Result<&'i MessageDescriptor> {
    index
        .message(type_name)
        .ok_or_else(|| Error::unknown_type(type_name))
}

fn parse_json(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

fn print_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Wire bytes → ProtoJSON text.
pub fn index_message_to_json(
    index: &DescriptorIndex,
    type_name: &str,
    wire: &[u8],
    options: &JsonPrintOptions,
) -> Result<String> {
    let message = message(index, type_name)?;
    let doc = codec::decode(index, message, wire, &DecodeOptions::default())?;
    print_json(&proto_json::to_proto_json(index, message, &doc, options)?)
}

/// ProtoJSON text → wire bytes.
pub fn index_json_to_message(
    index: &DescriptorIndex,
    type_name: &str,
    json: &str,
    options: &JsonParseOptions,
) -> Result<Vec<u8>> {
    let message = message(index, type_name)?;
    let doc = proto_json::from_proto_json(index, message, &parse_json(json)?, options)?;
    codec::encode(index, message, &doc)
}

impl Registry {
    pub fn message_to_json(&self, handle: &str, type_name: &str, wire: &[u8]) -> Result<String> {
        let index = self.get(handle)?;
        trace!(handle, type_name, bytes = wire.len(), "message_to_json");
        index_message_to_json(&index, type_name, wire, &JsonPrintOptions::default())
    }

    pub fn json_to_message(&self, handle: &str, type_name: &str, json: &str) -> Result<Vec<u8>> {
        let index = self.get(handle)?;
        trace!(handle, type_name, "json_to_message");
        index_json_to_message(&index, type_name, json, &JsonParseOptions::default())
    }

    /// Wire bytes → NumberJSON; unknown fields are kept under `_u`.
    pub fn message_to_number_json(
        &self,
        handle: &str,
        type_name: &str,
        wire: &[u8],
    ) -> Result<Value> {
        let index = self.get(handle)?;
        let message = message(&index, type_name)?;
        codec::decode(&index, message, wire, &DecodeOptions::round_trip())
    }

    pub fn number_json_to_message(
        &self,
        handle: &str,
        type_name: &str,
        number_json: &Value,
    ) -> Result<Vec<u8>> {
        let index = self.get(handle)?;
        let message = message(&index, type_name)?;
        codec::encode(&index, message, number_json)
    }
}

pub fn descriptor_set_load(handle: &str, bytes: &[u8]) -> Result<()> {
    Registry::global().load(handle, bytes).map(|_| ())
}

pub fn descriptor_set_delete(handle: &str) -> Result<()> {
    Registry::global().delete(handle)
}

pub fn message_to_json(handle: &str, type_name: &str, wire: &[u8]) -> Result<String> {
    Registry::global().message_to_json(handle, type_name, wire)
}

pub fn json_to_message(handle: &str, type_name: &str, json: &str) -> Result<Vec<u8>> {
    Registry::global().json_to_message(handle, type_name, json)
}

pub fn message_to_number_json(handle: &str, type_name: &str, wire: &[u8]) -> Result<Value> {
    Registry::global().message_to_number_json(handle, type_name, wire)
}

pub fn number_json_to_message(handle: &str, type_name: &str, number_json: &Value) -> Result<Vec<u8>> {
    Registry::global().number_json_to_message(handle, type_name, number_json)
}

/// Schema-free scan of wire bytes.
pub fn message_to_wire_json(wire: &[u8]) -> Result<Value> {
    Ok(WireMessage::scan(wire)?.to_json())
}

pub fn wire_json_to_message(wire_json: &Value) -> Result<Vec<u8>> {
    Ok(WireMessage::from_json(wire_json)?.encode())
}

/// ProtoJSON → NumberJSON against a JSON-encoded `FileDescriptorSet`.
pub fn json_to_number_json(descriptor_set_json: &str, type_name: &str, json: &str) -> Result<Value> {
    let index = DescriptorIndex::from_json(descriptor_set_json)?;
    let message = message(&index, type_name)?;
    proto_json::from_proto_json(&index, message, &parse_json(json)?, &JsonParseOptions::default())
}

pub fn number_json_to_json(
    descriptor_set_json: &str,
    type_name: &str,
    number_json: &Value,
    emit_default_values: bool,
) -> Result<String> {
    let index = DescriptorIndex::from_json(descriptor_set_json)?;
    let message = message(&index, type_name)?;
    let options = JsonPrintOptions {
        emit_default_values,
    };
    print_json(&proto_json::to_proto_json(&index, message, number_json, &options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use protosql_descriptor::builder::{descriptor_set, FileBuilder, MessageBuilder};
    use prost::Message;
    use prost_types::field_descriptor_proto::Type;
    use serde_json::json;

    fn registry() -> Registry {
        let file = FileBuilder::new("t.proto", "t")
            .message(MessageBuilder::new("Test").field("int32_field", 1, Type::Int32))
            .build();
        let registry = Registry::new();
        registry
            .load("t", &descriptor_set(vec![file]).encode_to_vec())
            .unwrap();
        registry
    }

    #[test]
    fn json_and_wire_round_trip() {
        let registry = registry();
        let wire = registry
            .json_to_message("t", "t.Test", r#"{"int32Field": 123}"#)
            .unwrap();
        assert_eq!(wire, vec![0x08, 0x7b]);
        let json = registry.message_to_json("t", "t.Test", &wire).unwrap();
        assert_eq!(json, r#"{"int32Field":123}"#);
    }

    #[test]
    fn unknown_fields_survive_number_json() {
        let registry = registry();
        let wire = [0x08, 0x01, 0x10, 0x02];
        let doc = registry.message_to_number_json("t", "t.Test", &wire).unwrap();
        assert_eq!(doc["1"], json!(1));
        let back = registry.number_json_to_message("t", "t.Test", &doc).unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn lookup_failures() {
        let registry = registry();
        let err = registry.message_to_json("nope", "t.Test", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchHandle);
        let err = registry.message_to_json("t", "t.Missing", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        assert!(err.to_string().starts_with("UnknownType: "));
    }

    #[test]
    fn wire_json_needs_no_schema() {
        let doc = message_to_wire_json(&[0x08, 0x96, 0x01]).unwrap();
        assert_eq!(doc, json!({"1": [{"i": 0, "t": 0, "v": 150}]}));
        assert_eq!(wire_json_to_message(&doc).unwrap(), vec![0x08, 0x96, 0x01]);
    }
}
