//! Descriptor sets in JSON form (`buf build -o set.json`, `protoc` piped
//! through a JSON printer).
//!
//! Only the parts the index needs are read; everything else is ignored.

use std::collections::BTreeMap;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FieldOptions, FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DescriptorError, Result};
use crate::index::DescriptorIndex;

impl DescriptorIndex {
    /// Indexes a JSON-encoded `FileDescriptorSet`.
    pub fn from_json(text: &str) -> Result<Self> {
        let set = file_descriptor_set_from_json(text)?;
        Self::from_file_descriptor_set(&set)
    }
}

pub fn file_descriptor_set_from_json(text: &str) -> Result<FileDescriptorSet> {
    let set: FileDescriptorSetJson = serde_json::from_str(text)?;
    let file = set
        .file
        .into_iter()
        .map(FileDescriptorProtoJson::into_proto)
        .collect::<Result<Vec<_>>>()?;
    Ok(FileDescriptorSet { file })
}

// =============================================================================
// Descriptor JSON (subset)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct FileDescriptorSetJson {
    #[serde(default)]
    file: Vec<FileDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileDescriptorProtoJson {
    name: Option<String>,
    package: Option<String>,
    #[serde(default)]
    dependency: Vec<String>,
    #[serde(default, rename = "messageType", alias = "message_type")]
    message_type: Vec<DescriptorProtoJson>,
    #[serde(default, rename = "enumType", alias = "enum_type")]
    enum_type: Vec<EnumDescriptorProtoJson>,
    syntax: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DescriptorProtoJson {
    name: Option<String>,
    #[serde(default)]
    field: Vec<FieldDescriptorProtoJson>,
    #[serde(default, rename = "nestedType", alias = "nested_type")]
    nested_type: Vec<DescriptorProtoJson>,
    #[serde(default, rename = "enumType", alias = "enum_type")]
    enum_type: Vec<EnumDescriptorProtoJson>,
    #[serde(default, rename = "oneofDecl", alias = "oneof_decl")]
    oneof_decl: Vec<OneofDescriptorProtoJson>,
    #[serde(default)]
    options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct OneofDescriptorProtoJson {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldDescriptorProtoJson {
    name: Option<String>,
    number: Option<i32>,
    label: Option<EnumJson>,
    #[serde(rename = "type")]
    typ: Option<EnumJson>,
    #[serde(rename = "typeName", alias = "type_name")]
    type_name: Option<String>,
    #[serde(rename = "jsonName", alias = "json_name")]
    json_name: Option<String>,
    #[serde(rename = "defaultValue", alias = "default_value")]
    default_value: Option<String>,
    #[serde(default)]
    options: Option<OptionsJson>,
    #[serde(rename = "oneofIndex", alias = "oneof_index")]
    oneof_index: Option<i32>,
    #[serde(rename = "proto3Optional", alias = "proto3_optional")]
    proto3_optional: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnumDescriptorProtoJson {
    name: Option<String>,
    #[serde(default)]
    value: Vec<EnumValueDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnumValueDescriptorProtoJson {
    name: Option<String>,
    number: Option<i32>,
}

/// Enum-typed descriptor fields appear either as the constant name
/// (`"TYPE_INT32"`) or as its number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EnumJson {
    Number(i32),
    Name(String),
}

type OptionsJson = BTreeMap<String, Value>;

// =============================================================================
// Conversion into prost-types
// =============================================================================

impl FileDescriptorProtoJson {
    fn into_proto(self) -> Result<FileDescriptorProto> {
        Ok(FileDescriptorProto {
            name: self.name,
            package: self.package,
            dependency: self.dependency,
            message_type: self
                .message_type
                .into_iter()
                .map(DescriptorProtoJson::into_proto)
                .collect::<Result<_>>()?,
            enum_type: self
                .enum_type
                .into_iter()
                .map(EnumDescriptorProtoJson::into_proto)
                .collect(),
            syntax: self.syntax,
            ..Default::default()
        })
    }
}

impl DescriptorProtoJson {
    fn into_proto(self) -> Result<DescriptorProto> {
        let map_entry = option_bool(&self.options, "mapEntry", "map_entry");
        Ok(DescriptorProto {
            name: self.name,
            field: self
                .field
                .into_iter()
                .map(FieldDescriptorProtoJson::into_proto)
                .collect::<Result<_>>()?,
            nested_type: self
                .nested_type
                .into_iter()
                .map(DescriptorProtoJson::into_proto)
                .collect::<Result<_>>()?,
            enum_type: self
                .enum_type
                .into_iter()
                .map(EnumDescriptorProtoJson::into_proto)
                .collect(),
            oneof_decl: self
                .oneof_decl
                .into_iter()
                .map(|o| OneofDescriptorProto {
                    name: o.name,
                    ..Default::default()
                })
                .collect(),
            options: map_entry.map(|map_entry| MessageOptions {
                map_entry: Some(map_entry),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

impl FieldDescriptorProtoJson {
    fn into_proto(self) -> Result<FieldDescriptorProto> {
        let label = self
            .label
            .map(|l| {
                l.resolve("label", |name| {
                    Label::from_str_name(name).map(|l| l as i32)
                })
            })
            .transpose()?;
        let typ = self
            .typ
            .map(|t| t.resolve("type", |name| Type::from_str_name(name).map(|t| t as i32)))
            .transpose()?;
        let packed = option_bool(&self.options, "packed", "packed");
        Ok(FieldDescriptorProto {
            name: self.name,
            number: self.number,
            label,
            r#type: typ,
            type_name: self.type_name,
            json_name: self.json_name,
            default_value: self.default_value,
            oneof_index: self.oneof_index,
            proto3_optional: self.proto3_optional,
            options: packed.map(|packed| FieldOptions {
                packed: Some(packed),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

impl EnumDescriptorProtoJson {
    fn into_proto(self) -> EnumDescriptorProto {
        EnumDescriptorProto {
            name: self.name,
            value: self
                .value
                .into_iter()
                .map(|v| EnumValueDescriptorProto {
                    name: v.name,
                    number: v.number,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

impl EnumJson {
    fn resolve(self, what: &str, by_name: impl Fn(&str) -> Option<i32>) -> Result<i32> {
        match self {
            EnumJson::Number(n) => Ok(n),
            EnumJson::Name(name) => by_name(&name)
                .ok_or_else(|| DescriptorError::JsonShape(format!("unknown {what} `{name}`"))),
        }
    }
}

fn option_bool(options: &Option<OptionsJson>, camel: &str, snake: &str) -> Option<bool> {
    let options = options.as_ref()?;
    options
        .get(camel)
        .or_else(|| options.get(snake))
        .and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{Cardinality, FieldKind};

    const SET: &str = r#"{
      "file": [{
        "name": "acme/shop.proto",
        "package": "acme",
        "syntax": "proto3",
        "messageType": [{
          "name": "Order",
          "field": [
            {"name": "id", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT64", "jsonName": "id"},
            {"name": "line_items", "number": 2, "label": "LABEL_REPEATED", "type": "TYPE_MESSAGE", "typeName": ".acme.Order.LineItem"},
            {"name": "tags", "number": 3, "label": 3, "type": 13, "options": {"packed": false}},
            {"name": "labels", "number": 4, "label": "LABEL_REPEATED", "type": "TYPE_MESSAGE", "typeName": ".acme.Order.LabelsEntry"}
          ],
          "nestedType": [
            {"name": "LineItem", "field": [{"name": "sku", "number": 1, "type": "TYPE_STRING"}]},
            {"name": "LabelsEntry", "options": {"mapEntry": true}, "field": [
              {"name": "key", "number": 1, "type": "TYPE_STRING"},
              {"name": "value", "number": 2, "type": "TYPE_STRING"}
            ]}
          ]
        }]
      }]
    }"#;

    #[test]
    fn indexes_json_descriptor_set() {
        let index = DescriptorIndex::from_json(SET).unwrap();
        let order = index.message("acme.Order").unwrap();

        let id = order.field(1).unwrap();
        assert_eq!(id.kind, FieldKind::Int64);
        assert_eq!(id.cardinality, Cardinality::Singular);

        let items = order.field_by_name("line_items").unwrap();
        assert_eq!(items.json_name, "lineItems");
        assert_eq!(items.type_name.as_deref(), Some("acme.Order.LineItem"));

        let tags = order.field(3).unwrap();
        assert_eq!(tags.kind, FieldKind::UInt32);
        assert!(!tags.packed);

        assert!(order.field(4).unwrap().is_map());
    }

    #[test]
    fn rejects_unknown_type_names() {
        let text = r#"{"file":[{"name":"a.proto","messageType":[{"name":"A","field":[{"name":"x","number":1,"type":"TYPE_NOPE"}]}]}]}"#;
        let err = DescriptorIndex::from_json(text).unwrap_err();
        assert!(err.to_string().contains("TYPE_NOPE"));
    }
}
