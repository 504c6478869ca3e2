//! Built-in descriptors for the `google.protobuf` well-known types.

use prost_types::field_descriptor_proto::Type;
use prost_types::FileDescriptorProto;

use crate::builder::{EnumBuilder, FileBuilder, MessageBuilder};

const PACKAGE: &str = "google.protobuf";

/// Well-known types with a special ProtoJSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownType {
    Timestamp,
    Duration,
    FieldMask,
    DoubleValue,
    FloatValue,
    Int64Value,
    UInt64Value,
    Int32Value,
    UInt32Value,
    BoolValue,
    StringValue,
    BytesValue,
    Struct,
    Value,
    ListValue,
    NullValue,
    Any,
    Empty,
}

impl WellKnownType {
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        let short = name.strip_prefix("google.protobuf.")?;
        Some(match short {
            "Timestamp" => Self::Timestamp,
            "Duration" => Self::Duration,
            "FieldMask" => Self::FieldMask,
            "DoubleValue" => Self::DoubleValue,
            "FloatValue" => Self::FloatValue,
            "Int64Value" => Self::Int64Value,
            "UInt64Value" => Self::UInt64Value,
            "Int32Value" => Self::Int32Value,
            "UInt32Value" => Self::UInt32Value,
            "BoolValue" => Self::BoolValue,
            "StringValue" => Self::StringValue,
            "BytesValue" => Self::BytesValue,
            "Struct" => Self::Struct,
            "Value" => Self::Value,
            "ListValue" => Self::ListValue,
            "NullValue" => Self::NullValue,
            "Any" => Self::Any,
            "Empty" => Self::Empty,
            _ => return None,
        })
    }

    pub fn is_wrapper(self) -> bool {
        matches!(
            self,
            Self::DoubleValue
                | Self::FloatValue
                | Self::Int64Value
                | Self::UInt64Value
                | Self::Int32Value
                | Self::UInt32Value
                | Self::BoolValue
                | Self::StringValue
                | Self::BytesValue
        )
    }
}

/// `google/protobuf/*.proto` files for every well-known type.
pub fn builtin_files() -> Vec<FileDescriptorProto> {
    vec![
        FileBuilder::new("google/protobuf/timestamp.proto", PACKAGE)
            .message(seconds_nanos("Timestamp"))
            .build(),
        FileBuilder::new("google/protobuf/duration.proto", PACKAGE)
            .message(seconds_nanos("Duration"))
            .build(),
        FileBuilder::new("google/protobuf/field_mask.proto", PACKAGE)
            .message(MessageBuilder::new("FieldMask").repeated("paths", 1, Type::String))
            .build(),
        wrappers(),
        struct_file(),
        FileBuilder::new("google/protobuf/any.proto", PACKAGE)
            .message(
                MessageBuilder::new("Any")
                    .field("type_url", 1, Type::String)
                    .field("value", 2, Type::Bytes),
            )
            .build(),
        FileBuilder::new("google/protobuf/empty.proto", PACKAGE)
            .message(MessageBuilder::new("Empty"))
            .build(),
    ]
}

fn seconds_nanos(name: &str) -> MessageBuilder {
    MessageBuilder::new(name)
        .field("seconds", 1, Type::Int64)
        .field("nanos", 2, Type::Int32)
}

fn wrappers() -> FileDescriptorProto {
    [
        ("DoubleValue", Type::Double),
        ("FloatValue", Type::Float),
        ("Int64Value", Type::Int64),
        ("UInt64Value", Type::Uint64),
        ("Int32Value", Type::Int32),
        ("UInt32Value", Type::Uint32),
        ("BoolValue", Type::Bool),
        ("StringValue", Type::String),
        ("BytesValue", Type::Bytes),
    ]
    .into_iter()
    .fold(
        FileBuilder::new("google/protobuf/wrappers.proto", PACKAGE),
        |file, (name, ty)| file.message(MessageBuilder::new(name).field("value", 1, ty)),
    )
    .build()
}

fn struct_file() -> FileDescriptorProto {
    FileBuilder::new("google/protobuf/struct.proto", PACKAGE)
        .message(MessageBuilder::new("Struct").map_field(
            "fields",
            1,
            Type::String,
            Type::Message,
            Some(".google.protobuf.Value"),
        ))
        .message(
            MessageBuilder::new("Value")
                .oneof_field(
                    "kind",
                    "null_value",
                    1,
                    Type::Enum,
                    Some(".google.protobuf.NullValue"),
                )
                .oneof_field("kind", "number_value", 2, Type::Double, None)
                .oneof_field("kind", "string_value", 3, Type::String, None)
                .oneof_field("kind", "bool_value", 4, Type::Bool, None)
                .oneof_field(
                    "kind",
                    "struct_value",
                    5,
                    Type::Message,
                    Some(".google.protobuf.Struct"),
                )
                .oneof_field(
                    "kind",
                    "list_value",
                    6,
                    Type::Message,
                    Some(".google.protobuf.ListValue"),
                ),
        )
        .message(MessageBuilder::new("ListValue").repeated_message(
            "values",
            1,
            ".google.protobuf.Value",
        ))
        .enumeration(EnumBuilder::new("NullValue").value("NULL_VALUE", 0))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_wkt_names() {
        assert_eq!(
            WellKnownType::from_full_name(".google.protobuf.Timestamp"),
            Some(WellKnownType::Timestamp)
        );
        assert_eq!(
            WellKnownType::from_full_name("google.protobuf.UInt64Value"),
            Some(WellKnownType::UInt64Value)
        );
        assert_eq!(WellKnownType::from_full_name("google.protobuf.Api"), None);
        assert_eq!(WellKnownType::from_full_name("acme.Timestamp"), None);
        assert!(WellKnownType::BytesValue.is_wrapper());
        assert!(!WellKnownType::Struct.is_wrapper());
    }

    #[test]
    fn builtin_files_are_distinct() {
        let files = builtin_files();
        let mut names: Vec<&str> = files.iter().map(|f| f.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), files.len());
    }
}
