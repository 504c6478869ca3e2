#![allow(dead_code)]

use prost_types::field_descriptor_proto::Type;
use protosql_descriptor::builder::{EnumBuilder, FileBuilder, MessageBuilder};
use protosql_descriptor::{DescriptorIndex, MessageDescriptor};

pub const SAMPLE: &str = "demo.Sample";

pub fn sample_file() -> prost_types::FileDescriptorProto {
    FileBuilder::new("demo/sample.proto", "demo")
        .enumeration(
            EnumBuilder::new("Color")
                .value("COLOR_UNSPECIFIED", 0)
                .value("RED", 1)
                .value("GREEN", 2),
        )
        .message(
            MessageBuilder::new("Sample")
                .field("int32_field", 1, Type::Int32)
                .optional("optional_pi", 2, Type::Double)
                .field("name", 3, Type::String)
                .repeated("tags", 4, Type::Int32)
                .repeated("flags", 5, Type::Bool)
                .message_field("child", 6, "Child")
                .message_field("created", 7, ".google.protobuf.Timestamp")
                .enum_field("color", 8, "Color")
                .oneof_field("choice", "number", 10, Type::Int32, None)
                .oneof_field("choice", "label", 11, Type::String, None)
                .map_field("counts", 12, Type::String, Type::Int32, None)
                .field("big", 13, Type::Uint64)
                .field("ratio", 14, Type::Float)
                .message_field("meta", 15, ".google.protobuf.Struct")
                .field("blob", 16, Type::Bytes)
                .message_field("wrapped", 17, ".google.protobuf.Int64Value")
                .message_field("extra", 18, ".google.protobuf.Any")
                .nested(
                    MessageBuilder::new("Child")
                        .field("id", 1, Type::Int64)
                        .field("count", 2, Type::Int32),
                ),
        )
        .build()
}

pub fn sample_index() -> DescriptorIndex {
    DescriptorIndex::from_files(&[sample_file()]).expect("sample descriptors index")
}

pub fn sample(index: &DescriptorIndex) -> &MessageDescriptor {
    index.message(SAMPLE).expect("demo.Sample is indexed")
}
