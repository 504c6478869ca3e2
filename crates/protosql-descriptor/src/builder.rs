//! Programmatic construction of descriptor protos.
//!
//! ```
//! use protosql_descriptor::builder::{FileBuilder, MessageBuilder};
//! use prost_types::field_descriptor_proto::Type;
//!
//! let file = FileBuilder::new("test.proto", "test")
//!     .message(MessageBuilder::new("Test").field("value", 1, Type::Int32))
//!     .build();
//! assert_eq!(file.message_type[0].field.len(), 1);
//! ```
//!
//! Type references may be fully-qualified (`.pkg.Msg`) or relative; the
//! index resolves relative names from the enclosing message outwards.

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FieldOptions, FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
};

use crate::naming::{map_entry_name, to_json_name};

pub fn descriptor_set(files: Vec<FileDescriptorProto>) -> FileDescriptorSet {
    FileDescriptorSet { file: files }
}

#[derive(Debug, Clone)]
pub struct FileBuilder {
    file: FileDescriptorProto,
}

impl FileBuilder {
    /// A proto3 file.
    pub fn new(name: &str, package: &str) -> Self {
        Self::with_syntax(name, package, "proto3")
    }

    pub fn proto2(name: &str, package: &str) -> Self {
        Self::with_syntax(name, package, "proto2")
    }

    fn with_syntax(name: &str, package: &str, syntax: &str) -> Self {
        Self {
            file: FileDescriptorProto {
                name: Some(name.to_string()),
                package: (!package.is_empty()).then(|| package.to_string()),
                syntax: Some(syntax.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn dependency(mut self, path: &str) -> Self {
        self.file.dependency.push(path.to_string());
        self
    }

    pub fn message(mut self, message: MessageBuilder) -> Self {
        self.file.message_type.push(message.build());
        self
    }

    pub fn enumeration(mut self, e: EnumBuilder) -> Self {
        self.file.enum_type.push(e.build());
        self
    }

    pub fn build(self) -> FileDescriptorProto {
        self.file
    }
}

#[derive(Debug, Clone)]
pub struct MessageBuilder {
    proto: DescriptorProto,
}

impl MessageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            proto: DescriptorProto {
                name: Some(name.to_string()),
                ..Default::default()
            },
        }
    }

    /// Singular scalar field.
    pub fn field(self, name: &str, number: i32, ty: Type) -> Self {
        self.push(field_proto(name, number, Label::Optional, ty, None))
    }

    /// proto3 `optional` scalar field (wrapped in a synthetic oneof).
    pub fn optional(mut self, name: &str, number: i32, ty: Type) -> Self {
        let mut f = field_proto(name, number, Label::Optional, ty, None);
        f.proto3_optional = Some(true);
        f.oneof_index = Some(self.proto.oneof_decl.len() as i32);
        self.proto.oneof_decl.push(OneofDescriptorProto {
            name: Some(format!("_{name}")),
            ..Default::default()
        });
        self.push(f)
    }

    pub fn repeated(self, name: &str, number: i32, ty: Type) -> Self {
        self.push(field_proto(name, number, Label::Repeated, ty, None))
    }

    /// Repeated scalar declared `[packed = false]`.
    pub fn unpacked(self, name: &str, number: i32, ty: Type) -> Self {
        let mut f = field_proto(name, number, Label::Repeated, ty, None);
        f.options = Some(FieldOptions {
            packed: Some(false),
            ..Default::default()
        });
        self.push(f)
    }

    pub fn message_field(self, name: &str, number: i32, type_name: &str) -> Self {
        self.push(field_proto(
            name,
            number,
            Label::Optional,
            Type::Message,
            Some(type_name),
        ))
    }

    pub fn repeated_message(self, name: &str, number: i32, type_name: &str) -> Self {
        self.push(field_proto(
            name,
            number,
            Label::Repeated,
            Type::Message,
            Some(type_name),
        ))
    }

    pub fn enum_field(self, name: &str, number: i32, type_name: &str) -> Self {
        self.push(field_proto(
            name,
            number,
            Label::Optional,
            Type::Enum,
            Some(type_name),
        ))
    }

    pub fn repeated_enum(self, name: &str, number: i32, type_name: &str) -> Self {
        self.push(field_proto(
            name,
            number,
            Label::Repeated,
            Type::Enum,
            Some(type_name),
        ))
    }

    /// Adds a member to oneof `oneof`, declaring the group on first use.
    /// `type_name` is required for message and enum members.
    pub fn oneof_field(
        mut self,
        oneof: &str,
        name: &str,
        number: i32,
        ty: Type,
        type_name: Option<&str>,
    ) -> Self {
        let slot = match self
            .proto
            .oneof_decl
            .iter()
            .position(|o| o.name() == oneof)
        {
            Some(slot) => slot,
            None => {
                self.proto.oneof_decl.push(OneofDescriptorProto {
                    name: Some(oneof.to_string()),
                    ..Default::default()
                });
                self.proto.oneof_decl.len() - 1
            }
        };
        let mut f = field_proto(name, number, Label::Optional, ty, type_name);
        f.oneof_index = Some(slot as i32);
        self.push(f)
    }

    /// `map<key, value>` field. `value_type_name` is required when `value` is
    /// a message or enum.
    pub fn map_field(
        mut self,
        name: &str,
        number: i32,
        key: Type,
        value: Type,
        value_type_name: Option<&str>,
    ) -> Self {
        let entry_name = map_entry_name(name);
        let mut entry = MessageBuilder::new(&entry_name)
            .push(field_proto("key", 1, Label::Optional, key, None))
            .push(field_proto(
                "value",
                2,
                Label::Optional,
                value,
                value_type_name,
            ))
            .build();
        entry.options = Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        });
        self.proto.nested_type.push(entry);
        self.push(field_proto(
            name,
            number,
            Label::Repeated,
            Type::Message,
            Some(&entry_name),
        ))
    }

    pub fn nested(mut self, message: MessageBuilder) -> Self {
        self.proto.nested_type.push(message.build());
        self
    }

    pub fn nested_enum(mut self, e: EnumBuilder) -> Self {
        self.proto.enum_type.push(e.build());
        self
    }

    /// Sets the proto2 `default_value` of the most recently added field.
    pub fn default_value(mut self, value: &str) -> Self {
        if let Some(f) = self.proto.field.last_mut() {
            f.default_value = Some(value.to_string());
        }
        self
    }

    /// Overrides the JSON name of the most recently added field.
    pub fn json_name(mut self, json_name: &str) -> Self {
        if let Some(f) = self.proto.field.last_mut() {
            f.json_name = Some(json_name.to_string());
        }
        self
    }

    fn push(mut self, field: FieldDescriptorProto) -> Self {
        self.proto.field.push(field);
        self
    }

    pub fn build(self) -> DescriptorProto {
        self.proto
    }
}

#[derive(Debug, Clone)]
pub struct EnumBuilder {
    proto: EnumDescriptorProto,
}

impl EnumBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            proto: EnumDescriptorProto {
                name: Some(name.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn value(mut self, name: &str, number: i32) -> Self {
        self.proto.value.push(EnumValueDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> EnumDescriptorProto {
        self.proto
    }
}

fn field_proto(
    name: &str,
    number: i32,
    label: Label,
    ty: Type,
    type_name: Option<&str>,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(str::to_string),
        json_name: Some(to_json_name(name)),
        ..Default::default()
    }
}
