use std::fmt;

use prost_types::field_descriptor_proto::Type;
use protosql_wire::WireType;

/// Declared type of a field, as far as encoding is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Double,
    Float,
    Int64,
    UInt64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    UInt32,
    SFixed32,
    SFixed64,
    SInt32,
    SInt64,
    Enum,
    Message,
}

impl FieldKind {
    pub const ALL: [FieldKind; 17] = [
        FieldKind::Double,
        FieldKind::Float,
        FieldKind::Int64,
        FieldKind::UInt64,
        FieldKind::Int32,
        FieldKind::Fixed64,
        FieldKind::Fixed32,
        FieldKind::Bool,
        FieldKind::String,
        FieldKind::Bytes,
        FieldKind::UInt32,
        FieldKind::SFixed32,
        FieldKind::SFixed64,
        FieldKind::SInt32,
        FieldKind::SInt64,
        FieldKind::Enum,
        FieldKind::Message,
    ];

    /// The `.proto` spelling, also used in routine names (`wire_get_int32_field`).
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int64 => "int64",
            FieldKind::UInt64 => "uint64",
            FieldKind::Int32 => "int32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::UInt32 => "uint32",
            FieldKind::SFixed32 => "sfixed32",
            FieldKind::SFixed64 => "sfixed64",
            FieldKind::SInt32 => "sint32",
            FieldKind::SInt64 => "sint64",
            FieldKind::Enum => "enum",
            FieldKind::Message => "message",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn wire_type(self) -> WireType {
        match self {
            FieldKind::Double | FieldKind::Fixed64 | FieldKind::SFixed64 => WireType::Fixed64,
            FieldKind::Float | FieldKind::Fixed32 | FieldKind::SFixed32 => WireType::Fixed32,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message => {
                WireType::LengthDelimited
            }
            FieldKind::Int64
            | FieldKind::UInt64
            | FieldKind::Int32
            | FieldKind::Bool
            | FieldKind::UInt32
            | FieldKind::SInt32
            | FieldKind::SInt64
            | FieldKind::Enum => WireType::Varint,
        }
    }

    /// Scalars that may share one length-delimited record when repeated.
    pub fn is_packable(self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }

    /// Kinds whose ProtoJSON form is a decimal string.
    pub fn is_64bit_integer(self) -> bool {
        matches!(
            self,
            FieldKind::Int64
                | FieldKind::UInt64
                | FieldKind::SInt64
                | FieldKind::Fixed64
                | FieldKind::SFixed64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_64bit_integer()
            || matches!(
                self,
                FieldKind::Int32
                    | FieldKind::UInt32
                    | FieldKind::SInt32
                    | FieldKind::Fixed32
                    | FieldKind::SFixed32
            )
    }

    pub fn is_float(self) -> bool {
        matches!(self, FieldKind::Float | FieldKind::Double)
    }

    /// Maps a descriptor type; `None` for groups.
    pub fn from_proto(ty: Type) -> Option<Self> {
        Some(match ty {
            Type::Double => FieldKind::Double,
            Type::Float => FieldKind::Float,
            Type::Int64 => FieldKind::Int64,
            Type::Uint64 => FieldKind::UInt64,
            Type::Int32 => FieldKind::Int32,
            Type::Fixed64 => FieldKind::Fixed64,
            Type::Fixed32 => FieldKind::Fixed32,
            Type::Bool => FieldKind::Bool,
            Type::String => FieldKind::String,
            Type::Group => return None,
            Type::Message => FieldKind::Message,
            Type::Bytes => FieldKind::Bytes,
            Type::Uint32 => FieldKind::UInt32,
            Type::Enum => FieldKind::Enum,
            Type::Sfixed32 => FieldKind::SFixed32,
            Type::Sfixed64 => FieldKind::SFixed64,
            Type::Sint32 => FieldKind::SInt32,
            Type::Sint64 => FieldKind::SInt64,
        })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// proto3 field without `optional`: implicit presence.
    Singular,
    /// Explicit presence (proto3 `optional`, proto2 optional/required).
    Optional,
    Repeated,
    /// Repeated synthetic `{1: key, 2: value}` entries.
    Map,
}

impl Cardinality {
    pub fn is_repeated(self) -> bool {
        matches!(self, Cardinality::Repeated | Cardinality::Map)
    }
}
