//! In-memory descriptor index.
//!
//! Cross references between types are [`MessageId`] / [`EnumId`] indices into
//! the owning [`DescriptorIndex`], so recursive and mutually recursive
//! messages need no owning pointers.

use std::collections::HashMap;

use protosql_wire::{PackedLayout, WireType};

use crate::kind::{Cardinality, FieldKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) usize);

impl MessageId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) usize);

impl EnumId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Message(MessageId),
    Enum(EnumId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: String,
    pub json_name: String,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    /// Index into the owning message's `oneofs` (real oneofs only; proto3
    /// `optional` fields are not members of any group here).
    pub oneof_index: Option<usize>,
    pub packed: bool,
    /// Fully-qualified referenced type, without the leading dot.
    pub type_name: Option<String>,
    pub message_type: Option<MessageId>,
    pub enum_type: Option<EnumId>,
    /// proto2 `default_value`, verbatim.
    pub default_value: Option<String>,
}

impl FieldDescriptor {
    pub fn is_repeated(&self) -> bool {
        self.cardinality.is_repeated()
    }

    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Map
    }

    /// Whether "set to the zero value" and "unset" are distinguishable.
    pub fn has_explicit_presence(&self) -> bool {
        match self.cardinality {
            Cardinality::Optional => true,
            Cardinality::Singular => self.kind == FieldKind::Message || self.oneof_index.is_some(),
            Cardinality::Repeated | Cardinality::Map => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OneofDescriptor {
    pub name: String,
    /// Member field numbers in declaration order.
    pub fields: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub id: MessageId,
    pub full_name: String,
    pub name: String,
    pub package: String,
    pub file: String,
    /// Sorted by field number.
    pub fields: Vec<FieldDescriptor>,
    pub oneofs: Vec<OneofDescriptor>,
    pub map_entry: bool,
    pub(crate) by_number: HashMap<u32, usize>,
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) by_json_name: HashMap<String, usize>,
}

impl MessageDescriptor {
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// ProtoJSON key lookup: exact `json_name`, exact `name`, then the same
    /// two ignoring ASCII case.
    pub fn field_by_json_name(&self, key: &str) -> Option<&FieldDescriptor> {
        if let Some(&i) = self.by_json_name.get(key).or_else(|| self.by_name.get(key)) {
            return Some(&self.fields[i]);
        }
        self.fields
            .iter()
            .find(|f| f.json_name.eq_ignore_ascii_case(key))
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(key)))
    }

    pub fn oneof_by_name(&self, name: &str) -> Option<(usize, &OneofDescriptor)> {
        self.oneofs.iter().enumerate().find(|(_, o)| o.name == name)
    }

    /// Other members of the oneof `field` belongs to.
    pub fn oneof_siblings(&self, field: &FieldDescriptor) -> Vec<u32> {
        field
            .oneof_index
            .and_then(|i| self.oneofs.get(i))
            .map(|o| {
                o.fields
                    .iter()
                    .copied()
                    .filter(|&n| n != field.number)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PackedLayout for MessageDescriptor {
    fn packed_element_type(&self, field_number: u32) -> Option<WireType> {
        let field = self.field(field_number)?;
        (field.is_repeated() && field.kind.is_packable()).then(|| field.kind.wire_type())
    }
}

#[derive(Debug, Clone)]
pub struct EnumValueDescriptor {
    pub name: String,
    pub number: i32,
}

#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    pub id: EnumId,
    pub full_name: String,
    pub name: String,
    pub package: String,
    pub file: String,
    /// Declaration order; the first entry is the default.
    pub values: Vec<EnumValueDescriptor>,
    pub(crate) by_name: HashMap<String, i32>,
    pub(crate) by_number: HashMap<i32, usize>,
}

impl EnumDescriptor {
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    /// Name of `number`; with aliases the first declared name wins.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.by_number
            .get(&number)
            .map(|&i| self.values[i].name.as_str())
    }

    pub fn zero_value(&self) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.number == 0)
    }

    pub fn default_number(&self) -> i32 {
        self.values.first().map_or(0, |v| v.number)
    }
}

#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub name: String,
    pub package: String,
    pub syntax: Syntax,
    pub dependencies: Vec<String>,
    /// Every message declared in the file, nested ones included.
    pub messages: Vec<MessageId>,
    pub enums: Vec<EnumId>,
    /// Supplied from the built-in well-known type set.
    pub builtin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorIndex {
    pub(crate) files: Vec<FileDescriptor>,
    pub(crate) messages: Vec<MessageDescriptor>,
    pub(crate) enums: Vec<EnumDescriptor>,
    pub(crate) types: HashMap<String, TypeRef>,
}

impl DescriptorIndex {
    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn file(&self, name: &str) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn messages(&self) -> &[MessageDescriptor] {
        &self.messages
    }

    pub fn enums(&self) -> &[EnumDescriptor] {
        &self.enums
    }

    pub fn resolve(&self, type_name: &str) -> Option<TypeRef> {
        self.types
            .get(type_name.strip_prefix('.').unwrap_or(type_name))
            .copied()
    }

    pub fn message(&self, type_name: &str) -> Option<&MessageDescriptor> {
        match self.resolve(type_name)? {
            TypeRef::Message(id) => Some(self.message_by_id(id)),
            TypeRef::Enum(_) => None,
        }
    }

    pub fn message_by_id(&self, id: MessageId) -> &MessageDescriptor {
        &self.messages[id.0]
    }

    pub fn enum_type(&self, type_name: &str) -> Option<&EnumDescriptor> {
        match self.resolve(type_name)? {
            TypeRef::Enum(id) => Some(self.enum_by_id(id)),
            TypeRef::Message(_) => None,
        }
    }

    pub fn enum_by_id(&self, id: EnumId) -> &EnumDescriptor {
        &self.enums[id.0]
    }

    pub fn field(&self, type_name: &str, number: u32) -> Option<&FieldDescriptor> {
        self.message(type_name)?.field(number)
    }

    pub fn field_by_name(&self, type_name: &str, name: &str) -> Option<&FieldDescriptor> {
        self.message(type_name)?.field_by_name(name)
    }

    pub fn field_by_json_name(&self, type_name: &str, key: &str) -> Option<&FieldDescriptor> {
        self.message(type_name)?.field_by_json_name(key)
    }

    /// Message type of a message-kind field.
    pub fn message_type_of(&self, field: &FieldDescriptor) -> Option<&MessageDescriptor> {
        field.message_type.map(|id| self.message_by_id(id))
    }

    /// Enum type of an enum-kind field.
    pub fn enum_type_of(&self, field: &FieldDescriptor) -> Option<&EnumDescriptor> {
        field.enum_type.map(|id| self.enum_by_id(id))
    }
}
