//! Builds a [`DescriptorIndex`] from `FileDescriptorProto`s.
//!
//! Two passes:
//! 1. register every message/enum name (nested ones included) so forward and
//!    cyclic references resolve;
//! 2. build field tables, resolving type references to ids.

use std::collections::{HashMap, HashSet};

use prost::Message as _;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto, FileDescriptorSet};
use protosql_wire::varint::{MAX_FIELD_NUMBER, MIN_FIELD_NUMBER};

use crate::error::{DescriptorError, Result};
use crate::index::{
    DescriptorIndex, EnumDescriptor, EnumId, EnumValueDescriptor, FieldDescriptor,
    FileDescriptor, MessageDescriptor, MessageId, OneofDescriptor, Syntax, TypeRef,
};
use crate::kind::{Cardinality, FieldKind};
use crate::naming::to_json_name;
use crate::wkt;

impl DescriptorIndex {
    /// Decodes a binary `FileDescriptorSet`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let set = FileDescriptorSet::decode(bytes)?;
        Self::from_file_descriptor_set(&set)
    }

    pub fn from_file_descriptor_set(set: &FileDescriptorSet) -> Result<Self> {
        Self::from_files(&set.file)
    }

    /// Indexes `files`, adding built-in well-known type files the set does
    /// not carry.
    pub fn from_files(files: &[FileDescriptorProto]) -> Result<Self> {
        let present: HashSet<&str> = files.iter().map(|f| f.name()).collect();
        let builtins: Vec<FileDescriptorProto> = wkt::builtin_files()
            .into_iter()
            .filter(|f| !present.contains(f.name()))
            .collect();

        let mut indexer = Indexer::default();
        for file in files {
            indexer.register_file(file, false)?;
        }
        for file in &builtins {
            indexer.register_file(file, true)?;
        }
        let index = indexer.finish()?;

        tracing::debug!(
            files = index.files.len(),
            messages = index.messages.len(),
            enums = index.enums.len(),
            "indexed descriptor set"
        );
        Ok(index)
    }
}

struct PendingMessage<'a> {
    id: MessageId,
    proto: &'a DescriptorProto,
    syntax: Syntax,
}

#[derive(Default)]
struct Indexer<'a> {
    index: DescriptorIndex,
    pending: Vec<PendingMessage<'a>>,
    map_entries: HashSet<MessageId>,
}

impl<'a> Indexer<'a> {
    fn register_file(&mut self, file: &'a FileDescriptorProto, builtin: bool) -> Result<()> {
        let syntax = match file.syntax() {
            "proto3" => Syntax::Proto3,
            _ => Syntax::Proto2,
        };
        let package = file.package().to_string();
        let mut info = FileDescriptor {
            name: file.name().to_string(),
            package: package.clone(),
            syntax,
            dependencies: file.dependency.clone(),
            messages: Vec::new(),
            enums: Vec::new(),
            builtin,
        };

        for e in &file.enum_type {
            let id = self.register_enum(&package, &package, file.name(), e)?;
            info.enums.push(id);
        }
        for m in &file.message_type {
            self.register_message(&package, &package, file.name(), syntax, m, &mut info)?;
        }
        self.index.files.push(info);
        Ok(())
    }

    fn register_message(
        &mut self,
        package: &str,
        scope: &str,
        file: &str,
        syntax: Syntax,
        proto: &'a DescriptorProto,
        info: &mut FileDescriptor,
    ) -> Result<()> {
        let full_name = qualify(scope, proto.name());
        let id = MessageId(self.index.messages.len());
        self.claim_name(&full_name, TypeRef::Message(id))?;
        self.index.messages.push(MessageDescriptor {
            id,
            full_name: full_name.clone(),
            name: proto.name().to_string(),
            package: package.to_string(),
            file: file.to_string(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            map_entry: false,
            by_number: HashMap::new(),
            by_name: HashMap::new(),
            by_json_name: HashMap::new(),
        });
        if proto.options.as_ref().and_then(|o| o.map_entry) == Some(true) {
            self.map_entries.insert(id);
            self.index.messages[id.0].map_entry = true;
        }
        info.messages.push(id);
        self.pending.push(PendingMessage { id, proto, syntax });

        for e in &proto.enum_type {
            let enum_id = self.register_enum(package, &full_name, file, e)?;
            info.enums.push(enum_id);
        }
        for nested in &proto.nested_type {
            self.register_message(package, &full_name, file, syntax, nested, info)?;
        }
        Ok(())
    }

    fn register_enum(
        &mut self,
        package: &str,
        scope: &str,
        file: &str,
        proto: &EnumDescriptorProto,
    ) -> Result<EnumId> {
        let full_name = qualify(scope, proto.name());
        let id = EnumId(self.index.enums.len());
        self.claim_name(&full_name, TypeRef::Enum(id))?;

        let mut values = Vec::with_capacity(proto.value.len());
        let mut by_name = HashMap::new();
        let mut by_number = HashMap::new();
        for (i, v) in proto.value.iter().enumerate() {
            values.push(EnumValueDescriptor {
                name: v.name().to_string(),
                number: v.number(),
            });
            by_name.insert(v.name().to_string(), v.number());
            if by_number.contains_key(&v.number()) {
                tracing::trace!(enum_name = %full_name, number = v.number(), "enum alias");
            } else {
                by_number.insert(v.number(), i);
            }
        }
        if !values.iter().any(|v| v.number == 0) {
            tracing::warn!(enum_name = %full_name, "enum has no zero value");
        }

        self.index.enums.push(EnumDescriptor {
            id,
            full_name,
            name: proto.name().to_string(),
            package: package.to_string(),
            file: file.to_string(),
            values,
            by_name,
            by_number,
        });
        Ok(id)
    }

    fn claim_name(&mut self, full_name: &str, type_ref: TypeRef) -> Result<()> {
        if self
            .index
            .types
            .insert(full_name.to_string(), type_ref)
            .is_some()
        {
            return Err(DescriptorError::DuplicateType(full_name.to_string()));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<DescriptorIndex> {
        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            let (fields, oneofs) = self.build_fields(p.id, p.proto, p.syntax)?;
            let msg = &mut self.index.messages[p.id.0];
            for (i, f) in fields.iter().enumerate() {
                msg.by_number.insert(f.number, i);
                msg.by_name.insert(f.name.clone(), i);
                msg.by_json_name.insert(f.json_name.clone(), i);
            }
            msg.fields = fields;
            msg.oneofs = oneofs;
        }
        Ok(self.index)
    }

    fn build_fields(
        &self,
        id: MessageId,
        proto: &DescriptorProto,
        syntax: Syntax,
    ) -> Result<(Vec<FieldDescriptor>, Vec<OneofDescriptor>)> {
        let scope = self.index.messages[id.0].full_name.clone();

        // A oneof is synthetic when it only wraps a proto3 `optional` field.
        let synthetic: HashSet<i32> = proto
            .field
            .iter()
            .filter(|f| f.proto3_optional())
            .filter_map(|f| f.oneof_index)
            .collect();
        let mut oneof_slot: HashMap<i32, usize> = HashMap::new();
        let mut oneofs = Vec::new();
        for (i, decl) in proto.oneof_decl.iter().enumerate() {
            let i = i as i32;
            if synthetic.contains(&i) {
                continue;
            }
            oneof_slot.insert(i, oneofs.len());
            oneofs.push(OneofDescriptor {
                name: decl.name().to_string(),
                fields: Vec::new(),
            });
        }

        let mut fields = Vec::with_capacity(proto.field.len());
        for f in &proto.field {
            let field_path = format!("{scope}.{}", f.name());
            let number = f.number();
            if number < MIN_FIELD_NUMBER as i32 || number > MAX_FIELD_NUMBER as i32 {
                return Err(DescriptorError::InvalidFieldNumber {
                    field: field_path,
                    number: i64::from(number),
                });
            }

            let (kind, type_name, message_type, enum_type) =
                self.resolve_field_type(&scope, &field_path, f)?;

            let repeated = f.label() == Label::Repeated;
            let cardinality = if repeated {
                match message_type {
                    Some(target) if self.map_entries.contains(&target) => Cardinality::Map,
                    _ => Cardinality::Repeated,
                }
            } else if f.proto3_optional() || syntax == Syntax::Proto2 {
                Cardinality::Optional
            } else {
                Cardinality::Singular
            };

            let declared_packed = f.options.as_ref().and_then(|o| o.packed);
            let packed = repeated
                && kind.is_packable()
                && match syntax {
                    Syntax::Proto3 => declared_packed != Some(false),
                    Syntax::Proto2 => declared_packed == Some(true),
                };

            let oneof_index = f.oneof_index.and_then(|i| oneof_slot.get(&i).copied());
            if let Some(slot) = oneof_index {
                oneofs[slot].fields.push(number as u32);
            }

            let json_name = match &f.json_name {
                Some(name) if !name.is_empty() => name.clone(),
                _ => to_json_name(f.name()),
            };

            fields.push(FieldDescriptor {
                number: number as u32,
                name: f.name().to_string(),
                json_name,
                kind,
                cardinality,
                oneof_index,
                packed,
                type_name,
                message_type,
                enum_type,
                default_value: f.default_value.clone(),
            });
        }
        fields.sort_by_key(|f| f.number);
        Ok((fields, oneofs))
    }

    fn resolve_field_type(
        &self,
        scope: &str,
        field_path: &str,
        f: &prost_types::FieldDescriptorProto,
    ) -> Result<(FieldKind, Option<String>, Option<MessageId>, Option<EnumId>)> {
        let declared = f.r#type.map(|_| f.r#type());
        if declared == Some(Type::Group) {
            return Err(DescriptorError::UnsupportedGroup {
                field: field_path.to_string(),
            });
        }

        let needs_lookup = matches!(declared, None | Some(Type::Message) | Some(Type::Enum));
        if !needs_lookup {
            let kind = declared
                .and_then(FieldKind::from_proto)
                .ok_or_else(|| DescriptorError::UnsupportedGroup {
                    field: field_path.to_string(),
                })?;
            return Ok((kind, None, None, None));
        }

        let raw = f.type_name();
        let unresolved = || DescriptorError::UnresolvedType {
            field: field_path.to_string(),
            type_name: raw.to_string(),
        };
        let (full_name, type_ref) = self.lookup_scoped(scope, raw).ok_or_else(unresolved)?;
        match (declared, type_ref) {
            (None | Some(Type::Message), TypeRef::Message(id)) => {
                Ok((FieldKind::Message, Some(full_name), Some(id), None))
            }
            (None | Some(Type::Enum), TypeRef::Enum(id)) => {
                Ok((FieldKind::Enum, Some(full_name), None, Some(id)))
            }
            _ => Err(unresolved()),
        }
    }

    /// Resolves `name` the way protoc does: fully-qualified when it starts
    /// with a dot, otherwise searched from the innermost scope outwards.
    fn lookup_scoped(&self, scope: &str, name: &str) -> Option<(String, TypeRef)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self
                .index
                .types
                .get(absolute)
                .map(|t| (absolute.to_string(), *t));
        }
        let mut scope = scope.to_string();
        loop {
            let candidate = qualify(&scope, name);
            if let Some(t) = self.index.types.get(&candidate) {
                return Some((candidate, *t));
            }
            if scope.is_empty() {
                return None;
            }
            scope = match scope.rfind('.') {
                Some(dot) => scope[..dot].to_string(),
                None => String::new(),
            };
        }
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}
