//! The generated surface as data: one routine table per message and enum,
//! grouped into output artifacts.
//!
//! Both back-ends read this model: [`crate::sql`] renders it as stored
//! functions and [`crate::opaque`] executes it in process.

use std::collections::{HashMap, HashSet, VecDeque};

use protosql_descriptor::{
    Cardinality, DescriptorIndex, EnumDescriptor, FieldKind, MessageDescriptor, MessageId,
    WellKnownType,
};
use tracing::debug;

use crate::config::GenerateConfig;
use crate::error::{CodegenError, Result};
use crate::naming::{routine_name, snake_case};

/// What a routine does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    New,
    ToProtobuf,
    FromProtobuf,
    ToJson,
    FromJson,

    Get,
    GetOr,
    Set,
    Has,
    Clear,
    GetAsName,
    GetAsNameOr,
    SetFromName,

    GetAll,
    SetAll,
    Add,
    AddAll,
    Count,
    GetAt,
    SetAt,
    InsertAt,
    RemoveAt,
    ClearAll,

    Which,
    ClearOneof,

    FromString,
    ToString,
}

/// What a routine operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Message,
    Field(u32),
    /// Index into the message's oneofs.
    Oneof(usize),
    Enum,
}

/// SQL-facing parameter and return types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// A NumberJSON document.
    Doc,
    /// Wire bytes.
    Wire,
    Text,
    /// A JSON array of field values.
    List,
    Int,
    Bool,
    /// A single field value of this kind.
    Field(FieldKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub ty: ValueType,
}

const fn param(name: &'static str, ty: ValueType) -> Param {
    Param { name, ty }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    pub name: String,
    pub accessor: Accessor,
    pub target: Target,
    pub params: Vec<Param>,
    pub returns: ValueType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Message,
    Enum,
}

#[derive(Debug, Clone)]
pub struct TypeSurface {
    pub full_name: String,
    pub kind: TypeKind,
    pub prefix: String,
    pub routines: Vec<Routine>,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: String,
    /// Proto files whose types landed here.
    pub sources: Vec<String>,
    pub types: Vec<TypeSurface>,
}

#[derive(Debug, Clone)]
pub struct Surface {
    pub descriptor_set_name: String,
    pub artifacts: Vec<Artifact>,
}

impl Surface {
    /// Builds the surface for the types declared in `files`.
    pub fn build(index: &DescriptorIndex, files: &[String], config: &GenerateConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = SurfaceBuilder {
            index,
            config,
            artifacts: Vec::new(),
            owners: HashMap::new(),
        };

        let mut roots: Vec<MessageId> = Vec::new();
        for name in files {
            let file = index
                .file(name)
                .ok_or_else(|| CodegenError::UnknownFile(name.clone()))?;
            for &id in &file.messages {
                let message = index.message_by_id(id);
                if message.map_entry || (is_wkt(&message.full_name) && !config.include_wkt) {
                    continue;
                }
                roots.push(id);
                builder.message(message)?;
            }
            for &id in &file.enums {
                let e = index.enum_by_id(id);
                if is_wkt(&e.full_name) && !config.include_wkt {
                    continue;
                }
                builder.enumeration(e)?;
            }
        }

        if config.include_wkt {
            let (messages, enums) = reachable_wkts(index, &roots);
            for id in messages {
                builder.message(index.message_by_id(id))?;
            }
            for full_name in enums {
                if let Some(e) = index.enum_type(&full_name) {
                    builder.enumeration(e)?;
                }
            }
        }

        let surface = Surface {
            descriptor_set_name: config.descriptor_set_name.clone(),
            artifacts: builder.artifacts,
        };
        debug!(
            artifacts = surface.artifacts.len(),
            routines = surface.routines().count(),
            "built generator surface"
        );
        Ok(surface)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeSurface> {
        self.artifacts.iter().flat_map(|a| a.types.iter())
    }

    pub fn routines(&self) -> impl Iterator<Item = (&TypeSurface, &Routine)> {
        self.types()
            .flat_map(|t| t.routines.iter().map(move |r| (t, r)))
    }

    pub fn routine(&self, name: &str) -> Option<(&TypeSurface, &Routine)> {
        self.routines().find(|(_, r)| r.name == name)
    }
}

fn is_wkt(full_name: &str) -> bool {
    WellKnownType::from_full_name(full_name).is_some()
}

/// Well-known messages and enums reachable from `roots` through message and
/// enum fields, in discovery order.
fn reachable_wkts(index: &DescriptorIndex, roots: &[MessageId]) -> (Vec<MessageId>, Vec<String>) {
    let mut seen: HashSet<MessageId> = roots.iter().copied().collect();
    let mut queue: VecDeque<MessageId> = roots.iter().copied().collect();
    let mut messages = Vec::new();
    let mut enums = Vec::new();

    while let Some(id) = queue.pop_front() {
        for field in &index.message_by_id(id).fields {
            if let Some(e) = index.enum_type_of(field) {
                if is_wkt(&e.full_name) && !enums.contains(&e.full_name) {
                    enums.push(e.full_name.clone());
                }
            }
            let Some(target) = field.message_type else { continue };
            if !seen.insert(target) {
                continue;
            }
            queue.push_back(target);
            let message = index.message_by_id(target);
            if is_wkt(&message.full_name) && !message.map_entry {
                messages.push(target);
            }
        }
    }
    (messages, enums)
}

struct SurfaceBuilder<'a> {
    index: &'a DescriptorIndex,
    config: &'a GenerateConfig,
    artifacts: Vec<Artifact>,
    /// Routine name → owning type, for collision reporting.
    owners: HashMap<String, String>,
}

impl SurfaceBuilder<'_> {
    fn artifact_for(&mut self, proto_path: &str, package: &str) -> Result<&mut Artifact> {
        let path = match self.config.file_name_for(proto_path, package)? {
            Some(path) => path,
            None => self.config.single_file_name(),
        };
        let at = match self.artifacts.iter().position(|a| a.path == path) {
            Some(at) => at,
            None => {
                self.artifacts.push(Artifact {
                    path,
                    sources: Vec::new(),
                    types: Vec::new(),
                });
                self.artifacts.len() - 1
            }
        };
        let artifact = &mut self.artifacts[at];
        if !artifact.sources.iter().any(|s| s == proto_path) {
            artifact.sources.push(proto_path.to_string());
        }
        Ok(artifact)
    }

    fn claim(&mut self, routines: &[Routine], owner: &str) -> Result<()> {
        for r in routines {
            if let Some(first) = self.owners.insert(r.name.clone(), owner.to_string()) {
                return Err(CodegenError::DuplicateRoutine {
                    name: r.name.clone(),
                    first,
                    second: owner.to_string(),
                });
            }
        }
        Ok(())
    }

    fn message(&mut self, message: &MessageDescriptor) -> Result<()> {
        let prefix = self
            .config
            .type_prefix_for(&message.package, &message.full_name)?;
        let routines = message_routines(self.index, message, &prefix, self.config.generate_methods);
        self.claim(&routines, &message.full_name)?;
        self.artifact_for(&message.file, &message.package)?
            .types
            .push(TypeSurface {
                full_name: message.full_name.clone(),
                kind: TypeKind::Message,
                prefix,
                routines,
            });
        Ok(())
    }

    fn enumeration(&mut self, e: &EnumDescriptor) -> Result<()> {
        let mut prefix = self.config.type_prefix_for(&e.package, &e.full_name)?;
        if prefix.is_empty() {
            // Enum routines have no verb of their own to stand on.
            prefix = snake_case(&e.name);
        }
        let routines = vec![
            Routine {
                name: routine_name(&prefix, "from_string"),
                accessor: Accessor::FromString,
                target: Target::Enum,
                params: vec![param("name", ValueType::Text)],
                returns: ValueType::Int,
            },
            Routine {
                name: routine_name(&prefix, "to_string"),
                accessor: Accessor::ToString,
                target: Target::Enum,
                params: vec![param("number", ValueType::Int)],
                returns: ValueType::Text,
            },
        ];
        self.claim(&routines, &e.full_name)?;
        self.artifact_for(&e.file, &e.package)?.types.push(TypeSurface {
            full_name: e.full_name.clone(),
            kind: TypeKind::Enum,
            prefix,
            routines,
        });
        Ok(())
    }
}

fn message_routines(
    index: &DescriptorIndex,
    message: &MessageDescriptor,
    prefix: &str,
    with_methods: bool,
) -> Vec<Routine> {
    let doc = param("doc", ValueType::Doc);
    let mut out = Vec::new();
    let mut push = |rest: String, accessor: Accessor, target: Target, params: Vec<Param>, returns| {
        out.push(Routine {
            name: routine_name(prefix, &rest),
            accessor,
            target,
            params,
            returns,
        });
    };

    push("new".into(), Accessor::New, Target::Message, vec![], ValueType::Doc);
    push("to_protobuf".into(), Accessor::ToProtobuf, Target::Message, vec![doc], ValueType::Wire);
    push(
        "from_protobuf".into(),
        Accessor::FromProtobuf,
        Target::Message,
        vec![param("wire", ValueType::Wire)],
        ValueType::Doc,
    );
    push("to_json".into(), Accessor::ToJson, Target::Message, vec![doc], ValueType::Text);
    push(
        "from_json".into(),
        Accessor::FromJson,
        Target::Message,
        vec![param("json", ValueType::Text)],
        ValueType::Doc,
    );
    if with_methods {
        for field in &message.fields {
            let f = snake_case(&field.name);
            let target = Target::Field(field.number);
            let value = ValueType::Field(field.kind);
            let is_enum = field.kind == FieldKind::Enum && index.enum_type_of(field).is_some();

            match field.cardinality {
                Cardinality::Singular | Cardinality::Optional => {
                    push(format!("get_{f}"), Accessor::Get, target, vec![doc], value);
                    push(
                        format!("get_{f}__or"),
                        Accessor::GetOr,
                        target,
                        vec![doc, param("default_value", value)],
                        value,
                    );
                    push(
                        format!("set_{f}"),
                        Accessor::Set,
                        target,
                        vec![doc, param("value", value)],
                        ValueType::Doc,
                    );
                    push(format!("has_{f}"), Accessor::Has, target, vec![doc], ValueType::Bool);
                    push(format!("clear_{f}"), Accessor::Clear, target, vec![doc], ValueType::Doc);
                    if is_enum {
                        push(
                            format!("get_{f}__as_name"),
                            Accessor::GetAsName,
                            target,
                            vec![doc],
                            ValueType::Text,
                        );
                        push(
                            format!("get_{f}__as_name_or"),
                            Accessor::GetAsNameOr,
                            target,
                            vec![doc, param("default_value", ValueType::Text)],
                            ValueType::Text,
                        );
                        push(
                            format!("set_{f}__from_name"),
                            Accessor::SetFromName,
                            target,
                            vec![doc, param("name", ValueType::Text)],
                            ValueType::Doc,
                        );
                    }
                }
                Cardinality::Repeated | Cardinality::Map => {
                    let idx = param("idx", ValueType::Int);
                    let values = param("values", ValueType::List);
                    push(format!("get_all_{f}"), Accessor::GetAll, target, vec![doc], ValueType::List);
                    push(
                        format!("set_all_{f}"),
                        Accessor::SetAll,
                        target,
                        vec![doc, values],
                        ValueType::Doc,
                    );
                    push(
                        format!("add_{f}"),
                        Accessor::Add,
                        target,
                        vec![doc, param("value", value)],
                        ValueType::Doc,
                    );
                    push(
                        format!("add_all_{f}"),
                        Accessor::AddAll,
                        target,
                        vec![doc, values],
                        ValueType::Doc,
                    );
                    push(format!("count_{f}"), Accessor::Count, target, vec![doc], ValueType::Int);
                    push(format!("get_{f}"), Accessor::GetAt, target, vec![doc, idx], value);
                    push(
                        format!("set_{f}"),
                        Accessor::SetAt,
                        target,
                        vec![doc, idx, param("value", value)],
                        ValueType::Doc,
                    );
                    push(
                        format!("insert_{f}"),
                        Accessor::InsertAt,
                        target,
                        vec![doc, idx, param("value", value)],
                        ValueType::Doc,
                    );
                    push(
                        format!("remove_{f}"),
                        Accessor::RemoveAt,
                        target,
                        vec![doc, idx],
                        ValueType::Doc,
                    );
                    push(format!("clear_{f}"), Accessor::ClearAll, target, vec![doc], ValueType::Doc);
                }
            }
        }

        for (i, oneof) in message.oneofs.iter().enumerate() {
            let g = snake_case(&oneof.name);
            push(format!("which_{g}"), Accessor::Which, Target::Oneof(i), vec![doc], ValueType::Text);
            push(format!("clear_{g}"), Accessor::ClearOneof, Target::Oneof(i), vec![doc], ValueType::Doc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::field_descriptor_proto::Type;
    use protosql_descriptor::builder::{EnumBuilder, FileBuilder, MessageBuilder};

    fn index() -> DescriptorIndex {
        let file = FileBuilder::new("acme/shop.proto", "acme")
            .enumeration(EnumBuilder::new("Status").value("STATUS_UNSPECIFIED", 0))
            .message(
                MessageBuilder::new("Order")
                    .field("id", 1, Type::Int64)
                    .repeated("lines", 2, Type::String)
                    .map_field("counts", 3, Type::String, Type::Int32, None)
                    .enum_field("status", 4, "Status")
                    .message_field("created", 5, ".google.protobuf.Timestamp")
                    .oneof_field("payment", "card", 6, Type::String, None),
            )
            .message(MessageBuilder::new("Invoice").field("total", 1, Type::Double))
            .build();
        DescriptorIndex::from_files(&[file]).unwrap()
    }

    fn names(surface: &Surface) -> Vec<&str> {
        surface.routines().map(|(_, r)| r.name.as_str()).collect()
    }

    #[test]
    fn messages_get_the_full_accessor_family() {
        let index = index();
        let surface =
            Surface::build(&index, &["acme/shop.proto".into()], &GenerateConfig::new()).unwrap();
        let names = names(&surface);
        for expected in [
            "order_new",
            "order_to_protobuf",
            "order_from_protobuf",
            "order_get_id",
            "order_get_id__or",
            "order_get_all_lines",
            "order_insert_lines",
            "order_count_counts",
            "order_get_status__as_name",
            "order_set_status__from_name",
            "order_which_payment",
            "order_clear_payment",
            "status_from_string",
            "status_to_string",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(!names.iter().any(|n| n.starts_with("order_counts_entry")));
        assert!(!names.iter().any(|n| n.starts_with("timestamp_")));
        assert_eq!(surface.artifacts.len(), 1);
        assert_eq!(surface.artifacts[0].path, "acme/shop.sql");
    }

    #[test]
    fn converters_only_without_methods() {
        let index = index();
        let config = GenerateConfig::new().with_generate_methods(false);
        let surface = Surface::build(&index, &["acme/shop.proto".into()], &config).unwrap();
        let names = names(&surface);
        assert!(names.contains(&"order_new"));
        assert!(!names.contains(&"order_get_id"));
        assert!(names.contains(&"status_from_string"));
    }

    #[test]
    fn reachable_wkts_join_when_asked() {
        let index = index();
        let config = GenerateConfig::new().with_include_wkt(true);
        let surface = Surface::build(&index, &["acme/shop.proto".into()], &config).unwrap();
        assert!(surface.routine("timestamp_get_seconds").is_some());
        assert!(surface
            .artifacts
            .iter()
            .any(|a| a.path == "google/protobuf/timestamp.sql"));
    }

    #[test]
    fn colliding_prefixes_are_rejected() {
        let index = index();
        let config = GenerateConfig::new().with_type_prefix("x");
        let err = Surface::build(&index, &["acme/shop.proto".into()], &config).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateRoutine { .. }));
    }

    #[test]
    fn unknown_files_are_reported() {
        let index = index();
        let err = Surface::build(&index, &["nope.proto".into()], &GenerateConfig::new()).unwrap_err();
        assert!(matches!(err, CodegenError::UnknownFile(_)));
    }
}
