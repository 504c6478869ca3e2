//! MySQL rendering of a [`Surface`].
//!
//! Each routine becomes one `CREATE FUNCTION` whose body delegates to the
//! runtime's NumberJSON routines (`number_json_*_field`) and whole-message
//! conversions. Enum names are resolved inline with `CASE`, so an artifact
//! only depends on the runtime, never on other artifacts.

use std::fmt::Write;

use protosql_descriptor::{DescriptorIndex, EnumDescriptor, FieldDescriptor, FieldKind, MessageDescriptor};
use protosql_runtime::routine::{sql_from_json, Op, RoutineName, Surface as RuntimeSurface, SqlValue};
use protosql_runtime::value;
use tracing::debug;

use crate::error::{CodegenError, Result};
use crate::surface::{Accessor, Artifact, Param, Routine, Surface, Target, TypeKind, TypeSurface, ValueType};

/// A rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

/// Renders every artifact of `surface`.
pub fn render(index: &DescriptorIndex, surface: &Surface) -> Result<Vec<GeneratedFile>> {
    surface
        .artifacts
        .iter()
        .map(|artifact| {
            let content = render_artifact(index, &surface.descriptor_set_name, artifact)?;
            debug!(
                file = %artifact.path,
                types = artifact.types.len(),
                bytes = content.len(),
                "rendered SQL artifact"
            );
            Ok(GeneratedFile {
                name: artifact.path.clone(),
                content,
            })
        })
        .collect()
}

pub fn render_artifact(index: &DescriptorIndex, set_name: &str, artifact: &Artifact) -> Result<String> {
    let mut out = String::new();
    writeln!(&mut out, "-- Generated by protoc-gen-protosql. DO NOT EDIT.")?;
    writeln!(&mut out, "-- descriptor set: {set_name}")?;
    for source in &artifact.sources {
        writeln!(&mut out, "-- source: {source}")?;
    }
    writeln!(&mut out)?;
    writeln!(&mut out, "DELIMITER $$")?;

    for ty in &artifact.types {
        writeln!(&mut out)?;
        writeln!(&mut out, "-- {}", "=".repeat(74))?;
        writeln!(&mut out, "-- {}", ty.full_name)?;
        writeln!(&mut out, "-- {}", "=".repeat(74))?;
        let ctx = match ty.kind {
            TypeKind::Message => Context::Message {
                index,
                set_name,
                message: index
                    .message(&ty.full_name)
                    .ok_or_else(|| unknown(&ty.full_name))?,
            },
            TypeKind::Enum => Context::Enum(
                index
                    .enum_type(&ty.full_name)
                    .ok_or_else(|| unknown(&ty.full_name))?,
            ),
        };
        render_type(&mut out, &ctx, ty)?;
    }

    writeln!(&mut out)?;
    writeln!(&mut out, "DELIMITER ;")?;
    Ok(out)
}

fn unknown(full_name: &str) -> CodegenError {
    CodegenError::UnknownType(full_name.to_string())
}

enum Context<'a> {
    Message {
        index: &'a DescriptorIndex,
        set_name: &'a str,
        message: &'a MessageDescriptor,
    },
    Enum(&'a EnumDescriptor),
}

fn render_type(out: &mut String, ctx: &Context<'_>, ty: &TypeSurface) -> Result<()> {
    for routine in &ty.routines {
        let body = match ctx {
            Context::Enum(e) => enum_body(e, routine),
            Context::Message {
                index,
                set_name,
                message,
            } => message_body(index, set_name, message, routine)?,
        };
        writeln!(out)?;
        writeln!(out, "DROP FUNCTION IF EXISTS `{}`$$", routine.name)?;
        writeln!(
            out,
            "CREATE FUNCTION `{}`({}) RETURNS {} DETERMINISTIC",
            routine.name,
            params(&routine.params),
            sql_type(routine.returns)
        )?;
        writeln!(out, "BEGIN")?;
        for line in body {
            writeln!(out, "  {line}")?;
        }
        writeln!(out, "END$$")?;
    }
    Ok(())
}

fn params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("`{}` {}", p.name, sql_type(p.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn sql_type(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Doc | ValueType::List => "JSON",
        ValueType::Wire => "LONGBLOB",
        ValueType::Text => "LONGTEXT",
        ValueType::Int => "BIGINT",
        ValueType::Bool => "BOOLEAN",
        ValueType::Field(kind) => match kind {
            FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32 | FieldKind::Enum => "INT",
            FieldKind::UInt32 | FieldKind::Fixed32 => "INT UNSIGNED",
            FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64 => "BIGINT",
            FieldKind::UInt64 | FieldKind::Fixed64 => "BIGINT UNSIGNED",
            FieldKind::Float => "FLOAT",
            FieldKind::Double => "DOUBLE",
            FieldKind::Bool => "BOOLEAN",
            FieldKind::String => "LONGTEXT",
            FieldKind::Bytes => "LONGBLOB",
            FieldKind::Message => "JSON",
        },
    }
}

/// Single-quoted SQL string literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

/// SQL literal for a constant argument.
pub fn literal(v: &SqlValue) -> String {
    match v {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::UInt(u) => u.to_string(),
        SqlValue::Double(d) if d.is_finite() => format!("{d:?}"),
        SqlValue::Float(f) if f.is_finite() => format!("{f:?}"),
        SqlValue::Double(_) | SqlValue::Float(_) => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        SqlValue::Text(s) => quote(s),
        SqlValue::Blob(b) => format!("X'{}'", hex::encode(b)),
        SqlValue::Json(j) => format!("CAST({} AS JSON)", quote(&j.to_string())),
    }
}

fn call(op: Op, kind: FieldKind, args: &[String]) -> String {
    let name = RoutineName::new(RuntimeSurface::NumberJson, op, kind);
    format!("`{name}`({})", args.join(", "))
}

fn signal_invalid_enum(e: &EnumDescriptor) -> String {
    let message = quote(&format!("InvalidEnumName: not a value of {}", e.full_name));
    format!("SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = {message};")
}

fn enum_case(e: &EnumDescriptor, subject: &str, by_name: bool) -> String {
    let mut case = format!("CASE {subject}");
    for v in &e.values {
        if by_name {
            write!(case, " WHEN {} THEN {}", quote(&v.name), v.number).ok();
        } else {
            write!(case, " WHEN {} THEN {}", v.number, quote(&v.name)).ok();
        }
    }
    case.push_str(" ELSE NULL END");
    case
}

fn enum_body(e: &EnumDescriptor, routine: &Routine) -> Vec<String> {
    let by_name = routine.accessor == Accessor::FromString;
    let arg = format!("`{}`", routine.params[0].name);
    vec![format!("RETURN {};", enum_case(e, &arg, by_name))]
}

fn message_body(
    index: &DescriptorIndex,
    set_name: &str,
    message: &MessageDescriptor,
    routine: &Routine,
) -> Result<Vec<String>> {
    let set = quote(set_name);
    let ty = quote(&message.full_name);
    let to_wire = |doc: &str| format!("number_json_to_message({set}, {ty}, {doc})");
    let from_wire = |wire: &str| format!("message_to_number_json({set}, {ty}, {wire})");

    let field = match routine.target {
        Target::Message => {
            let line = match routine.accessor {
                Accessor::New => "RETURN JSON_OBJECT();".to_string(),
                Accessor::ToProtobuf => format!("RETURN {};", to_wire("`doc`")),
                Accessor::FromProtobuf => format!("RETURN {};", from_wire("`wire`")),
                Accessor::ToJson => format!("RETURN message_to_json({set}, {ty}, {});", to_wire("`doc`")),
                _ => format!(
                    "RETURN {};",
                    from_wire(&format!("json_to_message({set}, {ty}, `json`)"))
                ),
            };
            return Ok(vec![line]);
        }
        Target::Oneof(i) => return Ok(oneof_body(message, i, routine.accessor)),
        Target::Enum => return Ok(Vec::new()),
        Target::Field(number) => message.field(number).ok_or_else(|| unknown(&message.full_name))?,
    };
    field_body(index, message, field, routine.accessor)
}

fn field_args(field: &FieldDescriptor, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["`doc`".to_string(), field.number.to_string()];
    args.extend(rest.iter().map(|r| format!("`{r}`")));
    args
}

/// `doc` with every other member of `field`'s oneof cleared.
fn without_siblings(message: &MessageDescriptor, field: &FieldDescriptor) -> String {
    let mut doc = "`doc`".to_string();
    for sibling in message.oneof_siblings(field) {
        if let Some(s) = message.field(sibling) {
            doc = call(Op::Clear, s.kind, &[doc, sibling.to_string()]);
        }
    }
    doc
}

fn field_body(
    index: &DescriptorIndex,
    message: &MessageDescriptor,
    field: &FieldDescriptor,
    accessor: Accessor,
) -> Result<Vec<String>> {
    let kind = field.kind;
    let n = field.number.to_string();
    let ret = |expr: String| vec![format!("RETURN {expr};")];

    Ok(match accessor {
        Accessor::Get => {
            let default = sql_from_json(kind, value::field_default(index, field)?)
                .map(|v| literal(&v))
                .unwrap_or_else(|_| "NULL".to_string());
            ret(call(Op::GetOr, kind, &["`doc`".into(), n, default]))
        }
        Accessor::GetOr => ret(call(Op::GetOr, kind, &field_args(field, &["default_value"]))),
        Accessor::Has => ret(call(Op::Has, kind, &field_args(field, &[]))),
        Accessor::Clear => ret(call(Op::Clear, kind, &field_args(field, &[]))),
        Accessor::Set => {
            let doc = without_siblings(message, field);
            vec![
                format!(
                    "IF `value` IS NULL THEN RETURN {}; END IF;",
                    call(Op::Clear, kind, &field_args(field, &[]))
                ),
                format!("RETURN {};", call(Op::Set, kind, &[doc, n, "`value`".into()])),
            ]
        }
        Accessor::GetAsName | Accessor::GetAsNameOr => {
            let e = enum_of(index, message, field)?;
            let default = value::field_default(index, field)?;
            let number = call(Op::GetOr, kind, &["`doc`".into(), n.clone(), default.to_string()]);
            let mut body = Vec::new();
            if accessor == Accessor::GetAsNameOr {
                body.push(format!(
                    "IF NOT {} THEN RETURN `default_value`; END IF;",
                    call(Op::Has, kind, &["`doc`".into(), n])
                ));
            }
            body.push(format!("RETURN {};", enum_case(e, &number, false)));
            body
        }
        Accessor::SetFromName => {
            let e = enum_of(index, message, field)?;
            let doc = without_siblings(message, field);
            vec![
                "DECLARE `number` INT;".to_string(),
                format!(
                    "IF `name` IS NULL THEN RETURN {}; END IF;",
                    call(Op::Clear, kind, &field_args(field, &[]))
                ),
                format!("SET `number` = {};", enum_case(e, "`name`", true)),
                format!("IF `number` IS NULL THEN {} END IF;", signal_invalid_enum(e)),
                format!("RETURN {};", call(Op::Set, kind, &[doc, n, "`number`".into()])),
            ]
        }
        Accessor::GetAll => ret(call(Op::GetAllRepeated, kind, &field_args(field, &[]))),
        Accessor::SetAll => ret(call(Op::SetAllRepeated, kind, &field_args(field, &["values"]))),
        Accessor::Add => ret(call(Op::AddRepeated, kind, &field_args(field, &["value"]))),
        Accessor::AddAll => ret(call(Op::AddAllRepeated, kind, &field_args(field, &["values"]))),
        Accessor::Count => ret(call(Op::CountRepeated, kind, &field_args(field, &[]))),
        Accessor::GetAt => ret(call(Op::GetRepeated, kind, &field_args(field, &["idx"]))),
        Accessor::SetAt => ret(call(Op::SetRepeated, kind, &field_args(field, &["idx", "value"]))),
        Accessor::InsertAt => ret(call(
            Op::InsertRepeated,
            kind,
            &field_args(field, &["idx", "value"]),
        )),
        Accessor::RemoveAt => ret(call(Op::RemoveRepeated, kind, &field_args(field, &["idx"]))),
        Accessor::ClearAll => ret(call(Op::ClearRepeated, kind, &field_args(field, &[]))),
        _ => Vec::new(),
    })
}

fn oneof_body(message: &MessageDescriptor, i: usize, accessor: Accessor) -> Vec<String> {
    let members: Vec<&FieldDescriptor> = message
        .oneofs
        .get(i)
        .map(|o| o.fields.iter().filter_map(|&n| message.field(n)).collect())
        .unwrap_or_default();
    if accessor == Accessor::Which {
        let mut case = "CASE".to_string();
        for f in &members {
            let has = call(Op::Has, f.kind, &["`doc`".into(), f.number.to_string()]);
            write!(case, " WHEN {has} THEN {}", quote(&f.name)).ok();
        }
        case.push_str(" ELSE NULL END");
        return vec![format!("RETURN {case};")];
    }
    let mut doc = "`doc`".to_string();
    for f in members {
        doc = call(Op::Clear, f.kind, &[doc, f.number.to_string()]);
    }
    vec![format!("RETURN {doc};")]
}

fn enum_of<'i>(
    index: &'i DescriptorIndex,
    message: &MessageDescriptor,
    field: &FieldDescriptor,
) -> Result<&'i EnumDescriptor> {
    index
        .enum_type_of(field)
        .ok_or_else(|| unknown(&format!("{}.{}", message.full_name, field.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerateConfig;
    use prost_types::field_descriptor_proto::Type;
    use protosql_descriptor::builder::{EnumBuilder, FileBuilder, MessageBuilder};

    fn rendered() -> String {
        let file = FileBuilder::new("t/knob.proto", "t")
            .enumeration(EnumBuilder::new("Mode").value("MODE_OFF", 0).value("MODE_ON", 1))
            .message(
                MessageBuilder::new("Knob")
                    .field("level", 1, Type::Int32)
                    .enum_field("mode", 2, "Mode")
                    .oneof_field("source", "dial", 3, Type::Int32, None)
                    .oneof_field("source", "label", 4, Type::String, None),
            )
            .build();
        let index = DescriptorIndex::from_files(&[file]).unwrap();
        let config = GenerateConfig::new().with_descriptor_set_name("knobs");
        let surface = Surface::build(&index, &["t/knob.proto".into()], &config).unwrap();
        let files = render(&index, &surface).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "t/knob.sql");
        files[0].content.clone()
    }

    #[test]
    fn header_names_the_descriptor_set_and_source() {
        let sql = rendered();
        assert!(sql.starts_with("-- Generated by protoc-gen-protosql. DO NOT EDIT.\n"));
        assert!(sql.contains("-- descriptor set: knobs\n-- source: t/knob.proto\n"));
        assert!(sql.trim_end().ends_with("DELIMITER ;"));
    }

    #[test]
    fn accessors_delegate_to_runtime_routines() {
        let sql = rendered();
        assert!(sql.contains(
            "CREATE FUNCTION `knob_get_level`(`doc` JSON) RETURNS INT DETERMINISTIC\nBEGIN\n  RETURN `number_json_get_int32_field_or`(`doc`, 1, 0);\nEND$$"
        ));
        assert!(sql.contains("RETURN number_json_to_message('knobs', 't.Knob', `doc`);"));
        assert!(sql.contains(
            "RETURN `number_json_set_int32_field`(`number_json_clear_string_field`(`doc`, 4), 3, `value`);"
        ));
        assert!(sql.contains("CASE WHEN `number_json_has_int32_field`(`doc`, 3) THEN 'dial'"));
    }

    #[test]
    fn enum_names_signal_on_unknown_values() {
        let sql = rendered();
        assert!(sql.contains("RETURN CASE `name` WHEN 'MODE_OFF' THEN 0 WHEN 'MODE_ON' THEN 1 ELSE NULL END;"));
        assert!(sql.contains(
            "SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = 'InvalidEnumName: not a value of t.Mode';"
        ));
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(quote("it's"), "'it''s'");
        assert_eq!(literal(&SqlValue::Bool(true)), "TRUE");
        assert_eq!(literal(&SqlValue::Double(1.5)), "1.5");
        assert_eq!(literal(&SqlValue::Blob(vec![0xab])), "X'ab'");
    }
}
