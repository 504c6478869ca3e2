//! The field routine catalogue: `<surface>_<op>_<kind>_field` names resolved
//! to an operation and executed over SQL values.
//!
//! ```
//! use protosql_runtime::routine::{call, SqlValue};
//! use serde_json::json;
//!
//! let doc = call(
//!     "number_json_set_int32_field",
//!     &[SqlValue::Json(json!({})), SqlValue::Int(1), SqlValue::Int(123)],
//! )
//! .unwrap();
//! assert_eq!(doc, SqlValue::Json(json!({"1": 123})));
//! ```

use std::fmt;
use std::str::FromStr;

use protosql_descriptor::FieldKind;
use protosql_wire::WireMessage;
use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};
use crate::wire_fields::{self, WireField};
use crate::typed::{self, Scalar};
use crate::{fields, float, value};

/// A SQL-side value as the routines see it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Float(f32),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
    Json(Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            SqlValue::Int(i) => Ok(*i),
            SqlValue::UInt(u) => i64::try_from(*u)
                .map_err(|_| Error::range(format!("{u} does not fit a signed integer"))),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::type_mismatch(format!("`{s}` is not an integer"))),
            SqlValue::Json(v) => value::as_i64(FieldKind::Int64, v),
            other => Err(Error::type_mismatch(format!(
                "expected an integer argument, got {other}"
            ))),
        }
    }

    /// JSON rendering used for document and list arguments.
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            SqlValue::Null => Value::Null,
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::UInt(u) => Value::from(*u),
            SqlValue::Double(f) => Value::String(float::tag_f64(*f)),
            SqlValue::Float(f) => Value::String(float::tag_f32(*f)),
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Text(s) => serde_json::from_str(s)?,
            SqlValue::Blob(b) => Value::String(value::encode_base64(b)),
            SqlValue::Json(v) => v.clone(),
        })
    }

    pub fn into_json(self) -> Result<Value> {
        match self {
            SqlValue::Json(v) => Ok(v),
            other => other.to_json(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Int(i) => write!(f, "{i}"),
            SqlValue::UInt(u) => write!(f, "{u}"),
            SqlValue::Double(d) => write!(f, "{d}"),
            SqlValue::Float(x) => write!(f, "{x}"),
            SqlValue::Bool(b) => write!(f, "{b}"),
            SqlValue::Text(s) => write!(f, "'{s}'"),
            SqlValue::Blob(b) => write!(f, "X'{}'", hex::encode(b)),
            SqlValue::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Scalar argument → NumberJSON value of `kind`.
pub fn json_from_sql(kind: FieldKind, v: &SqlValue) -> Result<Value> {
    Ok(match (kind, v) {
        (_, SqlValue::Json(v)) => v.clone(),
        // MySQL BOOLEAN is TINYINT(1): TRUE/FALSE arrive as 1/0.
        (FieldKind::Bool, SqlValue::Int(i)) => Value::Bool(bool_from_int(i128::from(*i))?),
        (FieldKind::Bool, SqlValue::UInt(u)) => Value::Bool(bool_from_int(i128::from(*u))?),
        (FieldKind::Float, SqlValue::Double(d)) => Value::String(float::tag_f32(float::narrow_f64(*d)?)),
        (FieldKind::Double, SqlValue::Float(x)) => Value::String(float::tag_f64(f64::from(*x))),
        (FieldKind::Bytes | FieldKind::Message, SqlValue::Blob(b)) => {
            Value::String(value::encode_base64(b))
        }
        (FieldKind::String | FieldKind::Bytes, SqlValue::Text(s)) => Value::String(s.clone()),
        (FieldKind::Message, SqlValue::Text(s)) => serde_json::from_str(s)?,
        (_, SqlValue::Text(s)) => Value::String(s.clone()),
        (_, other) => other.to_json()?,
    })
}

fn bool_from_int(i: i128) -> Result<bool> {
    match i {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::type_mismatch(format!(
            "expected a boolean, got {other}"
        ))),
    }
}

/// NumberJSON value of `kind` → SQL result.
pub fn sql_from_json(kind: FieldKind, v: Value) -> Result<SqlValue> {
    fn native<S: Scalar>(v: &Value) -> Result<SqlValue> {
        S::from_json(v).map(S::to_sql)
    }

    match kind {
        FieldKind::Int32 => native::<typed::Int32>(&v),
        FieldKind::SInt32 => native::<typed::SInt32>(&v),
        FieldKind::SFixed32 => native::<typed::SFixed32>(&v),
        FieldKind::Enum => native::<typed::Enum>(&v),
        FieldKind::UInt32 => native::<typed::UInt32>(&v),
        FieldKind::Fixed32 => native::<typed::Fixed32>(&v),
        FieldKind::Int64 => native::<typed::Int64>(&v),
        FieldKind::SInt64 => native::<typed::SInt64>(&v),
        FieldKind::SFixed64 => native::<typed::SFixed64>(&v),
        FieldKind::UInt64 => native::<typed::UInt64>(&v),
        FieldKind::Fixed64 => native::<typed::Fixed64>(&v),
        FieldKind::Float => native::<typed::Float>(&v),
        FieldKind::Double => native::<typed::Double>(&v),
        FieldKind::Bool => native::<typed::Bool>(&v),
        FieldKind::String => native::<typed::Str>(&v),
        FieldKind::Bytes => native::<typed::Bytes>(&v),
        FieldKind::Message => Ok(SqlValue::Json(v)),
    }
}

// =============================================================================
// Names
// =============================================================================

/// Document representation a routine works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// WireJSON documents.
    Wire,
    /// Raw message bytes.
    Message,
    NumberJson,
}

impl Surface {
    pub const ALL: [Surface; 3] = [Surface::Wire, Surface::Message, Surface::NumberJson];

    pub fn prefix(self) -> &'static str {
        match self {
            Surface::Wire => "wire",
            Surface::Message => "message",
            Surface::NumberJson => "number_json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    GetOr,
    Set,
    Has,
    Clear,
    GetRepeated,
    GetAllRepeated,
    SetRepeated,
    SetAllRepeated,
    AddRepeated,
    AddAllRepeated,
    CountRepeated,
    InsertRepeated,
    RemoveRepeated,
    ClearRepeated,
}

impl Op {
    pub const ALL: [Op; 15] = [
        Op::Get,
        Op::GetOr,
        Op::Set,
        Op::Has,
        Op::Clear,
        Op::GetRepeated,
        Op::GetAllRepeated,
        Op::SetRepeated,
        Op::SetAllRepeated,
        Op::AddRepeated,
        Op::AddAllRepeated,
        Op::CountRepeated,
        Op::InsertRepeated,
        Op::RemoveRepeated,
        Op::ClearRepeated,
    ];

    /// The verb between surface and kind (`get_or` is spelled as a suffix).
    fn verb(self) -> &'static str {
        match self {
            Op::Get | Op::GetOr => "get",
            Op::Set => "set",
            Op::Has => "has",
            Op::Clear => "clear",
            Op::GetRepeated => "get_repeated",
            Op::GetAllRepeated => "get_all_repeated",
            Op::SetRepeated => "set_repeated",
            Op::SetAllRepeated => "set_all_repeated",
            Op::AddRepeated => "add_repeated",
            Op::AddAllRepeated => "add_all_repeated",
            Op::CountRepeated => "count_repeated",
            Op::InsertRepeated => "insert_repeated",
            Op::RemoveRepeated => "remove_repeated",
            Op::ClearRepeated => "clear_repeated",
        }
    }

    pub fn is_repeated(self) -> bool {
        !matches!(self, Op::Get | Op::GetOr | Op::Set | Op::Has | Op::Clear)
    }

    /// Whether the routine returns the updated document.
    pub fn mutates(self) -> bool {
        matches!(
            self,
            Op::Set
                | Op::Clear
                | Op::SetRepeated
                | Op::SetAllRepeated
                | Op::AddRepeated
                | Op::AddAllRepeated
                | Op::InsertRepeated
                | Op::RemoveRepeated
                | Op::ClearRepeated
        )
    }

    /// Positional arguments after the document and field number.
    pub fn extra_args(self) -> &'static [&'static str] {
        match self {
            Op::Get | Op::Has | Op::Clear => &[],
            Op::GetAllRepeated | Op::CountRepeated | Op::ClearRepeated => &[],
            Op::GetOr => &["default_value"],
            Op::Set | Op::AddRepeated => &["value"],
            Op::SetAllRepeated | Op::AddAllRepeated => &["values"],
            Op::GetRepeated | Op::RemoveRepeated => &["idx"],
            Op::SetRepeated | Op::InsertRepeated => &["idx", "value"],
        }
    }
}

/// A resolved routine name such as `wire_add_repeated_int32_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutineName {
    pub surface: Surface,
    pub op: Op,
    pub kind: FieldKind,
}

impl RoutineName {
    pub fn new(surface: Surface, op: Op, kind: FieldKind) -> Self {
        Self { surface, op, kind }
    }

    /// Every routine of the catalogue.
    pub fn all() -> impl Iterator<Item = RoutineName> {
        Surface::ALL.into_iter().flat_map(|surface| {
            Op::ALL.into_iter().flat_map(move |op| {
                FieldKind::ALL
                    .into_iter()
                    .map(move |kind| RoutineName::new(surface, op, kind))
            })
        })
    }
}

impl fmt::Display for RoutineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_field",
            self.surface.prefix(),
            self.op.verb(),
            self.kind.name()
        )?;
        if self.op == Op::GetOr {
            f.write_str("_or")?;
        }
        Ok(())
    }
}

impl FromStr for RoutineName {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let unknown = || Error::new(ErrorKind::UnknownType, format!("no routine named {name}"));

        let (surface, rest) = Surface::ALL
            .into_iter()
            .find_map(|s| {
                name.strip_prefix(s.prefix())
                    .and_then(|r| r.strip_prefix('_'))
                    .map(|r| (s, r))
            })
            .ok_or_else(unknown)?;
        let (body, or) = match rest.strip_suffix("_field_or") {
            Some(body) => (body, true),
            None => (rest.strip_suffix("_field").ok_or_else(unknown)?, false),
        };
        let (verb, kind) = body.rsplit_once('_').ok_or_else(unknown)?;
        let kind = FieldKind::from_name(kind).ok_or_else(unknown)?;
        let op = Op::ALL
            .into_iter()
            .filter(|op| (*op == Op::GetOr) == or)
            .find(|op| op.verb() == verb)
            .ok_or_else(unknown)?;
        Ok(RoutineName::new(surface, op, kind))
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Resolves `name` and runs it.
pub fn call(name: &str, args: &[SqlValue]) -> Result<SqlValue> {
    name.parse::<RoutineName>()?.call(args)
}

fn arg<'a>(args: &'a [SqlValue], i: usize, name: &str) -> Result<&'a SqlValue> {
    args.get(i).ok_or_else(|| {
        Error::type_mismatch(format!("missing argument {} ({name})", i + 1))
    })
}

fn field_number(args: &[SqlValue]) -> Result<u32> {
    let n = arg(args, 1, "field_number")?.as_i64()?;
    u32::try_from(n)
        .ok()
        .filter(|n| (1..=protosql_wire::varint::MAX_FIELD_NUMBER).contains(n))
        .ok_or_else(|| Error::range(format!("{n} is not a valid field number")))
}

enum Outcome<D> {
    Doc(D),
    Value(SqlValue),
}

impl RoutineName {
    pub fn call(&self, args: &[SqlValue]) -> Result<SqlValue> {
        let expected = 2 + self.op.extra_args().len();
        if args.len() != expected {
            return Err(Error::type_mismatch(format!(
                "{self} takes {expected} arguments, got {}",
                args.len()
            )));
        }
        let number = field_number(args)?;
        let doc = arg(args, 0, "document")?;
        let result = match self.surface {
            Surface::NumberJson => match self.run(doc.to_json()?, number, self.kind, args)? {
                Outcome::Doc(doc) => SqlValue::Json(doc),
                Outcome::Value(v) => v,
            },
            Surface::Wire => {
                let msg = match doc.to_json()? {
                    Value::Null => WireMessage::new(),
                    json => WireMessage::from_json(&json)?,
                };
                match self.on_records(msg, number, args)? {
                    Outcome::Doc(msg) => SqlValue::Json(msg.to_json()),
                    Outcome::Value(v) => v,
                }
            }
            Surface::Message => {
                let msg = match doc {
                    SqlValue::Null => WireMessage::new(),
                    SqlValue::Blob(bytes) => WireMessage::scan(bytes)?,
                    other => {
                        return Err(Error::type_mismatch(format!(
                            "{self} expects message bytes, got {other}"
                        )))
                    }
                };
                match self.on_records(msg, number, args)? {
                    Outcome::Doc(msg) => SqlValue::Blob(msg.encode()),
                    Outcome::Value(v) => v,
                }
            }
        };
        Ok(result)
    }

    fn on_records(
        &self,
        msg: WireMessage,
        number: u32,
        args: &[SqlValue],
    ) -> Result<Outcome<WireMessage>> {
        let field = WireField {
            number,
            kind: self.kind,
            repeated: self.op.is_repeated(),
        };
        let storage = field.storage_kind();
        if self.op.mutates() {
            return wire_fields::update(msg, field, |doc| {
                match self.run(doc, number, storage, args)? {
                    Outcome::Doc(doc) => Ok(doc),
                    Outcome::Value(_) => Err(Error::mismatch(format!("{self} returned no document"))),
                }
            })
            .map(Outcome::Doc);
        }
        let outcome = wire_fields::read(&msg, field, |doc| self.run(doc.clone(), number, storage, args))?;
        Ok(match outcome {
            Outcome::Value(v) => Outcome::Value(v),
            Outcome::Doc(_) => Outcome::Doc(msg),
        })
    }

    fn run(
        &self,
        doc: Value,
        number: u32,
        kind: FieldKind,
        args: &[SqlValue],
    ) -> Result<Outcome<Value>> {
        let value_at = |i: usize, name: &str| -> Result<Value> {
            json_from_sql(kind, arg(args, i, name)?)
        };
        let index_at = |i: usize| -> Result<i64> { arg(args, i, "idx")?.as_i64() };
        let list_at = |i: usize| -> Result<Value> { arg(args, i, "values")?.to_json() };
        let out = |v: Value| sql_from_json(kind, v).map(Outcome::Value);

        match self.op {
            Op::Get => out(fields::get(&doc, number, kind)?),
            Op::GetOr => {
                let default = arg(args, 2, "default_value")?;
                if fields::has(&doc, number)? {
                    out(fields::get(&doc, number, kind)?)
                } else {
                    Ok(Outcome::Value(default.clone()))
                }
            }
            Op::Set => fields::set(doc, number, kind, &value_at(2, "value")?).map(Outcome::Doc),
            Op::Has => Ok(Outcome::Value(SqlValue::Bool(fields::has(&doc, number)?))),
            Op::Clear | Op::ClearRepeated => fields::clear(doc, number).map(Outcome::Doc),
            Op::GetRepeated => out(fields::get_at(&doc, number, kind, index_at(2)?)?),
            Op::GetAllRepeated => Ok(Outcome::Value(SqlValue::Json(fields::get_all(
                &doc, number, kind,
            )?))),
            Op::SetRepeated => {
                fields::set_at(doc, number, kind, index_at(2)?, &value_at(3, "value")?)
                    .map(Outcome::Doc)
            }
            Op::SetAllRepeated => fields::set_all(doc, number, kind, &list_at(2)?).map(Outcome::Doc),
            Op::AddRepeated => fields::add(doc, number, kind, &value_at(2, "value")?).map(Outcome::Doc),
            Op::AddAllRepeated => fields::add_all(doc, number, kind, &list_at(2)?).map(Outcome::Doc),
            Op::CountRepeated => Ok(Outcome::Value(SqlValue::Int(
                fields::count(&doc, number)? as i64,
            ))),
            Op::InsertRepeated => {
                fields::insert_at(doc, number, kind, index_at(2)?, &value_at(3, "value")?)
                    .map(Outcome::Doc)
            }
            Op::RemoveRepeated => fields::remove_at(doc, number, index_at(2)?).map(Outcome::Doc),
        }
    }
}
