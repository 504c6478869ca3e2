//! NumberJSON ⇄ canonical ProtoJSON.
//!
//! Field keys switch between decimal field numbers and `json_name`s; scalar
//! shapes switch between storage form (tagged floats, numeric 64-bit ints)
//! and the ProtoJSON mapping (`"NaN"`, decimal strings, enum names). Well-known
//! types are delegated to [`crate::wkt`].

use std::collections::BTreeMap;

use protosql_descriptor::{
    Cardinality, DescriptorIndex, EnumDescriptor, FieldDescriptor, FieldKind, MessageDescriptor,
    WellKnownType,
};
use serde_json::{Map, Number, Value};

use crate::codec::{message_type, MAX_DEPTH};
use crate::error::{Error, ErrorKind, Result};
use crate::{float, value, wkt};

const NULL_VALUE: &str = "google.protobuf.NullValue";
const VALUE: &str = "google.protobuf.Value";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPrintOptions {
    /// Print absent implicit-presence scalars, empty repeated fields and
    /// empty maps with their defaults.
    pub emit_default_values: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct JsonParseOptions {
    /// Skip keys that match no field (and enum names that match no value)
    /// instead of failing.
    pub ignore_unknown_fields: bool,
}

impl Default for JsonParseOptions {
    fn default() -> Self {
        Self {
            ignore_unknown_fields: true,
        }
    }
}

impl JsonParseOptions {
    pub fn strict() -> Self {
        Self {
            ignore_unknown_fields: false,
        }
    }
}

pub fn to_proto_json(
    index: &DescriptorIndex,
    message: &MessageDescriptor,
    doc: &Value,
    options: &JsonPrintOptions,
) -> Result<Value> {
    Printer { index, options }.message(message, doc, 0)
}

pub fn from_proto_json(
    index: &DescriptorIndex,
    message: &MessageDescriptor,
    json: &Value,
    options: &JsonParseOptions,
) -> Result<Value> {
    Parser { index, options }.message(message, json, 0)
}

pub(crate) fn expect_object<'v>(
    message: &MessageDescriptor,
    value: &'v Value,
) -> Result<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::type_mismatch(format!("{}: expected an object, got {value}", message.full_name))
    })
}

fn too_deep(message: &MessageDescriptor) -> Error {
    Error::malformed_json(format!(
        "{}: nesting deeper than {MAX_DEPTH}",
        message.full_name
    ))
}

// =============================================================================
// Printing
// =============================================================================

pub(crate) struct Printer<'a> {
    pub(crate) index: &'a DescriptorIndex,
    pub(crate) options: &'a JsonPrintOptions,
}

impl Printer<'_> {
    pub(crate) fn message(
        &self,
        message: &MessageDescriptor,
        doc: &Value,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(too_deep(message));
        }
        if let Some(wkt) = WellKnownType::from_full_name(&message.full_name) {
            return wkt::print(self, wkt, message, doc, depth);
        }
        let obj = expect_object(message, doc)?;

        let mut out = Map::new();
        for field in &message.fields {
            let present = obj
                .get(&field.number.to_string())
                .filter(|v| !v.is_null())
                .filter(|v| self.options.emit_default_values || !holds_default(field, v));
            let printed = match present {
                Some(v) => self
                    .field(field, v, depth)
                    .map_err(|e| e.at(format_args!("{}.{}", message.full_name, field.name)))?,
                None if self.options.emit_default_values => match self.default_for(field)? {
                    Some(v) => v,
                    None => continue,
                },
                None => continue,
            };
            out.insert(field.json_name.clone(), printed);
        }
        Ok(Value::Object(out))
    }

    fn default_for(&self, field: &FieldDescriptor) -> Result<Option<Value>> {
        Ok(match field.cardinality {
            Cardinality::Map => Some(Value::Object(Map::new())),
            Cardinality::Repeated => Some(Value::Array(Vec::new())),
            Cardinality::Singular
                if field.oneof_index.is_none() && field.kind != FieldKind::Message =>
            {
                let default = value::field_default(self.index, field)?;
                Some(self.single(field, &default, 0)?)
            }
            _ => None,
        })
    }

    pub(crate) fn field(&self, field: &FieldDescriptor, v: &Value, depth: usize) -> Result<Value> {
        if field.is_map() {
            return self.map(field, v, depth);
        }
        if field.is_repeated() {
            let items = v.as_array().ok_or_else(|| {
                Error::type_mismatch(format!("repeated field expects an array, got {v}"))
            })?;
            return items
                .iter()
                .map(|item| self.single(field, item, depth))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array);
        }
        self.single(field, v, depth)
    }

    fn map(&self, field: &FieldDescriptor, v: &Value, depth: usize) -> Result<Value> {
        let entry = message_type(self.index, field)?;
        let (Some(key_field), Some(value_field)) = (entry.field(1), entry.field(2)) else {
            return Err(Error::mismatch(format!("{} is not a map entry", entry.full_name)));
        };
        let entries = v
            .as_array()
            .ok_or_else(|| Error::type_mismatch(format!("map field expects an array, got {v}")))?;
        let mut out = Map::new();
        for e in entries {
            let e = expect_object(entry, e)?;
            let key = match e.get("1") {
                Some(k) => value::normalize(key_field.kind, k)?,
                None => value::zero(key_field.kind),
            };
            let val = match e.get("2") {
                Some(v) => v.clone(),
                None => value::field_default(self.index, value_field)?,
            };
            out.insert(map_key_text(&key), self.single(value_field, &val, depth)?);
        }
        Ok(Value::Object(out))
    }

    pub(crate) fn single(&self, field: &FieldDescriptor, v: &Value, depth: usize) -> Result<Value> {
        match field.kind {
            FieldKind::Message => {
                let target = message_type(self.index, field)?;
                self.message(target, v, depth + 1)
            }
            FieldKind::Enum => {
                let number = value::as_i32(FieldKind::Enum, v)?;
                print_enum(self.index.enum_type_of(field), number)
            }
            kind => scalar_to_json(kind, v),
        }
    }
}

fn map_key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_enum(enum_type: Option<&EnumDescriptor>, number: i32) -> Result<Value> {
    let Some(e) = enum_type else {
        return Ok(Value::from(number));
    };
    if e.full_name == NULL_VALUE {
        return Ok(Value::Null);
    }
    Ok(match e.name_of(number) {
        Some(name) => Value::String(name.to_string()),
        None => Value::from(number),
    })
}

/// ProtoJSON rendering of a stored scalar.
pub(crate) fn scalar_to_json(kind: FieldKind, v: &Value) -> Result<Value> {
    Ok(match kind {
        FieldKind::Float => {
            let f = float::read_f32(v)?;
            match special_float(f64::from(f)) {
                Some(s) => s,
                None => Value::Number(float::f32_number(f).ok_or_else(|| {
                    Error::type_mismatch(format!("{f} has no JSON number form"))
                })?),
            }
        }
        FieldKind::Double => {
            let f = float::read_f64(v)?;
            match special_float(f) {
                Some(s) => s,
                None => Value::Number(Number::from_f64(f).ok_or_else(|| {
                    Error::type_mismatch(format!("{f} has no JSON number form"))
                })?),
            }
        }
        k if k.is_64bit_integer() => match value::normalize(k, v)? {
            Value::Number(n) => Value::String(n.to_string()),
            other => other,
        },
        k => value::normalize(k, v)?,
    })
}

fn special_float(f: f64) -> Option<Value> {
    let s = if f.is_nan() {
        "NaN"
    } else if f == f64::INFINITY {
        "Infinity"
    } else if f == f64::NEG_INFINITY {
        "-Infinity"
    } else {
        return None;
    };
    Some(Value::String(s.to_string()))
}

// =============================================================================
// Parsing
// =============================================================================

pub(crate) struct Parser<'a> {
    pub(crate) index: &'a DescriptorIndex,
    pub(crate) options: &'a JsonParseOptions,
}

impl Parser<'_> {
    pub(crate) fn message(
        &self,
        message: &MessageDescriptor,
        json: &Value,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(too_deep(message));
        }
        if let Some(wkt) = WellKnownType::from_full_name(&message.full_name) {
            return wkt::parse(self, wkt, message, json, depth);
        }
        let obj = expect_object(message, json)?;

        let mut fields: BTreeMap<u32, Value> = BTreeMap::new();
        for (key, v) in obj {
            let Some(field) = message.field_by_json_name(key) else {
                if self.options.ignore_unknown_fields {
                    continue;
                }
                return Err(Error::new(
                    ErrorKind::UnknownField,
                    format!("{} has no field `{key}`", message.full_name),
                ));
            };
            if v.is_null() && !accepts_null(field) {
                continue;
            }
            let parsed = self
                .field(field, v, depth)
                .map_err(|e| e.at(format_args!("{}.{}", message.full_name, field.name)))?;
            let Some(parsed) = parsed else { continue };
            if is_implicit_zero(field, &parsed) {
                continue;
            }
            for sibling in message.oneof_siblings(field) {
                fields.remove(&sibling);
            }
            fields.insert(field.number, parsed);
        }
        Ok(Value::Object(
            fields
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        ))
    }

    /// `None` when the value parses to "absent" (empty list, skipped enum).
    pub(crate) fn field(&self, field: &FieldDescriptor, v: &Value, depth: usize) -> Result<Option<Value>> {
        if field.is_map() {
            return self.map(field, v, depth);
        }
        if field.is_repeated() {
            let items = v.as_array().ok_or_else(|| {
                Error::type_mismatch(format!("repeated field expects an array, got {v}"))
            })?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(parsed) = self.single(field, item, depth)? {
                    out.push(parsed);
                }
            }
            return Ok((!out.is_empty()).then_some(Value::Array(out)));
        }
        self.single(field, v, depth)
    }

    fn map(&self, field: &FieldDescriptor, v: &Value, depth: usize) -> Result<Option<Value>> {
        let entry = message_type(self.index, field)?;
        let (Some(key_field), Some(value_field)) = (entry.field(1), entry.field(2)) else {
            return Err(Error::mismatch(format!("{} is not a map entry", entry.full_name)));
        };
        let obj = v
            .as_object()
            .ok_or_else(|| Error::type_mismatch(format!("map field expects an object, got {v}")))?;
        let mut out = Vec::with_capacity(obj.len());
        for (k, v) in obj {
            let key = parse_map_key(key_field.kind, k)?;
            if v.is_null() && !accepts_null(value_field) {
                return Err(Error::type_mismatch(format!("map value for `{k}` is null")));
            }
            let Some(val) = self.single(value_field, v, depth)? else {
                continue;
            };
            let mut e = Map::new();
            e.insert("1".to_string(), key);
            e.insert("2".to_string(), val);
            out.push(Value::Object(e));
        }
        Ok((!out.is_empty()).then_some(Value::Array(out)))
    }

    pub(crate) fn single(
        &self,
        field: &FieldDescriptor,
        v: &Value,
        depth: usize,
    ) -> Result<Option<Value>> {
        match field.kind {
            FieldKind::Message => {
                let target = message_type(self.index, field)?;
                self.message(target, v, depth + 1).map(Some)
            }
            FieldKind::Enum => self.enum_value(self.index.enum_type_of(field), v),
            kind => scalar_from_json(kind, v).map(Some),
        }
    }

    fn enum_value(&self, enum_type: Option<&EnumDescriptor>, v: &Value) -> Result<Option<Value>> {
        match v {
            Value::Null if enum_type.map(|e| e.full_name.as_str()) == Some(NULL_VALUE) => {
                Ok(Some(Value::from(0)))
            }
            Value::String(name) => {
                let Some(e) = enum_type else {
                    return Err(Error::mismatch("enum field without enum type"));
                };
                match e.number_of(name) {
                    Some(n) => Ok(Some(Value::from(n))),
                    None if self.options.ignore_unknown_fields => Ok(None),
                    None => Err(Error::new(
                        ErrorKind::InvalidEnumName,
                        format!("`{name}` is not a value of {}", e.full_name),
                    )),
                }
            }
            Value::Number(_) => value::normalize(FieldKind::Enum, v).map(Some),
            other => Err(Error::type_mismatch(format!(
                "expected an enum name or number, got {other}"
            ))),
        }
    }
}

/// proto3 implicit-presence scalars holding their zero value are not
/// serialized, so they are not stored either.
fn is_implicit_zero(field: &FieldDescriptor, parsed: &Value) -> bool {
    field.cardinality == Cardinality::Singular
        && field.oneof_index.is_none()
        && field.kind != FieldKind::Message
        && *parsed == value::zero(field.kind)
}

/// A stored value canonical ProtoJSON leaves out: an empty repeated field or
/// an implicit-presence scalar at its zero value.
fn holds_default(field: &FieldDescriptor, v: &Value) -> bool {
    if field.is_repeated() {
        return v.as_array().is_some_and(Vec::is_empty);
    }
    value::normalize(field.kind, v).is_ok_and(|n| is_implicit_zero(field, &n))
}

fn accepts_null(field: &FieldDescriptor) -> bool {
    !field.is_repeated()
        && matches!(
            field.type_name.as_deref(),
            Some(VALUE) | Some(NULL_VALUE)
        )
}

fn parse_map_key(kind: FieldKind, key: &str) -> Result<Value> {
    match kind {
        FieldKind::String => Ok(Value::String(key.to_string())),
        FieldKind::Bool => match key {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(Error::type_mismatch(format!("`{other}` is not a bool map key"))),
        },
        k if k.is_integer() => value::normalize(k, &Value::String(key.to_string())),
        other => Err(Error::mismatch(format!("{other} cannot be a map key"))),
    }
}

/// Storage form of a ProtoJSON scalar.
pub(crate) fn scalar_from_json(kind: FieldKind, v: &Value) -> Result<Value> {
    match kind {
        FieldKind::Float | FieldKind::Double => {
            let f = parse_float(kind, v)?;
            Ok(Value::String(if kind == FieldKind::Float {
                float::tag_f32(float::narrow_f64(f)?)
            } else {
                float::tag_f64(f)
            }))
        }
        FieldKind::Bool if !v.is_boolean() => Err(Error::type_mismatch(format!(
            "expected a boolean, got {v}"
        ))),
        k if k.is_integer() && !(v.is_number() || v.is_string()) => Err(Error::type_mismatch(
            format!("expected an integer, got {v}"),
        )),
        k => value::normalize(k, v),
    }
}

fn parse_float(kind: FieldKind, v: &Value) -> Result<f64> {
    match v {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::type_mismatch(format!("{n} is not a number"))),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            text => {
                if let Some(f) = float::untag_f64(text) {
                    return Ok(f);
                }
                if let Some(f) = float::untag_f32(text) {
                    return Ok(f64::from(f));
                }
                let f: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::type_mismatch(format!("`{text}` is not a {kind}")))?;
                if f.is_finite() {
                    Ok(f)
                } else {
                    Err(Error::type_mismatch(format!("`{text}` is not a {kind}")))
                }
            }
        },
        other => Err(Error::type_mismatch(format!("expected a {kind}, got {other}"))),
    }
}
