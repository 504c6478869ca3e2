//! ProtoJSON special forms of the well-known types.

use chrono::{DateTime, SecondsFormat, Utc};
use protosql_descriptor::{FieldKind, MessageDescriptor, WellKnownType};
use serde_json::{Map, Value};

use crate::codec::{self, DecodeOptions};
use crate::error::{Error, Result};
use crate::proto_json::{expect_object, Parser, Printer};
use crate::{float, value};

/// 0001-01-01T00:00:00Z
const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
/// 9999-12-31T23:59:59Z
const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;
/// ±10000 years.
const MAX_DURATION_SECONDS: i64 = 315_576_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

pub(crate) fn print(
    printer: &Printer<'_>,
    wkt: WellKnownType,
    message: &MessageDescriptor,
    doc: &Value,
    depth: usize,
) -> Result<Value> {
    let obj = expect_object(message, doc)?;
    match wkt {
        WellKnownType::Timestamp => {
            let (seconds, nanos) = seconds_nanos(obj)?;
            print_timestamp(seconds, nanos).map(Value::String)
        }
        WellKnownType::Duration => {
            let (seconds, nanos) = seconds_nanos(obj)?;
            print_duration(seconds, nanos).map(Value::String)
        }
        WellKnownType::FieldMask => {
            let paths = match obj.get("1") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|p| value::as_str(p).map(snake_to_camel))
                    .collect::<Result<Vec<_>>>()?,
                Some(other) => {
                    return Err(Error::type_mismatch(format!(
                        "FieldMask paths must be an array, got {other}"
                    )))
                }
                None => Vec::new(),
            };
            Ok(Value::String(paths.join(",")))
        }
        WellKnownType::Struct | WellKnownType::ListValue => {
            let field = value_field(message)?;
            match obj.get("1") {
                Some(v) => printer.field(field, v, depth),
                None if wkt == WellKnownType::Struct => Ok(Value::Object(Map::new())),
                None => Ok(Value::Array(Vec::new())),
            }
        }
        WellKnownType::Value => print_value(printer, message, obj, depth),
        WellKnownType::Any => print_any(printer, obj, depth),
        WellKnownType::Empty => Ok(Value::Object(Map::new())),
        WellKnownType::NullValue => Ok(Value::Null),
        _ => {
            let field = value_field(message)?;
            let v = match obj.get("1") {
                Some(v) => v.clone(),
                None => value::zero(field.kind),
            };
            printer.single(field, &v, depth)
        }
    }
}

pub(crate) fn parse(
    parser: &Parser<'_>,
    wkt: WellKnownType,
    message: &MessageDescriptor,
    json: &Value,
    depth: usize,
) -> Result<Value> {
    let mut out = Map::new();
    match wkt {
        WellKnownType::Timestamp => {
            let (seconds, nanos) = parse_timestamp(expect_str(json, "Timestamp")?)?;
            put_seconds_nanos(&mut out, seconds, nanos);
        }
        WellKnownType::Duration => {
            let (seconds, nanos) = parse_duration(expect_str(json, "Duration")?)?;
            put_seconds_nanos(&mut out, seconds, nanos);
        }
        WellKnownType::FieldMask => {
            let text = expect_str(json, "FieldMask")?;
            let paths: Vec<Value> = text
                .split(',')
                .filter(|p| !p.is_empty())
                .map(|p| Value::String(camel_to_snake(p)))
                .collect();
            if !paths.is_empty() {
                out.insert("1".to_string(), Value::Array(paths));
            }
        }
        WellKnownType::Struct | WellKnownType::ListValue => {
            let field = value_field(message)?;
            if let Some(v) = parser.field(field, json, depth)? {
                out.insert("1".to_string(), v);
            }
        }
        WellKnownType::Value => return parse_value(parser, json, depth),
        WellKnownType::Any => return parse_any(parser, json, depth),
        WellKnownType::Empty => {
            expect_object(message, json)?;
        }
        WellKnownType::NullValue => {}
        _ => {
            let field = value_field(message)?;
            if let Some(v) = parser.single(field, json, depth)? {
                if v != value::zero(field.kind) {
                    out.insert("1".to_string(), v);
                }
            }
        }
    }
    Ok(Value::Object(out))
}

fn value_field(message: &MessageDescriptor) -> Result<&protosql_descriptor::FieldDescriptor> {
    message
        .field(1)
        .ok_or_else(|| Error::mismatch(format!("{} has no field 1", message.full_name)))
}

fn expect_str<'v>(json: &'v Value, what: &str) -> Result<&'v str> {
    json.as_str()
        .ok_or_else(|| Error::type_mismatch(format!("{what} expects a string, got {json}")))
}

// =============================================================================
// Timestamp / Duration
// =============================================================================

fn seconds_nanos(obj: &Map<String, Value>) -> Result<(i64, i32)> {
    let seconds = match obj.get("1") {
        Some(v) => value::as_i64(FieldKind::Int64, v)?,
        None => 0,
    };
    let nanos = match obj.get("2") {
        Some(v) => value::as_i32(FieldKind::Int32, v)?,
        None => 0,
    };
    Ok((seconds, nanos))
}

fn put_seconds_nanos(out: &mut Map<String, Value>, seconds: i64, nanos: i32) {
    if seconds != 0 {
        out.insert("1".to_string(), Value::from(seconds));
    }
    if nanos != 0 {
        out.insert("2".to_string(), Value::from(nanos));
    }
}

/// `.123`, `.123456` or `.123456789`, whichever is exact; empty for zero.
fn fraction(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000_000 == 0 {
        format!(".{:03}", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

pub fn print_timestamp(seconds: i64, nanos: i32) -> Result<String> {
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds)
        || !(0..NANOS_PER_SECOND as i32).contains(&nanos)
    {
        return Err(Error::range(format!(
            "Timestamp {seconds}s {nanos}ns is outside 0001-01-01..9999-12-31"
        )));
    }
    let nanos = nanos as u32;
    let dt = DateTime::<Utc>::from_timestamp(seconds, nanos)
        .ok_or_else(|| Error::range(format!("Timestamp {seconds}s is not representable")))?;
    Ok(format!(
        "{}{}Z",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        fraction(nanos)
    ))
}

pub fn parse_timestamp(text: &str) -> Result<(i64, i32)> {
    let dt = DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::type_mismatch(format!("`{text}` is not an RFC 3339 timestamp: {e}")))?
        .with_timezone(&Utc);
    let seconds = dt.timestamp();
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
        return Err(Error::range(format!("Timestamp `{text}` is out of range")));
    }
    tracing::trace!(
        timestamp = %dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        "parsed timestamp"
    );
    Ok((seconds, dt.timestamp_subsec_nanos() as i32))
}

pub fn print_duration(seconds: i64, nanos: i32) -> Result<String> {
    let same_sign = (seconds >= 0 && nanos >= 0) || (seconds <= 0 && nanos <= 0);
    if seconds.abs() > MAX_DURATION_SECONDS || nanos.unsigned_abs() >= NANOS_PER_SECOND as u32 || !same_sign
    {
        return Err(Error::range(format!(
            "Duration {seconds}s {nanos}ns is out of range"
        )));
    }
    let sign = if seconds < 0 || nanos < 0 { "-" } else { "" };
    Ok(format!(
        "{sign}{}{}s",
        seconds.unsigned_abs(),
        fraction(nanos.unsigned_abs())
    ))
}

pub fn parse_duration(text: &str) -> Result<(i64, i32)> {
    let bad = || Error::type_mismatch(format!("`{text}` is not a duration"));
    let body = text.strip_suffix('s').ok_or_else(bad)?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let (whole, frac) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || frac.len() > 9
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(bad());
    }
    let seconds: i64 = whole
        .parse()
        .map_err(|_| Error::range(format!("Duration `{text}` is out of range")))?;
    if seconds > MAX_DURATION_SECONDS {
        return Err(Error::range(format!("Duration `{text}` is out of range")));
    }
    let nanos: i32 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().map_err(|_| bad())?
    };
    Ok(if negative {
        (-seconds, -nanos)
    } else {
        (seconds, nanos)
    })
}

// =============================================================================
// FieldMask
// =============================================================================

fn snake_to_camel(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut upper_next = false;
    for c in path.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn camel_to_snake(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 4);
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// =============================================================================
// Struct / Value
// =============================================================================

fn print_value(
    printer: &Printer<'_>,
    message: &MessageDescriptor,
    obj: &Map<String, Value>,
    depth: usize,
) -> Result<Value> {
    let Some((number, v)) = (1u32..=6).find_map(|n| obj.get(&n.to_string()).map(|v| (n, v)))
    else {
        return Ok(Value::Null);
    };
    match number {
        1 => Ok(Value::Null),
        2 => {
            let f = float::read_f64(v)?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| Error::range(format!("Value cannot hold non-finite {f}")))
        }
        3 => Ok(Value::String(value::as_str(v)?.to_string())),
        4 => Ok(Value::Bool(value::as_bool(v)?)),
        n => {
            let field = message
                .field(n)
                .ok_or_else(|| Error::mismatch(format!("Value has no field {n}")))?;
            printer.single(field, v, depth)
        }
    }
}

fn parse_value(parser: &Parser<'_>, json: &Value, depth: usize) -> Result<Value> {
    let (number, v) = match json {
        Value::Null => (1, Value::from(0)),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| Error::type_mismatch(format!("{n} is not a number")))?;
            (2, Value::String(float::tag_f64(f)))
        }
        Value::String(s) => (3, Value::String(s.clone())),
        Value::Bool(b) => (4, Value::Bool(*b)),
        Value::Object(_) => (5, parse_nested(parser, "google.protobuf.Struct", json, depth)?),
        Value::Array(_) => (6, parse_nested(parser, "google.protobuf.ListValue", json, depth)?),
    };
    let mut out = Map::new();
    out.insert(number.to_string(), v);
    Ok(Value::Object(out))
}

fn parse_nested(parser: &Parser<'_>, type_name: &str, json: &Value, depth: usize) -> Result<Value> {
    let message = parser
        .index
        .message(type_name)
        .ok_or_else(|| Error::unknown_type(type_name))?;
    parser.message(message, json, depth + 1)
}

// =============================================================================
// Any
// =============================================================================

fn type_name_of_url(url: &str) -> &str {
    url.rsplit_once('/').map_or(url, |(_, name)| name)
}

fn print_any(printer: &Printer<'_>, obj: &Map<String, Value>, depth: usize) -> Result<Value> {
    let url = match obj.get("1") {
        Some(v) => value::as_str(v)?.to_string(),
        None => String::new(),
    };
    let payload = match obj.get("2") {
        Some(v) => value::as_bytes(v)?,
        None => Vec::new(),
    };
    if url.is_empty() {
        if payload.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        return Err(Error::type_mismatch("Any carries a value without a type URL"));
    }

    let type_name = type_name_of_url(&url);
    let target = printer
        .index
        .message(type_name)
        .ok_or_else(|| Error::unknown_type(type_name))?;
    let doc = codec::decode(printer.index, target, &payload, &DecodeOptions::default())?;
    let printed = printer.message(target, &doc, depth + 1)?;

    let mut out = Map::new();
    out.insert("@type".to_string(), Value::String(url));
    if WellKnownType::from_full_name(&target.full_name).is_some() {
        out.insert("value".to_string(), printed);
    } else if let Value::Object(fields) = printed {
        out.extend(fields);
    }
    Ok(Value::Object(out))
}

fn parse_any(parser: &Parser<'_>, json: &Value, depth: usize) -> Result<Value> {
    let obj = json
        .as_object()
        .ok_or_else(|| Error::type_mismatch(format!("Any expects an object, got {json}")))?;
    if obj.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let url = obj
        .get("@type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::type_mismatch("Any is missing \"@type\""))?;
    let type_name = type_name_of_url(url);
    let target = parser
        .index
        .message(type_name)
        .ok_or_else(|| Error::unknown_type(type_name))?;

    let doc = if WellKnownType::from_full_name(&target.full_name).is_some() {
        let inner = obj.get("value").unwrap_or(&Value::Null);
        parser.message(target, inner, depth + 1)?
    } else {
        let rest: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "@type")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        parser.message(target, &Value::Object(rest), depth + 1)?
    };
    let bytes = codec::encode(parser.index, target, &doc)?;

    let mut out = Map::new();
    out.insert("1".to_string(), Value::String(url.to_string()));
    if !bytes.is_empty() {
        out.insert("2".to_string(), Value::String(value::encode_base64(&bytes)));
    }
    Ok(Value::Object(out))
}
