//! Per-kind scalar handling shared by every codec and routine.
//!
//! A NumberJSON scalar is validated and canonicalized by [`normalize`],
//! turned into a wire payload by [`to_raw`] and read back by [`from_raw`].

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use protosql_descriptor::{DescriptorIndex, EnumDescriptor, FieldDescriptor, FieldKind};
use protosql_wire::varint::{zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64};
use protosql_wire::RawValue;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::float;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decodes standard or URL-safe base64, padded or not.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let engine = if text.contains(['-', '_']) {
        &URL_SAFE_LENIENT
    } else {
        &STANDARD_LENIENT
    };
    engine
        .decode(text.trim_end_matches('='))
        .map_err(|e| Error::type_mismatch(format!("invalid base64: {e}")))
}

/// Padded standard base64, the stored form of `bytes`.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Zero value of `kind` in NumberJSON form.
pub fn zero(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Float => Value::String(float::tag_f32(0.0)),
        FieldKind::Double => Value::String(float::tag_f64(0.0)),
        FieldKind::Bool => Value::Bool(false),
        FieldKind::String | FieldKind::Bytes => Value::String(String::new()),
        FieldKind::Message => Value::Object(Map::new()),
        _ => Value::from(0),
    }
}

/// Declared default of `field`: the proto2 `default_value` when present,
/// the first enum value for enums, otherwise the kind's zero.
pub fn field_default(index: &DescriptorIndex, field: &FieldDescriptor) -> Result<Value> {
    let enum_type = index.enum_type_of(field);
    if let Some(text) = &field.default_value {
        return parse_default(field.kind, text, enum_type)
            .map_err(|e| e.at(format_args!("default of {}", field.name)));
    }
    Ok(match enum_type {
        Some(e) => Value::from(e.default_number()),
        None => zero(field.kind),
    })
}

// =============================================================================
// Integers
// =============================================================================

/// Reads any JSON spelling of an integer (number, integral float, decimal
/// string) without range checks.
fn integer(value: &Value) -> Result<i128> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i128::from(i));
            }
            if let Some(u) = n.as_u64() {
                return Ok(i128::from(u));
            }
            let f = n.as_f64().unwrap_or(f64::NAN);
            if f.fract() == 0.0 && f.abs() < 1.9e19 {
                return Ok(f as i128);
            }
            Err(Error::type_mismatch(format!("{n} is not an integer")))
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i128>() {
                return Ok(i);
            }
            match s.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.abs() < 1.9e19 => Ok(f as i128),
                _ => Err(Error::type_mismatch(format!("`{s}` is not an integer"))),
            }
        }
        other => Err(Error::type_mismatch(format!(
            "expected an integer, got {other}"
        ))),
    }
}

fn bounded<T: TryFrom<i128>>(value: &Value, kind: FieldKind) -> Result<T> {
    let i = integer(value)?;
    T::try_from(i).map_err(|_| Error::range(format!("{i} is out of range for {kind}")))
}

pub fn as_i32(kind: FieldKind, value: &Value) -> Result<i32> {
    bounded(value, kind)
}

pub fn as_u32(kind: FieldKind, value: &Value) -> Result<u32> {
    bounded(value, kind)
}

pub fn as_i64(kind: FieldKind, value: &Value) -> Result<i64> {
    bounded(value, kind)
}

pub fn as_u64(kind: FieldKind, value: &Value) -> Result<u64> {
    bounded(value, kind)
}

pub fn as_bool(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::type_mismatch(format!("expected a boolean, got {value}")))
}

pub fn as_str(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| Error::type_mismatch(format!("expected a string, got {value}")))
}

pub fn as_bytes(value: &Value) -> Result<Vec<u8>> {
    decode_base64(as_str(value)?)
}

// =============================================================================
// Normalization
// =============================================================================

/// Validates `value` against `kind` and returns its canonical NumberJSON
/// form (range-checked integers, tagged floats, padded base64).
pub fn normalize(kind: FieldKind, value: &Value) -> Result<Value> {
    Ok(match kind {
        FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32 | FieldKind::Enum => {
            Value::from(as_i32(kind, value)?)
        }
        FieldKind::UInt32 | FieldKind::Fixed32 => Value::from(as_u32(kind, value)?),
        FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64 => {
            Value::from(as_i64(kind, value)?)
        }
        FieldKind::UInt64 | FieldKind::Fixed64 => Value::from(as_u64(kind, value)?),
        FieldKind::Float => Value::String(float::tag_f32(float::read_f32(value)?)),
        FieldKind::Double => Value::String(float::tag_f64(float::read_f64(value)?)),
        FieldKind::Bool => Value::Bool(as_bool(value)?),
        FieldKind::String => Value::String(as_str(value)?.to_string()),
        FieldKind::Bytes => Value::String(encode_base64(&as_bytes(value)?)),
        FieldKind::Message => match value {
            Value::Object(_) => value.clone(),
            other => {
                return Err(Error::type_mismatch(format!(
                    "expected a message object, got {other}"
                )))
            }
        },
    })
}

// =============================================================================
// Wire payloads
// =============================================================================

/// Encodes a scalar NumberJSON value as the payload of one record.
pub fn to_raw(kind: FieldKind, value: &Value) -> Result<RawValue> {
    Ok(match kind {
        FieldKind::Int32 | FieldKind::Enum => {
            RawValue::Varint(i64::from(as_i32(kind, value)?) as u64)
        }
        FieldKind::Int64 => RawValue::Varint(as_i64(kind, value)? as u64),
        FieldKind::UInt32 => RawValue::Varint(u64::from(as_u32(kind, value)?)),
        FieldKind::UInt64 => RawValue::Varint(as_u64(kind, value)?),
        FieldKind::SInt32 => RawValue::Varint(u64::from(zigzag_encode32(as_i32(kind, value)?))),
        FieldKind::SInt64 => RawValue::Varint(zigzag_encode64(as_i64(kind, value)?)),
        FieldKind::Bool => RawValue::Varint(u64::from(as_bool(value)?)),
        FieldKind::Fixed32 => RawValue::Fixed32(as_u32(kind, value)?),
        FieldKind::SFixed32 => RawValue::Fixed32(as_i32(kind, value)? as u32),
        FieldKind::Fixed64 => RawValue::Fixed64(as_u64(kind, value)?),
        FieldKind::SFixed64 => RawValue::Fixed64(as_i64(kind, value)? as u64),
        FieldKind::Float => RawValue::Fixed32(float::read_f32(value)?.to_bits()),
        FieldKind::Double => RawValue::Fixed64(float::read_f64(value)?.to_bits()),
        FieldKind::String => RawValue::Bytes(as_str(value)?.as_bytes().to_vec()),
        FieldKind::Bytes => RawValue::Bytes(as_bytes(value)?),
        FieldKind::Message => {
            return Err(Error::type_mismatch(
                "message values are encoded by the message codec",
            ))
        }
    })
}

/// Decodes one record payload as `kind`.
pub fn from_raw(kind: FieldKind, raw: &RawValue) -> Result<Value> {
    let expected = kind.wire_type();
    if raw.wire_type() != expected || kind == FieldKind::Message {
        return Err(Error::mismatch(format!(
            "{kind} expects wire type {}, found {}",
            expected.as_u8(),
            raw.wire_type().as_u8()
        )));
    }
    Ok(match (kind, raw) {
        (FieldKind::Int32 | FieldKind::Enum, RawValue::Varint(v)) => Value::from(*v as i32),
        (FieldKind::Int64, RawValue::Varint(v)) => Value::from(*v as i64),
        (FieldKind::UInt32, RawValue::Varint(v)) => Value::from(*v as u32),
        (FieldKind::UInt64, RawValue::Varint(v)) => Value::from(*v),
        (FieldKind::SInt32, RawValue::Varint(v)) => Value::from(zigzag_decode32(*v as u32)),
        (FieldKind::SInt64, RawValue::Varint(v)) => Value::from(zigzag_decode64(*v)),
        (FieldKind::Bool, RawValue::Varint(v)) => Value::Bool(*v != 0),
        (FieldKind::Fixed32, RawValue::Fixed32(v)) => Value::from(*v),
        (FieldKind::SFixed32, RawValue::Fixed32(v)) => Value::from(*v as i32),
        (FieldKind::Float, RawValue::Fixed32(v)) => {
            Value::String(float::tag_f32(f32::from_bits(*v)))
        }
        (FieldKind::Fixed64, RawValue::Fixed64(v)) => Value::from(*v),
        (FieldKind::SFixed64, RawValue::Fixed64(v)) => Value::from(*v as i64),
        (FieldKind::Double, RawValue::Fixed64(v)) => {
            Value::String(float::tag_f64(f64::from_bits(*v)))
        }
        (FieldKind::String, RawValue::Bytes(b)) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => return Err(Error::malformed_wire("string field holds invalid UTF-8")),
        },
        (FieldKind::Bytes, RawValue::Bytes(b)) => Value::String(encode_base64(b)),
        _ => return Err(Error::mismatch(format!("cannot read {kind} from {raw:?}"))),
    })
}

// =============================================================================
// proto2 default values
// =============================================================================

/// Parses a descriptor `default_value` into NumberJSON.
pub fn parse_default(
    kind: FieldKind,
    text: &str,
    enum_type: Option<&EnumDescriptor>,
) -> Result<Value> {
    match kind {
        FieldKind::Enum => {
            let e = enum_type.ok_or_else(|| Error::mismatch("enum default without enum type"))?;
            e.number_of(text).map(Value::from).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidEnumName,
                    format!("{text} is not a value of {}", e.full_name),
                )
            })
        }
        FieldKind::Float | FieldKind::Double => {
            let v = match text {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                "nan" => f64::NAN,
                other => other
                    .parse::<f64>()
                    .map_err(|_| Error::type_mismatch(format!("`{other}` is not a number")))?,
            };
            if kind == FieldKind::Float {
                Ok(Value::String(float::tag_f32(v as f32)))
            } else {
                Ok(Value::String(float::tag_f64(v)))
            }
        }
        FieldKind::Bool => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(Error::type_mismatch(format!("`{other}` is not a boolean"))),
        },
        FieldKind::String => Ok(Value::String(text.to_string())),
        FieldKind::Bytes => Ok(Value::String(encode_base64(&unescape_c(text)?))),
        FieldKind::Message => Err(Error::mismatch("message fields have no default_value")),
        _ => normalize(kind, &Value::String(text.to_string())),
    }
}

/// Reverses protoc's C-style escaping of `bytes` defaults.
fn unescape_c(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&esc) = bytes.get(i) else {
            return Err(Error::type_mismatch("dangling escape in bytes default"));
        };
        i += 1;
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'\\' | b'\'' | b'"' | b'?' => out.push(esc),
            b'0'..=b'7' => {
                let mut v = u32::from(esc - b'0');
                for _ in 0..2 {
                    match bytes.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            v = v * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push(v as u8);
            }
            b'x' => {
                let start = i;
                while i < bytes.len() && i - start < 2 && bytes[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let digits = std::str::from_utf8(&bytes[start..i]).unwrap_or_default();
                let v = u8::from_str_radix(digits, 16)
                    .map_err(|_| Error::type_mismatch("bad \\x escape in bytes default"))?;
                out.push(v);
            }
            other => {
                return Err(Error::type_mismatch(format!(
                    "unknown escape \\{} in bytes default",
                    other as char
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_integers_with_range_checks() {
        assert_eq!(normalize(FieldKind::Int32, &json!("42")).unwrap(), json!(42));
        assert_eq!(normalize(FieldKind::UInt64, &json!(3.0)).unwrap(), json!(3));
        assert_eq!(
            normalize(FieldKind::UInt64, &json!(u64::MAX)).unwrap(),
            json!(u64::MAX)
        );
        let err = normalize(FieldKind::Int32, &json!(1u64 << 31)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeError);
        let err = normalize(FieldKind::UInt32, &json!(-1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeError);
        let err = normalize(FieldKind::Int64, &json!(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn normalizes_floats_and_bytes() {
        assert_eq!(
            normalize(FieldKind::Double, &json!(std::f64::consts::PI)).unwrap(),
            json!("binary64:0x400921fb54442d18")
        );
        assert_eq!(
            normalize(FieldKind::Bytes, &json!("aGk")).unwrap(),
            json!("aGk=")
        );
        assert_eq!(
            normalize(FieldKind::Bytes, &json!("-_8")).unwrap(),
            json!("+/8=")
        );
    }

    #[test]
    fn negative_int32_uses_ten_byte_varints() {
        assert_eq!(
            to_raw(FieldKind::Int32, &json!(-1)).unwrap(),
            RawValue::Varint(u64::MAX)
        );
        assert_eq!(
            from_raw(FieldKind::Int32, &RawValue::Varint(u64::MAX)).unwrap(),
            json!(-1)
        );
        assert_eq!(
            to_raw(FieldKind::SInt32, &json!(-1)).unwrap(),
            RawValue::Varint(1)
        );
    }

    #[test]
    fn wire_type_mismatch_is_reported() {
        let err = from_raw(FieldKind::Fixed32, &RawValue::Varint(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DescriptorMismatch);
        let err = from_raw(FieldKind::String, &RawValue::Bytes(vec![0xff])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedWire);
    }

    #[test]
    fn parses_proto2_defaults() {
        assert_eq!(parse_default(FieldKind::Int64, "-7", None).unwrap(), json!(-7));
        assert_eq!(
            parse_default(FieldKind::Float, "inf", None).unwrap(),
            json!("binary32:0x7f800000")
        );
        assert_eq!(
            parse_default(FieldKind::Bytes, "a\\001\\x02\\n", None).unwrap(),
            json!(encode_base64(&[b'a', 1, 2, b'\n']))
        );
        assert_eq!(parse_default(FieldKind::Bool, "true", None).unwrap(), json!(true));
    }
}
