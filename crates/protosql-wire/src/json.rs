//! WireJSON: the lossless JSON rendering of a [`WireMessage`].
//!
//! ```json
//! { "1": [ {"i": 0, "t": 0, "v": 150} ],
//!   "2": [ {"i": 1, "t": 2, "v": "74657374"} ] }
//! ```
//!
//! Keys are field numbers in order of first appearance. `v` is a JSON number
//! for varints up to `2^53 - 1` and a hex string otherwise (payload bytes for
//! length-delimited and fixed records, the 16 big-endian hex digits of the
//! value for large varints). Elements expanded from a packed payload carry
//! `"p": true`.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{Result, WireError};
use crate::record::{RawValue, WireMessage, WireRecord};
use crate::varint::{WireType, MAX_FIELD_NUMBER, MIN_FIELD_NUMBER};

/// Largest integer a JSON double represents exactly.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

impl WireMessage {
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for record in self.records() {
            let entry = out
                .entry(record.field_number.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                items.push(record_to_json(record));
            }
        }
        Value::Object(out)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(invalid("expected a JSON object"));
        };
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for (key, items) in fields {
            let field_number = parse_field_key(key)?;
            let Value::Array(items) = items else {
                return Err(invalid(format!("field {key}: expected an array of records")));
            };
            if items.is_empty() {
                return Err(invalid(format!("field {key}: record array is empty")));
            }
            let mut last: Option<u32> = None;
            for item in items {
                let record = record_from_json(field_number, item)?;
                if let Some(prev) = last.filter(|&prev| record.index <= prev) {
                    return Err(invalid(format!(
                        "field {key}: record indices must increase, found {} after {prev}",
                        record.index
                    )));
                }
                if !seen.insert(record.index) {
                    return Err(invalid(format!(
                        "field {key}: record index {} is already used",
                        record.index
                    )));
                }
                last = Some(record.index);
                records.push(record);
            }
        }
        Ok(WireMessage::from_records(records))
    }
}

fn record_to_json(record: &WireRecord) -> Value {
    let mut obj = Map::new();
    obj.insert("i".to_string(), Value::from(record.index));
    obj.insert("t".to_string(), Value::from(record.wire_type().as_u8()));
    let v = match &record.value {
        RawValue::Varint(v) if *v <= MAX_SAFE_INTEGER => Value::from(*v),
        RawValue::Varint(v) => Value::String(format!("{v:016x}")),
        RawValue::Fixed64(v) => Value::String(hex::encode(v.to_le_bytes())),
        RawValue::Fixed32(v) => Value::String(hex::encode(v.to_le_bytes())),
        RawValue::Bytes(b) => Value::String(hex::encode(b)),
    };
    obj.insert("v".to_string(), v);
    if record.packed {
        obj.insert("p".to_string(), Value::Bool(true));
    }
    Value::Object(obj)
}

fn record_from_json(field_number: u32, item: &Value) -> Result<WireRecord> {
    let Value::Object(obj) = item else {
        return Err(invalid(format!("field {field_number}: record is not an object")));
    };
    let index = obj
        .get("i")
        .and_then(Value::as_u64)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| invalid(format!("field {field_number}: missing or invalid \"i\"")))?;
    let bits = obj
        .get("t")
        .and_then(Value::as_u64)
        .and_then(|t| u8::try_from(t).ok())
        .ok_or_else(|| invalid(format!("field {field_number}: missing or invalid \"t\"")))?;
    let wire_type = WireType::from_bits(bits, 0)?;
    let v = obj
        .get("v")
        .ok_or_else(|| invalid(format!("field {field_number}: missing \"v\"")))?;
    let packed = match obj.get("p") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(p)) => *p,
        Some(_) => return Err(invalid(format!("field {field_number}: \"p\" must be a boolean"))),
    };
    if packed && wire_type == WireType::LengthDelimited {
        return Err(invalid(format!(
            "field {field_number}: packed elements cannot be length-delimited"
        )));
    }

    let value = match wire_type {
        WireType::Varint => RawValue::Varint(varint_from_json(field_number, v)?),
        WireType::Fixed64 => {
            let bytes = fixed_bytes::<8>(field_number, v)?;
            RawValue::Fixed64(u64::from_le_bytes(bytes))
        }
        WireType::Fixed32 => {
            let bytes = fixed_bytes::<4>(field_number, v)?;
            RawValue::Fixed32(u32::from_le_bytes(bytes))
        }
        WireType::LengthDelimited => {
            let text = v
                .as_str()
                .ok_or_else(|| invalid(format!("field {field_number}: \"v\" must be hex")))?;
            let bytes = hex::decode(text)
                .map_err(|_| invalid(format!("field {field_number}: \"v\" must be hex")))?;
            RawValue::Bytes(bytes)
        }
    };

    Ok(WireRecord {
        index,
        field_number,
        value,
        packed,
    })
}

fn varint_from_json(field_number: u32, v: &Value) -> Result<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| invalid(format!("field {field_number}: varint must be unsigned"))),
        Value::String(s) if !s.is_empty() && s.len() <= 16 => u64::from_str_radix(s, 16)
            .map_err(|_| invalid(format!("field {field_number}: varint hex is invalid"))),
        _ => Err(invalid(format!(
            "field {field_number}: varint must be a number or hex string"
        ))),
    }
}

fn fixed_bytes<const N: usize>(field_number: u32, v: &Value) -> Result<[u8; N]> {
    let bytes = v
        .as_str()
        .and_then(|text| hex::decode(text).ok())
        .ok_or_else(|| invalid(format!("field {field_number}: \"v\" must be hex")))?;
    bytes.try_into().map_err(|_| {
        invalid(format!(
            "field {field_number}: fixed value must be {N} bytes"
        ))
    })
}

fn parse_field_key(key: &str) -> Result<u32> {
    let number: u32 = key
        .parse()
        .map_err(|_| invalid(format!("key {key:?} is not a field number")))?;
    if !(MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER).contains(&number) {
        return Err(invalid(format!("key {key:?} is out of the field number range")));
    }
    Ok(number)
}

fn invalid(message: impl Into<String>) -> WireError {
    WireError::WireJson(message.into())
}
