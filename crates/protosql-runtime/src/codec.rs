//! NumberJSON ⇄ wire bytes, driven by a message descriptor.

use std::collections::BTreeMap;

use protosql_descriptor::{DescriptorIndex, FieldDescriptor, FieldKind, MessageDescriptor};
use protosql_wire::varint::{write_length_delimited, write_tag};
use protosql_wire::{RawValue, WireMessage, WireRecord, WireType};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::value;

/// Deepest message nesting either direction accepts.
pub const MAX_DEPTH: usize = 100;

/// Sidecar key holding unknown wire fields in WireJSON shape.
pub const UNKNOWN_FIELDS_KEY: &str = "_u";

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Keep unrecognized field numbers under [`UNKNOWN_FIELDS_KEY`] instead
    /// of dropping them.
    pub keep_unknown: bool,
}

impl DecodeOptions {
    pub fn round_trip() -> Self {
        Self { keep_unknown: true }
    }
}

pub fn encode(index: &DescriptorIndex, message: &MessageDescriptor, doc: &Value) -> Result<Vec<u8>> {
    Encoder { index }.message(message, doc, 0)
}

pub fn decode(
    index: &DescriptorIndex,
    message: &MessageDescriptor,
    bytes: &[u8],
    options: &DecodeOptions,
) -> Result<Value> {
    Decoder { index, options }.message(message, bytes, 0)
}

/// Parses a NumberJSON object key.
pub fn field_key(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

pub(crate) fn message_type<'i>(
    index: &'i DescriptorIndex,
    field: &FieldDescriptor,
) -> Result<&'i MessageDescriptor> {
    index
        .message_type_of(field)
        .ok_or_else(|| Error::unknown_type(field.type_name.as_deref().unwrap_or(&field.name)))
}

// =============================================================================
// Encode
// =============================================================================

struct Encoder<'a> {
    index: &'a DescriptorIndex,
}

impl Encoder<'_> {
    fn message(&self, message: &MessageDescriptor, doc: &Value, depth: usize) -> Result<Vec<u8>> {
        if depth > MAX_DEPTH {
            return Err(Error::malformed_json(format!(
                "{}: nesting deeper than {MAX_DEPTH}",
                message.full_name
            )));
        }
        let Value::Object(obj) = doc else {
            return Err(Error::type_mismatch(format!(
                "{}: expected a NumberJSON object, got {doc}",
                message.full_name
            )));
        };

        let mut chunks: Vec<(u32, Vec<u8>)> = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if key == UNKNOWN_FIELDS_KEY {
                chunks.extend(unknown_chunks(value)?);
                continue;
            }
            let number = field_key(key).ok_or_else(|| {
                Error::malformed_json(format!("{}: key `{key}` is not a field number", message.full_name))
            })?;
            let field = message.field(number).ok_or_else(|| {
                Error::new(
                    ErrorKind::UnknownField,
                    format!("{} has no field {number}", message.full_name),
                )
            })?;
            if value.is_null() {
                continue;
            }
            let mut buf = Vec::new();
            self.field(field, value, &mut buf, depth)
                .map_err(|e| e.at(format_args!("{}.{}", message.full_name, field.name)))?;
            chunks.push((number, buf));
        }
        chunks.sort_by_key(|(number, _)| *number);
        Ok(chunks.into_iter().flat_map(|(_, bytes)| bytes).collect())
    }

    fn field(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        buf: &mut Vec<u8>,
        depth: usize,
    ) -> Result<()> {
        if !field.is_repeated() {
            return self.single(field, value, buf, depth);
        }
        let Value::Array(items) = value else {
            return Err(Error::type_mismatch(format!(
                "repeated field expects an array, got {value}"
            )));
        };
        if items.is_empty() {
            return Ok(());
        }
        if field.packed && field.kind.is_packable() {
            let mut payload = Vec::new();
            for item in items {
                value::to_raw(field.kind, item)?.write_payload(&mut payload);
            }
            write_tag(field.number, WireType::LengthDelimited, buf);
            write_length_delimited(&payload, buf);
            return Ok(());
        }
        for item in items {
            self.single(field, item, buf, depth)?;
        }
        Ok(())
    }

    fn single(
        &self,
        field: &FieldDescriptor,
        value: &Value,
        buf: &mut Vec<u8>,
        depth: usize,
    ) -> Result<()> {
        if field.kind == FieldKind::Message {
            let target = message_type(self.index, field)?;
            let payload = self.message(target, value, depth + 1)?;
            write_tag(field.number, WireType::LengthDelimited, buf);
            write_length_delimited(&payload, buf);
        } else {
            value::to_raw(field.kind, value)?.write_record(field.number, buf);
        }
        Ok(())
    }
}

/// Re-encodes sidecar records, one chunk per field so they merge into the
/// field-number ordering.
fn unknown_chunks(value: &Value) -> Result<Vec<(u32, Vec<u8>)>> {
    let wire = WireMessage::from_json(value)?;
    let numbers = wire.field_numbers();
    let records = wire.into_records();
    Ok(numbers
        .into_iter()
        .map(|number| {
            let field: Vec<WireRecord> = records
                .iter()
                .filter(|r| r.field_number == number)
                .cloned()
                .collect();
            (number, WireMessage::from_records(field).encode())
        })
        .collect())
}

// =============================================================================
// Decode
// =============================================================================

enum Slot {
    Scalar(Value),
    /// Concatenated payloads of a singular message; decoding the
    /// concatenation is protobuf merge.
    Message(Vec<u8>),
    Repeated(Vec<Value>),
}

struct Decoder<'a> {
    index: &'a DescriptorIndex,
    options: &'a DecodeOptions,
}

impl Decoder<'_> {
    fn message(&self, message: &MessageDescriptor, bytes: &[u8], depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(Error::malformed_wire(format!(
                "{}: nesting deeper than {MAX_DEPTH}",
                message.full_name
            )));
        }
        let wire = WireMessage::scan_with(bytes, message)?;

        let mut slots: BTreeMap<u32, Slot> = BTreeMap::new();
        let mut unknown: Vec<WireRecord> = Vec::new();
        for record in wire.into_records() {
            let Some(field) = message.field(record.field_number) else {
                if self.options.keep_unknown {
                    unknown.push(record);
                }
                continue;
            };
            for sibling in message.oneof_siblings(field) {
                slots.remove(&sibling);
            }
            self.record(field, record.value, &mut slots, depth)
                .map_err(|e| e.at(format_args!("{}.{}", message.full_name, field.name)))?;
        }

        let mut out = Map::new();
        for (number, slot) in slots {
            let value = match slot {
                Slot::Scalar(v) => v,
                Slot::Repeated(items) => Value::Array(items),
                Slot::Message(payload) => {
                    let field = message
                        .field(number)
                        .ok_or_else(|| Error::mismatch(format!("field {number} vanished")))?;
                    let target = message_type(self.index, field)?;
                    self.message(target, &payload, depth + 1)?
                }
            };
            out.insert(number.to_string(), value);
        }
        if !unknown.is_empty() {
            let mut sidecar = WireMessage::from_records(unknown);
            sidecar.reindex();
            out.insert(UNKNOWN_FIELDS_KEY.to_string(), sidecar.to_json());
        }
        Ok(Value::Object(out))
    }

    fn record(
        &self,
        field: &FieldDescriptor,
        raw: RawValue,
        slots: &mut BTreeMap<u32, Slot>,
        depth: usize,
    ) -> Result<()> {
        if field.kind != FieldKind::Message {
            let v = value::from_raw(field.kind, &raw)?;
            if field.is_repeated() {
                push(slots, field.number, v);
            } else {
                slots.insert(field.number, Slot::Scalar(v));
            }
            return Ok(());
        }

        let RawValue::Bytes(payload) = raw else {
            return Err(Error::mismatch(format!(
                "message expects wire type 2, found {}",
                raw.wire_type().as_u8()
            )));
        };
        let target = message_type(self.index, field)?;
        if field.is_map() {
            let entry = self.message(target, &payload, depth + 1)?;
            let key_kind = target.field(1).map_or(FieldKind::String, |f| f.kind);
            put_map_entry(slots, field.number, entry, key_kind);
        } else if field.is_repeated() {
            let v = self.message(target, &payload, depth + 1)?;
            push(slots, field.number, v);
        } else {
            match slots.get_mut(&field.number) {
                Some(Slot::Message(existing)) => existing.extend_from_slice(&payload),
                _ => {
                    slots.insert(field.number, Slot::Message(payload));
                }
            }
        }
        Ok(())
    }
}

fn push(slots: &mut BTreeMap<u32, Slot>, number: u32, v: Value) {
    match slots.get_mut(&number) {
        Some(Slot::Repeated(items)) => items.push(v),
        _ => {
            slots.insert(number, Slot::Repeated(vec![v]));
        }
    }
}

/// Appends a map entry, replacing an earlier entry with the same key.
fn put_map_entry(slots: &mut BTreeMap<u32, Slot>, number: u32, entry: Value, key_kind: FieldKind) {
    let key_of = |e: &Value| e.get("1").cloned().unwrap_or_else(|| value::zero(key_kind));
    let key = key_of(&entry);
    match slots.get_mut(&number) {
        Some(Slot::Repeated(items)) => match items.iter().position(|e| key_of(e) == key) {
            Some(at) => items[at] = entry,
            None => items.push(entry),
        },
        _ => {
            slots.insert(number, Slot::Repeated(vec![entry]));
        }
    }
}
