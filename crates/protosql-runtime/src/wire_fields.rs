//! Field routines over record-level messages (WireJSON documents and raw
//! message bytes).
//!
//! A field's records are lifted into a one-key NumberJSON document, the
//! NumberJSON routine runs on it, and the result is spliced back in place of
//! the original records. Message-kind fields travel as raw bytes (base64 in
//! the lifted document); reading a singular message concatenates every
//! record, which is protobuf merge.

use protosql_descriptor::FieldKind;
use protosql_wire::{unpack, RawValue, WireMessage};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::value;

/// A field addressed by number and kind, without a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireField {
    pub number: u32,
    pub kind: FieldKind,
    pub repeated: bool,
}

impl WireField {
    pub fn singular(number: u32, kind: FieldKind) -> Self {
        Self {
            number,
            kind,
            repeated: false,
        }
    }

    pub fn repeated(number: u32, kind: FieldKind) -> Self {
        Self {
            number,
            kind,
            repeated: true,
        }
    }

    /// Kind of the lifted value: messages are carried as bytes.
    pub fn storage_kind(&self) -> FieldKind {
        match self.kind {
            FieldKind::Message => FieldKind::Bytes,
            kind => kind,
        }
    }

    fn key(&self) -> String {
        self.number.to_string()
    }

    /// Lifts the field's records into `{"<number>": value}` (or `{}`).
    pub fn lift(&self, msg: &WireMessage) -> Result<Value> {
        let mut doc = Map::new();
        if let Some(v) = self.read(msg)? {
            doc.insert(self.key(), v);
        }
        Ok(Value::Object(doc))
    }

    fn read(&self, msg: &WireMessage) -> Result<Option<Value>> {
        let records: Vec<&RawValue> = msg.field(self.number).map(|r| &r.value).collect();
        if records.is_empty() {
            return Ok(None);
        }
        let storage = self.storage_kind();
        let at = |e: Error| e.at(format_args!("field {}", self.number));

        if self.repeated {
            let mut items = Vec::new();
            for raw in records {
                match raw {
                    RawValue::Bytes(payload) if self.kind.is_packable() => {
                        for element in unpack(payload, self.kind.wire_type(), self.number)? {
                            items.push(value::from_raw(storage, &element).map_err(at)?);
                        }
                    }
                    _ => items.push(value::from_raw(storage, raw).map_err(at)?),
                }
            }
            return Ok(Some(Value::Array(items)));
        }

        if self.kind == FieldKind::Message {
            let mut merged = Vec::new();
            for raw in records {
                let RawValue::Bytes(payload) = raw else {
                    return Err(at(Error::mismatch(format!(
                        "message expects wire type 2, found {}",
                        raw.wire_type().as_u8()
                    ))));
                };
                merged.extend_from_slice(payload);
            }
            return Ok(Some(Value::String(value::encode_base64(&merged))));
        }

        let last = records[records.len() - 1];
        value::from_raw(storage, last).map(Some).map_err(at)
    }

    /// Whether rewritten elements should be packed: keep what the existing
    /// records do, pack new packable fields.
    fn packs(&self, msg: &WireMessage) -> bool {
        if !self.repeated || !self.kind.is_packable() {
            return false;
        }
        let mut records = msg.field(self.number).peekable();
        if records.peek().is_none() {
            return true;
        }
        records.any(|r| r.packed || matches!(r.value, RawValue::Bytes(_)))
    }

    /// Writes the lifted document back into `msg`.
    pub fn lower(&self, mut msg: WireMessage, doc: &Value) -> Result<WireMessage> {
        let stored = doc.get(self.key()).filter(|v| !v.is_null());
        let Some(stored) = stored else {
            msg.remove_field(self.number);
            return Ok(msg);
        };

        let storage = self.storage_kind();
        let values: Vec<&Value> = if self.repeated {
            stored
                .as_array()
                .ok_or_else(|| Error::type_mismatch("repeated field expects an array"))?
                .iter()
                .collect()
        } else {
            vec![stored]
        };
        let raws = values
            .into_iter()
            .map(|v| value::to_raw(storage, v))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.at(format_args!("field {}", self.number)))?;
        let packed = self.packs(&msg);
        msg.replace_field(self.number, raws, packed);
        Ok(msg)
    }
}

/// Runs a read-only NumberJSON routine against one field of `msg`.
pub fn read<T>(
    msg: &WireMessage,
    field: WireField,
    f: impl FnOnce(&Value) -> Result<T>,
) -> Result<T> {
    f(&field.lift(msg)?)
}

/// Runs a mutating NumberJSON routine against one field of `msg`.
pub fn update(
    msg: WireMessage,
    field: WireField,
    f: impl FnOnce(Value) -> Result<Value>,
) -> Result<WireMessage> {
    let doc = f(field.lift(&msg)?)?;
    field.lower(msg, &doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use serde_json::json;

    #[test]
    fn singular_reads_take_the_last_record() {
        let mut msg = WireMessage::new();
        msg.push(1, RawValue::Varint(5), false);
        msg.push(1, RawValue::Varint(7), false);
        let field = WireField::singular(1, FieldKind::Int32);
        let v = read(&msg, field, |doc| fields::get(doc, 1, FieldKind::Int32)).unwrap();
        assert_eq!(v, json!(7));
    }

    #[test]
    fn packed_fields_stay_packed() {
        let msg = WireMessage::scan(&[0x22, 0x02, 0x01, 0x02]).unwrap();
        let field = WireField::repeated(4, FieldKind::Int32);
        let msg = update(msg, field, |doc| fields::add(doc, 4, FieldKind::Int32, &json!(3))).unwrap();
        assert_eq!(msg.encode(), vec![0x22, 0x03, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn unpacked_fields_stay_unpacked() {
        let msg = WireMessage::scan(&[0x20, 0x01]).unwrap();
        let field = WireField::repeated(4, FieldKind::Int32);
        let msg = update(msg, field, |doc| fields::add(doc, 4, FieldKind::Int32, &json!(2))).unwrap();
        assert_eq!(msg.encode(), vec![0x20, 0x01, 0x20, 0x02]);
    }

    #[test]
    fn message_records_merge_as_bytes() {
        let mut msg = WireMessage::new();
        msg.push(3, RawValue::Bytes(vec![0x08, 0x01]), false);
        msg.push(3, RawValue::Bytes(vec![0x10, 0x02]), false);
        let field = WireField::singular(3, FieldKind::Message);
        let v = read(&msg, field, |doc| fields::get(doc, 3, field.storage_kind())).unwrap();
        assert_eq!(v, json!(value::encode_base64(&[0x08, 0x01, 0x10, 0x02])));
    }

    #[test]
    fn clearing_removes_every_record() {
        let mut msg = WireMessage::new();
        msg.push(1, RawValue::Varint(1), false);
        msg.push(2, RawValue::Varint(2), false);
        msg.push(1, RawValue::Varint(3), false);
        let field = WireField::singular(1, FieldKind::Int32);
        let msg = update(msg, field, |doc| fields::clear(doc, 1)).unwrap();
        assert_eq!(msg.encode(), vec![0x10, 0x02]);
    }
}
