//! Record-level view of a wire message.
//!
//! A [`WireMessage`] is the ordered list of `(field_number, wire_type,
//! payload)` records found in a byte string. Nothing is merged at scan time:
//! repeated occurrences of a singular field stay separate records, and
//! last-wins is left to whoever interprets the records against a schema.

use std::collections::HashSet;

use crate::error::{Result, WireError};
use crate::varint::{
    read_fixed32_le, read_fixed64_le, read_length_delimited, read_tag, read_varint,
    write_fixed32_le, write_fixed64_le, write_length_delimited, write_tag, write_varint, WireType,
};

/// Raw payload of one record, before any schema interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Varint(u64),
    Fixed64(u64),
    Fixed32(u32),
    Bytes(Vec<u8>),
}

impl RawValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            RawValue::Varint(_) => WireType::Varint,
            RawValue::Fixed64(_) => WireType::Fixed64,
            RawValue::Fixed32(_) => WireType::Fixed32,
            RawValue::Bytes(_) => WireType::LengthDelimited,
        }
    }

    /// Appends the payload (length-prefixed for `Bytes`) without a tag.
    pub fn write_payload(&self, buf: &mut Vec<u8>) {
        match self {
            RawValue::Varint(v) => write_varint(*v, buf),
            RawValue::Fixed64(v) => write_fixed64_le(*v, buf),
            RawValue::Fixed32(v) => write_fixed32_le(*v, buf),
            RawValue::Bytes(b) => write_length_delimited(b, buf),
        }
    }

    /// Appends tag + payload.
    pub fn write_record(&self, field_number: u32, buf: &mut Vec<u8>) {
        write_tag(field_number, self.wire_type(), buf);
        self.write_payload(buf);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
    /// Position of the record within its message (0-based, per message).
    pub index: u32,
    pub field_number: u32,
    pub value: RawValue,
    /// Set on elements that were expanded from a packed payload.
    pub packed: bool,
}

impl WireRecord {
    pub fn wire_type(&self) -> WireType {
        self.value.wire_type()
    }
}

/// Tells the scanner which fields carry packed scalars, and of which element
/// wire type. Without a layout every length-delimited record stays opaque.
pub trait PackedLayout {
    fn packed_element_type(&self, field_number: u32) -> Option<WireType>;
}

/// Layout for scans without a schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl PackedLayout for NoLayout {
    fn packed_element_type(&self, _field_number: u32) -> Option<WireType> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireMessage {
    records: Vec<WireRecord>,
}

impl WireMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(bytes: &[u8]) -> Result<Self> {
        Self::scan_with(bytes, &NoLayout)
    }

    pub fn scan_with(bytes: &[u8], layout: &dyn PackedLayout) -> Result<Self> {
        let mut records = Vec::new();
        let mut index: u32 = 0;
        let mut pos = 0;
        while pos < bytes.len() {
            let (field_number, wire_type, next) = read_tag(bytes, pos)?;
            let (value, next) = read_value(bytes, next, wire_type)?;
            pos = next;

            match (&value, layout.packed_element_type(field_number)) {
                (RawValue::Bytes(payload), Some(element)) => {
                    for element in unpack(payload, element, field_number)? {
                        records.push(WireRecord {
                            index,
                            field_number,
                            value: element,
                            packed: true,
                        });
                        index += 1;
                    }
                }
                _ => {
                    records.push(WireRecord {
                        index,
                        field_number,
                        value,
                        packed: false,
                    });
                    index += 1;
                }
            }
        }
        Ok(Self { records })
    }

    /// Builds a message from records in any order; they are sorted by index.
    pub fn from_records(mut records: Vec<WireRecord>) -> Self {
        records.sort_by_key(|r| r.index);
        Self { records }
    }

    pub fn records(&self) -> &[WireRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<WireRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn field(&self, field_number: u32) -> impl Iterator<Item = &WireRecord> + '_ {
        self.records
            .iter()
            .filter(move |r| r.field_number == field_number)
    }

    pub fn has_field(&self, field_number: u32) -> bool {
        self.records.iter().any(|r| r.field_number == field_number)
    }

    /// Field numbers in order of first appearance.
    pub fn field_numbers(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.field_number))
            .map(|r| r.field_number)
            .collect()
    }

    pub fn push(&mut self, field_number: u32, value: RawValue, packed: bool) {
        let index = self.records.last().map_or(0, |r| r.index + 1);
        self.records.push(WireRecord {
            index,
            field_number,
            value,
            packed,
        });
    }

    /// Replaces every record of `field_number` with `values`, placed where
    /// the first existing record was (or appended). Indices are renumbered.
    pub fn replace_field(&mut self, field_number: u32, values: Vec<RawValue>, packed: bool) {
        let at = self
            .records
            .iter()
            .position(|r| r.field_number == field_number)
            .unwrap_or(self.records.len());
        self.records.retain(|r| r.field_number != field_number);
        let at = at.min(self.records.len());
        let inserted = values.into_iter().map(|value| WireRecord {
            index: 0,
            field_number,
            value,
            packed,
        });
        self.records.splice(at..at, inserted);
        self.reindex();
    }

    /// Drops every record of `field_number`. Returns whether any existed.
    pub fn remove_field(&mut self, field_number: u32) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.field_number != field_number);
        let removed = self.records.len() != before;
        if removed {
            self.reindex();
        }
        removed
    }

    pub fn reindex(&mut self) {
        for (i, record) in self.records.iter_mut().enumerate() {
            record.index = i as u32;
        }
    }

    /// Serializes back to wire bytes. Packed elements of a field collapse
    /// into one length-delimited record at the first element's position.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut packed_done: HashSet<u32> = HashSet::new();
        for record in &self.records {
            if !record.packed {
                record.value.write_record(record.field_number, &mut buf);
                continue;
            }
            if !packed_done.insert(record.field_number) {
                continue;
            }
            let mut payload = Vec::new();
            for element in self.field(record.field_number).filter(|r| r.packed) {
                element.value.write_payload(&mut payload);
            }
            write_tag(record.field_number, WireType::LengthDelimited, &mut buf);
            write_length_delimited(&payload, &mut buf);
        }
        buf
    }
}

fn read_value(bytes: &[u8], offset: usize, wire_type: WireType) -> Result<(RawValue, usize)> {
    Ok(match wire_type {
        WireType::Varint => {
            let (v, next) = read_varint(bytes, offset)?;
            (RawValue::Varint(v), next)
        }
        WireType::Fixed64 => {
            let (v, next) = read_fixed64_le(bytes, offset)?;
            (RawValue::Fixed64(v), next)
        }
        WireType::Fixed32 => {
            let (v, next) = read_fixed32_le(bytes, offset)?;
            (RawValue::Fixed32(v), next)
        }
        WireType::LengthDelimited => {
            let (payload, next) = read_length_delimited(bytes, offset)?;
            (RawValue::Bytes(payload.to_vec()), next)
        }
    })
}

/// Splits a packed payload into its scalar elements.
pub fn unpack(payload: &[u8], element: WireType, field_number: u32) -> Result<Vec<RawValue>> {
    let width = match element {
        WireType::Varint => 0,
        WireType::Fixed32 => 4,
        WireType::Fixed64 => 8,
        WireType::LengthDelimited => {
            return Err(WireError::Packed {
                field_number,
                reason: "length-delimited values cannot be packed".to_string(),
            })
        }
    };
    if width != 0 && payload.len() % width != 0 {
        return Err(WireError::Packed {
            field_number,
            reason: format!(
                "payload of {} bytes is not a multiple of {width}",
                payload.len()
            ),
        });
    }

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (value, next) = read_value(payload, pos, element)?;
        out.push(value);
        pos = next;
    }
    Ok(out)
}
