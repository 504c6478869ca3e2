//! Byte-level codec for the protobuf wire format.
//!
//! Every reader takes the full buffer plus an offset and returns the decoded
//! value together with the offset just past it, so callers can walk a message
//! without slicing. Writers append to a `Vec<u8>`.

use crate::error::{Result, WireError};

/// Longest legal varint encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number (`2^29 - 1`).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The four wire types proto3 uses. Groups (3 and 4) are rejected at the
/// byte level and never reach this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Interprets the low three bits of a tag. `offset` only feeds the error.
    pub fn from_bits(bits: u8, offset: usize) -> Result<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            3 | 4 => Err(WireError::Group {
                offset,
                wire_type: bits,
            }),
            other => Err(WireError::InvalidWireType {
                offset,
                wire_type: other,
            }),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// Varint
// =============================================================================

/// Reads a base-128 varint. Non-minimal encodings are accepted; bits beyond
/// the 64th are discarded.
pub fn read_varint(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut pos = offset;
    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = bytes.get(pos) else {
            return Err(WireError::Truncated {
                offset: pos,
                needed: 1,
            });
        };
        pos += 1;
        let shift = 7 * i as u32;
        if shift < 64 {
            value |= u64::from(byte & 0x7f) << shift;
        }
        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
    }
    Err(WireError::VarintTooLong { offset })
}

pub fn write_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(varint_len(value));
    write_varint(value, &mut buf);
    buf
}

/// Number of bytes the minimal encoding of `value` occupies.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

// =============================================================================
// ZigZag
// =============================================================================

pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

// =============================================================================
// Fixed width (little-endian)
// =============================================================================

pub fn read_fixed32_le(bytes: &[u8], offset: usize) -> Result<(u32, usize)> {
    let raw = take(bytes, offset, 4)?;
    let mut arr = [0u8; 4];
    arr.copy_from_slice(raw);
    Ok((u32::from_le_bytes(arr), offset + 4))
}

pub fn read_fixed64_le(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let raw = take(bytes, offset, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(raw);
    Ok((u64::from_le_bytes(arr), offset + 8))
}

pub fn write_fixed32_le(value: u32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_fixed64_le(value: u64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_le_bytes());
}

// =============================================================================
// Length-delimited
// =============================================================================

/// Reads a length prefix and returns the payload slice it frames.
pub fn read_length_delimited(bytes: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let (len, start) = read_varint(bytes, offset)?;
    let len = usize::try_from(len).map_err(|_| WireError::Truncated {
        offset: start,
        needed: usize::MAX,
    })?;
    let payload = take(bytes, start, len)?;
    Ok((payload, start + len))
}

pub fn write_length_delimited(payload: &[u8], buf: &mut Vec<u8>) {
    write_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

// =============================================================================
// Tags
// =============================================================================

/// Reads a record tag and validates both halves.
pub fn read_tag(bytes: &[u8], offset: usize) -> Result<(u32, WireType, usize)> {
    let (key, next) = read_varint(bytes, offset)?;
    let wire_type = WireType::from_bits((key & 0x7) as u8, offset)?;
    let field_number = key >> 3;
    if field_number < u64::from(MIN_FIELD_NUMBER) || field_number > u64::from(MAX_FIELD_NUMBER) {
        return Err(WireError::InvalidFieldNumber {
            offset,
            field_number,
        });
    }
    Ok((field_number as u32, wire_type, next))
}

pub fn write_tag(field_number: u32, wire_type: WireType, buf: &mut Vec<u8>) {
    write_varint((u64::from(field_number) << 3) | u64::from(wire_type.as_u8()), buf);
}

fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset.checked_add(len);
    match end {
        Some(end) if end <= bytes.len() => Ok(&bytes[offset..end]),
        _ => Err(WireError::Truncated {
            offset,
            needed: len.saturating_sub(bytes.len().saturating_sub(offset)),
        }),
    }
}
