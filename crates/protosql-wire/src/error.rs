use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("truncated input at offset {offset}: needed {needed} more byte(s)")]
    Truncated { offset: usize, needed: usize },

    #[error("varint at offset {offset} is longer than 10 bytes")]
    VarintTooLong { offset: usize },

    #[error("group wire type {wire_type} at offset {offset} is not supported")]
    Group { offset: usize, wire_type: u8 },

    #[error("invalid wire type {wire_type} at offset {offset}")]
    InvalidWireType { offset: usize, wire_type: u8 },

    #[error("invalid field number {field_number} at offset {offset}")]
    InvalidFieldNumber { offset: usize, field_number: u64 },

    #[error("packed field {field_number}: {reason}")]
    Packed { field_number: u32, reason: String },

    #[error("invalid WireJSON: {0}")]
    WireJson(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
