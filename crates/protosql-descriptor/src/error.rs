use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to decode FileDescriptorSet: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to parse descriptor set JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("descriptor set JSON: {0}")]
    JsonShape(String),

    #[error("type {0} is defined more than once")]
    DuplicateType(String),

    #[error("field {field} references unknown type {type_name}")]
    UnresolvedType { field: String, type_name: String },

    #[error("field {field} uses the group encoding, which is not supported")]
    UnsupportedGroup { field: String },

    #[error("field {field} has invalid number {number}")]
    InvalidFieldNumber { field: String, number: i64 },
}

pub type Result<T> = std::result::Result<T, DescriptorError>;
