use std::fmt;

use protosql_descriptor::DescriptorError;
use protosql_wire::WireError;
use thiserror::Error;

/// SQLSTATE every runtime error is signalled with.
pub const SQLSTATE: &str = "45000";

/// Error classes; the name doubles as the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedWire,
    MalformedJson,
    DescriptorMismatch,
    UnknownType,
    UnknownField,
    RangeError,
    InvalidEnumName,
    IndexOutOfBounds,
    InsertIndexOutOfBounds,
    DuplicateHandle,
    NoSuchHandle,
    TypeMismatch,
}

impl ErrorKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ErrorKind::MalformedWire => "MalformedWire",
            ErrorKind::MalformedJson => "MalformedJson",
            ErrorKind::DescriptorMismatch => "DescriptorMismatch",
            ErrorKind::UnknownType => "UnknownType",
            ErrorKind::UnknownField => "UnknownField",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::InvalidEnumName => "InvalidEnumName",
            ErrorKind::IndexOutOfBounds => "IndexOutOfBounds",
            ErrorKind::InsertIndexOutOfBounds => "InsertIndexOutOfBounds",
            ErrorKind::DuplicateHandle => "DuplicateHandle",
            ErrorKind::NoSuchHandle => "NoSuchHandle",
            ErrorKind::TypeMismatch => "TypeMismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A runtime failure, rendered as `"<Kind>: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sqlstate(&self) -> &'static str {
        SQLSTATE
    }

    /// Prefixes the message with the field path the failure happened under.
    pub fn at(mut self, path: impl fmt::Display) -> Self {
        self.message = format!("{path}: {}", self.message);
        self
    }

    pub(crate) fn malformed_wire(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedWire, message)
    }

    pub(crate) fn malformed_json(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedJson, message)
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DescriptorMismatch, message)
    }

    pub(crate) fn unknown_type(type_name: &str) -> Self {
        Self::new(ErrorKind::UnknownType, format!("type {type_name} is not defined"))
    }

    pub(crate) fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }
}

impl From<WireError> for Error {
    fn from(err: WireError) -> Self {
        match err {
            WireError::WireJson(message) => Error::malformed_json(message),
            other => Error::malformed_wire(other.to_string()),
        }
    }
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Self {
        let kind = match &err {
            DescriptorError::Decode(_) => ErrorKind::MalformedWire,
            DescriptorError::Json(_) | DescriptorError::JsonShape(_) => ErrorKind::MalformedJson,
            DescriptorError::UnresolvedType { .. } => ErrorKind::UnknownType,
            DescriptorError::DuplicateType(_)
            | DescriptorError::UnsupportedGroup { .. }
            | DescriptorError::InvalidFieldNumber { .. } => ErrorKind::DescriptorMismatch,
        };
        Error::new(kind, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::malformed_json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
