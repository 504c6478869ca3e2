//! Protobuf wire primitives
//!
//! Two layers:
//! - [`varint`]: byte-level readers/writers (varint, zigzag, fixed-width,
//!   length-delimited framing, tags).
//! - [`record`] + [`json`]: the scanner that turns a message into an ordered
//!   list of records, and the WireJSON rendering of that list.
//!
//! Nothing here knows about schemas; a [`PackedLayout`] is the only hint the
//! scanner accepts.

pub mod error;
pub mod json;
pub mod record;
pub mod varint;

pub use error::{Result, WireError};
pub use json::MAX_SAFE_INTEGER;
pub use record::{unpack, NoLayout, PackedLayout, RawValue, WireMessage, WireRecord};
pub use varint::WireType;
