//! Runtime for protobuf values stored in SQL.
//!
//! NumberJSON is the working document: a JSON object keyed by decimal field
//! number, with tagged floats and base64 bytes. Everything converts through
//! it:
//!
//! - [`codec`]: NumberJSON ⇄ wire bytes.
//! - [`proto_json`] (+ [`wkt`]): NumberJSON ⇄ canonical ProtoJSON.
//! - [`fields`] / [`typed`]: field get/set/has/clear and repeated/oneof ops.
//! - [`wire_fields`]: the same ops over WireJSON and raw bytes.
//! - [`routine`]: the `<surface>_<op>_<kind>_field` catalogue over SQL values.
//! - [`registry`] + [`api`]: loaded descriptor sets and whole-message
//!   conversions.
//!
//! Every failure is an [`Error`] carrying an [`ErrorKind`] and SQLSTATE
//! `45000`.

pub mod api;
pub mod codec;
pub mod error;
pub mod fields;
pub mod float;
pub mod proto_json;
pub mod registry;
pub mod routine;
pub mod typed;
pub mod value;
pub mod wire_fields;
pub mod wkt;

pub use codec::{decode, encode, DecodeOptions, MAX_DEPTH, UNKNOWN_FIELDS_KEY};
pub use error::{Error, ErrorKind, Result, SQLSTATE};
pub use proto_json::{from_proto_json, to_proto_json, JsonParseOptions, JsonPrintOptions};
pub use registry::Registry;
pub use routine::{RoutineName, SqlValue};
