//! Descriptor index
//!
//! Turns a `FileDescriptorSet` (binary or JSON) into a lookup structure keyed
//! by fully-qualified type name, with field tables resolved down to
//! [`FieldKind`], cardinality, packedness and oneof membership. Everything
//! above the wire layer asks this crate what a field number means.

pub mod builder;
pub mod error;
pub mod index;
pub mod indexer;
pub mod json;
pub mod kind;
pub mod naming;
pub mod wkt;

pub use error::{DescriptorError, Result};
pub use index::{
    DescriptorIndex, EnumDescriptor, EnumId, EnumValueDescriptor, FieldDescriptor,
    FileDescriptor, MessageDescriptor, MessageId, OneofDescriptor, Syntax, TypeRef,
};
pub use kind::{Cardinality, FieldKind};
pub use wkt::WellKnownType;
