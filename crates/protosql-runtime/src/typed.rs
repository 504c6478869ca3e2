//! Native-typed accessors over NumberJSON, one marker type per scalar kind.
//!
//! ```
//! use protosql_runtime::typed::{self, Double, Int32};
//! use serde_json::json;
//!
//! let doc = typed::set::<Int32>(json!({}), 1, 42).unwrap();
//! assert_eq!(typed::get::<Int32>(&doc, 1).unwrap(), 42);
//! let doc = typed::set::<Double>(doc, 2, 0.5).unwrap();
//! assert_eq!(doc["2"], json!("binary64:0x3fe0000000000000"));
//! ```

use protosql_descriptor::FieldKind;
use serde_json::Value;

use crate::error::Result;
use crate::routine::SqlValue;
use crate::{fields, float, value};

/// A scalar kind with its native Rust representation.
pub trait Scalar {
    type Native;
    const KIND: FieldKind;

    fn from_json(v: &Value) -> Result<Self::Native>;
    fn to_json(v: Self::Native) -> Value;
    /// The SQL value a getter routine returns.
    fn to_sql(v: Self::Native) -> SqlValue;
}

macro_rules! integer_scalar {
    ($name:ident, $native:ty, $kind:ident, $read:ident, $sql:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl Scalar for $name {
            type Native = $native;
            const KIND: FieldKind = FieldKind::$kind;

            fn from_json(v: &Value) -> Result<$native> {
                value::$read(Self::KIND, v)
            }

            fn to_json(v: $native) -> Value {
                Value::from(v)
            }

            fn to_sql(v: $native) -> SqlValue {
                SqlValue::$sql(v.into())
            }
        }
    };
}

integer_scalar!(Int32, i32, Int32, as_i32, Int);
integer_scalar!(SInt32, i32, SInt32, as_i32, Int);
integer_scalar!(SFixed32, i32, SFixed32, as_i32, Int);
integer_scalar!(Enum, i32, Enum, as_i32, Int);
integer_scalar!(UInt32, u32, UInt32, as_u32, Int);
integer_scalar!(Fixed32, u32, Fixed32, as_u32, Int);
integer_scalar!(Int64, i64, Int64, as_i64, Int);
integer_scalar!(SInt64, i64, SInt64, as_i64, Int);
integer_scalar!(SFixed64, i64, SFixed64, as_i64, Int);
integer_scalar!(UInt64, u64, UInt64, as_u64, UInt);
integer_scalar!(Fixed64, u64, Fixed64, as_u64, UInt);

#[derive(Debug, Clone, Copy)]
pub struct Float;

impl Scalar for Float {
    type Native = f32;
    const KIND: FieldKind = FieldKind::Float;

    fn from_json(v: &Value) -> Result<f32> {
        float::read_f32(v)
    }

    fn to_json(v: f32) -> Value {
        Value::String(float::tag_f32(v))
    }

    fn to_sql(v: f32) -> SqlValue {
        SqlValue::Float(v)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Double;

impl Scalar for Double {
    type Native = f64;
    const KIND: FieldKind = FieldKind::Double;

    fn from_json(v: &Value) -> Result<f64> {
        float::read_f64(v)
    }

    fn to_json(v: f64) -> Value {
        Value::String(float::tag_f64(v))
    }

    fn to_sql(v: f64) -> SqlValue {
        SqlValue::Double(v)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bool;

impl Scalar for Bool {
    type Native = bool;
    const KIND: FieldKind = FieldKind::Bool;

    fn from_json(v: &Value) -> Result<bool> {
        value::as_bool(v)
    }

    fn to_json(v: bool) -> Value {
        Value::Bool(v)
    }

    fn to_sql(v: bool) -> SqlValue {
        SqlValue::Bool(v)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Str;

impl Scalar for Str {
    type Native = String;
    const KIND: FieldKind = FieldKind::String;

    fn from_json(v: &Value) -> Result<String> {
        value::as_str(v).map(str::to_string)
    }

    fn to_json(v: String) -> Value {
        Value::String(v)
    }

    fn to_sql(v: String) -> SqlValue {
        SqlValue::Text(v)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bytes;

impl Scalar for Bytes {
    type Native = Vec<u8>;
    const KIND: FieldKind = FieldKind::Bytes;

    fn from_json(v: &Value) -> Result<Vec<u8>> {
        value::as_bytes(v)
    }

    fn to_json(v: Vec<u8>) -> Value {
        Value::String(value::encode_base64(&v))
    }

    fn to_sql(v: Vec<u8>) -> SqlValue {
        SqlValue::Blob(v)
    }
}

pub fn get<S: Scalar>(doc: &Value, number: u32) -> Result<S::Native> {
    S::from_json(&fields::get(doc, number, S::KIND)?)
}

pub fn get_or<S: Scalar>(doc: &Value, number: u32, default: S::Native) -> Result<S::Native> {
    if fields::has(doc, number)? {
        get::<S>(doc, number)
    } else {
        Ok(default)
    }
}

pub fn set<S: Scalar>(doc: Value, number: u32, v: S::Native) -> Result<Value> {
    fields::set(doc, number, S::KIND, &S::to_json(v))
}

pub fn get_all<S: Scalar>(doc: &Value, number: u32) -> Result<Vec<S::Native>> {
    match fields::get_all(doc, number, S::KIND)? {
        Value::Array(items) => items.iter().map(S::from_json).collect(),
        _ => Ok(Vec::new()),
    }
}

pub fn add<S: Scalar>(doc: Value, number: u32, v: S::Native) -> Result<Value> {
    fields::add(doc, number, S::KIND, &S::to_json(v))
}

pub fn set_all<S: Scalar>(
    doc: Value,
    number: u32,
    values: impl IntoIterator<Item = S::Native>,
) -> Result<Value> {
    let values: Vec<Value> = values.into_iter().map(S::to_json).collect();
    fields::set_all(doc, number, S::KIND, &Value::Array(values))
}
