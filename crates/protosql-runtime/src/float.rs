//! Tagged IEEE-754 text used for float and double values in NumberJSON.
//!
//! `binary32:0x3fc00000` / `binary64:0x400921fb54442d18` carry the exact bit
//! pattern, so NaN payloads and signed zeros survive storage.

use serde_json::{Number, Value};

use crate::error::{Error, Result};

pub const BINARY32_PREFIX: &str = "binary32:0x";
pub const BINARY64_PREFIX: &str = "binary64:0x";

pub fn tag_f32(value: f32) -> String {
    format!("{BINARY32_PREFIX}{:08x}", value.to_bits())
}

pub fn tag_f64(value: f64) -> String {
    format!("{BINARY64_PREFIX}{:016x}", value.to_bits())
}

pub fn untag_f32(text: &str) -> Option<f32> {
    let digits = text.strip_prefix(BINARY32_PREFIX)?;
    if digits.len() != 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().map(f32::from_bits)
}

pub fn untag_f64(text: &str) -> Option<f64> {
    let digits = text.strip_prefix(BINARY64_PREFIX)?;
    if digits.len() != 16 {
        return None;
    }
    u64::from_str_radix(digits, 16).ok().map(f64::from_bits)
}

/// Reads a stored float: tagged hex or a plain JSON number.
pub fn read_f32(value: &Value) -> Result<f32> {
    match value {
        Value::String(s) => untag_f32(s)
            .ok_or_else(|| Error::type_mismatch(format!("`{s}` is not a binary32 value"))),
        Value::Number(n) => narrow_f64(n.as_f64().unwrap_or(f64::NAN)),
        other => Err(Error::type_mismatch(format!("expected a float, got {other}"))),
    }
}

/// Reads a stored double: tagged hex or a plain JSON number.
pub fn read_f64(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => untag_f64(s)
            .ok_or_else(|| Error::type_mismatch(format!("`{s}` is not a binary64 value"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::type_mismatch(format!("`{n}` is not a double"))),
        other => Err(Error::type_mismatch(format!("expected a double, got {other}"))),
    }
}

/// Narrows to `f32`; finite values beyond the `f32` range are rejected.
pub fn narrow_f64(value: f64) -> Result<f32> {
    if value.is_finite() && value.abs() > f64::from(f32::MAX) {
        return Err(Error::range(format!("{value} is out of range for float")));
    }
    Ok(value as f32)
}

/// A float as a JSON number using its shortest decimal form, so `0.1f32`
/// prints as `0.1` rather than its widened binary expansion.
pub fn f32_number(value: f32) -> Option<Number> {
    let shortest: f64 = value.to_string().parse().ok()?;
    Number::from_f64(shortest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pi_is_tagged_exactly() {
        assert_eq!(tag_f64(std::f64::consts::PI), "binary64:0x400921fb54442d18");
        assert_eq!(tag_f32(1.5), "binary32:0x3fc00000");
        assert_eq!(untag_f32("binary32:0x3fc00000"), Some(1.5));
        assert_eq!(untag_f64("binary64:0x400921fb54442d18"), Some(std::f64::consts::PI));
    }

    #[test]
    fn readers_accept_numbers_and_reject_mixed_widths() {
        assert_eq!(read_f32(&json!(2.5)).unwrap(), 2.5);
        assert_eq!(read_f64(&json!(-1)).unwrap(), -1.0);
        assert!(read_f32(&json!("binary64:0x400921fb54442d18")).is_err());
        assert!(read_f64(&json!(true)).is_err());
        assert!(read_f32(&json!(1e300)).is_err());
    }

    #[test]
    fn short_float_numbers() {
        assert_eq!(f32_number(0.1).unwrap().to_string(), "0.1");
    }
}
