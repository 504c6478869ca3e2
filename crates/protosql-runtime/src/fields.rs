//! Field routines over NumberJSON documents.
//!
//! Documents are values: mutators take the document by value and return the
//! updated one. A SQL `NULL` document (JSON `null`) reads as an empty
//! message. Nothing here consults a descriptor; callers pass the field
//! number and [`FieldKind`], and oneof groups as lists of member numbers.

use protosql_descriptor::FieldKind;
use serde_json::{Map, Value};

use crate::codec::field_key;
use crate::error::{Error, ErrorKind, Result};
use crate::value;

type Object = Map<String, Value>;

fn object(doc: &Value) -> Result<Option<&Object>> {
    match doc {
        Value::Object(obj) => Ok(Some(obj)),
        Value::Null => Ok(None),
        other => Err(Error::type_mismatch(format!(
            "expected a NumberJSON object, got {other}"
        ))),
    }
}

fn into_object(doc: Value) -> Result<Object> {
    match doc {
        Value::Object(obj) => Ok(obj),
        Value::Null => Ok(Object::new()),
        other => Err(Error::type_mismatch(format!(
            "expected a NumberJSON object, got {other}"
        ))),
    }
}

fn stored(doc: &Value, number: u32) -> Result<Option<&Value>> {
    Ok(object(doc)?
        .and_then(|obj| obj.get(&number.to_string()))
        .filter(|v| !v.is_null()))
}

/// Inserts or replaces `number`, keeping keys in ascending field order.
fn put(mut obj: Object, number: u32, v: Value) -> Value {
    let key = number.to_string();
    if let Some(slot) = obj.get_mut(&key) {
        *slot = v;
        return Value::Object(obj);
    }
    let in_order = obj
        .keys()
        .filter_map(|k| field_key(k))
        .all(|n| n < number);
    if in_order {
        obj.insert(key, v);
        return Value::Object(obj);
    }
    let mut entries: Vec<(String, Value)> = obj.into_iter().collect();
    entries.push((key, v));
    entries.sort_by_key(|(k, _)| field_key(k).unwrap_or(u32::MAX));
    Value::Object(entries.into_iter().collect())
}

fn remove(doc: Value, number: u32) -> Result<Value> {
    let mut obj = into_object(doc)?;
    obj.remove(&number.to_string());
    Ok(Value::Object(obj))
}

// =============================================================================
// Singular fields
// =============================================================================

/// Stored value, or the kind's zero (`{}` for messages) when absent.
pub fn get(doc: &Value, number: u32, kind: FieldKind) -> Result<Value> {
    get_or(doc, number, kind, value::zero(kind))
}

/// Stored value, or `default` (returned untouched) when absent.
pub fn get_or(doc: &Value, number: u32, kind: FieldKind, default: Value) -> Result<Value> {
    match stored(doc, number)? {
        Some(v) => value::normalize(kind, v).map_err(|e| e.at(format_args!("field {number}"))),
        None => Ok(default),
    }
}

pub fn set(doc: Value, number: u32, kind: FieldKind, v: &Value) -> Result<Value> {
    let v = value::normalize(kind, v).map_err(|e| e.at(format_args!("field {number}")))?;
    Ok(put(into_object(doc)?, number, v))
}

pub fn has(doc: &Value, number: u32) -> Result<bool> {
    Ok(stored(doc, number)?.is_some())
}

pub fn clear(doc: Value, number: u32) -> Result<Value> {
    remove(doc, number)
}

// =============================================================================
// Repeated fields
// =============================================================================

fn items(doc: &Value, number: u32) -> Result<&[Value]> {
    match stored(doc, number)? {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(Error::type_mismatch(format!(
            "field {number}: repeated field holds {other}"
        ))),
    }
}

fn normalize_all(kind: FieldKind, number: u32, values: &[Value]) -> Result<Vec<Value>> {
    values
        .iter()
        .map(|v| value::normalize(kind, v))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| e.at(format_args!("field {number}")))
}

fn expect_array(values: &Value) -> Result<&[Value]> {
    values
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::type_mismatch(format!("expected a JSON array, got {values}")))
}

/// Stores `items`, dropping the key when the list is empty.
fn put_items(doc: Value, number: u32, items: Vec<Value>) -> Result<Value> {
    if items.is_empty() {
        return remove(doc, number);
    }
    Ok(put(into_object(doc)?, number, Value::Array(items)))
}

fn position(number: u32, i: i64, len: usize) -> Result<usize> {
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::IndexOutOfBounds,
                format!("field {number}: index {i} outside 0..{len}"),
            )
        })
}

pub fn get_all(doc: &Value, number: u32, kind: FieldKind) -> Result<Value> {
    normalize_all(kind, number, items(doc, number)?).map(Value::Array)
}

/// Replaces every element; `[]` erases the field.
pub fn set_all(doc: Value, number: u32, kind: FieldKind, values: &Value) -> Result<Value> {
    let items = normalize_all(kind, number, expect_array(values)?)?;
    put_items(doc, number, items)
}

pub fn add(doc: Value, number: u32, kind: FieldKind, v: &Value) -> Result<Value> {
    let v = value::normalize(kind, v).map_err(|e| e.at(format_args!("field {number}")))?;
    let mut list = items(&doc, number)?.to_vec();
    list.push(v);
    put_items(doc, number, list)
}

pub fn add_all(doc: Value, number: u32, kind: FieldKind, values: &Value) -> Result<Value> {
    let extra = normalize_all(kind, number, expect_array(values)?)?;
    let mut list = items(&doc, number)?.to_vec();
    list.extend(extra);
    put_items(doc, number, list)
}

pub fn count(doc: &Value, number: u32) -> Result<usize> {
    Ok(items(doc, number)?.len())
}

pub fn get_at(doc: &Value, number: u32, kind: FieldKind, i: i64) -> Result<Value> {
    let list = items(doc, number)?;
    let at = position(number, i, list.len())?;
    value::normalize(kind, &list[at]).map_err(|e| e.at(format_args!("field {number}")))
}

pub fn set_at(doc: Value, number: u32, kind: FieldKind, i: i64, v: &Value) -> Result<Value> {
    let v = value::normalize(kind, v).map_err(|e| e.at(format_args!("field {number}")))?;
    let mut list = items(&doc, number)?.to_vec();
    let at = position(number, i, list.len())?;
    list[at] = v;
    put_items(doc, number, list)
}

/// Inserts before position `i`; `i == count` appends.
pub fn insert_at(doc: Value, number: u32, kind: FieldKind, i: i64, v: &Value) -> Result<Value> {
    let v = value::normalize(kind, v).map_err(|e| e.at(format_args!("field {number}")))?;
    let mut list = items(&doc, number)?.to_vec();
    let at = usize::try_from(i)
        .ok()
        .filter(|&i| i <= list.len())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InsertIndexOutOfBounds,
                format!("field {number}: insert index {i} outside 0..={}", list.len()),
            )
        })?;
    list.insert(at, v);
    put_items(doc, number, list)
}

/// Removes element `i`; the key disappears with the last element.
pub fn remove_at(doc: Value, number: u32, i: i64) -> Result<Value> {
    let mut list = items(&doc, number)?.to_vec();
    let at = position(number, i, list.len())?;
    list.remove(at);
    put_items(doc, number, list)
}

// =============================================================================
// Oneof groups
// =============================================================================

/// Sets a oneof member after clearing the other members of its group.
pub fn set_oneof(
    doc: Value,
    number: u32,
    kind: FieldKind,
    v: &Value,
    siblings: &[u32],
) -> Result<Value> {
    let v = value::normalize(kind, v).map_err(|e| e.at(format_args!("field {number}")))?;
    let mut obj = into_object(doc)?;
    for sibling in siblings.iter().filter(|&&n| n != number) {
        obj.remove(&sibling.to_string());
    }
    Ok(put(obj, number, v))
}

/// Name of the member of `members` that is present, if any.
pub fn which<'m>(doc: &Value, members: &[(u32, &'m str)]) -> Result<Option<&'m str>> {
    for &(number, name) in members {
        if has(doc, number)? {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

pub fn clear_oneof(doc: Value, members: &[u32]) -> Result<Value> {
    let mut obj = into_object(doc)?;
    for number in members {
        obj.remove(&number.to_string());
    }
    Ok(Value::Object(obj))
}
