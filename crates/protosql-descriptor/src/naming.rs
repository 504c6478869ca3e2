//! Name derivations protoc applies to descriptors.

/// protoc's `ToJsonName`: drop underscores and upper-case the letter after
/// each one (`foo_bar_baz` → `fooBarBaz`, `_x` → `X`).
pub fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Name of the synthetic entry message protoc generates for a map field
/// (`string_to_int` → `StringToIntEntry`).
pub fn map_entry_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len() + 5);
    let mut upper_next = true;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_names_follow_protoc() {
        assert_eq!(to_json_name("int32_field"), "int32Field");
        assert_eq!(to_json_name("foo_bar_baz"), "fooBarBaz");
        assert_eq!(to_json_name("already"), "already");
        assert_eq!(to_json_name("_leading"), "Leading");
        assert_eq!(to_json_name("field_1"), "field1");
    }

    #[test]
    fn map_entry_names_are_camel_cased() {
        assert_eq!(map_entry_name("string_to_int"), "StringToIntEntry");
        assert_eq!(map_entry_name("labels"), "LabelsEntry");
    }
}
