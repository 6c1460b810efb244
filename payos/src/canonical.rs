//! Canonical serialization of JSON values for checksum computation.
//!
//! payOS computes HMAC checksums over a `key=value&key=value` rendering of a
//! JSON object. Three renderings exist:
//!
//! - [`shallow`]: top-level keys sorted, nested values JSON-encoded as opaque
//!   strings. Used for body signatures and webhooks.
//! - [`deep`]: keys sorted at every level (optionally array elements too),
//!   values percent-encoded. Used for `x-signature` header signatures.
//! - [`payment_request`]: the five payment-link fields in fixed order.
//!
//! All functions are pure: the same object produces the same string no matter
//! the insertion order of its keys.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Number, Value};

/// Characters left untouched by [`encode_component`]: ASCII alphanumerics
/// and `-_.~`. Space is encoded as `%20`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The fields signed when creating a payment link, in signing order.
pub const PAYMENT_REQUEST_FIELDS: [&str; 5] =
    ["amount", "cancelUrl", "description", "orderCode", "returnUrl"];

/// Options for the [`deep`] rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepOptions {
    /// Percent-encode keys and values.
    pub encode_uri: bool,
    /// Sort array elements by their JSON rendering.
    pub sort_arrays: bool,
}

impl Default for DeepOptions {
    fn default() -> Self {
        Self {
            encode_uri: true,
            sort_arrays: false,
        }
    }
}

/// Renders a number without exponent and without trailing zeros.
#[must_use]
pub fn format_number(number: &Number) -> String {
    if let Some(n) = number.as_i64() {
        n.to_string()
    } else if let Some(n) = number.as_u64() {
        n.to_string()
    } else {
        number.as_f64().map_or_else(|| number.to_string(), |f| f.to_string())
    }
}

/// Renders a single value as it appears on the right of `=`.
///
/// `null` is empty, strings are raw, numbers use [`format_number`], arrays and
/// objects are JSON with keys sorted at every level.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => to_json(&sort_value(value, false)),
    }
}

/// Compact JSON in the value's own key order, numbers rendered by
/// [`format_number`] at every depth.
#[must_use]
pub fn to_json(value: &Value) -> String {
    let mut out = String::new();
    write_json(&mut out, value);
    out
}

fn write_json(out: &mut String, value: &Value) {
    match value {
        Value::Number(n) => out.push_str(&format_number(n)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_json(out, item);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Percent-encodes a key or value component, with space as `%20`.
#[must_use]
pub fn encode_component(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, COMPONENT).into()
}

/// Recursively rebuilds `value` with object keys inserted in ascending order
/// at every level, optionally sorting array elements by their JSON rendering.
#[must_use]
pub fn sort_value(value: &Value, sort_arrays: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), sort_value(&map[key], sort_arrays));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(|v| sort_value(v, sort_arrays)).collect();
            if sort_arrays {
                items.sort_by_cached_key(to_json);
            }
            Value::Array(items)
        }
        other => other.clone(),
    }
}

/// Top-level sorted rendering used by body signatures.
///
/// Every key is present in the output; `null` contributes `key=`.
#[must_use]
pub fn shallow(object: &Map<String, Value>, encode_uri: bool) -> String {
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    let pairs: Vec<String> = keys
        .into_iter()
        .map(|key| pair(key, &render_value(&object[key]), encode_uri))
        .collect();
    pairs.join("&")
}

/// Fully sorted rendering used by header signatures.
#[must_use]
pub fn deep(object: &Map<String, Value>, options: DeepOptions) -> String {
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    let pairs: Vec<String> = keys
        .into_iter()
        .map(|key| {
            let value = match &object[key] {
                nested @ (Value::Array(_) | Value::Object(_)) => {
                    to_json(&sort_value(nested, options.sort_arrays))
                }
                scalar => render_value(scalar),
            };
            pair(key, &value, options.encode_uri)
        })
        .collect();
    pairs.join("&")
}

/// Fixed five-field rendering used when creating a payment link.
///
/// Only [`PAYMENT_REQUEST_FIELDS`] participate, in that order. Missing fields
/// contribute `key=`.
#[must_use]
pub fn payment_request(object: &Map<String, Value>) -> String {
    let pairs: Vec<String> = PAYMENT_REQUEST_FIELDS
        .iter()
        .map(|key| pair(key, &object.get(*key).map(render_value).unwrap_or_default(), false))
        .collect();
    pairs.join("&")
}

fn pair(key: &str, value: &str, encode_uri: bool) -> String {
    if encode_uri {
        format!("{}={}", encode_component(key), encode_component(value))
    } else {
        format!("{key}={value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_shallow_sorts_top_level_keys() {
        let obj = object(json!({
            "orderCode": 123,
            "amount": 2000,
            "description": "VQRIO123",
            "cancelUrl": null
        }));
        assert_eq!(
            shallow(&obj, false),
            "amount=2000&cancelUrl=&description=VQRIO123&orderCode=123"
        );
    }

    #[test]
    fn test_shallow_stringifies_nested_values() {
        let obj = object(json!({
            "items": [{"quantity": 1, "name": "Mi tom"}],
            "meta": {"b": 2, "a": 1},
            "flag": true
        }));
        assert_eq!(
            shallow(&obj, false),
            r#"flag=true&items=[{"name":"Mi tom","quantity":1}]&meta={"a":1,"b":2}"#
        );
    }

    #[test]
    fn test_number_formatting_has_no_exponent() {
        let obj = object(json!({"a": 1.5, "b": 2.0, "c": 1e21, "d": -7}));
        assert_eq!(
            shallow(&obj, false),
            "a=1.5&b=2&c=1000000000000000000000&d=-7"
        );
    }

    #[test]
    fn test_nested_numbers_have_no_exponent() {
        let obj = object(json!({"items": [{"rate": 2.0, "price": 1e21}], "note": "a\"b"}));
        assert_eq!(
            shallow(&obj, false),
            r#"items=[{"price":1000000000000000000000,"rate":2}]&note=a"b"#
        );
        assert_eq!(
            to_json(&json!({"k": ["x\ny", 1e20]})),
            r#"{"k":["x\ny",100000000000000000000]}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = Map::new();
        first.insert("z".into(), json!({"y": 1, "x": [3, 1]}));
        first.insert("a".into(), json!("alpha"));

        let mut second = Map::new();
        second.insert("a".into(), json!("alpha"));
        second.insert("z".into(), json!({"x": [3, 1], "y": 1}));

        assert_eq!(shallow(&first, false), shallow(&second, false));
        assert_eq!(
            deep(&first, DeepOptions::default()),
            deep(&second, DeepOptions::default())
        );
    }

    #[test]
    fn test_deep_percent_encodes_with_space_as_percent_20() {
        let obj = object(json!({"description": "thanh toan don/hang", "amount": 1000}));
        assert_eq!(
            deep(&obj, DeepOptions::default()),
            "amount=1000&description=thanh%20toan%20don%2Fhang"
        );
    }

    #[test]
    fn test_deep_sorts_nested_keys_and_optionally_arrays() {
        let obj = object(json!({"category": ["b", "a"], "nested": {"z": null, "a": 1}}));
        let plain = DeepOptions {
            encode_uri: false,
            sort_arrays: false,
        };
        assert_eq!(
            deep(&obj, plain),
            r#"category=["b","a"]&nested={"a":1,"z":null}"#
        );

        let sorted = DeepOptions {
            encode_uri: false,
            sort_arrays: true,
        };
        assert_eq!(
            deep(&obj, sorted),
            r#"category=["a","b"]&nested={"a":1,"z":null}"#
        );
    }

    #[test]
    fn test_deep_null_is_empty() {
        let obj = object(json!({"toDate": null, "limit": 10}));
        assert_eq!(deep(&obj, DeepOptions::default()), "limit=10&toDate=");
    }

    #[test]
    fn test_payment_request_uses_fixed_fields_only() {
        let obj = object(json!({
            "returnUrl": "https://shop.vn/return",
            "orderCode": 42,
            "items": [{"name": "x"}],
            "buyerName": "Nguyen Van A",
            "description": "Order 42",
            "cancelUrl": "https://shop.vn/cancel",
            "amount": 10000
        }));
        assert_eq!(
            payment_request(&obj),
            "amount=10000&cancelUrl=https://shop.vn/cancel&description=Order 42&orderCode=42&returnUrl=https://shop.vn/return"
        );
    }

    #[test]
    fn test_payment_request_missing_field_is_empty() {
        let obj = object(json!({"amount": 1, "orderCode": 2}));
        assert_eq!(
            payment_request(&obj),
            "amount=1&cancelUrl=&description=&orderCode=2&returnUrl="
        );
    }
}
