//! `application/x-www-form-urlencoded` encoding of request payloads.
//!
//! Nested values are flattened the way PHP's `http_build_query` does it,
//! since that is what the SendParcel backend parses: arrays and objects
//! become bracketed keys (`shipment_keys[0]`, `receiver[name]`), booleans
//! become `1`/`0` and nulls are dropped. Integral floats lose their
//! fraction (`2.0` is sent as `2`); other numbers use Rust's shortest
//! representation, so PHP's `1.0E+20` exponent form is not reproduced.

use serde_json::{Map, Value};
use url::form_urlencoded;

pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Encode a payload mapping into a form body, preserving key order.
pub fn encode(payload: &Map<String, Value>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in payload {
        append(&mut serializer, key, value);
    }
    serializer.finish()
}

fn append(serializer: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            serializer.append_pair(key, if *b { "1" } else { "0" });
        }
        Value::Number(n) => {
            serializer.append_pair(key, &number(n));
        }
        Value::String(s) => {
            serializer.append_pair(key, s);
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                append(serializer, &format!("{key}[{i}]"), item);
            }
        }
        Value::Object(fields) => {
            for (name, item) in fields {
                append(serializer, &format!("{key}[{name}]"), item);
            }
        }
    }
}

fn number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}
