//! Field values and their storage encoding.
//!
//! Records travel as JSON field maps. At the storage boundary every value is
//! narrowed to one of the four SQLite storage classes the local store uses;
//! composite values (objects and arrays) are kept as JSON text and decoded
//! again on read.

use crate::Fields;
use serde_json::{Number, Value};

/// A value in the form the local store persists it.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl StoredValue {
    /// Narrow a JSON value to its storage form.
    ///
    /// Booleans become 0/1, composites become their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => StoredValue::Null,
            Value::Bool(b) => StoredValue::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => StoredValue::Integer(i),
                None => StoredValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => StoredValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => StoredValue::Text(value.to_string()),
        }
    }

    /// Widen a stored value back to JSON.
    ///
    /// Text is decoded as JSON when it parses and kept verbatim otherwise, so
    /// a string that merely looks like JSON (`"[1,2]"`) comes back as the
    /// composite value. Both stores in the deployment read text this way.
    pub fn into_json(self) -> Value {
        match self {
            StoredValue::Null => Value::Null,
            StoredValue::Integer(i) => Value::Number(i.into()),
            StoredValue::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            StoredValue::Text(s) => decode_text(s),
        }
    }
}

fn decode_text(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(decoded) => decoded,
        Err(_) => Value::String(text),
    }
}

/// Structural equality of two JSON values as both stores see them.
///
/// Objects compare independent of key order, numbers compare numerically
/// (`1 == 1.0`) and a boolean equals the integer it is stored as. A string
/// is also compared by its decoded JSON value, the form it takes after a
/// trip through the local store (`"12345678"` matches `12345678`).
pub fn values_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            x == y || decodes_to_string(x, y) || decodes_to_string(y, x)
        }
        (Value::String(text), other) | (other, Value::String(text)) => {
            match serde_json::from_str::<Value>(text) {
                Ok(decoded) if !decoded.is_string() => values_equivalent(&decoded, other),
                _ => false,
            }
        }
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            n.as_f64() == Some(if *flag { 1.0 } else { 0.0 })
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equivalent(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equivalent(x, y)))
        }
        _ => a == b,
    }
}

/// True when `text` is the JSON encoding of the string `plain`.
fn decodes_to_string(text: &str, plain: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(Value::String(decoded)) if decoded == plain)
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (x.as_i64(), y.as_i64()) {
        (Some(i), Some(j)) => i == j,
        _ => match (x.as_u64(), y.as_u64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
    }
}

/// Equality of two field maps. A missing field and an explicit null match.
pub fn fields_equivalent(a: &Fields, b: &Fields) -> bool {
    let null = Value::Null;
    a.keys()
        .chain(b.keys())
        .all(|key| values_equivalent(a.get(key).unwrap_or(&null), b.get(key).unwrap_or(&null)))
}
