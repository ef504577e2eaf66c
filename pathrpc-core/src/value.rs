//! The value model carried by the query codec.
//!
//! [`Value`] is JSON plus two additions: a `BigInt` scalar and array holes.
//! Object members are kept in a [`BTreeMap`], so iteration is always in
//! ascending key order and encoding is deterministic.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EncodeError;

/// An object of named values.
pub type Object = BTreeMap<String, Value>;

/// A value the query codec can represent.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    /// `None` slots are holes, distinct from an explicit `Null`.
    Array(Vec<Option<Value>>),
    Object(Object),
}

/// Largest integer an `f64` represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: i128 = 9_007_199_254_740_991;

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert any serializable type into a [`Value`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodeError> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Convert any serializable type into an [`Object`].
    pub fn object_from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Object, EncodeError> {
        match Self::from_serialize(value)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Object::new()),
            other => Err(EncodeError::NotAnObject(other.kind())),
        }
    }

    /// Render a scalar the way a plain (non-codec) query string carries it.
    ///
    /// Containers fall back to their JSON text.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::BigInt(n) => n.to_string(),
            other => serde_json::Value::from(other.clone()).to_string(),
        }
    }
}

/// Format a number the way the codec writes it.
///
/// `-0` normalises to `0`; non-finite values use their JavaScript names.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => number_from_json(&n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| Some(v.into())).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

fn number_from_json(n: &serde_json::Number) -> Value {
    let integer = n
        .as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from));
    match integer {
        Some(i) if i.abs() > MAX_SAFE_INTEGER => Value::BigInt(i),
        _ => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            // Integral numbers become JSON integers so that they decode into
            // integer fields. Non-finite numbers have no JSON form.
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 => {
                serde_json::Value::from(n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::BigInt(i) => {
                if let Ok(small) = i64::try_from(i) {
                    serde_json::Value::from(small)
                } else if let Ok(large) = u64::try_from(i) {
                    serde_json::Value::from(large)
                } else {
                    serde_json::Value::String(i.to_string())
                }
            }
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map(Into::into).unwrap_or(serde_json::Value::Null))
                    .collect(),
            ),
            Value::Object(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items.into_iter().map(Some).collect())
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}
