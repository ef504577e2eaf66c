//! Schema checks and typed decoding of request data.
//!
//! Decoding into the handler's parameter types goes through serde; a
//! [`Schema`] attached to a route adds checks serde cannot express (ranges,
//! formats, cross-field rules) and runs on the JSON form before decoding.

use pathrpc_core::ValidationError;
use serde::de::DeserializeOwned;
use serde_path_to_error::Segment;

/// An extra validation step for a route's path parameters or data.
pub trait Schema: Send + Sync + 'static {
    fn check(&self, value: &serde_json::Value) -> Result<(), ValidationError>;
}

impl<F> Schema for F
where
    F: Fn(&serde_json::Value) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    fn check(&self, value: &serde_json::Value) -> Result<(), ValidationError> {
        self(value)
    }
}

/// Deserialize `value` into `T`, reporting failures with a JSON pointer to
/// the offending field.
pub fn deserialize<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ValidationError> {
    let source = value.clone();
    serde_path_to_error::deserialize(value).map_err(|err| {
        let pointer = pointer(err.path());
        let offending = lookup(&source, &pointer);
        let error = ValidationError::new(err.inner().to_string()).with_path(pointer);
        match offending {
            Some(value) => error.with_value(value.clone()),
            None => error,
        }
    })
}

/// Deserialize request data.
///
/// Bodyless requests without any query parameters arrive as `{}`. When `T`
/// does not accept an object (e.g. `()` or `Option<_>`), `null` is tried
/// instead.
pub(crate) fn deserialize_data<T: DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, ValidationError> {
    let empty_object = value.as_object().is_some_and(|map| map.is_empty());
    match deserialize(value) {
        Err(_) if empty_object => deserialize(serde_json::Value::Null),
        result => result,
    }
}

fn pointer(path: &serde_path_to_error::Path) -> String {
    let mut pointer = String::new();
    for segment in path.iter() {
        pointer.push('/');
        match segment {
            Segment::Seq { index } => pointer.push_str(&index.to_string()),
            Segment::Map { key } => pointer.push_str(&key.replace('~', "~0").replace('/', "~1")),
            Segment::Enum { variant } => pointer.push_str(variant),
            Segment::Unknown => pointer.push('?'),
        }
    }
    pointer
}

fn lookup<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a serde_json::Value> {
    if pointer.is_empty() {
        return Some(value);
    }
    value.pointer(pointer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn test_deserialize_ok() {
        let user: User = deserialize(json!({ "name": "ada", "age": 36 })).unwrap();
        assert_eq!(user.age, 36);
    }

    #[test]
    fn test_deserialize_reports_pointer_and_value() {
        let err = deserialize::<User>(json!({ "name": "ada", "age": "old" })).unwrap_err();
        assert_eq!(err.path, "/age");
        assert_eq!(err.value, Some(json!("old")));
        assert!(err.message.contains("invalid type"));

        let err = deserialize::<User>(json!({ "name": "ada", "age": 1, "tags": ["a", 2] }))
            .unwrap_err();
        assert_eq!(err.path, "/tags/1");
        assert_eq!(err.value, Some(json!(2)));
    }

    #[test]
    fn test_deserialize_missing_field_points_at_parent() {
        let err = deserialize::<User>(json!({ "age": 1 })).unwrap_err();
        assert!(err.message.contains("missing field `name`"));
        assert_eq!(err.path, "");
    }

    #[test]
    fn test_deserialize_data_falls_back_to_null() {
        deserialize_data::<()>(json!({})).unwrap();
        assert_eq!(deserialize_data::<Option<User>>(json!({})).unwrap(), None);
        assert!(deserialize_data::<()>(json!({ "a": 1 })).is_err());
    }

    #[test]
    fn test_closure_schema() {
        let positive = |value: &serde_json::Value| match value["count"].as_i64() {
            Some(n) if n > 0 => Ok(()),
            _ => Err(ValidationError::new("count must be positive").with_path("/count")),
        };
        assert!(positive.check(&json!({ "count": 2 })).is_ok());
        assert_eq!(
            positive.check(&json!({ "count": 0 })).unwrap_err().path,
            "/count"
        );
    }
}
