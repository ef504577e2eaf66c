//! Error types shared by the codec, the path matcher, and both ends of the
//! protocol.
//!
//! - [`SyntaxError`] / [`DecodeError`]: malformed query codec input
//! - [`EncodeError`]: a value that cannot be represented by the codec
//! - [`PatternError`]: a route pattern that cannot be compiled
//! - [`ValidationError`]: a schema mismatch, possibly nested
//! - [`FrameError`]: a malformed JSON text sequence

use serde::{Deserialize, Serialize};

/// Malformed query codec input.
///
/// `position` is the byte offset into the value being decoded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new<S: Into<String>>(message: S, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A query parameter whose value failed to decode.
///
/// Wraps the [`SyntaxError`] with the top-level key and the raw value so
/// that callers can report exactly which parameter was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for query parameter {key:?}: {source}")]
pub struct DecodeError {
    pub key: String,
    pub value: String,
    #[source]
    pub source: SyntaxError,
}

impl DecodeError {
    /// JSON pointer style location of the failing parameter.
    pub fn path(&self) -> String {
        format!("/{}", self.key)
    }
}

/// Conversion of an arbitrary serializable type into a [`Value`](crate::Value)
/// failed.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The type could not be serialized into JSON (e.g. a map with
    /// non-string keys).
    #[error("value is not representable: {0}")]
    Unrepresentable(#[from] serde_json::Error),

    /// The top-level value was not an object.
    #[error("expected an object, got {0}")]
    NotAnObject(&'static str),
}

/// A route pattern that cannot be compiled.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("missing parameter name at position {position} in {pattern:?}")]
    MissingName { pattern: String, position: usize },

    #[error("parameter at position {position} in {pattern:?} must follow a '/'")]
    NotPrecededBySeparator { pattern: String, position: usize },

    #[error("parameter at position {position} in {pattern:?} must be followed by a '/'")]
    NotFollowedBySeparator { pattern: String, position: usize },

    #[error("unterminated group starting at position {position} in {pattern:?}")]
    UnterminatedGroup { pattern: String, position: usize },

    #[error("unexpected '}}' at position {position} in {pattern:?}")]
    UnexpectedGroupEnd { pattern: String, position: usize },

    #[error("dangling escape at end of {pattern:?}")]
    DanglingEscape { pattern: String },

    #[error("failed to compile {pattern:?}: {message}")]
    Regex { pattern: String, message: String },
}

/// A schema mismatch.
///
/// Validation errors form a tree: a parent error (e.g. "object is invalid")
/// may carry the sub-errors that caused it. [`ValidationError::leaf`]
/// resolves the most specific failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    /// JSON pointer to the failing field. Empty for the root.
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            path: String::new(),
            value: None,
            errors: vec![],
        }
    }

    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach a nested error.
    pub fn push(mut self, error: ValidationError) -> Self {
        self.errors.push(error);
        self
    }

    /// Walk depth-first to the first error without sub-errors.
    pub fn leaf(&self) -> &ValidationError {
        let mut current = self;
        while let Some(first) = current.errors.first() {
            current = first;
        }
        current
    }

    /// Owned variant of [`leaf`](Self::leaf).
    pub fn into_leaf(self) -> ValidationError {
        let mut current = self;
        while !current.errors.is_empty() {
            current = current.errors.swap_remove(0);
        }
        current
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} at {}", self.message, self.path)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Malformed JSON text sequence.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("data outside of a record at byte {0}")]
    MissingSeparator(usize),

    #[error("invalid JSON in record: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::new("unterminated string", 3);
        assert_eq!(err.to_string(), "unterminated string at position 3");
    }

    #[test]
    fn test_decode_error_display_names_key_and_position() {
        let err = DecodeError {
            key: "filter".into(),
            value: "(".into(),
            source: SyntaxError::new("unterminated array or object", 0),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"filter\""));
        assert!(msg.contains("position 0"));
        assert_eq!(err.path(), "/filter");
    }

    #[test]
    fn test_leaf_of_flat_error_is_itself() {
        let err = ValidationError::new("expected string").with_path("/name");
        assert_eq!(err.leaf(), &err);
    }

    #[test]
    fn test_leaf_walks_first_branch() {
        let err = ValidationError::new("invalid request")
            .push(
                ValidationError::new("invalid user")
                    .with_path("/user")
                    .push(
                        ValidationError::new("expected number")
                            .with_path("/user/age")
                            .with_value(json!("ten")),
                    )
                    .push(ValidationError::new("expected string").with_path("/user/name")),
            )
            .push(ValidationError::new("unexpected field").with_path("/extra"));

        let leaf = err.leaf();
        assert_eq!(leaf.message, "expected number");
        assert_eq!(leaf.path, "/user/age");
        assert!(leaf.errors.is_empty());
        assert_eq!(err.clone().into_leaf(), *leaf);
    }

    #[test]
    fn test_leaf_of_deep_tree_has_no_errors() {
        let mut err = ValidationError::new("leaf").with_path("/0");
        for depth in 1..64 {
            err = ValidationError::new(format!("level {depth}")).push(err);
        }
        let leaf = err.leaf();
        assert!(leaf.errors.is_empty());
        assert_eq!(leaf.message, "leaf");
    }

    #[test]
    fn test_validation_error_serialize_skips_empty() {
        let err = ValidationError::new("expected number").with_path("/age");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, json!({ "message": "expected number", "path": "/age" }));
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(ValidationError::new("bad").to_string(), "bad");
        assert_eq!(
            ValidationError::new("bad").with_path("/a").to_string(),
            "bad at /a"
        );
    }

    #[test]
    fn test_pattern_error_display() {
        let err = PatternError::NotPrecededBySeparator {
            pattern: "/a:b".into(),
            position: 2,
        };
        assert_eq!(
            err.to_string(),
            "parameter at position 2 in \"/a:b\" must follow a '/'"
        );
    }
}
