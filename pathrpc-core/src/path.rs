//! Path pattern compiler.
//!
//! Patterns are `/`-separated. `:name` captures one segment, `*name`
//! captures one or more segments, and a bare `*` at the end of a pattern
//! captures whatever remains (including nothing). `{...}` marks an optional
//! group and `\` makes the next character literal.
//!
//! ```
//! use pathrpc_core::Matcher;
//!
//! let matcher = Matcher::compile(["/users/:id", "/users/me", "/files/*path"]).unwrap();
//!
//! let hits: Vec<usize> = matcher.matches("/users/me").map(|m| m.index).collect();
//! assert_eq!(hits, [1, 0]);
//!
//! let file = matcher.matches("/files/a/b.txt").next().unwrap();
//! assert_eq!(file.params.get("path").unwrap().segments(), ["a", "b.txt"]);
//! ```

mod lex;
mod matcher;

use std::borrow::Cow;

pub use lex::lex;
pub use matcher::{Match, Matcher};

/// One token of a compiled pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathToken {
    Text(String),
    Param(String),
    /// `None` for a bare `*`.
    Wildcard(Option<String>),
    Group(Vec<PathToken>),
}

impl PathToken {
    /// Names of all parameters in `tokens`, in order of appearance.
    ///
    /// A bare wildcard is reported as `*`.
    pub fn param_names(tokens: &[PathToken]) -> Vec<String> {
        let mut names = Vec::new();
        collect_names(tokens, &mut names);
        names
    }

    fn is_text(&self) -> bool {
        matches!(self, PathToken::Text(_))
    }
}

fn collect_names(tokens: &[PathToken], names: &mut Vec<String>) {
    for token in tokens {
        match token {
            PathToken::Text(_) => {}
            PathToken::Param(name) | PathToken::Wildcard(Some(name)) => names.push(name.clone()),
            PathToken::Wildcard(None) => names.push(BARE_WILDCARD.to_string()),
            PathToken::Group(inner) => collect_names(inner, names),
        }
    }
}

/// Name under which a bare `*` is captured.
pub const BARE_WILDCARD: &str = "*";

/// A captured parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue<'a> {
    /// A `:name` capture.
    One(Cow<'a, str>),
    /// A wildcard capture, split on `/`.
    Many(Vec<Cow<'a, str>>),
}

impl ParamValue<'_> {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::One(value) => Some(value),
            ParamValue::Many(_) => None,
        }
    }

    /// The captured segments. A single capture is one segment.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            ParamValue::One(value) => vec![value.as_ref()],
            ParamValue::Many(values) => values.iter().map(AsRef::as_ref).collect(),
        }
    }
}

/// Parameters captured by one match, in pattern order.
///
/// Values borrow the request path unless percent-decoding changed them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params<'a> {
    entries: Vec<(&'a str, ParamValue<'a>)>,
}

impl<'a> Params<'a> {
    pub fn get(&self, name: &str) -> Option<&ParamValue<'a>> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &ParamValue<'a>)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &'a str, value: ParamValue<'a>) {
        self.entries.push((name, value));
    }
}
