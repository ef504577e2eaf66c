//! Compact URL-safe codec for structured query parameters.
//!
//! Plain query strings can only carry strings. Routes whose parameters
//! include numbers, booleans, arrays, or nested objects encode each
//! top-level member with this grammar instead:
//!
//! ```text
//! object    := "(" key ":" value ("," key ":" value)* ")" | "(:)"
//! array     := "(" [ element ("," element)* [","] ] ")"   ; empty element = hole
//! string    := "'" char* "'"                              ; "'" doubled
//! number    := ["-"] digits ["." digits] [("e"|"E") ["-"|"+"] digits]
//!            | "NaN" | "Infinity" | "-Infinity"
//! bigint    := ["-"] digits "n"
//! constant  := "true" | "false" | "null"
//! ```
//!
//! The top level is an ordinary `key=value&key=value` query string with
//! keys in ascending order, so equal objects always produce equal URLs.
//!
//! ```
//! use pathrpc_core::{query, Object, Value};
//!
//! let mut filter = Object::new();
//! filter.insert("tags".into(), Value::from(vec![Value::from("a"), Value::from("b")]));
//! filter.insert("limit".into(), Value::from(10));
//!
//! let encoded = query::encode(&filter, &[]);
//! assert_eq!(encoded, "limit=10&tags=('a','b')");
//! assert_eq!(query::decode_str(&encoded).unwrap(), filter);
//! ```

mod decode;
mod encode;

pub use decode::{decode, decode_str, decode_value};
pub use encode::{encode, encode_value};
