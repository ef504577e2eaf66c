use std::fmt::Write;

use url::form_urlencoded;

use crate::value::{Object, Value, format_number};

/// Encode an object as a `key=value&key=value` query string.
///
/// Members are written in ascending key order. Keys listed in
/// `skipped_keys` (typically path parameters) are left out.
pub fn encode(object: &Object, skipped_keys: &[&str]) -> String {
    let mut out = String::new();
    for (key, value) in object {
        if skipped_keys.contains(&key.as_str()) {
            continue;
        }
        if !out.is_empty() {
            out.push('&');
        }
        out.extend(form_urlencoded::byte_serialize(key.as_bytes()));
        out.push('=');
        write_value(value, &mut out);
    }
    out
}

/// Encode a single value (the right-hand side of `key=value`).
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::BigInt(n) => {
            let _ = write!(out, "{n}n");
        }
        Value::String(s) => {
            out.push('\'');
            for ch in s.chars() {
                write_char(ch, out);
            }
            out.push('\'');
        }
        Value::Array(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if let Some(item) = item {
                    write_value(item, out);
                }
            }
            // A trailing hole needs its own comma, since one trailing comma
            // is ignored by the decoder.
            if matches!(items.last(), Some(None)) {
                out.push(',');
            }
            out.push(')');
        }
        Value::Object(map) if map.is_empty() => out.push_str("(:)"),
        Value::Object(map) => {
            out.push('(');
            for (i, (key, member)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_key(key, out);
                out.push(':');
                write_value(member, out);
            }
            out.push(')');
        }
    }
}

fn write_key(key: &str, out: &mut String) {
    if key.is_empty() {
        out.push_str("~0");
        return;
    }
    for ch in key.chars() {
        match ch {
            '~' => out.push_str("~1"),
            ':' => out.push_str("~2"),
            '(' => out.push_str("~3"),
            ')' => out.push_str("~4"),
            ',' => out.push_str("~5"),
            other => write_char(other, out),
        }
    }
}

/// Escape one character of a string or key.
///
/// Characters that would break the surrounding query string are
/// percent-encoded, non-ASCII is percent-encoded as UTF-8, and everything
/// else is written as is.
fn write_char(ch: char, out: &mut String) {
    match ch {
        ' ' => out.push('+'),
        '\'' => out.push_str("''"),
        '#' | '%' | '&' | '+' => percent_encode(ch, out),
        // Not part of the grammar, but rejected by strict URI parsers.
        '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}' => percent_encode(ch, out),
        c if c.is_ascii_control() || !c.is_ascii() => percent_encode(c, out),
        c => out.push(c),
    }
}

fn percent_encode(ch: char, out: &mut String) {
    let mut buf = [0u8; 4];
    for byte in ch.encode_utf8(&mut buf).bytes() {
        let _ = write!(out, "%{byte:02X}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(members: Vec<(&str, Value)>) -> Value {
        Value::Object(members.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(encode_value(&Value::Null), "null");
        assert_eq!(encode_value(&Value::Bool(true)), "true");
        assert_eq!(encode_value(&Value::Bool(false)), "false");
        assert_eq!(encode_value(&Value::Number(1.5)), "1.5");
        assert_eq!(encode_value(&Value::Number(-0.0)), "0");
        assert_eq!(encode_value(&Value::Number(f64::INFINITY)), "Infinity");
        assert_eq!(encode_value(&Value::BigInt(-12)), "-12n");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(encode_value(&Value::from("a b")), "'a+b'");
        assert_eq!(encode_value(&Value::from("it's")), "'it''s'");
        assert_eq!(encode_value(&Value::from("1+1=2")), "'1%2B1=2'");
        assert_eq!(encode_value(&Value::from("#&%")), "'%23%26%25'");
        assert_eq!(encode_value(&Value::from("é")), "'%C3%A9'");
        assert_eq!(encode_value(&Value::from("a:(b),c")), "'a:(b),c'");
    }

    #[test]
    fn test_arrays_and_holes() {
        assert_eq!(encode_value(&Value::Array(vec![])), "()");
        assert_eq!(encode_value(&Value::from(vec![Value::from(1)])), "(1)");
        let sparse = Value::Array(vec![Some(Value::from(1)), None, Some(Value::from(3))]);
        assert_eq!(encode_value(&sparse), "(1,,3)");
        let trailing = Value::Array(vec![Some(Value::from(1)), None]);
        assert_eq!(encode_value(&trailing), "(1,,)");
        assert_eq!(encode_value(&Value::Array(vec![None])), "(,)");
    }

    #[test]
    fn test_objects_sorted_and_escaped() {
        assert_eq!(encode_value(&obj(vec![])), "(:)");
        let value = obj(vec![
            ("b", Value::from(2)),
            ("a", Value::from(1)),
            ("", Value::Null),
            ("x:y", Value::Bool(true)),
            ("~(,)", Value::Bool(false)),
        ]);
        assert_eq!(
            encode_value(&value),
            "(~0:null,a:1,b:2,x~2y:true,~1~3~5~4:false)"
        );
    }

    #[test]
    fn test_top_level_sorted_and_skipped() {
        let Value::Object(map) = obj(vec![
            ("z", Value::from("last")),
            ("id", Value::from("7")),
            ("a b", Value::from(1)),
        ]) else {
            unreachable!()
        };
        assert_eq!(encode(&map, &["id"]), "a+b=1&z='last'");
        assert_eq!(encode(&map, &[]), "a+b=1&id='7'&z='last'");
    }

    #[test]
    fn test_nested() {
        let value = obj(vec![(
            "range",
            obj(vec![
                ("from", Value::from(1)),
                ("to", Value::Array(vec![Some(Value::from("x")), None])),
            ]),
        )]);
        assert_eq!(encode_value(&value), "(range:(from:1,to:('x',,)))");
    }
}
