use url::form_urlencoded;

use crate::error::{DecodeError, SyntaxError};
use crate::value::{Object, Value};

/// Decode already URL-decoded `(key, value)` pairs into an object.
///
/// A repeated key keeps its last value.
pub fn decode<I, K, V>(pairs: I) -> Result<Object, DecodeError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut object = Object::new();
    for (key, value) in pairs {
        let (key, value) = (key.as_ref(), value.as_ref());
        let decoded = decode_value(value).map_err(|source| DecodeError {
            key: key.to_string(),
            value: value.to_string(),
            source,
        })?;
        object.insert(key.to_string(), decoded);
    }
    Ok(object)
}

/// Decode a raw (still URL-encoded) query string.
pub fn decode_str(query: &str) -> Result<Object, DecodeError> {
    decode(form_urlencoded::parse(query.as_bytes()))
}

/// Decode a single value.
pub fn decode_value(input: &str) -> Result<Value, SyntaxError> {
    let mut parser = Parser::new(input);
    let value = parser.parse_value()?;
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Recursive-descent parser over one value.
///
/// `pos` is a byte offset into `input`. Every token the grammar branches on
/// is ASCII, so `pos` always sits on a character boundary.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.pos)
    }

    fn expect(&mut self, byte: u8) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected '{}', found '{}'",
                byte as char, b as char
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", byte as char))),
        }
    }

    fn parse_value(&mut self) -> Result<Value, SyntaxError> {
        match self.peek() {
            None | Some(b',') | Some(b')') => Err(self.error("expected a value")),
            Some(b'\'') => self.parse_string().map(Value::String),
            Some(b'(') => {
                if self.is_object()? {
                    self.parse_object()
                } else {
                    self.parse_array()
                }
            }
            Some(b'-' | b'0'..=b'9' | b'I' | b'N') => self.parse_number(),
            Some(_) => self.parse_constant(),
        }
    }

    fn parse_string(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        self.expect(b'\'')?;
        let mut out = String::new();
        loop {
            let Some(offset) = self.rest().find('\'') else {
                self.pos = start;
                return Err(self.error("unterminated string"));
            };
            out.push_str(&self.rest()[..offset]);
            self.pos += offset + 1;
            if self.peek() == Some(b'\'') {
                out.push('\'');
                self.pos += 1;
            } else {
                return Ok(out);
            }
        }
    }

    /// Decide whether the parenthesised value at `pos` is an object.
    ///
    /// Scans for a `:` at nesting depth zero, outside quotes, before the
    /// first top-level `,` or `)`.
    fn is_object(&self) -> Result<bool, SyntaxError> {
        let bytes = self.input.as_bytes();
        let mut depth = 0usize;
        let mut i = self.pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\'' => {
                    let quote = i;
                    i += 1;
                    loop {
                        match bytes.get(i) {
                            None => return Err(SyntaxError::new("unterminated string", quote)),
                            Some(b'\'') if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                            Some(b'\'') => break,
                            Some(_) => i += 1,
                        }
                    }
                }
                b'(' => depth += 1,
                b')' if depth == 0 => return Ok(false),
                b')' => depth -= 1,
                b',' if depth == 0 => return Ok(false),
                b':' if depth == 0 => return Ok(true),
                _ => {}
            }
            i += 1;
        }
        Err(self.error("unterminated array or object"))
    }

    fn parse_object(&mut self) -> Result<Value, SyntaxError> {
        self.expect(b'(')?;
        let mut object = Object::new();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.expect(b')')?;
            return Ok(Value::Object(object));
        }
        loop {
            let key = self.parse_key()?;
            self.expect(b':')?;
            let value = self.parse_value()?;
            object.insert(key, value);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::Object(object));
                }
                Some(_) => return Err(self.error("expected ',' or ')' after object member")),
                None => return Err(self.error("unterminated object")),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        let end = self
            .rest()
            .find([':', ',', '(', ')'])
            .map_or(self.input.len(), |offset| self.pos + offset);
        let raw = &self.input[start..end];
        if raw.is_empty() {
            return Err(self.error("empty key"));
        }
        self.pos = end;
        if raw == "~0" {
            return Ok(String::new());
        }

        let mut key = String::with_capacity(raw.len());
        let mut chars = raw.char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '~' => {
                    let escaped = match chars.next() {
                        Some((_, '1')) => '~',
                        Some((_, '2')) => ':',
                        Some((_, '3')) => '(',
                        Some((_, '4')) => ')',
                        Some((_, '5')) => ',',
                        _ => return Err(SyntaxError::new("invalid key escape", start + offset)),
                    };
                    key.push(escaped);
                }
                '\'' => {
                    // Quotes in keys are doubled like in strings.
                    if chars.peek().map(|&(_, c)| c) == Some('\'') {
                        chars.next();
                    }
                    key.push('\'');
                }
                other => key.push(other),
            }
        }
        Ok(key)
    }

    fn parse_array(&mut self) -> Result<Value, SyntaxError> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(b',') => {
                    items.push(None);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated array")),
                Some(_) => {
                    items.push(Some(self.parse_value()?));
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(Value::Array(items));
                        }
                        Some(_) => return Err(self.error("expected ',' or ')' after array element")),
                        None => return Err(self.error("unterminated array")),
                    }
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, SyntaxError> {
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        if self.rest().starts_with("Infinity") {
            self.pos += "Infinity".len();
            return Ok(Value::Number(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }));
        }
        if !negative && self.rest().starts_with("NaN") {
            self.pos += "NaN".len();
            return Ok(Value::Number(f64::NAN));
        }

        if self.skip_digits() == 0 {
            return Err(self.error("expected digits"));
        }
        let mut integral = true;
        if self.peek() == Some(b'.') {
            integral = false;
            self.pos += 1;
            if self.skip_digits() == 0 {
                return Err(self.error("expected digits after '.'"));
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            integral = false;
            self.pos += 1;
            if matches!(self.peek(), Some(b'-' | b'+')) {
                self.pos += 1;
            }
            if self.skip_digits() == 0 {
                return Err(self.error("expected digits in exponent"));
            }
        }

        let text = &self.input[start..self.pos];
        if self.peek() == Some(b'n') {
            if !integral {
                return Err(self.error("bigint must be an integer"));
            }
            let value = text
                .parse::<i128>()
                .map_err(|_| SyntaxError::new("bigint out of range", start))?;
            self.pos += 1;
            return Ok(Value::BigInt(value));
        }
        text.parse::<f64>()
            .map(Value::Number)
            .map_err(|_| SyntaxError::new("invalid number", start))
    }

    fn skip_digits(&mut self) -> usize {
        let count = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        self.pos += count;
        count
    }

    fn parse_constant(&mut self) -> Result<Value, SyntaxError> {
        let start = self.pos;
        let len = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let word = &self.input[start..start + len];
        let value = match word {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            "" => {
                let ch = self.rest().chars().next().unwrap_or_default();
                return Err(self.error(format!("unexpected character {ch:?}")));
            }
            other => return Err(self.error(format!("unknown constant {other:?}"))),
        };
        self.pos += len;
        Ok(value)
    }
}
