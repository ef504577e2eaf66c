use super::PathToken;
use crate::error::PatternError;

/// Tokenize a path pattern.
///
/// Adjacent literal characters are merged into one [`PathToken::Text`].
pub fn lex(pattern: &str) -> Result<Vec<PathToken>, PatternError> {
    Lexer::new(pattern).run()
}

struct Lexer<'a> {
    pattern: &'a str,
    text: String,
    /// Open groups: start position and the tokens of the enclosing level.
    stack: Vec<(usize, Vec<PathToken>)>,
    tokens: Vec<PathToken>,
    /// Last literal character written, across group boundaries.
    last_literal: Option<char>,
    /// Position of a parameter that still needs a trailing `/`.
    pending_separator: Option<usize>,
}

impl<'a> Lexer<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            text: String::new(),
            stack: Vec::new(),
            tokens: Vec::new(),
            last_literal: None,
            pending_separator: None,
        }
    }

    fn run(mut self) -> Result<Vec<PathToken>, PatternError> {
        let mut chars = self.pattern.char_indices().peekable();
        while let Some((position, ch)) = chars.next() {
            match ch {
                '\\' => {
                    let Some((_, escaped)) = chars.next() else {
                        return Err(PatternError::DanglingEscape {
                            pattern: self.pattern.to_string(),
                        });
                    };
                    self.literal(escaped)?;
                }
                ':' | '*' => {
                    if self.last_literal != Some('/') {
                        return Err(PatternError::NotPrecededBySeparator {
                            pattern: self.pattern.to_string(),
                            position,
                        });
                    }
                    let start = position + 1;
                    let mut end = start;
                    while let Some(&(i, c)) = chars.peek() {
                        if !(c.is_ascii_alphanumeric() || c == '_') {
                            break;
                        }
                        end = i + c.len_utf8();
                        chars.next();
                    }
                    let name = &self.pattern[start..end];
                    let token = match (ch, name.is_empty()) {
                        (':', true) => {
                            return Err(PatternError::MissingName {
                                pattern: self.pattern.to_string(),
                                position,
                            });
                        }
                        (':', false) => PathToken::Param(name.to_string()),
                        (_, true) => PathToken::Wildcard(None),
                        (_, false) => PathToken::Wildcard(Some(name.to_string())),
                    };
                    self.flush_text();
                    self.tokens.push(token);
                    self.last_literal = None;
                    self.pending_separator = Some(position);
                }
                '{' => {
                    self.flush_text();
                    let outer = std::mem::take(&mut self.tokens);
                    self.stack.push((position, outer));
                }
                '}' => {
                    self.flush_text();
                    let Some((_, outer)) = self.stack.pop() else {
                        return Err(PatternError::UnexpectedGroupEnd {
                            pattern: self.pattern.to_string(),
                            position,
                        });
                    };
                    let group = std::mem::replace(&mut self.tokens, outer);
                    self.tokens.push(PathToken::Group(group));
                }
                other => self.literal(other)?,
            }
        }

        if let Some(&(position, _)) = self.stack.last() {
            return Err(PatternError::UnterminatedGroup {
                pattern: self.pattern.to_string(),
                position,
            });
        }
        self.flush_text();
        Ok(self.tokens)
    }

    fn literal(&mut self, ch: char) -> Result<(), PatternError> {
        if let Some(param) = self.pending_separator.take() {
            if ch != '/' {
                return Err(PatternError::NotFollowedBySeparator {
                    pattern: self.pattern.to_string(),
                    position: param,
                });
            }
        }
        self.text.push(ch);
        self.last_literal = Some(ch);
        Ok(())
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.tokens.push(PathToken::Text(std::mem::take(&mut self.text)));
        }
    }
}
