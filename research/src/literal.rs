//! A small parser for the Python literal dialect found in run logs:
//! single or double quoted strings, `True`/`False`/`None`, tuples and
//! trailing commas. It only reads literals and never evaluates anything.
//!
//! Known gaps next to Python: integers must fit in 64 bits, complex numbers,
//! sets and bytes are rejected, and named escapes (`\N{...}`) are an error.
//! Containers nest at most [`MAX_DEPTH`] levels.

use serde_json::{Map, Number, Value};
use thiserror::Error;

pub const MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at column {column}")]
pub struct ParseError {
    pub message: String,
    pub column: usize,
}

/// Parses one literal spanning the whole input, surrounding whitespace aside.
pub fn parse(src: &str) -> Result<Value, ParseError> {
    let mut parser = Parser {
        chars: src.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Renders `s` as a single quoted Python string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            column: self.pos + 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", want, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", want))),
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(c @ ('{' | '[' | '(')) => {
                if self.depth == MAX_DEPTH {
                    return Err(self.error("nesting too deep"));
                }
                self.depth += 1;
                let value = match c {
                    '{' => self.dict(),
                    '[' => self.sequence('[', ']'),
                    _ => self.sequence('(', ')'),
                };
                self.depth -= 1;
                value
            }
            Some('\'' | '"') => self.strings(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.word(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> Result<Value, ParseError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key_at = self.pos;
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(true) => "True".to_string(),
                Value::Bool(false) => "False".to_string(),
                Value::Null => "None".to_string(),
                _ => {
                    return Err(ParseError {
                        message: "unhashable dict key".to_string(),
                        column: key_at + 1,
                    });
                }
            };

            self.skip_ws();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or '}' in dict"));
                }
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, ParseError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error(format!("expected ',' or '{}'", close)));
                }
            }
        }
    }

    /// Adjacent string literals concatenate, as in `'a' "b"`.
    fn strings(&mut self) -> Result<Value, ParseError> {
        let raw = self.string_prefix();
        let mut out = self.string(raw)?;
        loop {
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some('\'' | '"') => out.push_str(&self.string(false)?),
                Some(c) if is_string_prefix(c) && self.prefixed_string_ahead() => {
                    let raw = self.string_prefix();
                    out.push_str(&self.string(raw)?);
                }
                _ => {
                    self.pos = save;
                    return Ok(Value::String(out));
                }
            }
        }
    }

    fn string(&mut self, raw: bool) -> Result<String, ParseError> {
        let quote = match self.bump() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(self.error("expected string")),
        };

        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') if raw => {
                    // raw strings keep the backslash but still cannot end on an escaped quote
                    out.push('\\');
                    if let Some(c) = self.bump() {
                        out.push(c);
                    }
                }
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated string literal"));
        };
        match c {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(c),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                out.push(self.code_point(code)?);
            }
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(self.code_point(code)?);
            }
            'u' => {
                let code = self.hex_digits(4)?;
                out.push(self.code_point(code)?);
            }
            'U' => {
                let code = self.hex_digits(8)?;
                out.push(self.code_point(code)?);
            }
            'N' => {
                self.pos -= 2;
                return Err(self.error("named unicode escapes are not supported"));
            }
            // unknown escapes are kept verbatim
            c => {
                out.push('\\');
                out.push(c);
            }
        }
        Ok(())
    }

    fn hex_digits(&mut self, n: usize) -> Result<u32, ParseError> {
        let mut code = 0;
        for _ in 0..n {
            match self.peek().and_then(|d| d.to_digit(16)) {
                Some(d) => {
                    code = code * 16 + d;
                    self.pos += 1;
                }
                None => return Err(self.error("truncated escape sequence")),
            }
        }
        Ok(code)
    }

    fn code_point(&self, code: u32) -> Result<char, ParseError> {
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {:#x}", code)))
    }

    fn prefixed_string_ahead(&self) -> bool {
        let mut i = self.pos;
        while i < self.chars.len() && i < self.pos + 2 && is_string_prefix(self.chars[i]) {
            i += 1;
        }
        matches!(self.chars.get(i), Some('\'' | '"'))
    }

    /// Consumes `r`/`u` prefixes and reports whether the string is raw.
    fn string_prefix(&mut self) -> bool {
        let mut raw = false;
        while let Some(c) = self.peek().filter(|&c| is_string_prefix(c)) {
            raw |= matches!(c, 'r' | 'R');
            self.pos += 1;
        }
        raw
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        self.skip_ws();

        let digits_start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_'))
            || (matches!(self.peek(), Some('-' | '+'))
                && matches!(self.chars.get(self.pos - 1), Some('e' | 'E')))
        {
            self.pos += 1;
        }
        let text: String = self.chars[digits_start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        if text.is_empty() {
            return Err(ParseError {
                message: "expected number".to_string(),
                column: start + 1,
            });
        }

        let invalid = || ParseError {
            message: format!("invalid number '{}'", text),
            column: start + 1,
        };

        let radix = match text.get(..2).map(str::to_ascii_lowercase).as_deref() {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let n = i128::from_str_radix(&text[2..], radix).map_err(|_| invalid())?;
            let n = if negative { -n } else { n };
            return if let Ok(n) = i64::try_from(n) {
                Ok(Value::Number(n.into()))
            } else {
                u64::try_from(n)
                    .map(|n| Value::Number(n.into()))
                    .map_err(|_| invalid())
            };
        }

        if text.chars().all(|c| c.is_ascii_digit()) {
            if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
                return Err(invalid());
            }
            if negative {
                if let Ok(n) = format!("-{}", text).parse::<i64>() {
                    return Ok(Value::Number(n.into()));
                }
            } else if let Ok(n) = text.parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }

        let is_float = text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
            && text.chars().any(|c| c.is_ascii_digit());
        if !is_float {
            return Err(invalid());
        }
        let f: f64 = text.parse().map_err(|_| invalid())?;
        Number::from_f64(if negative { -f } else { f })
            .map(Value::Number)
            .ok_or_else(invalid)
    }

    fn word(&mut self) -> Result<Value, ParseError> {
        if self.prefixed_string_ahead() {
            return self.strings();
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => Err(ParseError {
                message: format!("'{}' is not a literal", word),
                column: start + 1,
            }),
        }
    }
}

fn is_string_prefix(c: char) -> bool {
    matches!(c, 'r' | 'R' | 'u' | 'U')
}
