//! Parser for the Python-style literals embedded in page attributes.
//!
//! Supports strings, numbers, `True`/`False`/`None` (and their JSON
//! spellings), lists, tuples and string-keyed dicts. Tuples become arrays.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LiteralError {
    #[error("unexpected end of literal")]
    UnexpectedEnd,

    #[error("unexpected character `{found}` at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("dict keys must be strings (offset {0})")]
    NonStringKey(usize),

    #[error("trailing input at offset {0}")]
    TrailingInput(usize),
}

/// Parses exactly one literal; surrounding whitespace is allowed.
pub fn parse(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        chars: input.char_indices().collect(),
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(value),
        Some(_) => Err(LiteralError::TrailingInput(parser.offset())),
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map_or_else(
            || self.chars.last().map_or(0, |&(i, c)| i + c.len_utf8()),
            |&(i, _)| i,
        )
    }

    fn bump(&mut self) -> Result<char, LiteralError> {
        let c = self.peek().ok_or(LiteralError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(c)
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(found) => LiteralError::Unexpected {
                found,
                offset: self.offset(),
            },
            None => LiteralError::UnexpectedEnd,
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some('\'' | '"') => self.string().map(Value::String),
            Some('[') => self.sequence(']').map(Value::Array),
            Some('(') => self.sequence(')').map(Value::Array),
            Some('{') => self.dict().map(Value::Object),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => self.keyword(),
            _ => Err(self.unexpected()),
        }
    }

    fn sequence(&mut self, close: char) -> Result<Vec<Value>, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn dict(&mut self) -> Result<Map<String, Value>, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(map);
            }
            let key_offset = self.offset();
            let Value::String(key) = self.value()? else {
                return Err(LiteralError::NonStringKey(key_offset));
            };
            self.skip_ws();
            if self.peek() != Some(':') {
                return Err(self.unexpected());
            }
            self.pos += 1;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            let c = self.bump()?;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escape_offset = self.offset();
            match self.bump()? {
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                '/' => out.push('/'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'x' => out.push(self.hex_char(2, escape_offset)?),
                'u' => out.push(self.hex_char(4, escape_offset)?),
                '\n' => {}
                _ => return Err(LiteralError::InvalidEscape(escape_offset)),
            }
        }
    }

    fn hex_char(&mut self, digits: usize, offset: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self
                .bump()?
                .to_digit(16)
                .ok_or(LiteralError::InvalidEscape(offset))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LiteralError::InvalidEscape(offset))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
        {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos]
            .iter()
            .map(|&(_, c)| c)
            .filter(|&c| c != '_')
            .collect();

        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or(LiteralError::InvalidNumber(raw))
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let start_offset = self.offset();
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => Err(LiteralError::Unexpected {
                found: word.chars().next().unwrap_or(' '),
                offset: start_offset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_structures() {
        let value = parse("('a', 2, [1.5, None], {'k': True,},)").unwrap();
        assert_eq!(value, json!(["a", 2, [1.5, null], {"k": true}]));
    }

    #[test]
    fn handles_both_quote_styles_and_escapes() {
        assert_eq!(parse(r#""it's""#).unwrap(), json!("it's"));
        assert_eq!(parse(r"'say \'hi\''").unwrap(), json!("say 'hi'"));
        assert_eq!(parse(r"'\x41é'").unwrap(), json!("Aé"));
    }

    #[test]
    fn accepts_json_keywords() {
        assert_eq!(parse("[true, false, null]").unwrap(), json!([true, false, null]));
    }

    #[test]
    fn rejects_unterminated_input() {
        assert_eq!(parse("['a'"), Err(LiteralError::UnexpectedEnd));
        assert_eq!(parse("'abc"), Err(LiteralError::UnexpectedEnd));
    }

    #[test]
    fn rejects_trailing_input() {
        assert_eq!(parse("[1] x"), Err(LiteralError::TrailingInput(4)));
    }

    #[test]
    fn rejects_non_string_keys() {
        assert_eq!(parse("{1: 'a'}"), Err(LiteralError::NonStringKey(1)));
    }

    #[test]
    fn rejects_identifiers() {
        assert!(matches!(
            parse("[foo]"),
            Err(LiteralError::Unexpected { found: 'f', offset: 1 })
        ));
    }
}
