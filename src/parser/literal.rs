//! Parser for the array literals embedded in upstream script payloads
//!
//! The payloads assign nested arrays of quoted strings and integers to script
//! variables. Only that subset is accepted: arrays, single or double quoted
//! strings, and integers. Empty elements (`[1,,2]`) keep their position as
//! [`Literal::Hole`]; a single trailing comma adds nothing. Anything else is
//! rejected with [`ExtractionError::Malformed`] rather than evaluated.

use crate::utils::error::ExtractionError;

/// Nesting limit for arrays
const MAX_DEPTH: usize = 32;

/// A parsed literal value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Array(Vec<Literal>),
    /// An elided array element, as in `[1,,2]`
    Hole,
}

impl Literal {
    /// Borrow as string, if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as array, if this is an array literal
    pub fn as_array(&self) -> Option<&[Literal]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Integer value; numeric strings are accepted too
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Array(_) | Self::Hole => None,
        }
    }

    /// Text value; integers are rendered in decimal
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Array(_) | Self::Hole => None,
        }
    }

    /// Short name of the literal kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Array(_) => "array",
            Self::Hole => "empty element",
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self, Self::Hole)
    }
}

/// Parse a complete literal
///
/// Only whitespace and an optional terminating `;` may follow the value.
pub fn parse_literal(src: &str) -> Result<Literal, ExtractionError> {
    let (value, consumed) = parse_prefix(src, 0)?;
    let rest = src[consumed..].trim_start();
    let rest = rest.strip_prefix(';').unwrap_or(rest);
    if !rest.trim().is_empty() {
        let offset = src.len() - rest.len();
        return Err(ExtractionError::Malformed {
            offset,
            reason: "unexpected trailing content".to_string(),
        });
    }
    Ok(value)
}

/// Parse one literal at the start of `src`
///
/// Returns the value and the number of bytes consumed. `base_offset` is added
/// to reported error offsets so they point into the enclosing document.
pub fn parse_prefix(src: &str, base_offset: usize) -> Result<(Literal, usize), ExtractionError> {
    let mut parser = Parser {
        src,
        pos: 0,
        base_offset,
    };
    parser.skip_ws();
    let value = parser.parse_value(0)?;
    Ok((value, parser.pos))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    base_offset: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, reason: impl Into<String>) -> ExtractionError {
        ExtractionError::Malformed {
            offset: self.base_offset + self.pos,
            reason: reason.into(),
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Literal, ExtractionError> {
        match self.peek() {
            Some('[') => self.parse_array(depth),
            Some(quote @ ('\'' | '"')) => self.parse_string(quote).map(Literal::Str),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_int(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_array(&mut self, depth: usize) -> Result<Literal, ExtractionError> {
        if depth >= MAX_DEPTH {
            return Err(self.error("arrays nested too deeply"));
        }
        self.bump(); // '['

        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(Literal::Array(items));
                }
                Some(',') => {
                    self.bump();
                    items.push(Literal::Hole);
                    continue;
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }

            items.push(self.parse_value(depth + 1)?);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {}
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{c}'"))),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, ExtractionError> {
        self.bump(); // opening quote

        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('u') => out.push(self.parse_unicode_escape()?),
                    Some(other) => out.push(other),
                    None => return Err(self.error("unterminated escape")),
                },
                Some('\n') => return Err(self.error("newline inside string")),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, ExtractionError> {
        let end = self.pos + 4;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code =
            u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid unicode escape"))?;
        let c = char::from_u32(code).ok_or_else(|| self.error("invalid unicode code point"))?;
        self.pos = end;
        Ok(c)
    }

    fn parse_int(&mut self) -> Result<Literal, ExtractionError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if matches!(self.peek(), Some('.' | 'e' | 'E')) {
            return Err(self.error("only integer numbers are supported"));
        }

        self.src[start..self.pos]
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|e| self.error(format!("invalid integer: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Literal {
        Literal::Str(v.to_string())
    }

    #[test]
    fn test_parse_nested_arrays() {
        let value = parse_literal("[['英格兰', \"英格蘭\", 'England', 1, [], []]]").unwrap();
        assert_eq!(
            value,
            Literal::Array(vec![Literal::Array(vec![
                s("英格兰"),
                s("英格蘭"),
                s("England"),
                Literal::Int(1),
                Literal::Array(vec![]),
                Literal::Array(vec![]),
            ])])
        );
    }

    #[test]
    fn test_empty_elements_and_trailing_comma() {
        let value = parse_literal("[1,,2,]").unwrap();
        assert_eq!(
            value,
            Literal::Array(vec![Literal::Int(1), Literal::Hole, Literal::Int(2)])
        );

        let value = parse_literal("[,'a',,]").unwrap();
        assert_eq!(
            value,
            Literal::Array(vec![Literal::Hole, s("a"), Literal::Hole])
        );
    }

    #[test]
    fn test_whitespace_and_terminator() {
        let value = parse_literal(" [\n\t1 ,\r\n 2 ] ;\n").unwrap();
        assert_eq!(value, Literal::Array(vec![Literal::Int(1), Literal::Int(2)]));
    }

    #[test]
    fn test_escapes() {
        let value = parse_literal(r#"['it\'s', "a\"b", '中']"#).unwrap();
        assert_eq!(value, Literal::Array(vec![s("it's"), s("a\"b"), s("中")]));
    }

    #[test]
    fn test_spaces_inside_strings_are_kept() {
        let value = parse_literal("['Premier League']").unwrap();
        assert_eq!(value, Literal::Array(vec![s("Premier League")]));
    }

    #[test]
    fn test_rejects_expressions() {
        let err = parse_literal("[1, alert(1)]").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { offset: 4, .. }));
    }

    #[test]
    fn test_rejects_floats() {
        assert!(parse_literal("[1.5]").is_err());
    }

    #[test]
    fn test_rejects_unterminated() {
        assert!(parse_literal("[1, 2").is_err());
        assert!(parse_literal("['abc]").is_err());
    }

    #[test]
    fn test_rejects_trailing_content() {
        assert!(parse_literal("[1]; var x = 2").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(40), "]".repeat(40));
        assert!(parse_literal(&deep).is_err());
    }

    #[test]
    fn test_prefix_reports_consumed_bytes() {
        let (value, consumed) = parse_prefix("[1, 2];\narrArea[1] = [];", 0).unwrap();
        assert_eq!(value, Literal::Array(vec![Literal::Int(1), Literal::Int(2)]));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_error_offset_includes_base() {
        let err = parse_prefix("[x]", 100).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Malformed {
                offset: 101,
                reason: "unexpected character 'x'".to_string()
            }
        );
    }

    #[test]
    fn test_lenient_conversions() {
        assert_eq!(s("42").to_i64(), Some(42));
        assert_eq!(Literal::Int(7).to_text(), Some("7".to_string()));
        assert_eq!(Literal::Array(vec![]).to_i64(), None);
        assert_eq!(Literal::Hole.to_text(), None);
    }
}
