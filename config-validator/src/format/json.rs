//! Position-tracking JSON reader.
//!
//! `serde_json::Value` drops source positions and collapses duplicate keys,
//! both of which the declarative dialect reports on. This reader builds a
//! [`Node`] tree instead. It runs after `serde_json` has accepted the text,
//! so its own error path only guards against inputs the two disagree on.
//!
//! Columns are byte-based to line up with `serde_json::Error::column`.

use serde_json::Number;
use thiserror::Error;

use crate::tree::{Member, Node, NodeValue, Position};

/// Same nesting cap `serde_json` applies by default.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected JSON input at line {line}, column {column}")]
pub struct TreeError {
    pub line: usize,
    pub column: usize,
}

/// Parse a complete JSON document into a positioned tree.
///
/// # Errors
///
/// Returns `TreeError` at the first byte that does not fit the JSON grammar,
/// including trailing non-whitespace after the document.
pub fn parse_tree(content: &str) -> Result<Node, TreeError> {
    let mut cursor = Cursor::new(content);
    let node = cursor.value(0)?;
    cursor.skip_whitespace();
    if cursor.peek().is_some() {
        return Err(cursor.error());
    }
    Ok(node)
}

struct Cursor<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.offset).copied()
    }

    fn position(&self) -> Position {
        Position::at(self.line, self.column)
    }

    fn error(&self) -> TreeError {
        TreeError {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) {
        if let Some(b) = self.peek() {
            self.offset += 1;
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.bump();
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), TreeError> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn value(&mut self, depth: usize) -> Result<Node, TreeError> {
        self.skip_whitespace();
        let position = self.position();
        let value = match self.peek() {
            Some(b'{') => self.object(depth)?,
            Some(b'[') => self.array(depth)?,
            Some(b'"') => NodeValue::String(self.string()?),
            Some(b't') => self.literal("true", NodeValue::Bool(true))?,
            Some(b'f') => self.literal("false", NodeValue::Bool(false))?,
            Some(b'n') => self.literal("null", NodeValue::Null)?,
            Some(b'-' | b'0'..=b'9') => NodeValue::Number(self.number()?),
            _ => return Err(self.error()),
        };
        Ok(Node::new(value, position))
    }

    fn object(&mut self, depth: usize) -> Result<NodeValue, TreeError> {
        if depth >= MAX_DEPTH {
            return Err(self.error());
        }
        self.expect(b'{')?;
        let mut members = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.bump();
            return Ok(NodeValue::Object(members));
        }
        loop {
            self.skip_whitespace();
            let key_position = self.position();
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            let value = self.value(depth + 1)?;
            members.push(Member {
                key,
                key_position,
                value,
            });
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b'}') => {
                    self.bump();
                    return Ok(NodeValue::Object(members));
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<NodeValue, TreeError> {
        if depth >= MAX_DEPTH {
            return Err(self.error());
        }
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.bump();
            return Ok(NodeValue::Array(items));
        }
        loop {
            items.push(self.value(depth + 1)?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b']') => {
                    self.bump();
                    return Ok(NodeValue::Array(items));
                }
                _ => return Err(self.error()),
            }
        }
    }

    /// Read a string literal; escapes are decoded by `serde_json`.
    fn string(&mut self) -> Result<String, TreeError> {
        let start = self.offset;
        let position = self.error();
        self.expect(b'"')?;
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'\n') | None => return Err(self.error()),
                Some(_) => self.bump(),
            }
        }
        serde_json::from_str(&self.src[start..self.offset]).map_err(|_| position)
    }

    fn number(&mut self) -> Result<Number, TreeError> {
        let start = self.offset;
        let position = self.error();
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
        ) {
            self.bump();
        }
        self.src[start..self.offset]
            .parse::<Number>()
            .map_err(|_| position)
    }

    fn literal(&mut self, word: &str, value: NodeValue) -> Result<NodeValue, TreeError> {
        if self.src[self.offset..].starts_with(word) {
            for _ in 0..word.len() {
                self.bump();
            }
            Ok(value)
        } else {
            Err(self.error())
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_of_keys_and_values() {
        let content = "{\n  \"ignition\": {\n    \"version\": \"2.2.0\"\n  }\n}";
        let tree = parse_tree(content).unwrap();
        assert_eq!(tree.position, Position::at(1, 1));

        let members = tree.members().unwrap();
        assert_eq!(members[0].key, "ignition");
        assert_eq!(members[0].key_position, Position::at(2, 3));
        assert_eq!(members[0].value.position, Position::at(2, 15));

        let version = &members[0].value.members().unwrap()[0];
        assert_eq!(version.key_position, Position::at(3, 5));
        assert_eq!(version.value.as_str(), Some("2.2.0"));
        assert_eq!(version.value.position, Position::at(3, 16));
    }

    #[test]
    fn test_duplicate_keys_are_kept_in_order() {
        let tree = parse_tree(r#"{"a": 1, "a": 2}"#).unwrap();
        let members = tree.members().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].value.as_i64(), Some(1));
        assert_eq!(members[1].value.as_i64(), Some(2));
        assert_eq!(members[1].key_position, Position::at(1, 10));
    }

    #[test]
    fn test_decodes_escapes_and_scalars() {
        let tree = parse_tree(r#"[ "a\"b\u00e9", -1.5e3, true, false, null, [], {} ]"#).unwrap();
        let items = tree.items().unwrap();
        assert_eq!(items[0].as_str(), Some("a\"b\u{e9}"));
        assert_eq!(items[1].scalar_text(), Some("-1500.0".to_owned()));
        assert_eq!(items[2].value, NodeValue::Bool(true));
        assert_eq!(items[3].value, NodeValue::Bool(false));
        assert_eq!(items[4].value, NodeValue::Null);
        assert_eq!(items[5].items().map(<[Node]>::len), Some(0));
        assert_eq!(items[6].members().map(<[Member]>::len), Some(0));
    }

    #[test]
    fn test_rejects_trailing_content() {
        let err = parse_tree("{} x").unwrap_err();
        assert_eq!(err, TreeError { line: 1, column: 4 });
    }

    #[test]
    fn test_rejects_unterminated_object() {
        assert!(parse_tree("{\"a\": 1").is_err());
        assert!(parse_tree("{\"a\" 1}").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(200), "]".repeat(200));
        assert!(parse_tree(&deep).is_err());
    }
}
