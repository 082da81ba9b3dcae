//! Position-annotated document tree shared by the dialect validators.
//!
//! JSON documents are parsed straight into this tree (see `format::json`);
//! YAML documents are deserialized first and then annotated from a line index
//! (see `format::yaml`). Object members keep source order and duplicates.

use serde_json::Number;

/// Source position of a node, 1-indexed. Either part may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Position {
    pub const fn at(line: usize, column: usize) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
        }
    }

    pub const fn line(line: usize) -> Self {
        Self {
            line: Some(line),
            column: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Node>),
    Object(Vec<Member>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: NodeValue,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub key: String,
    pub key_position: Position,
    pub value: Node,
}

impl Node {
    pub const fn new(value: NodeValue, position: Position) -> Self {
        Self { value, position }
    }

    /// First member named `key`, if this node is an object.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.members()?
            .iter()
            .find(|m| m.key == key)
            .map(|m| &m.value)
    }

    pub fn members(&self) -> Option<&[Member]> {
        match &self.value {
            NodeValue::Object(members) => Some(members),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Node]> {
        match &self.value {
            NodeValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            NodeValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Scalar rendered as text: strings as-is, numbers and booleans via their
    /// literal form. `None` for null and containers.
    pub fn scalar_text(&self) -> Option<String> {
        match &self.value {
            NodeValue::String(s) => Some(s.clone()),
            NodeValue::Number(n) => Some(n.to_string()),
            NodeValue::Bool(b) => Some(b.to_string()),
            NodeValue::Null | NodeValue::Array(_) | NodeValue::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: NodeValue) -> Node {
        Node::new(value, Position::default())
    }

    #[test]
    fn test_get_returns_first_duplicate() {
        let node = leaf(NodeValue::Object(vec![
            Member {
                key: "name".to_owned(),
                key_position: Position::at(1, 2),
                value: leaf(NodeValue::String("first".to_owned())),
            },
            Member {
                key: "name".to_owned(),
                key_position: Position::at(2, 2),
                value: leaf(NodeValue::String("second".to_owned())),
            },
        ]));
        assert_eq!(node.get("name").and_then(Node::as_str), Some("first"));
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(
            leaf(NodeValue::Number(Number::from(420))).scalar_text(),
            Some("420".to_owned())
        );
        assert_eq!(
            leaf(NodeValue::Bool(false)).scalar_text(),
            Some("false".to_owned())
        );
        assert_eq!(leaf(NodeValue::Null).scalar_text(), None);
        assert_eq!(leaf(NodeValue::Array(vec![])).scalar_text(), None);
    }
}
