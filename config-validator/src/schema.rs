//! Structural schema for document trees.
//!
//! A dialect describes its documents as a static [`Shape`] and walks a parsed
//! [`Node`] against it. The walk only reports what is structurally off; each
//! dialect turns [`Violation`]s into findings with its own wording.

use std::collections::HashSet;

use crate::tree::{Member, Node, NodeValue, Position};

#[derive(Debug)]
pub enum Shape {
    /// Anything goes; contents are not inspected.
    Any,
    /// Strictly a string.
    Text,
    /// A string, or a number/boolean that a loosely typed dialect coerces to one.
    Scalar,
    Bool,
    Integer,
    Map(&'static [Field]),
    List(&'static Shape),
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
}

impl Field {
    pub const fn new(name: &'static str, shape: Shape) -> Self {
        Self { name, shape }
    }
}

impl Shape {
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Text | Self::Scalar => "string",
            Self::Bool => "boolean",
            Self::Integer => "integer",
            Self::Map(_) => "map",
            Self::List(_) => "list",
        }
    }

    /// Whether `node` has the right type for this shape. Null is accepted
    /// everywhere: both dialects treat an absent value as the zero value.
    fn accepts(&self, node: &Node) -> bool {
        match (self, &node.value) {
            (_, NodeValue::Null)
            | (Self::Any, _)
            | (Self::Text | Self::Scalar, NodeValue::String(_))
            | (Self::Scalar, NodeValue::Number(_) | NodeValue::Bool(_))
            | (Self::Bool, NodeValue::Bool(_))
            | (Self::Map(_), NodeValue::Object(_))
            | (Self::List(_), NodeValue::Array(_)) => true,
            (Self::Integer, NodeValue::Number(n)) => n.is_i64() || n.is_u64(),
            _ => false,
        }
    }
}

/// A structural problem found while walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation<'a> {
    UnrecognizedKey {
        key: &'a str,
        position: Position,
    },
    DuplicateKey {
        key: &'a str,
        position: Position,
    },
    IncorrectType {
        key: &'a str,
        want: &'static str,
        position: Position,
    },
}

/// Walk `node` against `shape`, collecting violations in document order.
///
/// `key` names the node for type-mismatch messages (list items inherit the
/// key of the list).
pub fn check<'a>(node: &'a Node, key: &'a str, shape: &Shape, out: &mut Vec<Violation<'a>>) {
    if !shape.accepts(node) {
        out.push(Violation::IncorrectType {
            key,
            want: shape.describe(),
            position: node.position,
        });
        return;
    }

    match (shape, &node.value) {
        (Shape::Map(fields), NodeValue::Object(members)) => check_members(members, fields, out),
        (Shape::List(item_shape), NodeValue::Array(items)) => {
            for item in items {
                check(item, key, item_shape, out);
            }
        }
        _ => {}
    }
}

fn check_members<'a>(members: &'a [Member], fields: &[Field], out: &mut Vec<Violation<'a>>) {
    let mut seen: HashSet<&str> = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.key.as_str()) {
            out.push(Violation::DuplicateKey {
                key: &member.key,
                position: member.key_position,
            });
        }
        match fields.iter().find(|f| f.name == member.key) {
            Some(field) => check(&member.value, &member.key, &field.shape, out),
            None => out.push(Violation::UnrecognizedKey {
                key: &member.key,
                position: member.key_position,
            }),
        }
    }
}
