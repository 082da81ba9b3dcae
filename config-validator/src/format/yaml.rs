//! YAML reader for cloud-config bodies.
//!
//! Values come from `serde-saphyr` (deserialized into `serde_json::Value`);
//! positions come from [`LineIndex`], a scan of block-style keys over the
//! source text. Keys inside flow collections (`{a: 1}`) are not indexed and
//! inherit the line of their nearest indexed ancestor.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::report::FindingEntry;
use crate::tree::{Member, Node, NodeValue, Position};

/// `line N` (optionally followed by `column M`) in a parser message.
static LINE_IN_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"line (\d+)(?:,?\s*col(?:umn)? (\d+))?") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid parser message regex: {err}"),
    }
});

/// A block mapping key at the start of a line: bare, single- or double-quoted.
static BLOCK_KEY: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(concat!(
        r#"^("[^"]*"|'[^']*'"#,                   // quoted key
        r#"|[^\s#'"\[\]{},&*!|>%@`-][^:#]*?"#, // bare key
        r"|-[^\s:#][^:#]*?)",                    // bare key starting with '-'
        r"\s*:(?:\s+(.*))?$",                    // separator and inline value
    )) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid block key regex: {err}"),
    }
});

/// Parse a YAML document into a positioned tree.
///
/// Returns `Ok(None)` when the document has no content (blank, comments only,
/// or an explicit null).
///
/// # Errors
///
/// A syntax error becomes a single `Error` finding positioned at the line the
/// parser reported, or line 1 when it reported none.
pub fn parse_document(content: &str) -> Result<Option<Node>, FindingEntry> {
    if !has_content(content) {
        return Ok(None);
    }

    let value: Value = serde_saphyr::from_str(content).map_err(|e| parse_error_finding(&e))?;
    if value.is_null() {
        return Ok(None);
    }

    let index = LineIndex::build(content);
    Ok(Some(annotate(&value, "", &index)))
}

fn has_content(content: &str) -> bool {
    content.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#') && trimmed != "---" && trimmed != "..."
    })
}

fn parse_error_finding(err: &impl std::fmt::Display) -> FindingEntry {
    let message = err.to_string();
    let (line, column) = LINE_IN_MESSAGE
        .captures(&message)
        .map_or((1, None), |caps| {
            let line = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            let column = caps.get(2).and_then(|m| m.as_str().parse().ok());
            (line, column)
        });
    FindingEntry::error(message).at(Some(line), column)
}

fn annotate(value: &Value, path: &str, index: &LineIndex) -> Node {
    let position = index.locate(path);
    let value = match value {
        Value::Null => NodeValue::Null,
        Value::Bool(b) => NodeValue::Bool(*b),
        Value::Number(n) => NodeValue::Number(n.clone()),
        Value::String(s) => NodeValue::String(s.clone()),
        Value::Array(items) => NodeValue::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| annotate(item, &index_path(path, i), index))
                .collect(),
        ),
        Value::Object(map) => NodeValue::Object(
            map.iter()
                .map(|(key, val)| {
                    let child = key_path(path, key);
                    Member {
                        key: key.clone(),
                        key_position: index.locate(&child),
                        value: annotate(val, &child, index),
                    }
                })
                .collect(),
        ),
    };
    Node::new(value, position)
}

fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}.{key}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Item(usize),
}

#[derive(Debug)]
struct Frame {
    indent: usize,
    segment: Segment,
    /// A key whose value continues on the following lines.
    open: bool,
}

/// Line numbers of block mapping keys and sequence items, keyed by path
/// (`coreos.units[0].name`).
#[derive(Debug, Default)]
pub struct LineIndex {
    lines: HashMap<String, usize>,
}

impl LineIndex {
    pub fn build(content: &str) -> Self {
        let mut index = Self::default();
        let mut stack: Vec<Frame> = Vec::new();
        // Indent of a key that introduced a block scalar (`|`, `>`).
        let mut block_scalar: Option<usize> = None;

        for (line_no, raw) in content.lines().enumerate().map(|(i, l)| (i + 1, l)) {
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            let text = raw.trim();

            if let Some(scalar_indent) = block_scalar {
                if text.is_empty() || indent > scalar_indent {
                    continue;
                }
                block_scalar = None;
            }
            if text.is_empty() || text.starts_with('#') || text == "---" || text == "..." {
                continue;
            }

            let mut column = indent;
            let mut rest = text;
            while rest == "-" || rest.starts_with("- ") {
                index.push_item(&mut stack, column, line_no);
                let after = &rest[1..];
                let trimmed = after.trim_start();
                column += 1 + after.len() - trimmed.len();
                rest = trimmed;
            }

            if let Some(caps) = BLOCK_KEY.captures(rest) {
                let key = unquote(caps.get(1).map_or("", |m| m.as_str()));
                let value = caps.get(2).map_or("", |m| m.as_str().trim());
                let open = value.is_empty() || value.starts_with('#');
                index.push_key(&mut stack, column, key, open, line_no);
                if value.starts_with('|') || value.starts_with('>') {
                    block_scalar = Some(column);
                }
            }
        }
        index
    }

    fn push_item(&mut self, stack: &mut Vec<Frame>, indent: usize, line_no: usize) {
        let mut next = 0;
        while let Some(top) = stack.last() {
            let same_level_open_key =
                top.indent == indent && top.open && matches!(top.segment, Segment::Key(_));
            if top.indent < indent || same_level_open_key {
                break;
            }
            if let (true, Segment::Item(i)) = (top.indent == indent, &top.segment) {
                next = i + 1;
            }
            stack.pop();
        }
        stack.push(Frame {
            indent,
            segment: Segment::Item(next),
            open: true,
        });
        self.record(stack, line_no);
    }

    fn push_key(
        &mut self,
        stack: &mut Vec<Frame>,
        indent: usize,
        key: String,
        open: bool,
        line_no: usize,
    ) {
        // A key on a dash line sits at a larger column than its dash, so any
        // frame at this indent or deeper is a finished sibling.
        while stack.last().is_some_and(|top| top.indent >= indent) {
            stack.pop();
        }
        stack.push(Frame {
            indent,
            segment: Segment::Key(key),
            open,
        });
        self.record(stack, line_no);
    }

    fn record(&mut self, stack: &[Frame], line_no: usize) {
        let mut path = String::new();
        for frame in stack {
            path = match &frame.segment {
                Segment::Key(key) => key_path(&path, key),
                Segment::Item(i) => index_path(&path, *i),
            };
        }
        self.lines.entry(path).or_insert(line_no);
    }

    /// Line of `path`, falling back to its nearest indexed ancestor.
    pub fn locate(&self, path: &str) -> Position {
        let mut current = path;
        loop {
            if let Some(&line) = self.lines.get(current) {
                return Position::line(line);
            }
            match current.rfind(['.', '[']) {
                Some(cut) => current = &current[..cut],
                None => return Position::line(1),
            }
        }
    }
}

fn unquote(key: &str) -> String {
    let stripped = key
        .strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .or_else(|| key.strip_prefix('\'').and_then(|k| k.strip_suffix('\'')));
    stripped.unwrap_or(key).to_owned()
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#cloud-config
hostname: core-01
coreos:
  units:
    - name: etcd.service
      command: start
    - name: fleet.service
      content: |
        [Unit]
        name: not-a-key
      command: start
users:
- name: core
  groups:
    - sudo
";

    #[test]
    fn test_line_index_paths() {
        let index = LineIndex::build(SAMPLE);
        assert_eq!(index.locate("hostname"), Position::line(2));
        assert_eq!(index.locate("coreos"), Position::line(3));
        assert_eq!(index.locate("coreos.units"), Position::line(4));
        assert_eq!(index.locate("coreos.units[0]"), Position::line(5));
        assert_eq!(index.locate("coreos.units[0].command"), Position::line(6));
        assert_eq!(index.locate("coreos.units[1].name"), Position::line(7));
        assert_eq!(index.locate("coreos.units[1].command"), Position::line(11));
        assert_eq!(index.locate("users[0].name"), Position::line(13));
        assert_eq!(index.locate("users[0].groups[0]"), Position::line(15));
    }

    #[test]
    fn test_block_scalar_lines_are_not_keys() {
        let index = LineIndex::build(SAMPLE);
        assert_eq!(
            index.locate("coreos.units[1].content.name"),
            Position::line(8)
        );
    }

    #[test]
    fn test_unindexed_paths_fall_back_to_ancestor() {
        let index = LineIndex::build("a:\n  b: {c: 1}\n");
        assert_eq!(index.locate("a.b.c"), Position::line(2));
        assert_eq!(index.locate("zzz"), Position::line(1));
    }

    #[test]
    fn test_key_after_same_indent_sequence() {
        let index = LineIndex::build("users:\n- name: core\n- name: ops\nhostname: x\n");
        assert_eq!(index.locate("users[1].name"), Position::line(3));
        assert_eq!(index.locate("hostname"), Position::line(4));
    }

    #[test]
    fn test_quoted_keys() {
        let index = LineIndex::build("\"quoted key\": 1\n'single': 2\n");
        assert_eq!(index.locate("quoted key"), Position::line(1));
        assert_eq!(index.locate("single"), Position::line(2));
    }

    #[test]
    fn test_parse_document_annotates_values() {
        let node = parse_document(SAMPLE).unwrap().unwrap();
        let hostname = node.get("hostname").unwrap();
        assert_eq!(hostname.as_str(), Some("core-01"));
        assert_eq!(hostname.position, Position::line(2));

        let units = node.get("coreos").and_then(|c| c.get("units")).unwrap();
        let second = &units.items().unwrap()[1];
        assert_eq!(second.get("command").unwrap().position, Position::line(11));
    }

    #[test]
    fn test_parse_document_without_content() {
        assert_eq!(parse_document("#cloud-config\n"), Ok(None));
        assert_eq!(parse_document("#cloud-config\n\n# nothing here\n"), Ok(None));
    }

    #[test]
    fn test_parse_error_becomes_positioned_finding() {
        let finding = parse_document("#cloud-config\nhostname: [unclosed\n").unwrap_err();
        assert!(finding.is_error());
        assert!(finding.line.is_some());
    }
}
