//! Classifier: decides which dialect a normalized blob is written in.

use std::fmt;

use serde::Serialize;

use crate::format::ignition::{self, Document};
use crate::report::FindingEntry;

const CLOUD_CONFIG_HEADER: &str = "#cloud-config";
const SCRIPT_PREFIX: &[u8] = b"#!";

/// A non-declarative dialect, handled by the fallback validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// No bytes at all.
    Empty,
    /// Starts with a `#!` interpreter line.
    Script,
    /// First line is `#cloud-config`, ignoring trailing whitespace.
    CloudConfig,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Script => f.write_str("script"),
            Self::CloudConfig => f.write_str("cloud-config"),
        }
    }
}

/// How the classifier read a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A declarative config with a known version; findings may still be
    /// present (warnings on an otherwise usable document).
    Parsed(Vec<FindingEntry>),
    /// A declarative config the parser rejected; carries its error findings.
    Invalid(Vec<FindingEntry>),
    /// Written in another dialect; the fallback validator takes over.
    NotDeclarative(Dialect),
    /// No supported declarative version, and no other dialect recognized.
    UnknownVersion,
}

/// Classify normalized bytes.
///
/// Dialect markers win over JSON parsing: an empty blob, a `#cloud-config`
/// header or a `#!` line never reach the declarative parser.
#[must_use]
pub fn classify(normalized: &[u8]) -> Classification {
    if let Some(dialect) = detect_dialect(normalized) {
        return Classification::NotDeclarative(dialect);
    }

    match ignition::parse(normalized) {
        Document::NotJson | Document::UnknownVersion => Classification::UnknownVersion,
        Document::Malformed(finding) => Classification::Invalid(vec![finding]),
        Document::Checked(findings) if findings.iter().any(FindingEntry::is_error) => {
            Classification::Invalid(findings)
        }
        Document::Checked(findings) => Classification::Parsed(findings),
    }
}

fn detect_dialect(normalized: &[u8]) -> Option<Dialect> {
    if normalized.is_empty() {
        return Some(Dialect::Empty);
    }
    let first_line = normalized
        .split(|&b| b == b'\n')
        .next()
        .unwrap_or_default();
    if first_line.trim_ascii_end() == CLOUD_CONFIG_HEADER.as_bytes() {
        Some(Dialect::CloudConfig)
    } else if normalized.starts_with(SCRIPT_PREFIX) {
        Some(Dialect::Script)
    } else {
        None
    }
}
