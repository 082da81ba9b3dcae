//! Validation report types.

use std::fmt;

use serde::Serialize;

use crate::classify::Dialect;

/// Message carried by the single finding produced for an unrecognized
/// declarative config version.
pub const UNKNOWN_VERSION_MESSAGE: &str = "Unknown ignition version";

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Error,
    Warning,
    Info,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Info => f.write_str("info"),
        }
    }
}

/// A single validation finding.
///
/// `line` and `column` are 1-indexed and only present when the dialect that
/// produced the finding could derive them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub struct FindingEntry {
    pub kind: FindingKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl FindingEntry {
    #[must_use]
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Error, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Warning, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Info, message)
    }

    /// The finding emitted when a document declares a config version this
    /// validator does not know.
    #[must_use]
    pub fn unknown_version() -> Self {
        Self::error(UNKNOWN_VERSION_MESSAGE)
    }

    /// Attach a source position.
    #[must_use]
    pub fn at(mut self, line: Option<usize>, column: Option<usize>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == FindingKind::Error
    }

    /// Key used by the aggregator. Missing positions sort first.
    fn sort_key(&self) -> (usize, usize) {
        (self.line.unwrap_or(0), self.column.unwrap_or(0))
    }

    /// Format the finding for human-readable output.
    ///
    /// `{line}:{column}: {kind}: {message}`, dropping whichever position parts
    /// are unknown.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                format!("{line}:{column}: {}: {}", self.kind, self.message)
            }
            (Some(line), None) => format!("{line}: {}: {}", self.kind, self.message),
            _ => format!("{}: {}", self.kind, self.message),
        }
    }
}

/// Ordered findings for one validation call.
///
/// Only constructed through [`Report::from_entries`], which imposes the
/// positional order. Two structurally identical finding sets always yield the
/// same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Report {
    entries: Vec<FindingEntry>,
}

impl Report {
    /// Aggregate findings into a report.
    ///
    /// Entries are stable-sorted by `(line, column)`; entries without a
    /// position keep their relative order ahead of positioned ones.
    #[must_use]
    pub fn from_entries(mut entries: Vec<FindingEntry>) -> Self {
        entries.sort_by_key(FindingEntry::sort_key);
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[FindingEntry] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<FindingEntry> {
        self.entries
    }

    /// Number of findings of any kind.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// `true` only when the report carries no findings at all; warnings and
    /// infos make a config invalid too.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `Error`-kind findings.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(FindingEntry::is_error)
    }
}

/// Which classification path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "dialect")]
pub enum ValidationPath {
    /// Parsed as a declarative config.
    Declarative,
    /// Looked like a declarative config but the parser gave up.
    Invalid,
    /// Declared an unknown declarative config version.
    UnknownVersion,
    /// Routed to the fallback validator.
    Fallback(Dialect),
}

/// Result of a completed validation: the report and the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ValidationOutcome {
    pub report: Report,
    pub path: ValidationPath,
}

impl ValidationOutcome {
    #[must_use]
    pub fn new(report: Report, path: ValidationPath) -> Self {
        Self { report, path }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }

    /// Process exit code for command-line callers: `0` when valid, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_valid())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sorts_by_line_then_column() {
        let report = Report::from_entries(vec![
            FindingEntry::warning("c").at(Some(3), Some(1)),
            FindingEntry::error("a").at(Some(1), Some(5)),
            FindingEntry::info("b").at(Some(1), Some(2)),
        ]);
        let messages: Vec<&str> = report.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["b", "a", "c"]);
    }

    #[test]
    fn test_report_sort_is_stable_for_equal_positions() {
        let report = Report::from_entries(vec![
            FindingEntry::warning("first").at(Some(2), None),
            FindingEntry::error("second").at(Some(2), None),
            FindingEntry::info("unpositioned"),
        ]);
        let messages: Vec<&str> = report.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["unpositioned", "first", "second"]);
    }

    #[test]
    fn test_validity_counts_every_kind() {
        let report = Report::from_entries(vec![FindingEntry::warning("duplicate")]);
        assert_eq!(report.count(), 1);
        assert!(!report.is_valid());
        assert_eq!(report.error_count(), 0);
        assert!(!report.has_errors());

        assert!(Report::default().is_valid());
    }

    #[test]
    fn test_entry_serializes_without_missing_positions() {
        let json = serde_json::to_value(FindingEntry::unknown_version()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "error", "message": "Unknown ignition version"})
        );

        let json = serde_json::to_value(FindingEntry::warning("w").at(Some(4), Some(7))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "warning", "message": "w", "line": 4, "column": 7})
        );
    }

    #[test]
    fn test_report_serializes_as_entry_list() {
        let report = Report::from_entries(vec![FindingEntry::info("note").at(Some(1), None)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"kind": "info", "message": "note", "line": 1}])
        );
    }

    #[test]
    fn test_format_human_readable() {
        let entry = FindingEntry::error("path not absolute").at(Some(12), Some(9));
        assert_eq!(entry.format_human_readable(), "12:9: error: path not absolute");

        let entry = FindingEntry::info("note").at(Some(3), None);
        assert_eq!(entry.format_human_readable(), "3: info: note");

        assert_eq!(
            FindingEntry::unknown_version().format_human_readable(),
            "error: Unknown ignition version"
        );
    }

    #[test]
    fn test_exit_code() {
        let valid = ValidationOutcome::new(Report::default(), ValidationPath::Declarative);
        assert_eq!(valid.exit_code(), 0);

        let invalid = ValidationOutcome::new(
            Report::from_entries(vec![FindingEntry::unknown_version()]),
            ValidationPath::UnknownVersion,
        );
        assert_eq!(invalid.exit_code(), 1);
    }
}
