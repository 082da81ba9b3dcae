//! Shared output formatting for validation outcomes.
//!
//! Provides JSON and plain-text formatters. Terminal colors are left to the
//! CLI layer.

use std::io::Write;

use crate::report::{ValidationOutcome, ValidationPath};

/// Format an outcome as pretty-printed JSON to a writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(outcome: &ValidationOutcome, writer: &mut dyn Write) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

/// Format an outcome as human-readable plain text to a writer.
///
/// One line per finding (`line:column: kind: message`) followed by a summary.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human(outcome: &ValidationOutcome, writer: &mut dyn Write) -> anyhow::Result<()> {
    let report = &outcome.report;
    for entry in report.entries() {
        writeln!(writer, "{}", entry.format_human_readable())?;
    }
    if !report.entries().is_empty() {
        writeln!(writer)?;
    }

    writeln!(writer, "Detected: {}", describe_path(outcome.path))?;
    if report.is_valid() {
        writeln!(writer, "\u{2713} Config file looks good")?;
    } else {
        writeln!(
            writer,
            "\u{2717} {} finding(s), {} error(s)",
            report.count(),
            report.error_count()
        )?;
    }
    Ok(())
}

fn describe_path(path: ValidationPath) -> String {
    match path {
        ValidationPath::Declarative => "declarative config".to_owned(),
        ValidationPath::Invalid => "declarative config (unparseable)".to_owned(),
        ValidationPath::UnknownVersion => "unknown config version".to_owned(),
        ValidationPath::Fallback(dialect) => dialect.to_string(),
    }
}
