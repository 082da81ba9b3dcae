//! # config-validator
//!
//! Validator for machine provisioning configs: declarative (Ignition-style)
//! JSON documents, `#cloud-config` YAML and `#!` scripts.
//!
//! A raw blob goes through four stages:
//! 1. **normalize**: carriage returns are stripped,
//! 2. **classify**: the blob is parsed as a declarative config, or routed to
//!    another dialect, or rejected as an unknown version,
//! 3. **fallback**: scripts and cloud-configs are handed to a
//!    [`FallbackValidator`]; an empty blob is always one unknown-version
//!    error and never reaches it,
//! 4. **aggregate**: findings are sorted by position into a [`Report`].
//!
//! ## Quick Start
//!
//! ```rust
//! use config_validator::validate;
//!
//! let outcome = validate(br#"{"ignition": {"version": "2.2.0"}}"#).unwrap();
//! assert!(outcome.is_valid());
//!
//! let outcome = validate(b"").unwrap();
//! assert_eq!(outcome.report.count(), 1);
//! assert_eq!(outcome.report.entries()[0].message, "Unknown ignition version");
//! ```
//!
//! Findings are data, not errors: `validate` only returns `Err` when the
//! input could not be read or the fallback validator broke down.

mod classify;
mod error;
mod fallback;
mod format;
mod normalize;
pub mod output;
mod report;
mod schema;
mod tree;

use std::io::Read;

pub use classify::{Classification, Dialect, classify};
pub use error::{FallbackError, ValidateError};
pub use fallback::{FallbackValidator, UserDataValidator};
pub use normalize::normalize;
pub use report::{
    FindingEntry, FindingKind, Report, UNKNOWN_VERSION_MESSAGE, ValidationOutcome, ValidationPath,
};

/// Runs the validation pipeline with a pluggable fallback validator.
#[derive(Debug, Clone, Default)]
pub struct Validator<F = UserDataValidator> {
    fallback: F,
}

impl Validator<UserDataValidator> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fallback: UserDataValidator,
        }
    }
}

impl<F: FallbackValidator> Validator<F> {
    /// Use `fallback` for blobs that are not declarative configs.
    #[must_use]
    pub const fn with_fallback(fallback: F) -> Self {
        Self { fallback }
    }

    /// Validate a raw config blob.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Fallback` when the fallback validator cannot
    /// validate a non-declarative blob. Problems with the config itself are
    /// reported in the outcome, never as errors.
    pub fn validate(&self, raw: &[u8]) -> Result<ValidationOutcome, ValidateError> {
        let normalized = normalize(raw);
        let classification = classify(&normalized);
        tracing::debug!(
            bytes = normalized.len(),
            classification = classification_label(&classification),
            "classified config"
        );

        let (entries, path) = match classification {
            Classification::Parsed(entries) => (entries, ValidationPath::Declarative),
            Classification::Invalid(entries) => (entries, ValidationPath::Invalid),
            Classification::UnknownVersion => (
                vec![FindingEntry::unknown_version()],
                ValidationPath::UnknownVersion,
            ),
            Classification::NotDeclarative(Dialect::Empty) => (
                vec![FindingEntry::unknown_version()],
                ValidationPath::Fallback(Dialect::Empty),
            ),
            Classification::NotDeclarative(dialect) => {
                let entries = self
                    .fallback
                    .validate(dialect, &normalized)
                    .map_err(|source| ValidateError::Fallback { dialect, source })?;
                (entries, ValidationPath::Fallback(dialect))
            }
        };

        Ok(ValidationOutcome::new(Report::from_entries(entries), path))
    }

    /// Read `reader` to the end and validate what it produced.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Io` if reading fails, otherwise as
    /// [`Validator::validate`].
    pub fn validate_reader<R: Read>(
        &self,
        mut reader: R,
    ) -> Result<ValidationOutcome, ValidateError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        self.validate(&raw)
    }
}

fn classification_label(classification: &Classification) -> &'static str {
    match classification {
        Classification::Parsed(_) => "declarative",
        Classification::Invalid(_) => "invalid",
        Classification::UnknownVersion => "unknown-version",
        Classification::NotDeclarative(Dialect::Empty) => "empty",
        Classification::NotDeclarative(Dialect::Script) => "script",
        Classification::NotDeclarative(Dialect::CloudConfig) => "cloud-config",
    }
}

/// Validate a raw config blob with the default fallback validator.
///
/// # Errors
///
/// See [`Validator::validate`].
pub fn validate(raw: &[u8]) -> Result<ValidationOutcome, ValidateError> {
    Validator::new().validate(raw)
}

/// Read a config from `reader` and validate it with the default fallback
/// validator.
///
/// # Errors
///
/// See [`Validator::validate_reader`].
pub fn validate_reader<R: Read>(reader: R) -> Result<ValidationOutcome, ValidateError> {
    Validator::new().validate_reader(reader)
}
