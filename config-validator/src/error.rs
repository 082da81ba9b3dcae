//! Error types for config validation.
//!
//! These are hard failures of the validation process itself. An invalid
//! config is never an error: it is a [`Report`](crate::Report) with entries.

use thiserror::Error;

use crate::classify::Dialect;

/// Failure raised by a fallback validator that cannot produce findings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FallbackError {
    /// The config body is not valid UTF-8 and cannot be handed to a text parser.
    #[error("config is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    /// The dialect parser broke down in a way it could not report as a finding.
    #[error("{0}")]
    Internal(String),
}

/// Failure of a `validate` call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidateError {
    /// The raw config could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The fallback validator for a non-declarative dialect failed.
    #[error("{dialect} validation failed: {source}")]
    Fallback {
        dialect: Dialect,
        #[source]
        source: FallbackError,
    },
}
