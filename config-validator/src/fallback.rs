//! Fallback validation for non-declarative dialects.

use crate::classify::Dialect;
use crate::error::FallbackError;
use crate::format::cloud_config;
use crate::report::FindingEntry;

/// Validates blobs the classifier routed away from the declarative parser.
///
/// Implementations report problems with the config as findings and reserve
/// `Err` for cases where they could not validate at all.
pub trait FallbackValidator {
    /// Validate `input` (normalized bytes) as `dialect`.
    ///
    /// # Errors
    ///
    /// Returns `FallbackError` when the input cannot be validated.
    fn validate(&self, dialect: Dialect, input: &[u8]) -> Result<Vec<FindingEntry>, FallbackError>;
}

/// Default fallback: cloud-config bodies are checked and scripts are accepted
/// as-is. [`crate::Validator`] answers empty blobs itself; called directly
/// with one, this reports an unknown config as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataValidator;

impl FallbackValidator for UserDataValidator {
    fn validate(&self, dialect: Dialect, input: &[u8]) -> Result<Vec<FindingEntry>, FallbackError> {
        match dialect {
            Dialect::Empty => Ok(vec![FindingEntry::unknown_version()]),
            Dialect::Script => Ok(Vec::new()),
            Dialect::CloudConfig => {
                let text = std::str::from_utf8(input)?;
                Ok(cloud_config::validate(text))
            }
        }
    }
}
