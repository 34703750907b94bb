//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating relay settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a field has the wrong type.
    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// What serde rejected.
        source: serde_json::Error,
    },
    /// The compiled defaults could not be turned into a JSON tree.
    #[error("failed to serialize default settings: {0}")]
    Defaults(#[source] serde_json::Error),
    /// A value the relay cannot run with.
    #[error("invalid setting {field}: {reason}")]
    InvalidValue {
        /// camelCase path of the offending field, e.g. `server.maxConnections`.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
