//! Error types for tierlift-remediation operations.

use thiserror::Error;

/// Result type alias for remediation operations.
pub type Result<T> = std::result::Result<T, RemediationError>;

/// Errors that abort one remediation pass.
///
/// Per-reference failures never appear here; they are absorbed into the
/// row's outcome. These errors end the pass for the whole source spreadsheet.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// A required setting is missing or malformed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the missing setting.
        message: String,
    },

    /// The source URL is not a blob URL.
    #[error("invalid source: {message}")]
    InvalidSource {
        /// Description of the malformed source.
        message: String,
    },

    /// The source spreadsheet could not be read from the store.
    #[error("source not accessible: {source}")]
    Access {
        /// The underlying store error.
        #[source]
        source: tierlift_core::Error,
    },

    /// The source bytes are not a readable spreadsheet.
    #[error("parse error: {message}")]
    Parse {
        /// Description of the decode failure.
        message: String,
    },

    /// The annotated spreadsheet could not be serialized.
    #[error("encode error: {message}")]
    Encode {
        /// Description of the encode failure.
        message: String,
    },

    /// Publishing the annotated spreadsheet failed.
    #[error("upload failed: {source}")]
    Upload {
        /// The underlying store error.
        #[source]
        source: tierlift_core::Error,
    },
}

impl RemediationError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}
