//! Indexing error types
//!
//! Error codes:
//! - PRISM_VALUE_TOO_LARGE_FOR_INDEX (REJECT)
//! - PRISM_INVALID_PATTERN (REJECT)
//! - PRISM_MANIFEST_IO (FATAL)
//! - PRISM_MANIFEST_MALFORMED (FATAL)

use thiserror::Error;

/// Result type for indexing operations
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Errors raised by indexers and the manifest catalog
#[derive(Debug, Clone, Error)]
pub enum IndexingError {
    /// A value failed an indexer's size precondition at write-derivation
    /// time. Surfaced to the write-path collaborator as a hard error; values
    /// are never silently truncated (the primary key is the one documented,
    /// warned exception).
    #[error("Value of length {length} exceeds index limit {limit} for kind '{kind}'")]
    ValueTooLargeForIndex {
        kind: String,
        length: usize,
        limit: usize,
    },

    /// A regex lookup carried a pattern that does not compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Manifest file could not be read or written
    #[error("Manifest I/O failure at '{path}': {reason}")]
    ManifestIo { path: String, reason: String },

    /// Manifest file exists but is not valid JSON of the expected shape
    #[error("Malformed manifest at '{path}': {reason}")]
    ManifestMalformed { path: String, reason: String },
}

impl IndexingError {
    /// Create a value-too-large error
    pub fn value_too_large(kind: impl Into<String>, length: usize, limit: usize) -> Self {
        Self::ValueTooLargeForIndex {
            kind: kind.into(),
            length,
            limit,
        }
    }

    /// Create an invalid-pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Create a manifest I/O error
    pub fn manifest_io(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ManifestIo {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-manifest error
    pub fn manifest_malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ManifestMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValueTooLargeForIndex { .. } => "PRISM_VALUE_TOO_LARGE_FOR_INDEX",
            Self::InvalidPattern { .. } => "PRISM_INVALID_PATTERN",
            Self::ManifestIo { .. } => "PRISM_MANIFEST_IO",
            Self::ManifestMalformed { .. } => "PRISM_MANIFEST_MALFORMED",
        }
    }
}
