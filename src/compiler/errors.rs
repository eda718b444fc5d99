//! Compiler error types
//!
//! Error codes:
//! - PRISM_UNSUPPORTED_OPERATOR (REJECT)
//! - PRISM_MISSING_INDEX (REJECT)
//! - PRISM_QUERY_TOO_COMPLEX (REJECT)
//! - PRISM_INVALID_FILTER_TREE (REJECT)
//!
//! Every error is fatal to the current compilation call and is returned as a
//! typed result; nothing is retried, downgraded, or partially compiled.

use thiserror::Error;

use crate::indexing::{IndexManifest, IndexingError};

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised during query compilation
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// No indexer or native mapping exists for an operator/field pair
    #[error("No index support for lookup '{lookup}' on column '{column}': {reason}")]
    UnsupportedOperator {
        column: String,
        lookup: String,
        reason: String,
    },

    /// An indexer would handle the lookup, but the manifest lacks the entry.
    /// `snippet` is the JSON fragment that would fix it.
    #[error(
        "Index '{kind}' on {table}.{field} is not provisioned; add this manifest entry: {snippet}"
    )]
    MissingIndexManifestEntry {
        table: String,
        field: String,
        kind: String,
        snippet: String,
    },

    /// DNF expansion would exceed the branch ceiling, or a branch carries
    /// more than one inequality-bearing column after all legal optimizations
    #[error("Query too complex: {reason}")]
    QueryTooComplex { reason: String },

    /// Structurally invalid input tree
    #[error("Invalid filter tree: {reason}")]
    InvalidFilterTree { reason: String },

    /// Failure inside the indexing subsystem (manifest I/O, bad pattern)
    #[error(transparent)]
    Indexing(#[from] IndexingError),
}

impl CompileError {
    /// Create an unsupported-operator error
    pub fn unsupported_operator(
        column: impl Into<String>,
        lookup: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedOperator {
            column: column.into(),
            lookup: lookup.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-manifest-entry error carrying the fix-it snippet
    pub fn missing_index(
        table: impl Into<String>,
        field: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        let table = table.into();
        let field = field.into();
        let kind = kind.into();
        let snippet = IndexManifest::snippet_for(&table, &field, &kind);
        Self::MissingIndexManifestEntry {
            table,
            field,
            kind,
            snippet,
        }
    }

    /// Create a too-complex error
    pub fn too_complex(reason: impl Into<String>) -> Self {
        Self::QueryTooComplex {
            reason: reason.into(),
        }
    }

    /// Create an invalid-tree error
    pub fn invalid_tree(reason: impl Into<String>) -> Self {
        Self::InvalidFilterTree {
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedOperator { .. } => "PRISM_UNSUPPORTED_OPERATOR",
            Self::MissingIndexManifestEntry { .. } => "PRISM_MISSING_INDEX",
            Self::QueryTooComplex { .. } => "PRISM_QUERY_TOO_COMPLEX",
            Self::InvalidFilterTree { .. } => "PRISM_INVALID_FILTER_TREE",
            Self::Indexing(e) => e.code(),
        }
    }
}
