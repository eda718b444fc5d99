//! Secondary-index emulation
//!
//! The target store only executes equality and ordered-range scans on stored
//! columns. Everything richer (case-insensitive equality, containment,
//! regex, date-part extraction) is emulated: an [`Indexer`] derives auxiliary
//! values that the write path persists alongside the record, and rewrites
//! query leaves to exact-match lookups against those derived columns.
//!
//! Which (field, index-kind) combinations are actually provisioned is
//! recorded in a file-backed manifest (see [`manifest`]); the registry walks
//! its indexer list in deterministic registration order and the first indexer
//! claiming a (category, lookup) pair wins.

pub mod datetime;
pub mod errors;
pub mod manifest;
pub mod pattern;
pub mod registry;
pub mod text;

use serde_json::Value;

use crate::filter::{Lookup, NativeOp};

pub use datetime::DatePartIndexer;
pub use errors::{IndexingError, IndexingResult};
pub use manifest::{IndexManifest, ManifestCatalog, ManifestMode};
pub use pattern::RegexIndexer;
pub use registry::{DerivedEntry, IndexerRegistry};
pub use text::{ContainsIndexer, EndsWithIndexer, IExactIndexer, StartsWithIndexer};

/// Field categories the catalog reports for columns.
///
/// Indexers declare which categories they can emulate lookups for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    /// UTF-8 text
    Text,
    /// Integer or float
    Number,
    /// Boolean
    Boolean,
    /// Date/time value stored in RFC 3339 form
    DateTime,
    /// Primary-key column
    Key,
}

/// Size preconditions applied at write-derivation time
#[derive(Debug, Clone)]
pub struct IndexingLimits {
    /// Longest string the store will index on a single column
    pub max_string_length: usize,
    /// Most derived rows one value may produce (bounds the containment family)
    pub max_derived_values: usize,
}

impl IndexingLimits {
    /// Store-documented defaults
    pub fn new() -> Self {
        Self {
            max_string_length: 500,
            max_derived_values: 1000,
        }
    }
}

impl Default for IndexingLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// A pluggable unit emulating one operator family.
///
/// All read-path methods are pure. Write-path derivations are *emitted* for
/// an external writer to persist; indexers never touch the store themselves.
pub trait Indexer: Send + Sync {
    /// Stable indexer name, used in diagnostics
    fn name(&self) -> &'static str;

    /// Pure predicate: does this indexer emulate `lookup` for `category`?
    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool;

    /// The index-kind string for a query leaf. Encodes the operator and any
    /// sub-parameters (e.g. the regex pattern), so the manifest entry alone
    /// tells the write path what to derive.
    fn index_kind(&self, lookup: Lookup, query_value: &Value) -> IndexingResult<String>;

    /// Does a provisioned kind string belong to this indexer?
    fn matches_kind(&self, kind: &str) -> bool;

    /// Values to persist alongside the record for a provisioned kind.
    ///
    /// Returns `Ok(None)` when the value does not qualify for indexing (a
    /// query against it then yields no match); returns
    /// [`IndexingError::ValueTooLargeForIndex`] when the value violates a
    /// size precondition.
    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>>;

    /// The query literal rewritten into the derived representation
    fn derive_query_value(&self, lookup: Lookup, value: &Value) -> IndexingResult<Value>;

    /// Deterministic name of the derived column for a kind
    fn derived_column(&self, field: &str, kind: &str) -> String {
        format!("_idx_{}_{}", kind, field)
    }

    /// Native operator used against the derived column
    fn native_operator(&self) -> NativeOp {
        NativeOp::Eq
    }

    /// True when the derived column is single-valued and order-compatible,
    /// so an ordering on the original column may be rewritten to it
    fn orderable(&self) -> bool {
        false
    }
}
