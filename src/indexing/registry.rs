//! Indexer registry
//!
//! A process-wide catalogue of indexer implementations. Registration happens
//! once at construction; lookup walks the list in registration order and the
//! first indexer claiming a (category, lookup) pair wins, so the choice is
//! stable even if two indexers could both claim a pair.

use serde_json::Value;

use super::datetime::DatePartIndexer;
use super::manifest::IndexManifest;
use super::pattern::RegexIndexer;
use super::text::{ContainsIndexer, EndsWithIndexer, IExactIndexer, StartsWithIndexer};
use super::{FieldCategory, Indexer, IndexingLimits, IndexingResult};
use crate::filter::Lookup;
use crate::observability::Logger;

/// One derived row for the write path to persist alongside a record
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedEntry {
    /// Derived column to write into
    pub column: String,
    /// Values to store (one row per value)
    pub values: Vec<Value>,
}

/// Ordered collection of registered indexers
pub struct IndexerRegistry {
    indexers: Vec<Box<dyn Indexer>>,
    limits: IndexingLimits,
}

impl IndexerRegistry {
    /// Creates an empty registry with the given limits
    pub fn empty(limits: IndexingLimits) -> Self {
        Self {
            indexers: Vec::new(),
            limits,
        }
    }

    /// Creates a registry with every built-in indexer, in a fixed order
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty(IndexingLimits::new());
        registry.register(Box::new(IExactIndexer));
        registry.register(Box::new(StartsWithIndexer));
        registry.register(Box::new(EndsWithIndexer));
        registry.register(Box::new(ContainsIndexer::sensitive()));
        registry.register(Box::new(ContainsIndexer::insensitive()));
        registry.register(Box::new(RegexIndexer::sensitive()));
        registry.register(Box::new(RegexIndexer::insensitive()));
        registry.register(Box::new(DatePartIndexer));
        registry
    }

    /// Appends an indexer. Later registrations never shadow earlier ones.
    pub fn register(&mut self, indexer: Box<dyn Indexer>) {
        self.indexers.push(indexer);
    }

    pub fn limits(&self) -> &IndexingLimits {
        &self.limits
    }

    /// First registered indexer that handles (category, lookup)
    pub fn find(&self, category: FieldCategory, lookup: Lookup) -> Option<&dyn Indexer> {
        self.indexers
            .iter()
            .find(|idx| idx.handles(category, lookup))
            .map(|idx| idx.as_ref())
    }

    /// First registered indexer that owns a provisioned kind string
    pub fn find_by_kind(&self, kind: &str) -> Option<&dyn Indexer> {
        self.indexers
            .iter()
            .find(|idx| idx.matches_kind(kind))
            .map(|idx| idx.as_ref())
    }

    /// Derives every index row the write path must persist for one field.
    ///
    /// Walks the manifest's provisioned kinds for (table, field); each kind
    /// is routed to the indexer that owns it. Size violations surface as
    /// [`super::IndexingError::ValueTooLargeForIndex`] before anything is
    /// persisted. Kinds whose indexer is no longer registered are skipped:
    /// the manifest may legitimately be ahead of a trimmed registry.
    pub fn derive_entries(
        &self,
        manifest: &IndexManifest,
        table: &str,
        field: &str,
        value: &Value,
    ) -> IndexingResult<Vec<DerivedEntry>> {
        let Some(kinds) = manifest.kinds_for(table, field) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for kind in kinds {
            let Some(indexer) = self.find_by_kind(kind) else {
                continue;
            };
            let Some(values) = indexer.derive_write_values(kind, value, &self.limits)? else {
                // Value does not qualify: no index row, queries find nothing
                continue;
            };
            entries.push(DerivedEntry {
                column: indexer.derived_column(field, kind),
                values,
            });
        }
        Ok(entries)
    }

    /// Prepares a primary-key value for persistence.
    ///
    /// Overlong string keys are truncated to the indexable length. This is
    /// the one documented exception to the no-silent-truncation rule, and it
    /// is always warned.
    pub fn prepare_key(&self, value: &Value) -> Value {
        let Some(s) = value.as_str() else {
            return value.clone();
        };
        let max = self.limits.max_string_length;
        if s.chars().count() <= max {
            return value.clone();
        }
        let truncated: String = s.chars().take(max).collect();
        Logger::warn(
            "PRIMARY_KEY_TRUNCATED",
            &[
                ("original_length", &s.chars().count().to_string()),
                ("truncated_length", &max.to_string()),
            ],
        );
        Value::String(truncated)
    }
}

impl Default for IndexerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_is_first_match_in_registration_order() {
        let registry = IndexerRegistry::with_builtins();
        let idx = registry
            .find(FieldCategory::Text, Lookup::Contains)
            .expect("contains should be handled");
        assert_eq!(idx.name(), "contains");

        let idx = registry
            .find(FieldCategory::Text, Lookup::IContains)
            .expect("icontains should be handled");
        assert_eq!(idx.name(), "icontains");
    }

    #[test]
    fn test_unhandled_pairs_return_none() {
        let registry = IndexerRegistry::with_builtins();
        assert!(registry.find(FieldCategory::Number, Lookup::Contains).is_none());
        assert!(registry.find(FieldCategory::Text, Lookup::Year).is_none());
        assert!(registry.find(FieldCategory::DateTime, Lookup::Year).is_some());
    }

    #[test]
    fn test_find_by_kind_routes_parameterized_kinds() {
        let registry = IndexerRegistry::with_builtins();
        assert_eq!(registry.find_by_kind("startswith").unwrap().name(), "startswith");
        assert_eq!(registry.find_by_kind("week_day").unwrap().name(), "date_part");

        let regex = RegexIndexer::sensitive();
        let kind = regex.index_kind(Lookup::Regex, &json!("^a")).unwrap();
        assert_eq!(registry.find_by_kind(&kind).unwrap().name(), "regex");
        assert!(registry.find_by_kind("no_such_kind").is_none());
    }

    #[test]
    fn test_derive_entries_covers_provisioned_kinds() {
        let registry = IndexerRegistry::with_builtins();
        let mut manifest = IndexManifest::new();
        manifest.insert("users", "name", "iexact");
        manifest.insert("users", "name", "startswith");

        let entries = registry
            .derive_entries(&manifest, "users", "name", &json!("Bob"))
            .unwrap();
        assert_eq!(entries.len(), 2);

        let iexact = entries
            .iter()
            .find(|e| e.column == "_idx_iexact_name")
            .unwrap();
        assert_eq!(iexact.values, vec![json!("bob")]);

        let prefixes = entries
            .iter()
            .find(|e| e.column == "_idx_startswith_name")
            .unwrap();
        assert_eq!(prefixes.values, vec![json!("B"), json!("Bo"), json!("Bob")]);
    }

    #[test]
    fn test_derive_entries_skips_unqualifying_values() {
        let registry = IndexerRegistry::with_builtins();
        let mut manifest = IndexManifest::new();
        manifest.insert("users", "age", "iexact");

        let entries = registry
            .derive_entries(&manifest, "users", "age", &json!(42))
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_derive_entries_skips_undecodable_kind_strings() {
        let registry = IndexerRegistry::with_builtins();
        let mut manifest = IndexManifest::new();
        manifest.insert("users", "code", "regex_\u{20ac}a");

        let entries = registry
            .derive_entries(&manifest, "users", "code", &json!("abc"))
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_derive_entries_surfaces_size_violations() {
        let mut registry = IndexerRegistry::empty(IndexingLimits {
            max_string_length: 500,
            max_derived_values: 3,
        });
        registry.register(Box::new(ContainsIndexer::sensitive()));

        let mut manifest = IndexManifest::new();
        manifest.insert("users", "bio", "contains");

        let result = registry.derive_entries(&manifest, "users", "bio", &json!("abcdef"));
        assert!(result.is_err());
    }

    #[test]
    fn test_prepare_key_truncates_only_overlong_strings() {
        let mut registry = IndexerRegistry::empty(IndexingLimits {
            max_string_length: 4,
            max_derived_values: 1000,
        });
        registry.register(Box::new(IExactIndexer));

        assert_eq!(registry.prepare_key(&json!("abc")), json!("abc"));
        assert_eq!(registry.prepare_key(&json!("abcdef")), json!("abcd"));
        assert_eq!(registry.prepare_key(&json!(42)), json!(42));
    }
}
