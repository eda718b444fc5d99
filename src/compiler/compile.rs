//! Compiler assembly
//!
//! [`QueryCompiler`] ties the pipeline together: structural validation, the
//! exclusion-context decision, preprocessing, DNF normalization, the
//! per-branch inequality check, and the ordering rewrite. The output is a
//! [`CompiledQuerySet`] the storage adapter can execute as native scans.

use serde_json::Value;

use super::context::{exclusion_permitted, FieldCatalog, FilterQuery};
use super::dnf;
use super::errors::{CompileError, CompileResult};
use super::preprocess::{Preprocessor, Substitution};
use crate::filter::eval::matches_native;
use crate::filter::order::values_equal;
use crate::filter::{NativeLeaf, SortSpec};
use crate::indexing::{IndexerRegistry, ManifestCatalog};

/// Tunables for one compiler instance
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Hard ceiling on DNF branches, including intermediate products
    pub max_branches: usize,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self { max_branches: 30 }
    }

    pub fn with_max_branches(mut self, max_branches: usize) -> Self {
        self.max_branches = max_branches;
        self
    }

    pub fn validate(&self) -> CompileResult<()> {
        if self.max_branches == 0 {
            return Err(CompileError::invalid_tree(
                "max_branches must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One native scan: a conjunction of native predicates plus the keys to
/// drop from its results in memory
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledConjunction {
    pub leaves: Vec<NativeLeaf>,
    pub excluded_keys: Vec<Value>,
}

impl CompiledConjunction {
    /// Evaluates this conjunction against a record, exclusions included
    pub fn matches(&self, doc: &Value, primary_key: &str) -> bool {
        if !self.leaves.iter().all(|leaf| matches_native(doc, leaf)) {
            return false;
        }
        let key = doc.get(primary_key).unwrap_or(&Value::Null);
        !self.excluded_keys.iter().any(|k| values_equal(k, key))
    }
}

/// Compilation output
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuerySet {
    /// The filter is provably unsatisfiable; return nothing without
    /// touching the store
    EmptyResult,
    /// Scans to run and union, and the ordering to apply to the union
    Queries {
        conjunctions: Vec<CompiledConjunction>,
        ordering: Vec<SortSpec>,
    },
}

impl CompiledQuerySet {
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::EmptyResult)
    }

    /// Evaluates the whole set against a record (union over conjunctions)
    pub fn matches(&self, doc: &Value, primary_key: &str) -> bool {
        match self {
            Self::EmptyResult => false,
            Self::Queries { conjunctions, .. } => conjunctions
                .iter()
                .any(|conjunction| conjunction.matches(doc, primary_key)),
        }
    }
}

/// Compiles filter trees against one registry, manifest, and field catalog
pub struct QueryCompiler<'a, C: FieldCatalog> {
    registry: &'a IndexerRegistry,
    manifest: &'a ManifestCatalog,
    fields: &'a C,
    config: CompilerConfig,
}

impl<'a, C: FieldCatalog> QueryCompiler<'a, C> {
    pub fn new(
        registry: &'a IndexerRegistry,
        manifest: &'a ManifestCatalog,
        fields: &'a C,
    ) -> Self {
        Self::with_config(registry, manifest, fields, CompilerConfig::new())
    }

    pub fn with_config(
        registry: &'a IndexerRegistry,
        manifest: &'a ManifestCatalog,
        fields: &'a C,
        config: CompilerConfig,
    ) -> Self {
        Self {
            registry,
            manifest,
            fields,
            config,
        }
    }

    /// Runs the full pipeline for one query
    pub fn compile(&self, query: &FilterQuery) -> CompileResult<CompiledQuerySet> {
        self.config.validate()?;
        if !query.filter.is_well_formed() {
            return Err(CompileError::invalid_tree(
                "every branch must have at least one child",
            ));
        }

        let exclusion_active = exclusion_permitted(query);
        let outcome = Preprocessor::new(
            self.registry,
            self.manifest,
            self.fields,
            query,
            exclusion_active,
        )?
        .run(&query.filter)?;

        let normalized = dnf::normalize(&outcome.tree, self.config.max_branches)?;
        for branch in &normalized.branches {
            validate_branch(branch)?;
        }

        if normalized.is_empty() {
            return Ok(CompiledQuerySet::EmptyResult);
        }

        let ordering = rewrite_ordering(&query.ordering, &outcome.substitutions);
        let conjunctions = normalized
            .branches
            .into_iter()
            .map(|leaves| CompiledConjunction {
                leaves,
                excluded_keys: outcome.excluded_keys.clone(),
            })
            .collect();
        Ok(CompiledQuerySet::Queries {
            conjunctions,
            ordering,
        })
    }
}

/// The store runs at most one inequality-bearing column per scan
fn validate_branch(branch: &[NativeLeaf]) -> CompileResult<()> {
    let mut inequality_column: Option<&str> = None;
    for leaf in branch {
        if !leaf.op.is_inequality() {
            continue;
        }
        match inequality_column {
            None => inequality_column = Some(&leaf.column),
            Some(column) if column == leaf.column => {}
            Some(column) => {
                return Err(CompileError::too_complex(format!(
                    "branch carries inequalities on both '{}' and '{}'; the store supports one inequality column per scan",
                    column, leaf.column
                )));
            }
        }
    }
    Ok(())
}

/// Points ordering columns at their derived counterparts where an orderable
/// substitution was made; non-orderable kinds keep sorting by the raw field
fn rewrite_ordering(ordering: &[SortSpec], substitutions: &[Substitution]) -> Vec<SortSpec> {
    ordering
        .iter()
        .map(|sort| {
            let derived = substitutions
                .iter()
                .find(|sub| sub.orderable && sub.column == sort.column)
                .map(|sub| sub.derived_column.clone());
            match derived {
                Some(column) => SortSpec {
                    column,
                    direction: sort.direction,
                },
                None => sort.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::context::MapCatalog;
    use crate::filter::{FilterNode, Lookup, NativeOp};
    use crate::indexing::{FieldCategory, IndexManifest, ManifestMode};
    use serde_json::json;

    fn fields() -> MapCatalog {
        MapCatalog::with_fields([
            ("name", FieldCategory::Text),
            ("age", FieldCategory::Number),
            ("score", FieldCategory::Number),
        ])
    }

    fn catalog(entries: &[(&str, &str, &str)]) -> ManifestCatalog {
        let mut manifest = IndexManifest::new();
        for (table, field, kind) in entries {
            manifest.insert(*table, *field, *kind);
        }
        ManifestCatalog::in_memory(manifest, ManifestMode::Strict)
    }

    fn compile(query: &FilterQuery, manifest: &ManifestCatalog) -> CompileResult<CompiledQuerySet> {
        let registry = IndexerRegistry::with_builtins();
        let fields = fields();
        QueryCompiler::new(&registry, manifest, &fields).compile(query)
    }

    #[test]
    fn test_simple_equality_compiles_to_one_scan() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new("users", FilterNode::eq("age", json!(30)));
        let CompiledQuerySet::Queries { conjunctions, .. } =
            compile(&query, &manifest).unwrap()
        else {
            panic!("expected scans");
        };
        assert_eq!(conjunctions.len(), 1);
        assert_eq!(
            conjunctions[0].leaves,
            vec![NativeLeaf::new("age", NativeOp::Eq, json!(30))]
        );
    }

    #[test]
    fn test_impossible_filter_is_empty_result() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new("users", FilterNode::is_in("age", vec![]));
        assert!(compile(&query, &manifest).unwrap().is_empty_result());
    }

    #[test]
    fn test_malformed_tree_rejected() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new("users", FilterNode::and(vec![]));
        assert!(matches!(
            compile(&query, &manifest),
            Err(CompileError::InvalidFilterTree { .. })
        ));
    }

    #[test]
    fn test_two_inequality_columns_in_one_branch_rejected() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new(
            "users",
            FilterNode::and(vec![
                FilterNode::gt("age", json!(18)),
                FilterNode::lt("score", json!(10)),
            ]),
        );
        assert!(matches!(
            compile(&query, &manifest),
            Err(CompileError::QueryTooComplex { .. })
        ));
    }

    #[test]
    fn test_two_inequalities_on_same_column_allowed() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new(
            "users",
            FilterNode::range("age", json!(18), json!(65)),
        );
        let CompiledQuerySet::Queries { conjunctions, .. } =
            compile(&query, &manifest).unwrap()
        else {
            panic!("expected scans");
        };
        assert_eq!(conjunctions[0].leaves.len(), 2);
    }

    #[test]
    fn test_exclusion_keys_attach_to_every_conjunction() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new(
            "users",
            FilterNode::and(vec![
                FilterNode::eq("age", json!(30)),
                FilterNode::not(FilterNode::eq("_id", json!("k1"))),
            ]),
        );
        let CompiledQuerySet::Queries { conjunctions, .. } =
            compile(&query, &manifest).unwrap()
        else {
            panic!("expected scans");
        };
        assert_eq!(conjunctions.len(), 1);
        assert_eq!(conjunctions[0].excluded_keys, vec![json!("k1")]);

        let doc = json!({"_id": "k1", "age": 30});
        assert!(!conjunctions[0].matches(&doc, "_id"));
        let other = json!({"_id": "k2", "age": 30});
        assert!(conjunctions[0].matches(&other, "_id"));
    }

    #[test]
    fn test_ordering_rewritten_for_orderable_substitution() {
        let manifest = catalog(&[("users", "name", "iexact")]);
        let query = FilterQuery::new(
            "users",
            FilterNode::leaf("name", Lookup::IExact, json!("Bob")),
        )
        .order_by(SortSpec::asc("name"))
        .order_by(SortSpec::desc("age"));

        let CompiledQuerySet::Queries { ordering, .. } = compile(&query, &manifest).unwrap()
        else {
            panic!("expected scans");
        };
        assert_eq!(ordering[0].column, "_idx_iexact_name");
        assert_eq!(ordering[1].column, "age");
    }

    #[test]
    fn test_ordering_untouched_for_non_orderable_substitution() {
        let manifest = catalog(&[("users", "name", "contains")]);
        let query = FilterQuery::new(
            "users",
            FilterNode::leaf("name", Lookup::Contains, json!("ob")),
        )
        .order_by(SortSpec::asc("name"));

        let CompiledQuerySet::Queries { ordering, .. } = compile(&query, &manifest).unwrap()
        else {
            panic!("expected scans");
        };
        assert_eq!(ordering[0].column, "name");
    }

    #[test]
    fn test_or_produces_one_conjunction_per_alternative() {
        let manifest = catalog(&[]);
        let query = FilterQuery::new(
            "users",
            FilterNode::or(vec![
                FilterNode::eq("age", json!(1)),
                FilterNode::eq("age", json!(2)),
                FilterNode::eq("age", json!(1)),
            ]),
        );
        let CompiledQuerySet::Queries { conjunctions, .. } =
            compile(&query, &manifest).unwrap()
        else {
            panic!("expected scans");
        };
        // The duplicate alternative collapses
        assert_eq!(conjunctions.len(), 2);
    }

    #[test]
    fn test_zero_branch_ceiling_rejected() {
        let registry = IndexerRegistry::with_builtins();
        let manifest = catalog(&[]);
        let fields = fields();
        let compiler = QueryCompiler::with_config(
            &registry,
            &manifest,
            &fields,
            CompilerConfig::new().with_max_branches(0),
        );
        let query = FilterQuery::new("users", FilterNode::eq("age", json!(1)));
        assert!(compiler.compile(&query).is_err());
    }
}
