//! Tree preprocessor
//!
//! One recursive top-to-bottom pass over the input tree that leaves only
//! native leaves behind:
//! - pushes negation down (De Morgan on branches, complements on leaves)
//! - explodes IN, ISNULL and RANGE into native equivalents
//! - explodes negated equality, or diverts it into the primary-key
//!   exclusion set when the exclusion context is active
//! - removes the redundant isnull leaf from negated AND groups
//! - substitutes emulated lookups with their derived-index equivalents,
//!   enforcing the manifest
//!
//! The pass is pure with respect to the input: it allocates a new tree.
//! `And(vec![])` encodes "matches everything" (a dropped constraint) and
//! `Or(vec![])` encodes "matches nothing" (an impossible filter), so both
//! degenerate cases flow through DNF without special cases.

use std::sync::Arc;

use serde_json::Value;

use super::context::{FieldCatalog, FilterQuery};
use super::errors::{CompileError, CompileResult};
use crate::filter::{Connector, FilterLeaf, FilterNode, Lookup, NativeLeaf, NativeOp};
use crate::indexing::{IndexManifest, IndexerRegistry, ManifestCatalog};

/// Preprocessed tree: native leaves under plain AND/OR, no negation
#[derive(Debug, Clone, PartialEq)]
pub enum PreTree {
    Leaf(NativeLeaf),
    /// Conjunction; empty means "matches everything"
    And(Vec<PreTree>),
    /// Disjunction; empty means "matches nothing"
    Or(Vec<PreTree>),
}

/// An index substitution performed during preprocessing, recorded so the
/// ordering rewrite can follow the column rename
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    /// Original column
    pub column: String,
    /// Index kind that replaced it
    pub kind: String,
    /// Derived column now carrying the predicate
    pub derived_column: String,
    /// Whether the derived column preserves the original ordering
    pub orderable: bool,
}

/// Everything the preprocessing pass produced
#[derive(Debug)]
pub struct PreprocessOutcome {
    pub tree: PreTree,
    /// Primary-key values diverted for in-memory exclusion
    pub excluded_keys: Vec<Value>,
    pub substitutions: Vec<Substitution>,
}

pub struct Preprocessor<'a, C: FieldCatalog> {
    registry: &'a IndexerRegistry,
    catalog: &'a ManifestCatalog,
    fields: &'a C,
    table: &'a str,
    primary_key: &'a str,
    exclusion_active: bool,
    manifest: Arc<IndexManifest>,
    excluded_keys: Vec<Value>,
    substitutions: Vec<Substitution>,
}

impl<'a, C: FieldCatalog> Preprocessor<'a, C> {
    pub fn new(
        registry: &'a IndexerRegistry,
        catalog: &'a ManifestCatalog,
        fields: &'a C,
        query: &'a FilterQuery,
        exclusion_active: bool,
    ) -> CompileResult<Self> {
        Ok(Self {
            registry,
            catalog,
            fields,
            table: &query.table,
            primary_key: &query.primary_key,
            exclusion_active,
            manifest: catalog.snapshot()?,
            excluded_keys: Vec::new(),
            substitutions: Vec::new(),
        })
    }

    /// Runs the pass over the query's filter tree
    pub fn run(mut self, filter: &FilterNode) -> CompileResult<PreprocessOutcome> {
        let tree = self.walk(filter, false)?;
        Ok(PreprocessOutcome {
            tree,
            excluded_keys: self.excluded_keys,
            substitutions: self.substitutions,
        })
    }

    fn walk(&mut self, node: &FilterNode, negated: bool) -> CompileResult<PreTree> {
        match node {
            FilterNode::Leaf(leaf) => self.leaf(leaf, negated),
            FilterNode::Branch {
                connector,
                negated: own,
                children,
            } => {
                let effective = negated ^ own;
                let kept = if effective && *connector == Connector::And {
                    prune_redundant_isnull(children)
                } else {
                    children.iter().collect()
                };

                let parts = kept
                    .into_iter()
                    .map(|child| self.walk(child, effective))
                    .collect::<CompileResult<Vec<_>>>()?;

                // De Morgan: negation flips the connector for the children
                // already walked with the effective flag
                let out_connector = if effective {
                    connector.inverted()
                } else {
                    *connector
                };
                Ok(match out_connector {
                    Connector::And => PreTree::And(parts),
                    Connector::Or => PreTree::Or(parts),
                })
            }
        }
    }

    fn leaf(&mut self, leaf: &FilterLeaf, negated: bool) -> CompileResult<PreTree> {
        if negated {
            self.negated_leaf(leaf)
        } else {
            self.plain_leaf(leaf)
        }
    }

    fn plain_leaf(&mut self, leaf: &FilterLeaf) -> CompileResult<PreTree> {
        match leaf.lookup {
            Lookup::Eq => Ok(self.equality(leaf.column.clone(), leaf.value.clone())),
            Lookup::Lt => Ok(native(leaf, NativeOp::Lt)),
            Lookup::Lte => Ok(native(leaf, NativeOp::Lte)),
            Lookup::Gt => Ok(native(leaf, NativeOp::Gt)),
            Lookup::Gte => Ok(native(leaf, NativeOp::Gte)),
            Lookup::In => {
                let options = list_value(leaf)?;
                let alternatives = options
                    .iter()
                    .map(|v| self.equality(leaf.column.clone(), v.clone()))
                    .collect();
                Ok(PreTree::Or(alternatives))
            }
            Lookup::IsNull => {
                let want_null = bool_value(leaf)?;
                Ok(self.isnull(&leaf.column, want_null))
            }
            Lookup::Range => {
                let (lo, hi) = range_bounds(leaf)?;
                Ok(PreTree::And(vec![
                    PreTree::Leaf(NativeLeaf::new(&leaf.column, NativeOp::Gte, lo)),
                    PreTree::Leaf(NativeLeaf::new(&leaf.column, NativeOp::Lte, hi)),
                ]))
            }
            _ => self.substitute(leaf).map(PreTree::Leaf),
        }
    }

    fn negated_leaf(&mut self, leaf: &FilterLeaf) -> CompileResult<PreTree> {
        match leaf.lookup {
            Lookup::Eq => Ok(self.negated_equality(&leaf.column, &leaf.value)),
            Lookup::Lt => Ok(native(leaf, NativeOp::Gte)),
            Lookup::Lte => Ok(native(leaf, NativeOp::Gt)),
            Lookup::Gt => Ok(native(leaf, NativeOp::Lte)),
            Lookup::Gte => Ok(native(leaf, NativeOp::Lt)),
            Lookup::In => {
                let options = list_value(leaf)?;
                // An empty excluded set excludes nothing: the leaf drops out
                let required = options
                    .iter()
                    .map(|v| self.negated_equality(&leaf.column, v))
                    .collect();
                Ok(PreTree::And(required))
            }
            Lookup::IsNull => {
                let want_null = bool_value(leaf)?;
                Ok(self.isnull(&leaf.column, !want_null))
            }
            Lookup::Range => {
                let (lo, hi) = range_bounds(leaf)?;
                Ok(PreTree::Or(vec![
                    PreTree::Leaf(NativeLeaf::new(&leaf.column, NativeOp::Lt, lo)),
                    PreTree::Leaf(NativeLeaf::new(&leaf.column, NativeOp::Gt, hi)),
                ]))
            }
            _ => Err(CompileError::unsupported_operator(
                &leaf.column,
                &leaf.lookup_name,
                "the store cannot express the complement of an index-emulated lookup",
            )),
        }
    }

    /// Native equality with the impossible-key short circuit
    fn equality(&self, column: String, value: Value) -> PreTree {
        if column == self.primary_key && value.is_null() {
            // Keys are never null; this branch can never match
            return PreTree::Or(Vec::new());
        }
        PreTree::Leaf(NativeLeaf::new(column, NativeOp::Eq, value))
    }

    fn negated_equality(&mut self, column: &str, value: &Value) -> PreTree {
        if column == self.primary_key {
            if value.is_null() {
                // NOT (key = null) holds for every record
                return PreTree::And(Vec::new());
            }
            if self.exclusion_active {
                if !self.excluded_keys.contains(value) {
                    self.excluded_keys.push(value.clone());
                }
                return PreTree::And(Vec::new());
            }
        }
        PreTree::Or(vec![
            PreTree::Leaf(NativeLeaf::new(column, NativeOp::Lt, value.clone())),
            PreTree::Leaf(NativeLeaf::new(column, NativeOp::Gt, value.clone())),
        ])
    }

    /// Null occupies its own rank in the store's total order, so "is not
    /// null" is expressible as bounds around the null point.
    fn isnull(&self, column: &str, want_null: bool) -> PreTree {
        if want_null {
            // Same impossible-key handling as an explicit `= null`
            self.equality(column.to_string(), Value::Null)
        } else {
            PreTree::Or(vec![
                PreTree::Leaf(NativeLeaf::new(column, NativeOp::Lt, Value::Null)),
                PreTree::Leaf(NativeLeaf::new(column, NativeOp::Gt, Value::Null)),
            ])
        }
    }

    /// Rewrites an emulated leaf to its derived-index equivalent
    fn substitute(&mut self, leaf: &FilterLeaf) -> CompileResult<NativeLeaf> {
        let category = self.fields.category(&leaf.column).ok_or_else(|| {
            CompileError::unsupported_operator(
                &leaf.column,
                &leaf.lookup_name,
                "column is not in the field catalog",
            )
        })?;

        let indexer = self.registry.find(category, leaf.lookup).ok_or_else(|| {
            CompileError::unsupported_operator(
                &leaf.column,
                &leaf.lookup_name,
                "no registered indexer handles this lookup for this field category",
            )
        })?;

        let kind = indexer.index_kind(leaf.lookup, &leaf.value)?;
        if !self.manifest.contains(self.table, &leaf.column, &kind) {
            if self.catalog.mode().allows_auto_provision() {
                self.catalog.provision(self.table, &leaf.column, &kind)?;
            } else {
                return Err(CompileError::missing_index(self.table, &leaf.column, kind));
            }
        }

        let derived_column = indexer.derived_column(&leaf.column, &kind);
        let value = indexer.derive_query_value(leaf.lookup, &leaf.value)?;
        self.substitutions.push(Substitution {
            column: leaf.column.clone(),
            kind,
            derived_column: derived_column.clone(),
            orderable: indexer.orderable(),
        });
        Ok(NativeLeaf::new(derived_column, indexer.native_operator(), value))
    }
}

fn native(leaf: &FilterLeaf, op: NativeOp) -> PreTree {
    PreTree::Leaf(NativeLeaf::new(&leaf.column, op, leaf.value.clone()))
}

fn list_value(leaf: &FilterLeaf) -> CompileResult<&Vec<Value>> {
    match &leaf.value {
        Value::Array(items) => Ok(items),
        _ => Err(CompileError::invalid_tree(format!(
            "'{}' lookup on '{}' requires a list value",
            leaf.lookup_name, leaf.column
        ))),
    }
}

fn bool_value(leaf: &FilterLeaf) -> CompileResult<bool> {
    leaf.value.as_bool().ok_or_else(|| {
        CompileError::invalid_tree(format!(
            "'{}' lookup on '{}' requires a boolean value",
            leaf.lookup_name, leaf.column
        ))
    })
}

fn range_bounds(leaf: &FilterLeaf) -> CompileResult<(Value, Value)> {
    match &leaf.value {
        Value::Array(bounds) if bounds.len() == 2 => {
            Ok((bounds[0].clone(), bounds[1].clone()))
        }
        _ => Err(CompileError::invalid_tree(format!(
            "'{}' lookup on '{}' requires a two-element [lo, hi] value",
            leaf.lookup_name, leaf.column
        ))),
    }
}

/// Drops `(col ISNULL false)` from a negated AND group that also constrains
/// `col` with an equality. On this store there is no "equality never matches
/// null" rule to compensate for, so the isnull leaf is redundant, and
/// exploding it would produce an impossible three-way conjunction.
fn prune_redundant_isnull(children: &[FilterNode]) -> Vec<&FilterNode> {
    children
        .iter()
        .filter(|child| {
            let FilterNode::Leaf(leaf) = child else {
                return true;
            };
            if leaf.lookup != Lookup::IsNull || leaf.value.as_bool() != Some(false) {
                return true;
            }
            let has_eq_sibling = children.iter().any(|other| {
                matches!(
                    other,
                    FilterNode::Leaf(o) if o.lookup == Lookup::Eq && o.column == leaf.column
                )
            });
            !has_eq_sibling
        })
        .collect()
}
