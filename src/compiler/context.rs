//! Compilation inputs and the exclusion-context pre-pass
//!
//! A [`FilterQuery`] bundles everything one compilation call consumes: the
//! target table, its primary-key column, the filter tree, and the requested
//! ordering. Field categories come from a read-only [`FieldCatalog`]
//! provided by the ORM collaborator.

use std::collections::{BTreeSet, HashMap};

use crate::filter::{Connector, FilterNode, Lookup, SortSpec};
use crate::indexing::FieldCategory;

/// Read-only column category lookup, provided by the caller
pub trait FieldCatalog {
    /// Category of a column, or None if unknown
    fn category(&self, column: &str) -> Option<FieldCategory>;
}

/// Map-backed catalog, convenient for callers and tests
#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    categories: HashMap<String, FieldCategory>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from (column, category) pairs
    pub fn with_fields(
        fields: impl IntoIterator<Item = (impl Into<String>, FieldCategory)>,
    ) -> Self {
        Self {
            categories: fields
                .into_iter()
                .map(|(name, cat)| (name.into(), cat))
                .collect(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, category: FieldCategory) {
        self.categories.insert(column.into(), category);
    }
}

impl FieldCatalog for MapCatalog {
    fn category(&self, column: &str) -> Option<FieldCategory> {
        self.categories.get(column).copied()
    }
}

/// One compilation request
#[derive(Debug, Clone)]
pub struct FilterQuery {
    /// Target table name
    pub table: String,
    /// Primary-key column name
    pub primary_key: String,
    /// Filter tree
    pub filter: FilterNode,
    /// Requested ordering, outermost column first
    pub ordering: Vec<SortSpec>,
}

impl FilterQuery {
    /// Creates a request with the default `_id` primary key and no ordering
    pub fn new(table: impl Into<String>, filter: FilterNode) -> Self {
        Self {
            table: table.into(),
            primary_key: "_id".to_string(),
            filter,
            ordering: Vec::new(),
        }
    }

    /// Overrides the primary-key column
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Appends an ordering column
    pub fn order_by(mut self, sort: SortSpec) -> Self {
        self.ordering.push(sort);
        self
    }
}

/// Decides whether the in-memory primary-key exclusion strategy is sound for
/// this query.
///
/// It is, when the negation-pushed tree contains no disjunction anywhere and
/// the inequality-bearing columns are one of: none at all, exactly one
/// non-primary-key column, or the primary key alone with an ordering not led
/// by it. Diverting negated primary-key equalities into an exclusion set then
/// avoids doubling the branch count per excluded key.
pub fn exclusion_permitted(query: &FilterQuery) -> bool {
    if contains_disjunction(&query.filter, false) {
        return false;
    }

    let mut columns = BTreeSet::new();
    collect_inequality_columns(&query.filter, false, &query.primary_key, &mut columns);

    match columns.len() {
        0 => true,
        1 => {
            let column = columns.iter().next().map(String::as_str).unwrap_or("");
            if column != query.primary_key {
                return true;
            }
            // Inequality on the key itself: sound unless the ordering leads
            // with that same column.
            query
                .ordering
                .first()
                .map(|sort| sort.column != query.primary_key)
                .unwrap_or(true)
        }
        _ => false,
    }
}

/// True if any node acts as a disjunction once negation is pushed down.
///
/// A literal OR is one, but so is a negated AND with two or more children
/// (De Morgan). Exclusion applies to every compiled branch, so it is only
/// sound when the whole tree is one conjunction. A single-child branch
/// carries no alternation regardless of its connector, which keeps the plain
/// negated-leaf wrapper eligible.
fn contains_disjunction(node: &FilterNode, negated: bool) -> bool {
    match node {
        FilterNode::Leaf(_) => false,
        FilterNode::Branch {
            connector,
            negated: own,
            children,
        } => {
            let effective = negated ^ own;
            let effective_connector = if effective {
                connector.inverted()
            } else {
                *connector
            };
            if effective_connector == Connector::Or && children.len() > 1 {
                return true;
            }
            children
                .iter()
                .any(|child| contains_disjunction(child, effective))
        }
    }
}

/// Columns that will carry a native inequality after preprocessing.
///
/// Range-class lookups always do. A negated equality or membership test on a
/// non-key column explodes into inequalities too; on the key column it is
/// exactly the leaf the exclusion strategy would divert, so it is not
/// counted.
fn collect_inequality_columns(
    node: &FilterNode,
    negated: bool,
    primary_key: &str,
    out: &mut BTreeSet<String>,
) {
    match node {
        FilterNode::Branch {
            negated: own,
            children,
            ..
        } => {
            for child in children {
                collect_inequality_columns(child, negated ^ own, primary_key, out);
            }
        }
        FilterNode::Leaf(leaf) => {
            let bears_inequality = match leaf.lookup {
                Lookup::Lt | Lookup::Lte | Lookup::Gt | Lookup::Gte | Lookup::Range => true,
                Lookup::Eq | Lookup::In => negated && leaf.column != primary_key,
                // isnull=false (after negation) explodes to bounds around null
                Lookup::IsNull => leaf.value.as_bool().unwrap_or(false) == negated,
                _ => false,
            };
            if bears_inequality {
                out.insert(leaf.column.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortSpec;
    use serde_json::json;

    fn query(filter: FilterNode) -> FilterQuery {
        FilterQuery::new("users", filter)
    }

    #[test]
    fn test_or_anywhere_disables_exclusion() {
        let q = query(FilterNode::or(vec![
            FilterNode::eq("a", json!(1)),
            FilterNode::eq("b", json!(2)),
        ]));
        assert!(!exclusion_permitted(&q));

        let nested = query(FilterNode::and(vec![
            FilterNode::eq("a", json!(1)),
            FilterNode::or(vec![
                FilterNode::eq("b", json!(2)),
                FilterNode::eq("b", json!(3)),
            ]),
        ]));
        assert!(!exclusion_permitted(&nested));
    }

    #[test]
    fn test_negated_and_counts_as_disjunction() {
        // NOT (pk = k1 AND a = 5) is an OR after De Morgan; diverting the
        // key here would wrongly exclude k1 from the a != 5 alternatives
        let q = query(FilterNode::not(FilterNode::and(vec![
            FilterNode::eq("_id", json!("k1")),
            FilterNode::eq("a", json!(5)),
        ])));
        assert!(!exclusion_permitted(&q));
    }

    #[test]
    fn test_negated_or_counts_as_conjunction() {
        let q = query(FilterNode::not(FilterNode::or(vec![
            FilterNode::eq("_id", json!("k1")),
            FilterNode::eq("a", json!(5)),
        ])));
        assert!(exclusion_permitted(&q));
    }

    #[test]
    fn test_no_inequalities_permits_exclusion() {
        let q = query(FilterNode::and(vec![
            FilterNode::eq("a", json!(1)),
            FilterNode::not(FilterNode::eq("_id", json!("k1"))),
        ]));
        assert!(exclusion_permitted(&q));
    }

    #[test]
    fn test_single_non_key_inequality_permits_exclusion() {
        let q = query(FilterNode::and(vec![
            FilterNode::gt("age", json!(18)),
            FilterNode::eq("status", json!("active")),
        ]));
        assert!(exclusion_permitted(&q));
    }

    #[test]
    fn test_two_inequality_columns_deny_exclusion() {
        let q = query(FilterNode::and(vec![
            FilterNode::gt("age", json!(18)),
            FilterNode::lt("score", json!(10)),
        ]));
        assert!(!exclusion_permitted(&q));
    }

    #[test]
    fn test_key_inequality_depends_on_ordering() {
        let filter = FilterNode::gt("_id", json!("k"));

        let unordered = query(filter.clone());
        assert!(exclusion_permitted(&unordered));

        let by_other = query(filter.clone()).order_by(SortSpec::asc("age"));
        assert!(exclusion_permitted(&by_other));

        let by_key = query(filter).order_by(SortSpec::asc("_id"));
        assert!(!exclusion_permitted(&by_key));
    }

    #[test]
    fn test_negated_equality_counts_as_inequality_on_non_key() {
        let q = query(FilterNode::and(vec![
            FilterNode::gt("age", json!(18)),
            FilterNode::not(FilterNode::eq("name", json!("bob"))),
        ]));
        // age plus the exploded name inequality: two columns
        assert!(!exclusion_permitted(&q));
    }

    #[test]
    fn test_isnull_false_counts_as_inequality() {
        let q = query(FilterNode::and(vec![
            FilterNode::isnull("email", false),
            FilterNode::gt("age", json!(18)),
        ]));
        assert!(!exclusion_permitted(&q));
    }

    #[test]
    fn test_map_catalog_lookup() {
        let catalog = MapCatalog::with_fields([
            ("name", FieldCategory::Text),
            ("age", FieldCategory::Number),
        ]);
        assert_eq!(catalog.category("name"), Some(FieldCategory::Text));
        assert_eq!(catalog.category("missing"), None);
    }
}
