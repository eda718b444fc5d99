//! Reference in-memory predicate evaluator
//!
//! Evaluates filter trees and compiled native leaves directly against JSON
//! documents. The compiler never uses this on its own behalf; it exists as
//! the reference semantics for the round-trip soundness tests and as the
//! documented subtraction behavior executors apply to exclusion sets.

use std::cmp::Ordering;

use serde_json::Value;

use super::order::{compare_values, values_equal};
use super::{Connector, FilterLeaf, FilterNode, Lookup, NativeLeaf, NativeOp};
use crate::indexing::datetime::{extract_part, DatePart};

/// Evaluates a filter tree against a document.
pub fn matches_tree(doc: &Value, node: &FilterNode) -> bool {
    match node {
        FilterNode::Leaf(leaf) => matches_leaf(doc, leaf),
        FilterNode::Branch {
            connector,
            negated,
            children,
        } => {
            let result = match connector {
                Connector::And => children.iter().all(|c| matches_tree(doc, c)),
                Connector::Or => children.iter().any(|c| matches_tree(doc, c)),
            };
            result != *negated
        }
    }
}

/// Evaluates a single compiled native leaf against a document.
pub fn matches_native(doc: &Value, leaf: &NativeLeaf) -> bool {
    let actual = field_value(doc, &leaf.column);
    let ord = compare_values(actual, &leaf.value);
    match leaf.op {
        NativeOp::Eq => ord == Ordering::Equal,
        NativeOp::Lt => ord == Ordering::Less,
        NativeOp::Lte => ord != Ordering::Greater,
        NativeOp::Gt => ord == Ordering::Greater,
        NativeOp::Gte => ord != Ordering::Less,
    }
}

/// Evaluates a single input-tree leaf against a document.
pub fn matches_leaf(doc: &Value, leaf: &FilterLeaf) -> bool {
    let actual = field_value(doc, &leaf.column);

    match leaf.lookup {
        Lookup::Eq => values_equal(actual, &leaf.value),
        Lookup::Lt => compare_values(actual, &leaf.value) == Ordering::Less,
        Lookup::Lte => compare_values(actual, &leaf.value) != Ordering::Greater,
        Lookup::Gt => compare_values(actual, &leaf.value) == Ordering::Greater,
        Lookup::Gte => compare_values(actual, &leaf.value) != Ordering::Less,
        Lookup::In => match &leaf.value {
            Value::Array(options) => options.iter().any(|v| values_equal(actual, v)),
            _ => false,
        },
        Lookup::IsNull => {
            let want_null = leaf.value.as_bool().unwrap_or(false);
            actual.is_null() == want_null
        }
        Lookup::Range => match &leaf.value {
            Value::Array(bounds) if bounds.len() == 2 => {
                compare_values(actual, &bounds[0]) != Ordering::Less
                    && compare_values(actual, &bounds[1]) != Ordering::Greater
            }
            _ => false,
        },
        Lookup::StartsWith => str_pair(actual, &leaf.value)
            .map(|(a, b)| a.starts_with(b))
            .unwrap_or(false),
        Lookup::EndsWith => str_pair(actual, &leaf.value)
            .map(|(a, b)| a.ends_with(b))
            .unwrap_or(false),
        Lookup::Contains => str_pair(actual, &leaf.value)
            .map(|(a, b)| a.contains(b))
            .unwrap_or(false),
        Lookup::IExact => str_pair(actual, &leaf.value)
            .map(|(a, b)| a.to_lowercase() == b.to_lowercase())
            .unwrap_or(false),
        Lookup::IContains => str_pair(actual, &leaf.value)
            .map(|(a, b)| a.to_lowercase().contains(&b.to_lowercase()))
            .unwrap_or(false),
        Lookup::Regex => regex_match(actual, &leaf.value, false),
        Lookup::IRegex => regex_match(actual, &leaf.value, true),
        Lookup::Year => date_part_match(actual, &leaf.value, DatePart::Year),
        Lookup::Month => date_part_match(actual, &leaf.value, DatePart::Month),
        Lookup::Day => date_part_match(actual, &leaf.value, DatePart::Day),
        Lookup::WeekDay => date_part_match(actual, &leaf.value, DatePart::WeekDay),
        Lookup::Hour => date_part_match(actual, &leaf.value, DatePart::Hour),
        Lookup::Minute => date_part_match(actual, &leaf.value, DatePart::Minute),
        Lookup::Second => date_part_match(actual, &leaf.value, DatePart::Second),
    }
}

/// Missing fields evaluate as null, matching the store's storage model.
fn field_value<'a>(doc: &'a Value, column: &str) -> &'a Value {
    doc.get(column).unwrap_or(&Value::Null)
}

fn str_pair<'a>(actual: &'a Value, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    Some((actual.as_str()?, expected.as_str()?))
}

fn regex_match(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pat)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    let source = if case_insensitive {
        format!("(?i){}", pat)
    } else {
        pat.to_string()
    };
    regex::Regex::new(&source)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn date_part_match(actual: &Value, expected: &Value, part: DatePart) -> bool {
    let Some(component) = extract_part(actual, part) else {
        return false;
    };
    // The literal may be the integer component or a full date/time value.
    match expected.as_i64() {
        Some(n) => component == n,
        None => extract_part(expected, part) == Some(component),
    }
}
