//! DNF normalization
//!
//! Flattens a preprocessed tree into disjunctive normal form: a flat list of
//! branches, each branch a conjunction of native leaves. OR merges branch
//! lists; AND takes the Cartesian product of its children's branch lists.
//! Every intermediate product is checked against the branch ceiling, so a
//! pathological tree fails fast instead of allocating exponentially.
//!
//! Two dedup rules keep the output minimal:
//! - identical leaves within a branch collapse to one
//! - structurally identical branches collapse to one, regardless of the
//!   order their leaves were produced in

use std::collections::HashSet;

use super::errors::{CompileError, CompileResult};
use super::preprocess::PreTree;
use crate::filter::NativeLeaf;

/// A normalized query: OR of AND-branches
#[derive(Debug, Clone, PartialEq)]
pub struct Dnf {
    pub branches: Vec<Vec<NativeLeaf>>,
}

impl Dnf {
    /// True if no branch can match anything
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// Normalizes a preprocessed tree, enforcing the branch ceiling
pub fn normalize(tree: &PreTree, max_branches: usize) -> CompileResult<Dnf> {
    let branches = expand(tree, max_branches)?;
    Ok(Dnf {
        branches: dedup_branches(branches),
    })
}

fn expand(tree: &PreTree, max_branches: usize) -> CompileResult<Vec<Vec<NativeLeaf>>> {
    match tree {
        PreTree::Leaf(leaf) => Ok(vec![vec![leaf.clone()]]),
        PreTree::Or(children) => {
            let mut branches = Vec::new();
            for child in children {
                branches.extend(expand(child, max_branches)?);
                check_ceiling(branches.len(), max_branches)?;
            }
            Ok(branches)
        }
        PreTree::And(children) => {
            // The identity of the Cartesian product: one empty branch
            let mut acc: Vec<Vec<NativeLeaf>> = vec![Vec::new()];
            for child in children {
                let rhs = expand(child, max_branches)?;
                check_ceiling(acc.len().saturating_mul(rhs.len()), max_branches)?;

                let mut next = Vec::with_capacity(acc.len() * rhs.len());
                for left in &acc {
                    for right in &rhs {
                        next.push(merge_leaves(left, right));
                    }
                }
                acc = next;
            }
            Ok(acc)
        }
    }
}

fn check_ceiling(count: usize, max_branches: usize) -> CompileResult<()> {
    if count > max_branches {
        return Err(CompileError::too_complex(format!(
            "normalization would produce {} branches, above the ceiling of {}",
            count, max_branches
        )));
    }
    Ok(())
}

/// Concatenates two conjunctions, dropping leaves already present
fn merge_leaves(left: &[NativeLeaf], right: &[NativeLeaf]) -> Vec<NativeLeaf> {
    let mut merged = left.to_vec();
    for leaf in right {
        if !merged.contains(leaf) {
            merged.push(leaf.clone());
        }
    }
    merged
}

/// A branch key invariant under leaf order, for structural dedup
fn branch_key(branch: &[NativeLeaf]) -> String {
    let mut parts: Vec<String> = branch
        .iter()
        .map(|leaf| format!("{}\u{1}{}\u{1}{}", leaf.column, leaf.op.as_str(), leaf.value))
        .collect();
    parts.sort();
    parts.join("\u{2}")
}

fn dedup_branches(branches: Vec<Vec<NativeLeaf>>) -> Vec<Vec<NativeLeaf>> {
    let mut seen = HashSet::new();
    branches
        .into_iter()
        .filter(|branch| seen.insert(branch_key(branch)))
        .collect()
}
