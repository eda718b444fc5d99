//! Text indexers: case-insensitive equality and the containment family
//!
//! Derivation rules:
//! - iexact: one row, the lower-cased value
//! - startswith: one row per prefix length
//! - endswith: one row per suffix length
//! - contains/icontains: one row per distinct contiguous substring
//!
//! All derivations operate on character boundaries, never raw bytes.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{FieldCategory, Indexer, IndexingError, IndexingLimits, IndexingResult};
use crate::filter::Lookup;

/// Character-boundary byte offsets of `s`, including the end offset
fn char_boundaries(s: &str) -> Vec<usize> {
    let mut bounds: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    bounds.push(s.len());
    bounds
}

fn check_length(kind: &str, s: &str, limits: &IndexingLimits) -> IndexingResult<usize> {
    let chars = s.chars().count();
    if chars > limits.max_string_length {
        return Err(IndexingError::value_too_large(
            kind,
            chars,
            limits.max_string_length,
        ));
    }
    Ok(chars)
}

/// Case-insensitive equality: stores a lower-cased copy of the value.
pub struct IExactIndexer;

impl Indexer for IExactIndexer {
    fn name(&self) -> &'static str {
        "iexact"
    }

    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool {
        matches!(category, FieldCategory::Text | FieldCategory::Key) && lookup == Lookup::IExact
    }

    fn index_kind(&self, _lookup: Lookup, _query_value: &Value) -> IndexingResult<String> {
        Ok("iexact".to_string())
    }

    fn matches_kind(&self, kind: &str) -> bool {
        kind == "iexact"
    }

    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>> {
        let Some(s) = value.as_str() else {
            return Ok(None);
        };
        check_length(kind, s, limits)?;
        Ok(Some(vec![Value::String(s.to_lowercase())]))
    }

    fn derive_query_value(&self, _lookup: Lookup, value: &Value) -> IndexingResult<Value> {
        Ok(match value.as_str() {
            Some(s) => Value::String(s.to_lowercase()),
            None => value.clone(),
        })
    }

    fn orderable(&self) -> bool {
        true
    }
}

/// Prefix match: stores every prefix of the value, one row per length.
pub struct StartsWithIndexer;

impl Indexer for StartsWithIndexer {
    fn name(&self) -> &'static str {
        "startswith"
    }

    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool {
        matches!(category, FieldCategory::Text | FieldCategory::Key)
            && lookup == Lookup::StartsWith
    }

    fn index_kind(&self, _lookup: Lookup, _query_value: &Value) -> IndexingResult<String> {
        Ok("startswith".to_string())
    }

    fn matches_kind(&self, kind: &str) -> bool {
        kind == "startswith"
    }

    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>> {
        let Some(s) = value.as_str() else {
            return Ok(None);
        };
        let chars = check_length(kind, s, limits)?;
        if chars > limits.max_derived_values {
            return Err(IndexingError::value_too_large(
                kind,
                chars,
                limits.max_derived_values,
            ));
        }
        let bounds = char_boundaries(s);
        let prefixes = bounds[1..]
            .iter()
            .map(|&end| Value::String(s[..end].to_string()))
            .collect();
        Ok(Some(prefixes))
    }

    fn derive_query_value(&self, _lookup: Lookup, value: &Value) -> IndexingResult<Value> {
        Ok(value.clone())
    }
}

/// Suffix match: stores every suffix of the value, one row per length.
pub struct EndsWithIndexer;

impl Indexer for EndsWithIndexer {
    fn name(&self) -> &'static str {
        "endswith"
    }

    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool {
        matches!(category, FieldCategory::Text | FieldCategory::Key) && lookup == Lookup::EndsWith
    }

    fn index_kind(&self, _lookup: Lookup, _query_value: &Value) -> IndexingResult<String> {
        Ok("endswith".to_string())
    }

    fn matches_kind(&self, kind: &str) -> bool {
        kind == "endswith"
    }

    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>> {
        let Some(s) = value.as_str() else {
            return Ok(None);
        };
        let chars = check_length(kind, s, limits)?;
        if chars > limits.max_derived_values {
            return Err(IndexingError::value_too_large(
                kind,
                chars,
                limits.max_derived_values,
            ));
        }
        let bounds = char_boundaries(s);
        let suffixes = bounds[..bounds.len() - 1]
            .iter()
            .map(|&start| Value::String(s[start..].to_string()))
            .collect();
        Ok(Some(suffixes))
    }

    fn derive_query_value(&self, _lookup: Lookup, value: &Value) -> IndexingResult<Value> {
        Ok(value.clone())
    }
}

/// Substring match: stores every distinct contiguous substring.
///
/// The derived-row count grows quadratically with value length, so the
/// `max_derived_values` precondition is the binding limit here.
pub struct ContainsIndexer {
    casefold: bool,
}

impl ContainsIndexer {
    /// Case-sensitive substring indexer (`contains`)
    pub fn sensitive() -> Self {
        Self { casefold: false }
    }

    /// Case-insensitive substring indexer (`icontains`)
    pub fn insensitive() -> Self {
        Self { casefold: true }
    }

    fn kind_str(&self) -> &'static str {
        if self.casefold {
            "icontains"
        } else {
            "contains"
        }
    }
}

impl Indexer for ContainsIndexer {
    fn name(&self) -> &'static str {
        if self.casefold {
            "icontains"
        } else {
            "contains"
        }
    }

    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool {
        let wanted = if self.casefold {
            Lookup::IContains
        } else {
            Lookup::Contains
        };
        matches!(category, FieldCategory::Text | FieldCategory::Key) && lookup == wanted
    }

    fn index_kind(&self, _lookup: Lookup, _query_value: &Value) -> IndexingResult<String> {
        Ok(self.kind_str().to_string())
    }

    fn matches_kind(&self, kind: &str) -> bool {
        kind == self.kind_str()
    }

    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>> {
        let Some(raw) = value.as_str() else {
            return Ok(None);
        };
        let folded;
        let s = if self.casefold {
            folded = raw.to_lowercase();
            folded.as_str()
        } else {
            raw
        };
        let chars = check_length(kind, s, limits)?;
        let combinations = chars * (chars + 1) / 2;
        if combinations > limits.max_derived_values {
            return Err(IndexingError::value_too_large(
                kind,
                combinations,
                limits.max_derived_values,
            ));
        }

        let bounds = char_boundaries(s);
        let mut substrings = BTreeSet::new();
        for (i, &start) in bounds[..bounds.len() - 1].iter().enumerate() {
            for &end in &bounds[i + 1..] {
                substrings.insert(s[start..end].to_string());
            }
        }
        Ok(Some(substrings.into_iter().map(Value::String).collect()))
    }

    fn derive_query_value(&self, _lookup: Lookup, value: &Value) -> IndexingResult<Value> {
        Ok(match value.as_str() {
            Some(s) if self.casefold => Value::String(s.to_lowercase()),
            _ => value.clone(),
        })
    }
}
