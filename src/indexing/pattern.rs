//! Regular-expression indexer
//!
//! The store cannot run patterns, so the write path precomputes the boolean
//! match result for every provisioned pattern and the query becomes an exact
//! match against literal `true`.
//!
//! The index kind encodes the pattern itself (hex, so manifest entries stay
//! mechanical to generate and diff); the derived column is keyed by a short
//! SHA-256 digest of the pattern text to keep column names bounded.

use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{FieldCategory, Indexer, IndexingError, IndexingLimits, IndexingResult};
use crate::filter::Lookup;

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    // The manifest is hand-editable; a multibyte kind string must decode to
    // None, not slice mid-character
    if !s.is_ascii() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Short digest of a pattern, used to key the derived column
fn pattern_digest(pattern: &str) -> String {
    let digest = Sha256::digest(pattern.as_bytes());
    hex_encode(&digest[..4])
}

/// Emulates `regex` and `iregex` lookups via precomputed match booleans.
pub struct RegexIndexer {
    casefold: bool,
}

impl RegexIndexer {
    /// Case-sensitive pattern indexer (`regex`)
    pub fn sensitive() -> Self {
        Self { casefold: false }
    }

    /// Case-insensitive pattern indexer (`iregex`)
    pub fn insensitive() -> Self {
        Self { casefold: true }
    }

    fn prefix(&self) -> &'static str {
        if self.casefold {
            "iregex_"
        } else {
            "regex_"
        }
    }

    /// Recovers the pattern text from a provisioned kind string
    pub fn pattern_from_kind(&self, kind: &str) -> Option<String> {
        let encoded = kind.strip_prefix(self.prefix())?;
        let bytes = hex_decode(encoded)?;
        String::from_utf8(bytes).ok()
    }

    fn compile(&self, pattern: &str) -> IndexingResult<Regex> {
        let source = if self.casefold {
            format!("(?i){}", pattern)
        } else {
            pattern.to_string()
        };
        Regex::new(&source)
            .map_err(|e| IndexingError::invalid_pattern(pattern, e.to_string()))
    }
}

impl Indexer for RegexIndexer {
    fn name(&self) -> &'static str {
        if self.casefold {
            "iregex"
        } else {
            "regex"
        }
    }

    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool {
        let wanted = if self.casefold {
            Lookup::IRegex
        } else {
            Lookup::Regex
        };
        matches!(category, FieldCategory::Text | FieldCategory::Key) && lookup == wanted
    }

    fn index_kind(&self, _lookup: Lookup, query_value: &Value) -> IndexingResult<String> {
        let Some(pattern) = query_value.as_str() else {
            return Err(IndexingError::invalid_pattern(
                query_value.to_string(),
                "pattern must be a string",
            ));
        };
        // Reject uncompilable patterns at kind derivation, before any
        // manifest lookup or provisioning happens.
        self.compile(pattern)?;
        Ok(format!("{}{}", self.prefix(), hex_encode(pattern.as_bytes())))
    }

    fn matches_kind(&self, kind: &str) -> bool {
        self.pattern_from_kind(kind).is_some()
    }

    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        _limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>> {
        let Some(pattern) = self.pattern_from_kind(kind) else {
            return Ok(None);
        };
        let Some(text) = value.as_str() else {
            return Ok(None);
        };
        let re = self.compile(&pattern)?;
        Ok(Some(vec![Value::Bool(re.is_match(text))]))
    }

    fn derive_query_value(&self, _lookup: Lookup, _value: &Value) -> IndexingResult<Value> {
        Ok(Value::Bool(true))
    }

    fn derived_column(&self, field: &str, kind: &str) -> String {
        // Column keyed by pattern digest, not the full encoded pattern
        let digest = self
            .pattern_from_kind(kind)
            .map(|p| pattern_digest(&p))
            .unwrap_or_else(|| "invalid".to_string());
        format!("_idx_{}{}_{}", self.prefix(), digest, field)
    }
}
