//! Date/time component indexer
//!
//! Stores the integer component (year, month, day, weekday, hour, minute,
//! second) of a date/time value so component lookups become exact matches.
//! Date/time values are stored in RFC 3339 text form; date-only and naive
//! forms are accepted as well.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde_json::Value;

use super::{FieldCategory, Indexer, IndexingLimits, IndexingResult};
use crate::filter::Lookup;

/// A date/time component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    /// Day of week, 1 = Sunday through 7 = Saturday
    WeekDay,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    /// All parts in declaration order
    pub const ALL: [DatePart; 7] = [
        DatePart::Year,
        DatePart::Month,
        DatePart::Day,
        DatePart::WeekDay,
        DatePart::Hour,
        DatePart::Minute,
        DatePart::Second,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::WeekDay => "week_day",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
        }
    }

    /// Maps a date-part lookup onto its component
    pub fn from_lookup(lookup: Lookup) -> Option<Self> {
        match lookup {
            Lookup::Year => Some(DatePart::Year),
            Lookup::Month => Some(DatePart::Month),
            Lookup::Day => Some(DatePart::Day),
            Lookup::WeekDay => Some(DatePart::WeekDay),
            Lookup::Hour => Some(DatePart::Hour),
            Lookup::Minute => Some(DatePart::Minute),
            Lookup::Second => Some(DatePart::Second),
            _ => None,
        }
    }

    fn from_kind(kind: &str) -> Option<Self> {
        DatePart::ALL.iter().copied().find(|p| p.as_str() == kind)
    }
}

/// Parses a stored date/time value into a naive UTC timestamp
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

/// Extracts an integer component from a date/time value.
///
/// Returns None when the value is not a recognizable date/time.
pub fn extract_part(value: &Value, part: DatePart) -> Option<i64> {
    let dt = parse_datetime(value.as_str()?)?;
    let component = match part {
        DatePart::Year => i64::from(dt.year()),
        DatePart::Month => i64::from(dt.month()),
        DatePart::Day => i64::from(dt.day()),
        DatePart::WeekDay => i64::from(dt.weekday().number_from_sunday()),
        DatePart::Hour => i64::from(dt.hour()),
        DatePart::Minute => i64::from(dt.minute()),
        DatePart::Second => i64::from(dt.second()),
    };
    Some(component)
}

/// Emulates date/time component lookups via stored integer components.
pub struct DatePartIndexer;

impl Indexer for DatePartIndexer {
    fn name(&self) -> &'static str {
        "date_part"
    }

    fn handles(&self, category: FieldCategory, lookup: Lookup) -> bool {
        category == FieldCategory::DateTime && lookup.is_date_part()
    }

    fn index_kind(&self, lookup: Lookup, _query_value: &Value) -> IndexingResult<String> {
        let part = DatePart::from_lookup(lookup).map(|p| p.as_str()).unwrap_or("year");
        Ok(part.to_string())
    }

    fn matches_kind(&self, kind: &str) -> bool {
        DatePart::from_kind(kind).is_some()
    }

    fn derive_write_values(
        &self,
        kind: &str,
        value: &Value,
        _limits: &IndexingLimits,
    ) -> IndexingResult<Option<Vec<Value>>> {
        let Some(part) = DatePart::from_kind(kind) else {
            return Ok(None);
        };
        Ok(extract_part(value, part).map(|n| vec![Value::from(n)]))
    }

    fn derive_query_value(&self, lookup: Lookup, value: &Value) -> IndexingResult<Value> {
        // Integer literals pass through; date/time literals contribute their
        // component; anything else is left unchanged and simply never matches.
        if value.is_i64() || value.is_u64() {
            return Ok(value.clone());
        }
        let Some(part) = DatePart::from_lookup(lookup) else {
            return Ok(value.clone());
        };
        Ok(match extract_part(value, part) {
            Some(n) => Value::from(n),
            None => value.clone(),
        })
    }

    fn orderable(&self) -> bool {
        true
    }
}
