//! Total order over filter values
//!
//! The target store sorts every value into a single total order; null
//! occupies its own rank below all typed values. The explosion rules
//! (`isnull=false` becomes `col > null`, negated equality becomes
//! `< v OR > v`) and the reference evaluator both depend on this one
//! definition, so it lives in exactly one place.
//!
//! Rank order: null < bool < number < string < array < object.

use std::cmp::Ordering;

use serde_json::Value;

/// Type rank of a value in the store's total order
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compares two values under the store's total order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            // Integer comparison when both sides are integral, float otherwise
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return xi.cmp(&yi);
            }
            let xf = x.as_f64().unwrap_or(0.0);
            let yf = y.as_f64().unwrap_or(0.0);
            xf.partial_cmp(&yf).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xe, ye) in x.iter().zip(y.iter()) {
                let ord = compare_values(xe, ye);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        // Objects are not orderable by the store; fall back to their
        // serialized form so the order stays total and deterministic.
        (x, y) => {
            let xs = x.to_string();
            let ys = y.to_string();
            xs.cmp(&ys)
        }
    }
}

/// Equality under the store's total order
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}
