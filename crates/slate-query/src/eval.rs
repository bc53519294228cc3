//! `match(selector, document) -> bool` (spec §4.1).

use bson::{Bson, Document};

use crate::error::QueryError;
use crate::operator::Condition;
use crate::path;
use crate::selector::Selector;

pub fn matches(selector: &Selector, doc: &Document) -> Result<bool, QueryError> {
    match selector {
        Selector::Field(fc) => {
            let value = path::get(doc, &fc.field);
            Ok(eval_condition(&fc.condition, value))
        }
        Selector::And(clauses) => {
            for c in clauses {
                if !matches(c, doc)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Selector::Or(clauses) => {
            for c in clauses {
                if matches(c, doc)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Selector::Nor(clauses) => {
            for c in clauses {
                if matches(c, doc)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Selector::Where(f) => Ok(f(doc)),
    }
}

/// Evaluate one leaf condition against the (possibly absent) value at a field.
///
/// Equality against an array field matches if the array contains the value
/// (spec §4.1); most other operators follow the same "reach into arrays"
/// convention except where it would be meaningless (`$exists`, `$size`).
fn eval_condition(condition: &Condition, value: Option<&Bson>) -> bool {
    match condition {
        Condition::Eq(target) => value_eq(value, target),
        Condition::Ne(target) => !value_eq(value, target),
        Condition::Gt(target) => compare_any(value, target, |o| o == std::cmp::Ordering::Greater),
        Condition::Gte(target) => compare_any(value, target, |o| o != std::cmp::Ordering::Less),
        Condition::Lt(target) => compare_any(value, target, |o| o == std::cmp::Ordering::Less),
        Condition::Lte(target) => compare_any(value, target, |o| o != std::cmp::Ordering::Greater),
        Condition::In(set) => set.iter().any(|t| value_eq(value, t)),
        Condition::Nin(set) => !set.iter().any(|t| value_eq(value, t)),
        Condition::Exists(want) => value.is_some() == *want,
        Condition::Regex(re) => match value {
            Some(Bson::String(s)) => re.is_match(s),
            Some(Bson::Array(items)) => items
                .iter()
                .any(|v| matches!(v, Bson::String(s) if re.is_match(s))),
            _ => false,
        },
        Condition::Size(n) => match value {
            Some(Bson::Array(items)) => items.len() as i64 == *n,
            _ => false,
        },
        Condition::All(wanted) => match value {
            Some(Bson::Array(items)) => wanted.iter().all(|w| items.iter().any(|v| v == w)),
            _ => wanted.is_empty(),
        },
        Condition::ElemMatch(sub) => match value {
            Some(Bson::Array(items)) => items.iter().any(|item| {
                let wrapped = match item {
                    Bson::Document(d) => d.clone(),
                    other => {
                        let mut d = Document::new();
                        d.insert("", other.clone());
                        d
                    }
                };
                crate::eval::matches(sub, &wrapped).unwrap_or(false)
            }),
            _ => false,
        },
        Condition::Type(ty) => value.is_some_and(|v| ty.matches(v)),
        Condition::Not(inner) => !eval_condition(inner, value),
        Condition::Mod(divisor, remainder) => match value.and_then(as_i64) {
            Some(n) => divisor != &0 && n % divisor == *remainder,
            None => false,
        },
    }
}

/// Equality with array "contains" semantics and numeric/date coercion.
fn value_eq(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) => {
            items.iter().any(|v| bson_eq(v, target)) || bson_eq(&Bson::Array(items.clone()), target)
        }
        Some(v) => bson_eq(v, target),
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if a == b {
        return true;
    }
    // Numeric/date cross-type equality (policy: coerce rather than refuse).
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x == y;
    }
    false
}

/// `$gt/$gte/$lt/$lte` against an array field match if *any* element
/// satisfies the comparison, matching the array "contains" convention used
/// for equality.
fn compare_any(value: Option<&Bson>, target: &Bson, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items.iter().any(|v| compare_one(v, target, &accept)),
        Some(v) => compare_one(v, target, &accept),
        None => false,
    }
}

fn compare_one(value: &Bson, target: &Bson, accept: &impl Fn(std::cmp::Ordering) -> bool) -> bool {
    match bson_cmp(value, target) {
        Some(ord) => accept(ord),
        // Type mismatch: non-match rather than error (spec §4.1 failure modes).
        None => false,
    }
}

fn bson_cmp(a: &Bson, b: &Bson) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Numeric/date coercion used by comparisons: ints, floats and dates (as
/// epoch millis) are all comparable with each other.
fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        Bson::DateTime(dt) => Some(dt.timestamp_millis() as f64),
        _ => None,
    }
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) => Some(*n as i64),
        _ => None,
    }
}
