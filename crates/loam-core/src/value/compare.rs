use crate::value::Value;
use std::cmp::Ordering;

///
/// Value ordering
///
/// Two orderings are exposed:
///
/// - `strict_ordering`: only defined for values of comparable kinds
///   (numeric with numeric, text with text, ...). Used by predicate evaluation,
///   where comparing unrelated kinds must simply fail to match.
/// - `canonical_cmp`: total order over every value. Used for sorting, where
///   every pair needs a deterministic answer. Kinds sort by rank first.
///

/// Compare two values when their kinds are mutually comparable.
#[must_use]
pub fn strict_ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Ulid(a), Value::Ulid(b)) => Some(a.cmp(b)),
        (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => cmp_lists_strict(a, b),
        _ => numeric_ordering(left, right),
    }
}

/// Total order used for sorting.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    if let Some(ordering) = strict_ordering(left, right) {
        return ordering;
    }

    let by_rank = rank(left).cmp(&rank(right));
    if by_rank != Ordering::Equal {
        return by_rank;
    }

    // same rank but not strictly comparable: compound values and NaN
    match (left, right) {
        (Value::List(a), Value::List(b)) => cmp_lists_canonical(a, b),
        (Value::Map(a), Value::Map(b)) => a
            .iter()
            .zip(b.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| canonical_cmp(va, vb)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Record(a), Value::Record(b)) => a.name.cmp(&b.name).then_with(|| {
            a.fields
                .iter()
                .zip(b.fields.iter())
                .map(|((na, va), (nb, vb))| na.cmp(nb).then_with(|| canonical_cmp(va, vb)))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or_else(|| a.fields.len().cmp(&b.fields.len()))
        }),
        (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
        _ => Ordering::Equal,
    }
}

// ----------------------------------------------------------------------
// helpers
// ----------------------------------------------------------------------

// Null sorts first; numeric kinds share a rank so they interleave by value.
const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Uint(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Ulid(_) => 4,
        Value::Blob(_) => 5,
        Value::List(_) => 6,
        Value::Map(_) => 7,
        Value::Record(_) => 8,
    }
}

#[expect(clippy::cast_precision_loss)]
fn numeric_ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Uint(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Uint(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        _ => None,
    }
}

fn cmp_lists_strict(left: &[Value], right: &[Value]) -> Option<Ordering> {
    for (a, b) in left.iter().zip(right) {
        match strict_ordering(a, b)? {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }

    Some(left.len().cmp(&right.len()))
}

fn cmp_lists_canonical(left: &[Value], right: &[Value]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(a, b)| canonical_cmp(a, b))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or_else(|| left.len().cmp(&right.len()))
}
