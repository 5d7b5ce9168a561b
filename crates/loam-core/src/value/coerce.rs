use crate::value::{Value, ValueKind};
use ulid::Ulid;

/// Attempt a lossless conversion of `value` into the storage shape `target`.
///
/// Returns `None` when no generic conversion exists (or it would lose
/// information). Values already of the target kind, `Null`, and any target of
/// `ValueKind::Any` pass through unchanged.
#[must_use]
pub fn coerce(value: &Value, target: ValueKind) -> Option<Value> {
    if value.matches_kind(target) {
        return Some(value.clone());
    }

    match (value, target) {
        // text → scalar
        (Value::Text(text), ValueKind::Int) => text.trim().parse().ok().map(Value::Int),
        (Value::Text(text), ValueKind::Uint) => text.trim().parse().ok().map(Value::Uint),
        (Value::Text(text), ValueKind::Float) => text.trim().parse().ok().map(Value::Float),
        (Value::Text(text), ValueKind::Bool) => parse_bool(text).map(Value::Bool),
        (Value::Text(text), ValueKind::Ulid) => {
            Ulid::from_string(text.trim()).ok().map(Value::Ulid)
        }
        (Value::Text(text), ValueKind::Blob) => Some(Value::Blob(text.as_bytes().to_vec())),

        // scalar → text
        (Value::Int(v), ValueKind::Text) => Some(Value::Text(v.to_string())),
        (Value::Uint(v), ValueKind::Text) => Some(Value::Text(v.to_string())),
        (Value::Float(v), ValueKind::Text) => Some(Value::Text(v.to_string())),
        (Value::Bool(v), ValueKind::Text) => Some(Value::Text(v.to_string())),
        (Value::Ulid(v), ValueKind::Text) => Some(Value::Text(v.to_string())),

        // numeric widening / sign changes that keep the value
        (Value::Int(v), ValueKind::Uint) => u64::try_from(*v).ok().map(Value::Uint),
        (Value::Uint(v), ValueKind::Int) => i64::try_from(*v).ok().map(Value::Int),
        (Value::Int(v), ValueKind::Float) => exact_f64_from_i64(*v).map(Value::Float),
        (Value::Uint(v), ValueKind::Float) => exact_f64_from_u64(*v).map(Value::Float),
        (Value::Float(v), ValueKind::Int) => exact_i64_from_f64(*v).map(Value::Int),
        (Value::Float(v), ValueKind::Uint) => {
            exact_i64_from_f64(*v).and_then(|n| u64::try_from(n).ok().map(Value::Uint))
        }

        // ulid ↔ 128-bit identity carried as blob
        (Value::Ulid(v), ValueKind::Blob) => Some(Value::Blob(v.to_bytes().to_vec())),

        _ => None,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// f64 carries 53 bits of mantissa; outside that range integers stop being exact.
const F64_SAFE_INT: i64 = 1i64 << 53;

#[expect(clippy::cast_precision_loss)]
fn exact_f64_from_i64(v: i64) -> Option<f64> {
    (-F64_SAFE_INT..=F64_SAFE_INT).contains(&v).then_some(v as f64)
}

#[expect(clippy::cast_precision_loss)]
fn exact_f64_from_u64(v: u64) -> Option<f64> {
    (v <= F64_SAFE_INT.unsigned_abs()).then_some(v as f64)
}

#[expect(clippy::cast_possible_truncation)]
fn exact_i64_from_f64(v: f64) -> Option<i64> {
    #[expect(clippy::cast_precision_loss)]
    let bound = F64_SAFE_INT as f64;

    if v.fract() != 0.0 || !v.is_finite() || v.abs() > bound {
        return None;
    }

    Some(v as i64)
}
