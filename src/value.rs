//! Primitive value helpers shared by the validator, the operation catalog
//! and the template substitutor.
//!
//! Every resolved value is a `serde_json::Value`.

use serde_json::{Number, Value};

/// Short runtime type name, used in log lines and validation reasons.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Integral JSON number (i64 or u64 representation).
pub fn is_integer(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_i64() || n.is_u64())
}

/// Numeric view of a value. Strings and booleans are not numbers here.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Build a JSON number from a float; `None` for NaN and infinities.
pub fn float(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}

/// Build a JSON integer when `f` is integral and in range, else a float.
pub fn integral_or_float(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        float(f)
    }
}

/// Stringify a value for display and concatenation.
///
/// Strings are copied verbatim, `null` becomes the empty string and
/// everything else uses its JSON rendering.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Exact equality, except that numbers compare numerically (`1 == 1.0`).
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a) == as_f64(b),
        _ => a == b,
    }
}

/// Truncate toward zero; `None` when the result does not fit an `i64`.
pub fn truncate_i64(f: f64) -> Option<i64> {
    (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64)
}

/// Type-coerced equality used by `conditional`.
///
/// Numbers compare numerically (`1 == 1.0`); a string compares equal to a
/// number or boolean whose text form matches it.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a) == as_f64(b),
        (Value::String(s), Value::Number(_) | Value::Bool(_))
        | (Value::Number(_) | Value::Bool(_), Value::String(s)) => {
            let other = if a.is_string() { b } else { a };
            match other {
                Value::Number(_) => s
                    .trim()
                    .parse::<f64>()
                    .map(|parsed| Some(parsed) == as_f64(other))
                    .unwrap_or(false),
                _ => s.eq_ignore_ascii_case(&to_text(other)),
            }
        }
        _ => a == b,
    }
}
