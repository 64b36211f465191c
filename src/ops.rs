//! Computed-operation catalog (v0.1)
//!
//! Pure functions over already-resolved source values. Every failure is an
//! [`OpError`]; the engine turns it into the input's default.
//!
//! Integer arithmetic stays integral (`add`, `subtract`, `multiply`,
//! `modulo`, `abs`, `min`, `max`) and falls back to floats on overflow.
//! `divide`, `average`, temperature conversion and `linear_transform`
//! always produce floats.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::value;

/// Operation parameters (`multiply`, `separator`, `decimals`, ...)
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CelsiusToFahrenheit,
    FahrenheitToCelsius,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Average,
    Min,
    Max,
    Abs,
    Round,
    Floor,
    Ceil,
    LinearTransform,
    Concat,
    Split,
    Substring,
    Conditional,
    FormatNumber,
}

impl Operation {
    pub const ALL: [Operation; 20] = [
        Operation::CelsiusToFahrenheit,
        Operation::FahrenheitToCelsius,
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Modulo,
        Operation::Average,
        Operation::Min,
        Operation::Max,
        Operation::Abs,
        Operation::Round,
        Operation::Floor,
        Operation::Ceil,
        Operation::LinearTransform,
        Operation::Concat,
        Operation::Split,
        Operation::Substring,
        Operation::Conditional,
        Operation::FormatNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CelsiusToFahrenheit => "celsius_to_fahrenheit",
            Operation::FahrenheitToCelsius => "fahrenheit_to_celsius",
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Modulo => "modulo",
            Operation::Average => "average",
            Operation::Min => "min",
            Operation::Max => "max",
            Operation::Abs => "abs",
            Operation::Round => "round",
            Operation::Floor => "floor",
            Operation::Ceil => "ceil",
            Operation::LinearTransform => "linear_transform",
            Operation::Concat => "concat",
            Operation::Split => "split",
            Operation::Substring => "substring",
            Operation::Conditional => "conditional",
            Operation::FormatNumber => "format_number",
        }
    }

    /// Accepted number of sources: `(min, max)`, `None` = unbounded
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Operation::Add
            | Operation::Subtract
            | Operation::Multiply
            | Operation::Divide
            | Operation::Modulo => (2, None),
            Operation::Average | Operation::Min | Operation::Max | Operation::Concat => (1, None),
            Operation::Conditional => (0, Some(0)),
            _ => (1, Some(1)),
        }
    }

    /// Parameters this operation reads, with their expected JSON kind
    fn param_kinds(&self) -> &'static [(&'static str, ParamKind)] {
        use ParamKind::*;
        match self {
            Operation::LinearTransform => &[("multiply", Number), ("divide", Number), ("add", Number)],
            Operation::Round => &[("decimals", Integer)],
            Operation::Concat => &[
                ("separator", Text),
                ("prefix", Text),
                ("suffix", Text),
                ("skip_empty", Flag),
            ],
            Operation::Split => &[("separator", Text), ("index", Integer)],
            Operation::Substring => &[("start", Integer), ("end", Integer)],
            Operation::FormatNumber => &[
                ("decimals", Integer),
                ("thousands_sep", Text),
                ("decimal_sep", Text),
            ],
            _ => &[],
        }
    }

    /// Load-time check of parameter types.
    pub fn check_params(&self, params: &Params) -> Result<(), OpError> {
        for (name, kind) in self.param_kinds() {
            if let Some(v) = params.get(*name) {
                kind.check(name, v)?;
            }
        }
        if *self == Operation::Split {
            if let Some("") = params.get("separator").and_then(Value::as_str) {
                return Err(bad_param("separator", "must not be empty"));
            }
        }
        if *self == Operation::Round || *self == Operation::FormatNumber {
            param_decimals(params)?;
        }
        Ok(())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum ParamKind {
    Number,
    Integer,
    Text,
    Flag,
}

impl ParamKind {
    fn check(&self, name: &str, v: &Value) -> Result<(), OpError> {
        let ok = match self {
            ParamKind::Number => v.is_number(),
            ParamKind::Integer => v.as_i64().is_some(),
            ParamKind::Text => v.is_string(),
            ParamKind::Flag => v.is_boolean(),
        };
        if ok {
            Ok(())
        } else {
            let expected = match self {
                ParamKind::Number => "a number",
                ParamKind::Integer => "an integer",
                ParamKind::Text => "a string",
                ParamKind::Flag => "a boolean",
            };
            Err(bad_param(name, &format!("expected {expected}, got {v}")))
        }
    }
}

/// Why an operation could not produce a value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("{operation} expects {expected} source(s), got {got}")]
    Arity {
        operation: Operation,
        expected: String,
        got: usize,
    },

    #[error("source {index} is not a number: {found}")]
    NotNumeric { index: usize, found: String },

    #[error("source is not a string: {found}")]
    NotText { found: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("index {index} is out of range for {len} parts")]
    OutOfRange { index: i64, len: usize },

    #[error("parameter '{name}': {details}")]
    BadParam { name: String, details: String },

    #[error("{0} is evaluated by the engine")]
    EngineOnly(Operation),
}

fn bad_param(name: &str, details: &str) -> OpError {
    OpError::BadParam {
        name: name.to_string(),
        details: details.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════
// Numbers
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value, index: usize) -> Result<Num, OpError> {
        match v {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Num::Int(i)),
                None => n.as_f64().map(Num::Float).ok_or(OpError::NonFinite),
            },
            other => Err(OpError::NotNumeric {
                index,
                found: value::type_name(other).to_string(),
            }),
        }
    }

    fn f(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn combine(self, other: Num, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Num {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => int_op(a, b)
                .map(Num::Int)
                .unwrap_or_else(|| Num::Float(float_op(a as f64, b as f64))),
            (a, b) => Num::Float(float_op(a.f(), b.f())),
        }
    }

    fn into_value(self) -> Result<Value, OpError> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => value::float(f).ok_or(OpError::NonFinite),
        }
    }
}

fn numbers(sources: &[Value]) -> Result<Vec<Num>, OpError> {
    sources
        .iter()
        .enumerate()
        .map(|(i, v)| Num::of(v, i))
        .collect()
}

fn float_result(f: f64) -> Result<Value, OpError> {
    value::float(f).ok_or(OpError::NonFinite)
}

/// Whole-number result as an integer when it fits.
fn whole(f: f64) -> Result<Value, OpError> {
    if !f.is_finite() {
        return Err(OpError::NonFinite);
    }
    if f.abs() < i64::MAX as f64 {
        Ok(Value::from(f as i64))
    } else {
        float_result(f)
    }
}

fn python_mod_i(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
}

fn python_mod_f(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

// ═══════════════════════════════════════════════════════════════
// Parameters
// ═══════════════════════════════════════════════════════════════

fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64, OpError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| bad_param(name, &format!("expected a number, got {v}"))),
    }
}

fn param_i64(params: &Params, name: &str) -> Result<Option<i64>, OpError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| bad_param(name, &format!("expected an integer, got {v}"))),
    }
}

fn param_str<'a>(params: &'a Params, name: &str, default: &'a str) -> Result<&'a str, OpError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| bad_param(name, &format!("expected a string, got {v}"))),
    }
}

fn param_bool(params: &Params, name: &str) -> Result<bool, OpError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| bad_param(name, &format!("expected a boolean, got {v}"))),
    }
}

fn param_decimals(params: &Params) -> Result<i32, OpError> {
    let decimals = param_i64(params, "decimals")?.unwrap_or(0);
    if (-15..=15).contains(&decimals) {
        Ok(decimals as i32)
    } else {
        Err(bad_param("decimals", "must be between -15 and 15"))
    }
}

// ═══════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════

/// Apply `op` to resolved `sources`.
pub fn apply(op: Operation, sources: &[Value], params: &Params) -> Result<Value, OpError> {
    let (min, max) = op.arity();
    if sources.len() < min || max.is_some_and(|max| sources.len() > max) {
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{min}..{max}"),
            None => format!("at least {min}"),
        };
        return Err(OpError::Arity {
            operation: op,
            expected,
            got: sources.len(),
        });
    }

    match op {
        Operation::CelsiusToFahrenheit => float_result(Num::of(&sources[0], 0)?.f() * 9.0 / 5.0 + 32.0),
        Operation::FahrenheitToCelsius => {
            float_result((Num::of(&sources[0], 0)?.f() - 32.0) * 5.0 / 9.0)
        }
        Operation::Add => fold(sources, i64::checked_add, |a, b| a + b),
        Operation::Subtract => fold(sources, i64::checked_sub, |a, b| a - b),
        Operation::Multiply => fold(sources, i64::checked_mul, |a, b| a * b),
        Operation::Divide => divide(sources),
        Operation::Modulo => modulo(sources),
        Operation::Average => {
            let nums = numbers(sources)?;
            float_result(nums.iter().map(|n| n.f()).sum::<f64>() / nums.len() as f64)
        }
        Operation::Min => extreme(sources, |candidate, best| candidate < best),
        Operation::Max => extreme(sources, |candidate, best| candidate > best),
        Operation::Abs => match Num::of(&sources[0], 0)? {
            Num::Int(i) => Ok(i
                .checked_abs()
                .map(Value::from)
                .unwrap_or_else(|| Value::from((i as f64).abs()))),
            Num::Float(f) => float_result(f.abs()),
        },
        Operation::Round => round(Num::of(&sources[0], 0)?, param_decimals(params)?),
        Operation::Floor => match Num::of(&sources[0], 0)? {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => whole(f.floor()),
        },
        Operation::Ceil => match Num::of(&sources[0], 0)? {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => whole(f.ceil()),
        },
        Operation::LinearTransform => {
            let v = Num::of(&sources[0], 0)?.f();
            let multiply = param_f64(params, "multiply", 1.0)?;
            let divide = param_f64(params, "divide", 1.0)?;
            let add = param_f64(params, "add", 0.0)?;
            if divide == 0.0 {
                return Err(OpError::DivisionByZero);
            }
            float_result(v * multiply / divide + add)
        }
        Operation::Concat => concat(sources, params),
        Operation::Split => split(&sources[0], params),
        Operation::Substring => substring(&sources[0], params),
        Operation::FormatNumber => format_number(&sources[0], params),
        Operation::Conditional => Err(OpError::EngineOnly(op)),
    }
}

fn fold(
    sources: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, OpError> {
    let nums = numbers(sources)?;
    let first = nums[0];
    nums[1..]
        .iter()
        .fold(first, |acc, n| acc.combine(*n, int_op, float_op))
        .into_value()
}

fn divide(sources: &[Value]) -> Result<Value, OpError> {
    let nums = numbers(sources)?;
    let mut acc = nums[0].f();
    for n in &nums[1..] {
        let divisor = n.f();
        if divisor == 0.0 {
            return Err(OpError::DivisionByZero);
        }
        acc /= divisor;
    }
    float_result(acc)
}

fn modulo(sources: &[Value]) -> Result<Value, OpError> {
    let nums = numbers(sources)?;
    let mut acc = nums[0];
    for n in &nums[1..] {
        if n.f() == 0.0 {
            return Err(OpError::DivisionByZero);
        }
        acc = acc.combine(*n, python_mod_i, python_mod_f);
    }
    acc.into_value()
}

fn extreme(sources: &[Value], better: fn(f64, f64) -> bool) -> Result<Value, OpError> {
    let nums = numbers(sources)?;
    let mut best = nums[0];
    for n in &nums[1..] {
        if better(n.f(), best.f()) {
            best = *n;
        }
    }
    best.into_value()
}

/// Round half to even; `decimals <= 0` yields an integer.
fn round(n: Num, decimals: i32) -> Result<Value, OpError> {
    match n {
        Num::Int(i) if decimals >= 0 => Ok(Value::from(i)),
        n if decimals <= 0 => {
            let factor = 10f64.powi(-decimals);
            whole((n.f() / factor).round_ties_even() * factor)
        }
        n => {
            let factor = 10f64.powi(decimals);
            float_result((n.f() * factor).round_ties_even() / factor)
        }
    }
}

fn text(v: &Value) -> Result<&str, OpError> {
    v.as_str().ok_or_else(|| OpError::NotText {
        found: value::type_name(v).to_string(),
    })
}

fn concat(sources: &[Value], params: &Params) -> Result<Value, OpError> {
    let separator = param_str(params, "separator", "")?;
    let prefix = param_str(params, "prefix", "")?;
    let suffix = param_str(params, "suffix", "")?;
    let skip_empty = param_bool(params, "skip_empty")?;

    let parts: Vec<String> = sources
        .iter()
        .map(value::to_text)
        .filter(|part| !(skip_empty && part.is_empty()))
        .collect();

    Ok(Value::String(format!(
        "{prefix}{}{suffix}",
        parts.join(separator)
    )))
}

/// Python-style index: negative counts from the end.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let idx = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&idx).then_some(idx as usize)
}

fn split(source: &Value, params: &Params) -> Result<Value, OpError> {
    let s = text(source)?;
    let index = param_i64(params, "index")?.unwrap_or(0);

    let parts: Vec<&str> = match params.get("separator") {
        None | Some(Value::Null) => s.split_whitespace().collect(),
        Some(_) => {
            let separator = param_str(params, "separator", "")?;
            if separator.is_empty() {
                return Err(bad_param("separator", "must not be empty"));
            }
            s.split(separator).collect()
        }
    };

    let idx = normalize_index(index, parts.len()).ok_or(OpError::OutOfRange {
        index,
        len: parts.len(),
    })?;
    Ok(Value::String(parts[idx].to_string()))
}

/// Half-open character slice with Python clamping semantics.
fn substring(source: &Value, params: &Params) -> Result<Value, OpError> {
    let chars: Vec<char> = text(source)?.chars().collect();
    let len = chars.len() as i64;
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { len + i } else { i };
        i.clamp(0, len) as usize
    };

    let start = clamp(param_i64(params, "start")?.unwrap_or(0));
    let end = clamp(param_i64(params, "end")?.unwrap_or(len));
    if start >= end {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn format_number(source: &Value, params: &Params) -> Result<Value, OpError> {
    let n = Num::of(source, 0)?.f();
    if !n.is_finite() {
        return Err(OpError::NonFinite);
    }
    let decimals = param_decimals(params)?.max(0) as usize;
    let thousands_sep = param_str(params, "thousands_sep", ",")?;
    let decimal_sep = param_str(params, "decimal_sep", ".")?;

    let formatted = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push_str(thousands_sep);
        }
        grouped.push(ch);
    }

    let is_zero = formatted.chars().all(|c| c == '0' || c == '.');
    let mut out = String::new();
    if n < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push_str(decimal_sep);
        out.push_str(frac);
    }
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    fn run(op: Operation, sources: &[Value], p: Value) -> Result<Value, OpError> {
        apply(op, sources, &params(p))
    }

    #[test]
    fn parse_operation_names() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>(), Ok(op));
        }
        assert!("explode".parse::<Operation>().is_err());
    }

    #[test]
    fn temperature_conversion() {
        assert_eq!(run(Operation::CelsiusToFahrenheit, &[json!(0)], json!({})), Ok(json!(32.0)));
        assert_eq!(run(Operation::CelsiusToFahrenheit, &[json!(100)], json!({})), Ok(json!(212.0)));
        assert_eq!(run(Operation::FahrenheitToCelsius, &[json!(212)], json!({})), Ok(json!(100.0)));
    }

    #[test]
    fn arithmetic_folds_left_to_right() {
        assert_eq!(run(Operation::Add, &[json!(1), json!(2), json!(3)], json!({})), Ok(json!(6)));
        assert_eq!(run(Operation::Subtract, &[json!(10), json!(3), json!(2)], json!({})), Ok(json!(5)));
        assert_eq!(run(Operation::Multiply, &[json!(2), json!(2.5)], json!({})), Ok(json!(5.0)));
        assert_eq!(run(Operation::Divide, &[json!(10), json!(4)], json!({})), Ok(json!(2.5)));
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let result = run(Operation::Add, &[json!(i64::MAX), json!(1)], json!({})).unwrap();
        assert!(result.is_f64());
    }

    #[test]
    fn division_and_modulo_by_zero_fail() {
        assert_eq!(
            run(Operation::Divide, &[json!(10), json!(0)], json!({})),
            Err(OpError::DivisionByZero)
        );
        assert_eq!(
            run(Operation::Modulo, &[json!(10), json!(0.0)], json!({})),
            Err(OpError::DivisionByZero)
        );
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(run(Operation::Modulo, &[json!(7), json!(3)], json!({})), Ok(json!(1)));
        assert_eq!(run(Operation::Modulo, &[json!(-7), json!(3)], json!({})), Ok(json!(2)));
        assert_eq!(run(Operation::Modulo, &[json!(7), json!(-3)], json!({})), Ok(json!(-2)));
    }

    #[test]
    fn arity_is_enforced() {
        assert!(matches!(
            run(Operation::Add, &[json!(1)], json!({})),
            Err(OpError::Arity { got: 1, .. })
        ));
        assert!(matches!(
            run(Operation::Abs, &[json!(1), json!(2)], json!({})),
            Err(OpError::Arity { .. })
        ));
    }

    #[test]
    fn non_numeric_sources_fail() {
        assert!(matches!(
            run(Operation::Add, &[json!(1), json!("2")], json!({})),
            Err(OpError::NotNumeric { index: 1, .. })
        ));
    }

    #[test]
    fn aggregates() {
        let values = [json!(3), json!(1.5), json!(9)];
        assert_eq!(run(Operation::Average, &values, json!({})), Ok(json!(4.5)));
        assert_eq!(run(Operation::Min, &values, json!({})), Ok(json!(1.5)));
        assert_eq!(run(Operation::Max, &values, json!({})), Ok(json!(9)));
    }

    #[test]
    fn rounding_family() {
        assert_eq!(run(Operation::Abs, &[json!(-4)], json!({})), Ok(json!(4)));
        assert_eq!(run(Operation::Round, &[json!(2.5)], json!({})), Ok(json!(2)));
        assert_eq!(run(Operation::Round, &[json!(3.5)], json!({})), Ok(json!(4)));
        assert_eq!(run(Operation::Round, &[json!(3.14159)], json!({"decimals": 2})), Ok(json!(3.14)));
        assert_eq!(run(Operation::Round, &[json!(1234)], json!({"decimals": -2})), Ok(json!(1200)));
        assert_eq!(run(Operation::Floor, &[json!(-1.5)], json!({})), Ok(json!(-2)));
        assert_eq!(run(Operation::Ceil, &[json!(1.2)], json!({})), Ok(json!(2)));
    }

    #[test]
    fn linear_transform_applies_defaults_and_params() {
        let result = run(
            Operation::LinearTransform,
            &[json!(9)],
            json!({"multiply": 2, "divide": 3, "add": 10}),
        )
        .unwrap();
        assert_eq!(result.as_f64(), Some(16.0));

        let identity = run(Operation::LinearTransform, &[json!(7)], json!({})).unwrap();
        assert_eq!(identity.as_f64(), Some(7.0));

        assert_eq!(
            run(Operation::LinearTransform, &[json!(7)], json!({"divide": 0})),
            Err(OpError::DivisionByZero)
        );
    }

    #[test]
    fn concat_with_separator_and_skip_empty() {
        assert_eq!(
            run(Operation::Concat, &[json!("Jane"), json!("Doe")], json!({"separator": " "})),
            Ok(json!("Jane Doe"))
        );
        assert_eq!(
            run(
                Operation::Concat,
                &[json!(""), json!("Doe")],
                json!({"separator": " ", "skip_empty": true})
            ),
            Ok(json!("Doe"))
        );
        assert_eq!(
            run(
                Operation::Concat,
                &[json!(3), json!("items")],
                json!({"separator": " ", "prefix": "[", "suffix": "]"})
            ),
            Ok(json!("[3 items]"))
        );
    }

    #[test]
    fn split_by_index() {
        let p = json!({"separator": "-", "index": 1});
        assert_eq!(run(Operation::Split, &[json!("a-b-c")], p), Ok(json!("b")));
        assert_eq!(
            run(Operation::Split, &[json!("a-b-c")], json!({"separator": "-", "index": -1})),
            Ok(json!("c"))
        );
        assert_eq!(run(Operation::Split, &[json!("  one   two ")], json!({"index": 1})), Ok(json!("two")));
        assert!(matches!(
            run(Operation::Split, &[json!("a-b")], json!({"separator": "-", "index": 5})),
            Err(OpError::OutOfRange { index: 5, len: 2 })
        ));
        assert!(matches!(
            run(Operation::Split, &[json!(12)], json!({})),
            Err(OpError::NotText { .. })
        ));
    }

    #[test]
    fn substring_is_clamped() {
        let s = [json!("Bitcoin")];
        assert_eq!(run(Operation::Substring, &s, json!({"start": 0, "end": 3})), Ok(json!("Bit")));
        assert_eq!(run(Operation::Substring, &s, json!({"start": 3})), Ok(json!("coin")));
        assert_eq!(run(Operation::Substring, &s, json!({"start": -4})), Ok(json!("coin")));
        assert_eq!(run(Operation::Substring, &s, json!({"start": 2, "end": 100})), Ok(json!("tcoin")));
        assert_eq!(run(Operation::Substring, &s, json!({"start": 5, "end": 2})), Ok(json!("")));
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(run(Operation::FormatNumber, &[json!(1234567)], json!({})), Ok(json!("1,234,567")));
        assert_eq!(
            run(
                Operation::FormatNumber,
                &[json!(-1234567.891)],
                json!({"decimals": 2, "thousands_sep": ".", "decimal_sep": ","})
            ),
            Ok(json!("-1.234.567,89"))
        );
        assert_eq!(run(Operation::FormatNumber, &[json!(999)], json!({})), Ok(json!("999")));
        assert_eq!(run(Operation::FormatNumber, &[json!(-0.001)], json!({})), Ok(json!("0")));
    }

    #[test]
    fn conditional_is_not_applied_here() {
        assert_eq!(
            run(Operation::Conditional, &[], json!({})),
            Err(OpError::EngineOnly(Operation::Conditional))
        );
    }

    #[test]
    fn check_params_rejects_wrong_types() {
        let bad = params(json!({"multiply": "two"}));
        assert!(matches!(
            Operation::LinearTransform.check_params(&bad),
            Err(OpError::BadParam { name, .. }) if name == "multiply"
        ));
        let empty_sep = params(json!({"separator": ""}));
        assert!(Operation::Split.check_params(&empty_sep).is_err());
        assert!(Operation::Concat.check_params(&empty_sep).is_ok());
    }
}
