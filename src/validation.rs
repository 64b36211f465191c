//! Value validation and coercion (v0.1)
//!
//! A resolved value is checked against an optional [`ValidationSpec`]:
//! type first, then constraints (bounds, length, pattern, allowed values,
//! item counts). Failures are routed through a single [`OnError`] policy;
//! there is no per-constraint override.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::value::{self, as_f64, strict_eq};

/// Expected runtime type of a resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    String,
    Integer,
    /// Any JSON number; integers are accepted as floats
    Float,
    Boolean,
    List,
    Mapping,
    #[default]
    Any,
}

impl ValueType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Integer => value::is_integer(value),
            ValueType::Float => value.is_number(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::List => value.is_array(),
            ValueType::Mapping => value.is_object(),
            ValueType::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "str",
            ValueType::Integer => "int",
            ValueType::Float => "float",
            ValueType::Boolean => "bool",
            ValueType::List => "list",
            ValueType::Mapping => "dict",
            ValueType::Any => "any",
        }
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" | "string" => Ok(ValueType::String),
            "int" | "integer" => Ok(ValueType::Integer),
            "float" | "number" => Ok(ValueType::Float),
            "bool" | "boolean" => Ok(ValueType::Boolean),
            "list" | "array" => Ok(ValueType::List),
            "dict" | "mapping" | "object" => Ok(ValueType::Mapping),
            "any" => Ok(ValueType::Any),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recovery policy applied when validation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    #[default]
    UseDefault,
    Raise,
    Skip,
    Coerce,
}

impl FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "use_default" => Ok(OnError::UseDefault),
            "raise" => Ok(OnError::Raise),
            "skip" => Ok(OnError::Skip),
            "coerce" => Ok(OnError::Coerce),
            other => Err(other.to_string()),
        }
    }
}

/// Type and constraint rules for one input
#[derive(Debug, Clone, Default)]
pub struct ValidationSpec {
    pub expected_type: ValueType,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed_values: Option<Vec<Value>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub on_error: OnError,
}

/// Result of validating one value
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Value passed as-is
    Accept(Value),
    /// Value was converted to the expected type and then passed
    Coerced(Value),
    /// Caller must substitute the configured default
    UseDefault,
    /// Field is absent for this render
    Skip,
    /// Hard failure (`on_error = raise`)
    Fail(String),
}

impl ValidationSpec {
    /// Check that every min bound is at or below its max bound.
    pub fn check_bounds(&self) -> Result<(), String> {
        fn ordered<T: PartialOrd + fmt::Display>(
            name: &str,
            min: Option<T>,
            max: Option<T>,
        ) -> Result<(), String> {
            match (min, max) {
                (Some(lo), Some(hi)) if lo > hi => Err(format!(
                    "min_{name} ({lo}) is greater than max_{name} ({hi})"
                )),
                _ => Ok(()),
            }
        }

        ordered("value", self.min_value, self.max_value)?;
        ordered("length", self.min_length, self.max_length)?;
        ordered("items", self.min_items, self.max_items)
    }

    /// True when no type or constraint is configured
    pub fn is_noop(&self) -> bool {
        self.expected_type == ValueType::Any
            && self.min_value.is_none()
            && self.max_value.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.allowed_values.is_none()
            && self.min_items.is_none()
            && self.max_items.is_none()
    }

    fn reject(&self, reason: String) -> Outcome {
        match self.on_error {
            OnError::Raise => Outcome::Fail(reason),
            OnError::Skip => Outcome::Skip,
            OnError::UseDefault | OnError::Coerce => Outcome::UseDefault,
        }
    }

    fn check_constraints(&self, value: &Value) -> Result<(), String> {
        if let Some(n) = as_f64(value) {
            if let Some(min) = self.min_value.filter(|min| n < *min) {
                return Err(format!("{n} is below min_value {min}"));
            }
            if let Some(max) = self.max_value.filter(|max| n > *max) {
                return Err(format!("{n} is above max_value {max}"));
            }
        }

        if let Value::String(s) = value {
            let len = s.chars().count();
            if let Some(min) = self.min_length.filter(|min| len < *min) {
                return Err(format!("length {len} is below min_length {min}"));
            }
            if let Some(max) = self.max_length.filter(|max| len > *max) {
                return Err(format!("length {len} is above max_length {max}"));
            }
            if let Some(re) = self.pattern.as_ref().filter(|re| !re.is_match(s)) {
                return Err(format!("'{s}' does not match pattern '{}'", re.as_str()));
            }
        }

        if let Value::Array(items) = value {
            let count = items.len();
            if let Some(min) = self.min_items.filter(|min| count < *min) {
                return Err(format!("{count} items is below min_items {min}"));
            }
            if let Some(max) = self.max_items.filter(|max| count > *max) {
                return Err(format!("{count} items is above max_items {max}"));
            }
        }

        if let Some(allowed) = &self.allowed_values {
            if !allowed.iter().any(|a| strict_eq(a, value)) {
                return Err(format!("{value} is not one of the allowed values"));
            }
        }

        Ok(())
    }
}

/// Validate (and possibly coerce) a resolved value.
pub fn validate(value: Value, spec: &ValidationSpec) -> Outcome {
    let (value, coerced) = if spec.expected_type.matches(&value) {
        (value, false)
    } else {
        let reason = format!(
            "expected {}, got {}",
            spec.expected_type,
            value::type_name(&value)
        );
        if spec.on_error != OnError::Coerce {
            return spec.reject(reason);
        }
        match coerce(&value, spec.expected_type) {
            Some(converted) => (converted, true),
            None => return Outcome::UseDefault,
        }
    };

    if let Err(reason) = spec.check_constraints(&value) {
        return spec.reject(reason);
    }

    if coerced {
        Outcome::Coerced(value)
    } else {
        Outcome::Accept(value)
    }
}

/// Best-effort conversion to `target`; `None` when no sensible conversion
/// exists.
pub fn coerce(value: &Value, target: ValueType) -> Option<Value> {
    match target {
        ValueType::Any => Some(value.clone()),
        ValueType::String => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(_) | Value::Bool(_) => Some(Value::String(value::to_text(value))),
            _ => None,
        },
        ValueType::Integer => match value {
            Value::Number(n) if value::is_integer(value) => Some(Value::Number(n.clone())),
            Value::Number(n) => n.as_f64().and_then(value::truncate_i64).map(Value::from),
            Value::Bool(b) => Some(Value::from(i64::from(*b))),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().map(Value::from).or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .and_then(value::truncate_i64)
                        .map(Value::from)
                })
            }
            _ => None,
        },
        ValueType::Float => match value {
            Value::Number(n) => n.as_f64().and_then(value::float),
            Value::Bool(b) => value::float(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(value::float),
            _ => None,
        },
        ValueType::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "n" | "off" | "0" | "" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ValueType::List | ValueType::Mapping => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(expected_type: ValueType, on_error: OnError) -> ValidationSpec {
        ValidationSpec {
            expected_type,
            on_error,
            ..ValidationSpec::default()
        }
    }

    #[test]
    fn accepts_matching_type() {
        let s = spec(ValueType::Integer, OnError::Raise);
        assert_eq!(validate(json!(5), &s), Outcome::Accept(json!(5)));
    }

    #[test]
    fn float_accepts_integers() {
        let s = spec(ValueType::Float, OnError::Raise);
        assert_eq!(validate(json!(5), &s), Outcome::Accept(json!(5)));
    }

    #[test]
    fn type_mismatch_follows_policy() {
        let value = json!("abc");
        assert!(matches!(
            validate(value.clone(), &spec(ValueType::Integer, OnError::Raise)),
            Outcome::Fail(reason) if reason.contains("expected int")
        ));
        assert_eq!(
            validate(value.clone(), &spec(ValueType::Integer, OnError::UseDefault)),
            Outcome::UseDefault
        );
        assert_eq!(
            validate(value.clone(), &spec(ValueType::Integer, OnError::Skip)),
            Outcome::Skip
        );
        // "abc" cannot become an integer
        assert_eq!(
            validate(value, &spec(ValueType::Integer, OnError::Coerce)),
            Outcome::UseDefault
        );
    }

    #[test]
    fn coerce_numeric_string() {
        let s = spec(ValueType::Integer, OnError::Coerce);
        assert_eq!(validate(json!(" 42 "), &s), Outcome::Coerced(json!(42)));

        let s = spec(ValueType::Float, OnError::Coerce);
        assert_eq!(validate(json!("2.5"), &s), Outcome::Coerced(json!(2.5)));
    }

    #[test]
    fn coerce_number_to_string_and_bool() {
        let s = spec(ValueType::String, OnError::Coerce);
        assert_eq!(validate(json!(7), &s), Outcome::Coerced(json!("7")));

        let s = spec(ValueType::Boolean, OnError::Coerce);
        assert_eq!(validate(json!("yes"), &s), Outcome::Coerced(json!(true)));
        assert_eq!(validate(json!(0), &s), Outcome::Coerced(json!(false)));
        assert_eq!(validate(json!("maybe"), &s), Outcome::UseDefault);
    }

    #[test]
    fn constraints_run_after_coercion() {
        let s = ValidationSpec {
            expected_type: ValueType::Integer,
            max_value: Some(10.0),
            on_error: OnError::Coerce,
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!("5"), &s), Outcome::Coerced(json!(5)));
        assert_eq!(validate(json!("50"), &s), Outcome::UseDefault);
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        let s = ValidationSpec {
            min_value: Some(0.0),
            max_value: Some(100.0),
            on_error: OnError::Raise,
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!(0), &s), Outcome::Accept(json!(0)));
        assert_eq!(validate(json!(100), &s), Outcome::Accept(json!(100)));
        assert!(matches!(validate(json!(100.5), &s), Outcome::Fail(_)));
        assert!(matches!(validate(json!(-1), &s), Outcome::Fail(_)));
    }

    #[test]
    fn string_length_and_pattern() {
        let s = ValidationSpec {
            expected_type: ValueType::String,
            min_length: Some(2),
            max_length: Some(5),
            pattern: Some(Regex::new(r"^[A-Z]+$").unwrap()),
            on_error: OnError::Skip,
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!("USD"), &s), Outcome::Accept(json!("USD")));
        assert_eq!(validate(json!("U"), &s), Outcome::Skip);
        assert_eq!(validate(json!("DOLLARS"), &s), Outcome::Skip);
        assert_eq!(validate(json!("usd"), &s), Outcome::Skip);
    }

    #[test]
    fn pattern_ignored_for_non_strings() {
        let s = ValidationSpec {
            pattern: Some(Regex::new(r"^x$").unwrap()),
            on_error: OnError::Raise,
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!(12), &s), Outcome::Accept(json!(12)));
    }

    #[test]
    fn allowed_values_membership() {
        let s = ValidationSpec {
            allowed_values: Some(vec![json!("USD"), json!("EUR")]),
            on_error: OnError::Raise,
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!("EUR"), &s), Outcome::Accept(json!("EUR")));
        assert!(matches!(validate(json!("GBP"), &s), Outcome::Fail(_)));
    }

    #[test]
    fn allowed_values_are_type_strict() {
        let s = ValidationSpec {
            allowed_values: Some(vec![json!(1), json!(2)]),
            on_error: OnError::Raise,
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!(1.0), &s), Outcome::Accept(json!(1.0)));
        assert!(matches!(validate(json!("1"), &s), Outcome::Fail(_)));
        assert!(matches!(validate(json!(true), &s), Outcome::Fail(_)));
    }

    #[test]
    fn integer_coercion_rejects_out_of_range() {
        let s = spec(ValueType::Integer, OnError::Coerce);
        assert_eq!(validate(json!("1e30"), &s), Outcome::UseDefault);
        assert_eq!(validate(json!(1e30), &s), Outcome::UseDefault);
        assert_eq!(validate(json!(-2.7), &s), Outcome::Coerced(json!(-2)));
    }

    #[test]
    fn list_item_counts() {
        let s = ValidationSpec {
            expected_type: ValueType::List,
            min_items: Some(1),
            max_items: Some(2),
            ..ValidationSpec::default()
        };
        assert_eq!(validate(json!([1]), &s), Outcome::Accept(json!([1])));
        assert_eq!(validate(json!([]), &s), Outcome::UseDefault);
        assert_eq!(validate(json!([1, 2, 3]), &s), Outcome::UseDefault);
    }

    #[test]
    fn bounds_consistency() {
        let s = ValidationSpec {
            min_length: Some(5),
            max_length: Some(2),
            ..ValidationSpec::default()
        };
        assert!(s.check_bounds().unwrap_err().contains("min_length"));
        assert!(ValidationSpec::default().check_bounds().is_ok());
    }

    #[test]
    fn parse_type_and_policy_names() {
        assert_eq!("int".parse::<ValueType>(), Ok(ValueType::Integer));
        assert_eq!("dict".parse::<ValueType>(), Ok(ValueType::Mapping));
        assert!("decimal".parse::<ValueType>().is_err());
        assert_eq!("coerce".parse::<OnError>(), Ok(OnError::Coerce));
        assert!("ignore".parse::<OnError>().is_err());
    }
}
