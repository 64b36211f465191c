//! Input definitions (v0.1)
//!
//! An [`InputDefinition`] is built once by the loader and never mutated.
//! The [`InputTable`] holding them is shared between renders behind an `Arc`.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::ops::{Operation, Params};
use crate::path::Segment;
use crate::validation::ValidationSpec;
use crate::value;

/// Where a computed input gets one of its operands
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Another input, resolved through the engine (and its cache)
    Input(String),
    /// A context path read directly (`context_key` on a computed input)
    Path { path: String, segments: Vec<Segment> },
}

impl Source {
    pub fn label(&self) -> &str {
        match self {
            Source::Input(name) => name,
            Source::Path { path, .. } => path,
        }
    }
}

/// `conditional` test: resolve `input`, compare with `equals`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub input: String,
    pub equals: Value,
}

#[derive(Debug, Clone)]
pub enum InputKind {
    /// Read from the render context
    Context { path: String, segments: Vec<Segment> },
    /// Catalog operation over other inputs
    Computed {
        operation: Operation,
        sources: Vec<Source>,
        params: Params,
        condition: Option<Condition>,
    },
    /// Fixed configured value
    Constant(Value),
    /// Evaluated by the configured expression evaluator
    HostExpression {
        expression: String,
        namespace: Option<String>,
    },
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Context { .. } => "context",
            InputKind::Computed { .. } => "computed",
            InputKind::Constant(_) => "constant",
            InputKind::HostExpression { .. } => "expression",
        }
    }

    /// One-line description of where the value comes from
    pub fn describe(&self) -> String {
        match self {
            InputKind::Context { path, .. } => path.clone(),
            InputKind::Computed {
                operation,
                sources,
                condition,
                ..
            } => {
                let mut args: Vec<&str> = sources.iter().map(Source::label).collect();
                if let Some(c) = condition {
                    args.push(&c.input);
                }
                format!("{operation}({})", args.join(", "))
            }
            InputKind::Constant(v) => v.to_string(),
            InputKind::HostExpression {
                expression,
                namespace: Some(ns),
            } => format!("[{ns}] {expression}"),
            InputKind::HostExpression { expression, .. } => expression.clone(),
        }
    }
}

/// Post-acquisition value transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Upper,
    Lower,
    Title,
    Strip,
    Int,
    Float,
    Str,
    Bool,
}

impl Transform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::Upper => "upper",
            Transform::Lower => "lower",
            Transform::Title => "title",
            Transform::Strip => "strip",
            Transform::Int => "int",
            Transform::Float => "float",
            Transform::Str => "str",
            Transform::Bool => "bool",
        }
    }

    /// Apply the transform; `None` when the value cannot be converted.
    pub fn apply(&self, v: &Value) -> Option<Value> {
        match self {
            Transform::Upper => Some(Value::String(value::to_text(v).to_uppercase())),
            Transform::Lower => Some(Value::String(value::to_text(v).to_lowercase())),
            Transform::Title => Some(Value::String(title_case(&value::to_text(v)))),
            Transform::Strip => Some(Value::String(value::to_text(v).trim().to_string())),
            Transform::Str => Some(Value::String(value::to_text(v))),
            Transform::Int => match v {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Some(Value::from(i)),
                    None => n.as_f64().and_then(value::truncate_i64).map(Value::from),
                },
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                Value::Bool(b) => Some(Value::from(i64::from(*b))),
                _ => None,
            },
            Transform::Float => match v {
                Value::Number(n) => n.as_f64().and_then(value::float),
                Value::String(s) => s.trim().parse::<f64>().ok().and_then(value::float),
                Value::Bool(b) => value::float(if *b { 1.0 } else { 0.0 }),
                _ => None,
            },
            Transform::Bool => Some(Value::Bool(match v {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::String(s) => !s.is_empty(),
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
            })),
        }
    }
}

/// Uppercase the first letter of every word, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upper" => Ok(Transform::Upper),
            "lower" => Ok(Transform::Lower),
            "title" => Ok(Transform::Title),
            "strip" => Ok(Transform::Strip),
            "int" => Ok(Transform::Int),
            "float" => Ok(Transform::Float),
            "str" => Ok(Transform::Str),
            "bool" => Ok(Transform::Bool),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, immutable input
#[derive(Debug, Clone)]
pub struct InputDefinition {
    pub name: String,
    pub kind: InputKind,
    pub default: Option<Value>,
    pub transform: Option<Transform>,
    pub validation: Option<ValidationSpec>,
}

impl InputDefinition {
    pub fn new(name: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            transform: None,
            validation: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Names of other inputs this one reads during resolution
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.kind {
            InputKind::Computed {
                sources, condition, ..
            } => sources
                .iter()
                .filter_map(|s| match s {
                    Source::Input(name) => Some(name.as_str()),
                    Source::Path { .. } => None,
                })
                .chain(condition.iter().map(|c| c.input.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Definition table, in declaration order
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    inputs: IndexMap<String, Arc<InputDefinition>>,
}

impl InputTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, replacing any earlier one of the same name
    pub fn insert(&mut self, definition: InputDefinition) {
        self.inputs
            .insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<InputDefinition>> {
        self.inputs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputDefinition> {
        self.inputs.values().map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl FromIterator<InputDefinition> for InputTable {
    fn from_iter<I: IntoIterator<Item = InputDefinition>>(iter: I) -> Self {
        let mut table = InputTable::new();
        for definition in iter {
            table.insert(definition);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transforms_on_strings() {
        assert_eq!(Transform::Upper.apply(&json!("btc")), Some(json!("BTC")));
        assert_eq!(Transform::Lower.apply(&json!("BTC")), Some(json!("btc")));
        assert_eq!(Transform::Title.apply(&json!("hello wORLD-wide")), Some(json!("Hello World-Wide")));
        assert_eq!(Transform::Strip.apply(&json!("  x  ")), Some(json!("x")));
    }

    #[test]
    fn numeric_transforms() {
        assert_eq!(Transform::Int.apply(&json!("123")), Some(json!(123)));
        assert_eq!(Transform::Int.apply(&json!(3.9)), Some(json!(3)));
        assert_eq!(Transform::Int.apply(&json!("3.5")), None);
        assert_eq!(Transform::Float.apply(&json!("2.5")), Some(json!(2.5)));
        assert_eq!(Transform::Float.apply(&json!("abc")), None);
        assert_eq!(Transform::Str.apply(&json!(42)), Some(json!("42")));
    }

    #[test]
    fn bool_transform_uses_truthiness() {
        assert_eq!(Transform::Bool.apply(&json!("")), Some(json!(false)));
        assert_eq!(Transform::Bool.apply(&json!("no")), Some(json!(true)));
        assert_eq!(Transform::Bool.apply(&json!(0)), Some(json!(false)));
        assert_eq!(Transform::Bool.apply(&json!([1])), Some(json!(true)));
    }

    #[test]
    fn table_keeps_declaration_order_and_replaces() {
        let table: InputTable = vec![
            InputDefinition::new("b", InputKind::Constant(json!(1))),
            InputDefinition::new("a", InputKind::Constant(json!(2))),
            InputDefinition::new("b", InputKind::Constant(json!(3))),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(matches!(
            &table.get("b").unwrap().kind,
            InputKind::Constant(v) if *v == json!(3)
        ));
    }

    #[test]
    fn computed_dependencies_include_condition() {
        let def = InputDefinition::new(
            "price_label",
            InputKind::Computed {
                operation: Operation::Conditional,
                sources: vec![],
                params: Params::new(),
                condition: Some(Condition {
                    input: "currency".to_string(),
                    equals: json!("USD"),
                }),
            },
        );
        assert_eq!(def.dependencies(), vec!["currency"]);
        assert_eq!(def.kind.describe(), "conditional(currency)");
    }
}
