//! Input configuration loader (v0.1)
//!
//! Documents are TOML (default) or YAML (`.yml` / `.yaml`) with a top-level
//! `inputs` table:
//!
//! ```toml
//! [inputs.temp_c]
//! context_key = "weather.temp"
//! type = "float"
//! default = 0.0
//!
//! [inputs.temp_f]
//! operation = "celsius_to_fahrenheit"
//! sources = ["temp_c"]
//! ```
//!
//! Other top-level tables (layouts, formatters) are ignored.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{FixSuggestion, Result, ViewError};
use crate::expr::{ExprError, ExpressionEvaluator};
use crate::input::{Condition, InputDefinition, InputKind, InputTable, Source, Transform};
use crate::ops::{Operation, Params};
use crate::path;
use crate::template;
use crate::validation::{OnError, ValidationSpec, ValueType};

/// Raw `[inputs.<name>]` table, keys as written in the document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,

    // Validation
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_validation_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    /// Operation parameters (`multiply`, `separator`, `if_true`, ...)
    #[serde(flatten)]
    pub params: Params,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionSpec {
    pub input: String,
    pub equals: Value,
}

/// A whole configuration document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub inputs: IndexMap<String, InputSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Format::Yaml,
            _ => Format::Toml,
        }
    }
}

impl InputsConfig {
    pub fn parse(text: &str, format: Format) -> Result<Self> {
        match format {
            Format::Toml => Ok(toml::from_str(text)?),
            Format::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }

    /// Later definitions of the same name replace earlier ones.
    pub fn merge(&mut self, other: InputsConfig) {
        for (name, spec) in other.inputs {
            self.inputs.insert(name, spec);
        }
    }
}

pub fn load_file(path: &Path) -> Result<InputsConfig> {
    let text = fs::read_to_string(path)?;
    let config = InputsConfig::parse(&text, Format::from_path(path))?;
    debug!(path = %path.display(), inputs = config.inputs.len(), "loaded input config");
    Ok(config)
}

/// Load and merge several documents in order.
pub fn load_files(paths: &[PathBuf]) -> Result<InputsConfig> {
    let mut merged = InputsConfig::default();
    for path in paths {
        merged.merge(load_file(path)?);
    }
    Ok(merged)
}

// ═══════════════════════════════════════════════════════════════
// Building definitions
// ═══════════════════════════════════════════════════════════════

impl InputSpec {
    fn has_validation(&self) -> bool {
        self.value_type.is_some()
            || self.on_validation_error.is_some()
            || self.min_value.is_some()
            || self.max_value.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.pattern.is_some()
            || self.allowed_values.is_some()
            || self.min_items.is_some()
            || self.max_items.is_some()
    }

    /// Turn the raw table into a checked definition.
    pub fn build(&self, name: &str, evaluator: &dyn ExpressionEvaluator) -> Result<InputDefinition> {
        let kind = self.build_kind(name, evaluator)?;
        let mut definition = InputDefinition::new(name, kind);
        definition.default = self.default.clone();

        if let Some(t) = &self.transform {
            let transform = t.parse::<Transform>().map_err(|transform| ViewError::InvalidTransform {
                input: name.to_string(),
                transform,
            })?;
            definition.transform = Some(transform);
        }

        if self.has_validation() {
            definition.validation = Some(self.build_validation(name)?);
        }

        Ok(definition)
    }

    fn build_kind(&self, name: &str, evaluator: &dyn ExpressionEvaluator) -> Result<InputKind> {
        let declared: Vec<&str> = [
            self.operation.as_ref().map(|_| "operation"),
            self.constant.as_ref().map(|_| "constant"),
            self.expression.as_ref().map(|_| "expression"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if declared.len() > 1 {
            return Err(ViewError::AmbiguousKind {
                input: name.to_string(),
                kinds: declared.join(", "),
            });
        }

        if let Some(op) = &self.operation {
            return self.build_computed(name, op);
        }

        if let Some(value) = &self.constant {
            return Ok(InputKind::Constant(value.clone()));
        }

        if let Some(expression) = &self.expression {
            let namespace = self.namespace.as_deref();
            if let Some(ns) = namespace.filter(|ns| !evaluator.supports_namespace(ns)) {
                return Err(ViewError::UnsupportedNamespace {
                    input: name.to_string(),
                    namespace: ns.to_string(),
                });
            }
            evaluator
                .check(expression, namespace)
                .map_err(|e| match e {
                    ExprError::UnknownNamespace(ns) | ExprError::NotInScope(ns) => {
                        ViewError::UnsupportedNamespace {
                            input: name.to_string(),
                            namespace: ns,
                        }
                    }
                    other => ViewError::InvalidExpression {
                        input: name.to_string(),
                        details: other.to_string(),
                    },
                })?;
            return Ok(InputKind::HostExpression {
                expression: expression.clone(),
                namespace: self.namespace.clone(),
            });
        }

        let path = self.context_key.clone().unwrap_or_else(|| name.to_string());
        let segments = parse_path(name, &path)?;
        Ok(InputKind::Context { path, segments })
    }

    fn build_computed(&self, name: &str, op: &str) -> Result<InputKind> {
        let operation = op.parse::<Operation>().map_err(|operation| ViewError::UnknownOperation {
            input: name.to_string(),
            operation,
        })?;

        operation
            .check_params(&self.params)
            .map_err(|e| match e {
                crate::ops::OpError::BadParam { name: param, details } => ViewError::InvalidParam {
                    input: name.to_string(),
                    param,
                    details,
                },
                other => ViewError::InvalidParam {
                    input: name.to_string(),
                    param: operation.to_string(),
                    details: other.to_string(),
                },
            })?;

        let sources = if !self.sources.is_empty() {
            self.sources.iter().cloned().map(Source::Input).collect()
        } else if let Some(path) = &self.context_key {
            vec![Source::Path {
                path: path.clone(),
                segments: parse_path(name, path)?,
            }]
        } else {
            Vec::new()
        };

        let condition = match (&self.condition, operation) {
            (Some(c), _) => Some(Condition {
                input: c.input.clone(),
                equals: c.equals.clone(),
            }),
            (None, Operation::Conditional) => {
                return Err(ViewError::MissingCondition {
                    input: name.to_string(),
                })
            }
            (None, _) => None,
        };

        Ok(InputKind::Computed {
            operation,
            sources,
            params: self.params.clone(),
            condition,
        })
    }

    fn build_validation(&self, name: &str) -> Result<ValidationSpec> {
        let expected_type = match &self.value_type {
            Some(t) => t.parse::<ValueType>().map_err(|type_name| ViewError::InvalidType {
                input: name.to_string(),
                type_name,
            })?,
            None => ValueType::Any,
        };

        let on_error = match &self.on_validation_error {
            Some(p) => p.parse::<OnError>().map_err(|policy| ViewError::InvalidPolicy {
                input: name.to_string(),
                policy,
            })?,
            None => OnError::UseDefault,
        };

        let pattern = match &self.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| ViewError::InvalidPattern {
                input: name.to_string(),
                pattern: p.clone(),
                details: e.to_string(),
            })?),
            None => None,
        };

        let spec = ValidationSpec {
            expected_type,
            min_value: self.min_value,
            max_value: self.max_value,
            min_length: self.min_length,
            max_length: self.max_length,
            pattern,
            allowed_values: self.allowed_values.clone(),
            min_items: self.min_items,
            max_items: self.max_items,
            on_error,
        };

        spec.check_bounds().map_err(|details| ViewError::InvalidBounds {
            input: name.to_string(),
            details,
        })?;

        Ok(spec)
    }
}

fn parse_path(name: &str, path: &str) -> Result<Vec<path::Segment>> {
    path::parse(path).map_err(|e| ViewError::InvalidPath {
        input: name.to_string(),
        path: path.to_string(),
        details: e.to_string(),
    })
}

/// Build every definition, collecting (input, error) pairs instead of
/// stopping at the first one.
fn build_all(config: &InputsConfig, evaluator: &dyn ExpressionEvaluator) -> (InputTable, Vec<(String, ViewError)>) {
    let mut table = InputTable::new();
    let mut errors = Vec::new();

    for (name, spec) in &config.inputs {
        match spec.build(name, evaluator) {
            Ok(definition) => table.insert(definition),
            Err(e) => errors.push((name.clone(), e)),
        }
    }

    for definition in table.iter() {
        if let InputKind::Computed {
            sources, condition, ..
        } = &definition.kind
        {
            for source in sources {
                if let Source::Input(source_name) = source {
                    if !config.inputs.contains_key(source_name) {
                        errors.push((
                            definition.name.clone(),
                            ViewError::UnknownSource {
                                input: definition.name.clone(),
                                source_name: source_name.clone(),
                            },
                        ));
                    }
                }
            }
            if let Some(c) = condition.as_ref().filter(|c| !config.inputs.contains_key(&c.input)) {
                errors.push((
                    definition.name.clone(),
                    ViewError::UnknownConditionInput {
                        input: definition.name.clone(),
                        condition_input: c.input.clone(),
                    },
                ));
            }
        }
    }

    (table, errors)
}

impl InputTable {
    /// Build the definition table, failing on the first configuration error.
    pub fn from_config(config: &InputsConfig, evaluator: &dyn ExpressionEvaluator) -> Result<Self> {
        let (table, errors) = build_all(config, evaluator);
        match errors.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(table),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Preflight
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One preflight finding
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub input: String,
    pub message: String,
    pub fix: Option<String>,
}

impl Issue {
    fn error(input: String, e: &ViewError) -> Self {
        Self {
            severity: Severity::Error,
            input,
            message: e.to_string(),
            fix: e.fix_suggestion().map(String::from),
        }
    }

    fn warning(input: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            input: input.to_string(),
            message: message.into(),
            fix: None,
        }
    }
}

/// Report every configuration error plus suspicious-but-valid settings.
pub fn check(config: &InputsConfig, evaluator: &dyn ExpressionEvaluator) -> Vec<Issue> {
    let (table, errors) = build_all(config, evaluator);
    let mut issues: Vec<Issue> = errors
        .iter()
        .map(|(input, e)| Issue::error(input.clone(), e))
        .collect();

    for (name, spec) in &config.inputs {
        warn_constraints(name, spec, &mut issues);

        let Some(definition) = table.get(name) else {
            continue;
        };

        if let InputKind::Computed {
            operation,
            sources,
            params,
            ..
        } = &definition.kind
        {
            let (min, max) = operation.arity();
            if sources.is_empty() && min > 0 {
                issues.push(Issue::warning(
                    name,
                    format!("{operation} has no sources and will always use its default"),
                ));
            } else if sources.len() < min || max.is_some_and(|max| sources.len() > max) {
                issues.push(Issue::warning(
                    name,
                    format!("{operation} does not accept {} source(s)", sources.len()),
                ));
            }

            for key in ["if_true", "if_false"] {
                let Some(Value::String(branch)) = params.get(key) else {
                    continue;
                };
                for reference in template::references(branch) {
                    if !config.inputs.contains_key(&reference) {
                        issues.push(Issue::warning(
                            name,
                            format!("{key} references undefined input '{reference}'"),
                        ));
                    }
                }
            }
        } else if !spec.params.is_empty() {
            let mut keys: Vec<&str> = spec.params.keys().map(String::as_str).collect();
            keys.sort_unstable();
            issues.push(Issue::warning(
                name,
                format!("unused keys on a {} input: {}", definition.kind.as_str(), keys.join(", ")),
            ));
        }
    }

    issues
}

fn warn_constraints(name: &str, spec: &InputSpec, issues: &mut Vec<Issue>) {
    let Some(value_type) = spec.value_type.as_deref().and_then(|t| t.parse::<ValueType>().ok()) else {
        return;
    };

    let numeric = matches!(value_type, ValueType::Integer | ValueType::Float | ValueType::Any);
    if !numeric && (spec.min_value.is_some() || spec.max_value.is_some()) {
        issues.push(Issue::warning(
            name,
            format!("min_value/max_value have no effect on type '{value_type}'"),
        ));
    }

    let textual = matches!(value_type, ValueType::String | ValueType::Any);
    if !textual && (spec.min_length.is_some() || spec.max_length.is_some()) {
        issues.push(Issue::warning(
            name,
            format!("min_length/max_length have no effect on type '{value_type}'"),
        ));
    }
    if !textual && spec.pattern.is_some() {
        issues.push(Issue::warning(
            name,
            format!("pattern has no effect on type '{value_type}'"),
        ));
    }

    let listy = matches!(value_type, ValueType::List | ValueType::Any);
    if !listy && (spec.min_items.is_some() || spec.max_items.is_some()) {
        issues.push(Issue::warning(
            name,
            format!("min_items/max_items have no effect on type '{value_type}'"),
        ));
    }

    let policy = spec.on_validation_error.as_deref().unwrap_or("use_default");
    if policy == "use_default" && spec.default.is_none() {
        issues.push(Issue::warning(
            name,
            "on_validation_error is use_default but no default is set (null will be used)",
        ));
    }
}
