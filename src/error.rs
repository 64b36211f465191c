//! Error types with fix suggestions (v0.1)
//!
//! Error code ranges:
//! - VT-000-009: IO and document parse errors
//! - VT-010-029: Configuration errors (detected at load time)
//! - VT-030-039: Render errors (surfaced by `resolve`)

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::ops::Operation;

pub type Result<T> = std::result::Result<T, ViewError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum ViewError {
    #[error("VT-001: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("VT-002: YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("VT-003: TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("VT-004: JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("VT-005: TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("VT-006: Expected a JSON object for {what}")]
    NotAnObject { what: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration errors (VT-010 to VT-029)
    // ─────────────────────────────────────────────────────────────

    #[error("VT-010: Input '{input}' uses unknown operation '{operation}'")]
    UnknownOperation { input: String, operation: String },

    #[error("VT-011: Input '{input}' references undefined source '{source_name}'")]
    UnknownSource { input: String, source_name: String },

    #[error("VT-012: Input '{input}' has a condition on undefined input '{condition_input}'")]
    UnknownConditionInput {
        input: String,
        condition_input: String,
    },

    #[error("VT-013: Input '{input}' uses 'conditional' without a condition")]
    MissingCondition { input: String },

    #[error("VT-014: Input '{input}' declares more than one kind ({kinds})")]
    AmbiguousKind { input: String, kinds: String },

    #[error("VT-015: Input '{input}' has unknown transform '{transform}'")]
    InvalidTransform { input: String, transform: String },

    #[error("VT-016: Input '{input}' has invalid pattern '{pattern}': {details}")]
    InvalidPattern {
        input: String,
        pattern: String,
        details: String,
    },

    #[error("VT-017: Input '{input}' has invalid bounds: {details}")]
    InvalidBounds { input: String, details: String },

    #[error("VT-018: Input '{input}' has invalid context path '{path}': {details}")]
    InvalidPath {
        input: String,
        path: String,
        details: String,
    },

    #[error("VT-019: Input '{input}' imports unsupported namespace '{namespace}'")]
    UnsupportedNamespace { input: String, namespace: String },

    #[error("VT-020: Input '{input}' has an invalid expression: {details}")]
    InvalidExpression { input: String, details: String },

    #[error("VT-021: Input '{input}' has invalid parameter '{param}': {details}")]
    InvalidParam {
        input: String,
        param: String,
        details: String,
    },

    #[error("VT-022: Input '{input}' has unknown type '{type_name}'")]
    InvalidType { input: String, type_name: String },

    #[error("VT-023: Input '{input}' has unknown on_validation_error strategy '{policy}'")]
    InvalidPolicy { input: String, policy: String },

    // ─────────────────────────────────────────────────────────────
    // Render errors (VT-030 to VT-039)
    // ─────────────────────────────────────────────────────────────

    #[error("VT-030: Input '{name}' is not defined")]
    UnknownInput { name: String },

    #[error("VT-031: Input '{input}' failed validation: {reason}")]
    ValidationFailed { input: String, reason: String },
}

impl ViewError {
    /// True for errors that a loader must reject before any render.
    pub fn is_config_error(&self) -> bool {
        !matches!(
            self,
            ViewError::UnknownInput { .. } | ViewError::ValidationFailed { .. }
        )
    }
}

static OPERATION_HINT: Lazy<String> = Lazy::new(|| {
    let names: Vec<&str> = Operation::ALL.iter().map(Operation::as_str).collect();
    format!("Use one of: {}", names.join(", "))
});

impl FixSuggestion for ViewError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ViewError::Io(_) => Some("Check file path and permissions"),
            ViewError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            ViewError::TomlParse(_) => Some("Check TOML syntax: [inputs.<name>] tables"),
            ViewError::JsonParse(_) => Some("Ensure the context is valid JSON (try jq)"),
            ViewError::TomlSerialize(_) => Some("Report the sample that failed to serialize"),
            ViewError::NotAnObject { .. } => Some("Pass a JSON object such as {\"key\": 1}"),
            ViewError::UnknownOperation { .. } => Some(OPERATION_HINT.as_str()),
            ViewError::UnknownSource { .. } => {
                Some("Define the source input or fix the name in `sources`")
            }
            ViewError::UnknownConditionInput { .. } => {
                Some("Define the input named in `condition.input`")
            }
            ViewError::MissingCondition { .. } => {
                Some("Add condition = { input = \"...\", equals = ... }")
            }
            ViewError::AmbiguousKind { .. } => Some(
                "Use only one of context_key, operation, constant or expression per input",
            ),
            ViewError::InvalidTransform { .. } => {
                Some("Use one of: upper, lower, title, strip, int, float, str, bool")
            }
            ViewError::InvalidPattern { .. } => Some("Fix the regular expression syntax"),
            ViewError::InvalidBounds { .. } => Some("Ensure every min_* is not above its max_*"),
            ViewError::InvalidPath { .. } => {
                Some("Use dotted paths like a.b.0.c or obj.method('arg')")
            }
            ViewError::UnsupportedNamespace { .. } => {
                Some("Use one of: time, datetime, uuid, math, random")
            }
            ViewError::InvalidExpression { .. } => {
                Some("Expressions support literals, arithmetic, comparisons and calls")
            }
            ViewError::InvalidParam { .. } => Some("Check the operation parameter type"),
            ViewError::InvalidType { .. } => {
                Some("Use one of: str, int, float, bool, list, dict, any")
            }
            ViewError::InvalidPolicy { .. } => {
                Some("Use one of: use_default, raise, skip, coerce")
            }
            ViewError::UnknownInput { .. } => Some("Verify the input is defined in the config"),
            ViewError::ValidationFailed { .. } => Some(
                "Fix the context value or switch on_validation_error to use_default",
            ),
        }
    }
}
