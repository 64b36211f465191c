//! Input scaffolding from a sample context
//!
//! Turns a JSON sample into `[inputs.*]` TOML: one context input per leaf,
//! nested objects flattened into `parent_child` names with dotted
//! `context_key`s.

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::{InputSpec, InputsConfig};
use crate::error::{Result, ViewError};

/// Generate TOML input definitions for every leaf of `sample`.
pub fn generate_inputs(sample: &Value, prefix: &str) -> Result<String> {
    let Value::Object(root) = sample else {
        return Err(ViewError::NotAnObject {
            what: "the input sample".to_string(),
        });
    };

    let mut config = InputsConfig::default();
    collect(root, prefix, "", &mut config);
    Ok(toml::to_string(&config)?)
}

fn collect(object: &Map<String, Value>, name_prefix: &str, path_prefix: &str, config: &mut InputsConfig) {
    for (key, value) in object {
        if !is_addressable(key) {
            warn!(key = %key, "key cannot be expressed as a context path, skipping");
            continue;
        }

        let name = format!("{name_prefix}{}", sanitize(key));
        let path = if path_prefix.is_empty() {
            key.clone()
        } else {
            format!("{path_prefix}.{key}")
        };

        match value {
            Value::Object(inner) if !inner.is_empty() => {
                collect(inner, &format!("{name}_"), &path, config);
            }
            _ if config.inputs.contains_key(&name) => {
                warn!(key = %path, input = %name, "input name already generated, skipping");
            }
            leaf => {
                let spec = InputSpec {
                    context_key: Some(path),
                    value_type: Some(type_of(leaf).to_string()),
                    ..InputSpec::default()
                };
                config.inputs.insert(name, spec);
            }
        }
    }
}

/// Keys a dotted path can reach: no separators, quotes or parentheses, and
/// not all digits (those would be read as an index).
fn is_addressable(key: &str) -> bool {
    !key.trim().is_empty()
        && !key.contains(['.', '(', ')', '\'', '"'])
        && !key.bytes().all(|b| b.is_ascii_digit())
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
        Value::Null => "any",
    }
}
