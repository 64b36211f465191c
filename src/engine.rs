//! Input resolution engine (v0.1)
//!
//! [`Resolver`] owns the immutable definition table and the expression
//! evaluator; it is `Send + Sync` and can serve any number of concurrent
//! renders. A [`Render`] is one resolution pass over one context: it carries
//! the per-render cache (each input computed at most once) and the
//! in-progress stack used to break dependency cycles.
//!
//! Pipeline per input: acquire raw value → transform → validate → default.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::context::Node;
use crate::error::{Result, ViewError};
use crate::expr::{BasicEvaluator, ExpressionEvaluator};
use crate::input::{Condition, InputDefinition, InputKind, InputTable, Source};
use crate::ops::{self, Operation, Params};
use crate::path::{self, Segment};
use crate::template;
use crate::validation::{self, Outcome};
use crate::value;

/// Result of resolving one input
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Acquired (and validated) value
    Value(Value),
    /// The configured default; `null` when none is configured
    Defaulted(Value),
    /// Skipped by validation: the field is absent for this render
    Absent,
}

impl Resolved {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) | Resolved::Defaulted(v) => Some(v),
            Resolved::Absent => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(v) | Resolved::Defaulted(v) => Some(v),
            Resolved::Absent => None,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Resolved::Defaulted(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }
}

/// Shared entry point: definitions plus expression evaluator
#[derive(Clone)]
pub struct Resolver {
    table: Arc<InputTable>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl Resolver {
    /// Resolver using the bundled [`BasicEvaluator`]
    pub fn new(table: Arc<InputTable>) -> Self {
        Self::with_evaluator(table, Arc::new(BasicEvaluator::new()))
    }

    pub fn with_evaluator(table: Arc<InputTable>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { table, evaluator }
    }

    pub fn table(&self) -> &InputTable {
        &self.table
    }

    /// Start a render over `context` with an empty cache.
    pub fn render<'a>(&'a self, context: &'a Node) -> Render<'a> {
        Render {
            resolver: self,
            context,
            cache: FxHashMap::default(),
            in_progress: Vec::new(),
        }
    }

    /// Resolve a single input in its own render.
    pub fn resolve(&self, name: &str, context: &Node) -> Result<Resolved> {
        self.render(context).resolve(name)
    }
}

/// One render: a context plus its evaluation cache
pub struct Render<'a> {
    resolver: &'a Resolver,
    context: &'a Node,
    cache: FxHashMap<String, Resolved>,
    in_progress: Vec<String>,
}

impl<'a> Render<'a> {
    /// Resolve `name`, reusing this render's cached result if present.
    ///
    /// Fails only for undefined names and `on_validation_error = raise`.
    pub fn resolve(&mut self, name: &str) -> Result<Resolved> {
        if let Some(hit) = self.cache.get(name) {
            trace!(input = name, "cache hit");
            return Ok(hit.clone());
        }

        let definition = self
            .resolver
            .table
            .get(name)
            .cloned()
            .ok_or_else(|| ViewError::UnknownInput {
                name: name.to_string(),
            })?;

        self.in_progress.push(name.to_string());
        let outcome = self.evaluate(&definition);
        self.in_progress.pop();

        let resolved = outcome?;
        self.cache.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Resolve several inputs in order within this render.
    pub fn resolve_many<'n, I>(&mut self, names: I) -> Result<Vec<(String, Resolved)>>
    where
        I: IntoIterator<Item = &'n str>,
    {
        names
            .into_iter()
            .map(|name| -> Result<(String, Resolved)> {
                Ok((name.to_string(), self.resolve(name)?))
            })
            .collect()
    }

    /// Resolve every defined input, in declaration order.
    pub fn resolve_all(&mut self) -> Result<Vec<(String, Resolved)>> {
        let table = Arc::clone(&self.resolver.table);
        self.resolve_many(table.names())
    }

    /// Expand `~name~` / `{{name}}` markers against this render.
    ///
    /// Undefined or absent names become the empty string.
    pub fn expand(&mut self, template: &str) -> Result<String> {
        let mut failure = None;
        let text = template::expand(template, |name| match self.dependency(name) {
            Ok(v) => v.map(|v| value::to_text(&v)),
            Err(ViewError::UnknownInput { .. }) => None,
            Err(e) => {
                failure.get_or_insert(e);
                None
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(text),
        }
    }

    /// Number of inputs resolved so far in this render
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Value of another input as seen by a consumer. A cycle or a skipped
    /// input yields `None`.
    fn dependency(&mut self, name: &str) -> Result<Option<Value>> {
        if self.in_progress.iter().any(|n| n == name) {
            warn!(input = name, chain = ?self.in_progress, "dependency cycle detected");
            return Ok(None);
        }
        Ok(self.resolve(name)?.into_value())
    }

    fn lookup(&self, segments: &[Segment]) -> Option<Value> {
        path::apply(self.context, segments)
            .and_then(Node::into_value)
            .filter(|v| !v.is_null())
    }

    fn evaluate(&mut self, definition: &InputDefinition) -> Result<Resolved> {
        let name = definition.name.as_str();

        let raw = match &definition.kind {
            InputKind::Constant(v) => Some(v.clone()),
            InputKind::Context { path, segments } => {
                let found = self.lookup(segments);
                if found.is_none() {
                    debug!(input = name, path = %path, "context path not found");
                }
                found
            }
            InputKind::Computed {
                operation,
                sources,
                params,
                condition,
            } => self.compute(name, *operation, sources, params, condition.as_ref())?,
            InputKind::HostExpression {
                expression,
                namespace,
            } => match self.resolver.evaluator.evaluate(expression, namespace.as_deref()) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(input = name, error = %e, "expression failed");
                    None
                }
            },
        };

        let Some(mut value) = raw else {
            return Ok(fallback(definition));
        };

        if let Some(transform) = definition.transform.filter(|_| !value.is_null()) {
            match transform.apply(&value) {
                Some(v) => value = v,
                None => {
                    debug!(input = name, transform = %transform, "transform failed");
                    return Ok(fallback(definition));
                }
            }
        }

        let Some(spec) = &definition.validation else {
            return Ok(Resolved::Value(value));
        };

        match validation::validate(value, spec) {
            Outcome::Accept(v) => Ok(Resolved::Value(v)),
            Outcome::Coerced(v) => {
                trace!(input = name, "value coerced");
                Ok(Resolved::Value(v))
            }
            Outcome::UseDefault => {
                debug!(input = name, "validation failed, using default");
                Ok(fallback(definition))
            }
            Outcome::Skip => {
                debug!(input = name, "validation failed, skipping");
                Ok(Resolved::Absent)
            }
            Outcome::Fail(reason) => Err(ViewError::ValidationFailed {
                input: name.to_string(),
                reason,
            }),
        }
    }

    fn compute(
        &mut self,
        name: &str,
        operation: Operation,
        sources: &[Source],
        params: &Params,
        condition: Option<&Condition>,
    ) -> Result<Option<Value>> {
        if operation == Operation::Conditional {
            return self.conditional(name, condition, params);
        }

        let mut values = Vec::with_capacity(sources.len());
        for source in sources {
            let v = match source {
                Source::Input(dep) => self.dependency(dep)?,
                Source::Path { segments, .. } => self.lookup(segments),
            };
            match v {
                Some(v) => values.push(v),
                None => {
                    debug!(input = name, source = source.label(), "source unavailable");
                    return Ok(None);
                }
            }
        }

        match ops::apply(operation, &values, params) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                debug!(input = name, operation = %operation, error = %e, "operation failed");
                Ok(None)
            }
        }
    }

    fn conditional(
        &mut self,
        name: &str,
        condition: Option<&Condition>,
        params: &Params,
    ) -> Result<Option<Value>> {
        let Some(condition) = condition else {
            return Ok(None);
        };

        let Some(actual) = self.dependency(&condition.input)? else {
            debug!(input = name, condition = %condition.input, "condition input unavailable");
            return Ok(None);
        };
        let matched = value::loose_eq(&actual, &condition.equals);
        let branch = if matched { "if_true" } else { "if_false" };

        match params.get(branch) {
            Some(Value::String(t)) => Ok(Some(Value::String(self.expand(t)?))),
            Some(other) => Ok(Some(other.clone())),
            None => {
                debug!(input = name, branch, "conditional branch not configured");
                Ok(None)
            }
        }
    }
}

fn fallback(definition: &InputDefinition) -> Resolved {
    Resolved::Defaulted(definition.default.clone().unwrap_or(Value::Null))
}
