//! Host expressions (v0.1)
//!
//! A HostExpression input is evaluated by an [`ExpressionEvaluator`]. The
//! bundled [`BasicEvaluator`] implements a small, side-effect-free grammar:
//!
//! - literals: `42`, `1.5`, `'text'`, `"text"`, `true`, `false`, `none`
//! - arithmetic: `+ - * / // %`, unary `-`
//! - comparisons: `== != < <= > >=`
//! - boolean: `and`, `or`, `not`
//! - builtins: `len str int float round abs min max upper lower`
//! - namespaced members: `time.time()`, `math.pi`, `uuid.uuid4()`, ...
//!
//! Only the namespace declared on the input is in scope. Functions of that
//! namespace may also be called unqualified (`uuid4()` under `uuid`).
//! Host applications add their own functions with [`BasicEvaluator::register`].

use chrono::{Local, Utc};
use dashmap::DashMap;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::value;

/// Why an expression could not be parsed or evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown namespace '{0}'")]
    UnknownNamespace(String),

    #[error("namespace '{0}' is not in scope")]
    NotInScope(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("{0}")]
    Host(String),
}

/// Pluggable evaluator for HostExpression inputs.
pub trait ExpressionEvaluator: Send + Sync {
    /// Whether `namespace` can be declared on an input
    fn supports_namespace(&self, namespace: &str) -> bool;

    /// Load-time check: the expression parses and only references names
    /// reachable from `namespace`.
    fn check(&self, expression: &str, namespace: Option<&str>) -> Result<(), ExprError>;

    /// Evaluate in a fresh scope seeded only with `namespace`.
    fn evaluate(&self, expression: &str, namespace: Option<&str>) -> Result<Value, ExprError>;
}

/// Function exposed inside a namespace
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync>;

#[derive(Clone, Default)]
struct Namespace {
    functions: FxHashMap<String, HostFn>,
    constants: FxHashMap<String, Value>,
}

/// Restricted-grammar evaluator with built-in `time`, `datetime`, `uuid`,
/// `math` and `random` namespaces.
pub struct BasicEvaluator {
    namespaces: FxHashMap<String, Namespace>,
    parsed: DashMap<String, Arc<Expr>>,
}

impl fmt::Debug for BasicEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.namespaces.keys().collect();
        names.sort();
        f.debug_struct("BasicEvaluator")
            .field("namespaces", &names)
            .field("parsed", &self.parsed.len())
            .finish()
    }
}

impl Default for BasicEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl BasicEvaluator {
    pub fn new() -> Self {
        let mut evaluator = Self {
            namespaces: FxHashMap::default(),
            parsed: DashMap::new(),
        };
        evaluator.install_std();
        evaluator
    }

    /// Register (or replace) `namespace.name` as a host function.
    ///
    /// ```
    /// use viewtext::expr::{BasicEvaluator, ExpressionEvaluator};
    /// use serde_json::json;
    ///
    /// let mut eval = BasicEvaluator::new();
    /// eval.register("app", "version", |_| Ok(json!("1.2.0")));
    /// assert_eq!(eval.evaluate("app.version()", Some("app")).unwrap(), json!("1.2.0"));
    /// ```
    pub fn register<F>(&mut self, namespace: &str, name: &str, function: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .functions
            .insert(name.to_string(), Arc::new(function));
        self
    }

    /// Register (or replace) a namespace constant such as `math.pi`.
    pub fn register_constant(&mut self, namespace: &str, name: &str, value: Value) -> &mut Self {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .constants
            .insert(name.to_string(), value);
        self
    }

    fn install_std(&mut self) {
        self.register("time", "time", |args| {
            arity("time", args, 0, 0)?;
            value::float(Utc::now().timestamp_micros() as f64 / 1e6).ok_or(ExprError::NonFinite)
        })
        .register("time", "time_ns", |args| {
            arity("time_ns", args, 0, 0)?;
            Utc::now()
                .timestamp_nanos_opt()
                .map(Value::from)
                .ok_or_else(|| ExprError::Host("clock out of range".to_string()))
        })
        .register("datetime", "now", |args| {
            arity("now", args, 0, 0)?;
            Ok(Value::String(
                Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            ))
        })
        .register("datetime", "utcnow", |args| {
            arity("utcnow", args, 0, 0)?;
            Ok(Value::String(
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            ))
        })
        .register("datetime", "today", |args| {
            arity("today", args, 0, 0)?;
            Ok(Value::String(Local::now().date_naive().to_string()))
        })
        .register("uuid", "uuid4", |args| {
            arity("uuid4", args, 0, 0)?;
            Ok(Value::String(uuid::Uuid::new_v4().to_string()))
        })
        .register("math", "sqrt", |args| {
            arity("sqrt", args, 1, 1)?;
            let x = number(&args[0])?;
            if x < 0.0 {
                return Err(ExprError::Host("math domain error".to_string()));
            }
            float(x.sqrt())
        })
        .register("math", "floor", |args| {
            arity("floor", args, 1, 1)?;
            whole(number(&args[0])?.floor())
        })
        .register("math", "ceil", |args| {
            arity("ceil", args, 1, 1)?;
            whole(number(&args[0])?.ceil())
        })
        .register_constant("math", "pi", Value::from(std::f64::consts::PI))
        .register_constant("math", "e", Value::from(std::f64::consts::E))
        .register("random", "random", |args| {
            arity("random", args, 0, 0)?;
            float(rand::random::<f64>())
        })
        .register("random", "randint", |args| {
            arity("randint", args, 2, 2)?;
            let (lo, hi) = (integer(&args[0])?, integer(&args[1])?);
            if lo > hi {
                return Err(ExprError::Host(format!("empty range for randint({lo}, {hi})")));
            }
            Ok(Value::from(rand::thread_rng().gen_range(lo..=hi)))
        });
    }

    fn parse_cached(&self, expression: &str) -> Result<Arc<Expr>, ExprError> {
        if let Some(cached) = self.parsed.get(expression) {
            return Ok(Arc::clone(&cached));
        }
        let expr = Arc::new(parse(expression)?);
        self.parsed.insert(expression.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    /// Namespace reachable as `ns.member` from `scope`
    fn qualified(&self, scope: Option<&str>, ns: &str) -> Result<&Namespace, ExprError> {
        if scope != Some(ns) {
            return Err(ExprError::NotInScope(ns.to_string()));
        }
        self.namespaces
            .get(ns)
            .ok_or_else(|| ExprError::UnknownNamespace(ns.to_string()))
    }

    fn scope_fn(&self, scope: Option<&str>, name: &str) -> Option<&HostFn> {
        self.namespaces.get(scope?)?.functions.get(name)
    }

    fn lookup(&self, scope: Option<&str>, namespace: Option<&str>, name: &str) -> Result<Value, ExprError> {
        match namespace {
            Some(ns) => self
                .qualified(scope, ns)?
                .constants
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::UnknownName(format!("{ns}.{name}"))),
            None => scope
                .and_then(|s| self.namespaces.get(s))
                .and_then(|n| n.constants.get(name))
                .cloned()
                .ok_or_else(|| ExprError::UnknownName(name.to_string())),
        }
    }

    fn resolve_fn(
        &self,
        scope: Option<&str>,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Callee<'_>, ExprError> {
        match namespace {
            Some(ns) => self
                .qualified(scope, ns)?
                .functions
                .get(name)
                .map(Callee::Host)
                .ok_or_else(|| ExprError::UnknownFunction(format!("{ns}.{name}"))),
            None => builtin(name)
                .map(Callee::Builtin)
                .or_else(|| self.scope_fn(scope, name).map(Callee::Host))
                .ok_or_else(|| ExprError::UnknownFunction(name.to_string())),
        }
    }

    fn validate(&self, expr: &Expr, scope: Option<&str>) -> Result<(), ExprError> {
        match expr {
            Expr::Literal(_) => Ok(()),
            Expr::Ref { namespace, name } => self.lookup(scope, namespace.as_deref(), name).map(|_| ()),
            Expr::Call {
                namespace,
                name,
                args,
            } => {
                self.resolve_fn(scope, namespace.as_deref(), name)?;
                args.iter().try_for_each(|a| self.validate(a, scope))
            }
            Expr::Not(inner) | Expr::Neg(inner) => self.validate(inner, scope),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Binary(_, a, b) => {
                self.validate(a, scope)?;
                self.validate(b, scope)
            }
        }
    }

    fn eval(&self, expr: &Expr, scope: Option<&str>) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ref { namespace, name } => self.lookup(scope, namespace.as_deref(), name),
            Expr::Call {
                namespace,
                name,
                args,
            } => {
                let callee = self.resolve_fn(scope, namespace.as_deref(), name)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                match callee {
                    Callee::Builtin(f) => f(&args),
                    Callee::Host(f) => f(&args),
                }
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner, scope)?))),
            Expr::Neg(inner) => match self.eval(inner, scope)? {
                v if value::is_integer(&v) => v
                    .as_i64()
                    .and_then(i64::checked_neg)
                    .map(Value::from)
                    .map_or_else(|| float(-number(&v)?), Ok),
                v => float(-number(&v)?),
            },
            Expr::And(a, b) => {
                let left = self.eval(a, scope)?;
                if truthy(&left) {
                    self.eval(b, scope)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(a, b) => {
                let left = self.eval(a, scope)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    self.eval(b, scope)
                }
            }
            Expr::Binary(op, a, b) => binary(*op, self.eval(a, scope)?, self.eval(b, scope)?),
        }
    }
}

impl ExpressionEvaluator for BasicEvaluator {
    fn supports_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    fn check(&self, expression: &str, namespace: Option<&str>) -> Result<(), ExprError> {
        if let Some(ns) = namespace.filter(|ns| !self.supports_namespace(ns)) {
            return Err(ExprError::UnknownNamespace(ns.to_string()));
        }
        let expr = self.parse_cached(expression)?;
        self.validate(&expr, namespace)
    }

    fn evaluate(&self, expression: &str, namespace: Option<&str>) -> Result<Value, ExprError> {
        let expr = self.parse_cached(expression)?;
        self.eval(&expr, namespace)
    }
}

enum Callee<'a> {
    Builtin(Builtin),
    Host(&'a HostFn),
}

// ═══════════════════════════════════════════════════════════════
// Values
// ═══════════════════════════════════════════════════════════════

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn number(v: &Value) -> Result<f64, ExprError> {
    value::as_f64(v)
        .ok_or_else(|| ExprError::Type(format!("expected a number, got {}", value::type_name(v))))
}

fn integer(v: &Value) -> Result<i64, ExprError> {
    v.as_i64()
        .ok_or_else(|| ExprError::Type(format!("expected an int, got {}", value::type_name(v))))
}

fn text(v: &Value) -> Result<&str, ExprError> {
    v.as_str()
        .ok_or_else(|| ExprError::Type(format!("expected a str, got {}", value::type_name(v))))
}

fn float(f: f64) -> Result<Value, ExprError> {
    value::float(f).ok_or(ExprError::NonFinite)
}

fn whole(f: f64) -> Result<Value, ExprError> {
    if !f.is_finite() {
        return Err(ExprError::NonFinite);
    }
    if f.abs() < i64::MAX as f64 {
        Ok(Value::from(f as i64))
    } else {
        float(f)
    }
}

fn arity(function: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExprError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    Err(ExprError::Arity {
        function: function.to_string(),
        expected: if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        },
        got: args.len(),
    })
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value, ExprError> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(equals(&a, &b))),
        BinOp::Ne => return Ok(Value::Bool(!equals(&a, &b))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => return compare(op, &a, &b),
        BinOp::Add => {
            if let (Value::String(x), Value::String(y)) = (&a, &b) {
                return Ok(Value::String(format!("{x}{y}")));
            }
        }
        _ => {}
    }

    let (x, y) = (number(&a)?, number(&b)?);
    if let (Some(i), Some(j)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            BinOp::Add => i.checked_add(j),
            BinOp::Sub => i.checked_sub(j),
            BinOp::Mul => i.checked_mul(j),
            BinOp::FloorDiv | BinOp::Mod if j == 0 => return Err(ExprError::DivisionByZero),
            BinOp::FloorDiv => i.checked_div(j).map(|q| {
                if i % j != 0 && (i < 0) != (j < 0) {
                    q - 1
                } else {
                    q
                }
            }),
            BinOp::Mod => i.checked_rem(j).map(|r| {
                if r != 0 && (r < 0) != (j < 0) {
                    r + j
                } else {
                    r
                }
            }),
            _ => None,
        };
        if let Some(r) = exact {
            return Ok(Value::from(r));
        }
    }

    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if y == 0.0 => {
            return Err(ExprError::DivisionByZero)
        }
        BinOp::Div => x / y,
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Mod => {
            let r = x % y;
            if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }
        }
        _ => return Err(ExprError::Type(format!("unsupported operator {op:?}"))),
    };
    float(result)
}

fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => value::as_f64(a) == value::as_f64(b),
        _ => a == b,
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> Result<Value, ExprError> {
    let ordering = match (a, b) {
        (Value::Number(_), Value::Number(_)) => number(a)?.partial_cmp(&number(b)?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
    .ok_or_else(|| {
        ExprError::Type(format!(
            "cannot compare {} with {}",
            value::type_name(a),
            value::type_name(b)
        ))
    })?;

    Ok(Value::Bool(match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

// ═══════════════════════════════════════════════════════════════
// Builtins
// ═══════════════════════════════════════════════════════════════

type Builtin = fn(&[Value]) -> Result<Value, ExprError>;

fn builtin(name: &str) -> Option<Builtin> {
    let f: Builtin = match name {
        "len" => |args| {
            arity("len", args, 1, 1)?;
            match &args[0] {
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Array(a) => Ok(Value::from(a.len())),
                Value::Object(o) => Ok(Value::from(o.len())),
                other => Err(ExprError::Type(format!(
                    "{} has no len()",
                    value::type_name(other)
                ))),
            }
        },
        "str" => |args| {
            arity("str", args, 1, 1)?;
            Ok(Value::String(value::to_text(&args[0])))
        },
        "int" => |args| {
            arity("int", args, 1, 1)?;
            match &args[0] {
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| ExprError::Type(format!("invalid literal for int(): '{s}'"))),
                v => whole(number(v)?.trunc()),
            }
        },
        "float" => |args| {
            arity("float", args, 1, 1)?;
            match &args[0] {
                Value::Bool(b) => float(if *b { 1.0 } else { 0.0 }),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ExprError::Type(format!("could not convert '{s}' to float")))
                    .and_then(float),
                v => float(number(v)?),
            }
        },
        "round" => |args| {
            arity("round", args, 1, 2)?;
            let x = number(&args[0])?;
            let digits = match args.get(1) {
                Some(d) => integer(d)?.clamp(-15, 15) as i32,
                None => 0,
            };
            if digits == 0 {
                whole(x.round_ties_even())
            } else {
                let factor = 10f64.powi(digits);
                float((x * factor).round_ties_even() / factor)
            }
        },
        "abs" => |args| {
            arity("abs", args, 1, 1)?;
            match args[0].as_i64() {
                Some(i) => i
                    .checked_abs()
                    .map(Value::from)
                    .map_or_else(|| float((i as f64).abs()), Ok),
                None => float(number(&args[0])?.abs()),
            }
        },
        "min" => |args| extreme("min", args, |a, b| a < b),
        "max" => |args| extreme("max", args, |a, b| a > b),
        "upper" => |args| {
            arity("upper", args, 1, 1)?;
            Ok(Value::String(text(&args[0])?.to_uppercase()))
        },
        "lower" => |args| {
            arity("lower", args, 1, 1)?;
            Ok(Value::String(text(&args[0])?.to_lowercase()))
        },
        _ => return None,
    };
    Some(f)
}

/// `min`/`max` over the arguments, or over a single list argument
fn extreme(name: &str, args: &[Value], better: fn(f64, f64) -> bool) -> Result<Value, ExprError> {
    let items = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };
    let (first, rest) = items.split_first().ok_or_else(|| ExprError::Arity {
        function: name.to_string(),
        expected: "at least 1".to_string(),
        got: 0,
    })?;

    let mut best = first;
    let mut best_n = number(first)?;
    for item in rest {
        let n = number(item)?;
        if better(n, best_n) {
            best = item;
            best_n = n;
        }
    }
    Ok(best.clone())
}

// ═══════════════════════════════════════════════════════════════
// Parser
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Ref {
        namespace: Option<String>,
        name: String,
    },
    Call {
        namespace: Option<String>,
        name: String,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Sym(&'static str),
}

const SYMBOLS: [&str; 16] = [
    "//", "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "(", ")", ",", ".",
];

fn syntax(offset: usize, message: impl Into<String>) -> ExprError {
    ExprError::Syntax {
        offset,
        message: message.into(),
    }
}

fn tokenize(src: &str) -> Result<Vec<(usize, Tok)>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() {
            let mut end = i;
            let mut seen_dot = false;
            while let Some(&(j, c)) = chars.peek() {
                if c.is_ascii_digit() || (c == '.' && !seen_dot) {
                    seen_dot |= c == '.';
                    end = j + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            let literal = &src[i..end];
            let tok = if seen_dot {
                literal
                    .parse::<f64>()
                    .map(Tok::Float)
                    .map_err(|_| syntax(i, format!("bad number '{literal}'")))?
            } else {
                literal
                    .parse::<i64>()
                    .map(Tok::Int)
                    .map_err(|_| syntax(i, format!("integer '{literal}' out of range")))?
            };
            tokens.push((i, tok));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let mut end = i;
            while let Some(&(j, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    end = j + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((i, Tok::Ident(src[i..end].to_string())));
            continue;
        }

        if ch == '\'' || ch == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    c if c == ch => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, 'n')) => s.push('\n'),
                        Some((_, 't')) => s.push('\t'),
                        Some((_, other)) => s.push(other),
                        None => break,
                    },
                    c => s.push(c),
                }
            }
            if !closed {
                return Err(syntax(i, "unterminated string"));
            }
            tokens.push((i, Tok::Str(s)));
            continue;
        }

        let rest = &src[i..];
        let sym = SYMBOLS
            .iter()
            .find(|s| rest.starts_with(**s))
            .ok_or_else(|| syntax(i, format!("unexpected character '{ch}'")))?;
        for _ in 0..sym.len() {
            chars.next();
        }
        tokens.push((i, Tok::Sym(*sym)));
    }

    Ok(tokens)
}

fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        pos: 0,
        len: src.len(),
    };
    if parser.tokens.is_empty() {
        return Err(syntax(0, "empty expression"));
    }
    let expr = parser.or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some((offset, tok)) => Err(syntax(*offset, format!("unexpected {tok:?}"))),
    }
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.len, |(o, _)| *o)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Sym(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(s)) if s == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<(), ExprError> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected '{sym}'")))
        }
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Tok::Sym("==")) => BinOp::Eq,
            Some(Tok::Sym("!=")) => BinOp::Ne,
            Some(Tok::Sym("<")) => BinOp::Lt,
            Some(Tok::Sym("<=")) => BinOp::Le,
            Some(Tok::Sym(">")) => BinOp::Gt,
            Some(Tok::Sym(">=")) => BinOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym("+")) => BinOp::Add,
                Some(Tok::Sym("-")) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.multiplicative()?));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Sym("*")) => BinOp::Mul,
                Some(Tok::Sym("/")) => BinOp::Div,
                Some(Tok::Sym("//")) => BinOp::FloorDiv,
                Some(Tok::Sym("%")) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            left = Expr::Binary(op, Box::new(left), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_sym("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat_sym("+") {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.next() {
            Some(Tok::Int(i)) => Ok(Expr::Literal(Value::from(i))),
            Some(Tok::Float(f)) => value::float(f)
                .map(Expr::Literal)
                .ok_or_else(|| syntax(offset, "non-finite float")),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Sym("(")) => {
                let inner = self.or()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            Some(Tok::Ident(word)) => self.named(word),
            Some(tok) => Err(syntax(offset, format!("unexpected {tok:?}"))),
            None => Err(syntax(offset, "unexpected end of expression")),
        }
    }

    fn named(&mut self, word: String) -> Result<Expr, ExprError> {
        match word.as_str() {
            "true" | "True" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" | "False" => return Ok(Expr::Literal(Value::Bool(false))),
            "none" | "None" | "null" => return Ok(Expr::Literal(Value::Null)),
            "and" | "or" | "not" => {
                return Err(syntax(self.offset(), format!("unexpected keyword '{word}'")))
            }
            _ => {}
        }

        let (namespace, name) = if self.eat_sym(".") {
            match self.next() {
                Some(Tok::Ident(member)) => (Some(word), member),
                _ => return Err(syntax(self.offset(), "expected a member name after '.'")),
            }
        } else {
            (None, word)
        };

        if !self.eat_sym("(") {
            return Ok(Expr::Ref { namespace, name });
        }

        let mut args = Vec::new();
        if !self.eat_sym(")") {
            loop {
                args.push(self.or()?);
                if self.eat_sym(")") {
                    break;
                }
                self.expect_sym(",")?;
            }
        }
        Ok(Expr::Call {
            namespace,
            name,
            args,
        })
    }
}
