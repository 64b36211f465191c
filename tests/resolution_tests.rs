//! # Resolution Engine Tests (v0.1)
//!
//! End-to-end behavior through the public API:
//! - config → definition table → resolver → render
//! - validation policies (use_default, raise, skip, coerce)
//! - computed chains, conditional templates, cycles
//! - per-render memoization of host expressions
//! - concurrent renders over a shared resolver

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use viewtext::config::{Format, InputsConfig};
use viewtext::{
    BasicEvaluator, HostObject, InputTable, Node, Resolved, Resolver, ViewError,
};

// ============================================================================
// TEST HELPERS
// ============================================================================

fn resolver_with(toml: &str, evaluator: BasicEvaluator) -> Resolver {
    let config = InputsConfig::parse(toml, Format::Toml).unwrap();
    let table = InputTable::from_config(&config, &evaluator).unwrap();
    Resolver::with_evaluator(Arc::new(table), Arc::new(evaluator))
}

fn resolver(toml: &str) -> Resolver {
    resolver_with(toml, BasicEvaluator::new())
}

fn value_of(resolver: &Resolver, name: &str, ctx: Value) -> Option<Value> {
    resolver
        .resolve(name, &Node::from(ctx))
        .unwrap()
        .into_value()
}

// ============================================================================
// CONTEXT PATHS
// ============================================================================

#[test]
fn test_matrix_index_path() {
    let r = resolver(
        r#"
        [inputs.cell]
        context_key = "matrix.0.1"

        [inputs.outside]
        context_key = "matrix.5.0"
        default = "n/a"

        [inputs.char]
        context_key = "text.0"
        "#,
    );
    let ctx = json!({"matrix": [[1, 2, 3], [4, 5, 6]], "text": "hello"});

    assert_eq!(value_of(&r, "cell", ctx.clone()), Some(json!(2)));
    assert_eq!(value_of(&r, "outside", ctx.clone()), Some(json!("n/a")));
    assert_eq!(
        r.resolve("char", &Node::from(ctx)).unwrap(),
        Resolved::Defaulted(Value::Null)
    );
}

#[test]
fn test_host_object_method_path() {
    let r = resolver(
        r#"
        [inputs.btc_price]
        context_key = "portfolio.get_ticker('BTC').price('usd')"
        default = 0
        "#,
    );

    let ticker = HostObject::new().with_method("price", |args| {
        (args.first()?.as_str()? == "usd").then(|| Node::from(json!(64000)))
    });
    let portfolio = HostObject::new().with_method("get_ticker", move |args| {
        (args.first()?.as_str()? == "BTC").then(|| Node::from(ticker.clone()))
    });
    let ctx = Node::from(HostObject::new().with_key("portfolio", portfolio));

    assert_eq!(
        r.resolve("btc_price", &ctx).unwrap(),
        Resolved::Value(json!(64000))
    );
}

// ============================================================================
// VALIDATION POLICIES
// ============================================================================

const POLICY_CONFIG: &str = r#"
    [inputs.lenient]
    context_key = "n"
    type = "int"
    default = 7

    [inputs.strict]
    context_key = "n"
    type = "int"
    on_validation_error = "raise"

    [inputs.optional]
    context_key = "n"
    type = "int"
    on_validation_error = "skip"

    [inputs.coerced]
    context_key = "n"
    type = "int"
    on_validation_error = "coerce"
    default = -1
"#;

#[test]
fn test_use_default_returns_exact_default() {
    let r = resolver(POLICY_CONFIG);
    assert_eq!(
        r.resolve("lenient", &Node::from(json!({"n": "abc"}))).unwrap(),
        Resolved::Defaulted(json!(7))
    );
    assert_eq!(
        r.resolve("lenient", &Node::from(json!({"n": 3}))).unwrap(),
        Resolved::Value(json!(3))
    );
}

#[test]
fn test_raise_surfaces_error() {
    let r = resolver(POLICY_CONFIG);
    let err = r
        .resolve("strict", &Node::from(json!({"n": "abc"})))
        .unwrap_err();
    assert!(matches!(err, ViewError::ValidationFailed { ref input, .. } if input == "strict"));
    assert!(err.to_string().starts_with("VT-031"));
}

#[test]
fn test_skip_is_absent() {
    let r = resolver(POLICY_CONFIG);
    assert_eq!(
        r.resolve("optional", &Node::from(json!({"n": "abc"}))).unwrap(),
        Resolved::Absent
    );
}

#[test]
fn test_coerce_converts_or_defaults() {
    let r = resolver(POLICY_CONFIG);
    assert_eq!(value_of(&r, "coerced", json!({"n": "12"})), Some(json!(12)));
    assert_eq!(value_of(&r, "coerced", json!({"n": "twelve"})), Some(json!(-1)));
}

#[test]
fn test_raise_in_source_terminates_render() {
    let r = resolver(
        r#"
        [inputs.n]
        context_key = "n"
        type = "int"
        on_validation_error = "raise"

        [inputs.doubled]
        operation = "multiply"
        sources = ["n", "n"]
        default = 0
        "#,
    );
    assert!(matches!(
        r.resolve("doubled", &Node::from(json!({"n": "x"}))),
        Err(ViewError::ValidationFailed { .. })
    ));
}

// ============================================================================
// COMPUTED OPERATIONS
// ============================================================================

#[test]
fn test_linear_transform() {
    let r = resolver(
        r#"
        [inputs.raw]
        context_key = "raw"

        [inputs.scaled]
        operation = "linear_transform"
        sources = ["raw"]
        multiply = 2
        divide = 3
        add = 10
        "#,
    );
    let scaled = value_of(&r, "scaled", json!({"raw": 9})).unwrap();
    assert_eq!(scaled.as_f64(), Some(16.0));
}

#[test]
fn test_concat_names() {
    let r = resolver(
        r#"
        [inputs.first]
        context_key = "first"

        [inputs.last]
        context_key = "last"

        [inputs.full_name]
        operation = "concat"
        sources = ["first", "last"]
        separator = " "
        skip_empty = true
        "#,
    );
    assert_eq!(
        value_of(&r, "full_name", json!({"first": "Jane", "last": "Doe"})),
        Some(json!("Jane Doe"))
    );
    assert_eq!(
        value_of(&r, "full_name", json!({"first": "", "last": "Doe"})),
        Some(json!("Doe"))
    );
}

#[test]
fn test_divide_by_zero_uses_default() {
    let r = resolver(
        r#"
        [inputs.a]
        context_key = "a"

        [inputs.b]
        context_key = "b"

        [inputs.ratio]
        operation = "divide"
        sources = ["a", "b"]
        default = "--"
        "#,
    );
    assert_eq!(
        r.resolve("ratio", &Node::from(json!({"a": 10, "b": 0}))).unwrap(),
        Resolved::Defaulted(json!("--"))
    );
    assert_eq!(
        value_of(&r, "ratio", json!({"a": 10, "b": 4})),
        Some(json!(2.5))
    );
}

#[test]
fn test_conditional_currency_label() {
    let r = resolver(
        r#"
        [inputs.amount]
        context_key = "amount"

        [inputs.currency]
        context_key = "currency"

        [inputs.price_label]
        operation = "conditional"
        condition = { input = "currency", equals = "USD" }
        if_true = "$~amount~"
        if_false = "~amount~ {{ currency }}"
        "#,
    );
    assert_eq!(
        value_of(&r, "price_label", json!({"amount": 5, "currency": "USD"})),
        Some(json!("$5"))
    );
    assert_eq!(
        value_of(&r, "price_label", json!({"amount": 5, "currency": "EUR"})),
        Some(json!("5 EUR"))
    );
}

#[test]
fn test_self_referential_conditional_uses_default() {
    let r = resolver(
        r#"
        [inputs.x]
        operation = "conditional"
        condition = { input = "x", equals = 1 }
        if_true = "yes"
        if_false = "no"
        default = "dflt"
        "#,
    );
    assert_eq!(
        r.resolve("x", &Node::from(json!({}))).unwrap(),
        Resolved::Defaulted(json!("dflt"))
    );
}

#[test]
fn test_skipped_condition_input_uses_default() {
    let r = resolver(
        r#"
        [inputs.currency]
        context_key = "currency"
        type = "str"
        on_validation_error = "skip"

        [inputs.label]
        operation = "conditional"
        condition = { input = "currency", equals = "USD" }
        if_true = "dollars"
        if_false = "other"
        default = "dflt"
        "#,
    );
    let ctx = Node::from(json!({"currency": 42}));
    let mut render = r.render(&ctx);
    assert_eq!(render.resolve("currency").unwrap(), Resolved::Absent);
    assert_eq!(
        render.resolve("label").unwrap(),
        Resolved::Defaulted(json!("dflt"))
    );
}

#[test]
fn test_context_key_operation_source() {
    let r = resolver(
        r#"
        [inputs.temp_f]
        operation = "celsius_to_fahrenheit"
        context_key = "weather.temp_c"
        default = 0
        "#,
    );
    assert_eq!(
        value_of(&r, "temp_f", json!({"weather": {"temp_c": 100}})),
        Some(json!(212.0))
    );
    assert_eq!(value_of(&r, "temp_f", json!({})), Some(json!(0)));
}

#[test]
fn test_self_cycle_uses_default() {
    let r = resolver(
        r#"
        [inputs.loop]
        operation = "abs"
        sources = ["loop"]
        default = 42
        "#,
    );
    assert_eq!(
        r.resolve("loop", &Node::from(json!({}))).unwrap(),
        Resolved::Defaulted(json!(42))
    );
}

// ============================================================================
// HOST EXPRESSIONS
// ============================================================================

#[test]
fn test_host_expression_memoized_per_render() {
    let counter = Arc::new(AtomicI64::new(0));
    let mut evaluator = BasicEvaluator::new();
    let c = Arc::clone(&counter);
    evaluator.register("counter", "next", move |_| {
        Ok(Value::from(c.fetch_add(1, Ordering::SeqCst) + 1))
    });

    let r = resolver_with(
        r##"
        [inputs.tick]
        expression = "counter.next()"
        namespace = "counter"

        [inputs.total]
        operation = "add"
        sources = ["tick", "tick", "tick"]

        [inputs.label]
        operation = "concat"
        sources = ["tick"]
        prefix = "#"
        "##,
        evaluator,
    );

    let ctx = Node::from(json!({}));

    let mut first = r.render(&ctx);
    assert_eq!(first.resolve("total").unwrap(), Resolved::Value(json!(3)));
    assert_eq!(first.resolve("label").unwrap(), Resolved::Value(json!("#1")));
    assert_eq!(first.resolve("tick").unwrap(), Resolved::Value(json!(1)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let mut second = r.render(&ctx);
    assert_eq!(second.resolve("tick").unwrap(), Resolved::Value(json!(2)));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failing_expression_uses_default() {
    let r = resolver(
        r#"
        [inputs.root]
        expression = "math.sqrt(-1)"
        namespace = "math"
        default = "NaN"
        "#,
    );
    assert_eq!(
        r.resolve("root", &Node::from(json!({}))).unwrap(),
        Resolved::Defaulted(json!("NaN"))
    );
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_renders_are_isolated() {
    let r = resolver(
        r#"
        [inputs.n]
        context_key = "n"

        [inputs.squared]
        operation = "multiply"
        sources = ["n", "n"]
        "#,
    );

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8i64)
            .map(|i| {
                let r = &r;
                scope.spawn(move || {
                    let ctx = Node::from(json!({ "n": i }));
                    let mut render = r.render(&ctx);
                    (0..50)
                        .map(|_| render.resolve("squared").unwrap())
                        .all(|v| v == Resolved::Value(json!(i * i)))
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    });
}

#[test]
fn test_unknown_input_name() {
    let r = resolver("[inputs.a]\nconstant = 1\n");
    assert!(matches!(
        r.resolve("b", &Node::from(json!({}))),
        Err(ViewError::UnknownInput { .. })
    ));
}
