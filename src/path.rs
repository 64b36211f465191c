//! Dotted context paths (v0.1)
//!
//! Supports:
//! - `a.b.c` (mapping key, then attribute fallback)
//! - `items.0.name` (digit-only segment = non-negative index)
//! - `ticker.price('usd')` (callable member with literal arguments)
//! - `portfolio.get('BTC').price()` (chained calls)
//!
//! Does NOT support:
//! - Negative indices: `items.-1`
//! - Bracket syntax: `items[0]`
//! - Nested expressions as arguments: `f(g())`

use serde_json::Value;
use thiserror::Error;

use crate::context::Node;

/// A parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Mapping key or attribute: `.field`
    Field(String),
    /// Sequence index: `.0`
    Index(usize),
    /// Callable member: `.name(arg, ...)`
    Call { name: String, args: Vec<Value> },
}

/// Why a path string could not be parsed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("empty segment in '{path}'")]
    EmptySegment { path: String },

    #[error("unbalanced parentheses or quotes in '{segment}'")]
    Unbalanced { segment: String },

    #[error("invalid member name in '{segment}'")]
    BadName { segment: String },

    #[error("index '{segment}' is out of range")]
    BadIndex { segment: String },

    #[error("argument '{arg}' is not a string, number or boolean literal")]
    BadArgument { arg: String },
}

/// Parse a dotted path into segments
///
/// Examples:
/// - "weather.temp" → [Field("weather"), Field("temp")]
/// - "matrix.0.1" → [Field("matrix"), Index(0), Index(1)]
/// - "t.price('usd')" → [Field("t"), Call { name: "price", args: ["usd"] }]
pub fn parse(path: &str) -> Result<Vec<Segment>, PathError> {
    if path.trim().is_empty() {
        return Err(PathError::Empty);
    }

    split_top_level(path, '.')
        .ok_or_else(|| PathError::Unbalanced {
            segment: path.to_string(),
        })?
        .into_iter()
        .map(|part| parse_segment(part, path))
        .collect()
}

fn parse_segment(part: &str, path: &str) -> Result<Segment, PathError> {
    if part.is_empty() {
        return Err(PathError::EmptySegment {
            path: path.to_string(),
        });
    }

    if let Some(body) = part.strip_suffix(')') {
        let open = body.find('(').ok_or_else(|| PathError::Unbalanced {
            segment: part.to_string(),
        })?;
        let name = &body[..open];
        if !is_identifier(name) {
            return Err(PathError::BadName {
                segment: part.to_string(),
            });
        }
        let args = parse_args(&body[open + 1..])?;
        return Ok(Segment::Call {
            name: name.to_string(),
            args,
        });
    }

    if part.contains(['(', ')', '\'', '"']) {
        return Err(PathError::Unbalanced {
            segment: part.to_string(),
        });
    }

    if part.bytes().all(|b| b.is_ascii_digit()) {
        let index = part.parse::<usize>().map_err(|_| PathError::BadIndex {
            segment: part.to_string(),
        })?;
        return Ok(Segment::Index(index));
    }

    Ok(Segment::Field(part.to_string()))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse a comma-separated literal argument list
fn parse_args(args: &str) -> Result<Vec<Value>, PathError> {
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parts = split_top_level(args, ',').ok_or_else(|| PathError::Unbalanced {
        segment: args.to_string(),
    })?;

    parts.into_iter().map(|arg| parse_literal(arg.trim())).collect()
}

fn parse_literal(arg: &str) -> Result<Value, PathError> {
    let quoted = arg.len() >= 2
        && ((arg.starts_with('\'') && arg.ends_with('\''))
            || (arg.starts_with('"') && arg.ends_with('"')));
    if quoted {
        return Ok(Value::String(arg[1..arg.len() - 1].to_string()));
    }

    if arg.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if arg.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }
    if let Ok(i) = arg.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Some(v) = arg
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(crate::value::float)
    {
        return Ok(v);
    }

    Err(PathError::BadArgument {
        arg: arg.to_string(),
    })
}

/// Split on `sep` outside parentheses and quotes.
///
/// Returns `None` when parentheses or quotes are unbalanced.
fn split_top_level(input: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.checked_sub(1)?,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }
    parts.push(&input[start..]);
    Some(parts)
}

/// Apply parsed segments to a context node, failing fast on the first
/// unresolvable segment.
pub fn apply(root: &Node, segments: &[Segment]) -> Option<Node> {
    if segments.is_empty() {
        return None;
    }

    let mut current = root.clone();
    for segment in segments {
        current = match segment {
            Segment::Call { name, args } => current.call(name, args)?,
            Segment::Index(idx) => current.index(*idx)?,
            Segment::Field(name) => current.key(name).or_else(|| current.attr(name))?,
        };
    }

    Some(current)
}

/// Parse and apply a path in one step
pub fn resolve(root: &Node, path: &str) -> Result<Option<Value>, PathError> {
    let segments = parse(path)?;
    Ok(apply(root, &segments).and_then(Node::into_value))
}

/// Resolve a path, folding parse errors into NOT_FOUND (`None`).
pub fn resolve_path(root: &Node, path: &str) -> Option<Value> {
    resolve(root, path).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostObject;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parse_simple_path() {
        let segments = parse("a.b.c").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Field("a".to_string()),
                Segment::Field("b".to_string()),
                Segment::Field("c".to_string()),
            ]
        );
    }

    #[test]
    fn parse_numeric_segments_as_index() {
        let segments = parse("matrix.0.1").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Field("matrix".to_string()),
                Segment::Index(0),
                Segment::Index(1),
            ]
        );
    }

    #[test]
    fn parse_call_with_literals() {
        let segments = parse("t.price('a.b', 2, 1.5, true)").unwrap();
        assert_eq!(
            segments[1],
            Segment::Call {
                name: "price".to_string(),
                args: vec![json!("a.b"), json!(2), json!(1.5), json!(true)],
            }
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(parse(""), Err(PathError::Empty));
        assert!(matches!(parse("a..b"), Err(PathError::EmptySegment { .. })));
        assert!(matches!(parse("a.b(1"), Err(PathError::Unbalanced { .. })));
        assert!(matches!(parse("a.b(x)"), Err(PathError::BadArgument { .. })));
        assert!(matches!(parse("a.(1)"), Err(PathError::BadName { .. })));
        assert!(matches!(parse("a.-1"), Ok(_)));
    }

    #[test]
    fn matrix_index_walk() {
        let ctx = Node::from(json!({"matrix": [[1, 2, 3], [4, 5, 6]]}));
        assert_eq!(resolve_path(&ctx, "matrix.0.1"), Some(json!(2)));
        assert_eq!(resolve_path(&ctx, "matrix.1.2"), Some(json!(6)));
        assert_eq!(resolve_path(&ctx, "matrix.2.0"), None);
        assert_eq!(resolve_path(&ctx, "matrix.0.3"), None);
    }

    #[test]
    fn string_indexing_is_not_found() {
        let ctx = Node::from(json!({"text": "hello"}));
        assert_eq!(resolve_path(&ctx, "text.0"), None);
    }

    #[test]
    fn negative_index_is_a_missing_key() {
        let ctx = Node::from(json!({"items": [1, 2]}));
        assert_eq!(resolve_path(&ctx, "items.-1"), None);
    }

    #[test]
    fn empty_path_is_not_found() {
        let ctx = Node::from(json!({"a": 1}));
        assert_eq!(resolve_path(&ctx, ""), None);
    }

    #[test]
    fn segments_keep_surrounding_spaces() {
        let ctx = Node::from(json!({"a": {"b": 1, " b": 2}}));
        assert_eq!(resolve_path(&ctx, "a.b"), Some(json!(1)));
        assert_eq!(resolve_path(&ctx, "a. b"), Some(json!(2)));
        assert_eq!(
            parse("a. b").unwrap(),
            vec![Segment::Field("a".into()), Segment::Field(" b".into())]
        );
    }

    #[test]
    fn key_then_attribute_fallback() {
        let obj = HostObject::new()
            .with_key("shared", json!("from-key"))
            .with_attr("shared", json!("from-attr"))
            .with_attr("only_attr", json!(7));
        let ctx = Node::from(HostObject::new().with_key("obj", obj));
        assert_eq!(resolve_path(&ctx, "obj.shared"), Some(json!("from-key")));
        assert_eq!(resolve_path(&ctx, "obj.only_attr"), Some(json!(7)));
        assert_eq!(resolve_path(&ctx, "obj.nope"), None);
    }

    #[test]
    fn chained_method_calls() {
        let ticker = HostObject::new().with_method("price", |args| {
            match args.first().and_then(Value::as_str) {
                Some("fiat") => Some(Node::from(json!(64000.5))),
                _ => None,
            }
        });
        let portfolio = HostObject::new().with_method("get_ticker", move |args| {
            (args.first()? == &json!("BTC")).then(|| Node::from(ticker.clone()))
        });
        let ctx = Node::from(HostObject::new().with_key("portfolio", portfolio));

        assert_eq!(
            resolve_path(&ctx, "portfolio.get_ticker('BTC').price('fiat')"),
            Some(json!(64000.5))
        );
        assert_eq!(resolve_path(&ctx, "portfolio.get_ticker('ETH').price('fiat')"), None);
        assert_eq!(resolve_path(&ctx, "portfolio.missing()"), None);
    }

    #[test]
    fn calling_plain_data_fails() {
        let ctx = Node::from(json!({"name": "x"}));
        assert_eq!(resolve_path(&ctx, "name.upper()"), None);
    }

    fn manual_walk<'a>(value: &'a Value, keys: &[String]) -> Option<&'a Value> {
        keys.iter().try_fold(value, |v, k| v.get(k.as_str()))
    }

    proptest! {
        #[test]
        fn resolving_matches_manual_walk(keys in prop::collection::vec("[a-z][a-z_]{0,6}", 1..5), leaf in any::<i64>()) {
            let mut value = json!(leaf);
            for key in keys.iter().rev() {
                let mut map = serde_json::Map::new();
                map.insert(key.clone(), value);
                value = Value::Object(map);
            }
            let ctx = Node::from(value.clone());
            let path = keys.join(".");
            prop_assert_eq!(resolve_path(&ctx, &path), manual_walk(&value, &keys).cloned());
        }
    }
}
