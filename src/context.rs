//! Render context capability layer (v0.1)
//!
//! A render context is either plain data (`serde_json::Value`) or a host
//! object that exposes keys, attributes, indexed items and callable members
//! through the [`Accessible`] trait. The path resolver is polymorphic over
//! this capability set only; it never sees concrete host types.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Capabilities a context value may expose to the path resolver.
///
/// Every method defaults to "not supported", so adapters only implement
/// what their host type actually offers.
pub trait Accessible: Send + Sync {
    /// Mapping lookup (`ctx["key"]`)
    fn key(&self, _key: &str) -> Option<Node> {
        None
    }

    /// Attribute/member lookup (`obj.name`)
    fn attr(&self, _name: &str) -> Option<Node> {
        None
    }

    /// Ordered-sequence lookup (`items[3]`)
    fn index(&self, _index: usize) -> Option<Node> {
        None
    }

    /// Invoke a callable member with literal arguments.
    ///
    /// `None` means the member does not exist, is not callable, or declined
    /// the arguments.
    fn call(&self, _name: &str, _args: &[Value]) -> Option<Node> {
        None
    }

    /// Plain-data snapshot used when a path ends on this object.
    fn to_value(&self) -> Option<Value> {
        None
    }
}

/// A value reached while walking a context path.
#[derive(Clone)]
pub enum Node {
    /// Plain data
    Data(Value),
    /// Host object exposing [`Accessible`] capabilities
    Object(Arc<dyn Accessible>),
}

impl Node {
    pub fn key(&self, key: &str) -> Option<Node> {
        match self {
            Node::Data(v) => v.key(key),
            Node::Object(o) => o.key(key),
        }
    }

    pub fn attr(&self, name: &str) -> Option<Node> {
        match self {
            Node::Data(v) => v.attr(name),
            Node::Object(o) => o.attr(name),
        }
    }

    pub fn index(&self, index: usize) -> Option<Node> {
        match self {
            Node::Data(v) => v.index(index),
            Node::Object(o) => o.index(index),
        }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Option<Node> {
        match self {
            Node::Data(v) => v.call(name, args),
            Node::Object(o) => o.call(name, args),
        }
    }

    /// Convert the node into plain data, if it has a data form.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Node::Data(v) => Some(v),
            Node::Object(o) => o.to_value(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Node::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Data(value)
    }
}

impl From<HostObject> for Node {
    fn from(object: HostObject) -> Self {
        Node::Object(Arc::new(object))
    }
}

impl From<Arc<dyn Accessible>> for Node {
    fn from(object: Arc<dyn Accessible>) -> Self {
        Node::Object(object)
    }
}

/// Plain JSON data: objects are key-addressable, arrays are indexable.
///
/// Strings are deliberately not indexable.
impl Accessible for Value {
    fn key(&self, key: &str) -> Option<Node> {
        self.as_object()?.get(key).cloned().map(Node::Data)
    }

    fn index(&self, index: usize) -> Option<Node> {
        self.as_array()?.get(index).cloned().map(Node::Data)
    }

    fn to_value(&self) -> Option<Value> {
        Some(self.clone())
    }
}

/// Callable member of a [`HostObject`].
pub type Method = Arc<dyn Fn(&[Value]) -> Option<Node> + Send + Sync>;

/// General-purpose host object: a table of keys, attributes, items and
/// methods. Applications embed these in a context to expose live state.
///
/// ```
/// use viewtext::context::{HostObject, Node};
/// use serde_json::json;
///
/// let ticker = HostObject::new()
///     .with_attr("symbol", json!("BTC"))
///     .with_method("price", |args| {
///         let fiat = args.first()?.as_str()?;
///         Some(Node::from(json!(if fiat == "usd" { 64000 } else { 59000 })))
///     });
/// let node = Node::from(ticker);
/// assert!(node.attr("symbol").is_some());
/// assert!(node.call("price", &[json!("usd")]).is_some());
/// ```
#[derive(Clone, Default)]
pub struct HostObject {
    entries: FxHashMap<String, Node>,
    attrs: FxHashMap<String, Node>,
    items: Vec<Node>,
    methods: FxHashMap<String, Method>,
}

impl HostObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping entry
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<Node>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Node>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Append an indexed item
    pub fn with_item(mut self, value: impl Into<Node>) -> Self {
        self.items.push(value.into());
        self
    }

    /// Add a callable member
    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&[Value]) -> Option<Node> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }
}

impl Accessible for HostObject {
    fn key(&self, key: &str) -> Option<Node> {
        self.entries.get(key).cloned()
    }

    fn attr(&self, name: &str) -> Option<Node> {
        self.attrs.get(name).cloned()
    }

    fn index(&self, index: usize) -> Option<Node> {
        self.items.get(index).cloned()
    }

    fn call(&self, name: &str, args: &[Value]) -> Option<Node> {
        let method = self.methods.get(name)?;
        method(args)
    }

    fn to_value(&self) -> Option<Value> {
        if !self.items.is_empty() && self.entries.is_empty() && self.attrs.is_empty() {
            let items = self
                .items
                .iter()
                .map(|n| n.clone().into_value().unwrap_or(Value::Null))
                .collect();
            return Some(Value::Array(items));
        }

        let mut map = Map::new();
        for (name, node) in self.attrs.iter().chain(self.entries.iter()) {
            if let Some(v) = node.clone().into_value() {
                map.insert(name.clone(), v);
            }
        }
        Some(Value::Object(map))
    }
}
