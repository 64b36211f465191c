//! ViewText - input resolution engine for text-grid layouts
//!
//! Named inputs are resolved against a render context: dotted context
//! paths, constants, host expressions and computed operations over other
//! inputs, with transforms, validation and per-render caching.
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use viewtext::{config::{Format, InputsConfig}, BasicEvaluator, InputTable, Node, Resolver};
//!
//! let config = InputsConfig::parse(r#"
//!     [inputs.temp_c]
//!     context_key = "weather.temp"
//!
//!     [inputs.temp_f]
//!     operation = "celsius_to_fahrenheit"
//!     sources = ["temp_c"]
//! "#, Format::Toml).unwrap();
//! let table = InputTable::from_config(&config, &BasicEvaluator::new()).unwrap();
//! let resolver = Resolver::new(Arc::new(table));
//!
//! let context = Node::from(json!({"weather": {"temp": 100}}));
//! let mut render = resolver.render(&context);
//! assert_eq!(render.resolve("temp_f").unwrap().into_value(), Some(json!(212.0)));
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod expr;
pub mod input;
pub mod ops;
pub mod path;
pub mod scaffold;
pub mod template;
pub mod validation;
pub mod value;

pub use context::{Accessible, HostObject, Node};
pub use engine::{Render, Resolved, Resolver};
pub use error::{FixSuggestion, Result, ViewError};
pub use expr::{BasicEvaluator, ExpressionEvaluator};
pub use input::{InputDefinition, InputKind, InputTable, Transform};
pub use validation::{OnError, Outcome, ValidationSpec, ValueType};
