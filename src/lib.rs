//! A small data-flow engine for composing multi-stage transformations over
//! tabular record streams.
//!
//! A [`Graph`] is built by chaining operators — [`Graph::map`],
//! [`Graph::sort`], [`Graph::fold`], [`Graph::reduce`], [`Graph::join`] —
//! starting from a named [`Graph::source`]. Running it against a set of
//! [`Bindings`] pulls records through the whole plan one at a time; nothing
//! runs until the output is actually consumed, and no operator holds more
//! than it has to (sort and fold are the two exceptions, and both document
//! why in their own modules).
//!
//! ```
//! use tableflow::{record, Bindings, Graph, Record, Value};
//! use tableflow::error::CallbackError;
//!
//! let plan = Graph::source("numbers").fold(
//!     |state: Value, record: Record| -> Result<Value, CallbackError> {
//!         let Value::Int(total) = state else { unreachable!() };
//!         let added = match record.get("n") {
//!             Some(Value::Int(n)) => *n,
//!             _ => 0,
//!         };
//!         Ok(Value::Int(total + added))
//!     },
//!     Value::Int(0),
//! );
//!
//! let mut bindings = Bindings::new();
//! bindings.bind("numbers", vec![record! {"n" => Value::Int(1)}, record! {"n" => Value::Int(2)}]).unwrap();
//!
//! let out = plan.run(bindings).unwrap();
//! assert_eq!(out[0].get("value"), Some(&Value::Int(3)));
//! ```

pub mod bindings;
pub mod config;
pub mod error;
pub mod field;
pub mod graph;
pub mod operators;
pub mod record;
pub mod stream;
pub mod value;

pub use bindings::Bindings;
pub use config::EngineConfig;
pub use error::EngineError;
pub use field::{FieldName, Keys};
pub use graph::Graph;
pub use operators::JoinStrategy;
pub use record::Record;
pub use stream::BoxStream;
pub use value::Value;
