//! `schemabyte` — a declarative engine for reading and writing structured
//! binary data. A schema is built as a tree of [`Prototype`]s (primitive
//! values, Records/Structs, Arrays, Choices); `instantiate` produces a live
//! [`Field`] tree that `read`/`write` drive sequentially against a byte
//! stream, with parameters resolved through the [`eval`] module's
//! LazyEvaluator.
//!
//! The surface syntax for declaring schemas (a builder DSL) is out of
//! scope; [`proto`] is the minimal in-crate constructor surface a caller
//! uses instead, and [`registry`] resolves type names to primitive classes.

pub mod bitio;
pub mod composite;
pub mod error;
pub mod eval;
pub mod field;
pub mod primitives;
pub mod proto;
pub mod registry;
pub mod value;

pub use error::{Error, Result};
pub use eval::{evaluate, evaluate_simple, Binding, EvalContext, Expr};
pub use field::{read_bytes, write_to_vec, Field, FieldRef, Prototype, WeakFieldRef};
pub use value::Value;
