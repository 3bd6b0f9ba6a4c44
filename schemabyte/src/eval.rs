//! The LazyEvaluator (spec.md §4.2): resolves a parameter expression —
//! constant, closure, or symbolic name — against a chain of enclosing
//! Field instances.
//!
//! Rust has no `method_missing`; per the Design Notes (§9) a closure here
//! is a plain `Fn(&EvalContext) -> Result<Value>` that calls named
//! accessors on an explicit context object, rather than a dotted
//! expression resolved by runtime reflection.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::field::FieldRef;
use crate::value::Value;

/// A parameter expression: a literal, a closure, or a symbolic reference to
/// another field/parameter (spec.md §3, "Parameter expression").
#[derive(Clone)]
pub enum Expr {
	Const(Value),
	Symbol(String),
	Closure(Rc<dyn Fn(&EvalContext) -> Result<Value>>),
}

impl std::fmt::Debug for Expr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Expr::Const(v) => write!(f, "Const({v:?})"),
			Expr::Symbol(s) => write!(f, "Symbol(:{s})"),
			Expr::Closure(_) => write!(f, "Closure(..)"),
		}
	}
}

impl Expr {
	pub fn constant(v: impl Into<Value>) -> Self {
		Expr::Const(v.into())
	}

	pub fn symbol(name: impl Into<String>) -> Self {
		Expr::Symbol(name.into())
	}

	pub fn closure(f: impl Fn(&EvalContext) -> Result<Value> + 'static) -> Self {
		Expr::Closure(Rc::new(f))
	}
}

/// A value bound for the duration of one evaluation call: either a plain
/// scalar override, or a live field (used for the `index`/`element`/`array`
/// bindings Array injects into per-element evaluations).
#[derive(Clone)]
pub enum Binding {
	Value(Value),
	Field(FieldRef),
}

impl From<Value> for Binding {
	fn from(v: Value) -> Self {
		Binding::Value(v)
	}
}
impl From<FieldRef> for Binding {
	fn from(f: FieldRef) -> Self {
		Binding::Field(f)
	}
}

fn binding_to_value(b: &Binding) -> Value {
	match b {
		Binding::Value(v) => v.clone(),
		Binding::Field(f) => f.borrow().snapshot(),
	}
}

/// The context a closure is evaluated against: the field it is anchored to
/// plus whatever call-site overrides are in scope.
pub struct EvalContext<'a> {
	pub field: FieldRef,
	pub overrides: &'a HashMap<String, Binding>,
}

impl<'a> EvalContext<'a> {
	/// Resolves `name` using the full LazyEvaluator resolution order.
	pub fn resolve(&self, name: &str) -> Result<Value> {
		resolve_name(name, &self.field, self.overrides)
	}

	/// The field this context is anchored to.
	pub fn this(&self) -> FieldRef {
		self.field.clone()
	}

	/// The enclosing field, if any (the root has none).
	pub fn parent(&self) -> Option<FieldRef> {
		self.field.borrow().parent()
	}

	/// A field bound via an override (`array`, `element`), if present.
	pub fn field(&self, name: &str) -> Option<FieldRef> {
		match self.overrides.get(name)? {
			Binding::Field(f) => Some(f.clone()),
			Binding::Value(_) => None,
		}
	}

	/// The `index` binding Array injects during per-element evaluation.
	pub fn index(&self) -> Option<usize> {
		match self.overrides.get("index")? {
			Binding::Value(v) => v.as_usize(),
			Binding::Field(_) => None,
		}
	}
}

/// Evaluates `expr` starting from `start`, with the given call-site
/// overrides taking precedence over everything else.
pub fn evaluate(expr: &Expr, start: &FieldRef, overrides: &HashMap<String, Binding>) -> Result<Value> {
	match expr {
		Expr::Const(v) => Ok(v.clone()),
		Expr::Symbol(name) => resolve_name(name, start, overrides),
		Expr::Closure(f) => {
			let ctx = EvalContext { field: start.clone(), overrides };
			f(&ctx)
		},
	}
}

/// Evaluates `expr` with no overrides in scope.
pub fn evaluate_simple(expr: &Expr, start: &FieldRef) -> Result<Value> {
	evaluate(expr, start, &HashMap::new())
}

fn resolve_name(name: &str, start: &FieldRef, overrides: &HashMap<String, Binding>) -> Result<Value> {
	// 1. call-site overrides.
	if let Some(b) = overrides.get(name) {
		return Ok(binding_to_value(b));
	}

	// 2-4. parameters then methods of the current field, then its
	// ancestors, in order.
	let mut current = Some(start.clone());
	while let Some(field) = current {
		if let Some(expr) = field.borrow().param(name) {
			return evaluate(&expr, &field, overrides);
		}
		if let Some(v) = field.borrow().child_value(name) {
			return Ok(v);
		}
		if name == "parent" {
			return Ok(match field.borrow().parent() {
				Some(p) => p.borrow().snapshot(),
				None => Value::Null,
			});
		}
		current = field.borrow().parent();
	}

	// 5. root miss.
	Err(Error::UnresolvedName(name.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::composite::record::{Record, RecordField};
	use crate::field::{Field, Prototype};
	use crate::primitives::integer::{IntKind, IntegerProto};
	use std::rc::Rc;

	#[test]
	fn symbol_resolves_against_sibling() {
		let len = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
		let rec = Record::new(vec![RecordField::new("len", len)], Default::default()).unwrap();
		let rec = rec.instantiate(Value::Null, None).unwrap();

		let mut map = indexmap::IndexMap::new();
		map.insert("len".to_string(), Value::from(7u64));
		rec.borrow_mut().assign(Value::Map(map)).unwrap();

		let expr = Expr::symbol("len");
		let v = evaluate_simple(&expr, &rec).unwrap();
		assert_eq!(v.as_u128(), Some(7));
	}
}
