//! Shared bookkeeping for every primitive kind: `initial_value`, the
//! computed-`value` / `check_value` contract, and the parent/self
//! back-reference (spec.md §4.3).

use crate::error::{Error, Result};
use crate::eval::{evaluate_simple, Expr};
use crate::field::FieldCore;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct PrimitiveMeta {
	pub core: FieldCore,
	pub initial_value: Option<Expr>,
	pub value: Option<Expr>,
	pub check_value: Option<Expr>,
}

impl PrimitiveMeta {
	pub fn param(&self, name: &str) -> Option<Expr> {
		match name {
			"initial_value" => self.initial_value.clone(),
			"value" => self.value.clone(),
			"check_value" => self.check_value.clone(),
			_ => None,
		}
	}

	pub fn is_computed(&self) -> bool {
		self.value.is_some()
	}

	/// Evaluates `expr` anchored at this field. Panics only if called
	/// before the field has been wrapped in its `Rc` (a constructor bug,
	/// not a user-reachable state).
	pub fn eval(&self, expr: &Expr) -> Result<Value> {
		let start = self.core.self_handle().expect("primitive read/write before instantiation finished");
		evaluate_simple(expr, &start)
	}

	pub fn initial(&self) -> Result<Option<Value>> {
		self.initial_value.as_ref().map(|e| self.eval(e)).transpose()
	}

	/// Raised when the caller tries to `assign` a field whose `value` is
	/// computed — those are read-only from the outside (spec.md §4.3).
	pub fn reject_assign_if_computed(&self) -> Result<()> {
		if self.is_computed() {
			return Err(Error::InvalidAssignment("field value is computed; it cannot be assigned directly"));
		}
		Ok(())
	}

	/// After a value has been materialized from the stream, checks it
	/// against `value` (if computed) or `check_value` (if present).
	pub fn verify_materialized(&self, materialized: &Value) -> Result<()> {
		let check = self.value.as_ref().or(self.check_value.as_ref());
		if let Some(expr) = check {
			let expected = self.eval(expr)?;
			if &expected != materialized {
				return Err(Error::ValidityError { expected, actual: materialized.clone() });
			}
		}
		Ok(())
	}
}
