//! The "rest of stream" raw-bytes primitive (spec.md §4.3, row "Rest").

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::Expr;
use crate::field::{finish_instantiation, Field, FieldRef, Prototype, WeakFieldRef};
use crate::primitives::common::PrimitiveMeta;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct RestParams {
	pub initial_value: Option<Expr>,
}

#[derive(Debug, Clone, Default)]
pub struct RestProto {
	params: RestParams,
}

impl RestProto {
	pub fn new(params: RestParams) -> Self {
		Self { params }
	}
}

impl Prototype for RestProto {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		let meta = PrimitiveMeta { core: Default::default(), initial_value: self.params.initial_value.clone(), value: None, check_value: None };
		let field = RestField { raw: Vec::new(), meta };
		let rc = finish_instantiation(field, parent);
		rc.borrow_mut().clear();
		if !initial_value.is_null() {
			rc.borrow_mut().assign(initial_value)?;
		}
		Ok(rc)
	}
}

#[derive(Debug)]
pub struct RestField {
	raw: Vec<u8>,
	meta: PrimitiveMeta,
}

impl RestField {
	fn coerce(value: &Value) -> Result<Vec<u8>> {
		value.as_bytes().map(|b| b.to_vec()).ok_or(Error::InvalidAssignment("expected a byte value"))
	}
}

impl Field for RestField {
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		self.raw = stream.read_remaining()?;
		Ok(())
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		stream.write_bytes(&self.raw)
	}

	fn num_bytes(&self) -> u64 {
		self.raw.len() as u64
	}

	fn clear(&mut self) {
		self.raw = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v).ok()).unwrap_or_default();
	}

	fn is_clear(&self) -> bool {
		let default = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v).ok()).unwrap_or_default();
		self.raw == default
	}

	fn snapshot(&self) -> Value {
		Value::Bytes(self.raw.clone())
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		self.raw = Self::coerce(&value)?;
		Ok(())
	}

	fn parent(&self) -> Option<FieldRef> {
		self.meta.core.parent()
	}
	fn set_parent(&mut self, parent: WeakFieldRef) {
		self.meta.core.set_parent(parent);
	}
	fn bind_self(&mut self, self_ref: WeakFieldRef) {
		self.meta.core.bind_self(self_ref);
	}
	fn self_handle(&self) -> Option<FieldRef> {
		self.meta.core.self_handle()
	}
	fn param(&self, name: &str) -> Option<Expr> {
		self.meta.param(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn reads_to_end_of_stream() {
		let f = RestProto::default().instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&b"whatever is left"[..]);
		let mut r = BitReader::new(&mut cursor);
		f.borrow_mut().read(&mut r).unwrap();
		assert_eq!(f.borrow().snapshot().as_bytes(), Some(&b"whatever is left"[..]));
	}
}
