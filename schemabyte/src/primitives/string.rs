//! String primitives (spec.md §4.3): fixed-length, null-terminated, and
//! unbounded.

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::Expr;
use crate::field::{finish_instantiation, Field, FieldRef, Prototype, WeakFieldRef};
use crate::primitives::common::PrimitiveMeta;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum StringKind {
	/// `length` is an expression evaluated at read/write time (often a
	/// symbol referencing a sibling length-prefix field, spec.md §8
	/// scenario 6).
	Fixed { length: Expr, trim_padding: bool, pad_byte: u8 },
	NullTerminated { max_length: Option<Expr> },
	Unbounded,
}

#[derive(Debug, Clone, Default)]
pub struct StringParams {
	pub initial_value: Option<Expr>,
	pub value: Option<Expr>,
	pub check_value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct StringProto {
	kind: StringKind,
	params: StringParams,
}

impl StringProto {
	pub fn new(kind: StringKind, params: StringParams) -> Self {
		Self { kind, params }
	}
}

impl Prototype for StringProto {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		let meta = PrimitiveMeta {
			core: Default::default(),
			initial_value: self.params.initial_value.clone(),
			value: self.params.value.clone(),
			check_value: self.params.check_value.clone(),
		};
		let field = StringField { kind: self.kind.clone(), raw: Vec::new(), meta };
		let rc = finish_instantiation(field, parent);
		rc.borrow_mut().clear();
		if !initial_value.is_null() && rc.borrow().param("value").is_none() {
			rc.borrow_mut().assign(initial_value)?;
		}
		Ok(rc)
	}
}

#[derive(Debug)]
pub struct StringField {
	kind: StringKind,
	raw: Vec<u8>,
	meta: PrimitiveMeta,
}

impl StringField {
	fn coerce(value: &Value) -> Result<Vec<u8>> {
		value.as_bytes().map(|b| b.to_vec()).ok_or(Error::InvalidAssignment("expected a string/byte value"))
	}

	fn to_value(&self) -> Value {
		match std::str::from_utf8(&self.raw) {
			Ok(s) => Value::Str(s.to_string()),
			Err(_) => Value::Bytes(self.raw.clone()),
		}
	}
}

impl Field for StringField {
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		let raw = match &self.kind {
			StringKind::Fixed { length, trim_padding, pad_byte } => {
				let len = self.meta.eval(length)?.as_usize().ok_or(Error::InvalidAssignment("string length must be an integer"))?;
				let mut bytes = stream.read_bytes(len)?;
				if *trim_padding {
					while bytes.last() == Some(pad_byte) {
						bytes.pop();
					}
				}
				bytes
			},
			StringKind::NullTerminated { max_length } => {
				let max = max_length.as_ref().map(|e| self.meta.eval(e)).transpose()?.and_then(|v| v.as_usize());
				let mut bytes = Vec::new();
				loop {
					if let Some(max) = max {
						if bytes.len() >= max {
							break;
						}
					}
					match stream.read_byte_opt()? {
						None => break,
						Some(0) => break,
						Some(b) => bytes.push(b),
					}
				}
				bytes
			},
			StringKind::Unbounded => stream.read_remaining()?,
		};
		let materialized = match std::str::from_utf8(&raw) {
			Ok(s) => Value::Str(s.to_string()),
			Err(_) => Value::Bytes(raw.clone()),
		};
		self.meta.verify_materialized(&materialized)?;
		self.raw = raw;
		Ok(())
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		let raw = if let Some(expr) = &self.meta.value { Self::coerce(&self.meta.eval(expr)?)? } else { self.raw.clone() };
		match &self.kind {
			StringKind::Fixed { length, trim_padding: _, pad_byte } => {
				let len = self.meta.eval(length)?.as_usize().ok_or(Error::InvalidAssignment("string length must be an integer"))?;
				let mut bytes = raw;
				bytes.resize(len, *pad_byte);
				bytes.truncate(len);
				stream.write_bytes(&bytes)
			},
			StringKind::NullTerminated { .. } => {
				stream.write_bytes(&raw)?;
				stream.write_bytes(&[0u8])
			},
			StringKind::Unbounded => stream.write_bytes(&raw),
		}
	}

	fn num_bytes(&self) -> u64 {
		match &self.kind {
			StringKind::Fixed { length, .. } => self.meta.eval(length).ok().and_then(|v| v.as_usize()).unwrap_or(self.raw.len()) as u64,
			StringKind::NullTerminated { .. } => self.raw.len() as u64 + 1,
			StringKind::Unbounded => self.raw.len() as u64,
		}
	}

	fn clear(&mut self) {
		self.raw = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v).ok()).unwrap_or_default();
	}

	fn is_clear(&self) -> bool {
		let default = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v).ok()).unwrap_or_default();
		self.raw == default
	}

	fn snapshot(&self) -> Value {
		if let Some(expr) = &self.meta.value {
			self.meta.eval(expr).unwrap_or(Value::Null)
		} else {
			self.to_value()
		}
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		self.meta.reject_assign_if_computed()?;
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
		match name {
			"length" => match &self.kind {
				StringKind::Fixed { length, .. } => Some(length.clone()),
				_ => None,
			},
			"max_length" => match &self.kind {
				StringKind::NullTerminated { max_length } => max_length.clone(),
				_ => None,
			},
			_ => self.meta.param(name),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn fixed_length_trims_padding() {
		let kind = StringKind::Fixed { length: Expr::constant(5u128), trim_padding: true, pad_byte: 0 };
		let f = StringProto::new(kind, Default::default()).instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&b"hi\0\0\0"[..]);
		let mut r = BitReader::new(&mut cursor);
		f.borrow_mut().read(&mut r).unwrap();
		assert_eq!(f.borrow().snapshot().as_str(), Some("hi"));
	}

	#[test]
	fn null_terminated_stops_at_zero() {
		let kind = StringKind::NullTerminated { max_length: None };
		let f = StringProto::new(kind, Default::default()).instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&b"abc\0trailing"[..]);
		let mut r = BitReader::new(&mut cursor);
		f.borrow_mut().read(&mut r).unwrap();
		assert_eq!(f.borrow().snapshot().as_str(), Some("abc"));
	}
}
