//! IEEE-754 float primitives (spec.md §4.3, row "Float"): 32 or 64 bits,
//! two endians, always byte-aligned.

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::Expr;
use crate::field::{finish_instantiation, Field, FieldRef, Prototype, WeakFieldRef};
use crate::primitives::common::PrimitiveMeta;
use crate::primitives::integer::Endian;
use crate::value::Value;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FloatWidth {
	F32,
	F64,
}

#[derive(Debug, Clone, Default)]
pub struct FloatParams {
	pub initial_value: Option<Expr>,
	pub value: Option<Expr>,
	pub check_value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FloatProto {
	width: FloatWidth,
	endian: Endian,
	params: FloatParams,
}

impl FloatProto {
	pub fn new(width: FloatWidth, endian: Endian, params: FloatParams) -> Self {
		Self { width, endian, params }
	}
}

impl Prototype for FloatProto {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		let meta = PrimitiveMeta {
			core: Default::default(),
			initial_value: self.params.initial_value.clone(),
			value: self.params.value.clone(),
			check_value: self.params.check_value.clone(),
		};
		let field = FloatField { width: self.width, endian: self.endian, raw: 0.0, meta };
		let rc = finish_instantiation(field, parent);
		rc.borrow_mut().clear();
		if !initial_value.is_null() && rc.borrow().param("value").is_none() {
			rc.borrow_mut().assign(initial_value)?;
		}
		Ok(rc)
	}
}

#[derive(Debug)]
pub struct FloatField {
	width: FloatWidth,
	endian: Endian,
	raw: f64,
	meta: PrimitiveMeta,
}

impl FloatField {
	fn coerce(value: &Value) -> Result<f64> {
		value.as_f64().ok_or(Error::InvalidAssignment("expected a float value"))
	}

	fn read_raw(&self, stream: &mut BitReader) -> Result<f64> {
		match self.width {
			FloatWidth::F32 => {
				let bytes = stream.read_bytes(4)?;
				let arr: [u8; 4] = bytes.try_into().unwrap();
				Ok(match self.endian {
					Endian::Big => f32::from_be_bytes(arr),
					Endian::Little => f32::from_le_bytes(arr),
				} as f64)
			},
			FloatWidth::F64 => {
				let bytes = stream.read_bytes(8)?;
				let arr: [u8; 8] = bytes.try_into().unwrap();
				Ok(match self.endian {
					Endian::Big => f64::from_be_bytes(arr),
					Endian::Little => f64::from_le_bytes(arr),
				})
			},
		}
	}

	fn write_raw(&self, stream: &mut BitWriter, value: f64) -> Result<()> {
		match self.width {
			FloatWidth::F32 => {
				let bytes = match self.endian {
					Endian::Big => (value as f32).to_be_bytes(),
					Endian::Little => (value as f32).to_le_bytes(),
				};
				stream.write_bytes(&bytes)
			},
			FloatWidth::F64 => {
				let bytes = match self.endian {
					Endian::Big => value.to_be_bytes(),
					Endian::Little => value.to_le_bytes(),
				};
				stream.write_bytes(&bytes)
			},
		}
	}
}

impl Field for FloatField {
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		let raw = self.read_raw(stream)?;
		let materialized = Value::Float(raw);
		self.meta.verify_materialized(&materialized)?;
		self.raw = raw;
		Ok(())
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		let raw = if let Some(expr) = &self.meta.value { Self::coerce(&self.meta.eval(expr)?)? } else { self.raw };
		self.write_raw(stream, raw)
	}

	fn num_bytes(&self) -> u64 {
		match self.width {
			FloatWidth::F32 => 4,
			FloatWidth::F64 => 8,
		}
	}

	fn clear(&mut self) {
		self.raw = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v).ok()).unwrap_or(0.0);
	}

	fn is_clear(&self) -> bool {
		let default = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v).ok()).unwrap_or(0.0);
		self.raw == default
	}

	fn snapshot(&self) -> Value {
		if let Some(expr) = &self.meta.value {
			self.meta.eval(expr).unwrap_or(Value::Null)
		} else {
			Value::Float(self.raw)
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
		self.meta.param(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn little_endian_f32_round_trips() {
		let f = FloatProto::new(FloatWidth::F32, Endian::Little, Default::default())
			.instantiate(Value::Null, None)
			.unwrap();
		f.borrow_mut().assign(Value::Float(2.0)).unwrap();
		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			f.borrow_mut().write(&mut w).unwrap();
		}
		assert_eq!(out, 2.0f32.to_le_bytes().to_vec());

		let f2 = FloatProto::new(FloatWidth::F32, Endian::Little, Default::default())
			.instantiate(Value::Null, None)
			.unwrap();
		let mut cursor = Cursor::new(out.as_slice());
		let mut r = BitReader::new(&mut cursor);
		f2.borrow_mut().read(&mut r).unwrap();
		assert_eq!(f2.borrow().snapshot().as_f64(), Some(2.0));
	}
}
