//! Integer and raw bit-field primitives (spec.md §4.3, rows "Integer
//! intN/uintN" and "Bit field bitN[le]").

use crate::bitio::{BitOrder, BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::Expr;
use crate::field::{finish_instantiation, Field, FieldRef, Prototype, WeakFieldRef};
use crate::primitives::common::PrimitiveMeta;
use crate::value::Value;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Endian {
	Big,
	Little,
}

/// How a given integer kind is drawn from the BitStream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum IntMode {
	/// `width % 8 == 0`: a whole-byte read/write, byte-endian ordered.
	ByteAligned(Endian),
	/// Anything sub-byte, or an explicit `bitN[le]` declaration: drawn bit
	/// by bit through the BitStream's bit buffer (spec.md §4.1).
	Packed(BitOrder),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IntKind {
	U8,
	U16(Endian),
	U32(Endian),
	U64(Endian),
	I8,
	I16(Endian),
	I32(Endian),
	I64(Endian),
	/// A named `intN`/`uintN` whose width isn't a multiple of 8: alignment
	/// falls back to bit-packed, per the spec.md §4.3 table. Bit order
	/// defaults to `Msb0` — byte endianness doesn't apply below a byte.
	NarrowUnsigned(u32),
	NarrowSigned(u32),
	/// An explicit `bitN`/`bitNle` field: always bit-packed, order chosen
	/// by the `le` suffix.
	Bits { width: u32, order: BitOrder, signed: bool },
}

impl IntKind {
	fn width(self) -> u32 {
		match self {
			IntKind::U8 | IntKind::I8 => 8,
			IntKind::U16(_) | IntKind::I16(_) => 16,
			IntKind::U32(_) | IntKind::I32(_) => 32,
			IntKind::U64(_) | IntKind::I64(_) => 64,
			IntKind::NarrowUnsigned(w) | IntKind::NarrowSigned(w) => w,
			IntKind::Bits { width, .. } => width,
		}
	}

	fn signed(self) -> bool {
		matches!(self, IntKind::I8 | IntKind::I16(_) | IntKind::I32(_) | IntKind::I64(_) | IntKind::NarrowSigned(_))
			|| matches!(self, IntKind::Bits { signed: true, .. })
	}

	fn mode(self) -> IntMode {
		match self {
			IntKind::U8 | IntKind::I8 => IntMode::ByteAligned(Endian::Big),
			IntKind::U16(e) | IntKind::I16(e) | IntKind::U32(e) | IntKind::I32(e) | IntKind::U64(e) | IntKind::I64(e) => {
				IntMode::ByteAligned(e)
			},
			IntKind::NarrowUnsigned(_) | IntKind::NarrowSigned(_) => IntMode::Packed(BitOrder::Msb0),
			IntKind::Bits { order, .. } => IntMode::Packed(order),
		}
	}
}

macro_rules! int_kind_family {
	($($width:literal),+) => {
		paste::paste! {
			$(
				/// Convenience constructor for the byte-aligned, endian-polymorphic
				/// `uintN`/`intN` kinds the registry composes a suffix onto.
				pub fn [<u $width>](endian: Endian) -> IntKind {
					IntKind::[<U $width>](endian)
				}
				pub fn [<i $width>](endian: Endian) -> IntKind {
					IntKind::[<I $width>](endian)
				}
			)+
		}
	};
}
int_kind_family!(16, 32, 64);

pub fn u8_kind() -> IntKind {
	IntKind::U8
}
pub fn i8_kind() -> IntKind {
	IntKind::I8
}

#[derive(Debug, Clone, Default)]
pub struct IntegerParams {
	pub initial_value: Option<Expr>,
	pub value: Option<Expr>,
	pub check_value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct IntegerProto {
	kind: IntKind,
	params: IntegerParams,
}

impl IntegerProto {
	pub fn new(kind: IntKind, params: IntegerParams) -> Self {
		Self { kind, params }
	}
}

impl Prototype for IntegerProto {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		let meta = PrimitiveMeta {
			core: Default::default(),
			initial_value: self.params.initial_value.clone(),
			value: self.params.value.clone(),
			check_value: self.params.check_value.clone(),
		};
		let field = IntegerField { kind: self.kind, raw: 0, meta };
		let rc = finish_instantiation(field, parent);
		rc.borrow_mut().clear();
		if !initial_value.is_null() && rc.borrow().param("value").is_none() {
			rc.borrow_mut().assign(initial_value)?;
		}
		Ok(rc)
	}
}

/// A live integer/bit-field value.
#[derive(Debug)]
pub struct IntegerField {
	kind: IntKind,
	raw: i128,
	meta: PrimitiveMeta,
}

impl IntegerField {
	fn coerce(value: &Value, signed: bool) -> Result<i128> {
		if signed {
			value.as_i128().ok_or(Error::InvalidAssignment("expected an integer value"))
		} else {
			value.as_u128().map(|v| v as i128).ok_or(Error::InvalidAssignment("expected an unsigned integer value"))
		}
	}

	fn to_value(&self, raw: i128) -> Value {
		if self.kind.signed() {
			Value::Int(raw)
		} else {
			Value::UInt(raw as u128)
		}
	}

	fn sign_extend(&self, raw: u128, width: u32) -> i128 {
		if !self.kind.signed() || width >= 128 {
			return raw as i128;
		}
		let sign_bit = 1u128 << (width - 1);
		if raw & sign_bit != 0 {
			(raw as i128) - (1i128 << width)
		} else {
			raw as i128
		}
	}

	fn read_raw(&self, stream: &mut BitReader) -> Result<i128> {
		let width = self.kind.width();
		match self.kind.mode() {
			IntMode::ByteAligned(endian) => {
				let bytes = stream.read_bytes((width / 8) as usize)?;
				let mut unsigned: u128 = 0;
				match endian {
					Endian::Big => {
						for b in &bytes {
							unsigned = (unsigned << 8) | *b as u128;
						}
					},
					Endian::Little => {
						for b in bytes.iter().rev() {
							unsigned = (unsigned << 8) | *b as u128;
						}
					},
				}
				Ok(self.sign_extend(unsigned, width))
			},
			IntMode::Packed(order) => {
				let bits = stream.read_bits(width, order)?;
				Ok(self.sign_extend(bits as u128, width))
			},
		}
	}

	fn write_raw(&self, stream: &mut BitWriter, raw: i128) -> Result<()> {
		let width = self.kind.width();
		let unsigned: u128 = if width >= 128 { raw as u128 } else { (raw as u128) & ((1u128 << width) - 1) };
		match self.kind.mode() {
			IntMode::ByteAligned(endian) => {
				let nbytes = (width / 8) as usize;
				let mut bytes = vec![0u8; nbytes];
				match endian {
					Endian::Big => {
						for i in 0..nbytes {
							bytes[nbytes - 1 - i] = ((unsigned >> (8 * i)) & 0xFF) as u8;
						}
					},
					Endian::Little => {
						for i in 0..nbytes {
							bytes[i] = ((unsigned >> (8 * i)) & 0xFF) as u8;
						}
					},
				}
				stream.write_bytes(&bytes)
			},
			IntMode::Packed(order) => stream.write_bits(unsigned as u64, width, order),
		}
	}
}

impl Field for IntegerField {
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		let raw = self.read_raw(stream)?;
		let materialized = self.to_value(raw);
		self.meta.verify_materialized(&materialized)?;
		self.raw = raw;
		Ok(())
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		let raw = if let Some(expr) = &self.meta.value {
			let v = self.meta.eval(expr)?;
			Self::coerce(&v, self.kind.signed())?
		} else {
			self.raw
		};
		self.write_raw(stream, raw)
	}

	fn num_bytes(&self) -> u64 {
		((self.kind.width() as u64) + 7) / 8
	}

	fn clear(&mut self) {
		self.raw = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v, self.kind.signed()).ok()).unwrap_or(0);
	}

	fn is_clear(&self) -> bool {
		let default = self.meta.initial().ok().flatten().and_then(|v| Self::coerce(&v, self.kind.signed()).ok()).unwrap_or(0);
		self.raw == default
	}

	fn snapshot(&self) -> Value {
		if let Some(expr) = &self.meta.value {
			self.meta.eval(expr).unwrap_or(Value::Null)
		} else {
			self.to_value(self.raw)
		}
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		self.meta.reject_assign_if_computed()?;
		self.raw = Self::coerce(&value, self.kind.signed())?;
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

	fn bit_width(&self) -> Option<u32> {
		match self.kind.mode() {
			IntMode::ByteAligned(_) => None,
			IntMode::Packed(_) => Some(self.kind.width()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn field(kind: IntKind) -> FieldRef {
		IntegerProto::new(kind, Default::default()).instantiate(Value::Null, None).unwrap()
	}

	#[test]
	fn big_endian_u16_round_trips() {
		let f = field(IntKind::U16(Endian::Big));
		let mut cursor = Cursor::new(&[0x01u8, 0x02][..]);
		let mut r = BitReader::new(&mut cursor);
		f.borrow_mut().read(&mut r).unwrap();
		assert_eq!(f.borrow().snapshot().as_u128(), Some(0x0102));

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			f.borrow_mut().write(&mut w).unwrap();
			w.flush().unwrap();
		}
		assert_eq!(out, vec![0x01, 0x02]);
	}

	#[test]
	fn little_endian_i32_negative_round_trips() {
		let f = field(IntKind::I32(Endian::Little));
		f.borrow_mut().assign(Value::Int(-1)).unwrap();
		let bytes = {
			let mut out = Vec::new();
			{
				let mut w = BitWriter::new(&mut out);
				f.borrow_mut().write(&mut w).unwrap();
				w.flush().unwrap();
			}
			out
		};
		assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF]);

		let f2 = field(IntKind::I32(Endian::Little));
		let mut cursor = Cursor::new(bytes.as_slice());
		let mut r = BitReader::new(&mut cursor);
		f2.borrow_mut().read(&mut r).unwrap();
		assert_eq!(f2.borrow().snapshot().as_i128(), Some(-1));
	}

	#[test]
	fn computed_value_rejects_assign() {
		let params = IntegerParams { value: Some(Expr::constant(5u128)), ..Default::default() };
		let f = IntegerProto::new(IntKind::U8, params).instantiate(Value::Null, None).unwrap();
		assert!(f.borrow_mut().assign(Value::from(1u64)).is_err());
		assert_eq!(f.borrow().snapshot().as_u128(), Some(5));
	}

	#[test]
	fn check_value_rejects_mismatch_on_read() {
		let params = IntegerParams { check_value: Some(Expr::constant(9u128)), ..Default::default() };
		let f = IntegerProto::new(IntKind::U8, params).instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&[5u8][..]);
		let mut r = BitReader::new(&mut cursor);
		assert!(f.borrow_mut().read(&mut r).is_err());
	}
}
