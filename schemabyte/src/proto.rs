//! A minimal prototype-construction surface standing in for the
//! schema-declaration DSL spec.md §1 places out of scope. Given a type name,
//! an endian hint, and the spec.md §6 parameter surface, builds the matching
//! primitive or composite [`crate::field::Prototype`].
//!
//! Endian inheritance (spec.md §4.4): a Record's `:endian` is threaded
//! through [`field_specs`] to every endian-polymorphic field that doesn't
//! carry its own override; a nested Record call with its own `endian`
//! argument overrides for its own subtree, exactly as the nested-endian test
//! in spec.md §8 scenario 5 requires.

use std::rc::Rc;

use crate::composite::record::RecordField;
use crate::error::Result;
use crate::eval::Expr;
use crate::field::ProtoRef;
use crate::primitives::float::{FloatParams, FloatProto, FloatWidth};
use crate::primitives::integer::{Endian, IntKind, IntegerParams, IntegerProto};
use crate::primitives::rest::{RestParams, RestProto};
use crate::primitives::string::{StringKind, StringParams, StringProto};
use crate::registry::{self, PrimitiveClass};

/// The parameter surface a single field declaration may carry, a flattened
/// union of every primitive's params (spec.md §6, "Parameter surface").
/// Unused fields for a given `type_name` are simply ignored.
#[derive(Clone, Default)]
pub struct FieldParams {
	pub initial_value: Option<Expr>,
	pub value: Option<Expr>,
	pub check_value: Option<Expr>,
	pub length: Option<Expr>,
	pub trim_padding: bool,
	pub pad_byte: u8,
	pub max_length: Option<Expr>,
}

/// Resolves `type_name` (via the registry, composing `endian` onto
/// endian-polymorphic names) into a leaf prototype.
pub fn primitive(type_name: &str, endian: Option<Endian>, params: FieldParams) -> Result<ProtoRef> {
	let class = registry::lookup(type_name, endian)?;
	Ok(match class {
		PrimitiveClass::UInt { width, endian } => {
			let kind = if width % 8 == 0 && matches!(width, 8 | 16 | 32 | 64) {
				fixed_unsigned_kind(width, endian)
			} else {
				IntKind::NarrowUnsigned(width)
			};
			Rc::new(IntegerProto::new(kind, int_params(&params)))
		},
		PrimitiveClass::Int { width, endian } => {
			let kind = if width % 8 == 0 && matches!(width, 8 | 16 | 32 | 64) {
				fixed_signed_kind(width, endian)
			} else {
				IntKind::NarrowSigned(width)
			};
			Rc::new(IntegerProto::new(kind, int_params(&params)))
		},
		PrimitiveClass::Bits { width, order, signed } => {
			Rc::new(IntegerProto::new(IntKind::Bits { width, order, signed }, int_params(&params)))
		},
		PrimitiveClass::Float32 { endian } => Rc::new(FloatProto::new(FloatWidth::F32, endian, float_params(&params))),
		PrimitiveClass::Float64 { endian } => Rc::new(FloatProto::new(FloatWidth::F64, endian, float_params(&params))),
		PrimitiveClass::StringFixed => Rc::new(StringProto::new(
			StringKind::Fixed { length: params.length.clone().unwrap_or(Expr::constant(0u128)), trim_padding: params.trim_padding, pad_byte: params.pad_byte },
			string_params(&params),
		)),
		PrimitiveClass::StringNullTerminated => {
			Rc::new(StringProto::new(StringKind::NullTerminated { max_length: params.max_length.clone() }, string_params(&params)))
		},
		PrimitiveClass::StringUnbounded => Rc::new(StringProto::new(StringKind::Unbounded, string_params(&params))),
		PrimitiveClass::Rest => Rc::new(RestProto::new(RestParams { initial_value: params.initial_value.clone() })),
	})
}

fn fixed_unsigned_kind(width: u32, endian: Endian) -> IntKind {
	use crate::primitives::integer::{u16, u32, u64, u8_kind};
	match width {
		8 => u8_kind(),
		16 => u16(endian),
		32 => u32(endian),
		64 => u64(endian),
		_ => unreachable!("checked by caller"),
	}
}

fn fixed_signed_kind(width: u32, endian: Endian) -> IntKind {
	use crate::primitives::integer::{i16, i32, i64, i8_kind};
	match width {
		8 => i8_kind(),
		16 => i16(endian),
		32 => i32(endian),
		64 => i64(endian),
		_ => unreachable!("checked by caller"),
	}
}

fn int_params(p: &FieldParams) -> IntegerParams {
	IntegerParams { initial_value: p.initial_value.clone(), value: p.value.clone(), check_value: p.check_value.clone() }
}

fn float_params(p: &FieldParams) -> FloatParams {
	FloatParams { initial_value: p.initial_value.clone(), value: p.value.clone(), check_value: p.check_value.clone() }
}

fn string_params(p: &FieldParams) -> StringParams {
	StringParams { initial_value: p.initial_value.clone(), value: p.value.clone(), check_value: p.check_value.clone() }
}

/// One field declaration as a builder would hand it to a Record/Struct.
pub struct FieldSpec {
	pub name: Option<String>,
	pub type_name: String,
	/// An explicit per-field override; `None` inherits the enclosing
	/// Record's `endian`.
	pub endian: Option<Endian>,
	pub params: FieldParams,
}

impl FieldSpec {
	pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
		Self { name: Some(name.into()), type_name: type_name.into(), endian: None, params: Default::default() }
	}

	pub fn anonymous(type_name: impl Into<String>) -> Self {
		Self { name: None, type_name: type_name.into(), endian: None, params: Default::default() }
	}

	pub fn with_endian(mut self, endian: Endian) -> Self {
		self.endian = Some(endian);
		self
	}

	pub fn with_params(mut self, params: FieldParams) -> Self {
		self.params = params;
		self
	}
}

/// Resolves a Record/Struct's field list, threading `endian` onto every
/// spec that doesn't carry its own override (spec.md §4.4, "Endian
/// inheritance").
pub fn field_specs(specs: Vec<FieldSpec>, endian: Option<Endian>) -> Result<Vec<RecordField>> {
	specs
		.into_iter()
		.map(|spec| {
			let effective_endian = spec.endian.or(endian);
			let proto = primitive(&spec.type_name, effective_endian, spec.params)?;
			Ok(match spec.name {
				Some(name) => RecordField::new(name, proto),
				None => RecordField::anonymous(proto),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bitio::{BitReader, BitWriter};
	use crate::composite::record::Struct;
	use crate::field::{Field, Prototype};
	use crate::value::Value;
	use std::io::Cursor;

	#[test]
	fn nested_endian_inheritance_matches_scenario_5() {
		let inner_fields = field_specs(
			vec![FieldSpec::new("b", "int16"), FieldSpec::new("c", "int16")],
			Some(Endian::Little),
		)
		.unwrap();
		let inner = Struct::new(inner_fields, Default::default()).unwrap();

		let outer_fields_protos: Vec<RecordField> = {
			let mut fields = field_specs(vec![FieldSpec::new("a", "int16")], Some(Endian::Big)).unwrap();
			fields.push(RecordField::new("s", Rc::new(inner)));
			fields.extend(field_specs(vec![FieldSpec::new("d", "int16")], Some(Endian::Big)).unwrap());
			fields
		};
		let outer = Struct::new(outer_fields_protos, Default::default()).unwrap();
		let field = outer.instantiate(Value::Null, None).unwrap();

		let mut cursor = Cursor::new(&[0x00u8, 0x01, 0x02, 0x00, 0x03, 0x00, 0x00, 0x04][..]);
		let mut r = BitReader::new(&mut cursor);
		field.borrow_mut().read(&mut r).unwrap();

		let snapshot = field.borrow().snapshot();
		let map = match snapshot {
			Value::Map(m) => m,
			_ => panic!("expected a map snapshot"),
		};
		assert_eq!(map.get("a").unwrap().as_i128(), Some(1));
		assert_eq!(map.get("d").unwrap().as_i128(), Some(4));
		let s = match map.get("s").unwrap() {
			Value::Map(m) => m,
			_ => panic!("expected a nested map"),
		};
		assert_eq!(s.get("b").unwrap().as_i128(), Some(2));
		assert_eq!(s.get("c").unwrap().as_i128(), Some(3));

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			field.borrow_mut().write(&mut w).unwrap();
		}
		assert_eq!(out, vec![0x00, 0x01, 0x02, 0x00, 0x03, 0x00, 0x00, 0x04]);
	}
}
