//! The type registry external interface (spec.md §6): `lookup(name, endian?)
//! -> class`. Accepts lower-snake names, composes an endian suffix onto
//! endian-polymorphic names, and leaves bit-field names alone (their order
//! is already encoded by the `le` suffix).

use fxhash::FxHashMap;

use crate::bitio::BitOrder;
use crate::error::{Error, Result};
use crate::primitives::integer::Endian;

/// The class a registered name resolves to: enough information for
/// `proto.rs` to build the matching primitive prototype, without itself
/// carrying per-instance parameters (those come from the schema builder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveClass {
	UInt { width: u32, endian: Endian },
	Int { width: u32, endian: Endian },
	Bits { width: u32, order: BitOrder, signed: bool },
	Float32 { endian: Endian },
	Float64 { endian: Endian },
	StringFixed,
	StringNullTerminated,
	StringUnbounded,
	Rest,
}

/// Composes `name` with `endian` (if the name is endian-polymorphic and no
/// explicit `be`/`le` suffix is already present) and resolves the result to
/// a [`PrimitiveClass`].
pub fn lookup(name: &str, endian: Option<Endian>) -> Result<PrimitiveClass> {
	let name = name.trim().to_lowercase();
	if let Some(class) = fixed_table().get(name.as_str()) {
		return Ok(*class);
	}
	if let Some(class) = parse_bits(&name) {
		return Ok(class);
	}
	if let Some(class) = parse_sized_int(&name, endian) {
		return Ok(class);
	}
	Err(Error::UnregisteredType(name))
}

fn endian_or_default(e: Option<Endian>) -> Endian {
	e.unwrap_or(Endian::Big)
}

/// `bitN` / `bitNle`: always bit-packed; the `le` suffix picks `Lsb0`,
/// otherwise `Msb0` (spec.md §4.3's "default bit-order is big").
fn parse_bits(name: &str) -> Option<PrimitiveClass> {
	let (body, signed) = if let Some(rest) = name.strip_prefix("bit") {
		(rest, false)
	} else if let Some(rest) = name.strip_prefix("sbit") {
		(rest, true)
	} else {
		return None;
	};
	let (digits, order) = if let Some(d) = body.strip_suffix("le") { (d, BitOrder::Lsb0) } else { (body, BitOrder::Msb0) };
	let width: u32 = digits.parse().ok()?;
	if width == 0 || width > 128 {
		return None;
	}
	Some(PrimitiveClass::Bits { width, order, signed })
}

/// `intN` / `uintN`, optionally suffixed with an explicit `be`/`le` (which
/// overrides any inherited `endian` hint).
fn parse_sized_int(name: &str, endian: Option<Endian>) -> Option<PrimitiveClass> {
	let (body, signed) = if let Some(rest) = name.strip_prefix("uint") {
		(rest, false)
	} else if let Some(rest) = name.strip_prefix("int") {
		(rest, true)
	} else {
		return None;
	};
	let (digits, resolved_endian) = if let Some(d) = body.strip_suffix("be") {
		(d, Endian::Big)
	} else if let Some(d) = body.strip_suffix("le") {
		(d, Endian::Little)
	} else {
		(body, endian_or_default(endian))
	};
	let width: u32 = digits.parse().ok()?;
	if width == 0 || width > 128 {
		return None;
	}
	if width % 8 == 0 {
		Some(if signed { PrimitiveClass::Int { width, endian: resolved_endian } } else { PrimitiveClass::UInt { width, endian: resolved_endian } })
	} else {
		// A narrow intN/uintN falls back to bit-packed Msb0 (spec.md §4.3
		// table); byte endianness doesn't apply below a byte.
		Some(PrimitiveClass::Bits { width, order: BitOrder::Msb0, signed })
	}
}

fn fixed_table() -> &'static FxHashMap<&'static str, PrimitiveClass> {
	static TABLE: std::sync::OnceLock<FxHashMap<&'static str, PrimitiveClass>> = std::sync::OnceLock::new();
	TABLE.get_or_init(build_fixed_table)
}

fn build_fixed_table() -> FxHashMap<&'static str, PrimitiveClass> {
	let mut m = FxHashMap::default();
	m.insert("float32", PrimitiveClass::Float32 { endian: Endian::Big });
	m.insert("float32be", PrimitiveClass::Float32 { endian: Endian::Big });
	m.insert("float32le", PrimitiveClass::Float32 { endian: Endian::Little });
	m.insert("float", PrimitiveClass::Float32 { endian: Endian::Big });
	m.insert("float64", PrimitiveClass::Float64 { endian: Endian::Big });
	m.insert("float64be", PrimitiveClass::Float64 { endian: Endian::Big });
	m.insert("float64le", PrimitiveClass::Float64 { endian: Endian::Little });
	m.insert("double", PrimitiveClass::Float64 { endian: Endian::Big });
	m.insert("string", PrimitiveClass::StringFixed);
	m.insert("cstring", PrimitiveClass::StringNullTerminated);
	m.insert("rest", PrimitiveClass::Rest);
	m
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_byte_aligned_and_bit_packed_names() {
		assert_eq!(lookup("uint16", Some(Endian::Little)).unwrap(), PrimitiveClass::UInt { width: 16, endian: Endian::Little });
		assert_eq!(lookup("int16be", Some(Endian::Little)).unwrap(), PrimitiveClass::Int { width: 16, endian: Endian::Big });
		assert_eq!(lookup("bit3le", None).unwrap(), PrimitiveClass::Bits { width: 3, order: BitOrder::Lsb0, signed: false });
		assert_eq!(lookup("uint3", None).unwrap(), PrimitiveClass::Bits { width: 3, order: BitOrder::Msb0, signed: false });
	}

	#[test]
	fn unregistered_name_errors() {
		assert!(lookup("nonsense", None).is_err());
	}
}
