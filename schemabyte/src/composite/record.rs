//! Record and Struct (spec.md §3, §4.4): ordered named-field aggregates.
//!
//! Both share one sanitized field table (`RecordCore`); the only real delta
//! is that `Struct` additionally accepts anonymous (nameless) entries, which
//! still occupy layout and serialized bytes but never appear in
//! `field_names`/`snapshot`. `hide` lives on the shared core since spec.md's
//! Data Model section (§3) and Record/Struct section (§4.4) disagree about
//! which of the two owns it (see DESIGN.md).

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::Expr;
use crate::field::{finish_instantiation, Field, FieldCore, FieldRef, ProtoRef, Prototype, WeakFieldRef, RESERVED_NAMES};
use crate::value::Value;

/// One declared entry in a Record/Struct's field list, in the order a
/// builder would hand them to [`RecordCore::sanitize`].
#[derive(Clone)]
pub enum RecordField {
	Named { name: String, proto: ProtoRef },
	/// Struct-only: a field with no name. Present in layout/bytes, absent
	/// from `field_names`/`snapshot`.
	Anonymous { proto: ProtoRef },
	/// The `resume_byte_alignment` schema directive spliced between two
	/// field declarations (spec.md §4.1, §8 boundary behaviors).
	ResumeByteAlignment,
}

impl RecordField {
	pub fn new(name: impl Into<String>, proto: ProtoRef) -> Self {
		RecordField::Named { name: name.into(), proto }
	}

	pub fn anonymous(proto: ProtoRef) -> Self {
		RecordField::Anonymous { proto }
	}

	pub fn resume_byte_alignment() -> Self {
		RecordField::ResumeByteAlignment
	}
}

enum Entry {
	Named(String, ProtoRef),
	Anonymous(ProtoRef),
	Alignment,
}

/// The sanitized, immutable field table shared by `Record` and `Struct`.
struct RecordCore {
	entries: Vec<Entry>,
	hide: HashSet<String>,
}

impl RecordCore {
	fn sanitize(fields: Vec<RecordField>, hide: HashSet<String>, allow_anonymous: bool) -> Result<Self> {
		let mut seen = HashSet::new();
		let mut entries = Vec::with_capacity(fields.len());
		for field in fields {
			match field {
				RecordField::Named { name, proto } => {
					if RESERVED_NAMES.contains(&name.as_str()) {
						return Err(Error::NameCollision(name, "reserved field-contract name"));
					}
					if !seen.insert(name.clone()) {
						return Err(Error::NameCollision(name, "duplicate field name"));
					}
					entries.push(Entry::Named(name, proto));
				},
				RecordField::Anonymous { proto } => {
					if !allow_anonymous {
						return Err(Error::NameCollision(String::new(), "anonymous fields require a Struct, not a Record"));
					}
					entries.push(Entry::Anonymous(proto));
				},
				RecordField::ResumeByteAlignment => entries.push(Entry::Alignment),
			}
		}
		for name in &hide {
			if !seen.contains(name) {
				return Err(Error::NameCollision(name.clone(), "hide references an unknown field name"));
			}
		}
		Ok(Self { entries, hide })
	}
}

fn instantiate_core(core: &RecordCore, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
	let mut children = Vec::with_capacity(core.entries.len());
	for entry in &core.entries {
		match entry {
			Entry::Named(name, proto) => children.push((Some(name.clone()), Some(proto.instantiate(Value::Null, None)?))),
			Entry::Anonymous(proto) => children.push((None, Some(proto.instantiate(Value::Null, None)?))),
			Entry::Alignment => children.push((None, None)),
		}
	}
	let field = RecordInstance { children, hide: core.hide.clone(), core: Default::default() };
	let rc = finish_instantiation(field, parent);
	if !initial_value.is_null() {
		rc.borrow_mut().assign(initial_value)?;
	}
	Ok(rc)
}

pub struct Record(std::rc::Rc<RecordCore>);

impl std::fmt::Debug for Record {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Record(..)")
	}
}

impl Record {
	pub fn new(fields: Vec<RecordField>, hide: HashSet<String>) -> Result<Self> {
		Ok(Self(std::rc::Rc::new(RecordCore::sanitize(fields, hide, false)?)))
	}
}

impl Prototype for Record {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		instantiate_core(&self.0, initial_value, parent)
	}
}

pub struct Struct(std::rc::Rc<RecordCore>);

impl std::fmt::Debug for Struct {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Struct(..)")
	}
}

impl Struct {
	pub fn new(fields: Vec<RecordField>, hide: HashSet<String>) -> Result<Self> {
		Ok(Self(std::rc::Rc::new(RecordCore::sanitize(fields, hide, true)?)))
	}
}

impl Prototype for Struct {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		instantiate_core(&self.0, initial_value, parent)
	}
}

/// The live tree node both `Record` and `Struct` instantiate into. Their
/// only behavioral difference is sanitize-time (anonymous entries allowed
/// or not); the runtime walk is identical.
struct RecordInstance {
	/// Parallel to the prototype's entries: `(name, Some(child))` for a
	/// real field, `(None, None)` for a `resume_byte_alignment` marker.
	children: Vec<(Option<String>, Option<FieldRef>)>,
	hide: HashSet<String>,
	core: FieldCore,
}

impl std::fmt::Debug for RecordInstance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut m = f.debug_map();
		for (name, child) in &self.children {
			if let (Some(name), Some(child)) = (name, child) {
				m.entry(name, &child.borrow().snapshot());
			}
		}
		m.finish()
	}
}

impl RecordInstance {
	fn find(&self, name: &str) -> Option<&FieldRef> {
		self.children.iter().find_map(|(n, c)| if n.as_deref() == Some(name) { c.as_ref() } else { None })
	}

	/// Visible field names, in declared order: excludes hidden and
	/// anonymous entries (spec.md §4.4).
	pub fn field_names(&self) -> Vec<String> {
		self.children
			.iter()
			.filter_map(|(n, c)| match (n, c) {
				(Some(name), Some(_)) if !self.hide.contains(name) => Some(name.clone()),
				_ => None,
			})
			.collect()
	}

	/// Whether `name` names a field at all, visible or hidden.
	pub fn has_key(&self, name: &str) -> bool {
		self.find(name).is_some()
	}

	pub fn field(&self, name: &str) -> Option<FieldRef> {
		self.find(name).cloned()
	}
}

impl Field for RecordInstance {
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		for (_, child) in &self.children {
			match child {
				Some(child) => child.borrow_mut().read(stream)?,
				None => stream.resume_byte_alignment(),
			}
		}
		Ok(())
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		for (_, child) in &self.children {
			match child {
				Some(child) => child.borrow_mut().write(stream)?,
				None => stream.resume_byte_alignment()?,
			}
		}
		Ok(())
	}

	fn num_bytes(&self) -> u64 {
		let mut bytes = 0u64;
		let mut bits_pending = 0u32;
		for (_, child) in &self.children {
			match child {
				None => {
					bytes += ((bits_pending as u64) + 7) / 8;
					bits_pending = 0;
				},
				Some(child) => {
					let child = child.borrow();
					match child.bit_width() {
						Some(n) => bits_pending += n,
						None => {
							bytes += ((bits_pending as u64) + 7) / 8;
							bits_pending = 0;
							bytes += child.num_bytes();
						},
					}
				},
			}
		}
		bytes + (((bits_pending as u64) + 7) / 8)
	}

	fn clear(&mut self) {
		for (_, child) in &self.children {
			if let Some(child) = child {
				child.borrow_mut().clear();
			}
		}
	}

	fn is_clear(&self) -> bool {
		self.children.iter().all(|(_, c)| c.as_ref().map(|c| c.borrow().is_clear()).unwrap_or(true))
	}

	fn snapshot(&self) -> Value {
		let mut map = IndexMap::new();
		for (name, child) in &self.children {
			if let (Some(name), Some(child)) = (name, child) {
				if !self.hide.contains(name) {
					map.insert(name.clone(), child.borrow().snapshot());
				}
			}
		}
		Value::Map(map)
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		match value {
			Value::Null => Ok(()),
			Value::Map(map) => {
				for (name, v) in map {
					match self.find(&name) {
						Some(child) => child.borrow_mut().assign(v)?,
						None => return Err(Error::UnresolvedName(name)),
					}
				}
				Ok(())
			},
			_ => Err(Error::InvalidAssignment("a Record/Struct only accepts a mapping or nil")),
		}
	}

	fn parent(&self) -> Option<FieldRef> {
		self.core.parent()
	}
	fn set_parent(&mut self, parent: WeakFieldRef) {
		self.core.set_parent(parent);
	}
	fn bind_self(&mut self, self_ref: WeakFieldRef) {
		self.core.bind_self(self_ref);
	}
	fn self_handle(&self) -> Option<FieldRef> {
		self.core.self_handle()
	}

	fn child_value(&self, name: &str) -> Option<Value> {
		self.find(name).map(|c| c.borrow().snapshot())
	}

	fn children(&self) -> Vec<FieldRef> {
		self.children.iter().filter_map(|(_, c)| c.clone()).collect()
	}
}

/// Looks up a named field on a live Record/Struct instance.
pub fn field(record: &FieldRef, name: &str) -> Option<FieldRef> {
	record.borrow().as_any().downcast_ref::<RecordInstance>().and_then(|r| r.field(name))
}

/// The visible (non-hidden, non-anonymous) field names, in declared order.
pub fn field_names(record: &FieldRef) -> Vec<String> {
	record.borrow().as_any().downcast_ref::<RecordInstance>().map(|r| r.field_names()).unwrap_or_default()
}

/// Whether `name` is a declared field at all, hidden or not.
pub fn has_key(record: &FieldRef, name: &str) -> bool {
	record.borrow().as_any().downcast_ref::<RecordInstance>().map(|r| r.has_key(name)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::composite::array::{ArrayParams, ArrayProto};
	use crate::composite::choice::ChoiceProto;
	use crate::primitives::float::{FloatProto, FloatWidth};
	use crate::primitives::integer::{Endian, IntKind, IntegerParams, IntegerProto};
	use crate::primitives::string::{StringKind, StringProto};
	use std::io::Cursor;
	use std::rc::Rc;

	#[test]
	fn value_dependent_length_round_trips() {
		// scenario 6: [uint8 len, string payload {length: :len}]
		let len_proto: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
		let payload_proto: ProtoRef = Rc::new(StringProto::new(
			StringKind::Fixed { length: Expr::symbol("len"), trim_padding: false, pad_byte: 0 },
			Default::default(),
		));
		let rec = Record::new(
			vec![RecordField::new("len", len_proto), RecordField::new("payload", payload_proto)],
			Default::default(),
		)
		.unwrap();
		let field = rec.instantiate(Value::Null, None).unwrap();

		let mut map = IndexMap::new();
		map.insert("len".to_string(), Value::from(3u64));
		map.insert("payload".to_string(), Value::from("abc"));
		field.borrow_mut().assign(Value::Map(map)).unwrap();

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			field.borrow_mut().write(&mut w).unwrap();
			w.flush().unwrap();
		}
		assert_eq!(out, vec![0x03, b'a', b'b', b'c']);

		let field2 = rec.instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(out.as_slice());
		let mut r = BitReader::new(&mut cursor);
		field2.borrow_mut().read(&mut r).unwrap();
		assert_eq!(field(&field2, "payload").unwrap().borrow().snapshot().as_str(), Some("abc"));
	}

	#[test]
	fn bitpacked_struct_matches_scenario_3() {
		let a: ProtoRef = Rc::new(IntegerProto::new(IntKind::Bits { width: 1, order: crate::bitio::BitOrder::Lsb0, signed: false }, Default::default()));
		let b: ProtoRef = Rc::new(IntegerProto::new(IntKind::Bits { width: 2, order: crate::bitio::BitOrder::Lsb0, signed: false }, Default::default()));
		let c: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
		let d: ProtoRef = Rc::new(IntegerProto::new(IntKind::Bits { width: 1, order: crate::bitio::BitOrder::Lsb0, signed: false }, Default::default()));
		let s = Struct::new(
			vec![RecordField::new("a", a), RecordField::new("b", b), RecordField::new("c", c), RecordField::new("d", d)],
			Default::default(),
		)
		.unwrap();
		let field = s.instantiate(Value::Null, None).unwrap();
		let mut map = IndexMap::new();
		map.insert("a".to_string(), Value::from(1u64));
		map.insert("b".to_string(), Value::from(2u64));
		map.insert("c".to_string(), Value::from(3u64));
		map.insert("d".to_string(), Value::from(1u64));
		field.borrow_mut().assign(Value::Map(map)).unwrap();
		assert_eq!(field.borrow().num_bytes(), 3);

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			field.borrow_mut().write(&mut w).unwrap();
			w.flush().unwrap();
		}
		assert_eq!(out, vec![0x05, 0x03, 0x01]);
	}

	#[test]
	fn mixed_struct_matches_scenario_4() {
		let u16_le = || -> ProtoRef { Rc::new(IntegerProto::new(IntKind::U16(Endian::Little), Default::default())) };
		let u32_le = || -> ProtoRef { Rc::new(IntegerProto::new(IntKind::U32(Endian::Little), Default::default())) };
		let u32_be = || -> ProtoRef { Rc::new(IntegerProto::new(IntKind::U32(Endian::Big), Default::default())) };
		let i8 = || -> ProtoRef { Rc::new(IntegerProto::new(IntKind::I8, Default::default())) };

		let build = || -> Struct {
			let e = Struct::new(vec![RecordField::new("f", u16_le()), RecordField::new("g", u32_be())], Default::default()).unwrap();
			let i = Struct::new(vec![RecordField::new("j", u16_le())], Default::default()).unwrap();
			let h = Struct::new(vec![RecordField::new("i", Rc::new(i))], Default::default()).unwrap();

			let c: ProtoRef = Rc::new(ArrayProto::new(i8(), ArrayParams { initial_length: Some(Expr::constant(2u128)), ..Default::default() }).unwrap());
			let d: ProtoRef = Rc::new(ChoiceProto::new(vec![(Value::from(0u64), u16_le()), (Value::from(1u64), u32_le())], Expr::constant(1u128), Default::default()));

			Struct::new(
				vec![
					RecordField::new("a", u16_le()),
					RecordField::new("b", Rc::new(FloatProto::new(FloatWidth::F32, Endian::Little, Default::default()))),
					RecordField::new("c", c),
					RecordField::new("d", d),
					RecordField::new("e", Rc::new(e)),
					RecordField::new("h", Rc::new(h)),
				],
				Default::default(),
			)
			.unwrap()
		};

		let top = build();
		let field = top.instantiate(Value::Null, None).unwrap();

		let mut e_map = IndexMap::new();
		e_map.insert("f".to_string(), Value::from(6u64));
		e_map.insert("g".to_string(), Value::from(7u64));

		let mut j_map = IndexMap::new();
		j_map.insert("j".to_string(), Value::from(8u64));
		let mut i_map = IndexMap::new();
		i_map.insert("i".to_string(), Value::Map(j_map));

		let mut top_map = IndexMap::new();
		top_map.insert("a".to_string(), Value::from(1u64));
		top_map.insert("b".to_string(), Value::Float(2.0));
		top_map.insert("c".to_string(), Value::Seq(vec![Value::from(3u64), Value::from(4u64)]));
		top_map.insert("d".to_string(), Value::from(5u64));
		top_map.insert("e".to_string(), Value::Map(e_map));
		top_map.insert("h".to_string(), Value::Map(i_map));
		field.borrow_mut().assign(Value::Map(top_map)).unwrap();

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			field.borrow_mut().write(&mut w).unwrap();
			w.flush().unwrap();
		}

		let mut expected = Vec::new();
		expected.extend_from_slice(&1u16.to_le_bytes());
		expected.extend_from_slice(&2.0f32.to_le_bytes());
		expected.push(3);
		expected.push(4);
		expected.extend_from_slice(&5u32.to_le_bytes());
		expected.extend_from_slice(&6u16.to_le_bytes());
		expected.extend_from_slice(&7u32.to_be_bytes());
		expected.extend_from_slice(&8u16.to_le_bytes());
		assert_eq!(out, expected);
		assert_eq!(field.borrow().num_bytes(), expected.len() as u64);

		// Reading the same bytes back reproduces every assigned value.
		let field2 = build().instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(out.as_slice());
		let mut r = BitReader::new(&mut cursor);
		field2.borrow_mut().read(&mut r).unwrap();
		assert_eq!(field2.borrow().snapshot(), field.borrow().snapshot());
	}

	#[test]
	fn hidden_field_addressable_but_excluded_from_snapshot_and_names() {
		let a: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
		let secret: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
		let mut hide = HashSet::new();
		hide.insert("secret".to_string());
		let rec = Record::new(vec![RecordField::new("a", a), RecordField::new("secret", secret)], hide).unwrap();
		let field = rec.instantiate(Value::Null, None).unwrap();

		let mut map = IndexMap::new();
		map.insert("a".to_string(), Value::from(1u64));
		map.insert("secret".to_string(), Value::from(9u64));
		field.borrow_mut().assign(Value::Map(map)).unwrap();

		assert_eq!(field_names(&field), vec!["a".to_string()]);
		assert!(has_key(&field, "secret"));
		assert!(!field_names(&field).contains(&"secret".to_string()));
		match field.borrow().snapshot() {
			Value::Map(m) => assert!(!m.contains_key("secret")),
			_ => panic!("expected a map snapshot"),
		}
		// still directly addressable, and still occupies layout/bytes.
		assert_eq!(field(&field, "secret").unwrap().borrow().snapshot().as_u128(), Some(9));
		assert_eq!(field.borrow().num_bytes(), 2);
	}

	#[test]
	fn anonymous_field_in_struct_excluded_from_names_but_serialized() {
		let a: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
		let padding: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, IntegerParams { value: Some(Expr::constant(0u128)), ..Default::default() }));
		let s = Struct::new(vec![RecordField::new("a", a), RecordField::anonymous(padding)], Default::default()).unwrap();
		let field = s.instantiate(Value::Null, None).unwrap();

		let mut map = IndexMap::new();
		map.insert("a".to_string(), Value::from(5u64));
		field.borrow_mut().assign(Value::Map(map)).unwrap();

		assert_eq!(field_names(&field), vec!["a".to_string()]);
		match field.borrow().snapshot() {
			Value::Map(m) => assert_eq!(m.len(), 1),
			_ => panic!("expected a map snapshot"),
		}

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			field.borrow_mut().write(&mut w).unwrap();
			w.flush().unwrap();
		}
		assert_eq!(out, vec![5, 0]);
	}
}
