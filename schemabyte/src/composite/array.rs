//! Array (spec.md §4.5): homogeneous repetition under one of three length
//! disciplines.

use std::rc::Rc;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::{evaluate, Binding, Expr};
use crate::field::{finish_instantiation, Field, FieldCore, FieldRef, ProtoRef, Prototype, WeakFieldRef};
use crate::value::Value;
use std::collections::HashMap;

/// The `read_until` predicate shape: either a closure evaluated with
/// `{index, element, array}` bound, or the `:eof` sentinel.
#[derive(Clone)]
pub enum ReadUntil {
	Closure(Expr),
	Eof,
}

#[derive(Clone, Default)]
pub struct ArrayParams {
	pub initial_length: Option<Expr>,
	pub read_until: Option<ReadUntil>,
	pub initial_value: Option<Expr>,
}

/// The length discipline resolved at sanitization time (spec.md §3: the two
/// are mutually exclusive; absent either, `initial_length` defaults to 0).
#[derive(Clone)]
enum Termination {
	Initial(Expr),
	ReadUntil(Expr),
	Eof,
}

pub struct ArrayProto {
	element: ProtoRef,
	termination: Termination,
	initial_value: Option<Expr>,
}

impl std::fmt::Debug for ArrayProto {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("ArrayProto(..)")
	}
}

impl ArrayProto {
	pub fn new(element: ProtoRef, params: ArrayParams) -> Result<Self> {
		if params.initial_length.is_some() && params.read_until.is_some() {
			return Err(Error::MutuallyExclusive);
		}
		let termination = match (params.initial_length, params.read_until) {
			(Some(n), None) => Termination::Initial(n),
			(None, Some(ReadUntil::Closure(expr))) => Termination::ReadUntil(expr),
			(None, Some(ReadUntil::Eof)) => Termination::Eof,
			(None, None) => Termination::Initial(Expr::constant(0u128)),
			(Some(_), Some(_)) => unreachable!("checked above"),
		};
		Ok(Self { element, termination, initial_value: params.initial_value })
	}
}

impl Prototype for ArrayProto {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		let field = ArrayInstance {
			element: self.element.clone(),
			termination: self.termination.clone(),
			initial_value: self.initial_value.clone(),
			children: Vec::new(),
			core: Default::default(),
		};
		let rc = finish_instantiation(field, parent);
		{
			let mut f = rc.borrow_mut();
			let array = f.as_any_mut().downcast_mut::<ArrayInstance>().expect("just constructed");
			array.reset_to_initial();
		}
		if !initial_value.is_null() {
			rc.borrow_mut().assign(initial_value)?;
		}
		Ok(rc)
	}
}

struct ArrayInstance {
	element: ProtoRef,
	termination: Termination,
	initial_value: Option<Expr>,
	children: Vec<FieldRef>,
	core: FieldCore,
}

impl std::fmt::Debug for ArrayInstance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.children.iter().map(|c| c.borrow().snapshot())).finish()
	}
}

impl ArrayInstance {
	fn parent_weak(&self) -> WeakFieldRef {
		Rc::downgrade(&self.core.self_handle().expect("array accessed before instantiation finished"))
	}

	fn new_element(&self, value: Value) -> Result<FieldRef> {
		self.element.instantiate(value, Some(self.parent_weak()))
	}

	/// Repopulates from the prototype default: empty for `read_until`/`eof`
	/// disciplines, `initial_value`-or-nothing otherwise.
	fn reset_to_initial(&mut self) {
		self.children.clear();
		if let Some(expr) = self.initial_value.clone() {
			if let Ok(Value::Seq(items)) = self.eval(&expr) {
				for item in items {
					if let Ok(child) = self.new_element(item) {
						self.children.push(child);
					}
				}
			}
		}
	}

	fn eval(&self, expr: &Expr) -> Result<Value> {
		let start = self.core.self_handle().expect("array accessed before instantiation finished");
		evaluate(expr, &start, &HashMap::new())
	}

	fn eval_predicate(&self, expr: &Expr, index: usize, element: &FieldRef) -> Result<bool> {
		let start = self.core.self_handle().expect("array accessed before instantiation finished");
		let mut overrides = HashMap::new();
		overrides.insert("index".to_string(), Binding::Value(Value::from(index)));
		overrides.insert("element".to_string(), Binding::Field(element.clone()));
		overrides.insert("array".to_string(), Binding::Field(start.clone()));
		let v = evaluate(expr, &start, &overrides)?;
		Ok(matches!(v, Value::Bool(true)) || v.as_u128().map(|n| n != 0).unwrap_or(false))
	}

	/// Auto-extends with default-constructed elements up to (and including)
	/// index `i` (spec.md §3, "Lifecycle").
	fn extend_to(&mut self, i: usize) -> Result<()> {
		while self.children.len() <= i {
			let child = self.new_element(Value::Null)?;
			self.children.push(child);
		}
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.children.len()
	}

	pub fn get(&mut self, i: usize) -> Result<FieldRef> {
		self.extend_to(i)?;
		Ok(self.children[i].clone())
	}

	pub fn at(&self, i: usize) -> Option<FieldRef> {
		self.children.get(i).cloned()
	}

	pub fn push(&mut self, value: Value) -> Result<()> {
		let child = self.new_element(value)?;
		self.children.push(child);
		Ok(())
	}

	pub fn insert(&mut self, i: usize, values: Vec<Value>) -> Result<()> {
		if i > 0 {
			self.extend_to(i - 1)?;
		}
		let mut fresh = Vec::with_capacity(values.len());
		for v in values {
			fresh.push(self.new_element(v)?);
		}
		let at = i.min(self.children.len());
		self.children.splice(at..at, fresh);
		Ok(())
	}
}

impl Field for ArrayInstance {
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self, stream)))]
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		self.children.clear();
		match self.termination.clone() {
			Termination::Initial(expr) => {
				let n = self.eval(&expr)?.as_usize().ok_or(Error::InvalidAssignment("initial_length must be an integer"))?;
				for _ in 0..n {
					let child = self.new_element(Value::Null)?;
					child.borrow_mut().read(stream)?;
					self.children.push(child);
				}
			},
			Termination::ReadUntil(expr) => loop {
				let child = self.new_element(Value::Null)?;
				child.borrow_mut().read(stream)?;
				let index = self.children.len();
				self.children.push(child.clone());
				if self.eval_predicate(&expr, index, &child)? {
					break;
				}
			},
			Termination::Eof => loop {
				let child = self.new_element(Value::Null)?;
				match child.borrow_mut().read(stream) {
					Ok(()) => self.children.push(child),
					Err(e) if e.is_end_of_stream() => break,
					Err(e) => return Err(e),
				}
			},
		}
		Ok(())
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		for child in &self.children {
			child.borrow_mut().write(stream)?;
		}
		Ok(())
	}

	fn num_bytes(&self) -> u64 {
		let mut bytes = 0u64;
		let mut bits_pending = 0u32;
		for child in &self.children {
			let child = child.borrow();
			match child.bit_width() {
				Some(n) => bits_pending += n,
				None => {
					bytes += ((bits_pending as u64) + 7) / 8;
					bits_pending = 0;
					bytes += child.num_bytes();
				},
			}
		}
		bytes + (((bits_pending as u64) + 7) / 8)
	}

	fn clear(&mut self) {
		self.reset_to_initial();
	}

	fn is_clear(&self) -> bool {
		self.children.is_empty()
	}

	fn snapshot(&self) -> Value {
		Value::Seq(self.children.iter().map(|c| c.borrow().snapshot()).collect())
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		match value {
			Value::Null => Ok(()),
			Value::Seq(items) => {
				self.children.clear();
				for item in items {
					self.push(item)?;
				}
				Ok(())
			},
			_ => Err(Error::InvalidAssignment("an Array only accepts a sequence or nil")),
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
		if name == "length" {
			return Some(Value::from(self.children.len()));
		}
		None
	}

	fn children(&self) -> Vec<FieldRef> {
		self.children.clone()
	}
}

/// Reads or auto-extends to `arr[i]` and returns it.
pub fn get(array: &FieldRef, i: usize) -> Result<FieldRef> {
	array.borrow_mut().as_any_mut().downcast_mut::<ArrayInstance>().expect("not an Array").get(i)
}

/// Reads `arr[i]` without extending; `None` if out of range.
pub fn at(array: &FieldRef, i: usize) -> Option<FieldRef> {
	array.borrow().as_any().downcast_ref::<ArrayInstance>().expect("not an Array").at(i)
}

pub fn len(array: &FieldRef) -> usize {
	array.borrow().as_any().downcast_ref::<ArrayInstance>().expect("not an Array").len()
}

pub fn push(array: &FieldRef, value: Value) -> Result<()> {
	array.borrow_mut().as_any_mut().downcast_mut::<ArrayInstance>().expect("not an Array").push(value)
}

pub fn insert(array: &FieldRef, i: usize, values: Vec<Value>) -> Result<()> {
	array.borrow_mut().as_any_mut().downcast_mut::<ArrayInstance>().expect("not an Array").insert(i, values)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::primitives::integer::{IntKind, IntegerProto};
	use std::io::Cursor;

	fn int8() -> ProtoRef {
		Rc::new(IntegerProto::new(IntKind::U8, Default::default()))
	}

	#[test]
	fn initial_length_reads_exactly_n() {
		let proto = ArrayProto::new(int8(), ArrayParams { initial_length: Some(Expr::constant(6u128)), ..Default::default() }).unwrap();
		let field = proto.instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&[3u8, 4, 5, 6, 7, 8, 9][..]);
		let mut r = BitReader::new(&mut cursor);
		field.borrow_mut().read(&mut r).unwrap();
		assert_eq!(field.borrow().snapshot(), Value::Seq(vec![3u128.into(), 4u128.into(), 5u128.into(), 6u128.into(), 7u128.into(), 8u128.into()]));

		let mut out = Vec::new();
		{
			let mut w = BitWriter::new(&mut out);
			field.borrow_mut().write(&mut w).unwrap();
		}
		assert_eq!(out, vec![3, 4, 5, 6, 7, 8]);
	}

	#[test]
	fn read_until_stops_after_predicate_true() {
		let predicate = Expr::closure(|ctx| Ok(Value::Bool(ctx.resolve("element")?.as_u128().unwrap_or(0) >= 6)));
		let proto = ArrayProto::new(int8(), ArrayParams { read_until: Some(ReadUntil::Closure(predicate)), ..Default::default() }).unwrap();
		let field = proto.instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&[3u8, 4, 5, 6, 7, 8, 9][..]);
		let mut r = BitReader::new(&mut cursor);
		field.borrow_mut().read(&mut r).unwrap();
		assert_eq!(field.borrow().snapshot(), Value::Seq(vec![3u128.into(), 4u128.into(), 5u128.into(), 6u128.into()]));
	}

	#[test]
	fn read_until_eof_on_empty_stream_yields_zero_length() {
		let proto = ArrayProto::new(int8(), ArrayParams { read_until: Some(ReadUntil::Eof), ..Default::default() }).unwrap();
		let field = proto.instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&[][..]);
		let mut r = BitReader::new(&mut cursor);
		field.borrow_mut().read(&mut r).unwrap();
		assert_eq!(len(&field), 0);
	}

	#[test]
	fn indexed_write_autoextends_with_defaults() {
		let proto = ArrayProto::new(int8(), ArrayParams { read_until: Some(ReadUntil::Eof), ..Default::default() }).unwrap();
		let field = proto.instantiate(Value::Null, None).unwrap();
		let element = get(&field, 3).unwrap();
		element.borrow_mut().assign(Value::from(9u64)).unwrap();
		assert_eq!(len(&field), 4);
		assert_eq!(at(&field, 0).unwrap().borrow().snapshot().as_u128(), Some(0));
		assert_eq!(at(&field, 3).unwrap().borrow().snapshot().as_u128(), Some(9));
	}
}
