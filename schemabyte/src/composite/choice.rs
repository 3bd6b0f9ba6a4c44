//! Choice (spec.md §4.6): a tagged union reselected on every access.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::eval::{evaluate_simple, Expr};
use crate::field::{finish_instantiation, Field, FieldCore, FieldRef, ProtoRef, Prototype, WeakFieldRef};
use crate::value::Value;

#[derive(Clone, Default)]
pub struct ChoiceParams {
	pub initial_value: Option<Expr>,
}

pub struct ChoiceProto {
	choices: Vec<(Value, ProtoRef)>,
	selection: Expr,
	params: ChoiceParams,
}

impl std::fmt::Debug for ChoiceProto {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("ChoiceProto(..)")
	}
}

impl ChoiceProto {
	pub fn new(choices: Vec<(Value, ProtoRef)>, selection: Expr, params: ChoiceParams) -> Self {
		Self { choices, selection, params }
	}
}

impl Prototype for ChoiceProto {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef> {
		let field = ChoiceInstance {
			choices: self.choices.clone(),
			selection: self.selection.clone(),
			current: RefCell::new(None),
			core: Default::default(),
		};
		let rc = finish_instantiation(field, parent);
		if let Some(expr) = &self.params.initial_value {
			let v = evaluate_simple(expr, &rc)?;
			if !v.is_null() {
				rc.borrow_mut().assign(v)?;
			}
		}
		if !initial_value.is_null() {
			rc.borrow_mut().assign(initial_value)?;
		}
		Ok(rc)
	}
}

struct ChoiceInstance {
	choices: Vec<(Value, ProtoRef)>,
	selection: Expr,
	/// Keyed by the selector value that produced it, so a later access can
	/// tell whether the selection has moved on and a fresh child is due.
	current: RefCell<Option<(Value, FieldRef)>>,
	core: FieldCore,
}

impl std::fmt::Debug for ChoiceInstance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.current.borrow().as_ref() {
			Some((key, child)) => write!(f, "Choice({key:?} => {:?})", child.borrow().snapshot()),
			None => f.write_str("Choice(unselected)"),
		}
	}
}

impl ChoiceInstance {
	#[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
	fn reselect(&self) -> Result<FieldRef> {
		let self_handle = self.core.self_handle().expect("choice accessed before instantiation finished");
		let key = evaluate_simple(&self.selection, &self_handle)?;
		{
			let cur = self.current.borrow();
			if let Some((k, child)) = cur.as_ref() {
				if k == &key {
					return Ok(child.clone());
				}
			}
		}
		let proto = self
			.choices
			.iter()
			.find(|(k, _)| k == &key)
			.map(|(_, p)| p.clone())
			.ok_or_else(|| Error::UnresolvedName(format!("no Choice alternative for selector {key:?}")))?;
		let child = proto.instantiate(Value::Null, Some(Rc::downgrade(&self_handle)))?;
		*self.current.borrow_mut() = Some((key, child.clone()));
		Ok(child)
	}
}

impl Field for ChoiceInstance {
	fn read(&mut self, stream: &mut BitReader) -> Result<()> {
		self.reselect()?.borrow_mut().read(stream)
	}

	fn write(&mut self, stream: &mut BitWriter) -> Result<()> {
		self.reselect()?.borrow_mut().write(stream)
	}

	fn num_bytes(&self) -> u64 {
		self.reselect().map(|c| c.borrow().num_bytes()).unwrap_or(0)
	}

	fn clear(&mut self) {
		if let Ok(c) = self.reselect() {
			c.borrow_mut().clear();
		}
	}

	fn is_clear(&self) -> bool {
		self.reselect().map(|c| c.borrow().is_clear()).unwrap_or(true)
	}

	fn snapshot(&self) -> Value {
		self.reselect().map(|c| c.borrow().snapshot()).unwrap_or(Value::Null)
	}

	fn assign(&mut self, value: Value) -> Result<()> {
		self.reselect()?.borrow_mut().assign(value)
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

	fn bit_width(&self) -> Option<u32> {
		self.reselect().ok().and_then(|c| c.borrow().bit_width())
	}
}

/// The currently-selected child, materializing it if the selector has
/// changed since the last access.
pub fn current(choice: &FieldRef) -> Result<FieldRef> {
	choice.borrow().as_any().downcast_ref::<ChoiceInstance>().expect("not a Choice").reselect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::primitives::integer::{Endian, IntKind, IntegerProto};
	use std::io::Cursor;

	#[test]
	fn selection_picks_matching_alternative() {
		let choices = vec![
			(Value::from(1u64), Rc::new(IntegerProto::new(IntKind::U16(Endian::Big), Default::default())) as ProtoRef),
			(Value::from(2u64), Rc::new(IntegerProto::new(IntKind::U32(Endian::Big), Default::default())) as ProtoRef),
		];
		let proto = ChoiceProto::new(choices, Expr::constant(1u128), Default::default());
		let field = proto.instantiate(Value::Null, None).unwrap();
		let mut cursor = Cursor::new(&[0x00u8, 0x07][..]);
		let mut r = BitReader::new(&mut cursor);
		field.borrow_mut().read(&mut r).unwrap();
		assert_eq!(field.borrow().snapshot().as_u128(), Some(7));
		assert_eq!(field.borrow().num_bytes(), 2);
	}
}
