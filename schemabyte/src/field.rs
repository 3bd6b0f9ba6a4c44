//! The Field contract (spec.md §3-4.3): the abstract node every primitive
//! and composite implements, plus the prototype→instance lifecycle.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::bitio::{BitReader, BitWriter};
use crate::error::Result;
use crate::eval::Expr;
use crate::value::Value;

/// A live Field, shared by reference and mutated through `RefCell`. Never
/// cloned structurally — a schema instance owns exactly one `Rc` per node
/// from its parent's perspective; extra `Rc`s exist only as the transient
/// `self_handle`/parent-fixup plumbing below.
pub type FieldRef = Rc<RefCell<dyn Field>>;

/// A non-owning back-reference. Never traversed for ownership decisions;
/// see spec.md §3 "Ownership".
pub type WeakFieldRef = Weak<RefCell<dyn Field>>;

/// Names a Record/Struct field may not use, because they shadow an
/// operation the contract itself exposes (spec.md §3, §6).
pub const RESERVED_NAMES: &[&str] = &[
	"read", "write", "num_bytes", "clear", "snapshot", "assign", "parent", "field_names", "has_key",
];

/// The uniform contract shared by every schema node.
pub trait Field: std::fmt::Debug + 'static {
	fn read(&mut self, stream: &mut BitReader) -> Result<()>;
	fn write(&mut self, stream: &mut BitWriter) -> Result<()>;

	/// Size in whole bytes, rounding bit-packed runs up at each
	/// byte-aligned boundary (spec.md §4.4).
	fn num_bytes(&self) -> u64;

	/// Resets to the prototype's default value.
	fn clear(&mut self);

	/// Whether the current value equals the prototype default.
	fn is_clear(&self) -> bool;

	/// The raw value tree (spec.md §6, "Snapshot format").
	fn snapshot(&self) -> Value;

	/// Restores state from a snapshot/mapping/scalar. Fails with
	/// `Error::InvalidAssignment` for a computed (`value`-bearing) field or
	/// a type-incompatible tree.
	fn assign(&mut self, value: Value) -> Result<()>;

	/// The enclosing field, or `None` at the root.
	fn parent(&self) -> Option<FieldRef>;
	fn set_parent(&mut self, parent: WeakFieldRef);

	/// Binds this field's own `Rc` handle once it exists, so later
	/// parameter evaluation can hand the LazyEvaluator a starting point.
	fn bind_self(&mut self, self_ref: WeakFieldRef);
	fn self_handle(&self) -> Option<FieldRef>;

	/// Looks up a declared parameter expression by name (tier 2 of LazyEvaluator resolution).
	fn param(&self, _name: &str) -> Option<Expr> {
		None
	}

	/// Looks up a visible child's current value by name (tier 3, "methods" —
	/// the child-accessor half of it; composites override this).
	fn child_value(&self, _name: &str) -> Option<Value> {
		None
	}

	/// This field's direct children, for internal tree-maintenance use
	/// (e.g. fixing up parent back-references right after construction).
	/// Leaves return nothing.
	fn children(&self) -> Vec<FieldRef> {
		Vec::new()
	}

	/// `Some(n)` for a primitive occupying `n` bits where `n % 8 != 0` —
	/// i.e. a field that draws from the BitStream's bit buffer rather than
	/// always starting/ending at a byte boundary. `None` for everything
	/// else (byte-aligned primitives, composites).
	fn bit_width(&self) -> Option<u32> {
		None
	}

	/// Downcasting escape hatch for named-accessor lookups (`rec.field("foo")`,
	/// `choice.current()`) that need the concrete type behind a `dyn Field`.
	fn as_any(&self) -> &dyn std::any::Any {
		self
	}

	/// Mutable counterpart of [`Field::as_any`], for operations (`arr[i] = v`,
	/// `insert`) that need to reach the concrete composite's own storage.
	fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
		self
	}
}

/// Fields embed this for the parent/self back-reference bookkeeping common
/// to every kind, instead of re-deriving it per primitive/composite. The
/// back-references are excluded from `Debug` (a weak parent pointer upgraded
/// during formatting would otherwise walk back up the tree).
#[derive(Default, derivative::Derivative)]
#[derivative(Debug)]
pub struct FieldCore {
	#[derivative(Debug = "ignore")]
	parent: Option<WeakFieldRef>,
	#[derivative(Debug = "ignore")]
	self_ref: Option<WeakFieldRef>,
}

impl FieldCore {
	pub fn parent(&self) -> Option<FieldRef> {
		self.parent.as_ref().and_then(Weak::upgrade)
	}

	pub fn set_parent(&mut self, parent: WeakFieldRef) {
		self.parent = Some(parent);
	}

	pub fn bind_self(&mut self, self_ref: WeakFieldRef) {
		self.self_ref = Some(self_ref);
	}

	pub fn self_handle(&self) -> Option<FieldRef> {
		self.self_ref.as_ref().and_then(Weak::upgrade)
	}
}

/// An immutable schema node that knows how to manufacture live Field
/// instances (spec.md §3, "Prototype vs instance").
pub trait Prototype: std::fmt::Debug {
	fn instantiate(&self, initial_value: Value, parent: Option<WeakFieldRef>) -> Result<FieldRef>;
}

pub type ProtoRef = Rc<dyn Prototype>;

/// Wraps a freshly-built concrete Field in its `Rc<RefCell<_>>`, binds its
/// self-handle, sets its parent if one was supplied, and fixes up the
/// parent back-reference on every child it was constructed with. Every
/// `Prototype::instantiate` impl funnels through this so the
/// two-phase "children first, then wrap, then fix up" dance lives in one
/// place.
pub fn finish_instantiation<T: Field + 'static>(field: T, parent: Option<WeakFieldRef>) -> FieldRef {
	let rc: FieldRef = Rc::new(RefCell::new(field));
	rc.borrow_mut().bind_self(Rc::downgrade(&rc));
	if let Some(p) = parent {
		rc.borrow_mut().set_parent(p);
	}
	let weak_self = Rc::downgrade(&rc);
	for child in rc.borrow().children() {
		child.borrow_mut().set_parent(weak_self.clone());
	}
	rc
}

/// Reads a whole schema from a byte slice, starting the top-level call and
/// owning the BitStream for its duration (spec.md §5).
#[cfg_attr(feature = "tracing", tracing::instrument(skip(field, data), fields(len = data.len())))]
pub fn read_bytes(field: &FieldRef, data: &[u8]) -> Result<()> {
	let mut cursor = std::io::Cursor::new(data);
	let mut reader = BitReader::new(&mut cursor);
	field.borrow_mut().read(&mut reader)
}

/// Serializes a whole schema to a fresh `Vec<u8>`.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(field)))]
pub fn write_to_vec(field: &FieldRef) -> Result<Vec<u8>> {
	let mut out = Vec::new();
	{
		let mut writer = BitWriter::new(&mut out);
		field.borrow_mut().write(&mut writer)?;
		writer.flush()?;
	}
	Ok(out)
}
