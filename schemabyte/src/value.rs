use indexmap::IndexMap;
use std::fmt::{Debug, Formatter};

/// A plain nested value tree mirroring the live Field tree (spec.md §6,
/// "Snapshot format"). Used both for `snapshot`/`assign` and as the runtime
/// currency the [`crate::eval::LazyEvaluator`] produces and consumes.
#[derive(Clone, PartialEq)]
pub enum Value {
	Null,
	Int(i128),
	UInt(u128),
	Float(f64),
	Bool(bool),
	Bytes(Vec<u8>),
	Str(String),
	Seq(Vec<Value>),
	Map(IndexMap<String, Value>),
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => write!(f, "null"),
			Value::Int(v) => write!(f, "{v}"),
			Value::UInt(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Bytes(v) => write!(f, "{v:02x?}"),
			Value::Str(v) => write!(f, "{v:?}"),
			Value::Seq(v) => f.debug_list().entries(v).finish(),
			Value::Map(v) => f.debug_map().entries(v.iter()).finish(),
		}
	}
}

impl Value {
	pub fn as_i128(&self) -> Option<i128> {
		match self {
			Value::Int(v) => Some(*v),
			Value::UInt(v) => i128::try_from(*v).ok(),
			Value::Bool(v) => Some(*v as i128),
			_ => None,
		}
	}

	pub fn as_u128(&self) -> Option<u128> {
		match self {
			Value::UInt(v) => Some(*v),
			Value::Int(v) => u128::try_from(*v).ok(),
			Value::Bool(v) => Some(*v as u128),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Float(v) => Some(*v),
			Value::Int(v) => Some(*v as f64),
			Value::UInt(v) => Some(*v as f64),
			_ => None,
		}
	}

	pub fn as_usize(&self) -> Option<usize> {
		self.as_u128().and_then(|v| usize::try_from(v).ok())
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Value::Bytes(b) => Some(b),
			Value::Str(s) => Some(s.as_bytes()),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}
}

impl From<i128> for Value {
	fn from(v: i128) -> Self {
		Value::Int(v)
	}
}
impl From<u128> for Value {
	fn from(v: u128) -> Self {
		Value::UInt(v)
	}
}
impl From<u64> for Value {
	fn from(v: u64) -> Self {
		Value::UInt(v as u128)
	}
}
impl From<usize> for Value {
	fn from(v: usize) -> Self {
		Value::UInt(v as u128)
	}
}
impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v as i128)
	}
}
impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}
impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}
impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value::Bytes(v)
	}
}
impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Str(v)
	}
}
impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Str(v.to_string())
	}
}
