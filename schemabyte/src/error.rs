use crate::value::Value;

/// The crate-wide error type. Covers the seven schema/runtime error kinds
/// plus the underlying I/O failure that backs `ShortRead`/`ShortWrite`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("unregistered type: {0}")]
	UnregisteredType(String),

	#[error("name collision on `{0}`: {1}")]
	NameCollision(String, &'static str),

	#[error("`initial_length` and `read_until` are mutually exclusive")]
	MutuallyExclusive,

	#[error("check_value failed: expected {expected:?}, got {actual:?}")]
	ValidityError { expected: Value, actual: Value },

	#[error("short read: needed {needed} bytes, stream had {available}")]
	ShortRead { needed: u64, available: u64 },

	#[error("short write: sink rejected {attempted} bytes")]
	ShortWrite { attempted: u64 },

	#[error("unresolved name `{0}`")]
	UnresolvedName(String),

	#[error("invalid assignment: {0}")]
	InvalidAssignment(&'static str),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// True for the two kinds `Array`'s `read_until = :eof` loop is allowed
	/// to swallow as a normal end-of-loop condition (see DESIGN.md).
	pub fn is_end_of_stream(&self) -> bool {
		matches!(
			self,
			Error::ShortRead { .. } | Error::Io(_)
		)
	}
}
