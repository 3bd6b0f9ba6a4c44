//! Internal schema nodes that own children and drive ordered parsing
//! (spec.md §4.4-§4.6).

pub mod array;
pub mod choice;
pub mod record;

pub use array::{ArrayParams, ArrayProto, ReadUntil};
pub use choice::{ChoiceParams, ChoiceProto};
pub use record::{Record, RecordField, Struct};
