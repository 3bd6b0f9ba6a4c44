use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;
use std::time::SystemTime;

use memory_stats::memory_stats;
use tracing_flame::FlameLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use schemabyte::composite::{ArrayParams, ArrayProto, Record, RecordField};
use schemabyte::eval::Expr;
use schemabyte::field::{read_bytes, write_to_vec, Field, ProtoRef, Prototype};
use schemabyte::primitives::integer::{Endian, IntKind, IntegerProto};
use schemabyte::primitives::string::{StringKind, StringProto};
use schemabyte::value::Value;

fn setup_global_subscriber() -> impl Drop {
	let file = File::create("./trace.folded").unwrap();
	let flame_layer = FlameLayer::new(BufWriter::new(file)).with_file_and_line(false);
	let guard = flame_layer.flush_on_drop();

	let subscriber = Registry::default().with(flame_layer);

	tracing::subscriber::set_global_default(subscriber).expect("Could not set global default");
	guard
}

/// A small length-prefixed-record-array schema, representative of the kind
/// of repeated binary packet this crate is meant to parse: a `uint16` count
/// followed by that many `{uint8 id, string name}` records.
fn packet_schema() -> Record {
	let id: ProtoRef = Rc::new(IntegerProto::new(IntKind::U8, Default::default()));
	let name: ProtoRef = Rc::new(StringProto::new(
		StringKind::Fixed { length: Expr::constant(8u128), trim_padding: true, pad_byte: 0 },
		Default::default(),
	));
	let entry: ProtoRef = Rc::new(Record::new(vec![RecordField::new("id", id), RecordField::new("name", name)], Default::default()).unwrap());

	let count: ProtoRef = Rc::new(IntegerProto::new(IntKind::U16(Endian::Little), Default::default()));
	let entries: ProtoRef = Rc::new(
		ArrayProto::new(entry, ArrayParams { initial_length: Some(Expr::symbol("count")), ..Default::default() }).unwrap(),
	);

	Record::new(vec![RecordField::new("count", count), RecordField::new("entries", entries)], Default::default()).unwrap()
}

fn sample_bytes(n: u16) -> Vec<u8> {
	let schema = packet_schema();
	let field = schema.instantiate(Value::Null, None).unwrap();

	let mut map = indexmap::IndexMap::new();
	map.insert("count".to_string(), Value::from(n as u64));
	map.insert(
		"entries".to_string(),
		Value::Seq(
			(0..n)
				.map(|i| {
					let mut m = indexmap::IndexMap::new();
					m.insert("id".to_string(), Value::from(i as u64 % 256));
					m.insert("name".to_string(), Value::Bytes(format!("item{i}").into_bytes()));
					Value::Map(m)
				})
				.collect(),
		),
	);
	field.borrow_mut().assign(Value::Map(map)).unwrap();
	write_to_vec(&field).unwrap()
}

fn main() {
	let _guard = setup_global_subscriber();

	let mut start = SystemTime::now();
	let schema = packet_schema();

	println! {
		"Schema construction time: {:?}, RAM: {}MB",
		start.elapsed().unwrap(),
		memory_stats().unwrap().virtual_mem as f32 / 1000000.0,
	}

	let bytes = sample_bytes(4096);

	start = SystemTime::now();
	let field = schema.instantiate(Value::Null, None).unwrap();
	read_bytes(&field, &bytes).unwrap();

	println! {
		"Read time: {:?}, RAM: {}MB, parsed bytes: {}",
		start.elapsed().unwrap(),
		memory_stats().unwrap().virtual_mem as f32 / 1000000.0,
		field.borrow().num_bytes(),
	}
}
