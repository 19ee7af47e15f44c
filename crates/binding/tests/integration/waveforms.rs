use pretty_assertions::assert_eq;
use softpv_binding::{
	Array, BindingError, DEFAULT_LONG_STRING_CAPACITY, ElementType, InOptions, OutOptions, RecordKind, RecordStore, Value,
	WaveformOptions, field,
};

use crate::common::{load, load_specs, session};

#[test]
fn long_string_capacity_follows_initial_value() {
	let session = session();
	let ls = session
		.out_record("BANNER", RecordKind::LongStringOut, OutOptions::new().initial_value("hello"))
		.unwrap();
	let store = load(&session);

	assert_eq!(store.value("BANNER").unwrap(), Value::Array(Array::UChar(b"hello\0".to_vec())));
	assert_eq!(ls.get(), Value::from("hello"));

	assert_eq!(ls.set("toolong"), Err(BindingError::Capacity { len: 8, capacity: 6 }));
	assert_eq!(ls.get(), Value::from("hello"));

	ls.set("hi").unwrap();
	assert_eq!(ls.get(), Value::from("hi"));
	assert_eq!(store.field("BANNER", field::NORD).unwrap(), Value::Long(3));
	session.teardown();
}

#[test]
fn long_string_input_defaults_to_fixed_capacity() {
	let session = session();
	let ls = session.in_record("LOG", RecordKind::LongStringIn, InOptions::new()).unwrap();
	let store = load(&session);

	let long = "x".repeat(DEFAULT_LONG_STRING_CAPACITY + 44);
	assert_eq!(
		ls.set(long.as_str()),
		Err(BindingError::Capacity {
			len: long.len() + 1,
			capacity: DEFAULT_LONG_STRING_CAPACITY,
		})
	);
	let fits = "y".repeat(100);
	ls.set(fits.as_str()).unwrap();
	assert_eq!(ls.get(), Value::from(fits));
	assert_eq!(store.field("LOG", field::NORD).unwrap(), Value::Long(101));
	session.teardown();
}

#[test]
fn element_type_comes_from_the_record() {
	let session = session();
	let wf = session
		.out_record(
			"TRACE",
			RecordKind::WaveformOut,
			OutOptions::new().waveform(WaveformOptions::new(ElementType::Float, 4)),
		)
		.unwrap();
	let mut specs = session.database();
	assert_eq!(specs[0].waveform, Some((ElementType::Float, 4)));
	specs[0].waveform = Some((ElementType::Double, 4));
	let store = load_specs(&session, specs);

	assert_eq!(wf.core().waveform().unwrap().element_type(), ElementType::Double);
	wf.set(vec![1i32, 2]).unwrap();
	assert_eq!(store.value("TRACE").unwrap(), Value::Array(Array::Double(vec![1.0, 2.0])));
	assert_eq!(wf.get(), Value::Array(Array::Double(vec![1.0, 2.0])));
	session.teardown();
}

#[test]
fn input_waveform_publishes_partial_arrays() {
	let session = session();
	let wf = session
		.in_record("SAMPLES", RecordKind::WaveformIn, InOptions::new().initial_value(vec![1i16, 2, 3]))
		.unwrap();
	let store = load(&session);

	wf.set(vec![4i16, 5]).unwrap();
	assert_eq!(store.value("SAMPLES").unwrap(), Value::Array(Array::Short(vec![4, 5])));
	assert_eq!(store.field("SAMPLES", field::NORD).unwrap(), Value::Long(2));

	assert_eq!(wf.set(vec![0i16; 4]), Err(BindingError::Capacity { len: 4, capacity: 3 }));
	assert_eq!(wf.get(), Value::Array(Array::Short(vec![4, 5])));
	assert_eq!(store.scan_count("SAMPLES").unwrap(), 1);
	session.teardown();
}

#[test]
fn external_puts_are_clipped_to_the_record_allocation() {
	let session = session();
	let wf = session
		.out_record("CLIP", RecordKind::WaveformOut, OutOptions::new().initial_value(vec![0i32; 3]))
		.unwrap();
	let store = load(&session);

	store.put_field("CLIP", Value::from(vec![1i32, 2, 3, 4])).unwrap();
	assert_eq!(wf.get(), Value::Array(Array::Long(vec![1, 2, 3])));
	session.teardown();
}

#[test]
fn sixty_four_bit_arrays_narrow_on_the_way_in() {
	let session = session();
	let wf = session
		.out_record(
			"WIDE",
			RecordKind::WaveformOut,
			OutOptions::new().waveform(WaveformOptions::new(ElementType::Long, 2)),
		)
		.unwrap();
	let store = load(&session);

	wf.set(vec![7i64, 8]).unwrap();
	assert_eq!(store.value("WIDE").unwrap(), Value::Array(Array::Long(vec![7, 8])));
	session.teardown();
}
