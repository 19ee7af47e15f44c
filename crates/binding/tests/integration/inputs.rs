use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use pretty_assertions::assert_eq;
use softpv_binding::{AlarmCode, InOptions, ProcessStatus, RecordKind, Severity, Timestamp, Value, field};

use crate::common::{load, session};

#[test]
fn set_scans_and_writes_value_alarm_and_time() {
	let session = session();
	let ai = session.in_record("TEMP", RecordKind::Ai, InOptions::new()).unwrap();
	let store = load(&session);
	assert!(store.is_io_intr("TEMP").unwrap());

	let stamp = Timestamp::new(1_700_000_000, 5);
	ai.set_with(21.5, Severity::Major, AlarmCode::HiHi, Some(stamp)).unwrap();

	assert_eq!(store.scan_count("TEMP").unwrap(), 1);
	assert_eq!(store.value("TEMP").unwrap(), Value::Double(21.5));
	assert_eq!(store.alarm("TEMP").unwrap(), (Severity::Major, AlarmCode::HiHi));
	assert_eq!(store.timestamp("TEMP").unwrap(), Some(stamp));
	assert_eq!(store.field("TEMP", field::UDF).unwrap(), Value::Long(0));
	assert_eq!(store.last_status("TEMP").unwrap(), Some(ProcessStatus::NoConvert));
	session.teardown();
}

#[test]
fn plain_set_clears_alarm_and_stamps_on_process() {
	let session = session();
	let li = session.in_record("COUNT", RecordKind::LongIn, InOptions::new()).unwrap();
	let store = load(&session);

	li.set_with(1, Severity::Minor, AlarmCode::High, None).unwrap();
	assert_eq!(store.alarm("COUNT").unwrap(), (Severity::Minor, AlarmCode::High));

	li.set(2).unwrap();
	assert_eq!(store.value("COUNT").unwrap(), Value::Long(2));
	assert_eq!(store.alarm("COUNT").unwrap(), (Severity::NoAlarm, AlarmCode::NoAlarm));
	assert!(store.timestamp("COUNT").unwrap().is_some());
	assert_eq!(store.last_status("COUNT").unwrap(), Some(ProcessStatus::Ok));
	session.teardown();
}

#[test]
fn nan_marks_analog_input_undefined() {
	let session = session();
	let ai = session.in_record("NAN", RecordKind::Ai, InOptions::new().initial_value(1.0)).unwrap();
	let store = load(&session);

	ai.set(f64::NAN).unwrap();
	assert_eq!(store.field("NAN", field::UDF).unwrap(), Value::Long(1));
	ai.set(3.0).unwrap();
	assert_eq!(store.field("NAN", field::UDF).unwrap(), Value::Long(0));
	session.teardown();
}

#[test]
fn alarm_only_update_rescans_with_the_same_value() {
	let session = session();
	let bi = session.in_record("LINK", RecordKind::Bi, InOptions::new().initial_value(true)).unwrap();
	let store = load(&session);

	bi.set_alarm(Severity::Invalid, AlarmCode::Comm, None);
	assert_eq!(store.value("LINK").unwrap(), Value::Enum(1));
	assert_eq!(store.alarm("LINK").unwrap(), (Severity::Invalid, AlarmCode::Comm));
	assert_eq!(bi.get(), Value::Enum(1));
	session.teardown();
}

#[test]
fn oversized_string_is_rejected_before_anything_changes() {
	let session = session();
	let si = session.in_record("MSG", RecordKind::StringIn, InOptions::new().initial_value("ready")).unwrap();
	let store = load(&session);
	si.set("ready").unwrap();

	assert!(si.set("z".repeat(40)).is_err());
	assert_eq!(si.get(), Value::from("ready"));
	assert_eq!(store.scan_count("MSG").unwrap(), 1);
	session.teardown();
}

#[test]
fn readers_never_observe_a_torn_slot() {
	let session = session();
	let li = session.in_record("TORN", RecordKind::LongIn, InOptions::new()).unwrap();
	let stop = Arc::new(AtomicBool::new(false));

	let writer = {
		let li = Arc::clone(&li);
		let stop = Arc::clone(&stop);
		thread::spawn(move || {
			let mut v = 0;
			while !stop.load(Ordering::Relaxed) {
				v += 1;
				let severity = if v % 2 == 0 { Severity::NoAlarm } else { Severity::Minor };
				li.set_with(v, severity, AlarmCode::NoAlarm, None).unwrap();
			}
		})
	};

	let readers: Vec<_> = (0..4)
		.map(|_| {
			let li = Arc::clone(&li);
			thread::spawn(move || {
				for _ in 0..10_000 {
					let slot = li.slot();
					let Value::Long(v) = slot.value else {
						panic!("unexpected value {:?}", slot.value);
					};
					let expected = if v % 2 == 0 { Severity::NoAlarm } else { Severity::Minor };
					assert_eq!(slot.severity, expected, "value {v}");
				}
			})
		})
		.collect();

	for reader in readers {
		reader.join().unwrap();
	}
	stop.store(true, Ordering::Relaxed);
	writer.join().unwrap();
	session.teardown();
}
