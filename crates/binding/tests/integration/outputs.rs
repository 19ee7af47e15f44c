use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use softpv_binding::{AlarmCode, OutOptions, ProcessStatus, RecordKind, RecordStore, Severity, Value, field};
use softpv_worker::Backend;

use crate::common::{WAIT, channel, load, session, session_on};

fn counter() -> (Arc<AtomicUsize>, impl Fn(Value) -> anyhow::Result<()> + Send + Sync + 'static) {
	let count = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&count);
	(count, move |_: Value| -> anyhow::Result<()> {
		seen.fetch_add(1, Ordering::SeqCst);
		Ok(())
	})
}

#[test]
fn repeated_writes_of_the_committed_value_do_not_notify() {
	let session = session();
	let (count, on_update) = counter();
	let x = session
		.out_record("X", RecordKind::LongOut, OutOptions::new().initial_value(5).on_update(on_update))
		.unwrap();
	let store = load(&session);
	assert_eq!(x.get(), Value::Long(5));
	assert_eq!(store.value("X").unwrap(), Value::Long(5));

	store.put_field("X", Value::Long(5)).unwrap();
	store.put_field("X", Value::Long(10)).unwrap();
	store.put_field("X", Value::Long(10)).unwrap();
	session.teardown();

	assert_eq!(count.load(Ordering::SeqCst), 1);
	assert_eq!(x.get(), Value::Long(10));
	assert_eq!(store.process_count("X").unwrap(), 3);
}

#[test]
fn always_update_notifies_every_write() {
	let session = session();
	let (count, on_update) = counter();
	session
		.out_record(
			"ALWAYS",
			RecordKind::Ao,
			OutOptions::new().initial_value(1.0).always_update(true).on_update(on_update),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("ALWAYS", Value::Double(1.0)).unwrap();
	store.put_field("ALWAYS", Value::Double(1.0)).unwrap();
	session.teardown();

	assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn rejected_write_restores_previous_value() {
	let session = session();
	let (count, on_update) = counter();
	let out = session
		.out_record(
			"GUARDED",
			RecordKind::LongOut,
			OutOptions::new()
				.initial_value(5)
				.validate(|_, value| value != &Value::Long(7))
				.on_update(on_update),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("GUARDED", Value::Long(7)).unwrap();
	assert_eq!(store.last_status("GUARDED").unwrap(), Some(ProcessStatus::Error));
	assert_eq!(out.get(), Value::Long(5));
	assert_eq!(store.value("GUARDED").unwrap(), Value::Long(5));

	out.set(6).unwrap();
	session.teardown();
	assert_eq!(out.get(), Value::Long(6));
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn always_rejecting_validator_keeps_initial_value() {
	let session = session();
	let (count, on_update) = counter();
	let out = session
		.out_record(
			"LOCKED",
			RecordKind::LongOut,
			OutOptions::new().initial_value(5).validate(|_, _| false).on_update(on_update),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("LOCKED", Value::Long(10)).unwrap();
	out.set(10).unwrap();
	session.teardown();

	assert_eq!(out.get(), Value::Long(5));
	assert_eq!(store.value("LOCKED").unwrap(), Value::Long(5));
	assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn validator_sees_the_binding_and_the_presented_value() {
	let session = session();
	let (tx, rx) = channel();
	session
		.out_record(
			"CHECKED",
			RecordKind::StringOut,
			OutOptions::new().validate(move |binding, value| {
				let _ = tx.lock().send((binding.name().to_string(), value.clone()));
				true
			}),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("CHECKED", Value::from("hi")).unwrap();
	assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("CHECKED".to_string(), Value::from("hi")));
	session.teardown();
}

#[test]
fn panicking_validator_rejects_the_write() {
	let session = session();
	let out = session
		.out_record(
			"PANICKY",
			RecordKind::LongOut,
			OutOptions::new().initial_value(1).validate(|_, _| panic!("validator exploded")),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("PANICKY", Value::Long(2)).unwrap();
	assert_eq!(store.last_status("PANICKY").unwrap(), Some(ProcessStatus::Error));
	assert_eq!(out.get(), Value::Long(1));
	assert_eq!(store.value("PANICKY").unwrap(), Value::Long(1));
	session.teardown();
}

#[test]
fn set_without_processing_commits_silently() {
	let session = session();
	let (count, on_update) = counter();
	let out = session
		.out_record(
			"QUIET",
			RecordKind::LongOut,
			OutOptions::new().validate(|_, _| false).on_update(on_update),
		)
		.unwrap();
	let store = load(&session);

	out.set_with_process(3, false).unwrap();
	session.teardown();

	assert_eq!(out.get(), Value::Long(3));
	assert_eq!(store.value("QUIET").unwrap(), Value::Long(3));
	assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn named_handler_receives_record_name() {
	let session = session();
	let (tx, rx) = channel();
	session
		.out_record(
			"NAMED",
			RecordKind::Bo,
			OutOptions::new().on_update_name(move |value, name| {
				tx.lock().send((name.to_string(), value))?;
				Ok(())
			}),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("NAMED", Value::Enum(1)).unwrap();
	assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("NAMED".to_string(), Value::Enum(1)));
	session.teardown();
}

#[test]
fn async_handler_runs_on_the_event_loop() {
	let session = session();
	let (tx, rx) = channel();
	session
		.out_record(
			"ASYNC",
			RecordKind::Ao,
			OutOptions::new().on_update_async(move |value| {
				let tx = Arc::clone(&tx);
				async move {
					tokio::task::yield_now().await;
					tx.lock().send(value)?;
					Ok(())
				}
			}),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("ASYNC", Value::Double(2.5)).unwrap();
	assert_eq!(rx.recv_timeout(WAIT).unwrap(), Value::Double(2.5));
	session.teardown();
}

#[test]
fn handler_may_write_another_record() {
	let session = session();
	let (tx, rx) = channel();
	let sink = session
		.out_record(
			"SINK",
			RecordKind::LongOut,
			OutOptions::new().on_update(move |value| {
				tx.lock().send(value)?;
				Ok(())
			}),
		)
		.unwrap();
	let forward = Arc::clone(&sink);
	session
		.out_record(
			"SOURCE",
			RecordKind::LongOut,
			OutOptions::new().on_update(move |value| {
				let v = i32::try_from(value)?;
				forward.set(v * 2)?;
				Ok(())
			}),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("SOURCE", Value::Long(21)).unwrap();
	assert_eq!(rx.recv_timeout(WAIT).unwrap(), Value::Long(42));
	assert_eq!(sink.get(), Value::Long(42));
	assert_eq!(store.value("SINK").unwrap(), Value::Long(42));
	session.teardown();
}

#[test]
fn blocking_record_stays_busy_until_handler_returns() {
	let session = session();
	let (seen_tx, seen_rx) = channel();
	let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
	let gate_rx = parking_lot::Mutex::new(gate_rx);
	let out = session
		.out_record(
			"SLOW",
			RecordKind::LongOut,
			OutOptions::new().blocking(true).on_update(move |value| {
				seen_tx.lock().send(value)?;
				gate_rx.lock().recv_timeout(WAIT)?;
				Ok(())
			}),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("SLOW", Value::Long(1)).unwrap();
	assert_eq!(seen_rx.recv_timeout(WAIT).unwrap(), Value::Long(1));
	assert!(store.is_busy("SLOW").unwrap());

	// Held until the record is released.
	store.put_field("SLOW", Value::Long(2)).unwrap();
	assert_eq!(out.get(), Value::Long(1));
	assert_eq!(store.value("SLOW").unwrap(), Value::Long(2));

	gate_tx.send(()).unwrap();
	assert_eq!(seen_rx.recv_timeout(WAIT).unwrap(), Value::Long(2));
	assert_eq!(out.get(), Value::Long(2));
	assert!(store.is_busy("SLOW").unwrap());

	gate_tx.send(()).unwrap();
	session.teardown();
	assert!(!store.is_busy("SLOW").unwrap());
}

#[test]
fn concurrent_puts_of_one_value_notify_once() {
	let session = session();
	let (count, on_update) = counter();
	let out = session
		.out_record(
			"RACED",
			RecordKind::LongOut,
			OutOptions::new()
				.initial_value(5)
				.validate(|_, _| {
					std::thread::sleep(std::time::Duration::from_millis(50));
					true
				})
				.on_update(on_update),
		)
		.unwrap();
	let store = load(&session);

	std::thread::scope(|scope| {
		for _ in 0..2 {
			scope.spawn(|| store.put_field("RACED", Value::Long(10)).unwrap());
		}
	});
	session.teardown();

	assert_eq!(out.get(), Value::Long(10));
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_puts_to_a_blocking_record_are_serialized() {
	let session = session();
	let (seen_tx, seen_rx) = channel();
	let out = session
		.out_record(
			"SERIAL",
			RecordKind::LongOut,
			OutOptions::new().blocking(true).on_update(move |value| {
				std::thread::sleep(std::time::Duration::from_millis(20));
				seen_tx.lock().send(value)?;
				Ok(())
			}),
		)
		.unwrap();
	let store = load(&session);

	std::thread::scope(|scope| {
		scope.spawn(|| store.put_field("SERIAL", Value::Long(1)).unwrap());
		scope.spawn(|| store.put_field("SERIAL", Value::Long(2)).unwrap());
	});
	let last = store.value("SERIAL").unwrap();
	let mut seen = Vec::new();
	while seen.last() != Some(&last) {
		seen.push(seen_rx.recv_timeout(WAIT).unwrap());
	}
	session.teardown();

	assert!(seen.len() <= 2, "{seen:?}");
	assert!(!store.is_busy("SERIAL").unwrap());
	assert_eq!(out.get(), last);
}

#[test]
fn failing_blocking_handlers_still_release() {
	let session = session();
	session
		.out_record(
			"FAILS",
			RecordKind::LongOut,
			OutOptions::new().blocking(true).on_update(|_| anyhow::bail!("device offline")),
		)
		.unwrap();
	session
		.out_record(
			"PANICS",
			RecordKind::LongOut,
			OutOptions::new().blocking(true).on_update(|_| panic!("handler exploded")),
		)
		.unwrap();
	let store = load(&session);

	store.put_field("FAILS", Value::Long(1)).unwrap();
	store.put_field("PANICS", Value::Long(1)).unwrap();
	session.teardown();

	assert!(!store.is_busy("FAILS").unwrap());
	assert!(!store.is_busy("PANICS").unwrap());
}

#[test]
fn thread_pool_releases_every_blocking_record() {
	let session = session_on(Backend::ThreadPool);
	let (count, on_update) = counter();
	let on_update = Arc::new(on_update);
	let names: Vec<String> = (0..8).map(|i| format!("POOL:{i}")).collect();
	for name in &names {
		let on_update = Arc::clone(&on_update);
		session
			.out_record(
				name.as_str(),
				RecordKind::Ao,
				OutOptions::new().blocking(true).on_update(move |v| (*on_update)(v)),
			)
			.unwrap();
	}
	let store = load(&session);

	for name in &names {
		store.put_field(name, Value::Double(1.0)).unwrap();
	}
	session.teardown();

	assert_eq!(count.load(Ordering::SeqCst), names.len());
	for name in &names {
		assert!(!store.is_busy(name).unwrap(), "{name} still busy");
	}
}

#[test]
fn coroutine_backend_notifies_in_write_order() {
	let session = session_on(Backend::Coroutine);
	let (tx, rx) = channel();
	session
		.out_record(
			"ORDERED",
			RecordKind::LongOut,
			OutOptions::new().on_update(move |value| {
				tx.lock().send(value)?;
				Ok(())
			}),
		)
		.unwrap();
	let store = load(&session);

	for v in 1..=5 {
		store.put_field("ORDERED", Value::Long(v)).unwrap();
	}
	session.teardown();

	let seen: Vec<Value> = rx.try_iter().collect();
	assert_eq!(seen, (1..=5).map(Value::Long).collect::<Vec<_>>());
}

#[test]
fn initialization_clears_the_undefined_alarm_only_with_a_value() {
	let session = session();
	session
		.out_record("SET", RecordKind::Ao, OutOptions::new().initial_value(2.0))
		.unwrap();
	session.out_record("UNSET", RecordKind::Ao, OutOptions::new()).unwrap();
	let store = load(&session);

	assert_eq!(store.alarm("SET").unwrap(), (Severity::NoAlarm, AlarmCode::NoAlarm));
	assert_eq!(store.field("SET", field::UDF).unwrap(), Value::Long(0));
	assert_eq!(store.field("SET", field::MLST).unwrap(), Value::Double(2.0));
	assert!(store.timestamp("SET").unwrap().is_some());

	assert_eq!(store.alarm("UNSET").unwrap(), (Severity::Invalid, AlarmCode::Udf));
	assert_eq!(store.field("UNSET", field::UDF).unwrap(), Value::Long(1));
	session.teardown();
}

#[test]
fn value_set_before_load_is_written_at_initialization() {
	let session = session();
	let out = session.out_record("EARLY", RecordKind::LongOut, OutOptions::new()).unwrap();
	out.set(9).unwrap();
	let store = load(&session);

	assert_eq!(store.value("EARLY").unwrap(), Value::Long(9));
	assert_eq!(out.get(), Value::Long(9));
	session.teardown();
}

#[test]
fn writes_after_teardown_still_commit() {
	let session = session();
	let (count, on_update) = counter();
	let out = session
		.out_record("LATE", RecordKind::LongOut, OutOptions::new().on_update(on_update))
		.unwrap();
	let store = load(&session);
	session.teardown();

	out.set(4).unwrap();
	assert_eq!(out.get(), Value::Long(4));
	assert_eq!(store.value("LATE").unwrap(), Value::Long(4));
	assert_eq!(count.load(Ordering::SeqCst), 0);
}
