use std::sync::Arc;

use pretty_assertions::assert_eq;
use softpv_binding::{
	BindingError, InOptions, MemoryStore, OutOptions, Phase, ProcessStatus, RecordKind, RecordSpec, RecordStore, StoreError, Value,
};
use softpv_worker::{Backend, Dispatcher, DispatcherConfig};

use crate::common::{load, load_specs, session};

#[test]
fn names_are_unique_and_frozen_after_load() {
	let session = session();
	session.in_record("A", RecordKind::Ai, InOptions::new()).unwrap();
	assert_eq!(
		session.out_record("A", RecordKind::Ao, OutOptions::new()).unwrap_err(),
		BindingError::DuplicateName("A".to_string())
	);
	assert_eq!(session.phase(), Phase::Building);

	let _store = load(&session);
	assert_eq!(session.phase(), Phase::Loaded);
	assert_eq!(
		session.in_record("B", RecordKind::Ai, InOptions::new()).unwrap_err(),
		BindingError::Frozen("B".to_string())
	);
	session.teardown();
}

#[test]
fn database_lists_records_in_creation_order() {
	let session = session();
	session.in_record("IN", RecordKind::LongIn, InOptions::new()).unwrap();
	session.out_record("OUT", RecordKind::MbbOut, OutOptions::new()).unwrap();
	session
		.in_record("TEXT", RecordKind::LongStringIn, InOptions::new().initial_value("abc"))
		.unwrap();

	let specs = session.database();
	let summary: Vec<_> = specs
		.iter()
		.map(|spec| (spec.name.as_str(), spec.record_type(), spec.device_name(), spec.io_intr))
		.collect();
	assert_eq!(
		summary,
		vec![
			("IN", "longin", "devPython_longin", true),
			("OUT", "mbbo", "devPython_mbbo", false),
			("TEXT", "waveform", "devPython_long_stringin", true),
		]
	);
	assert_eq!(specs[2].waveform, Some((softpv_binding::ElementType::UChar, 4)));

	let names: Vec<_> = session.records().iter().map(|b| b.name().to_string()).collect();
	assert_eq!(names, ["IN", "OUT", "TEXT"]);
	assert!(session.lookup("OUT").and_then(|b| b.as_out().cloned()).is_some());
	assert!(session.lookup("IN").and_then(|b| b.as_out().cloned()).is_none());
	assert!(session.lookup("MISSING").is_none());
	session.teardown();
}

#[test]
fn only_interrupt_scanned_records_get_an_interrupt_source() {
	let session = session();
	let input = session.in_record("SCANNED", RecordKind::Ai, InOptions::new()).unwrap();
	let output = session.out_record("PASSIVE", RecordKind::Ao, OutOptions::new()).unwrap();
	let store = load(&session);

	assert!(input.core().has_interrupt());
	assert!(!output.core().has_interrupt());
	assert_eq!(store.interrupt_count(), 1);

	input.set(1.0).unwrap();
	input.set(2.0).unwrap();
	output.set(3.0).unwrap();
	assert_eq!(store.interrupt_count(), 1);
	assert!(!output.core().has_interrupt());
	session.teardown();
}

#[test]
fn records_without_a_binding_fail_to_load_and_process_as_errors() {
	let session = session();
	session.in_record("REAL", RecordKind::Ai, InOptions::new()).unwrap();
	let store = MemoryStore::new();
	let shared: Arc<dyn RecordStore> = store.clone();
	session.install(&shared).unwrap();

	let ghost = RecordSpec {
		name: "GHOST".to_string(),
		kind: RecordKind::Ai,
		waveform: None,
		io_intr: false,
	};
	let err = store.load([ghost]).unwrap_err();
	assert!(matches!(err, StoreError::Init { ref record, .. } if record == "GHOST"), "{err}");

	let handle = store.handle("GHOST").unwrap();
	assert_eq!(store.process(handle).unwrap(), ProcessStatus::Error);
	assert_eq!(store.last_status("GHOST").unwrap(), Some(ProcessStatus::Error));
	session.teardown();
}

#[test]
fn record_kind_must_match_binding() {
	let session = session();
	session.out_record("MIXED", RecordKind::LongOut, OutOptions::new()).unwrap();
	let mut specs = session.database();
	specs[0].kind = RecordKind::Ao;

	let store = MemoryStore::new();
	let shared: Arc<dyn RecordStore> = store.clone();
	session.install(&shared).unwrap();
	assert!(matches!(store.load(specs), Err(StoreError::Init { .. })));
	session.teardown();
}

#[test]
fn a_binding_attaches_to_one_record_only() {
	let session = session();
	let out = session
		.out_record("ONCE", RecordKind::LongOut, OutOptions::new().initial_value(1))
		.unwrap();
	let first = load(&session);

	let second = MemoryStore::new();
	let shared: Arc<dyn RecordStore> = second.clone();
	session.install(&shared).unwrap();
	let err = second.load(session.database()).unwrap_err();
	assert!(matches!(err, StoreError::Init { ref message, .. } if message.contains("already bound")), "{err}");

	out.set(2).unwrap();
	assert_eq!(first.value("ONCE").unwrap(), Value::Long(2));
	session.teardown();
}

#[test]
fn fields_are_reachable_through_the_binding() {
	let session = session();
	let out = session.out_record("FIELDS", RecordKind::Ao, OutOptions::new()).unwrap();
	assert_eq!(out.core().get_field("UDF"), Err(StoreError::Unbound("FIELDS".to_string())));

	let store = load(&session);
	out.core().set_field("MLST", 4.0).unwrap();
	assert_eq!(store.field("FIELDS", "MLST").unwrap(), Value::Double(4.0));
	assert_eq!(out.core().get_field("NAME").unwrap(), Value::from("FIELDS"));
	session.teardown();
}

#[test]
fn dropped_store_detaches_bindings() {
	let session = session();
	let out = session.out_record("ORPHAN", RecordKind::LongOut, OutOptions::new()).unwrap();
	let store = load_specs(&session, session.database());
	drop(store);

	assert!(matches!(out.set(1), Err(BindingError::Store(StoreError::Detached(_)))));
	session.teardown();
}

#[test]
fn teardown_is_idempotent() {
	let session = session();
	session.teardown();
	session.teardown();
	assert_eq!(session.phase(), Phase::TornDown);
	assert!(matches!(
		session.in_record("AFTER", RecordKind::Ai, InOptions::new()),
		Err(BindingError::Frozen(_))
	));
}

#[test]
fn session_builds_from_toml_config() {
	let config = DispatcherConfig::from_toml(
		r#"
		backend = "coroutine"
		thread_name = "cfg-worker"
		"#,
	)
	.unwrap();
	assert_eq!(config.backend, Backend::Coroutine);

	let session = softpv_binding::BindingSession::from_config(&config).unwrap();
	assert_eq!(session.dispatcher().backend(), Backend::Coroutine);
	session.teardown();
}
