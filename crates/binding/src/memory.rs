//! In-process record store.
//!
//! Records live in memory and are processed synchronously on the calling
//! thread: a scan request or a put processes the affected records before
//! returning. Alarm state is committed at the end of every processing
//! cycle, and a record that was not given a timestamp during processing is
//! stamped with the current time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use softpv_primitives::value::MAX_STRING_LEN;
use softpv_primitives::{AlarmCode, Array, ElementType, MarshalError, ProcessStatus, RecordKind, Severity, Timestamp, Value};

use crate::error::StoreError;
use crate::store::{BindingId, CompletionToken, DeviceSupport, InterruptHandle, RecordHandle, RecordSpec, RecordStore, field};

struct MemRecord {
	name: String,
	kind: RecordKind,
	io_intr: bool,
	fields: FxHashMap<&'static str, Value>,
	/// Waveform buffer; `None` for scalar kinds.
	elements: Option<Array>,
	time: Option<Timestamp>,
	stamped: bool,
	busy: Option<CompletionToken>,
	/// Set while a processing pass runs.
	processing: bool,
	reprocess: bool,
	dpvt: Option<BindingId>,
	scans: usize,
	processed: usize,
	last_status: Option<ProcessStatus>,
}

impl MemRecord {
	fn new(spec: &RecordSpec) -> Self {
		let mut fields = FxHashMap::default();
		fields.insert(field::NAME, Value::String(spec.name.clone()));
		fields.insert(field::NSEV, Value::Enum(Severity::NoAlarm.code()));
		fields.insert(field::NSTA, Value::Enum(AlarmCode::NoAlarm.code()));
		fields.insert(field::SEVR, Value::Enum(Severity::Invalid.code()));
		fields.insert(field::STAT, Value::Enum(AlarmCode::Udf.code()));
		fields.insert(field::UDF, Value::Long(1));

		let elements = match spec.waveform {
			Some((element_type, capacity)) => {
				fields.insert(field::NELM, Value::Long(i32::try_from(capacity).unwrap_or(i32::MAX)));
				fields.insert(field::NORD, Value::Long(0));
				fields.insert(field::FTVL, Value::Enum(element_type.code()));
				Some(Array::empty(element_type))
			}
			None => {
				let initial = spec.kind.default_value(ElementType::Double);
				if spec.kind.strategy().has_mlst {
					fields.insert(field::MLST, initial.clone());
				}
				fields.insert(field::VAL, initial);
				None
			}
		};

		Self {
			name: spec.name.clone(),
			kind: spec.kind,
			io_intr: spec.io_intr,
			fields,
			elements,
			time: None,
			stamped: false,
			busy: None,
			processing: false,
			reprocess: false,
			dpvt: None,
			scans: 0,
			processed: 0,
			last_status: None,
		}
	}

	fn element_type(&self) -> ElementType {
		self.fields
			.get(field::FTVL)
			.and_then(|v| u16::try_from(v.clone()).ok())
			.and_then(ElementType::from_code)
			.unwrap_or(ElementType::UChar)
	}

	fn nelm(&self) -> usize {
		self.fields
			.get(field::NELM)
			.and_then(|v| i32::try_from(v.clone()).ok())
			.and_then(|n| usize::try_from(n).ok())
			.unwrap_or(0)
	}

	fn nord(&self) -> usize {
		self.fields
			.get(field::NORD)
			.and_then(|v| i32::try_from(v.clone()).ok())
			.and_then(|n| usize::try_from(n).ok())
			.unwrap_or(0)
	}

	fn store_elements(&mut self, array: &Array) {
		let array = array.clone().narrow().cast(self.element_type()).truncated(self.nelm());
		self.elements = Some(array);
	}

	/// Writes the value an external client put, as the record would store it.
	fn put_value(&mut self, value: Value) -> Result<(), StoreError> {
		if self.elements.is_some() {
			let array = match value {
				Value::String(s) => Array::from_str_nul(&s),
				other => Array::try_from(other).map_err(|source| self.field_error(field::VAL, source))?,
			};
			self.store_elements(&array);
			let nord = self.elements.as_ref().map_or(0, Array::len);
			self.fields.insert(field::NORD, Value::Long(i32::try_from(nord).unwrap_or(i32::MAX)));
			return Ok(());
		}
		self.write(field::VAL, value)
	}

	fn write(&mut self, name: &str, value: Value) -> Result<(), StoreError> {
		let Some((&key, existing)) = self.fields.get_key_value(name) else {
			return Err(StoreError::UnknownField {
				record: self.name.clone(),
				field: name.to_string(),
			});
		};
		let value = conform(existing, value).map_err(|source| self.field_error(name, source))?;
		self.fields.insert(key, value);
		Ok(())
	}

	fn field_error(&self, name: &str, source: MarshalError) -> StoreError {
		StoreError::FieldType {
			record: self.name.clone(),
			field: name.to_string(),
			source,
		}
	}
}

/// Converts `value` to the type of the field it replaces.
fn conform(existing: &Value, value: Value) -> Result<Value, MarshalError> {
	Ok(match existing {
		Value::Double(_) => Value::Double(f64::try_from(value)?),
		Value::Long(_) => Value::Long(i32::try_from(value)?),
		Value::Enum(_) => Value::Enum(u16::try_from(value)?),
		Value::String(_) => {
			let mut s = String::try_from(value)?;
			if s.len() > MAX_STRING_LEN {
				let mut end = MAX_STRING_LEN;
				while !s.is_char_boundary(end) {
					end -= 1;
				}
				s.truncate(end);
			}
			Value::String(s)
		}
		Value::Array(_) => Value::Array(Array::try_from(value)?),
	})
}

/// Record store keeping every record in memory.
pub struct MemoryStore {
	this: Weak<MemoryStore>,
	records: RwLock<Vec<Arc<Mutex<MemRecord>>>>,
	by_name: RwLock<FxHashMap<String, RecordHandle>>,
	supports: RwLock<FxHashMap<&'static str, Arc<dyn DeviceSupport>>>,
	interrupts: Mutex<Vec<Vec<RecordHandle>>>,
	next_token: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryStore")
			.field("records", &self.records.read().len())
			.field("supports", &self.supports.read().len())
			.field("interrupts", &self.interrupts.lock().len())
			.finish()
	}
}

impl MemoryStore {
	pub fn new() -> Arc<Self> {
		Arc::new_cyclic(|this| Self {
			this: this.clone(),
			records: RwLock::new(Vec::new()),
			by_name: RwLock::new(FxHashMap::default()),
			supports: RwLock::new(FxHashMap::default()),
			interrupts: Mutex::new(Vec::new()),
			next_token: AtomicU64::new(1),
		})
	}

	fn shared(&self) -> Result<Arc<dyn RecordStore>, StoreError> {
		let this = self.this.upgrade().ok_or_else(|| StoreError::Detached("memory store".to_string()))?;
		Ok(this)
	}

	fn record(&self, handle: RecordHandle) -> Result<Arc<Mutex<MemRecord>>, StoreError> {
		let records = self.records.read();
		usize::try_from(handle.raw())
			.ok()
			.and_then(|index| records.get(index))
			.cloned()
			.ok_or_else(|| StoreError::UnknownRecord(handle.to_string()))
	}

	pub fn handle(&self, name: &str) -> Result<RecordHandle, StoreError> {
		self.by_name
			.read()
			.get(name)
			.copied()
			.ok_or_else(|| StoreError::UnknownRecord(name.to_string()))
	}

	fn support(&self, device_name: &str) -> Result<Arc<dyn DeviceSupport>, StoreError> {
		self.supports
			.read()
			.get(device_name)
			.cloned()
			.ok_or_else(|| StoreError::NoSupport(device_name.to_string()))
	}

	fn create(&self, spec: &RecordSpec) -> Result<RecordHandle, StoreError> {
		let mut by_name = self.by_name.write();
		if by_name.contains_key(&spec.name) {
			return Err(StoreError::DuplicateRecord(spec.name.clone()));
		}
		let mut records = self.records.write();
		let handle = RecordHandle::new(records.len() as u64);
		records.push(Arc::new(Mutex::new(MemRecord::new(spec))));
		by_name.insert(spec.name.clone(), handle);
		Ok(handle)
	}

	/// Creates records and initializes them through their device supports.
	///
	/// Each support's `init` runs once before any of its records is
	/// initialized. Records scanned on I/O interrupt are then attached to
	/// the interrupt source their binding provides.
	pub fn load(&self, specs: impl IntoIterator<Item = RecordSpec>) -> Result<Vec<RecordHandle>, StoreError> {
		let store = self.shared()?;
		let specs: Vec<RecordSpec> = specs.into_iter().collect();
		let handles = specs.iter().map(|spec| self.create(spec)).collect::<Result<Vec<_>, _>>()?;

		let mut initialized = FxHashSet::default();
		for spec in &specs {
			let device = spec.device_name();
			if initialized.insert(device) {
				self.support(device)?.init(&store).map_err(|err| StoreError::Init {
					record: spec.name.clone(),
					message: err.to_string(),
				})?;
			}
		}

		for (spec, &handle) in specs.iter().zip(&handles) {
			let support = self.support(spec.device_name())?;
			support.init_record(&store, handle).map_err(|err| StoreError::Init {
				record: spec.name.clone(),
				message: err.to_string(),
			})?;
			if spec.io_intr {
				if let Some(interrupt) = support.io_interrupt(&store, handle) {
					self.subscribe(interrupt, handle);
				}
			}
		}
		tracing::debug!(records = handles.len(), "store.load");
		Ok(handles)
	}

	fn subscribe(&self, interrupt: InterruptHandle, record: RecordHandle) {
		let mut interrupts = self.interrupts.lock();
		if let Some(subscribers) = usize::try_from(interrupt.raw()).ok().and_then(|i| interrupts.get_mut(i)) {
			subscribers.push(record);
		}
	}

	/// Runs one processing cycle of `record` on the calling thread.
	///
	/// Only one pass runs per record at a time. A request arriving while a
	/// pass is running, or while the record is busy, is folded into a single
	/// reprocess that runs once the record is free again.
	pub fn process(&self, record: RecordHandle) -> Result<ProcessStatus, StoreError> {
		let store = self.shared()?;
		let rec = self.record(record)?;
		let device = {
			let mut guard = rec.lock();
			if guard.busy.is_some() || guard.processing {
				guard.reprocess = true;
				tracing::trace!(record = %guard.name, "store.process.deferred");
				return Ok(ProcessStatus::Ok);
			}
			guard.processing = true;
			guard.kind.device_name()
		};
		let support = match self.support(device) {
			Ok(support) => support,
			Err(err) => {
				rec.lock().processing = false;
				return Err(err);
			}
		};

		loop {
			rec.lock().stamped = false;
			let status = support.process(&store, record);
			{
				let mut guard = rec.lock();
				guard.processed += 1;
				guard.last_status = Some(status);
				if !guard.stamped {
					guard.time = Some(Timestamp::now());
				}
			}
			let reset = self.reset_alarms(record);

			let mut guard = rec.lock();
			let again = reset.is_ok() && guard.busy.is_none() && std::mem::take(&mut guard.reprocess);
			if !again {
				guard.processing = false;
				drop(guard);
				reset?;
				return Ok(status);
			}
			tracing::trace!(record = %guard.name, "store.process.again");
		}
	}

	// Inspection helpers, keyed by record name.

	/// Current value: `VAL` for scalars, the first `NORD` elements for waveforms.
	pub fn value(&self, name: &str) -> Result<Value, StoreError> {
		let rec = self.record(self.handle(name)?)?;
		let guard = rec.lock();
		match &guard.elements {
			Some(elements) => Ok(Value::Array(elements.clone().truncated(guard.nord()))),
			None => guard.fields.get(field::VAL).cloned().ok_or_else(|| StoreError::UnknownField {
				record: guard.name.clone(),
				field: field::VAL.to_string(),
			}),
		}
	}

	pub fn field(&self, name: &str, field_name: &str) -> Result<Value, StoreError> {
		self.read_field(self.handle(name)?, field_name)
	}

	/// Committed alarm state.
	pub fn alarm(&self, name: &str) -> Result<(Severity, AlarmCode), StoreError> {
		let rec = self.record(self.handle(name)?)?;
		let guard = rec.lock();
		let code = |f: &str| guard.fields.get(f).and_then(|v| u16::try_from(v.clone()).ok()).unwrap_or(0);
		Ok((
			Severity::from_code(code(field::SEVR)).unwrap_or_default(),
			AlarmCode::from_code(code(field::STAT)).unwrap_or_default(),
		))
	}

	pub fn timestamp(&self, name: &str) -> Result<Option<Timestamp>, StoreError> {
		Ok(self.record(self.handle(name)?)?.lock().time)
	}

	pub fn is_busy(&self, name: &str) -> Result<bool, StoreError> {
		Ok(self.record(self.handle(name)?)?.lock().busy.is_some())
	}

	pub fn process_count(&self, name: &str) -> Result<usize, StoreError> {
		Ok(self.record(self.handle(name)?)?.lock().processed)
	}

	pub fn scan_count(&self, name: &str) -> Result<usize, StoreError> {
		Ok(self.record(self.handle(name)?)?.lock().scans)
	}

	pub fn last_status(&self, name: &str) -> Result<Option<ProcessStatus>, StoreError> {
		Ok(self.record(self.handle(name)?)?.lock().last_status)
	}

	pub fn is_io_intr(&self, name: &str) -> Result<bool, StoreError> {
		Ok(self.record(self.handle(name)?)?.lock().io_intr)
	}

	/// Number of interrupt sources handed out so far.
	pub fn interrupt_count(&self) -> usize {
		self.interrupts.lock().len()
	}
}

impl RecordStore for MemoryStore {
	fn read_field(&self, record: RecordHandle, field_name: &str) -> Result<Value, StoreError> {
		let rec = self.record(record)?;
		let guard = rec.lock();
		if field_name == field::TIME {
			return Ok(Value::Double(guard.time.map_or(0.0, |t| t.as_secs_f64())));
		}
		if field_name == field::VAL {
			if let Some(elements) = &guard.elements {
				return Ok(Value::Array(elements.clone().truncated(guard.nord())));
			}
		}
		guard.fields.get(field_name).cloned().ok_or_else(|| StoreError::UnknownField {
			record: guard.name.clone(),
			field: field_name.to_string(),
		})
	}

	fn write_field(&self, record: RecordHandle, field_name: &str, value: Value) -> Result<(), StoreError> {
		let rec = self.record(record)?;
		let mut guard = rec.lock();
		if field_name == field::VAL {
			return guard.put_value(value);
		}
		guard.write(field_name, value)
	}

	fn read_elements(&self, record: RecordHandle, count: usize) -> Result<Array, StoreError> {
		let rec = self.record(record)?;
		let guard = rec.lock();
		match &guard.elements {
			Some(elements) => Ok(elements.clone().truncated(count)),
			None => Err(StoreError::UnknownField {
				record: guard.name.clone(),
				field: "BPTR".to_string(),
			}),
		}
	}

	fn write_elements(&self, record: RecordHandle, array: &Array) -> Result<(), StoreError> {
		let rec = self.record(record)?;
		let mut guard = rec.lock();
		if guard.elements.is_none() {
			return Err(StoreError::UnknownField {
				record: guard.name.clone(),
				field: "BPTR".to_string(),
			});
		}
		guard.store_elements(array);
		Ok(())
	}

	fn write_time(&self, record: RecordHandle, timestamp: Timestamp) -> Result<(), StoreError> {
		let rec = self.record(record)?;
		let mut guard = rec.lock();
		guard.time = Some(timestamp);
		guard.stamped = true;
		Ok(())
	}

	fn reset_alarms(&self, record: RecordHandle) -> Result<(), StoreError> {
		let rec = self.record(record)?;
		let mut guard = rec.lock();
		let nsev = guard.fields.get(field::NSEV).cloned().unwrap_or(Value::Enum(0));
		let nsta = guard.fields.get(field::NSTA).cloned().unwrap_or(Value::Enum(0));
		guard.fields.insert(field::SEVR, nsev);
		guard.fields.insert(field::STAT, nsta);
		guard.fields.insert(field::NSEV, Value::Enum(Severity::NoAlarm.code()));
		guard.fields.insert(field::NSTA, Value::Enum(AlarmCode::NoAlarm.code()));
		Ok(())
	}

	fn init_interrupt(&self) -> InterruptHandle {
		let mut interrupts = self.interrupts.lock();
		interrupts.push(Vec::new());
		InterruptHandle::new((interrupts.len() - 1) as u64)
	}

	fn request_scan(&self, handle: InterruptHandle) {
		let subscribers = {
			let interrupts = self.interrupts.lock();
			usize::try_from(handle.raw())
				.ok()
				.and_then(|i| interrupts.get(i))
				.cloned()
				.unwrap_or_default()
		};
		for record in subscribers {
			if let Ok(rec) = self.record(record) {
				rec.lock().scans += 1;
			}
			if let Err(err) = self.process(record) {
				tracing::error!(handle = %record, error = %err, "store.scan.failed");
			}
		}
	}

	fn mark_busy(&self, record: RecordHandle) -> Result<CompletionToken, StoreError> {
		let rec = self.record(record)?;
		let mut guard = rec.lock();
		if guard.busy.is_some() {
			return Err(StoreError::Busy(guard.name.clone()));
		}
		let token = CompletionToken::new(self.next_token.fetch_add(1, Ordering::Relaxed));
		guard.busy = Some(token);
		Ok(token)
	}

	fn release(&self, record: RecordHandle, token: CompletionToken) {
		let Ok(rec) = self.record(record) else {
			tracing::warn!(handle = %record, "store.release.unknown_record");
			return;
		};
		let reprocess = {
			let mut guard = rec.lock();
			if guard.busy != Some(token) {
				tracing::warn!(record = %guard.name, %token, "store.release.stale_token");
				return;
			}
			guard.busy = None;
			std::mem::take(&mut guard.reprocess)
		};
		if reprocess {
			if let Err(err) = self.process(record) {
				tracing::error!(handle = %record, error = %err, "store.reprocess.failed");
			}
		}
	}

	fn put_field(&self, name: &str, value: Value) -> Result<(), StoreError> {
		let record = self.handle(name)?;
		self.record(record)?.lock().put_value(value)?;
		self.process(record)?;
		Ok(())
	}

	fn attach(&self, record: RecordHandle, binding: BindingId) -> Result<(), StoreError> {
		self.record(record)?.lock().dpvt = Some(binding);
		Ok(())
	}

	fn attached(&self, record: RecordHandle) -> Option<BindingId> {
		self.record(record).ok()?.lock().dpvt
	}

	fn register_support(&self, device_name: &'static str, support: Arc<dyn DeviceSupport>) -> Result<(), StoreError> {
		if self.supports.write().insert(device_name, support).is_some() {
			tracing::debug!(device = device_name, "store.support.replaced");
		}
		Ok(())
	}
}
