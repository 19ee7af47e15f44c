use std::sync::Arc;

use softpv_primitives::{AlarmCode, Direction, ProcessStatus, RecordKind, Severity, Timestamp, Value};

use crate::error::BindingError;
use crate::record::RecordCore;
use crate::slot::{AtomicSlot, ValueSlot};
use crate::store::{RecordHandle, RecordStore, field};
use crate::waveform::WaveformOptions;

/// Construction options for input records.
#[derive(Debug, Clone, Default)]
pub struct InOptions {
	pub initial_value: Option<Value>,
	/// Required for waveform kinds unless derivable from `initial_value`.
	pub waveform: Option<WaveformOptions>,
}

impl InOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
		self.initial_value = Some(value.into());
		self
	}

	pub fn waveform(mut self, options: WaveformOptions) -> Self {
		self.waveform = Some(options);
		self
	}
}

/// Binding for a record whose value the application produces.
///
/// [`InBinding::set`] swaps in a new slot and requests a scan; the store
/// then copies the slot into the record from [`InBinding::on_process`].
#[derive(Debug)]
pub struct InBinding {
	core: RecordCore,
	slot: AtomicSlot,
}

impl InBinding {
	pub(crate) fn new(name: Arc<str>, kind: RecordKind, options: InOptions) -> Result<Self, BindingError> {
		if kind.direction() != Direction::In {
			return Err(BindingError::invalid(&name, format!("{kind} is not an input kind")));
		}
		let waveform = crate::waveform::Waveform::for_kind(&name, kind, options.waveform, options.initial_value.as_ref())?;
		let core = RecordCore::new(name, kind, waveform);
		let value = match options.initial_value {
			Some(value) => core.coerce(value)?,
			None => core.default_value(),
		};
		Ok(Self {
			core,
			slot: AtomicSlot::new(ValueSlot::new(value)),
		})
	}

	pub fn core(&self) -> &RecordCore {
		&self.core
	}

	pub fn name(&self) -> &str {
		self.core.name()
	}

	/// Publishes a new value with no alarm and requests a scan.
	pub fn set(&self, value: impl Into<Value>) -> Result<(), BindingError> {
		self.set_with(value, Severity::NoAlarm, AlarmCode::Udf, None)
	}

	/// Publishes a new value with alarm state and optional timestamp.
	///
	/// Conversion errors are returned before the current value changes.
	pub fn set_with(
		&self,
		value: impl Into<Value>,
		severity: Severity,
		alarm: AlarmCode,
		timestamp: Option<Timestamp>,
	) -> Result<(), BindingError> {
		let value = self.core.coerce(value.into())?;
		self.slot.store(ValueSlot {
			value,
			severity,
			alarm,
			timestamp,
		});
		self.core.trigger_scan();
		Ok(())
	}

	/// Updates only the alarm state and requests a scan.
	pub fn set_alarm(&self, severity: Severity, alarm: AlarmCode, timestamp: Option<Timestamp>) {
		self.slot.update_alarm(severity, alarm, timestamp);
		self.core.trigger_scan();
	}

	/// Most recently published value.
	pub fn get(&self) -> Value {
		self.core.present(self.slot.load().value.clone())
	}

	/// Most recently published slot, in store form.
	pub fn slot(&self) -> Arc<ValueSlot> {
		self.slot.load()
	}

	pub(crate) fn init(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Result<ProcessStatus, BindingError> {
		self.core.bind(store, record)?;
		if let Some(waveform) = self.core.waveform() {
			let current = self.slot.load();
			if let Value::Array(array) = &current.value {
				let value = Value::Array(waveform.prepare(array.clone())?);
				self.slot.store(ValueSlot {
					value,
					..ValueSlot::clone(&current)
				});
			}
		}
		Ok(ProcessStatus::Ok)
	}

	/// Copies the current slot into the record.
	pub fn on_process(&self, store: &dyn RecordStore, record: RecordHandle) -> ProcessStatus {
		match self.write_slot(store, record) {
			Ok(()) => self.core.kind().strategy().status,
			Err(err) => {
				tracing::error!(record = self.name(), error = %err, "binding.in.process_failed");
				ProcessStatus::Error
			}
		}
	}

	fn write_slot(&self, store: &dyn RecordStore, record: RecordHandle) -> Result<(), BindingError> {
		let slot = self.slot.load();
		self.core.write_value(store, record, &slot.value)?;

		let pending = store
			.read_field(record, field::NSEV)
			.ok()
			.and_then(|v| u16::try_from(v).ok())
			.and_then(Severity::from_code)
			.unwrap_or_default();
		if slot.severity > pending {
			store.write_field(record, field::NSEV, Value::Enum(slot.severity.code()))?;
			store.write_field(record, field::NSTA, Value::Enum(slot.alarm.code()))?;
		}
		if let Some(timestamp) = slot.timestamp {
			store.write_time(record, timestamp)?;
		}
		if self.core.kind() == RecordKind::Ai {
			store.write_field(record, field::UDF, Value::Long(i32::from(slot.value.is_nan())))?;
		}
		tracing::trace!(record = self.name(), severity = %slot.severity, "binding.in.process");
		Ok(())
	}
}
