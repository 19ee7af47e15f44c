//! State shared by every binding: identity, store link and scan trigger.

use std::sync::{Arc, OnceLock, Weak};

use softpv_primitives::{Array, ElementType, RecordKind, Value};

use crate::error::{BindingError, StoreError};
use crate::scan::ScanTrigger;
use crate::store::{InterruptHandle, RecordHandle, RecordStore};
use crate::waveform::Waveform;

struct StoreLink {
	store: Weak<dyn RecordStore>,
	record: RecordHandle,
}

/// Name, kind and store link of one binding.
///
/// The link is set exactly once, by the store's record initialization.
pub struct RecordCore {
	name: Arc<str>,
	kind: RecordKind,
	scan: ScanTrigger,
	link: OnceLock<StoreLink>,
	waveform: Option<Waveform>,
}

impl std::fmt::Debug for RecordCore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RecordCore")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("record", &self.record())
			.field("waveform", &self.waveform)
			.finish()
	}
}

impl RecordCore {
	pub(crate) fn new(name: Arc<str>, kind: RecordKind, waveform: Option<Waveform>) -> Self {
		Self {
			name,
			kind,
			scan: ScanTrigger::new(),
			link: OnceLock::new(),
			waveform,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn shared_name(&self) -> Arc<str> {
		Arc::clone(&self.name)
	}

	pub fn kind(&self) -> RecordKind {
		self.kind
	}

	pub fn waveform(&self) -> Option<&Waveform> {
		self.waveform.as_ref()
	}

	pub fn is_bound(&self) -> bool {
		self.link.get().is_some()
	}

	/// Store handle of the bound record.
	pub fn record(&self) -> Option<RecordHandle> {
		self.link.get().map(|link| link.record)
	}

	/// Links the binding to its record. Fails if already linked.
	pub(crate) fn bind(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Result<(), BindingError> {
		let link = StoreLink {
			store: Arc::downgrade(store),
			record,
		};
		if self.link.set(link).is_err() {
			return Err(BindingError::AlreadyBound(self.name.to_string()));
		}
		if let Some(waveform) = &self.waveform {
			waveform.resolve(&self.name, store.as_ref(), record);
		}
		tracing::debug!(record = %self.name, kind = %self.kind, handle = %record, "binding.bind");
		Ok(())
	}

	/// Returns the live store and record, or why there is none.
	pub(crate) fn linked(&self) -> Result<(Arc<dyn RecordStore>, RecordHandle), StoreError> {
		let link = self.link.get().ok_or_else(|| StoreError::Unbound(self.name.to_string()))?;
		let store = link.store.upgrade().ok_or_else(|| StoreError::Detached(self.name.to_string()))?;
		Ok((store, link.record))
	}

	/// Requests a scan of the record. No-op until bound.
	pub fn trigger_scan(&self) {
		match self.linked() {
			Ok((store, _)) => self.scan.trigger(store.as_ref()),
			Err(err) => tracing::trace!(record = %self.name, %err, "binding.scan.skipped"),
		}
	}

	pub(crate) fn interrupt(&self, store: &dyn RecordStore) -> InterruptHandle {
		self.scan.handle(store)
	}

	/// Whether an interrupt source has been created for this record yet.
	pub fn has_interrupt(&self) -> bool {
		self.scan.is_initialized()
	}

	/// Reads an auxiliary field of the bound record.
	pub fn get_field(&self, field: &str) -> Result<Value, StoreError> {
		let (store, record) = self.linked()?;
		store.read_field(record, field)
	}

	/// Writes an auxiliary field of the bound record.
	pub fn set_field(&self, field: &str, value: impl Into<Value>) -> Result<(), StoreError> {
		let (store, record) = self.linked()?;
		store.write_field(record, field, value.into())
	}

	/// Converts an application value to the form stored in the record.
	pub(crate) fn coerce(&self, value: Value) -> Result<Value, BindingError> {
		let value = (self.kind.strategy().coerce_in)(value)?;
		match (&self.waveform, value) {
			(Some(waveform), Value::Array(array)) => Ok(Value::Array(waveform.prepare(array)?)),
			(_, value) => Ok(value),
		}
	}

	/// Converts a stored value to the form handed to application code.
	pub(crate) fn present(&self, value: Value) -> Value {
		(self.kind.strategy().coerce_out)(value)
	}

	/// Value the record holds before anything was written to it.
	pub(crate) fn default_value(&self) -> Value {
		match &self.waveform {
			Some(waveform) => match self.kind.default_value(waveform.element_type()) {
				Value::Array(array) => Value::Array(array.cast(waveform.element_type())),
				other => other,
			},
			None => self.kind.default_value(ElementType::Double),
		}
	}

	pub(crate) fn read_value(&self, store: &dyn RecordStore, record: RecordHandle) -> Result<Value, BindingError> {
		match &self.waveform {
			Some(waveform) => Ok(Value::Array(waveform.read(store, record)?)),
			None => Ok(store.read_field(record, self.kind.strategy().native_field)?),
		}
	}

	pub(crate) fn write_value(&self, store: &dyn RecordStore, record: RecordHandle, value: &Value) -> Result<(), BindingError> {
		match (&self.waveform, value) {
			(Some(waveform), Value::Array(array)) => waveform.write(store, record, array.clone()),
			(Some(waveform), other) => {
				let array = Array::try_from(self.coerce(other.clone())?)?;
				waveform.write(store, record, array)
			}
			(None, value) => Ok(store.write_field(record, self.kind.strategy().native_field, value.clone())?),
		}
	}
}
