//! Fixed-capacity array marshaling for waveform kinds.
//!
//! A waveform binding has a configured element type and a capacity fixed at
//! construction. The element type actually used is re-read from the record's
//! `FTVL` when the binding is attached. Every value is normalized to an
//! array, cast to that element type and checked against the capacity before
//! the store is touched.

use std::sync::OnceLock;

use softpv_primitives::{Array, ElementType, RecordKind, Value, ValueType};

use crate::error::{BindingError, StoreError};
use crate::store::{RecordHandle, RecordStore, field};

/// Capacity of a long-string record created without a length or initial value.
pub const DEFAULT_LONG_STRING_CAPACITY: usize = 256;

/// Element type and maximum element count of a waveform record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformOptions {
	pub element_type: ElementType,
	pub capacity: usize,
}

impl WaveformOptions {
	pub fn new(element_type: ElementType, capacity: usize) -> Self {
		Self { element_type, capacity }
	}
}

#[derive(Debug)]
pub struct Waveform {
	configured: ElementType,
	resolved: OnceLock<ElementType>,
	capacity: usize,
}

impl Waveform {
	pub fn new(name: &str, options: WaveformOptions) -> Result<Self, BindingError> {
		if options.capacity == 0 {
			return Err(BindingError::invalid(name, "waveform capacity must be at least one element"));
		}
		if !options.element_type.is_numeric() {
			return Err(BindingError::invalid(
				name,
				format!("unsupported waveform element type {}", options.element_type),
			));
		}
		Ok(Self {
			configured: options.element_type,
			resolved: OnceLock::new(),
			capacity: options.capacity,
		})
	}

	/// Builds the waveform for `kind`, deriving missing options from the
	/// initial value. Returns `None` for scalar kinds.
	pub(crate) fn for_kind(
		name: &str,
		kind: RecordKind,
		options: Option<WaveformOptions>,
		initial: Option<&Value>,
	) -> Result<Option<Self>, BindingError> {
		let value_type = kind.strategy().value_type;
		let options = match (value_type, options) {
			(ValueType::Array, Some(options)) => options,
			(ValueType::LongString, Some(options)) if options.element_type == ElementType::UChar => options,
			(ValueType::LongString, Some(options)) => {
				return Err(BindingError::invalid(
					name,
					format!("long strings are UChar waveforms, not {}", options.element_type),
				));
			}
			(ValueType::LongString, None) => {
				let capacity = match initial {
					Some(Value::String(s)) => s.len() + 1,
					_ => DEFAULT_LONG_STRING_CAPACITY,
				};
				WaveformOptions::new(ElementType::UChar, capacity)
			}
			(ValueType::Array, None) => derive_options(name, initial)?,
			(_, Some(_)) => return Err(BindingError::invalid(name, format!("{kind} is not a waveform kind"))),
			(_, None) => return Ok(None),
		};
		Self::new(name, options).map(Some)
	}

	/// Element type in effect: the record's `FTVL` once bound, the configured
	/// type before.
	pub fn element_type(&self) -> ElementType {
		self.resolved.get().copied().unwrap_or(self.configured)
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Narrows, casts and capacity-checks an array without touching the store.
	pub fn prepare(&self, array: Array) -> Result<Array, BindingError> {
		let array = array.narrow().cast(self.element_type());
		if array.len() > self.capacity {
			return Err(BindingError::Capacity {
				len: array.len(),
				capacity: self.capacity,
			});
		}
		Ok(array)
	}

	/// Adopts the element type the record was created with.
	pub(crate) fn resolve(&self, name: &str, store: &dyn RecordStore, record: RecordHandle) {
		let code = store.read_field(record, field::FTVL).ok().and_then(|v| u16::try_from(v).ok());
		match code.and_then(ElementType::from_code) {
			Some(element_type) if element_type.is_numeric() => {
				if element_type != self.configured {
					tracing::debug!(record = name, configured = %self.configured, actual = %element_type, "binding.waveform.retype");
				}
				let _ = self.resolved.set(element_type);
			}
			_ => tracing::warn!(record = name, ?code, "binding.waveform.bad_ftvl"),
		}
	}

	/// Reads the record's current elements.
	pub fn read(&self, store: &dyn RecordStore, record: RecordHandle) -> Result<Array, StoreError> {
		let nord = length_field(store, record, field::NORD)?.min(self.capacity);
		store.read_elements(record, nord)
	}

	/// Writes `array`, truncated to the record's allocation, and updates its
	/// element count. Nothing is written if the array exceeds the capacity.
	pub fn write(&self, store: &dyn RecordStore, record: RecordHandle, array: Array) -> Result<(), BindingError> {
		let array = self.prepare(array)?;
		let nelm = length_field(store, record, field::NELM)?;
		let array = if array.len() > nelm { array.truncated(nelm) } else { array };
		let nord = i32::try_from(array.len()).unwrap_or(i32::MAX);
		store.write_elements(record, &array)?;
		store.write_field(record, field::NORD, Value::Long(nord))?;
		Ok(())
	}
}

fn derive_options(name: &str, initial: Option<&Value>) -> Result<WaveformOptions, BindingError> {
	let (element_type, capacity) = match initial {
		Some(Value::Array(array)) => {
			let element_type = array.clone().narrow().element_type().unwrap_or(ElementType::Long);
			(element_type, array.len())
		}
		Some(Value::String(s)) => (ElementType::UChar, s.len() + 1),
		Some(Value::Long(_)) => (ElementType::Long, 1),
		Some(Value::Double(_)) => (ElementType::Double, 1),
		Some(Value::Enum(_)) => (ElementType::UShort, 1),
		None => return Err(BindingError::invalid(name, "waveform needs a capacity or an initial value")),
	};
	Ok(WaveformOptions::new(element_type, capacity))
}

fn length_field(store: &dyn RecordStore, record: RecordHandle, name: &str) -> Result<usize, StoreError> {
	let value = store.read_field(record, name)?;
	let len = i32::try_from(value).map_err(|source| StoreError::FieldType {
		record: record.to_string(),
		field: name.to_string(),
		source,
	})?;
	Ok(usize::try_from(len).unwrap_or(0))
}
