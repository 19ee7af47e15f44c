//! Boundary to the external record store.
//!
//! The store owns raw field storage and drives processing. Bindings reach it
//! only through [`RecordStore`]; the store reaches bindings only through the
//! [`DeviceSupport`] entry points registered per device name.

use std::sync::Arc;

use softpv_primitives::{Array, ElementType, ProcessStatus, RecordKind, Timestamp, Value};
pub use softpv_registry::EntryId as BindingId;

use crate::error::{BindingError, StoreError};

/// Field names the binding engine reads or writes.
pub mod field {
	pub const NAME: &str = "NAME";
	pub const VAL: &str = "VAL";
	/// Pending alarm severity for the current processing cycle.
	pub const NSEV: &str = "NSEV";
	/// Pending alarm status for the current processing cycle.
	pub const NSTA: &str = "NSTA";
	/// Committed alarm severity.
	pub const SEVR: &str = "SEVR";
	/// Committed alarm status.
	pub const STAT: &str = "STAT";
	pub const TIME: &str = "TIME";
	/// Undefined-value flag.
	pub const UDF: &str = "UDF";
	/// Last monitored value.
	pub const MLST: &str = "MLST";
	/// Current waveform element count.
	pub const NORD: &str = "NORD";
	/// Allocated waveform element count.
	pub const NELM: &str = "NELM";
	/// Waveform element type code.
	pub const FTVL: &str = "FTVL";
}

macro_rules! opaque_handle {
	($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
		$(
			$(#[$meta])*
			#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
			pub struct $name(u64);

			impl $name {
				pub const fn new(raw: u64) -> Self {
					Self(raw)
				}

				pub const fn raw(self) -> u64 {
					self.0
				}
			}

			impl std::fmt::Display for $name {
				fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
					write!(f, "#{}", self.0)
				}
			}
		)+
	};
}

opaque_handle! {
	/// A record owned by the store.
	RecordHandle,
	/// An I/O interrupt source records can be scanned through.
	InterruptHandle,
	/// Proof that a record was marked busy; returned on release.
	CompletionToken,
}

/// Description of a record a store can instantiate.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSpec {
	pub name: String,
	pub kind: RecordKind,
	/// Element type and capacity for waveform kinds.
	pub waveform: Option<(ElementType, usize)>,
	/// Record is processed through its I/O interrupt rather than passively.
	pub io_intr: bool,
}

impl RecordSpec {
	pub fn record_type(&self) -> &'static str {
		self.kind.strategy().record_type
	}

	pub fn device_name(&self) -> &'static str {
		self.kind.device_name()
	}
}

/// Operations the binding engine needs from the record store.
///
/// All methods may be called concurrently from any thread. Implementations
/// must not hold internal locks while calling back into [`DeviceSupport`].
pub trait RecordStore: Send + Sync {
	fn read_field(&self, record: RecordHandle, field: &str) -> Result<Value, StoreError>;

	fn write_field(&self, record: RecordHandle, field: &str, value: Value) -> Result<(), StoreError>;

	/// Reads the first `count` waveform elements.
	fn read_elements(&self, record: RecordHandle, count: usize) -> Result<Array, StoreError>;

	/// Copies waveform elements into the record's buffer, up to its capacity.
	fn write_elements(&self, record: RecordHandle, array: &Array) -> Result<(), StoreError>;

	fn write_time(&self, record: RecordHandle, timestamp: Timestamp) -> Result<(), StoreError>;

	/// Commits pending alarm state and clears it for the next cycle.
	fn reset_alarms(&self, record: RecordHandle) -> Result<(), StoreError>;

	fn init_interrupt(&self) -> InterruptHandle;

	/// Asks the store to process every record scanned through `handle`.
	fn request_scan(&self, handle: InterruptHandle);

	/// Marks a record's processing as in flight until [`RecordStore::release`].
	fn mark_busy(&self, record: RecordHandle) -> Result<CompletionToken, StoreError>;

	/// Completes processing started by [`RecordStore::mark_busy`]. Thread-safe.
	fn release(&self, record: RecordHandle, token: CompletionToken);

	/// Writes a record's value as an external client would, processing it.
	fn put_field(&self, name: &str, value: Value) -> Result<(), StoreError>;

	/// Stores the binding id in the record's private slot.
	fn attach(&self, record: RecordHandle, binding: BindingId) -> Result<(), StoreError>;

	fn attached(&self, record: RecordHandle) -> Option<BindingId>;

	fn register_support(&self, device_name: &'static str, support: Arc<dyn DeviceSupport>) -> Result<(), StoreError>;
}

/// Entry points the store calls for records using a device support.
pub trait DeviceSupport: Send + Sync {
	/// Called once before the store initializes any record of this support.
	fn init(&self, store: &Arc<dyn RecordStore>) -> Result<(), BindingError>;

	/// Binds one record to its application-side state.
	fn init_record(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Result<ProcessStatus, BindingError>;

	fn process(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> ProcessStatus;

	/// Returns the interrupt source for records scanned on I/O interrupt.
	fn io_interrupt(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Option<InterruptHandle>;
}
