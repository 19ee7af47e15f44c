use std::sync::Arc;

use arc_swap::ArcSwap;
use softpv_primitives::{AlarmCode, Severity, Timestamp, Value};

/// One complete input state: value, alarm and optional timestamp.
///
/// Immutable; writers replace it whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSlot {
	pub value: Value,
	pub severity: Severity,
	pub alarm: AlarmCode,
	/// `None` lets the store stamp the record itself.
	pub timestamp: Option<Timestamp>,
}

impl ValueSlot {
	/// A slot with no alarm raised.
	pub fn new(value: Value) -> Self {
		Self {
			value,
			severity: Severity::NoAlarm,
			alarm: AlarmCode::Udf,
			timestamp: None,
		}
	}
}

/// Lock-free cell holding the current [`ValueSlot`].
#[derive(Debug)]
pub struct AtomicSlot {
	inner: ArcSwap<ValueSlot>,
}

impl AtomicSlot {
	pub fn new(slot: ValueSlot) -> Self {
		Self {
			inner: ArcSwap::from_pointee(slot),
		}
	}

	pub fn load(&self) -> Arc<ValueSlot> {
		self.inner.load_full()
	}

	pub fn store(&self, slot: ValueSlot) {
		self.inner.store(Arc::new(slot));
	}

	/// Replaces the alarm state, keeping whatever value is current.
	pub fn update_alarm(&self, severity: Severity, alarm: AlarmCode, timestamp: Option<Timestamp>) {
		self.inner.rcu(|current| ValueSlot {
			value: current.value.clone(),
			severity,
			alarm,
			timestamp,
		});
	}
}
