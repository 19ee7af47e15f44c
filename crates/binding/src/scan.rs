use std::sync::OnceLock;

use crate::store::{InterruptHandle, RecordStore};

/// Lazily created I/O interrupt source for one record.
#[derive(Debug, Default)]
pub struct ScanTrigger {
	handle: OnceLock<InterruptHandle>,
}

impl ScanTrigger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the interrupt handle, creating it on first use.
	pub fn handle(&self, store: &dyn RecordStore) -> InterruptHandle {
		*self.handle.get_or_init(|| store.init_interrupt())
	}

	/// Requests a scan. Coalescing repeated requests is the store's job.
	pub fn trigger(&self, store: &dyn RecordStore) {
		store.request_scan(self.handle(store));
	}

	pub fn is_initialized(&self) -> bool {
		self.handle.get().is_some()
	}
}
