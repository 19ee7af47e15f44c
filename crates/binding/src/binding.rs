use std::sync::Arc;

use softpv_primitives::{ProcessStatus, RecordKind, Value};

use crate::error::BindingError;
use crate::input::InBinding;
use crate::output::OutBinding;
use crate::record::RecordCore;
use crate::store::{RecordHandle, RecordStore};

/// A registered binding of either direction.
#[derive(Debug, Clone)]
pub enum Binding {
	In(Arc<InBinding>),
	Out(Arc<OutBinding>),
}

impl Binding {
	pub fn core(&self) -> &RecordCore {
		match self {
			Self::In(b) => b.core(),
			Self::Out(b) => b.core(),
		}
	}

	pub fn name(&self) -> &str {
		self.core().name()
	}

	pub fn kind(&self) -> RecordKind {
		self.core().kind()
	}

	pub fn get(&self) -> Value {
		match self {
			Self::In(b) => b.get(),
			Self::Out(b) => b.get(),
		}
	}

	/// Sets the value the way application code would, processing outputs.
	pub fn set(&self, value: impl Into<Value>) -> Result<(), BindingError> {
		match self {
			Self::In(b) => b.set(value),
			Self::Out(b) => b.set(value),
		}
	}

	pub fn as_in(&self) -> Option<&Arc<InBinding>> {
		match self {
			Self::In(b) => Some(b),
			Self::Out(_) => None,
		}
	}

	pub fn as_out(&self) -> Option<&Arc<OutBinding>> {
		match self {
			Self::In(_) => None,
			Self::Out(b) => Some(b),
		}
	}

	pub(crate) fn init(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Result<ProcessStatus, BindingError> {
		match self {
			Self::In(b) => b.init(store, record),
			Self::Out(b) => b.init(store, record),
		}
	}

	pub(crate) fn process(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> ProcessStatus {
		match self {
			Self::In(b) => b.on_process(store.as_ref(), record),
			Self::Out(b) => b.on_process(store, record),
		}
	}
}
