//! Owner of every binding in one process-variable set.
//!
//! # Role
//!
//! A [`BindingSession`] creates bindings, keeps them in a name directory,
//! and registers the device supports through which a record store reaches
//! them. It moves through three phases:
//!
//! - `Building`: bindings may be created.
//! - `Loaded`: the store has started initializing records; the directory is
//!   frozen and creating a binding fails with [`BindingError::Frozen`].
//! - `TornDown`: the dispatcher has been shut down.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use softpv_primitives::{Direction, ProcessStatus, RecordKind};
use softpv_registry::Directory;
use softpv_worker::{DispatchError, Dispatcher, DispatcherConfig};

use crate::binding::Binding;
use crate::error::BindingError;
use crate::input::{InBinding, InOptions};
use crate::output::{OutBinding, OutOptions};
use crate::store::{BindingId, DeviceSupport, InterruptHandle, RecordHandle, RecordSpec, RecordStore, field};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Building,
	Loaded,
	TornDown,
}

pub struct BindingSession {
	directory: Directory<Binding>,
	dispatcher: Arc<dyn Dispatcher>,
	phase: Mutex<Phase>,
}

impl std::fmt::Debug for BindingSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BindingSession")
			.field("directory", &self.directory)
			.field("dispatcher", &self.dispatcher)
			.field("phase", &*self.phase.lock())
			.finish()
	}
}

impl BindingSession {
	pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Arc<Self> {
		Arc::new(Self {
			directory: Directory::new("records"),
			dispatcher,
			phase: Mutex::new(Phase::Building),
		})
	}

	/// Starts the configured dispatcher and a session using it.
	pub fn from_config(config: &DispatcherConfig) -> Result<Arc<Self>, DispatchError> {
		Ok(Self::new(config.build()?))
	}

	pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
		&self.dispatcher
	}

	pub fn phase(&self) -> Phase {
		*self.phase.lock()
	}

	/// Creates and registers an input binding.
	pub fn in_record(&self, name: impl Into<Arc<str>>, kind: RecordKind, options: InOptions) -> Result<Arc<InBinding>, BindingError> {
		let name = name.into();
		self.check_available(&name)?;
		let binding = Arc::new(InBinding::new(Arc::clone(&name), kind, options)?);
		self.directory.register(name, Binding::In(Arc::clone(&binding)))?;
		Ok(binding)
	}

	/// Creates and registers an output binding notifying through this
	/// session's dispatcher.
	pub fn out_record(&self, name: impl Into<Arc<str>>, kind: RecordKind, options: OutOptions) -> Result<Arc<OutBinding>, BindingError> {
		let name = name.into();
		self.check_available(&name)?;
		let binding = Arc::new(OutBinding::new(Arc::clone(&name), kind, options, Arc::clone(&self.dispatcher))?);
		self.directory.register(name, Binding::Out(Arc::clone(&binding)))?;
		Ok(binding)
	}

	fn check_available(&self, name: &str) -> Result<(), BindingError> {
		if self.directory.is_frozen() {
			return Err(BindingError::Frozen(name.to_string()));
		}
		if self.directory.id_of(name).is_some() {
			return Err(BindingError::DuplicateName(name.to_string()));
		}
		Ok(())
	}

	pub fn lookup(&self, name: &str) -> Option<Binding> {
		self.directory.get(name).map(|binding| Binding::clone(&binding))
	}

	pub(crate) fn lookup_id(&self, id: BindingId) -> Option<Binding> {
		self.directory.get_by_id(id).map(|binding| Binding::clone(&binding))
	}

	/// Every binding in creation order.
	pub fn records(&self) -> Vec<Binding> {
		self.directory.snapshot().iter().map(|entry| Binding::clone(&entry.value)).collect()
	}

	/// Record descriptions a store instantiates to back this session.
	pub fn database(&self) -> Vec<RecordSpec> {
		self.directory
			.snapshot()
			.iter()
			.map(|entry| {
				let core = entry.value.core();
				RecordSpec {
					name: entry.name.to_string(),
					kind: core.kind(),
					waveform: core.waveform().map(|w| (w.element_type(), w.capacity())),
					io_intr: core.kind().direction() == Direction::In,
				}
			})
			.collect()
	}

	/// Registers one device support per record kind with `store`.
	pub fn install(self: &Arc<Self>, store: &Arc<dyn RecordStore>) -> Result<(), BindingError> {
		for kind in RecordKind::ALL {
			let support = Arc::new(SessionSupport {
				session: Arc::downgrade(self),
				kind,
			});
			store.register_support(kind.device_name(), support)?;
		}
		tracing::debug!(records = self.directory.len(), "binding.session.install");
		Ok(())
	}

	/// Freezes the directory once the store starts loading records.
	pub(crate) fn mark_loaded(&self) {
		let mut phase = self.phase.lock();
		if *phase == Phase::Building {
			*phase = Phase::Loaded;
			self.directory.freeze();
		}
	}

	/// Stops the dispatcher after letting queued notifications finish.
	pub fn teardown(&self) {
		{
			let mut phase = self.phase.lock();
			if *phase == Phase::TornDown {
				return;
			}
			*phase = Phase::TornDown;
		}
		self.directory.freeze();
		self.dispatcher.shutdown();
		tracing::debug!("binding.session.teardown");
	}
}

/// Device support routing store callbacks for one record kind to bindings.
struct SessionSupport {
	session: Weak<BindingSession>,
	kind: RecordKind,
}

impl SessionSupport {
	fn binding(&self, store: &dyn RecordStore, record: RecordHandle) -> Option<Binding> {
		let id = store.attached(record)?;
		self.session.upgrade()?.lookup_id(id)
	}
}

impl DeviceSupport for SessionSupport {
	fn init(&self, _store: &Arc<dyn RecordStore>) -> Result<(), BindingError> {
		if let Some(session) = self.session.upgrade() {
			session.mark_loaded();
		}
		Ok(())
	}

	fn init_record(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Result<ProcessStatus, BindingError> {
		let name = String::try_from(store.read_field(record, field::NAME)?)?;
		let session = self.session.upgrade().ok_or_else(|| BindingError::UnknownRecord(name.clone()))?;
		let Some(id) = session.directory.id_of(&name) else {
			return Err(BindingError::UnknownRecord(name));
		};
		let binding = session.lookup_id(id).ok_or_else(|| BindingError::UnknownRecord(name.clone()))?;
		if binding.kind() != self.kind {
			return Err(BindingError::invalid(
				&name,
				format!("record uses {} but the binding is {}", self.kind, binding.kind()),
			));
		}
		store.attach(record, id)?;
		binding.init(store, record)
	}

	fn process(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> ProcessStatus {
		match self.binding(store.as_ref(), record) {
			Some(binding) => binding.process(store, record),
			None => {
				let name = store.read_field(record, field::NAME).ok().and_then(|v| String::try_from(v).ok());
				tracing::warn!(handle = %record, ?name, "binding.process.unbound");
				ProcessStatus::Error
			}
		}
	}

	fn io_interrupt(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Option<InterruptHandle> {
		let binding = self.binding(store.as_ref(), record)?;
		Some(binding.core().interrupt(store.as_ref()))
	}
}
