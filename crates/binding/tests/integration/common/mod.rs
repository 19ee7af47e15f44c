//! Shared setup for binding integration tests.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use softpv_binding::{BindingSession, MemoryStore, RecordSpec, RecordStore};
use softpv_worker::{Backend, DispatcherConfig};

pub const WAIT: Duration = Duration::from_secs(5);

/// Session on a fresh event-loop dispatcher.
pub fn session() -> Arc<BindingSession> {
	session_on(Backend::EventLoop)
}

pub fn session_on(backend: Backend) -> Arc<BindingSession> {
	let _ = tracing_subscriber::fmt::try_init();
	let config = DispatcherConfig {
		thread_name: format!("test-{}", backend.as_str()),
		..DispatcherConfig::new(backend)
	};
	BindingSession::from_config(&config).expect("dispatcher starts")
}

/// Installs `session` into a new store and loads its records.
pub fn load(session: &Arc<BindingSession>) -> Arc<MemoryStore> {
	load_specs(session, session.database())
}

/// Like [`load`], with record descriptions the caller may have edited.
pub fn load_specs(session: &Arc<BindingSession>, specs: Vec<RecordSpec>) -> Arc<MemoryStore> {
	let store = MemoryStore::new();
	let shared: Arc<dyn RecordStore> = store.clone();
	session.install(&shared).expect("supports install");
	store.load(specs).expect("records load");
	store
}

/// Channel whose sender can be moved into `Fn` callbacks.
pub fn channel<T: Send + 'static>() -> (Arc<parking_lot::Mutex<mpsc::Sender<T>>>, mpsc::Receiver<T>) {
	let (tx, rx) = mpsc::channel();
	(Arc::new(parking_lot::Mutex::new(tx)), rx)
}
