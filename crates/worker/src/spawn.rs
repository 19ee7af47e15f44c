use crate::Backend;

/// Spawns a dedicated named OS thread tagged with its dispatcher backend.
pub(crate) fn spawn_named_thread<F, R>(backend: Backend, name: impl Into<String>, f: F) -> std::io::Result<std::thread::JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let name = name.into();
	tracing::debug!(backend = backend.as_str(), thread = %name, "dispatch.spawn_named_thread");
	std::thread::Builder::new().name(name).spawn(f)
}

/// Builds the single-threaded runtime that drives a queue worker.
pub(crate) fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_current_thread().enable_all().build()
}

/// Joins `handle` unless called from the thread it refers to.
///
/// A callback that shuts down its own dispatcher must not wait for itself.
pub(crate) fn join_unless_current(backend: Backend, handle: std::thread::JoinHandle<()>) {
	if handle.thread().id() == std::thread::current().id() {
		tracing::warn!(backend = backend.as_str(), "dispatch.shutdown.from_worker");
		return;
	}
	if handle.join().is_err() {
		tracing::error!(backend = backend.as_str(), "dispatch.worker.panicked");
	}
}
