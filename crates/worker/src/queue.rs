//! Queue-fed worker shared by the event-loop and coroutine dispatchers.
//!
//! Jobs travel over an unbounded channel to a single-threaded runtime,
//! either on a dedicated named thread or on a host runtime the caller
//! already runs. Closing the channel lets the worker drain what is queued,
//! wait for in-flight jobs, and exit.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::backend::Backend;
use crate::dispatcher::DispatchError;
use crate::job::Job;
use crate::spawn::{current_thread_runtime, join_unless_current, spawn_named_thread};

/// How queued jobs share the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
	/// Each job becomes its own task; tasks start in FIFO order and interleave at await points.
	Interleaved,
	/// Each job runs to completion before the next one starts.
	Sequential,
}

pub(crate) struct QueueWorker {
	backend: Backend,
	tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
	thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl std::fmt::Debug for QueueWorker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("QueueWorker")
			.field("backend", &self.backend)
			.field("open", &self.tx.lock().is_some())
			.field("owns_thread", &self.thread.lock().is_some())
			.finish()
	}
}

impl QueueWorker {
	/// Starts a worker on a dedicated thread with its own runtime.
	pub(crate) fn spawn(backend: Backend, drain: Drain, thread_name: impl Into<String>) -> Result<Self, DispatchError> {
		let runtime = current_thread_runtime()?;
		let (tx, rx) = mpsc::unbounded_channel();
		let thread = spawn_named_thread(backend, thread_name, move || runtime.block_on(drain_queue(backend, drain, rx)))?;
		Ok(Self {
			backend,
			tx: Mutex::new(Some(tx)),
			thread: Mutex::new(Some(thread)),
		})
	}

	/// Starts a worker as a task on an existing runtime.
	pub(crate) fn attach(backend: Backend, drain: Drain, handle: &tokio::runtime::Handle) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		handle.spawn(drain_queue(backend, drain, rx));
		Self {
			backend,
			tx: Mutex::new(Some(tx)),
			thread: Mutex::new(None),
		}
	}

	pub(crate) fn send(&self, job: Job) -> Result<(), DispatchError> {
		let guard = self.tx.lock();
		let Some(tx) = guard.as_ref() else {
			return Err(DispatchError::ShutDown);
		};
		tx.send(job).map_err(|_| DispatchError::ShutDown)
	}

	pub(crate) fn close(&self) {
		let tx = self.tx.lock().take();
		if tx.is_none() {
			return;
		}
		drop(tx);
		tracing::debug!(backend = self.backend.as_str(), "dispatch.close");
		let thread = self.thread.lock().take();
		if let Some(thread) = thread {
			join_unless_current(self.backend, thread);
		}
	}
}

async fn drain_queue(backend: Backend, drain: Drain, mut rx: mpsc::UnboundedReceiver<Job>) {
	tracing::debug!(backend = backend.as_str(), ?drain, "dispatch.loop.start");
	let tracker = TaskTracker::new();
	while let Some(job) = rx.recv().await {
		tracing::trace!(backend = backend.as_str(), job = job.label(), "dispatch.loop.job");
		match drain {
			Drain::Interleaved => {
				tracker.spawn(job.run(false));
			}
			Drain::Sequential => job.run(false).await,
		}
	}
	tracker.close();
	tracker.wait().await;
	tracing::debug!(backend = backend.as_str(), "dispatch.loop.stop");
}
