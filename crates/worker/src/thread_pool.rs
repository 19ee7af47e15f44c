use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::task::TaskTracker;

use crate::backend::Backend;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::job::Job;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
	static CURRENT_POOL: Cell<u64> = const { Cell::new(0) };
}

/// Dispatcher running callbacks on a multi-threaded pool.
///
/// Blocking callbacks use the pool's blocking threads, futures its async
/// workers. Jobs are unordered relative to each other; only the
/// callback-then-completion order within one job holds.
pub struct ThreadPoolDispatcher {
	id: u64,
	accepting: AtomicBool,
	runtime: Mutex<Option<tokio::runtime::Runtime>>,
	handle: tokio::runtime::Handle,
	tracker: TaskTracker,
}

impl std::fmt::Debug for ThreadPoolDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ThreadPoolDispatcher")
			.field("id", &self.id)
			.field("accepting", &self.accepting.load(Ordering::Acquire))
			.field("pending", &self.tracker.len())
			.finish()
	}
}

impl ThreadPoolDispatcher {
	/// Starts a pool with `workers` async worker threads.
	pub fn new(workers: usize, thread_name: impl Into<String>) -> Result<Self, DispatchError> {
		let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
		let thread_name = thread_name.into();
		tracing::debug!(backend = Backend::ThreadPool.as_str(), workers, thread = %thread_name, "dispatch.pool.start");
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(workers.max(1))
			.thread_name(thread_name)
			.on_thread_start(move || CURRENT_POOL.with(|pool| pool.set(id)))
			.enable_all()
			.build()?;
		Ok(Self {
			id,
			accepting: AtomicBool::new(true),
			handle: runtime.handle().clone(),
			runtime: Mutex::new(Some(runtime)),
			tracker: TaskTracker::new(),
		})
	}

	/// Number of jobs scheduled but not yet finished.
	pub fn pending(&self) -> usize {
		self.tracker.len()
	}

	fn on_own_thread(&self) -> bool {
		CURRENT_POOL.with(|pool| pool.get() == self.id)
	}

	/// Lets in-flight jobs finish on a detached thread, then drops the runtime there.
	fn drain_detached(&self, runtime: tokio::runtime::Runtime) {
		let tracker = self.tracker.clone();
		let slot = Arc::new(Mutex::new(Some(runtime)));
		let waiter = Arc::clone(&slot);
		let spawned = std::thread::Builder::new()
			.name(format!("softpv-pool-{}-drain", self.id))
			.spawn(move || {
				let runtime = waiter.lock().take();
				if let Some(runtime) = runtime {
					runtime.block_on(tracker.wait());
				}
				tracing::debug!(backend = Backend::ThreadPool.as_str(), "dispatch.pool.stop");
			});
		if let Err(err) = spawned {
			tracing::warn!(backend = Backend::ThreadPool.as_str(), error = %err, "dispatch.shutdown.detach_failed");
			let runtime = slot.lock().take();
			if let Some(runtime) = runtime {
				runtime.shutdown_background();
			}
		}
	}
}

impl Dispatcher for ThreadPoolDispatcher {
	fn backend(&self) -> Backend {
		Backend::ThreadPool
	}

	fn schedule(&self, job: Job) -> Result<(), DispatchError> {
		if !self.accepting.load(Ordering::Acquire) {
			return Err(DispatchError::ShutDown);
		}
		tracing::trace!(backend = Backend::ThreadPool.as_str(), job = job.label(), "dispatch.pool.job");
		self.tracker.spawn_on(job.run(true), &self.handle);
		Ok(())
	}

	fn shutdown(&self) {
		if !self.accepting.swap(false, Ordering::AcqRel) {
			return;
		}
		self.tracker.close();
		let Some(runtime) = self.runtime.lock().take() else {
			return;
		};
		if self.on_own_thread() {
			// The calling job is tracked too, so its own thread cannot wait.
			tracing::debug!(backend = Backend::ThreadPool.as_str(), "dispatch.shutdown.from_worker");
			self.drain_detached(runtime);
			return;
		}
		let tracker = self.tracker.clone();
		// Waiting happens on a scoped helper thread so shutdown also works
		// from inside another runtime's async context.
		std::thread::scope(|scope| {
			scope.spawn(move || {
				runtime.block_on(tracker.wait());
				drop(runtime);
			});
		});
		tracing::debug!(backend = Backend::ThreadPool.as_str(), "dispatch.pool.stop");
	}
}

impl Drop for ThreadPoolDispatcher {
	fn drop(&mut self) {
		self.shutdown();
	}
}
