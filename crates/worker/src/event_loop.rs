use crate::backend::Backend;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::job::Job;
use crate::queue::{Drain, QueueWorker};

/// Dispatcher backed by a single-threaded cooperative event loop.
///
/// Jobs start in submission order. Future callbacks interleave wherever they
/// await; blocking callbacks hold the loop until they return.
#[derive(Debug)]
pub struct EventLoopDispatcher {
	worker: QueueWorker,
}

impl EventLoopDispatcher {
	/// Starts a loop on a dedicated thread named `thread_name`.
	pub fn new(thread_name: impl Into<String>) -> Result<Self, DispatchError> {
		Ok(Self {
			worker: QueueWorker::spawn(Backend::EventLoop, Drain::Interleaved, thread_name)?,
		})
	}

	/// Runs jobs on a runtime the caller already drives.
	///
	/// Submission order is preserved only when `handle` belongs to a
	/// current-thread runtime. Shutdown stops intake; the host runtime
	/// finishes queued jobs on its own schedule.
	pub fn attach(handle: &tokio::runtime::Handle) -> Self {
		Self {
			worker: QueueWorker::attach(Backend::EventLoop, Drain::Interleaved, handle),
		}
	}
}

impl Dispatcher for EventLoopDispatcher {
	fn backend(&self) -> Backend {
		Backend::EventLoop
	}

	fn schedule(&self, job: Job) -> Result<(), DispatchError> {
		self.worker.send(job)
	}

	fn shutdown(&self) {
		self.worker.close();
	}
}

impl Drop for EventLoopDispatcher {
	fn drop(&mut self) {
		self.worker.close();
	}
}
