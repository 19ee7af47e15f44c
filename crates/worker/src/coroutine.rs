use crate::backend::Backend;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::job::Job;
use crate::queue::{Drain, QueueWorker};

/// Dispatcher with a private callback queue drained by one dedicated worker.
///
/// Each job runs as one cooperative task, to completion, before the next is
/// taken from the queue. A job that suspends holds the queue until it
/// resumes and finishes, so callback processing never interleaves.
#[derive(Debug)]
pub struct CoroutineDispatcher {
	worker: QueueWorker,
}

impl CoroutineDispatcher {
	pub fn new(thread_name: impl Into<String>) -> Result<Self, DispatchError> {
		Ok(Self {
			worker: QueueWorker::spawn(Backend::Coroutine, Drain::Sequential, thread_name)?,
		})
	}
}

impl Dispatcher for CoroutineDispatcher {
	fn backend(&self) -> Backend {
		Backend::Coroutine
	}

	fn schedule(&self, job: Job) -> Result<(), DispatchError> {
		self.worker.send(job)
	}

	fn shutdown(&self) {
		self.worker.close();
	}
}

impl Drop for CoroutineDispatcher {
	fn drop(&mut self) {
		self.worker.close();
	}
}
