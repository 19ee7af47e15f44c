use crate::backend::Backend;
use crate::job::Job;

/// Dispatch failure.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
	/// The dispatcher has been shut down and accepts no more work.
	#[error("dispatcher is shut down")]
	ShutDown,

	/// The backend runtime or its worker thread could not be started.
	#[error("failed to start dispatcher backend: {0}")]
	Runtime(#[from] std::io::Error),
}

/// Runs callbacks off the calling thread.
///
/// Implementations guarantee that each scheduled callback runs exactly once
/// on a thread other than the one calling [`Dispatcher::schedule`], that the
/// completion (if any) runs exactly once strictly afterwards, and that
/// failures in either are logged rather than propagated.
pub trait Dispatcher: Send + Sync + std::fmt::Debug {
	/// Backend this dispatcher runs on.
	fn backend(&self) -> Backend;

	/// Queues a job. Never blocks on the job itself.
	fn schedule(&self, job: Job) -> Result<(), DispatchError>;

	/// Stops accepting work, lets queued and in-flight jobs finish, and joins
	/// owned worker threads. Safe to call more than once.
	fn shutdown(&self);
}
