//! Units of work handed to a dispatcher.
//!
//! A [`Job`] pairs one callback with an optional completion. Running a job
//! is the error-containment boundary for user code: errors and panics from
//! either half are logged and swallowed, and the completion always runs
//! exactly once after the callback has finished, whatever its outcome.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use softpv_primitives::BoxFutureStatic;

use crate::panic::{join_error_panic_message, panic_message};

/// Result type returned by user callbacks.
pub type JobResult = anyhow::Result<()>;

type BlockingFn = Box<dyn FnOnce() -> JobResult + Send + 'static>;
type CompletionFn = Box<dyn FnOnce() -> JobResult + Send + 'static>;

/// The callback half of a job.
pub enum Callback {
	/// Runs to completion without yielding.
	Blocking(BlockingFn),
	/// May suspend at await points on cooperative backends.
	Future(BoxFutureStatic<JobResult>),
}

impl std::fmt::Debug for Callback {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Blocking(_) => f.write_str("Callback::Blocking"),
			Self::Future(_) => f.write_str("Callback::Future"),
		}
	}
}

/// A callback plus optional completion, scheduled as one unit.
pub struct Job {
	label: String,
	callback: Callback,
	completion: Option<CompletionFn>,
}

impl std::fmt::Debug for Job {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Job")
			.field("label", &self.label)
			.field("callback", &self.callback)
			.field("completion", &self.completion.is_some())
			.finish()
	}
}

/// How a job's stage ended.
#[derive(Debug)]
enum Outcome {
	Done,
	Failed(anyhow::Error),
	Panicked(String),
	Cancelled,
}

impl Job {
	/// Creates a job around a blocking closure.
	pub fn blocking(label: impl Into<String>, f: impl FnOnce() -> JobResult + Send + 'static) -> Self {
		Self {
			label: label.into(),
			callback: Callback::Blocking(Box::new(f)),
			completion: None,
		}
	}

	/// Creates a job around a future.
	pub fn future(label: impl Into<String>, fut: impl Future<Output = JobResult> + Send + 'static) -> Self {
		Self {
			label: label.into(),
			callback: Callback::Future(Box::pin(fut)),
			completion: None,
		}
	}

	/// Creates a job from an already-built callback.
	pub fn new(label: impl Into<String>, callback: Callback) -> Self {
		Self {
			label: label.into(),
			callback,
			completion: None,
		}
	}

	/// Attaches a completion run strictly after the callback finishes.
	pub fn with_completion(mut self, f: impl FnOnce() -> JobResult + Send + 'static) -> Self {
		self.completion = Some(Box::new(f));
		self
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	pub fn has_completion(&self) -> bool {
		self.completion.is_some()
	}

	/// Runs the callback then the completion, containing every failure.
	///
	/// With `offload_blocking`, blocking callbacks are moved to the runtime's
	/// blocking pool instead of running inline on the current task.
	pub(crate) async fn run(self, offload_blocking: bool) {
		let Self { label, callback, completion } = self;

		let outcome = match callback {
			Callback::Blocking(f) if offload_blocking => match tokio::task::spawn_blocking(f).await {
				Ok(result) => Outcome::from(result),
				Err(err) => join_outcome(err),
			},
			Callback::Blocking(f) => run_inline(f),
			Callback::Future(fut) => match (CatchUnwind { inner: fut }).await {
				Ok(result) => Outcome::from(result),
				Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
			},
		};
		report(&label, "callback", outcome);

		if let Some(completion) = completion {
			report(&label, "completion", run_inline(completion));
		}
	}
}

impl From<JobResult> for Outcome {
	fn from(result: JobResult) -> Self {
		match result {
			Ok(()) => Self::Done,
			Err(err) => Self::Failed(err),
		}
	}
}

fn run_inline(f: impl FnOnce() -> JobResult) -> Outcome {
	match catch_unwind(AssertUnwindSafe(f)) {
		Ok(result) => Outcome::from(result),
		Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
	}
}

/// Polls a future on the job's own task, turning a panic during any poll
/// into an error.
struct CatchUnwind<F> {
	inner: F,
}

impl<F: Future + Unpin> Future for CatchUnwind<F> {
	type Output = Result<F::Output, Box<dyn Any + Send>>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let inner = &mut self.inner;
		match catch_unwind(AssertUnwindSafe(|| Pin::new(&mut *inner).poll(cx))) {
			Ok(Poll::Pending) => Poll::Pending,
			Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
			Err(payload) => Poll::Ready(Err(payload)),
		}
	}
}

fn join_outcome(err: tokio::task::JoinError) -> Outcome {
	match join_error_panic_message(err) {
		Some(msg) => Outcome::Panicked(msg),
		None => Outcome::Cancelled,
	}
}

fn report(label: &str, stage: &'static str, outcome: Outcome) {
	match outcome {
		Outcome::Done => tracing::trace!(job = label, stage, "dispatch.job.done"),
		Outcome::Failed(err) => tracing::error!(job = label, stage, error = %format!("{err:#}"), "dispatch.job.failed"),
		Outcome::Panicked(msg) => tracing::error!(job = label, stage, panic = %msg, "dispatch.job.panicked"),
		Outcome::Cancelled => tracing::warn!(job = label, stage, "dispatch.job.cancelled"),
	}
}
