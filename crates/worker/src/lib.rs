//! Dispatchers that run record callbacks off the caller's thread.
//!
//! A [`Job`] is scheduled on a [`Dispatcher`] and runs on one of three
//! backends: a single-threaded event loop, a FIFO coroutine worker, or a
//! thread pool. Failures inside jobs are contained and logged.

mod backend;
mod config;
mod coroutine;
mod dispatcher;
mod event_loop;
mod job;
mod panic;
mod queue;
mod spawn;
mod thread_pool;

pub use backend::Backend;
pub use config::{ConfigError, DEFAULT_THREAD_NAME, DEFAULT_WORKERS, DispatcherConfig};
pub use coroutine::CoroutineDispatcher;
pub use dispatcher::{DispatchError, Dispatcher};
pub use event_loop::EventLoopDispatcher;
pub use job::{Callback, Job, JobResult};
pub use panic::panic_message;
pub use thread_pool::ThreadPoolDispatcher;
