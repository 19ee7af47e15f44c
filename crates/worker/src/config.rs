//! Dispatcher configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! backend = "thread-pool"
//! workers = 8
//! thread_name = "beamline-dispatch"
//! ```
//!
//! Every key is optional; an empty document yields an event-loop
//! dispatcher on a thread named `softpv-dispatch`.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::backend::Backend;
use crate::coroutine::CoroutineDispatcher;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::event_loop::EventLoopDispatcher;
use crate::thread_pool::ThreadPoolDispatcher;

/// Default thread-pool size.
pub const DEFAULT_WORKERS: usize = 4;

/// Default name for dispatcher threads.
pub const DEFAULT_THREAD_NAME: &str = "softpv-dispatch";

/// Errors that can occur when loading a dispatcher configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The document is not valid TOML or has unknown keys.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// The thread pool was configured with no workers.
	#[error("thread pool needs at least one worker (got {0})")]
	InvalidWorkers(usize),
}

/// Which dispatcher to build and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
	pub backend: Backend,
	/// Async worker threads; only used by the thread-pool backend.
	pub workers: usize,
	pub thread_name: String,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			backend: Backend::default(),
			workers: DEFAULT_WORKERS,
			thread_name: DEFAULT_THREAD_NAME.to_string(),
		}
	}
}

impl DispatcherConfig {
	pub fn new(backend: Backend) -> Self {
		Self {
			backend,
			..Self::default()
		}
	}

	/// Parses and validates a TOML document.
	pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.backend == Backend::ThreadPool && self.workers == 0 {
			return Err(ConfigError::InvalidWorkers(self.workers));
		}
		Ok(())
	}

	/// Starts the configured dispatcher.
	pub fn build(&self) -> Result<Arc<dyn Dispatcher>, DispatchError> {
		tracing::debug!(backend = self.backend.as_str(), workers = self.workers, thread = %self.thread_name, "dispatch.build");
		Ok(match self.backend {
			Backend::EventLoop => Arc::new(EventLoopDispatcher::new(self.thread_name.clone())?),
			Backend::Coroutine => Arc::new(CoroutineDispatcher::new(self.thread_name.clone())?),
			Backend::ThreadPool => Arc::new(ThreadPoolDispatcher::new(self.workers, self.thread_name.clone())?),
		})
	}
}
