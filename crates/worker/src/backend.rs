use serde::Deserialize;

/// Concurrency backend a dispatcher runs callbacks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
	/// Single-threaded cooperative loop; jobs start in FIFO order and interleave at await points.
	#[default]
	EventLoop,
	/// One dedicated worker running each job to completion in FIFO order.
	Coroutine,
	/// Multi-threaded pool with no cross-job ordering.
	ThreadPool,
}

impl Backend {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::EventLoop => "event_loop",
			Self::Coroutine => "coroutine",
			Self::ThreadPool => "thread_pool",
		}
	}
}

impl std::fmt::Display for Backend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
