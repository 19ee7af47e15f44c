use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the Unix epoch and the record store epoch (1990-01-01 UTC).
pub const STORE_EPOCH_OFFSET: u64 = 631_152_000;

/// A record timestamp with nanosecond resolution, relative to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
	secs: u64,
	nanos: u32,
}

impl Timestamp {
	pub const fn new(secs: u64, nanos: u32) -> Self {
		Self {
			secs: secs + (nanos / 1_000_000_000) as u64,
			nanos: nanos % 1_000_000_000,
		}
	}

	pub fn now() -> Self {
		Self::from(SystemTime::now())
	}

	/// Builds a timestamp from fractional Unix seconds. Negative and
	/// non-finite input clamps to the epoch.
	pub fn from_secs_f64(secs: f64) -> Self {
		if !secs.is_finite() || secs <= 0.0 {
			return Self::new(0, 0);
		}
		let whole = secs.trunc();
		Self::new(whole as u64, ((secs - whole) * 1e9) as u32)
	}

	pub const fn secs(&self) -> u64 {
		self.secs
	}

	pub const fn nanos(&self) -> u32 {
		self.nanos
	}

	pub fn as_secs_f64(&self) -> f64 {
		self.secs as f64 + f64::from(self.nanos) / 1e9
	}

	/// Seconds past the store epoch, saturating at zero for earlier times.
	pub const fn store_secs(&self) -> u64 {
		self.secs.saturating_sub(STORE_EPOCH_OFFSET)
	}
}

impl From<SystemTime> for Timestamp {
	fn from(time: SystemTime) -> Self {
		let since = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
		Self::new(since.as_secs(), since.subsec_nanos())
	}
}

impl From<Timestamp> for SystemTime {
	fn from(ts: Timestamp) -> Self {
		UNIX_EPOCH + Duration::new(ts.secs, ts.nanos)
	}
}
