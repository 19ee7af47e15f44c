//! Output records: validate incoming writes, commit them, notify the
//! application off the store's processing thread.
//!
//! A write cycle runs synchronously inside [`OutBinding::on_process`]
//! through validation and commit. Only the update notification is handed to
//! the dispatcher. For blocking records the store is told the record is busy
//! before the notification is queued, and the notification's completion
//! releases it.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use softpv_primitives::{BoxFutureStatic, Direction, ProcessStatus, RecordKind, Timestamp, Value};
use softpv_worker::{Callback, Dispatcher, Job, JobResult, panic_message};

use crate::error::{BindingError, StoreError};
use crate::record::RecordCore;
use crate::store::{RecordHandle, RecordStore, field};
use crate::waveform::{Waveform, WaveformOptions};

type UpdateFn = dyn Fn(Value) -> JobResult + Send + Sync;
type NamedUpdateFn = dyn Fn(Value, &str) -> JobResult + Send + Sync;
type AsyncUpdateFn = dyn Fn(Value) -> BoxFutureStatic<JobResult> + Send + Sync;

/// Decides whether a write is accepted. Runs on the store's thread.
pub type Validator = Arc<dyn Fn(&OutBinding, &Value) -> bool + Send + Sync>;

/// Application callback run after a write is committed.
#[derive(Clone)]
pub enum UpdateHandler {
	Sync(Arc<UpdateFn>),
	/// Also receives the record name.
	Named(Arc<NamedUpdateFn>),
	/// May suspend; interleaves with other jobs on the event-loop backend.
	Async(Arc<AsyncUpdateFn>),
}

impl std::fmt::Debug for UpdateHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Sync(_) => "UpdateHandler::Sync",
			Self::Named(_) => "UpdateHandler::Named",
			Self::Async(_) => "UpdateHandler::Async",
		})
	}
}

impl UpdateHandler {
	pub fn sync(f: impl Fn(Value) -> JobResult + Send + Sync + 'static) -> Self {
		Self::Sync(Arc::new(f))
	}

	pub fn named(f: impl Fn(Value, &str) -> JobResult + Send + Sync + 'static) -> Self {
		Self::Named(Arc::new(f))
	}

	pub fn asynchronous<F, Fut>(f: F) -> Self
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = JobResult> + Send + 'static,
	{
		Self::Async(Arc::new(move |value| -> BoxFutureStatic<JobResult> { Box::pin(f(value)) }))
	}

	fn job(&self, name: Arc<str>, value: Value) -> Job {
		let label = name.to_string();
		match self {
			Self::Sync(f) => {
				let f = Arc::clone(f);
				Job::blocking(label, move || f(value))
			}
			Self::Named(f) => {
				let f = Arc::clone(f);
				Job::blocking(label, move || f(value, &*name))
			}
			Self::Async(f) => Job::new(label, Callback::Future(f(value))),
		}
	}
}

/// Construction options for output records.
#[derive(Clone, Default)]
pub struct OutOptions {
	pub on_update: Option<UpdateHandler>,
	pub on_update_name: Option<Arc<NamedUpdateFn>>,
	pub validate: Option<Validator>,
	/// Notify even when the written value equals the committed one.
	pub always_update: bool,
	pub initial_value: Option<Value>,
	/// Keep the record busy until the update callback has finished.
	pub blocking: bool,
	pub waveform: Option<WaveformOptions>,
}

impl std::fmt::Debug for OutOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OutOptions")
			.field("on_update", &self.on_update)
			.field("on_update_name", &self.on_update_name.is_some())
			.field("validate", &self.validate.is_some())
			.field("always_update", &self.always_update)
			.field("initial_value", &self.initial_value)
			.field("blocking", &self.blocking)
			.field("waveform", &self.waveform)
			.finish()
	}
}

impl OutOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn on_update(mut self, f: impl Fn(Value) -> JobResult + Send + Sync + 'static) -> Self {
		self.on_update = Some(UpdateHandler::sync(f));
		self
	}

	pub fn on_update_async<F, Fut>(mut self, f: F) -> Self
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = JobResult> + Send + 'static,
	{
		self.on_update = Some(UpdateHandler::asynchronous(f));
		self
	}

	pub fn on_update_name(mut self, f: impl Fn(Value, &str) -> JobResult + Send + Sync + 'static) -> Self {
		self.on_update_name = Some(Arc::new(f));
		self
	}

	pub fn validate(mut self, f: impl Fn(&OutBinding, &Value) -> bool + Send + Sync + 'static) -> Self {
		self.validate = Some(Arc::new(f));
		self
	}

	pub fn always_update(mut self, always: bool) -> Self {
		self.always_update = always;
		self
	}

	pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
		self.initial_value = Some(value.into());
		self
	}

	pub fn blocking(mut self, blocking: bool) -> Self {
		self.blocking = blocking;
		self
	}

	pub fn waveform(mut self, options: WaveformOptions) -> Self {
		self.waveform = Some(options);
		self
	}
}

/// Binding for a record written by external clients.
pub struct OutBinding {
	core: RecordCore,
	/// Committed value in store form; holds the stashed initial value before binding.
	last: ArcSwap<Value>,
	initial_supplied: AtomicBool,
	on_update: Option<UpdateHandler>,
	validate: Option<Validator>,
	always_update: bool,
	blocking: bool,
	enable_write: AtomicBool,
	dispatcher: Arc<dyn Dispatcher>,
}

impl std::fmt::Debug for OutBinding {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OutBinding")
			.field("core", &self.core)
			.field("last", &self.last.load_full())
			.field("on_update", &self.on_update)
			.field("always_update", &self.always_update)
			.field("blocking", &self.blocking)
			.finish_non_exhaustive()
	}
}

/// Sets `enable_write` for the duration of one put and restores it after.
struct WriteGate<'a>(&'a AtomicBool);

impl<'a> WriteGate<'a> {
	fn open(flag: &'a AtomicBool, enabled: bool) -> Self {
		flag.store(enabled, Ordering::Release);
		Self(flag)
	}
}

impl Drop for WriteGate<'_> {
	fn drop(&mut self) {
		self.0.store(true, Ordering::Release);
	}
}

impl OutBinding {
	pub(crate) fn new(
		name: Arc<str>,
		kind: RecordKind,
		options: OutOptions,
		dispatcher: Arc<dyn Dispatcher>,
	) -> Result<Self, BindingError> {
		if kind.direction() != Direction::Out {
			return Err(BindingError::invalid(&name, format!("{kind} is not an output kind")));
		}
		let on_update = match (options.on_update, options.on_update_name) {
			(Some(_), Some(_)) => {
				return Err(BindingError::invalid(&name, "on_update and on_update_name are mutually exclusive"));
			}
			(Some(handler), None) => Some(handler),
			(None, Some(named)) => Some(UpdateHandler::Named(named)),
			(None, None) => None,
		};
		let waveform = Waveform::for_kind(&name, kind, options.waveform, options.initial_value.as_ref())?;
		let core = RecordCore::new(name, kind, waveform);
		let (value, supplied) = match options.initial_value {
			Some(value) => (core.coerce(value)?, true),
			None => (core.default_value(), false),
		};
		Ok(Self {
			core,
			last: ArcSwap::from_pointee(value),
			initial_supplied: AtomicBool::new(supplied),
			on_update,
			validate: options.validate,
			always_update: options.always_update,
			blocking: options.blocking,
			enable_write: AtomicBool::new(true),
			dispatcher,
		})
	}

	pub fn core(&self) -> &RecordCore {
		&self.core
	}

	pub fn name(&self) -> &str {
		self.core.name()
	}

	pub fn is_blocking(&self) -> bool {
		self.blocking
	}

	/// Last committed value, or the value stashed for initialization.
	pub fn get(&self) -> Value {
		self.core.present(Value::clone(&self.last.load()))
	}

	/// Writes a value as an external client would, notifying `on_update`.
	pub fn set(&self, value: impl Into<Value>) -> Result<(), BindingError> {
		self.set_with_process(value, true)
	}

	/// Writes a value; with `process == false` the write skips validation
	/// and notification but still commits.
	///
	/// Before the record is bound the value is kept and written during
	/// initialization instead.
	pub fn set_with_process(&self, value: impl Into<Value>, process: bool) -> Result<(), BindingError> {
		let value = self.core.coerce(value.into())?;
		let store = match self.core.linked() {
			Ok((store, _)) => store,
			Err(StoreError::Unbound(_)) => {
				self.last.store(Arc::new(value));
				self.initial_supplied.store(true, Ordering::Release);
				return Ok(());
			}
			Err(err) => return Err(err.into()),
		};
		let _gate = WriteGate::open(&self.enable_write, process);
		store.put_field(self.name(), value)?;
		Ok(())
	}

	pub(crate) fn init(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> Result<ProcessStatus, BindingError> {
		self.core.bind(store, record)?;
		if !self.initial_supplied.load(Ordering::Acquire) {
			// The record keeps its undefined alarm until first written.
			self.last.store(Arc::new(self.core.default_value()));
			return Ok(self.core.kind().strategy().status);
		}

		let mut value = Value::clone(&self.last.load());
		if let (Some(waveform), Value::Array(array)) = (self.core.waveform(), &value) {
			value = Value::Array(waveform.prepare(array.clone())?);
			self.last.store(Arc::new(value.clone()));
		}
		self.core.write_value(store.as_ref(), record, &value)?;
		if self.core.kind().strategy().has_mlst {
			store.write_field(record, field::MLST, value)?;
		}
		store.write_time(record, Timestamp::now())?;
		store.write_field(record, field::UDF, Value::Long(0))?;
		store.reset_alarms(record)?;
		Ok(self.core.kind().strategy().status)
	}

	/// Handles one write delivered by the store.
	pub fn on_process(&self, store: &Arc<dyn RecordStore>, record: RecordHandle) -> ProcessStatus {
		let new = match self.core.read_value(store.as_ref(), record) {
			Ok(value) => value,
			Err(err) => {
				tracing::error!(record = self.name(), error = %err, "binding.out.read_failed");
				return ProcessStatus::Error;
			}
		};
		let last = self.last.load_full();
		if *last == new && !self.always_update {
			tracing::trace!(record = self.name(), "binding.out.unchanged");
			return ProcessStatus::Ok;
		}

		let writes_enabled = self.enable_write.load(Ordering::Acquire);
		if writes_enabled {
			if let Some(validate) = &self.validate {
				if !self.accepts(validate, &self.core.present(new.clone())) {
					tracing::warn!(record = self.name(), "binding.out.rejected");
					if let Err(err) = self.core.write_value(store.as_ref(), record, &last) {
						tracing::error!(record = self.name(), error = %err, "binding.out.revert_failed");
					}
					return ProcessStatus::Error;
				}
			}
		}

		self.last.store(Arc::new(new.clone()));
		tracing::trace!(record = self.name(), "binding.out.commit");
		if writes_enabled {
			if let Some(handler) = &self.on_update {
				self.notify(handler, store, record, new);
			}
		}
		ProcessStatus::Ok
	}

	fn accepts(&self, validate: &Validator, value: &Value) -> bool {
		match catch_unwind(AssertUnwindSafe(|| validate(self, value))) {
			Ok(accepted) => accepted,
			Err(payload) => {
				tracing::error!(record = self.name(), panic = %panic_message(payload.as_ref()), "binding.out.validator_panicked");
				false
			}
		}
	}

	fn notify(&self, handler: &UpdateHandler, store: &Arc<dyn RecordStore>, record: RecordHandle, value: Value) {
		let mut job = handler.job(self.core.shared_name(), self.core.present(value));
		let mut busy = None;
		if self.blocking {
			match store.mark_busy(record) {
				Ok(token) => {
					busy = Some(token);
					let weak = Arc::downgrade(store);
					job = job.with_completion(move || {
						let Some(store) = weak.upgrade() else {
							anyhow::bail!("record store dropped before release");
						};
						store.release(record, token);
						Ok(())
					});
				}
				Err(err) => tracing::warn!(record = self.name(), error = %err, "binding.out.mark_busy_failed"),
			}
		}
		if let Err(err) = self.dispatcher.schedule(job) {
			tracing::error!(record = self.name(), error = %err, "binding.out.schedule_failed");
			if let Some(token) = busy {
				store.release(record, token);
			}
		}
	}
}
