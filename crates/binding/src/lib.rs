//! Record bindings between application code and an external record store.
//!
//! # Role
//!
//! A [`BindingSession`] creates input and output bindings, describes the
//! records that back them, and installs device supports into a
//! [`RecordStore`]. The store calls those supports to initialize and
//! process records; bindings translate each call into a value exchange with
//! application code.
//!
//! - Inputs ([`InBinding`]) publish an immutable [`ValueSlot`] and request an
//!   I/O interrupt scan. Readers always see one complete slot.
//! - Outputs ([`OutBinding`]) commit writes made by external clients,
//!   optionally validating them first, and notify application code through
//!   the session's [`Dispatcher`](softpv_worker::Dispatcher).
//!
//! # Invariants
//!
//! - A binding is attached to at most one record, and only during load.
//! - Names are unique within a session; no binding can be added once the
//!   store has started loading.
//! - A rejected output write leaves both the binding and the record holding
//!   the previous value.
//! - A blocking output stays busy in the store until its update handler has
//!   returned, successfully or not.
//!
//! [`MemoryStore`] is an in-process store that processes records
//! synchronously on the calling thread.

mod binding;
mod error;
mod input;
mod memory;
mod output;
mod record;
mod scan;
mod session;
mod slot;
mod store;
mod waveform;

pub use binding::Binding;
pub use error::{BindingError, StoreError};
pub use input::{InBinding, InOptions};
pub use memory::MemoryStore;
pub use output::{OutBinding, OutOptions, UpdateHandler, Validator};
pub use record::RecordCore;
pub use scan::ScanTrigger;
pub use session::{BindingSession, Phase};
pub use slot::{AtomicSlot, ValueSlot};
pub use softpv_primitives::{AlarmCode, Array, ElementType, MarshalError, ProcessStatus, RecordKind, Severity, Timestamp, Value};
pub use store::{BindingId, CompletionToken, DeviceSupport, InterruptHandle, RecordHandle, RecordSpec, RecordStore, field};
pub use waveform::{DEFAULT_LONG_STRING_CAPACITY, Waveform, WaveformOptions};
