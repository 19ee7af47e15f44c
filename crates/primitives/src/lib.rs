//! Core types for record bindings: values, arrays, alarms, timestamps and record kinds.

/// Alarm severity and status vocabulary.
pub mod alarm;
/// Fixed-element arrays and element types.
pub mod array;
/// Async future aliases.
pub mod future;
/// Record kinds and their coercion strategies.
pub mod kind;
/// Record timestamps.
pub mod time;
/// Scalar and array values exchanged with records.
pub mod value;

pub use alarm::{AlarmCode, Severity};
pub use array::{Array, ElementType};
pub use future::BoxFutureStatic;
pub use kind::{Direction, KindStrategy, ProcessStatus, RecordKind, ValueType};
pub use time::Timestamp;
pub use value::{MarshalError, Value};
