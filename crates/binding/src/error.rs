//! Error types for record bindings and the record store boundary.

use softpv_primitives::MarshalError;
use softpv_registry::DirectoryError;
use thiserror::Error;

/// Failure reported by a record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
	/// The binding has not been attached to a record yet.
	#[error("binding '{0}' is not bound to a record")]
	Unbound(String),

	/// The store a binding was attached to no longer exists.
	#[error("record store for '{0}' has been dropped")]
	Detached(String),

	#[error("no record named '{0}'")]
	UnknownRecord(String),

	#[error("record '{record}' has no field '{field}'")]
	UnknownField { record: String, field: String },

	/// A field value could not be converted to the field's type.
	#[error("field '{record}.{field}': {source}")]
	FieldType {
		record: String,
		field: String,
		#[source]
		source: MarshalError,
	},

	#[error("record '{0}' already exists")]
	DuplicateRecord(String),

	/// Processing of the record is already in flight.
	#[error("record '{0}' is busy")]
	Busy(String),

	/// No device support is registered under this name.
	#[error("no device support registered for '{0}'")]
	NoSupport(String),

	/// Device support rejected a record during initialization.
	#[error("initialization of '{record}' failed: {message}")]
	Init { record: String, message: String },
}

/// Failure raised by binding construction or by value writes.
///
/// Every variant is raised before the record store is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
	#[error("record '{0}' is already registered")]
	DuplicateName(String),

	/// Registration was attempted after the record set was loaded.
	#[error("cannot register '{0}': record set is frozen")]
	Frozen(String),

	#[error("record '{0}' is already bound to the store")]
	AlreadyBound(String),

	#[error("invalid options for '{name}': {reason}")]
	InvalidOptions { name: String, reason: String },

	#[error("array of {len} elements exceeds capacity {capacity}")]
	Capacity { len: usize, capacity: usize },

	#[error("no binding registered for record '{0}'")]
	UnknownRecord(String),

	#[error(transparent)]
	Marshal(MarshalError),

	#[error(transparent)]
	Store(#[from] StoreError),
}

impl BindingError {
	pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
		Self::InvalidOptions {
			name: name.to_string(),
			reason: reason.into(),
		}
	}
}

impl From<MarshalError> for BindingError {
	fn from(err: MarshalError) -> Self {
		match err {
			MarshalError::Capacity { len, capacity } => Self::Capacity { len, capacity },
			other => Self::Marshal(other),
		}
	}
}

impl From<DirectoryError> for BindingError {
	fn from(err: DirectoryError) -> Self {
		match err {
			DirectoryError::DuplicateName { name, .. } => Self::DuplicateName(name),
			DirectoryError::Frozen { name, .. } => Self::Frozen(name),
		}
	}
}
