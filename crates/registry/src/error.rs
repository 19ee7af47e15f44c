use thiserror::Error;

/// Registration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
	/// An entry with this name is already registered.
	#[error("{label}: duplicate name '{name}'")]
	DuplicateName { label: &'static str, name: String },

	/// The directory no longer accepts registrations.
	#[error("{label}: cannot register '{name}' after the directory was frozen")]
	Frozen { label: &'static str, name: String },
}
