//! Name directory for record bindings.
//!
//! # Role
//!
//! A [`Directory`] maps unique names to entries and assigns each entry a
//! dense [`EntryId`] in registration order. It is append-only while a
//! record set is being built and frozen once the record store has loaded.
//!
//! # Invariants
//!
//! - Concurrent registrations are linearizable: no registration is lost
//!   (see `tests::concurrent_registrations_are_not_lost`).
//! - Ids are never reused or reassigned; an id resolves to the same entry
//!   for the directory's lifetime.
//! - Readers never block writers; a [`Snapshot`] stays valid after later
//!   registrations publish a new one.

mod directory;
mod error;
mod snapshot;

pub use directory::Directory;
pub use error::DirectoryError;
pub use snapshot::{Entry, EntryId, Snapshot};
