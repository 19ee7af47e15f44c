//! Immutable views of a directory.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Dense index of an entry, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
	pub const fn from_u32(raw: u32) -> Self {
		Self(raw)
	}

	pub const fn as_u32(self) -> u32 {
		self.0
	}

	pub const fn index(self) -> usize {
		self.0 as usize
	}
}

impl std::fmt::Display for EntryId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// A registered entry.
pub struct Entry<T> {
	pub id: EntryId,
	pub name: Arc<str>,
	pub value: Arc<T>,
}

impl<T> Clone for Entry<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			name: Arc::clone(&self.name),
			value: Arc::clone(&self.value),
		}
	}
}

impl<T> std::fmt::Debug for Entry<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Entry").field("id", &self.id).field("name", &self.name).finish_non_exhaustive()
	}
}

/// Point-in-time contents of a directory.
///
/// Holding a snapshot keeps every entry in it alive, even after the
/// directory has published newer snapshots.
pub struct Snapshot<T> {
	pub(crate) table: Arc<[Entry<T>]>,
	pub(crate) by_name: Arc<FxHashMap<Arc<str>, EntryId>>,
	pub(crate) frozen: bool,
}

impl<T> Clone for Snapshot<T> {
	fn clone(&self) -> Self {
		Self {
			table: Arc::clone(&self.table),
			by_name: Arc::clone(&self.by_name),
			frozen: self.frozen,
		}
	}
}

impl<T> Default for Snapshot<T> {
	fn default() -> Self {
		Self {
			table: Arc::from(Vec::new()),
			by_name: Arc::new(FxHashMap::default()),
			frozen: false,
		}
	}
}

impl<T> Snapshot<T> {
	pub fn get(&self, name: &str) -> Option<&Entry<T>> {
		let id = *self.by_name.get(name)?;
		self.table.get(id.index())
	}

	pub fn get_by_id(&self, id: EntryId) -> Option<&Entry<T>> {
		self.table.get(id.index())
	}

	/// Entries in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
		self.table.iter()
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}

	pub fn is_frozen(&self) -> bool {
		self.frozen
	}
}
