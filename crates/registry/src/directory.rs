use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::DirectoryError;
use crate::snapshot::{Entry, EntryId, Snapshot};

/// Append-only, freezable name directory.
///
/// Writes copy the current snapshot, extend it, and publish with a
/// compare-and-swap, retrying when another writer won the race. Reads load
/// the current snapshot without locking.
pub struct Directory<T> {
	label: &'static str,
	snap: ArcSwap<Snapshot<T>>,
}

impl<T> std::fmt::Debug for Directory<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let snap = self.snap.load();
		f.debug_struct("Directory")
			.field("label", &self.label)
			.field("len", &snap.len())
			.field("frozen", &snap.frozen)
			.finish()
	}
}

impl<T> Directory<T> {
	/// Creates an empty directory. `label` names it in errors and logs.
	pub fn new(label: &'static str) -> Self {
		Self {
			label,
			snap: ArcSwap::from_pointee(Snapshot::default()),
		}
	}

	pub fn label(&self) -> &'static str {
		self.label
	}

	/// Registers `value` under `name`, returning the new entry.
	pub fn register(&self, name: impl Into<Arc<str>>, value: T) -> Result<Entry<T>, DirectoryError> {
		let name = name.into();
		let value = Arc::new(value);

		loop {
			let old = self.snap.load_full();
			if old.frozen {
				return Err(DirectoryError::Frozen {
					label: self.label,
					name: name.to_string(),
				});
			}
			if old.by_name.contains_key(&*name) {
				return Err(DirectoryError::DuplicateName {
					label: self.label,
					name: name.to_string(),
				});
			}

			let entry = Entry {
				id: EntryId::from_u32(old.table.len() as u32),
				name: Arc::clone(&name),
				value: Arc::clone(&value),
			};

			let mut table = old.table.to_vec();
			table.push(entry.clone());
			let mut by_name = (*old.by_name).clone();
			by_name.insert(Arc::clone(&name), entry.id);

			let next = Arc::new(Snapshot {
				table: Arc::from(table),
				by_name: Arc::new(by_name),
				frozen: false,
			});
			let prev = self.snap.compare_and_swap(&old, next);
			if Arc::ptr_eq(&prev, &old) {
				tracing::trace!(directory = self.label, name = %entry.name, id = entry.id.as_u32(), "directory.register");
				return Ok(entry);
			}
		}
	}

	/// Stops accepting registrations. Returns `false` if already frozen.
	pub fn freeze(&self) -> bool {
		loop {
			let old = self.snap.load_full();
			if old.frozen {
				return false;
			}
			let next = Arc::new(Snapshot {
				frozen: true,
				..(*old).clone()
			});
			let prev = self.snap.compare_and_swap(&old, next);
			if Arc::ptr_eq(&prev, &old) {
				tracing::debug!(directory = self.label, entries = old.len(), "directory.freeze");
				return true;
			}
		}
	}

	pub fn is_frozen(&self) -> bool {
		self.snap.load().frozen
	}

	/// Looks up an entry by name.
	#[inline]
	pub fn get(&self, name: &str) -> Option<Arc<T>> {
		self.snap.load().get(name).map(|entry| Arc::clone(&entry.value))
	}

	/// Looks up an entry by id.
	#[inline]
	pub fn get_by_id(&self, id: EntryId) -> Option<Arc<T>> {
		self.snap.load().get_by_id(id).map(|entry| Arc::clone(&entry.value))
	}

	pub fn id_of(&self, name: &str) -> Option<EntryId> {
		self.snap.load().by_name.get(name).copied()
	}

	/// Returns the current snapshot for iteration.
	pub fn snapshot(&self) -> Arc<Snapshot<T>> {
		self.snap.load_full()
	}

	pub fn len(&self) -> usize {
		self.snap.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
