/// Directory snapshot store — the last-known top-level entry names of every
/// watched folder.
///
/// One store exists per process. It is shared (`Arc<SnapshotStore>`) between
/// the scan scheduler thread and the dispatcher thread, and is the only
/// mutable state those two paths have in common.
///
/// # Locking
///
/// A single `parking_lot::Mutex` guards the whole map. Every operation holds
/// it only for the duration of one map lookup or insert, so a `replace` is
/// observed by other threads either entirely or not at all. Serialising the
/// longer list-diff-replace sequence of a scan is the job of the change
/// detector's per-folder locks, not of this store.
use compact_str::CompactString;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Set of entry names observed in one folder.
pub type EntrySet = HashSet<CompactString>;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    folders: Mutex<HashMap<PathBuf, EntrySet>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries last recorded for `folder`; empty if the folder was never recorded.
    pub fn get(&self, folder: &Path) -> EntrySet {
        self.folders.lock().get(folder).cloned().unwrap_or_default()
    }

    /// Atomically overwrite the entry set of `folder`.
    pub fn replace(&self, folder: &Path, entries: EntrySet) {
        self.folders.lock().insert(folder.to_path_buf(), entries);
    }

    /// Drop a single name from `folder`'s entry set.
    ///
    /// Returns `true` if the name was present. Used when a failed send must
    /// be retried on the next pass.
    pub fn forget(&self, folder: &Path, name: &str) -> bool {
        self.folders
            .lock()
            .get_mut(folder)
            .is_some_and(|entries| entries.remove(name))
    }

    /// Number of entries recorded for `folder` (0 if never recorded).
    pub fn entry_count(&self, folder: &Path) -> usize {
        self.folders.lock().get(folder).map_or(0, HashSet::len)
    }

    /// `true` if no folder has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.folders.lock().is_empty()
    }
}

/// Build an [`EntrySet`] from anything yielding string-like names.
pub fn entry_set<I, S>(names: I) -> EntrySet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| CompactString::new(n.as_ref()))
        .collect()
}
