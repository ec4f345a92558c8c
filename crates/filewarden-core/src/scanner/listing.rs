/// Top-level directory listing.
///
/// Only the immediate children of a watched folder are tracked; nothing is
/// walked recursively here. Names that are not valid UTF-8 are converted
/// lossily so they can still be shown and diffed.
use crate::deadline::{run_with_deadline, DeadlineError};
use crate::model::EntrySet;
use compact_str::CompactString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A watched folder could not be listed. Never fatal: the folder is skipped
/// for the current pass and the error is reported.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("folder not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("listing {} timed out after {timeout:?}", path.display())]
    TimedOut { path: PathBuf, timeout: Duration },
    #[error("listing {} failed: {reason}", path.display())]
    Worker { path: PathBuf, reason: String },
    /// An earlier listing of this folder timed out and its worker is still stuck.
    #[error("previous listing of {} has not returned yet; skipped", .0.display())]
    Busy(PathBuf),
}

impl ScanError {
    fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// List the entry names directly inside `folder`.
pub fn list_entries(folder: &Path) -> Result<EntrySet, ScanError> {
    let mut names = EntrySet::new();
    for entry in fs::read_dir(folder).map_err(|e| ScanError::from_io(folder, e))? {
        let entry = entry.map_err(|e| ScanError::from_io(folder, e))?;
        names.insert(CompactString::new(entry.file_name().to_string_lossy()));
    }
    Ok(names)
}

/// [`list_entries`] under a deadline.
pub fn list_entries_within(folder: &Path, timeout: Duration) -> Result<EntrySet, ScanError> {
    let owned = folder.to_path_buf();
    run_with_deadline("list-folder", timeout, move || list_entries(&owned))
        .map_err(|err| deadline_error(folder, err))?
}

/// Tracks whether a listing worker for one folder is still alive.
///
/// A worker abandoned after its deadline keeps the slot occupied until it
/// finally returns, so a hung mount costs at most one stuck thread.
#[derive(Debug, Default)]
pub struct ListingSlot {
    running: Arc<AtomicBool>,
}

impl ListingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a worker (finished or abandoned) has not returned.
    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// [`list_entries_within`], refusing to start while a previous worker for
    /// this slot is still running.
    pub fn list(&self, folder: &Path, timeout: Duration) -> Result<EntrySet, ScanError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ScanError::Busy(folder.to_path_buf()));
        }
        // Released when the closure is dropped: after the listing returns,
        // on panic, or right away if the worker could not be spawned.
        let release = SlotRelease(Arc::clone(&self.running));
        let owned = folder.to_path_buf();
        run_with_deadline("list-folder", timeout, move || {
            let _release = release;
            list_entries(&owned)
        })
        .map_err(|err| deadline_error(folder, err))?
    }
}

struct SlotRelease(Arc<AtomicBool>);

impl Drop for SlotRelease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn deadline_error(folder: &Path, err: DeadlineError) -> ScanError {
    match err {
        DeadlineError::Elapsed(timeout) => ScanError::TimedOut {
            path: folder.to_path_buf(),
            timeout,
        },
        other => ScanError::Worker {
            path: folder.to_path_buf(),
            reason: other.to_string(),
        },
    }
}
