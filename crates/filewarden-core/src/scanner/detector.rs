/// Change detector — diffs fresh folder listings against the snapshot store
/// and pushes newly appeared entries to the authorized identity.
///
/// # Per-folder critical section
///
/// For one folder, the sequence *list → read snapshot → diff → replace* runs
/// under that folder's own `Mutex<()>`. A second pass for the same folder
/// (scheduler vs. `/check`) waits, then lists again and diffs against the
/// snapshot the first pass just wrote, so a new entry is claimed by exactly
/// one pass. Different folders never contend with each other.
///
/// Sends happen *after* the lock is released: a slow transfer only delays
/// the pass that owns the new entries, never the snapshot itself.
///
/// # Send-failure policy
///
/// With `advance_on_send_failure = true` a name whose notification failed
/// stays in the snapshot and is not reported again. With `false` the name is
/// forgotten (under the folder lock) so the next pass re-reports it if the
/// entry still exists. A send that hit its deadline is never forgotten: the
/// abandoned worker may still deliver it.
///
/// # Hung folders
///
/// Each folder owns a [`ListingSlot`]. While a listing worker abandoned after
/// its deadline is still stuck, further passes skip that folder with
/// [`ScanError::Busy`] instead of piling up more stuck threads.
use super::listing::{list_entries_within, ListingSlot, ScanError};
use super::report::{FolderScan, ScanReport, SendFailure};
use crate::gateway::{Transfer, TransferError};
use crate::model::{EntrySet, SnapshotStore, UserId};
use chrono::{DateTime, Local};
use compact_str::CompactString;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default upper bound for a single folder listing.
pub const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the change detector.
#[derive(Debug, Clone, Copy)]
pub struct DetectorOptions {
    /// Upper bound for one folder listing.
    pub listing_timeout: Duration,
    /// Keep a name in the snapshot even when its notification failed.
    pub advance_on_send_failure: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            listing_timeout: DEFAULT_LISTING_TIMEOUT,
            advance_on_send_failure: true,
        }
    }
}

/// Per-folder serialisation state.
#[derive(Default)]
struct FolderGuard {
    lock: Mutex<()>,
    listing: ListingSlot,
}

pub struct ChangeDetector {
    folders: Vec<PathBuf>,
    /// One guard per watched folder; the folder set is fixed at construction.
    guards: HashMap<PathBuf, FolderGuard>,
    store: Arc<SnapshotStore>,
    gateway: Arc<dyn Transfer>,
    admin: UserId,
    options: DetectorOptions,
    last_pass: Mutex<Option<DateTime<Local>>>,
}

impl ChangeDetector {
    pub fn new(
        folders: Vec<PathBuf>,
        store: Arc<SnapshotStore>,
        gateway: Arc<dyn Transfer>,
        admin: UserId,
        options: DetectorOptions,
    ) -> Self {
        let guards = folders
            .iter()
            .map(|f| (f.clone(), FolderGuard::default()))
            .collect();
        Self {
            folders,
            guards,
            store,
            gateway,
            admin,
            options,
            last_pass: Mutex::new(None),
        }
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn options(&self) -> DetectorOptions {
        self.options
    }

    /// Completion time of the most recent `scan_all` pass.
    pub fn last_pass(&self) -> Option<DateTime<Local>> {
        *self.last_pass.lock()
    }

    /// Record the initial snapshot of every folder without sending anything.
    ///
    /// Entries present at startup are treated as already known. A folder that
    /// cannot be listed now keeps an empty snapshot, so everything it holds
    /// once it becomes readable is reported as new.
    pub fn prime(&self) -> Vec<ScanError> {
        let mut errors = Vec::new();
        for folder in &self.folders {
            let Some(guard) = self.guards.get(folder) else {
                continue;
            };
            let _locked = guard.lock.lock();
            match guard.listing.list(folder, self.options.listing_timeout) {
                Ok(entries) => {
                    debug!("Scan: baseline {} entries in {}", entries.len(), folder.display());
                    self.store.replace(folder, entries);
                }
                Err(err) => {
                    warn!("Scan: could not record baseline for {}: {err}", folder.display());
                    self.store.replace(folder, EntrySet::new());
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// Scan one watched folder: diff, update the snapshot, push new entries.
    ///
    /// Folders outside the watched set are scanned without a lock; this only
    /// happens in tests and tooling.
    pub fn scan(&self, folder: &Path) -> Result<FolderScan, ScanError> {
        let new_entries = match self.guards.get(folder) {
            Some(guard) => {
                let _locked = guard.lock.lock();
                let current = guard.listing.list(folder, self.options.listing_timeout)?;
                self.diff_and_replace(folder, current)
            }
            None => {
                let current = list_entries_within(folder, self.options.listing_timeout)?;
                self.diff_and_replace(folder, current)
            }
        };

        let mut scan = FolderScan {
            folder: folder.to_path_buf(),
            new_entries,
            failures: Vec::new(),
        };

        for name in &scan.new_entries {
            if let Err((failure, err)) = self.notify_new_entry(folder, name) {
                if !self.options.advance_on_send_failure {
                    if matches!(err, TransferError::TimedOut(_)) {
                        warn!(
                            "Scan: {name} in {} may still be delivered late; not retrying",
                            folder.display()
                        );
                    } else {
                        self.unclaim(folder, name);
                    }
                }
                scan.failures.push(failure);
            }
        }

        Ok(scan)
    }

    /// Run [`scan`](Self::scan) over every watched folder once.
    ///
    /// Per-folder failures are collected into the report; nothing here aborts
    /// the pass.
    pub fn scan_all(&self) -> ScanReport {
        let mut report = ScanReport::default();
        for folder in &self.folders {
            match self.scan(folder) {
                Ok(scan) => report.folders.push(scan),
                Err(err) => {
                    warn!("Scan: skipping {}: {err}", folder.display());
                    report.errors.push(err);
                }
            }
        }
        *self.last_pass.lock() = Some(Local::now());

        if report.has_changes() {
            info!("Scan: pass complete, {}", report.summary());
        } else {
            debug!("Scan: pass complete, {}", report.summary());
        }
        report
    }

    /// Diff `current` against the snapshot and replace it. Must run under the
    /// folder's lock when the folder is watched. Returns the sorted new names.
    fn diff_and_replace(&self, folder: &Path, current: EntrySet) -> Vec<CompactString> {
        let known = self.store.get(folder);
        let mut fresh: Vec<CompactString> = current.difference(&known).cloned().collect();
        fresh.sort_unstable();
        self.store.replace(folder, current);
        fresh
    }

    /// Live listing of a watched folder, sharing the scan's lock and slot.
    pub fn list_folder(&self, folder: &Path) -> Result<EntrySet, ScanError> {
        match self.guards.get(folder) {
            Some(guard) => {
                let _locked = guard.lock.lock();
                guard.listing.list(folder, self.options.listing_timeout)
            }
            None => list_entries_within(folder, self.options.listing_timeout),
        }
    }

    fn notify_new_entry(&self, folder: &Path, name: &str) -> Result<(), (SendFailure, TransferError)> {
        let path = folder.join(name);

        // Directories cannot be uploaded as documents; announce them instead.
        let sent = if path.is_dir() {
            self.gateway
                .send_message(self.admin, &format!("New folder created: {}", path.display()))
        } else {
            let caption = format!("New file created: {}", path.display());
            self.gateway.send_file(self.admin, &path, Some(&caption))
        };

        match sent {
            Ok(()) => {
                info!("New file sent: {}", path.display());
                Ok(())
            }
            Err(err) => {
                error!("Error sending file: {} - {err}", path.display());
                let report = format!("Error sending file: {err}");
                if let Err(notify_err) = self.gateway.send_message(self.admin, &report) {
                    warn!("Could not report send failure to admin: {notify_err}");
                }
                let failure = SendFailure {
                    path,
                    message: err.to_string(),
                };
                Err((failure, err))
            }
        }
    }

    fn unclaim(&self, folder: &Path, name: &str) {
        let forgotten = match self.guards.get(folder) {
            Some(guard) => {
                let _locked = guard.lock.lock();
                self.store.forget(folder, name)
            }
            None => self.store.forget(folder, name),
        };
        if forgotten {
            debug!("Scan: {name} in {} will be retried next pass", folder.display());
        }
    }
}
