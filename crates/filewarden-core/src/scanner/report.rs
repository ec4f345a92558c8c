/// Results of a scan pass.
///
/// A [`ScanReport`] is transient: the caller (scheduler or `/check`) reads it
/// to decide what to log or reply, then drops it.
use super::ScanError;
use compact_str::CompactString;
use std::path::PathBuf;

/// A new entry whose notification could not be delivered.
#[derive(Debug, Clone)]
pub struct SendFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of scanning one folder.
#[derive(Debug, Clone, Default)]
pub struct FolderScan {
    pub folder: PathBuf,
    /// Names that appeared since the previous pass, sorted.
    pub new_entries: Vec<CompactString>,
    /// Notifications that failed for some of `new_entries`.
    pub failures: Vec<SendFailure>,
}

impl FolderScan {
    pub fn has_changes(&self) -> bool {
        !self.new_entries.is_empty()
    }
}

/// Outcome of scanning every watched folder once.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub folders: Vec<FolderScan>,
    pub errors: Vec<ScanError>,
}

impl ScanReport {
    /// `true` if any folder had new entries.
    pub fn has_changes(&self) -> bool {
        self.folders.iter().any(FolderScan::has_changes)
    }

    pub fn new_entry_count(&self) -> usize {
        self.folders.iter().map(|f| f.new_entries.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.folders.iter().map(|f| f.failures.len()).sum()
    }

    /// One-line summary suitable for a chat reply or a log line.
    pub fn summary(&self) -> String {
        let mut line = if self.has_changes() {
            format!(
                "{} new entr{} found",
                self.new_entry_count(),
                if self.new_entry_count() == 1 { "y" } else { "ies" }
            )
        } else {
            "no new files".to_owned()
        };
        if self.failure_count() > 0 {
            line.push_str(&format!(", {} failed to send", self.failure_count()));
        }
        if !self.errors.is_empty() {
            line.push_str(&format!(", {} folder(s) unreadable", self.errors.len()));
        }
        line
    }
}
