/// Scanner module — folder change detection and scheduling.
///
/// Two call paths drive the same [`ChangeDetector`]:
/// - the **scheduler** thread, every `check_interval`;
/// - the **dispatcher** thread, synchronously, when `/check` arrives.
///
/// Both read and write the shared [`SnapshotStore`](crate::model::SnapshotStore).
/// The detector serialises each folder's list-diff-replace sequence behind a
/// per-folder lock, so two passes can never both report the same new entry.
pub mod detector;
pub mod listing;
pub mod report;
pub mod scheduler;

pub use detector::{ChangeDetector, DetectorOptions, DEFAULT_LISTING_TIMEOUT};
pub use listing::{list_entries, ScanError};
pub use report::{FolderScan, ScanReport, SendFailure};
pub use scheduler::{start_scheduler, SchedulerHandle, DEFAULT_CHECK_INTERVAL};
