/// End-to-end change-detection tests.
///
/// These run the real `ChangeDetector` and scheduler against temporary
/// directories, with a recording gateway standing in for the transport.
mod common;

use common::{touch, RecordingTransfer, Sent, ADMIN};
use filewarden_core::gateway::{DeadlineTransfer, Transfer, TransferError};
use filewarden_core::model::{entry_set, SnapshotStore};
use filewarden_core::scanner::{list_entries, start_scheduler, ChangeDetector, DetectorOptions};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn build_detector(
    folders: Vec<PathBuf>,
    gateway: Arc<dyn Transfer>,
    options: DetectorOptions,
) -> Arc<ChangeDetector> {
    Arc::new(ChangeDetector::new(
        folders,
        Arc::new(SnapshotStore::new()),
        gateway,
        ADMIN,
        options,
    ))
}

fn primed(folder: &TempDir, gateway: &Arc<RecordingTransfer>) -> Arc<ChangeDetector> {
    let detector = build_detector(
        vec![folder.path().to_path_buf()],
        Arc::clone(gateway) as Arc<dyn Transfer>,
        DetectorOptions::default(),
    );
    assert!(detector.prime().is_empty());
    detector
}

fn names(entries: &[compact_str::CompactString]) -> Vec<String> {
    entries.iter().map(|n| n.to_string()).collect()
}

// ── Diffing ──────────────────────────────────────────────────────────────────

/// Two scans with no filesystem change in between report nothing and leave
/// the snapshot untouched.
#[test]
fn no_op_scan_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("a.txt"));
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);

    let before = detector.store().get(tmp.path());
    let first = detector.scan(tmp.path()).unwrap();
    let second = detector.scan(tmp.path()).unwrap();

    assert!(!first.has_changes());
    assert!(!second.has_changes());
    assert_eq!(detector.store().get(tmp.path()), before);
    assert!(gw.sent().is_empty());
}

/// Stored {a,b}, listing {a,b,c,d}: exactly c and d are new, and the
/// snapshot becomes the full listing.
#[test]
fn diff_reports_only_new_entries() {
    let tmp = TempDir::new().unwrap();
    for n in ["a", "b", "c", "d"] {
        touch(&tmp.path().join(n));
    }
    let gw = Arc::new(RecordingTransfer::new());
    let detector = build_detector(
        vec![tmp.path().to_path_buf()],
        Arc::clone(&gw) as Arc<dyn Transfer>,
        DetectorOptions::default(),
    );
    detector.store().replace(tmp.path(), entry_set(["a", "b"]));

    let scan = detector.scan(tmp.path()).unwrap();

    assert_eq!(names(&scan.new_entries), vec!["c", "d"]);
    assert_eq!(detector.store().get(tmp.path()), entry_set(["a", "b", "c", "d"]));

    let files = gw.files();
    assert_eq!(files.len(), 2);
    for (path, caption, _) in files {
        let caption = caption.expect("new-file sends carry a caption");
        assert!(caption.starts_with("New file created: "));
        assert!(caption.contains(&path.display().to_string()));
    }
}

/// Entries present at prime time are never reported.
#[test]
fn pre_existing_entries_are_not_new() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("old.txt"));
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);

    touch(&tmp.path().join("new.txt"));
    let report = detector.scan_all();

    assert!(report.has_changes());
    assert_eq!(gw.file_names(), vec!["new.txt"]);
    assert!(detector.last_pass().is_some());
}

/// Removing a file is not a change worth reporting, but the snapshot follows it.
#[test]
fn removed_entries_leave_the_snapshot() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("gone.txt"));
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);

    fs::remove_file(tmp.path().join("gone.txt")).unwrap();
    let scan = detector.scan(tmp.path()).unwrap();

    assert!(!scan.has_changes());
    assert!(detector.store().get(tmp.path()).is_empty());
}

/// A new subdirectory is announced with a text message instead of an upload.
#[test]
fn new_directory_is_announced_as_message() {
    let tmp = TempDir::new().unwrap();
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);

    fs::create_dir(tmp.path().join("album")).unwrap();
    touch(&tmp.path().join("album").join("inner.jpg"));
    let scan = detector.scan(tmp.path()).unwrap();

    assert_eq!(names(&scan.new_entries), vec!["album"]);
    assert!(gw.files().is_empty());
    let messages = gw.messages_to(ADMIN);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("New folder created: "));
}

/// A folder missing at startup is diffed against an empty snapshot once it
/// appears, so everything it holds is reported exactly once.
#[test]
fn folder_missing_at_startup_reports_contents_when_it_appears() {
    let root = TempDir::new().unwrap();
    let late = root.path().join("late");
    let gw = Arc::new(RecordingTransfer::new());
    let detector = build_detector(
        vec![late.clone()],
        Arc::clone(&gw) as Arc<dyn Transfer>,
        DetectorOptions::default(),
    );
    assert_eq!(detector.prime().len(), 1);

    touch(&late.join("arrived.mp4"));
    let first = detector.scan_all();
    assert!(first.errors.is_empty());
    assert_eq!(first.new_entry_count(), 1);

    let second = detector.scan_all();
    assert_eq!(second.new_entry_count(), 0);
    assert_eq!(gw.file_names(), vec!["arrived.mp4"]);
}

/// Without a prior snapshot every listed entry is new.
#[test]
fn unprimed_folder_diffs_against_empty_snapshot() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("x.txt"));
    let gw = Arc::new(RecordingTransfer::new());
    let detector = build_detector(
        vec![tmp.path().to_path_buf()],
        Arc::clone(&gw) as Arc<dyn Transfer>,
        DetectorOptions::default(),
    );

    let scan = detector.scan(tmp.path()).unwrap();
    assert_eq!(names(&scan.new_entries), vec!["x.txt"]);
    assert_eq!(detector.store().get(tmp.path()), entry_set(["x.txt"]));
}

// ── Failure handling ─────────────────────────────────────────────────────────

/// Default policy: a failed send still advances the snapshot, the admin is
/// told about the failure, and the file is not re-reported.
#[test]
fn snapshot_advances_even_when_send_fails() {
    let tmp = TempDir::new().unwrap();
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);

    touch(&tmp.path().join("broken.bin"));
    touch(&tmp.path().join("fine.bin"));
    gw.fail_file("broken.bin");

    let scan = detector.scan(tmp.path()).unwrap();
    assert_eq!(scan.new_entries.len(), 2);
    assert_eq!(scan.failures.len(), 1);
    assert!(scan.failures[0].path.ends_with("broken.bin"));

    // The other file in the same folder was still sent.
    assert_eq!(gw.file_names(), vec!["fine.bin"]);
    let notes = gw.messages_to(ADMIN);
    assert_eq!(notes.len(), 1);
    assert!(notes[0].starts_with("Error sending file: "));

    assert!(detector.store().get(tmp.path()).contains("broken.bin"));
    gw.heal();
    assert!(!detector.scan(tmp.path()).unwrap().has_changes());
}

/// With `advance_on_send_failure = false` the failed name is retried next pass.
#[test]
fn failed_send_is_retried_when_advance_disabled() {
    let tmp = TempDir::new().unwrap();
    let gw = Arc::new(RecordingTransfer::new());
    let detector = build_detector(
        vec![tmp.path().to_path_buf()],
        Arc::clone(&gw) as Arc<dyn Transfer>,
        DetectorOptions {
            advance_on_send_failure: false,
            ..DetectorOptions::default()
        },
    );
    detector.prime();

    touch(&tmp.path().join("retry.bin"));
    gw.fail_all_files();
    let first = detector.scan(tmp.path()).unwrap();
    assert_eq!(first.failures.len(), 1);
    assert!(!detector.store().get(tmp.path()).contains("retry.bin"));

    gw.heal();
    let second = detector.scan(tmp.path()).unwrap();
    assert_eq!(names(&second.new_entries), vec!["retry.bin"]);
    assert!(second.failures.is_empty());
    assert_eq!(gw.file_names(), vec!["retry.bin"]);
}

/// An unreadable folder is skipped and reported; the others are still scanned.
#[test]
fn unreadable_folder_does_not_abort_the_pass() {
    let good = TempDir::new().unwrap();
    let doomed = TempDir::new().unwrap();
    let gw = Arc::new(RecordingTransfer::new());
    let detector = build_detector(
        vec![doomed.path().to_path_buf(), good.path().to_path_buf()],
        Arc::clone(&gw) as Arc<dyn Transfer>,
        DetectorOptions::default(),
    );
    detector.prime();

    let doomed_path = doomed.path().to_path_buf();
    doomed.close().unwrap();
    touch(&good.path().join("survivor.txt"));

    let report = detector.scan_all();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].to_string().contains(&doomed_path.display().to_string()));
    assert_eq!(report.new_entry_count(), 1);
    assert_eq!(gw.file_names(), vec!["survivor.txt"]);
}

/// A gateway that hangs is cut off by the deadline wrapper; the pass finishes
/// and the hung send is reported as a timeout.
#[test]
fn hung_gateway_is_bounded_by_deadline() {
    let tmp = TempDir::new().unwrap();
    let slow = Arc::new(RecordingTransfer::new());
    slow.set_delay(Duration::from_secs(2));
    let bounded: Arc<dyn Transfer> = Arc::new(DeadlineTransfer::new(
        Arc::clone(&slow) as Arc<dyn Transfer>,
        Duration::from_millis(50),
    ));
    let detector = build_detector(
        vec![tmp.path().to_path_buf()],
        bounded,
        DetectorOptions::default(),
    );
    detector.prime();

    touch(&tmp.path().join("stuck.mp4"));
    let start = Instant::now();
    let scan = detector.scan(tmp.path()).unwrap();

    // One timed-out file send plus one timed-out failure notice.
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(scan.failures.len(), 1);
    let expected = TransferError::TimedOut(Duration::from_millis(50)).to_string();
    assert_eq!(scan.failures[0].message, expected);
    assert!(detector.store().get(tmp.path()).contains("stuck.mp4"));
}

/// A send that hit its deadline is not retried even when failures are
/// retried: the abandoned worker still completes the upload.
#[test]
fn timed_out_send_is_not_retried() {
    let tmp = TempDir::new().unwrap();
    let slow = Arc::new(RecordingTransfer::new());
    slow.set_delay(Duration::from_millis(300));
    let bounded: Arc<dyn Transfer> = Arc::new(DeadlineTransfer::new(
        Arc::clone(&slow) as Arc<dyn Transfer>,
        Duration::from_millis(50),
    ));
    let detector = build_detector(
        vec![tmp.path().to_path_buf()],
        bounded,
        DetectorOptions {
            advance_on_send_failure: false,
            ..DetectorOptions::default()
        },
    );
    detector.prime();

    touch(&tmp.path().join("x.bin"));
    let first = detector.scan(tmp.path()).unwrap();
    assert_eq!(first.failures.len(), 1);
    assert!(detector.store().get(tmp.path()).contains("x.bin"));

    thread::sleep(Duration::from_millis(600));
    let second = detector.scan(tmp.path()).unwrap();
    assert!(!second.has_changes());
    assert_eq!(slow.file_names(), vec!["x.bin"]);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

/// Two threads scanning the same folder while files keep appearing never
/// report the same name twice, and together they report every file.
#[test]
fn concurrent_scans_never_duplicate_notifications() {
    let tmp = TempDir::new().unwrap();
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);
    let folder = tmp.path().to_path_buf();
    let stop = Arc::new(AtomicBool::new(false));

    let scanners: Vec<_> = (0..2)
        .map(|_| {
            let detector = Arc::clone(&detector);
            let folder = folder.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut reported = Vec::new();
                while !stop.load(Ordering::Relaxed) {
                    let scan = detector.scan(&folder).unwrap();
                    reported.extend(scan.new_entries.iter().map(|n| n.to_string()));
                }
                reported
            })
        })
        .collect();

    let created: Vec<String> = (0..150).map(|i| format!("f{i:03}.txt")).collect();
    for name in &created {
        touch(&folder.join(name));
    }
    stop.store(true, Ordering::Relaxed);

    let mut reported: Vec<String> = scanners
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    reported.extend(names(&detector.scan(&folder).unwrap().new_entries));

    let unique: HashSet<&String> = reported.iter().collect();
    assert_eq!(unique.len(), reported.len(), "a file was reported twice");
    assert_eq!(unique, created.iter().collect::<HashSet<_>>());

    let sent = gw.file_names();
    assert_eq!(sent.len(), created.len());
    assert_eq!(detector.store().get(&folder), list_entries(&folder).unwrap());
}

// ── Scheduler ────────────────────────────────────────────────────────────────

/// The scheduler picks up a new file on its own and stops on request.
#[test]
fn scheduler_runs_passes_until_stopped() {
    let tmp = TempDir::new().unwrap();
    let gw = Arc::new(RecordingTransfer::new());
    let detector = primed(&tmp, &gw);

    let handle = start_scheduler(Arc::clone(&detector), Duration::from_millis(25)).unwrap();
    touch(&tmp.path().join("scheduled.txt"));

    let deadline = Instant::now() + Duration::from_secs(10);
    while gw.file_names().is_empty() {
        assert!(Instant::now() < deadline, "scheduler never reported the new file");
        thread::sleep(Duration::from_millis(10));
    }

    handle.stop();
    handle.join();

    assert!(detector.last_pass().is_some());
    assert_eq!(gw.file_names(), vec!["scheduled.txt"]);
    assert!(gw
        .sent()
        .iter()
        .all(|s| matches!(s, Sent::File { to, .. } if *to == ADMIN)));
}
