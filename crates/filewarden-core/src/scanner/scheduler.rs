/// Scan scheduler — runs [`ChangeDetector::scan_all`] on a fixed interval.
///
/// # Usage
///
/// ```ignore
/// let handle = start_scheduler(Arc::clone(&detector), Duration::from_secs(300))?;
/// // ... process runs ...
/// handle.stop();
/// handle.join();
/// ```
///
/// # Cancellation
///
/// The thread waits on a stop channel with `recv_timeout(interval)` instead of
/// sleeping, so `stop()` (or dropping the handle) wakes it immediately. A pass
/// already in progress finishes first.
use super::ChangeDetector;
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between scheduled passes when none is configured.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Handle to the running scheduler thread.
pub struct SchedulerHandle {
    stop_tx: Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Ask the scheduler to exit after any pass in progress.  Non-blocking.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Wait for the scheduler thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn the scheduler on a named background thread.
///
/// The first pass runs one `interval` after start; the initial snapshot is
/// expected to be recorded beforehand with [`ChangeDetector::prime`].
pub fn start_scheduler(
    detector: Arc<ChangeDetector>,
    interval: Duration,
) -> std::io::Result<SchedulerHandle> {
    let (stop_tx, stop_rx) = bounded::<()>(1);

    let thread = thread::Builder::new()
        .name("filewarden-scheduler".to_owned())
        .spawn(move || {
            info!("Scheduler: scanning {} folder(s) every {interval:?}", detector.folders().len());
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let report = detector.scan_all();
                        let finished: DateTime<Local> =
                            detector.last_pass().unwrap_or_else(Local::now);
                        debug!("Scheduler: pass finished at {finished}, {}", report.summary());
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("Scheduler: stopped");
        })?;

    Ok(SchedulerHandle {
        stop_tx,
        thread: Some(thread),
    })
}
