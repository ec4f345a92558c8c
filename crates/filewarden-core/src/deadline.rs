/// Deadline-bounded execution of blocking operations.
///
/// Filesystem listings and transport sends are blocking calls that can stall
/// indefinitely (a hung NFS mount, a dead TCP peer). [`run_with_deadline`]
/// moves the call onto a short-lived named worker thread and waits for its
/// result on a `bounded(1)` crossbeam channel with `recv_timeout`.
///
/// # Abandoned workers
///
/// Rust threads cannot be killed. When the deadline expires the worker is
/// detached: its eventual result is sent into a channel nobody reads and is
/// dropped. The caller is unblocked either way.
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DeadlineError {
    /// The operation did not finish within the allowed time.
    #[error("timed out after {0:?}")]
    Elapsed(Duration),
    /// The worker thread exited without producing a result (it panicked).
    #[error("worker thread stopped before producing a result")]
    WorkerLost,
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Run `op` on a worker thread named `filewarden-<label>`, waiting at most `timeout`.
pub fn run_with_deadline<T, F>(label: &str, timeout: Duration, op: F) -> Result<T, DeadlineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = bounded::<T>(1);

    thread::Builder::new()
        .name(format!("filewarden-{label}"))
        .spawn(move || {
            // The receiver is gone if the caller already gave up.
            let _ = tx.send(op());
        })
        .map_err(DeadlineError::Spawn)?;

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(RecvTimeoutError::Timeout) => {
            warn!("Deadline: {label} exceeded {timeout:?}; abandoning worker");
            Err(DeadlineError::Elapsed(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(DeadlineError::WorkerLost),
    }
}
