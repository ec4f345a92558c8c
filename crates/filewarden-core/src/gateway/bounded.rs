/// Deadline-bounded [`Transfer`] wrapper.
///
/// Wraps any gateway so each `send_*` call runs under
/// [`run_with_deadline`](crate::deadline::run_with_deadline). A hung transport
/// then costs the scan pass at most one timeout per file instead of stalling
/// the scheduler and the dispatcher forever.
use super::{Transfer, TransferError};
use crate::deadline::{run_with_deadline, DeadlineError};
use crate::model::UserId;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct DeadlineTransfer {
    inner: Arc<dyn Transfer>,
    timeout: Duration,
}

impl DeadlineTransfer {
    pub fn new(inner: Arc<dyn Transfer>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Transfer for DeadlineTransfer {
    fn send_message(&self, to: UserId, text: &str) -> Result<(), TransferError> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_owned();
        run_with_deadline("send-message", self.timeout, move || {
            inner.send_message(to, &text)
        })
        .map_err(into_transfer_error)?
    }

    fn send_file(&self, to: UserId, path: &Path, caption: Option<&str>) -> Result<(), TransferError> {
        let inner = Arc::clone(&self.inner);
        let path = path.to_path_buf();
        let caption = caption.map(str::to_owned);
        run_with_deadline("send-file", self.timeout, move || {
            inner.send_file(to, &path, caption.as_deref())
        })
        .map_err(into_transfer_error)?
    }
}

fn into_transfer_error(err: DeadlineError) -> TransferError {
    match err {
        DeadlineError::Elapsed(t) => TransferError::TimedOut(t),
        other => TransferError::Disconnected(other.to_string()),
    }
}
