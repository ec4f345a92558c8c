/// Transfer gateway — the outbound half of the messaging transport.
///
/// The core never talks to a network directly. New-file notifications,
/// command replies, downloads and archives all leave through [`Transfer`].
/// Every call is attempted once; failures are surfaced to the caller and
/// never retried here.
pub mod bounded;

pub use bounded::DeadlineTransfer;

use crate::model::UserId;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Send capability over the messaging channel.
pub trait Transfer: Send + Sync {
    /// Deliver a text message to `to`.
    fn send_message(&self, to: UserId, text: &str) -> Result<(), TransferError>;

    /// Deliver the file at `path` to `to`, optionally with a caption.
    fn send_file(&self, to: UserId, path: &Path, caption: Option<&str>) -> Result<(), TransferError>;
}

/// A failed send.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The local file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The remote API rejected the request.
    #[error("API error: {0}")]
    Api(String),
    /// The request never reached the API (connection, TLS, decoding).
    #[error("HTTP error: {0}")]
    Http(String),
    /// The send did not complete within the configured deadline.
    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
    /// The send worker died or could not be started; the transport is
    /// unreachable from this call.
    #[error("transport disconnected: {0}")]
    Disconnected(String),
}
