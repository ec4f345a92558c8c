/// Update poller — long-polls `getUpdates` on a background thread and
/// forwards text messages to the dispatcher.
///
/// # Usage
///
/// ```ignore
/// let poller = start_poller(Arc::clone(&client), PollerOptions::default())?;
/// dispatcher.run(&poller.receiver);
/// ```
///
/// # Failure handling
///
/// A failed poll is logged and retried after `retry_backoff` (or the
/// flood-control delay the API asks for). Nothing short of `stop()` or the
/// receiver being dropped ends the loop.
///
/// # Cancellation
///
/// `stop()` sets a flag checked between polls and every 200 ms while backing
/// off. An in-flight long poll is not interrupted, so shutdown can take up to
/// `long_poll_secs`.
use crate::client::TelegramClient;
use crossbeam_channel::{bounded, Receiver, Sender};
use filewarden_core::model::CommandRequest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Capacity of the request queue between poller and dispatcher.
pub const INBOX_CAPACITY: usize = 256;

/// Granularity of the cancellation check while backing off.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct PollerOptions {
    /// Server-side long-poll duration in seconds.
    pub long_poll_secs: u64,
    /// Delay after a failed poll.
    pub retry_backoff: Duration,
    /// Discard updates queued while the agent was offline.
    pub skip_backlog: bool,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            long_poll_secs: 25,
            retry_backoff: Duration::from_secs(5),
            skip_backlog: true,
        }
    }
}

/// Handle to the running poller.
pub struct PollerHandle {
    /// Write `true` to request the poller thread to exit.
    pub cancel: Arc<AtomicBool>,
    /// Inbound requests, in arrival order.
    pub receiver: Receiver<CommandRequest>,
}

impl PollerHandle {
    /// Signal the poller thread to stop.  Non-blocking.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Start polling on a named background thread.
pub fn start_poller(
    client: Arc<TelegramClient>,
    options: PollerOptions,
) -> std::io::Result<PollerHandle> {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    let (tx, rx) = bounded::<CommandRequest>(INBOX_CAPACITY);

    thread::Builder::new()
        .name("filewarden-poller".to_owned())
        .spawn(move || run_poller(&client, options, &cancel_clone, &tx))?;

    Ok(PollerHandle {
        cancel,
        receiver: rx,
    })
}

// ─── Background thread ──────────────────────────────────────────────────────

fn run_poller(
    client: &TelegramClient,
    options: PollerOptions,
    cancel: &AtomicBool,
    tx: &Sender<CommandRequest>,
) {
    let mut offset = if options.skip_backlog {
        skip_backlog(client)
    } else {
        None
    };

    info!("Poller: listening for commands");
    while !cancel.load(Ordering::Relaxed) {
        match client.get_updates(offset, options.long_poll_secs) {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let Some(request) = update.into_request() else {
                        continue;
                    };
                    if tx.send(request).is_err() {
                        debug!("Poller: dispatcher gone, exiting");
                        return;
                    }
                }
            }
            Err(err) => {
                let wait = err.retry_after().unwrap_or(options.retry_backoff);
                warn!("Poller: getUpdates failed: {err}; retrying in {wait:?}");
                sleep_unless_cancelled(cancel, wait);
            }
        }
    }
    info!("Poller: stopped");
}

/// Acknowledge everything queued before startup; returns the next offset.
fn skip_backlog(client: &TelegramClient) -> Option<i64> {
    match client.get_updates(Some(-1), 0) {
        Ok(updates) => updates.last().map(|last| {
            info!("Poller: discarded backlog up to update {}", last.update_id);
            last.update_id + 1
        }),
        Err(err) => {
            warn!("Poller: could not discard backlog: {err}");
            None
        }
    }
}

/// Sleep for `total`, returning early once `cancel` is set.
fn sleep_unless_cancelled(cancel: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !cancel.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
    }
}
