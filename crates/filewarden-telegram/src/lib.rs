/// FileWarden Telegram — the messaging transport.
///
/// Implements the core's [`Transfer`](filewarden_core::gateway::Transfer)
/// trait over the Telegram Bot HTTP API and feeds inbound text messages to
/// the dispatcher as [`CommandRequest`](filewarden_core::model::CommandRequest)s.
///
/// # Modules
///
/// - [`types`] — Serde mirrors of the Bot API objects we read.
/// - [`client`] — Blocking HTTP client: handshake, polling, sends.
/// - [`poller`] — Background long-polling thread.
pub mod client;
pub mod poller;
pub mod types;

pub use client::{split_message, TelegramClient, TelegramError, MAX_MESSAGE_CHARS};
pub use poller::{start_poller, PollerHandle, PollerOptions};
