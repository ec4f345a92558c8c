//! FileWarden — single-operator folder monitor over a Telegram bot.
//!
//! Thin binary entry point. All logic lives in the `filewarden-core`
//! and `filewarden-telegram` crates.

use anyhow::Context;
use filewarden_core::archive::ArchiveBuilder;
use filewarden_core::config::Settings;
use filewarden_core::dispatch::Dispatcher;
use filewarden_core::gateway::{DeadlineTransfer, Transfer};
use filewarden_core::model::SnapshotStore;
use filewarden_core::scanner::{start_scheduler, ChangeDetector};
use filewarden_telegram::{start_poller, PollerOptions, TelegramClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Settings file used when neither an argument nor the env var names one.
const DEFAULT_SETTINGS_PATH: &str = "settings.json";

fn main() -> anyhow::Result<()> {
    // Initialise structured logging; RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("FileWarden starting");

    let settings_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("FILEWARDEN_SETTINGS"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;

    // Transport handshake. Failure here is fatal; nothing has started yet.
    let client = Arc::new(
        TelegramClient::new(
            &settings.api_base_url,
            &settings.bot_token,
            settings.transfer_timeout(),
        )
        .context("building Telegram client")?,
    );
    let me = client.get_me().context("Telegram handshake (getMe) failed")?;
    tracing::info!("Connected as {}", me.display_name());

    let gateway: Arc<dyn Transfer> = Arc::new(DeadlineTransfer::new(
        Arc::clone(&client) as Arc<dyn Transfer>,
        settings.transfer_timeout(),
    ));

    // Entries that exist right now are treated as already known.
    let detector = Arc::new(ChangeDetector::new(
        settings.folder_paths.clone(),
        Arc::new(SnapshotStore::new()),
        Arc::clone(&gateway),
        settings.admin_user_id,
        settings.detector_options(),
    ));
    for err in detector.prime() {
        tracing::warn!("Initial scan: {err}");
    }

    let scheduler = start_scheduler(Arc::clone(&detector), settings.check_interval())
        .context("starting scan scheduler")?;
    let poller = start_poller(Arc::clone(&client), PollerOptions::default())
        .context("starting update poller")?;

    let dispatcher = Dispatcher::new(
        settings.admin_user_id,
        Arc::clone(&detector),
        gateway,
        ArchiveBuilder::new(
            settings.folder_paths.clone(),
            settings.work_dir(),
            settings.media_set(),
        ),
        settings.check_interval(),
    );

    tracing::info!("Bot is ready to receive commands.");
    dispatcher.run(&poller.receiver);

    // Only reached if the poller thread exits.
    poller.stop();
    scheduler.stop();
    scheduler.join();
    tracing::info!("FileWarden stopped");
    Ok(())
}
