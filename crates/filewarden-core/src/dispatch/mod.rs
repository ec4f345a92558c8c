/// Command dispatcher — routes inbound messages to handlers behind a single
/// authorization gate.
///
/// Every request goes through the same three steps in [`Dispatcher::dispatch`]:
///
/// 1. Parse. Plain text and unknown commands are ignored without a reply.
/// 2. Authorize. A sender other than the configured admin gets an
///    "Access Denied" reply, the admin gets an alert, and nothing else happens.
///    In particular an unauthorized `/check` never triggers a scan.
/// 3. Execute. A handler returns either a reply or a [`CommandError`]; both
///    become a reply to the sender, errors are also logged. Nothing a handler
///    does can take the dispatcher down.
pub mod command;

pub use command::{parse, usage_line, usage_text, Command, CommandSpec, Parsed, COMMANDS};

use crate::archive::{ArchiveBuilder, ArchiveError, ArchiveKind};
use crate::gateway::{Transfer, TransferError};
use crate::model::size::{count_noun, format_size};
use crate::model::{CommandRequest, UserId};
use crate::scanner::ChangeDetector;
use crossbeam_channel::Receiver;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reply sent to anyone who is not the admin.
pub const ACCESS_DENIED: &str = "Access Denied!\n\n\
    You are not authorized to use this bot. \
    This bot is designed to be used only by the authorized user.";

/// Reply for `/download` and `/delete` when the path is not an existing file.
pub const FILE_NOT_FOUND: &str = "File not found!";

/// Outcome of the authorization step for a non-admin sender.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Sender is not the configured admin.
    #[error("user {sender} is not authorized")]
    Denied { sender: UserId },
}

/// A handler failed. The `Display` text is what the sender sees.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Error sending file: {0}")]
    Send(#[source] TransferError),
    #[error("Error deleting file: {0}")]
    Delete(#[source] std::io::Error),
    #[error("Error creating zip file: {0}")]
    Archive(#[source] ArchiveError),
    #[error("Error sending zip file: {0}")]
    ArchiveSend(#[source] TransferError),
}

/// What happened to one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command; no reply.
    Ignored,
    /// Sender was not authorized.
    Denied,
    /// Handler ran and produced a normal reply.
    Handled,
    /// Handler ran and failed; the error was replied and logged.
    Failed,
}

pub struct Dispatcher {
    admin: UserId,
    detector: Arc<ChangeDetector>,
    gateway: Arc<dyn Transfer>,
    archives: ArchiveBuilder,
    check_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        admin: UserId,
        detector: Arc<ChangeDetector>,
        gateway: Arc<dyn Transfer>,
        archives: ArchiveBuilder,
        check_interval: Duration,
    ) -> Self {
        Self {
            admin,
            detector,
            gateway,
            archives,
            check_interval,
        }
    }

    /// Process requests until every sender of `inbox` has been dropped.
    pub fn run(&self, inbox: &Receiver<CommandRequest>) {
        info!("Dispatch: ready to receive commands");
        for request in inbox.iter() {
            self.dispatch(&request);
        }
        info!("Dispatch: inbox closed, stopping");
    }

    /// Handle one inbound request end to end.
    pub fn dispatch(&self, request: &CommandRequest) -> Outcome {
        let parsed = match parse(&request.text) {
            Parsed::NotACommand => {
                debug!("Dispatch: ignoring non-command message from {}", request.sender);
                return Outcome::Ignored;
            }
            parsed => parsed,
        };

        if let Err(denied) = self.authorize(request) {
            self.deny(request, &denied);
            return Outcome::Denied;
        }

        let (reply, outcome) = match parsed {
            Parsed::Command(command) => match self.execute(command) {
                Ok(reply) => (reply, Outcome::Handled),
                Err(err) => {
                    error!("Dispatch: {err}");
                    (err.to_string(), Outcome::Failed)
                }
            },
            Parsed::MissingArgument(spec) => (format!("Usage: {}", usage_line(spec)), Outcome::Handled),
            Parsed::NotACommand => return Outcome::Ignored,
        };
        self.reply(request.sender, &reply);
        outcome
    }

    fn authorize(&self, request: &CommandRequest) -> Result<(), AuthorizationError> {
        if request.sender == self.admin {
            Ok(())
        } else {
            Err(AuthorizationError::Denied {
                sender: request.sender,
            })
        }
    }

    fn deny(&self, request: &CommandRequest, denied: &AuthorizationError) {
        let attempted = request.text.split_whitespace().next().unwrap_or_default();
        warn!(
            "Dispatch: {denied} ({}) attempted {attempted}",
            request.display_name()
        );
        self.reply(request.sender, ACCESS_DENIED);

        let alert = format!(
            "🚨 Unauthorized Access Attempt 🚨\n\n\
             User {}, with this ({}) user id\n\
             Attempted to access FileWarden with {attempted}.\n\n\
             Please take appropriate action if necessary.",
            request.display_name(),
            request.sender
        );
        self.reply(self.admin, &alert);
    }

    fn reply(&self, to: UserId, text: &str) {
        if let Err(err) = self.gateway.send_message(to, text) {
            warn!("Dispatch: could not reply to {to}: {err}");
        }
    }

    fn execute(&self, command: Command) -> Result<String, CommandError> {
        match command {
            Command::Start => Ok(usage_text()),
            Command::Files => Ok(self.list_files()),
            Command::Check => Ok(self.check()),
            Command::Status => Ok(self.status()),
            Command::Download(path) => self.download(&path),
            Command::Delete(path) => self.delete(&path),
            Command::AllMedia => self.send_archive(ArchiveKind::AllMedia),
            Command::ZipAll => self.send_archive(ArchiveKind::Everything),
        }
    }

    // ─── Handlers ───────────────────────────────────────────────────────────

    /// Live listing of every folder, independent of the snapshot.
    fn list_files(&self) -> String {
        let mut text = String::from("Files in specified folders:\n\n");
        for folder in self.detector.folders() {
            text.push_str(&format!("{}:\n", folder.display()));
            match self.detector.list_folder(folder) {
                Ok(names) => {
                    let mut names: Vec<_> = names.into_iter().collect();
                    names.sort_unstable();
                    if names.is_empty() {
                        text.push_str("  (empty)\n");
                    }
                    for name in names {
                        text.push_str(&format!("  {name}\n"));
                    }
                }
                Err(err) => text.push_str(&format!("  Error reading folder: {err}\n")),
            }
        }
        text
    }

    fn check(&self) -> String {
        let report = self.detector.scan_all();
        info!("Folders checked for new files.");
        let mut reply = format!(
            "Folders have been checked for new files ({}).",
            report.summary()
        );
        for err in &report.errors {
            reply.push_str(&format!("\n{err}"));
        }
        reply
    }

    fn status(&self) -> String {
        let last = self
            .detector
            .last_pass()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_owned());
        let folders = self.detector.folders();
        let mut text = format!(
            "Watching {} every {}s.\nLast check: {last}\n\n",
            count_noun(folders.len(), "folder"),
            self.check_interval.as_secs()
        );
        for folder in folders {
            let tracked = self.detector.store().entry_count(folder);
            text.push_str(&format!("{}: {tracked} tracked\n", folder.display()));
        }
        text
    }

    fn download(&self, path: &Path) -> Result<String, CommandError> {
        if !path.is_file() {
            warn!("File not found: {}", path.display());
            return Ok(FILE_NOT_FOUND.to_owned());
        }
        self.gateway
            .send_file(self.admin, path, None)
            .map_err(CommandError::Send)?;
        info!("File sent: {}", path.display());
        Ok(format!("File sent: {}", path.display()))
    }

    fn delete(&self, path: &Path) -> Result<String, CommandError> {
        if !path.is_file() {
            warn!("File not found: {}", path.display());
            return Ok(FILE_NOT_FOUND.to_owned());
        }
        fs::remove_file(path).map_err(CommandError::Delete)?;
        info!("File deleted: {}", path.display());
        Ok(format!("File deleted: {}", path.display()))
    }

    fn send_archive(&self, kind: ArchiveKind) -> Result<String, CommandError> {
        let archive = match self.archives.build(kind) {
            Ok(archive) => archive,
            Err(ArchiveError::Empty) => {
                info!("Archive: nothing to package for {}", kind.caption());
                return Ok("No matching files found in the specified folders.".to_owned());
            }
            Err(err) => return Err(CommandError::Archive(err)),
        };

        // `archive` is removed from disk when it drops, on either path below.
        self.gateway
            .send_file(self.admin, archive.path(), Some(kind.caption()))
            .map_err(CommandError::ArchiveSend)?;

        info!(
            "{} sent as zip ({} entries)",
            kind.caption(),
            archive.entries()
        );
        Ok(format!(
            "{}: {}, {}",
            kind.caption(),
            count_noun(archive.entries(), "file"),
            format_size(archive.total_bytes())
        ))
    }
}
