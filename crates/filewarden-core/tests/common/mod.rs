//! Shared helpers for the end-to-end tests: an in-memory transfer gateway
//! that records every send, and small filesystem utilities.
#![allow(dead_code)]

use filewarden_core::gateway::{Transfer, TransferError};
use filewarden_core::model::UserId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ADMIN: UserId = UserId(1000);
pub const STRANGER: UserId = UserId(666);

/// One recorded send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        to: UserId,
        text: String,
    },
    File {
        to: UserId,
        path: PathBuf,
        caption: Option<String>,
        /// Entry names, when the file was a zip archive.
        zip_entries: Vec<String>,
    },
}

/// Records every send. Individual file names (or all files) can be made to fail,
/// and every send can be slowed down.
#[derive(Default)]
pub struct RecordingTransfer {
    sent: Mutex<Vec<Sent>>,
    failing_names: Mutex<HashSet<String>>,
    fail_all_files: Mutex<bool>,
    delay: Mutex<Duration>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_file(&self, name: &str) {
        self.failing_names.lock().insert(name.to_owned());
    }

    pub fn fail_all_files(&self) {
        *self.fail_all_files.lock() = true;
    }

    pub fn heal(&self) {
        self.failing_names.lock().clear();
        *self.fail_all_files.lock() = false;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    pub fn messages_to(&self, to: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { to: t, text } if t == to => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<(PathBuf, Option<String>, Vec<String>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::File {
                    path,
                    caption,
                    zip_entries,
                    ..
                } => Some((path, caption, zip_entries)),
                _ => None,
            })
            .collect()
    }

    /// File names (last path component) of every file sent.
    pub fn file_names(&self) -> Vec<String> {
        self.files()
            .into_iter()
            .map(|(p, _, _)| file_name(&p))
            .collect()
    }
}

impl Transfer for RecordingTransfer {
    fn send_message(&self, to: UserId, text: &str) -> Result<(), TransferError> {
        let delay = *self.delay.lock();
        std::thread::sleep(delay);
        self.sent.lock().push(Sent::Message {
            to,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn send_file(&self, to: UserId, path: &Path, caption: Option<&str>) -> Result<(), TransferError> {
        let delay = *self.delay.lock();
        std::thread::sleep(delay);
        if *self.fail_all_files.lock() || self.failing_names.lock().contains(&file_name(path)) {
            return Err(TransferError::Api("Bad Request: simulated failure".into()));
        }
        let zip_entries = if path.extension().is_some_and(|e| e == "zip") {
            read_zip_entries(path)
        } else {
            Vec::new()
        };
        self.sent.lock().push(Sent::File {
            to,
            path: path.to_path_buf(),
            caption: caption.map(str::to_owned),
            zip_entries,
        });
        Ok(())
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_zip_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).expect("archive must exist while being sent");
    let archive = zip::ZipArchive::new(file).expect("archive must be a valid zip");
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    names
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"data").unwrap();
}
