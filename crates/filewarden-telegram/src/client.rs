/// Blocking Telegram Bot API client.
///
/// One `reqwest::blocking::Client` is shared by the poller thread and every
/// sender (scheduler, dispatcher, deadline workers); it is internally
/// reference-counted and safe to use from many threads.
///
/// Outbound identities map directly to chat ids: in a private chat with the
/// bot, the chat id equals the user id.
use crate::types::{ApiResponse, Message, Update, User};
use filewarden_core::gateway::{Transfer, TransferError};
use filewarden_core::model::UserId;
use reqwest::blocking::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Longest text Telegram accepts in one message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Longest caption Telegram accepts on a document.
const MAX_CAPTION_CHARS: usize = 1024;

/// Extra time granted to a long-poll request beyond its server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        retry_after: Option<u64>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} returned ok without a result")]
    EmptyResult(&'static str),
}

impl TelegramError {
    /// Flood-control back-off requested by the API, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<TelegramError> for TransferError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Io(e) => TransferError::Io(e),
            TelegramError::Http(e) => TransferError::Http(e.to_string()),
            other => TransferError::Api(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct TelegramClient {
    http: Client,
    /// `<base>/bot<token>`; never logged.
    endpoint: String,
}

impl TelegramClient {
    /// Build a client for `api_base_url` (normally `https://api.telegram.org`).
    ///
    /// `request_timeout` bounds every request except long polls, which get
    /// their own timeout derived from the poll duration.
    pub fn new(
        api_base_url: &str,
        token: &str,
        request_timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{token}", api_base_url.trim_end_matches('/')),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.endpoint)
    }

    /// Unwrap the `{ok, result}` envelope. Error statuses still carry a JSON
    /// body with a description, so the envelope is decoded first.
    fn decode<T: DeserializeOwned>(method: &'static str, response: Response) -> Result<T, TelegramError> {
        let envelope: ApiResponse<T> = response.json()?;
        if !envelope.ok {
            return Err(TelegramError::Api {
                code: envelope.error_code.unwrap_or_default(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "unknown error".to_owned()),
                retry_after: envelope.parameters.and_then(|p| p.retry_after),
            });
        }
        envelope.result.ok_or(TelegramError::EmptyResult(method))
    }

    /// Handshake: confirm the token is valid and return the bot's own user.
    pub fn get_me(&self) -> Result<User, TelegramError> {
        let response = self.http.get(self.url("getMe")).send()?;
        Self::decode("getMe", response)
    }

    /// Long-poll for updates newer than `offset`.
    ///
    /// Passing `offset` acknowledges every update below it; a negative offset
    /// discards all but the last `-offset` pending updates.
    pub fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        let response = self
            .http
            .post(self.url("getUpdates"))
            .json(&body)
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .send()?;
        Self::decode("getUpdates", response)
    }

    /// Send `text`, split into several messages if it exceeds the limit.
    pub fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let response = self
                .http
                .post(self.url("sendMessage"))
                .json(&SendMessage {
                    chat_id,
                    text: &chunk,
                })
                .send()?;
            let _: Message = Self::decode("sendMessage", response)?;
        }
        Ok(())
    }

    /// Upload a local file as a document.
    pub fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .file("document", path)?;
        if let Some(caption) = caption {
            form = form.text("caption", truncate_chars(caption, MAX_CAPTION_CHARS));
        }
        debug!("Telegram: uploading {}", path.display());
        let response = self
            .http
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()?;
        let _: Message = Self::decode("sendDocument", response)?;
        Ok(())
    }
}

impl Transfer for TelegramClient {
    fn send_message(&self, to: UserId, text: &str) -> Result<(), TransferError> {
        Ok(self.send_text(to.0, text)?)
    }

    fn send_file(&self, to: UserId, path: &Path, caption: Option<&str>) -> Result<(), TransferError> {
        Ok(self.send_document(to.0, path, caption)?)
    }
}

/// Split `text` into chunks of at most `limit` characters, breaking at line
/// ends where possible and hard-splitting lines that are longer than `limit`.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                if piece.len() == limit {
                    chunks.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello\nworld", 100), vec!["hello\nworld"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_message("", 100).is_empty());
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = split_message(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn overlong_line_is_hard_split() {
        let text = format!("{}\nend", "x".repeat(25));
        let chunks = split_message(&text, 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(8);
        assert_eq!(split_message(&text, 8).len(), 1);
    }

    #[test]
    fn api_error_maps_to_transfer_api_error() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: chat not found".into(),
            retry_after: None,
        };
        assert!(err.retry_after().is_none());
        let mapped: TransferError = err.into();
        assert!(matches!(mapped, TransferError::Api(msg) if msg.contains("chat not found")));
    }

    #[test]
    fn flood_control_exposes_retry_after() {
        let err = TelegramError::Api {
            code: 429,
            description: "Too Many Requests".into(),
            retry_after: Some(3),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn caption_is_truncated_by_characters() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }
}
