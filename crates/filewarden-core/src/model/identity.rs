/// Identities and inbound requests.
///
/// A `UserId` is the transport-level numeric identity of a chat participant.
/// Exactly one `UserId` is authorized to operate the agent.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a message sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One inbound text message, as handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Who sent the message. Replies go back to this identity.
    pub sender: UserId,
    /// Display name (username or first name) if the transport knows it.
    pub sender_name: Option<String>,
    /// Raw message text, e.g. `/download /srv/inbox/report.pdf`.
    pub text: String,
}

impl CommandRequest {
    pub fn new(sender: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            sender_name: None,
            text: text.into(),
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Name used in alerts; falls back to `"unknown"`.
    pub fn display_name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or("unknown")
    }
}
