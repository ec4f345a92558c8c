/// Bot API objects.
///
/// Only the fields FileWarden reads are mirrored; serde ignores the rest.
use filewarden_core::model::CommandRequest;
use serde::Deserialize;

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying after a flood-control error.
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    /// `@username` when set, otherwise the first name.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => username.clone(),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

impl Update {
    /// Convert a text message from a human into a dispatcher request.
    ///
    /// Non-message updates, messages without text, channel posts without a
    /// sender and messages from other bots yield `None`.
    pub fn into_request(self) -> Option<CommandRequest> {
        let message = self.message?;
        let from = message.from?;
        if from.is_bot {
            return None;
        }
        let text = message.text?;
        Some(CommandRequest::new(from.id, text).with_sender_name(from.display_name()))
    }
}
