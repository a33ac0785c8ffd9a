use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{Message, Role};

/// One prior turn of a conversation, as supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Convert to a transcript message. Tool-role history entries are
    /// replayed as assistant text since their call ids are not known.
    pub fn to_message(&self) -> Message {
        match self.role {
            Role::System => Message::system(self.content.clone()),
            Role::User => Message::user(self.content.clone()),
            Role::Assistant | Role::Tool => Message::assistant(self.content.clone()),
        }
    }
}
