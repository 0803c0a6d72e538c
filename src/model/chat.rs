use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserCompact;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChannel {
    pub channel_id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    pub last_message_id: Option<u64>,
    pub last_read_id: Option<u64>,
}

impl ChatChannel {
    pub fn has_unread(&self) -> bool {
        match (self.last_message_id, self.last_read_id) {
            (Some(last), Some(read)) => last > read,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: u64,
    pub channel_id: u32,
    pub sender_id: u32,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_action: bool,
    pub sender: Option<UserCompact>,
}

/// Response of opening a private conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPrivateMessage {
    pub channel: ChatChannel,
    pub message: ChatMessage,
}
