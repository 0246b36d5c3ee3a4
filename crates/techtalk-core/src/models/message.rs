use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub read: bool,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn is_from(&self, user_id: i64) -> bool {
        self.sender_id == user_id
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub receiver_id: i64,
    pub content: String,
}

/// One row of the inbox: the other participant and the latest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub user: User,
    pub last_message: String,
    #[serde(with = "timestamp")]
    pub last_message_time: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: i64,
}
