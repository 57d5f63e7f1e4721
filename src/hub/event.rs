use serde::{Deserialize, Serialize};

use crate::clock;
use crate::store::messages::StoredMessage;
use crate::store::users::RosterEntry;

/// A chat message as it travels the wire, in history replays and live
/// broadcasts alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub username: String,
    pub message: String,
    pub timestamp: String,
}

impl From<StoredMessage> for ChatMessage {
    fn from(stored: StoredMessage) -> Self {
        Self {
            id: stored.id,
            username: stored.username,
            message: stored.content,
            timestamp: clock::rfc3339(stored.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceNotice {
    pub username: String,
    pub message: String,
    pub timestamp: String,
}

impl PresenceNotice {
    pub fn new(username: &str, verb: &str) -> Self {
        Self {
            username: username.to_owned(),
            message: format!("{username} {verb} the chat"),
            timestamp: clock::rfc3339(clock::now_ms()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once, to a joining connection only.
    History(Vec<ChatMessage>),
    /// A persisted message, broadcast to everyone including the sender.
    Message(ChatMessage),
    /// Broadcast to everyone except the typist.
    Typing {
        username: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    PresenceJoined(PresenceNotice),
    PresenceLeft(PresenceNotice),
    /// The full online-user list, broadcast on every presence change.
    Roster(Vec<RosterEntry>),
    /// Sent to the originating connection only.
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Join { username: String },
    Message { message: String },
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}
