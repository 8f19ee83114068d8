//! Chat message entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentKeys;

/// A single message inside a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "MessageDoc")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub chat_id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    /// Message text, or an image URL when `is_image` is set.
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_image: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDoc {
    #[serde(flatten)]
    keys: DocumentKeys,
    #[serde(default)]
    chat_id: Option<String>,
    sender_id: String,
    receiver_id: String,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    is_image: bool,
}

impl TryFrom<MessageDoc> for ChatMessage {
    type Error = String;

    fn try_from(doc: MessageDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.keys.resolve("message")?,
            chat_id: doc.chat_id,
            sender_id: doc.sender_id,
            receiver_id: doc.receiver_id,
            content: doc.content,
            timestamp: doc.timestamp,
            is_image: doc.is_image,
        })
    }
}

impl ChatMessage {
    /// Id of the party on the other side of `own_id`.
    ///
    /// Message history streams are keyed by this value.
    pub fn counterpart_of(&self, own_id: &str) -> &str {
        if self.sender_id == own_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// Whether `own_id` sent this message.
    pub fn is_from(&self, own_id: &str) -> bool {
        self.sender_id == own_id
    }
}
