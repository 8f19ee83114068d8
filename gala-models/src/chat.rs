//! Chat (conversation) entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentKeys;

/// The other party of a conversation, as seen by the current identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CounterpartDoc")]
pub struct Counterpart {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// One entry in the chat list.
///
/// Chat lists are kept in the order the server delivers them; the client
/// never re-sorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ChatDoc")]
pub struct Chat {
    pub id: String,
    pub counterpart: Counterpart,
    /// Preview text of the newest message (an image URL when `is_image`).
    #[serde(default)]
    pub latest_message: Option<String>,
    #[serde(default)]
    pub is_image: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct CounterpartDoc {
    #[serde(flatten)]
    keys: DocumentKeys,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl TryFrom<CounterpartDoc> for Counterpart {
    type Error = String;

    fn try_from(doc: CounterpartDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.keys.resolve("counterpart")?,
            name: doc.name,
            image: doc.image,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatDoc {
    #[serde(flatten)]
    keys: DocumentKeys,
    counterpart: Counterpart,
    #[serde(default)]
    latest_message: Option<String>,
    #[serde(default)]
    is_image: bool,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<ChatDoc> for Chat {
    type Error = String;

    fn try_from(doc: ChatDoc) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.keys.resolve("chat")?,
            counterpart: doc.counterpart,
            latest_message: doc.latest_message,
            is_image: doc.is_image,
            timestamp: doc.timestamp,
        })
    }
}

impl Chat {
    /// Preview line suitable for a list row.
    pub fn preview(&self) -> &str {
        if self.is_image {
            return "[image]";
        }
        self.latest_message.as_deref().unwrap_or("")
    }

    /// Display name of the counterpart, falling back to its id.
    pub fn title(&self) -> &str {
        self.counterpart.name.as_deref().unwrap_or(&self.counterpart.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_from_server_json() {
        let json = serde_json::json!({
            "_id": "chat-1",
            "counterpart": {"_id": "vendor-9", "name": "Blue Hall Catering", "image": null},
            "latestMessage": "See you on Saturday",
            "isImage": false,
            "timestamp": "2024-05-01T18:30:00Z"
        });
        let chat: Chat = serde_json::from_value(json).unwrap();
        assert_eq!(chat.id, "chat-1");
        assert_eq!(chat.counterpart.id, "vendor-9");
        assert_eq!(chat.title(), "Blue Hall Catering");
        assert_eq!(chat.preview(), "See you on Saturday");
        assert!(chat.timestamp.is_some());
    }

    #[test]
    fn test_chat_optional_fields_default() {
        let json = serde_json::json!({"id": "chat-2", "counterpart": {"id": "client-3"}});
        let chat: Chat = serde_json::from_value(json).unwrap();
        assert!(!chat.is_image);
        assert_eq!(chat.title(), "client-3");
        assert_eq!(chat.preview(), "");
    }

    #[test]
    fn test_chat_with_both_id_keys() {
        let json = serde_json::json!({
            "_id": "chat-4",
            "id": "chat-4",
            "counterpart": {"_id": "vendor-2", "id": "vendor-2", "name": "Rooftop"}
        });
        let chat: Chat = serde_json::from_value(json).unwrap();
        assert_eq!(chat.id, "chat-4");
        assert_eq!(chat.counterpart.id, "vendor-2");
    }

    #[test]
    fn test_chat_without_id_is_rejected() {
        let json = serde_json::json!({"counterpart": {"id": "v"}});
        assert!(serde_json::from_value::<Chat>(json).is_err());
    }

    #[test]
    fn test_image_preview() {
        let json = serde_json::json!({
            "id": "chat-3",
            "counterpart": {"id": "v"},
            "latestMessage": "https://cdn.example.com/a.png",
            "isImage": true
        });
        let chat: Chat = serde_json::from_value(json).unwrap();
        assert_eq!(chat.preview(), "[image]");
    }
}
