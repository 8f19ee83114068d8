//! Request and response envelopes multiplexed over the socket.
//!
//! Every outgoing frame is a `RequestEnvelope` tagged by `inputType`;
//! every incoming frame is tagged by `outputType`. Replies are matched to
//! requests by kind only, there is no per-request id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gala_core::error::{GalaError, GalaResult};
use gala_models::{Chat, ChatMessage, Identity, Page, PageRequest};

/// Kind tag of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    Register,
    SendMessage,
    GetMessages,
    GetChatList,
    Switch,
    GetEarlierMessages,
    GetMoreChatList,
}

/// Kind tag of an incoming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputType {
    Register,
    SendMessage,
    GetMessages,
    GetChatList,
    Switch,
    GetEarlierMessages,
    GetMoreChatList,
}

impl InputType {
    /// The response kind the server answers this request with.
    pub fn expected_output(&self) -> OutputType {
        match self {
            Self::Register => OutputType::Register,
            Self::SendMessage => OutputType::SendMessage,
            Self::GetMessages => OutputType::GetMessages,
            Self::GetChatList => OutputType::GetChatList,
            Self::Switch => OutputType::Switch,
            Self::GetEarlierMessages => OutputType::GetEarlierMessages,
            Self::GetMoreChatList => OutputType::GetMoreChatList,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::SendMessage => "SEND_MESSAGE",
            Self::GetMessages => "GET_MESSAGES",
            Self::GetChatList => "GET_CHAT_LIST",
            Self::Switch => "SWITCH",
            Self::GetEarlierMessages => "GET_EARLIER_MESSAGES",
            Self::GetMoreChatList => "GET_MORE_CHAT_LIST",
        }
    }
}

impl OutputType {
    /// Whether this kind carries a message-history page.
    pub fn is_message_page(&self) -> bool {
        matches!(self, Self::GetMessages | Self::GetEarlierMessages)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "REGISTER",
            Self::SendMessage => "SEND_MESSAGE",
            Self::GetMessages => "GET_MESSAGES",
            Self::GetChatList => "GET_CHAT_LIST",
            Self::Switch => "SWITCH",
            Self::GetEarlierMessages => "GET_EARLIER_MESSAGES",
            Self::GetMoreChatList => "GET_MORE_CHAT_LIST",
        }
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request.
///
/// Serialized as a flat JSON object: `inputType`, `senderId`, `senderType`
/// plus the variant fields in camelCase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "inputType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestEnvelope {
    /// Bind the socket to an identity.
    Register {
        #[serde(flatten)]
        sender: Identity,
    },
    /// Send a chat message (text, or an image URL).
    #[serde(rename_all = "camelCase")]
    SendMessage {
        #[serde(flatten)]
        sender: Identity,
        receiver_id: String,
        content: String,
        timestamp: DateTime<Utc>,
        is_image: bool,
    },
    /// First page of a conversation's history.
    #[serde(rename_all = "camelCase")]
    GetMessages {
        #[serde(flatten)]
        sender: Identity,
        receiver_id: String,
        pagination: PageRequest,
    },
    /// First page of the chat list.
    GetChatList {
        #[serde(flatten)]
        sender: Identity,
        pagination: PageRequest,
    },
    /// Re-bind the socket to a different identity.
    Switch {
        #[serde(flatten)]
        sender: Identity,
    },
    /// A further (older) page of a conversation's history.
    #[serde(rename_all = "camelCase")]
    GetEarlierMessages {
        #[serde(flatten)]
        sender: Identity,
        receiver_id: String,
        pagination: PageRequest,
    },
    /// A further page of the chat list.
    GetMoreChatList {
        #[serde(flatten)]
        sender: Identity,
        pagination: PageRequest,
    },
}

impl RequestEnvelope {
    pub fn register(sender: Identity) -> Self {
        Self::Register { sender }
    }

    pub fn switch(sender: Identity) -> Self {
        Self::Switch { sender }
    }

    pub fn chat_list(sender: Identity, pagination: PageRequest) -> Self {
        Self::GetChatList { sender, pagination }
    }

    pub fn more_chat_list(sender: Identity, pagination: PageRequest) -> Self {
        Self::GetMoreChatList { sender, pagination }
    }

    pub fn messages(sender: Identity, receiver_id: impl Into<String>, pagination: PageRequest) -> Self {
        Self::GetMessages {
            sender,
            receiver_id: receiver_id.into(),
            pagination,
        }
    }

    pub fn earlier_messages(
        sender: Identity,
        receiver_id: impl Into<String>,
        pagination: PageRequest,
    ) -> Self {
        Self::GetEarlierMessages {
            sender,
            receiver_id: receiver_id.into(),
            pagination,
        }
    }

    /// A message stamped with the current time.
    pub fn send_message(
        sender: Identity,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
        is_image: bool,
    ) -> Self {
        Self::SendMessage {
            sender,
            receiver_id: receiver_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            is_image,
        }
    }

    pub fn input_type(&self) -> InputType {
        match self {
            Self::Register { .. } => InputType::Register,
            Self::SendMessage { .. } => InputType::SendMessage,
            Self::GetMessages { .. } => InputType::GetMessages,
            Self::GetChatList { .. } => InputType::GetChatList,
            Self::Switch { .. } => InputType::Switch,
            Self::GetEarlierMessages { .. } => InputType::GetEarlierMessages,
            Self::GetMoreChatList { .. } => InputType::GetMoreChatList,
        }
    }

    pub fn sender(&self) -> &Identity {
        match self {
            Self::Register { sender }
            | Self::SendMessage { sender, .. }
            | Self::GetMessages { sender, .. }
            | Self::GetChatList { sender, .. }
            | Self::Switch { sender }
            | Self::GetEarlierMessages { sender, .. }
            | Self::GetMoreChatList { sender, .. } => sender,
        }
    }

    /// Conversation the request targets, if any.
    pub fn receiver_id(&self) -> Option<&str> {
        match self {
            Self::SendMessage { receiver_id, .. }
            | Self::GetMessages { receiver_id, .. }
            | Self::GetEarlierMessages { receiver_id, .. } => Some(receiver_id),
            _ => None,
        }
    }

    pub fn pagination(&self) -> Option<&PageRequest> {
        match self {
            Self::GetMessages { pagination, .. }
            | Self::GetChatList { pagination, .. }
            | Self::GetEarlierMessages { pagination, .. }
            | Self::GetMoreChatList { pagination, .. } => Some(pagination),
            _ => None,
        }
    }

    /// Check the envelope before it goes on the wire.
    pub fn validate(&self) -> GalaResult<()> {
        if self.sender().sender_id.trim().is_empty() {
            return Err(GalaError::InvalidRequest(format!(
                "{}: senderId is empty",
                self.input_type()
            )));
        }
        if let Some(receiver) = self.receiver_id() {
            if receiver.trim().is_empty() {
                return Err(GalaError::InvalidRequest(format!(
                    "{}: receiverId is empty",
                    self.input_type()
                )));
            }
        }
        if let Some(pagination) = self.pagination() {
            pagination.validate()?;
        }
        Ok(())
    }
}

/// A parsed incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub output_type: OutputType,
    pub payload: ResponsePayload,
}

/// Typed body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// A chat-list page (`GET_CHAT_LIST`, `GET_MORE_CHAT_LIST`).
    ChatPage(Page<Chat>),
    /// A history page (`GET_MESSAGES`, `GET_EARLIER_MESSAGES`). The
    /// conversation is present when the server names it.
    MessagePage {
        conversation: Option<String>,
        page: Page<ChatMessage>,
    },
    /// A single message (`SEND_MESSAGE` acks and pushed messages).
    Message(ChatMessage),
    /// Any other acknowledgement (`REGISTER`, `SWITCH`).
    Ack(serde_json::Value),
}
