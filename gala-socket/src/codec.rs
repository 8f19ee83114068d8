//! Wire codec between envelopes and text frames.
//!
//! The codec sits behind `FrameCodec` so a versioned wire format can be
//! swapped in without touching the connection or dispatch code.

use serde::Deserialize;
use serde_json::Value;

use gala_core::error::{GalaError, GalaResult};
use gala_models::{Chat, ChatMessage, Page};

use crate::envelope::{OutputType, RequestEnvelope, ResponseEnvelope, ResponsePayload};

/// Converts envelopes to and from socket text frames.
pub trait FrameCodec: Send + Sync {
    /// Validate and serialize an outgoing request.
    fn encode(&self, request: &RequestEnvelope) -> GalaResult<String>;

    /// Parse an incoming frame. Any error means the frame is dropped.
    fn decode(&self, frame: &str) -> GalaResult<ResponseEnvelope>;
}

/// Plain JSON objects, one per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

/// Outer shape shared by every incoming frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    output_type: OutputType,
    #[serde(default, alias = "data")]
    result: Option<Value>,
    #[serde(default)]
    receiver_id: Option<String>,
}

fn require_result(raw: &mut RawFrame) -> GalaResult<Value> {
    raw.result
        .take()
        .filter(|v| !v.is_null())
        .ok_or_else(|| GalaError::Protocol(format!("{} frame has no result", raw.output_type)))
}

fn typed<T: serde::de::DeserializeOwned>(kind: OutputType, value: Value) -> GalaResult<T> {
    serde_json::from_value(value)
        .map_err(|e| GalaError::Protocol(format!("{kind} result does not match schema: {e}")))
}

impl FrameCodec for JsonCodec {
    fn encode(&self, request: &RequestEnvelope) -> GalaResult<String> {
        request.validate()?;
        Ok(serde_json::to_string(request)?)
    }

    fn decode(&self, frame: &str) -> GalaResult<ResponseEnvelope> {
        let mut raw: RawFrame = serde_json::from_str(frame)
            .map_err(|e| GalaError::Protocol(format!("unreadable frame: {e}")))?;
        let kind = raw.output_type;

        let payload = match kind {
            OutputType::GetChatList | OutputType::GetMoreChatList => {
                let page: Page<Chat> = typed(kind, require_result(&mut raw)?)?;
                ResponsePayload::ChatPage(page)
            }
            OutputType::GetMessages | OutputType::GetEarlierMessages => {
                let page: Page<ChatMessage> = typed(kind, require_result(&mut raw)?)?;
                ResponsePayload::MessagePage {
                    conversation: raw.receiver_id.take().filter(|id| !id.is_empty()),
                    page,
                }
            }
            OutputType::SendMessage => {
                ResponsePayload::Message(typed(kind, require_result(&mut raw)?)?)
            }
            OutputType::Register | OutputType::Switch => {
                ResponsePayload::Ack(raw.result.take().unwrap_or(Value::Null))
            }
        };

        Ok(ResponseEnvelope {
            output_type: kind,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gala_models::{Identity, PageRequest};

    #[test]
    fn test_encode_validates() {
        let bad = RequestEnvelope::chat_list(
            Identity::client("c-1"),
            PageRequest { page_number: 0, page_size: 20 },
        );
        assert!(matches!(JsonCodec.encode(&bad), Err(GalaError::InvalidRequest(_))));

        let good = RequestEnvelope::register(Identity::vendor("v-1"));
        let frame = JsonCodec.encode(&good).unwrap();
        assert!(frame.contains("\"inputType\":\"REGISTER\""));
    }

    #[test]
    fn test_decode_chat_list() {
        let frame = r#"{
            "outputType": "GET_CHAT_LIST",
            "result": {
                "documents": [{"_id": "chat-1", "counterpart": {"_id": "v-1", "name": "Hall"}}],
                "totalPages": 3,
                "currentPage": 1,
                "hasMore": true
            }
        }"#;
        let resp = JsonCodec.decode(frame).unwrap();
        assert_eq!(resp.output_type, OutputType::GetChatList);
        match resp.payload {
            ResponsePayload::ChatPage(page) => {
                assert_eq!(page.documents.len(), 1);
                assert_eq!(page.total_pages, 3);
                assert!(page.has_more);
            }
            other => panic!("expected chat page, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_message_page_with_conversation() {
        let frame = r#"{
            "outputType": "GET_EARLIER_MESSAGES",
            "receiverId": "v-1",
            "data": {"documents": [], "totalPages": 2, "currentPage": 2, "hasMore": false}
        }"#;
        let resp = JsonCodec.decode(frame).unwrap();
        match resp.payload {
            ResponsePayload::MessagePage { conversation, page } => {
                assert_eq!(conversation.as_deref(), Some("v-1"));
                assert!(!page.has_more);
            }
            other => panic!("expected message page, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_send_message_ack() {
        let frame = r#"{
            "outputType": "SEND_MESSAGE",
            "result": {
                "_id": "m-1", "senderId": "c-1", "receiverId": "v-1",
                "content": "hi", "timestamp": "2024-05-01T10:00:00Z"
            }
        }"#;
        let resp = JsonCodec.decode(frame).unwrap();
        assert!(matches!(resp.payload, ResponsePayload::Message(ref m) if m.id == "m-1"));
    }

    #[test]
    fn test_decode_register_ack_without_result() {
        let resp = JsonCodec.decode(r#"{"outputType": "REGISTER"}"#).unwrap();
        assert_eq!(resp.payload, ResponsePayload::Ack(Value::Null));
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        let cases = [
            "not json at all",
            r#"{"result": {}}"#,
            r#"{"outputType": "PING"}"#,
            r#"{"outputType": "GET_CHAT_LIST"}"#,
            r#"{"outputType": "GET_CHAT_LIST", "result": {"documents": "nope"}}"#,
            r#"{"outputType": "SEND_MESSAGE", "result": {"content": "missing ids"}}"#,
        ];
        for frame in cases {
            let err = JsonCodec.decode(frame).unwrap_err();
            assert!(matches!(err, GalaError::Protocol(_)), "frame {frame} gave {err:?}");
        }
    }
}
