//! Response routing and state fan-out.
//!
//! The dispatcher is owned by the client actor. It applies parsed
//! responses to the pagination store and publishes the result two ways:
//! - a `watch` channel holding the latest complete `ClientSnapshot`
//! - a `broadcast` channel of per-kind `ClientEvent`s
//!
//! Replies are correlated to requests by kind only. When two requests of
//! the same kind are in flight, whichever reply arrives last wins.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use gala_models::{Chat, ChatMessage, Identity};

use crate::connection::ConnectionState;
use crate::envelope::{OutputType, RequestEnvelope, ResponseEnvelope, ResponsePayload};
use crate::store::{MergeMode, PageSnapshot, PaginationStore};

/// Everything a consumer may read, captured at one consistent point.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    pub connection: ConnectionState,
    pub is_connected: bool,
    pub timed_out: bool,
    /// True only while a chat-list reply is being merged.
    pub loading_chat_list: bool,
    pub identity: Option<Identity>,
    pub last_error: Option<String>,
    pub chat_list: Arc<PageSnapshot<Chat>>,
    pub conversations: HashMap<String, Arc<PageSnapshot<ChatMessage>>>,
}

impl Default for ClientSnapshot {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Idle,
            is_connected: false,
            timed_out: false,
            loading_chat_list: false,
            identity: None,
            last_error: None,
            chat_list: Arc::default(),
            conversations: HashMap::new(),
        }
    }
}

impl ClientSnapshot {
    pub fn conversation(&self, counterpart: &str) -> Option<&Arc<PageSnapshot<ChatMessage>>> {
        self.conversations.get(counterpart)
    }
}

/// Notifications fanned out to subscribers after state is updated.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// Automatic retries are exhausted.
    TimedOut,
    /// The server acknowledged `REGISTER`.
    Registered,
    /// The server acknowledged `SWITCH`.
    Switched,
    /// The chat list was replaced or extended.
    ChatListUpdated { has_more: bool },
    /// A conversation's history was replaced or extended.
    MessagesUpdated { counterpart: String, has_more: bool },
    /// A single message was acknowledged or pushed.
    MessageReceived { counterpart: String, message: ChatMessage },
}

/// Applies responses to the store and publishes snapshots and events.
pub struct Dispatcher {
    store: PaginationStore,
    state: ClientSnapshot,
    snapshot_tx: watch::Sender<Arc<ClientSnapshot>>,
    events: broadcast::Sender<ClientEvent>,
    /// Conversation of the most recent request per reply kind.
    pending_conversation: HashMap<OutputType, String>,
}

impl Dispatcher {
    pub fn new(event_capacity: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(ClientSnapshot::default()));
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            store: PaginationStore::new(),
            state: ClientSnapshot::default(),
            snapshot_tx,
            events,
            pending_conversation: HashMap::new(),
        }
    }

    pub fn state_receiver(&self) -> watch::Receiver<Arc<ClientSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<ClientEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ClientSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    fn publish(&mut self) {
        self.state.chat_list = Arc::clone(self.store.chat_list());
        self.state.conversations = self.store.conversations().clone();
        self.snapshot_tx.send_replace(Arc::new(self.state.clone()));
    }

    fn emit(&self, event: ClientEvent) {
        match self.events.send(event) {
            Ok(count) => debug!("client event delivered to {count} subscriber(s)"),
            Err(_) => debug!("no subscribers for client event"),
        }
    }

    /// Record a request that was put on the wire.
    pub fn note_request(&mut self, request: &RequestEnvelope) {
        let expected = request.input_type().expected_output();
        if let Some(receiver) = request.receiver_id() {
            if expected.is_message_page() {
                self.pending_conversation.insert(expected, receiver.to_string());
            }
        }
        debug!("sent {} (awaiting {expected})", request.input_type());
    }

    /// Publish a connection state change.
    pub fn set_connection(&mut self, state: ConnectionState, last_error: Option<&str>) {
        let changed = self.state.connection != state;
        self.state.connection = state;
        self.state.is_connected = state == ConnectionState::Open;
        self.state.timed_out = state == ConnectionState::TimedOut;
        self.state.last_error = last_error.map(str::to_string);
        self.publish();
        if changed {
            self.emit(ClientEvent::StateChanged(state));
            if state == ConnectionState::TimedOut {
                self.emit(ClientEvent::TimedOut);
            }
        }
    }

    /// Bind a new identity. All streams belong to the old identity and
    /// are reset.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        if self.state.identity != identity {
            self.store.clear();
            self.pending_conversation.clear();
        }
        self.state.identity = identity;
        self.publish();
    }

    /// Apply one parsed response.
    pub fn apply(&mut self, response: ResponseEnvelope) {
        let kind = response.output_type;
        match response.payload {
            ResponsePayload::ChatPage(page) => {
                let mode = if kind == OutputType::GetMoreChatList {
                    MergeMode::Append
                } else {
                    MergeMode::Replace
                };
                self.state.loading_chat_list = true;
                self.publish();
                self.store.apply_chat_page(page, mode);
                self.state.loading_chat_list = false;
                self.publish();
                let has_more = self.store.chat_list().has_more;
                debug!(
                    "chat list {mode:?}: {} chat(s), page {}, has_more={has_more}",
                    self.store.chat_list().len(),
                    self.store.chat_list().current_page
                );
                self.emit(ClientEvent::ChatListUpdated { has_more });
            }
            ResponsePayload::MessagePage { conversation, page } => {
                let own_id = self.state.identity.as_ref().map(|i| i.sender_id.clone());
                let counterpart = conversation
                    .or_else(|| self.pending_conversation.get(&kind).cloned())
                    .or_else(|| {
                        let own = own_id.as_deref()?;
                        page.documents.first().map(|m| m.counterpart_of(own).to_string())
                    });
                let Some(counterpart) = counterpart else {
                    warn!("dropping {kind} reply: cannot tell which conversation it belongs to");
                    return;
                };
                let mode = if kind == OutputType::GetEarlierMessages {
                    MergeMode::Append
                } else {
                    MergeMode::Replace
                };
                self.store.apply_message_page(&counterpart, page, mode);
                self.publish();
                let has_more = self
                    .store
                    .conversation(&counterpart)
                    .is_some_and(|s| s.has_more);
                self.emit(ClientEvent::MessagesUpdated { counterpart, has_more });
            }
            ResponsePayload::Message(message) => {
                let counterpart = match self.state.identity {
                    Some(ref identity) => message.counterpart_of(&identity.sender_id).to_string(),
                    None => message.receiver_id.clone(),
                };
                self.store.push_message(&counterpart, message.clone());
                self.publish();
                self.emit(ClientEvent::MessageReceived { counterpart, message });
            }
            ResponsePayload::Ack(_) => match kind {
                OutputType::Register => self.emit(ClientEvent::Registered),
                OutputType::Switch => self.emit(ClientEvent::Switched),
                other => debug!("ignoring bare ack for {other}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gala_models::{Counterpart, Page, PageRequest};

    fn chat(id: &str) -> Chat {
        Chat {
            id: id.to_string(),
            counterpart: Counterpart { id: format!("v-{id}"), name: None, image: None },
            latest_message: None,
            is_image: false,
            timestamp: None,
        }
    }

    fn message(id: &str, from: &str, to: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            chat_id: None,
            sender_id: from.into(),
            receiver_id: to.into(),
            content: "hello".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            is_image: false,
        }
    }

    fn chat_response(kind: OutputType, ids: &[&str], page: u32, has_more: bool) -> ResponseEnvelope {
        ResponseEnvelope {
            output_type: kind,
            payload: ResponsePayload::ChatPage(Page {
                documents: ids.iter().map(|id| chat(id)).collect(),
                total_pages: 9,
                current_page: page,
                has_more,
            }),
        }
    }

    fn chat_ids(d: &Dispatcher) -> Vec<String> {
        d.snapshot().chat_list.documents.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_chat_list_replace_then_append() {
        let mut d = Dispatcher::new(16);
        d.apply(chat_response(OutputType::GetChatList, &["m1", "m2", "m3"], 1, true));
        d.apply(chat_response(OutputType::GetMoreChatList, &["m4", "m5"], 2, false));
        assert_eq!(chat_ids(&d), vec!["m1", "m2", "m3", "m4", "m5"]);
        assert!(!d.snapshot().chat_list.has_more);
        assert!(!d.snapshot().loading_chat_list);

        d.apply(chat_response(OutputType::GetChatList, &["x"], 1, true));
        assert_eq!(chat_ids(&d), vec!["x"]);
        assert!(d.snapshot().chat_list.has_more);
    }

    #[test]
    fn test_loading_flag_brackets_merge() {
        let mut d = Dispatcher::new(16);
        let mut rx = d.state_receiver();
        let _ = rx.borrow_and_update();

        d.apply(chat_response(OutputType::GetChatList, &["a"], 1, false));
        // The watch keeps only the final value; the bracket is closed.
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert!(!snap.loading_chat_list);
        assert_eq!(snap.chat_list.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let mut d = Dispatcher::new(16);
        let mut rx = d.subscribe();
        d.apply(chat_response(OutputType::GetChatList, &["a"], 1, true));
        assert_eq!(rx.recv().await.unwrap(), ClientEvent::ChatListUpdated { has_more: true });

        d.set_connection(ConnectionState::Open, None);
        assert_eq!(rx.recv().await.unwrap(), ClientEvent::StateChanged(ConnectionState::Open));

        d.set_connection(ConnectionState::TimedOut, Some("refused"));
        assert_eq!(rx.recv().await.unwrap(), ClientEvent::StateChanged(ConnectionState::TimedOut));
        assert_eq!(rx.recv().await.unwrap(), ClientEvent::TimedOut);
        assert!(d.snapshot().timed_out);
        assert_eq!(d.snapshot().last_error.as_deref(), Some("refused"));
    }

    #[test]
    fn test_message_page_uses_pending_conversation() {
        let mut d = Dispatcher::new(16);
        d.set_identity(Some(Identity::client("c-1")));
        let req = RequestEnvelope::messages(Identity::client("c-1"), "v-7", PageRequest::first(10).unwrap());
        d.note_request(&req);

        d.apply(ResponseEnvelope {
            output_type: OutputType::GetMessages,
            payload: ResponsePayload::MessagePage {
                conversation: None,
                page: Page { documents: vec![], total_pages: 0, current_page: 1, has_more: false },
            },
        });
        assert!(d.snapshot().conversation("v-7").is_some());
    }

    #[test]
    fn test_message_page_falls_back_to_documents() {
        let mut d = Dispatcher::new(16);
        d.set_identity(Some(Identity::vendor("v-1")));
        d.apply(ResponseEnvelope {
            output_type: OutputType::GetMessages,
            payload: ResponsePayload::MessagePage {
                conversation: None,
                page: Page {
                    documents: vec![message("m-2", "c-4", "v-1"), message("m-1", "v-1", "c-4")],
                    total_pages: 2,
                    current_page: 1,
                    has_more: true,
                },
            },
        });
        d.apply(ResponseEnvelope {
            output_type: OutputType::GetEarlierMessages,
            payload: ResponsePayload::MessagePage {
                conversation: Some("c-4".into()),
                page: Page {
                    documents: vec![message("m-0", "c-4", "v-1")],
                    total_pages: 2,
                    current_page: 2,
                    has_more: false,
                },
            },
        });
        let snap = d.snapshot();
        let history = snap.conversation("c-4").unwrap();
        let ids: Vec<_> = history.documents.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m-2", "m-1", "m-0"]);
        assert!(!history.has_more);
    }

    #[test]
    fn test_unattributable_message_page_is_dropped() {
        let mut d = Dispatcher::new(16);
        d.apply(ResponseEnvelope {
            output_type: OutputType::GetMessages,
            payload: ResponsePayload::MessagePage {
                conversation: None,
                page: Page { documents: vec![], total_pages: 0, current_page: 1, has_more: false },
            },
        });
        assert!(d.snapshot().conversations.is_empty());
    }

    #[test]
    fn test_send_ack_keyed_by_counterpart() {
        let mut d = Dispatcher::new(16);
        d.set_identity(Some(Identity::client("c-1")));
        d.apply(ResponseEnvelope {
            output_type: OutputType::SendMessage,
            payload: ResponsePayload::Message(message("m-9", "c-1", "v-3")),
        });
        d.apply(ResponseEnvelope {
            output_type: OutputType::SendMessage,
            payload: ResponsePayload::Message(message("m-10", "v-3", "c-1")),
        });
        let snap = d.snapshot();
        let ids: Vec<_> = snap.conversation("v-3").unwrap().documents.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m-10", "m-9"]);
    }

    #[test]
    fn test_identity_change_resets_streams() {
        let mut d = Dispatcher::new(16);
        d.set_identity(Some(Identity::client("c-1")));
        d.apply(chat_response(OutputType::GetChatList, &["a"], 1, false));
        d.set_identity(Some(Identity::client("c-1")));
        assert_eq!(chat_ids(&d), vec!["a"]);

        d.set_identity(Some(Identity::vendor("v-1")));
        assert!(chat_ids(&d).is_empty());
        assert_eq!(d.snapshot().identity, Some(Identity::vendor("v-1")));
    }
}
