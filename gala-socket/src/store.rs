//! Pagination state per stream.
//!
//! Streams are held behind `Arc` and modified copy-on-write, so snapshots
//! handed to subscribers stay immutable while the dispatcher merges the
//! next page. The store never requests pages itself; consumers read
//! `has_more` and decide.

use std::collections::HashMap;
use std::sync::Arc;

use gala_models::{Chat, ChatMessage, Page};

/// Accumulated documents plus the cursor of one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot<T> {
    pub documents: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

impl<T> Default for PageSnapshot<T> {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            current_page: 0,
            total_pages: 0,
            has_more: false,
        }
    }
}

/// How a page combines with what the stream already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Discard existing documents.
    Replace,
    /// Keep existing documents, new ones after them.
    Append,
}

impl<T: Clone> PageSnapshot<T> {
    /// Merge a page and take its cursor.
    pub fn merge(&mut self, page: Page<T>, mode: MergeMode) {
        match mode {
            MergeMode::Replace => self.documents = page.documents,
            MergeMode::Append => self.documents.extend(page.documents),
        }
        self.current_page = page.current_page;
        self.total_pages = page.total_pages;
        self.has_more = page.has_more;
    }

    /// Page number to request next, if the server reported more.
    pub fn next_page(&self) -> Option<u32> {
        self.has_more.then(|| self.current_page.saturating_add(1))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Chat list plus one history stream per conversation.
///
/// Conversations are keyed by the counterpart's id. History is
/// newest-first: earlier pages go to the tail, new messages to the head.
#[derive(Debug, Clone, Default)]
pub struct PaginationStore {
    chat_list: Arc<PageSnapshot<Chat>>,
    conversations: HashMap<String, Arc<PageSnapshot<ChatMessage>>>,
}

impl PaginationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_list(&self) -> &Arc<PageSnapshot<Chat>> {
        &self.chat_list
    }

    pub fn conversation(&self, counterpart: &str) -> Option<&Arc<PageSnapshot<ChatMessage>>> {
        self.conversations.get(counterpart)
    }

    pub fn conversations(&self) -> &HashMap<String, Arc<PageSnapshot<ChatMessage>>> {
        &self.conversations
    }

    pub fn apply_chat_page(&mut self, page: Page<Chat>, mode: MergeMode) {
        Arc::make_mut(&mut self.chat_list).merge(page, mode);
    }

    pub fn apply_message_page(&mut self, counterpart: &str, page: Page<ChatMessage>, mode: MergeMode) {
        let stream = self.conversations.entry(counterpart.to_string()).or_default();
        Arc::make_mut(stream).merge(page, mode);
    }

    /// Put a single new message at the head of its conversation. The
    /// cursor is left alone. A message already present by id is replaced
    /// in place.
    pub fn push_message(&mut self, counterpart: &str, message: ChatMessage) {
        let stream = Arc::make_mut(self.conversations.entry(counterpart.to_string()).or_default());
        if let Some(existing) = stream.documents.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            stream.documents.insert(0, message);
        }
    }

    pub fn reset_chat_list(&mut self) {
        self.chat_list = Arc::default();
    }

    pub fn clear(&mut self) {
        self.reset_chat_list();
        self.conversations.clear();
    }
}
