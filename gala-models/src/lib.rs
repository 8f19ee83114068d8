//! Gala Models - Domain types exchanged with the messaging server.
//!
//! These are the wire-level entities carried inside response envelopes:
//! identities, chats, chat messages, and paginated document sets.

mod document;
pub mod identity;
pub mod chat;
pub mod message;
pub mod page;

// Re-export key types
pub use identity::{Identity, SenderType};
pub use chat::{Chat, Counterpart};
pub use message::ChatMessage;
pub use page::{Page, PageRequest};
