//! Gala Socket - reconnecting, multiplexed real-time messaging client.
//!
//! This crate provides the messaging core that handles:
//! - Typed request/response envelopes and their JSON wire codec
//! - A connection state machine with bounded, fixed-delay reconnects
//! - A websocket transport authenticated by short-lived bearer tokens
//! - Pagination state per stream (chat list, per-conversation history)
//! - Fan-out of state snapshots and events to subscribers
//!
//! UI code talks only to [`MessagingClient`].

pub mod client;
pub mod codec;
pub mod connection;
pub mod dispatcher;
pub mod envelope;
pub mod store;
pub mod timer;
pub mod token;
pub mod transport;

// Re-export key types
pub use client::{ClientBuilder, ClientOptions, MessagingClient};
pub use codec::{FrameCodec, JsonCodec};
pub use connection::{CloseOutcome, ConnectionMachine, ConnectionState, ReconnectPolicy};
pub use dispatcher::{ClientEvent, ClientSnapshot, Dispatcher};
pub use envelope::{InputType, OutputType, RequestEnvelope, ResponseEnvelope, ResponsePayload};
pub use store::{MergeMode, PageSnapshot, PaginationStore};
pub use timer::{Timer, TokioTimer};
pub use token::{HttpTokenProvider, StaticTokenProvider, TokenOptions, TokenProvider};
pub use transport::{build_socket_url, Connector, Link, LinkEvent, WsConnector};
