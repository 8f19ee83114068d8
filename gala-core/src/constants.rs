//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Gala";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Automatic reconnect attempts before the connection times out.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Fixed delay between reconnect attempts in seconds.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Default socket connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Upper bounds accepted from `config.toml`.
pub const MAX_CONNECT_TIMEOUT_MS: u64 = 300_000;
pub const MAX_RECONNECT_ATTEMPTS_LIMIT: u32 = 100;
pub const MAX_RECONNECT_DELAY_SECS: u64 = 3_600;

/// Default number of chats per chat-list page.
pub const DEFAULT_CHAT_PAGE_SIZE: u32 = 20;

/// Default number of messages per history page.
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 30;

/// Capacity of the client event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Query parameter carrying the bearer token on the socket URL.
pub const TOKEN_QUERY_PARAM: &str = "token";
