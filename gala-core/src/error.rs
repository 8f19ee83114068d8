//! `GalaError`, the one error type every Gala crate returns.
//!
//! Connection-level failures never reach callers of the client facade;
//! the actor feeds every failed connect attempt into the reconnect path.
//! `is_connection_failure` separates transient network trouble from a
//! misconfigured endpoint, which is logged louder.

use thiserror::Error;

pub type GalaResult<T> = Result<T, GalaError>;

#[derive(Error, Debug)]
pub enum GalaError {
    /// `config.toml` could not be read, parsed or validated.
    #[error("config: {0}")]
    Config(String),

    /// A setting the operation needs is empty or absent.
    #[error("setting not configured: {0}")]
    MissingConfig(String),

    /// Transport failure while opening or using the socket.
    #[error("socket: {0}")]
    Socket(String),

    /// A frame was handed to a socket that is not open.
    #[error("socket not open")]
    SocketDisconnected,

    /// The socket handshake exceeded `server.connect_timeout_ms`.
    #[error("connect timed out after {0}ms")]
    ConnectTimeout(u64),

    /// The token provider returned an error or an unusable body.
    #[error("token: {0}")]
    Token(String),

    #[error("http: {0}")]
    Http(String),

    /// An inbound frame did not match the wire protocol.
    #[error("protocol: {0}")]
    Protocol(String),

    /// A request envelope was rejected before encoding.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("json: {0}")]
    Serialization(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal prompts and other local plumbing.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GalaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for GalaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl GalaError {
    /// Whether this failure should feed the reconnect path rather than
    /// being reported to the caller.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Socket(_)
                | Self::SocketDisconnected
                | Self::ConnectTimeout(_)
                | Self::Token(_)
                | Self::Http(_)
        )
    }
}
