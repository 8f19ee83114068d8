//! CLI command implementations.

pub mod chats;
pub mod config;
pub mod listen;
pub mod messages;
pub mod send;

use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::Password;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use gala_core::config::ConfigHandle;
use gala_core::error::{GalaError, GalaResult};
use gala_socket::{
    ClientEvent, ClientOptions, HttpTokenProvider, MessagingClient, StaticTokenProvider,
    TokenProvider, WsConnector,
};

/// How long a command waits for the server to answer a request.
const REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Pick a token source: flag > configured token URL > interactive prompt.
async fn token_provider(config: &ConfigHandle, token: Option<String>) -> GalaResult<Arc<dyn TokenProvider>> {
    if let Some(token) = token {
        return Ok(Arc::new(StaticTokenProvider::new(token)));
    }
    let server = config.read().await.server.clone();
    if !server.token_url.is_empty() {
        return Ok(Arc::new(HttpTokenProvider::from_config(&server)?));
    }
    let token = Password::new()
        .with_prompt("Bearer token")
        .interact()
        .map_err(|e| GalaError::Internal(e.to_string()))?;
    Ok(Arc::new(StaticTokenProvider::new(token)))
}

/// Longest a full retry cycle can take: every attempt times out and
/// every delay elapses.
fn connect_patience(options: &ClientOptions) -> Duration {
    let retries = options.reconnect.max_retries;
    options
        .connect_timeout
        .saturating_mul(retries.saturating_add(1))
        .saturating_add(options.reconnect.delay.saturating_mul(retries))
}

/// Start a client from config and wait until the socket is open.
pub async fn connect(config: &ConfigHandle, token: Option<String>) -> GalaResult<MessagingClient> {
    let options = ClientOptions::from_config(&*config.read().await)?;
    let tokens = token_provider(config, token).await?;
    let endpoint = options.endpoint.clone();
    let patience = connect_patience(&options);

    let client = MessagingClient::builder(options, Arc::new(WsConnector), tokens).start();
    let mut state = client.state_receiver();
    let opened = tokio::time::timeout(patience, state.wait_for(|s| s.is_connected || s.timed_out))
        .await
        .map_err(|_| GalaError::ConnectTimeout(patience.as_millis() as u64))?
        .map(|s| s.is_connected)
        .map_err(|_| GalaError::SocketDisconnected)?;

    if !opened {
        let reason = client.snapshot().last_error.clone().unwrap_or_default();
        eprintln!(
            "  {} Could not connect to {endpoint}: {reason}",
            style("FAIL").red().bold()
        );
        return Err(GalaError::SocketDisconnected);
    }
    debug!("connected to {endpoint}");
    Ok(client)
}

/// Wait for the first event accepted by `matches`.
///
/// Fails when the connection times out or the server stays silent.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<ClientEvent>,
    mut matches: F,
) -> GalaResult<ClientEvent>
where
    F: FnMut(&ClientEvent) -> bool,
{
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return Ok(event),
                Ok(ClientEvent::TimedOut) => return Err(GalaError::SocketDisconnected),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("missed {n} client events"),
                Err(RecvError::Closed) => return Err(GalaError::SocketDisconnected),
            }
        }
    };
    tokio::time::timeout(REPLY_TIMEOUT, wait)
        .await
        .map_err(|_| GalaError::Protocol("no reply from server".into()))?
}

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars > 3 {
        let head: String = s.chars().take(max_chars - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
        assert_eq!(truncate("abc", 2), "ab");
    }

    #[test]
    fn test_connect_patience() {
        let options = ClientOptions::new("wss://chat.example.com");
        assert_eq!(connect_patience(&options), Duration::from_secs(4 * 10 + 3 * 5));

        let mut huge = options.clone();
        huge.reconnect.max_retries = u32::MAX;
        huge.reconnect.delay = Duration::MAX;
        assert_eq!(connect_patience(&huge), Duration::MAX);
    }
}
