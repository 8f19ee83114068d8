//! Socket transport.
//!
//! A `Connector` turns a URL into a `Link`: a pair of channels carrying text
//! frames out and `LinkEvent`s in. The websocket implementation runs one
//! task per link that owns the socket; dropping the link's outgoing sender
//! closes the socket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use gala_core::constants::TOKEN_QUERY_PARAM;
use gala_core::error::{GalaError, GalaResult};

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame arrived.
    Frame(String),
    /// The socket reported an error. A `Closed` may or may not follow.
    Error(String),
    /// The socket is gone.
    Closed,
}

/// One live socket session, seen as channels.
#[derive(Debug)]
pub struct Link {
    pub outgoing: mpsc::UnboundedSender<String>,
    pub incoming: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// Transmit a frame. Fails when the socket task has already exited.
    pub fn send(&self, frame: String) -> GalaResult<()> {
        self.outgoing
            .send(frame)
            .map_err(|_| GalaError::SocketDisconnected)
    }
}

/// Opens links.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> GalaResult<Link>;
}

/// `<endpoint>?token=<token>`, with the token query-encoded.
pub fn build_socket_url(endpoint: &str, token: &str) -> GalaResult<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| GalaError::Config(format!("invalid socket endpoint {endpoint}: {e}")))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(GalaError::Config(format!(
            "socket endpoint must use ws or wss, got {}",
            url.scheme()
        )));
    }
    url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
    Ok(url.into())
}

/// Websocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> GalaResult<Link> {
        let (mut socket, _response) = connect_async(url)
            .await
            .map_err(|e| GalaError::Socket(format!("failed to connect: {e}")))?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<LinkEvent>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(frame) => {
                            if let Err(e) = socket.send(Message::Text(frame)).await {
                                let _ = in_tx.send(LinkEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        None => {
                            debug!("link dropped, closing socket");
                            let _ = socket.close(None).await;
                            return;
                        }
                    },
                    incoming = socket.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(LinkEvent::Frame(text)).is_err() {
                                let _ = socket.close(None).await;
                                return;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => {
                                let _ = in_tx.send(LinkEvent::Frame(text));
                            }
                            Err(_) => warn!("dropping non-utf8 binary frame"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            debug!("server closed socket: {frame:?}");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = in_tx.send(LinkEvent::Error(e.to_string()));
                            break;
                        }
                        None => break,
                    },
                }
            }
            let _ = in_tx.send(LinkEvent::Closed);
        });

        Ok(Link {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_socket_url() {
        let url = build_socket_url("wss://chat.example.com/ws", "abc.def").unwrap();
        assert_eq!(url, "wss://chat.example.com/ws?token=abc.def");
    }

    #[test]
    fn test_build_socket_url_encodes_token() {
        let url = build_socket_url("ws://localhost:9000", "a+b/c=").unwrap();
        assert_eq!(url, "ws://localhost:9000/?token=a%2Bb%2Fc%3D");
    }

    #[test]
    fn test_build_socket_url_rejects_http() {
        assert!(build_socket_url("https://chat.example.com", "t").is_err());
        assert!(build_socket_url("not a url", "t").is_err());
    }

    #[tokio::test]
    async fn test_link_send_after_task_exit() {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let link = Link { outgoing: out_tx, incoming: in_rx };
        drop(out_rx);
        assert!(matches!(link.send("x".into()), Err(GalaError::SocketDisconnected)));
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        let err = WsConnector.connect("ws://127.0.0.1:9/").await.unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_ws_connector_attempts_tls_for_wss() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // Hang up mid-handshake.
            let _ = listener.accept().await;
        });

        let url = format!("wss://127.0.0.1:{port}/ws?token=t");
        let err = WsConnector.connect(&url).await.unwrap_err();
        let message = match err {
            GalaError::Socket(message) => message,
            other => panic!("expected a socket error, got {other:?}"),
        };
        assert!(!message.contains("TLS support not compiled in"), "{message}");
    }
}
