//! Shared test utilities for client integration tests.
//!
//! The mock connector hands every opened link to the test as a
//! `MockSocket`, the manual timer only fires when told to, and the token
//! provider counts how often it was asked.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use gala_core::error::{GalaError, GalaResult};
use gala_models::Identity;
use gala_socket::{
    ClientOptions, Connector, Link, LinkEvent, MessagingClient, ReconnectPolicy, Timer,
    TokenOptions, TokenProvider,
};

pub const ENDPOINT: &str = "ws://chat.test/socket";
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

// ---- Mock socket ----

/// Server side of one link opened by the client.
pub struct MockSocket {
    pub url: String,
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl MockSocket {
    /// Next frame the client transmitted, as sent.
    pub async fn next_sent_raw(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.sent.recv())
            .await
            .expect("timed out waiting for an outgoing frame")
            .expect("link closed before a frame was sent")
    }

    /// Next frame the client transmitted, parsed as JSON.
    pub async fn next_sent(&mut self) -> Value {
        let frame = self.next_sent_raw().await;
        serde_json::from_str(&frame).expect("client sent invalid JSON")
    }

    /// Frames already transmitted, without waiting.
    pub fn drain_sent(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(serde_json::from_str(&frame).expect("client sent invalid JSON"));
        }
        frames
    }

    pub fn push(&self, frame: Value) {
        self.push_raw(frame.to_string());
    }

    pub fn push_raw(&self, frame: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Frame(frame.into()));
    }

    pub fn close(&self) {
        let _ = self.events.send(LinkEvent::Closed);
    }

    pub fn fail(&self, error: &str) {
        let _ = self.events.send(LinkEvent::Error(error.to_string()));
    }

    /// True once the client has dropped its end of the link.
    pub fn is_dropped(&self) -> bool {
        self.events.is_closed()
    }
}

/// Connector whose links are driven by the test.
pub struct MockConnector {
    sockets: mpsc::UnboundedSender<MockSocket>,
    attempts: AtomicUsize,
    refuse: AtomicBool,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockSocket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            sockets: tx,
            attempts: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        });
        (connector, rx)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make later connect attempts fail.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> GalaResult<Link> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(GalaError::Socket("connection refused".into()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.sockets.send(MockSocket {
            url: url.to_string(),
            sent: out_rx,
            events: in_tx,
        });
        Ok(Link {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

// ---- Manual timer ----

/// Timer whose sleeps complete only when `fire` is called.
#[derive(Default)]
pub struct ManualTimer {
    waiting: Mutex<Vec<oneshot::Sender<()>>>,
    delays: Mutex<Vec<Duration>>,
}

impl ManualTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sleeps currently waiting and not cancelled.
    pub fn pending(&self) -> usize {
        self.waiting
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Complete every waiting sleep. Returns how many were still alive.
    pub fn fire(&self) -> usize {
        let waiting: Vec<_> = self.waiting.lock().unwrap().drain(..).collect();
        waiting
            .into_iter()
            .map(|tx| tx.send(()))
            .filter(Result::is_ok)
            .count()
    }

    /// Every delay requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timer for ManualTimer {
    async fn sleep(&self, duration: Duration) {
        let (tx, rx) = oneshot::channel();
        {
            self.delays.lock().unwrap().push(duration);
            self.waiting.lock().unwrap().push(tx);
        }
        let _ = rx.await;
    }
}

// ---- Token provider ----

/// Issues `token-1`, `token-2`, ... and records every request.
#[derive(Default)]
pub struct CountingTokens {
    calls: AtomicUsize,
    cached_requests: AtomicUsize,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl CountingTokens {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that did not ask to bypass the cache.
    pub fn cached_requests(&self) -> usize {
        self.cached_requests.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make later requests hang forever.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenProvider for CountingTokens {
    async fn token(&self, options: &TokenOptions) -> GalaResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !options.skip_cache {
            self.cached_requests.fetch_add(1, Ordering::SeqCst);
        }
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GalaError::Token("identity service unavailable".into()));
        }
        Ok(format!("token-{n}"))
    }
}

// ---- Harness ----

pub struct Harness {
    pub client: MessagingClient,
    pub connector: Arc<MockConnector>,
    pub sockets: mpsc::UnboundedReceiver<MockSocket>,
    pub timer: Arc<ManualTimer>,
    pub tokens: Arc<CountingTokens>,
}

impl Harness {
    /// Client registered as `c-1` with the default retry policy.
    pub fn start() -> Self {
        Self::start_with(Some(Identity::client("c-1")))
    }

    pub fn start_with(identity: Option<Identity>) -> Self {
        Self::start_with_tokens(identity, CountingTokens::new())
    }

    /// Start against a prepared token provider, e.g. one already stalled.
    pub fn start_with_tokens(identity: Option<Identity>, tokens: Arc<CountingTokens>) -> Self {
        let (connector, sockets) = MockConnector::new();
        let timer = ManualTimer::new();

        let mut options = ClientOptions::new(ENDPOINT).with_reconnect(ReconnectPolicy {
            max_retries: 3,
            delay: RETRY_DELAY,
        });
        options.chat_page_size = 3;
        options.message_page_size = 2;
        if let Some(identity) = identity {
            options = options.with_identity(identity);
        }

        let client = MessagingClient::builder(options, connector.clone(), tokens.clone())
            .with_timer(timer.clone())
            .start();

        Self {
            client,
            connector,
            sockets,
            timer,
            tokens,
        }
    }

    /// The next link the client opens.
    pub async fn next_socket(&mut self) -> MockSocket {
        tokio::time::timeout(Duration::from_secs(2), self.sockets.recv())
            .await
            .expect("timed out waiting for a connect")
            .expect("connector dropped")
    }

    /// Wait for a link, then for the snapshot to report it open.
    pub async fn open_socket(&mut self) -> MockSocket {
        let socket = self.next_socket().await;
        let client = &self.client;
        eventually(|| client.is_connected()).await;
        socket
    }
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

// ---- Server frames ----

pub fn chat(id: &str) -> Value {
    json!({
        "_id": id,
        "counterpart": { "_id": format!("v-{id}"), "name": format!("Vendor {id}") },
        "latestMessage": "hi",
        "timestamp": "2024-05-01T10:00:00Z"
    })
}

pub fn message(id: &str, from: &str, to: &str) -> Value {
    json!({
        "_id": id,
        "senderId": from,
        "receiverId": to,
        "content": format!("body {id}"),
        "timestamp": "2024-05-01T10:00:00Z",
        "isImage": false
    })
}

pub fn page_frame(kind: &str, documents: Vec<Value>, current_page: u32, has_more: bool) -> Value {
    json!({
        "outputType": kind,
        "result": {
            "documents": documents,
            "totalPages": 9,
            "currentPage": current_page,
            "hasMore": has_more
        }
    })
}
