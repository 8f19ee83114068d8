//! Public messaging client.
//!
//! `MessagingClient` is the only surface UI code touches. It spawns one
//! actor task that owns the connection state machine, the live link, the
//! dispatcher, the in-flight connect attempt and the single pending
//! reconnect timer. Every mutation goes through that task, so inbound
//! frames are processed strictly in arrival order. Connect attempts run
//! as a `select!` arm, so a slow token provider never holds up commands. The facade talks to the actor over an unbounded command channel
//! and reads state from a `watch` of immutable snapshots.
//!
//! Nothing here returns transport errors. Failures surface as snapshot
//! flags (`is_connected`, `timed_out`) and log lines.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gala_core::config::AppConfig;
use gala_core::constants;
use gala_core::error::{GalaError, GalaResult};
use gala_models::{Chat, ChatMessage, Identity, PageRequest};

use crate::codec::{FrameCodec, JsonCodec};
use crate::connection::{CloseOutcome, ConnectionMachine, ConnectionState, ReconnectPolicy};
use crate::dispatcher::{ClientEvent, ClientSnapshot, Dispatcher};
use crate::envelope::RequestEnvelope;
use crate::store::PageSnapshot;
use crate::timer::{Timer, TokioTimer};
use crate::token::{TokenOptions, TokenProvider};
use crate::transport::{build_socket_url, Connector, Link, LinkEvent};

/// Static client settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Socket endpoint without the token parameter.
    pub endpoint: String,
    /// Identity registered on every open.
    pub identity: Option<Identity>,
    pub reconnect: ReconnectPolicy,
    /// Bounds token acquisition plus socket open.
    pub connect_timeout: Duration,
    pub chat_page_size: u32,
    pub message_page_size: u32,
    pub event_capacity: usize,
}

impl ClientOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_millis(constants::DEFAULT_CONNECT_TIMEOUT_MS),
            chat_page_size: constants::DEFAULT_CHAT_PAGE_SIZE,
            message_page_size: constants::DEFAULT_MESSAGE_PAGE_SIZE,
            event_capacity: constants::EVENT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Build options from the application config.
    pub fn from_config(config: &AppConfig) -> GalaResult<Self> {
        config.validate()?;
        if !config.is_server_configured() {
            return Err(GalaError::MissingConfig("server.endpoint".into()));
        }
        let identity = config
            .identity
            .as_ref()
            .map(Identity::from_config)
            .transpose()?;
        Ok(Self {
            endpoint: AppConfig::sanitize_endpoint(&config.server.endpoint),
            identity,
            reconnect: ReconnectPolicy::from_settings(&config.reconnect),
            connect_timeout: Duration::from_millis(config.server.connect_timeout_ms),
            chat_page_size: config.pagination.chat_page_size,
            message_page_size: config.pagination.message_page_size,
            event_capacity: constants::EVENT_CHANNEL_CAPACITY,
        })
    }
}

enum Command {
    Send(RequestEnvelope),
    Reconnect,
    SwitchIdentity(Identity),
    Shutdown(oneshot::Sender<()>),
}

/// Assembles a client from its collaborators.
pub struct ClientBuilder {
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    timer: Arc<dyn Timer>,
    codec: Arc<dyn FrameCodec>,
}

impl ClientBuilder {
    /// Replace the real-time timer (tests fire reconnects manually).
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn FrameCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Spawn the actor and start connecting. Must run inside a tokio runtime.
    pub fn start(self) -> MessagingClient {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(self.options.event_capacity);
        dispatcher.set_identity(self.options.identity.clone());
        let state_rx = dispatcher.state_receiver();
        let events = dispatcher.event_sender();

        let page_sizes = (self.options.chat_page_size, self.options.message_page_size);
        let actor = Actor {
            machine: ConnectionMachine::new(self.options.reconnect),
            identity: self.options.identity.clone(),
            options: self.options,
            connector: self.connector,
            tokens: self.tokens,
            timer: self.timer,
            codec: self.codec,
            dispatcher,
            link: None,
            opening: None,
            pending_reconnect: None,
            commands: command_rx,
        };
        let task = tokio::spawn(actor.run());

        MessagingClient {
            commands: command_tx,
            state_rx,
            events,
            task: Some(task),
            chat_page_size: page_sizes.0,
            message_page_size: page_sizes.1,
        }
    }
}

/// Handle to a running messaging session.
///
/// Dropping the handle aborts the actor, which closes the socket and
/// cancels any pending reconnect. Prefer `shutdown` for an orderly close.
pub struct MessagingClient {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<Arc<ClientSnapshot>>,
    events: broadcast::Sender<ClientEvent>,
    task: Option<JoinHandle<()>>,
    chat_page_size: u32,
    message_page_size: u32,
}

impl MessagingClient {
    pub fn builder(
        options: ClientOptions,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
    ) -> ClientBuilder {
        ClientBuilder {
            options,
            connector,
            tokens,
            timer: Arc::new(TokioTimer),
            codec: Arc::new(JsonCodec),
        }
    }

    // ─── State ───────────────────────────────────────────────────────

    /// The latest consistent snapshot.
    pub fn snapshot(&self) -> Arc<ClientSnapshot> {
        self.state_rx.borrow().clone()
    }

    /// Watch snapshots as they are published.
    pub fn state_receiver(&self) -> watch::Receiver<Arc<ClientSnapshot>> {
        self.state_rx.clone()
    }

    /// Subscribe to per-kind events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().connection
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected
    }

    pub fn timed_out(&self) -> bool {
        self.state_rx.borrow().timed_out
    }

    pub fn loading_chat_list(&self) -> bool {
        self.state_rx.borrow().loading_chat_list
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state_rx.borrow().identity.clone()
    }

    pub fn chat_list(&self) -> Arc<PageSnapshot<Chat>> {
        Arc::clone(&self.state_rx.borrow().chat_list)
    }

    pub fn messages(&self, counterpart: &str) -> Option<Arc<PageSnapshot<ChatMessage>>> {
        self.state_rx.borrow().conversation(counterpart).cloned()
    }

    // ─── Commands ────────────────────────────────────────────────────

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("messaging client is stopped, command dropped");
        }
    }

    /// Queue a request for transmission. Returns immediately; the request
    /// is dropped with a warning if the socket is not open when the actor
    /// handles it.
    pub fn send(&self, request: RequestEnvelope) {
        self.command(Command::Send(request));
    }

    /// Reset the retry counter, leave `TimedOut`, and connect again. An
    /// open socket is closed first.
    pub fn reconnect(&self) {
        self.command(Command::Reconnect);
    }

    /// Re-bind the session to another identity with `SWITCH`. All streams
    /// are reset; later reconnects register the new identity.
    pub fn switch_identity(&self, identity: Identity) {
        self.command(Command::SwitchIdentity(identity));
    }

    fn send_as(&self, what: &str, build: impl FnOnce(Identity) -> RequestEnvelope) -> bool {
        match self.identity() {
            Some(identity) => {
                self.send(build(identity));
                true
            }
            None => {
                warn!("{what} needs a registered identity, request dropped");
                false
            }
        }
    }

    fn first_page(size: u32) -> PageRequest {
        PageRequest { page_number: 1, page_size: size }
    }

    /// Request the first chat-list page (replaces the list).
    pub fn request_chat_list(&self) -> bool {
        let page = Self::first_page(self.chat_page_size);
        self.send_as("GET_CHAT_LIST", |id| RequestEnvelope::chat_list(id, page))
    }

    /// Request the next chat-list page. Does nothing unless the last reply
    /// reported `has_more`.
    pub fn request_more_chat_list(&self) -> bool {
        let Some(next) = self.chat_list().next_page() else {
            debug!("chat list has no more pages");
            return false;
        };
        let page = PageRequest { page_number: next, page_size: self.chat_page_size };
        self.send_as("GET_MORE_CHAT_LIST", |id| RequestEnvelope::more_chat_list(id, page))
    }

    /// Request the newest history page of a conversation (replaces it).
    pub fn request_messages(&self, counterpart: &str) -> bool {
        let page = Self::first_page(self.message_page_size);
        self.send_as("GET_MESSAGES", |id| RequestEnvelope::messages(id, counterpart, page))
    }

    /// Request the next older history page. Does nothing unless the last
    /// reply for that conversation reported `has_more`.
    pub fn request_earlier_messages(&self, counterpart: &str) -> bool {
        let Some(next) = self.messages(counterpart).and_then(|s| s.next_page()) else {
            debug!("conversation {counterpart} has no earlier pages");
            return false;
        };
        let page = PageRequest { page_number: next, page_size: self.message_page_size };
        self.send_as("GET_EARLIER_MESSAGES", |id| {
            RequestEnvelope::earlier_messages(id, counterpart, page)
        })
    }

    pub fn send_text(&self, receiver_id: &str, content: &str) -> bool {
        self.send_as("SEND_MESSAGE", |id| {
            RequestEnvelope::send_message(id, receiver_id, content, false)
        })
    }

    /// Send an already-uploaded image by URL.
    pub fn send_image(&self, receiver_id: &str, image_url: &str) -> bool {
        self.send_as("SEND_MESSAGE", |id| {
            RequestEnvelope::send_message(id, receiver_id, image_url, true)
        })
    }

    /// Close the socket, cancel any pending reconnect and wait for the
    /// actor to exit.
    pub async fn shutdown(mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for MessagingClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type ReconnectDelay = Pin<Box<dyn Future<Output = ()> + Send>>;
type ConnectAttempt = Pin<Box<dyn Future<Output = GalaResult<Link>> + Send>>;

/// Single owner of all mutable session state.
struct Actor {
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    timer: Arc<dyn Timer>,
    codec: Arc<dyn FrameCodec>,
    machine: ConnectionMachine,
    dispatcher: Dispatcher,
    identity: Option<Identity>,
    link: Option<Link>,
    opening: Option<ConnectAttempt>,
    pending_reconnect: Option<ReconnectDelay>,
    commands: mpsc::UnboundedReceiver<Command>,
}

async fn next_link_event(link: &mut Option<Link>) -> LinkEvent {
    match link {
        Some(link) => link.incoming.recv().await.unwrap_or(LinkEvent::Closed),
        None => std::future::pending().await,
    }
}

async fn reconnect_due(pending: &mut Option<ReconnectDelay>) {
    match pending {
        Some(delay) => delay.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn link_opened(opening: &mut Option<ConnectAttempt>) -> GalaResult<Link> {
    match opening {
        Some(attempt) => attempt.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Fetch a fresh token and open the socket, bounded by `connect_timeout`.
async fn open_link(
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    endpoint: String,
    connect_timeout: Duration,
) -> GalaResult<Link> {
    let attempt = async {
        let token = tokens
            .token(&TokenOptions { skip_cache: true })
            .await
            .map_err(|e| match e {
                GalaError::Token(_) => e,
                other => GalaError::Token(other.to_string()),
            })?;
        let url = build_socket_url(&endpoint, &token)?;
        connector.connect(&url).await
    };
    let timeout_ms = connect_timeout.as_millis() as u64;
    tokio::time::timeout(connect_timeout, attempt)
        .await
        .map_err(|_| GalaError::ConnectTimeout(timeout_ms))?
}

impl Actor {
    async fn run(mut self) {
        self.connect();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => {
                        self.teardown();
                        let _ = ack.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown();
                        return;
                    }
                },
                result = link_opened(&mut self.opening) => {
                    self.opening = None;
                    self.finish_connect(result);
                }
                event = next_link_event(&mut self.link) => self.handle_link_event(event),
                _ = reconnect_due(&mut self.pending_reconnect) => {
                    self.pending_reconnect = None;
                    self.connect();
                }
            }
        }
    }

    fn publish_connection(&mut self) {
        self.dispatcher
            .set_connection(self.machine.state(), self.machine.last_error());
    }

    /// Start a connect attempt. It completes in the `select!` loop, so
    /// dropping `opening` cancels it.
    fn connect(&mut self) {
        if !self.machine.begin_connect() {
            return;
        }
        self.publish_connection();
        info!("socket connecting to {}", self.options.endpoint);

        self.opening = Some(Box::pin(open_link(
            Arc::clone(&self.connector),
            Arc::clone(&self.tokens),
            self.options.endpoint.clone(),
            self.options.connect_timeout,
        )));
    }

    fn finish_connect(&mut self, result: GalaResult<Link>) {
        match result {
            Ok(link) => {
                self.link = Some(link);
                self.machine.on_open();
                self.publish_connection();
                if let Some(identity) = self.identity.clone() {
                    self.transmit(RequestEnvelope::register(identity));
                }
            }
            Err(e) => {
                if e.is_connection_failure() {
                    warn!("connect attempt failed: {e}");
                } else {
                    error!("connect attempt failed, check the endpoint: {e}");
                }
                self.machine.on_error(e.to_string());
                self.handle_closed();
            }
        }
    }

    fn handle_closed(&mut self) {
        self.link = None;
        match self.machine.on_close() {
            CloseOutcome::Retry { attempt, delay } => {
                if self.pending_reconnect.is_none() {
                    warn!(
                        "reconnect attempt {attempt}/{} in {:.1}s",
                        self.machine.policy().max_retries,
                        delay.as_secs_f64()
                    );
                    let timer = Arc::clone(&self.timer);
                    self.pending_reconnect = Some(Box::pin(async move { timer.sleep(delay).await }));
                }
            }
            CloseOutcome::TimedOut => {
                error!(
                    "socket timed out after {} attempt(s); waiting for explicit reconnect",
                    self.machine.retry_count()
                );
            }
            CloseOutcome::Stopped => {}
        }
        self.publish_connection();
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Frame(frame) => match self.codec.decode(&frame) {
                Ok(response) => self.dispatcher.apply(response),
                Err(e) => warn!("dropping inbound frame: {e}"),
            },
            LinkEvent::Error(e) => {
                error!("socket error: {e}");
                if self.machine.on_error(e) {
                    self.publish_connection();
                }
                self.handle_closed();
            }
            LinkEvent::Closed => {
                info!("socket closed by peer");
                self.handle_closed();
            }
        }
    }

    /// Encode and put a request on the wire, or drop it with a warning.
    fn transmit(&mut self, request: RequestEnvelope) {
        let kind = request.input_type();
        let Some(link) = self.link.as_ref().filter(|_| self.machine.is_open()) else {
            warn!("socket not open, dropping {kind}");
            return;
        };
        let frame = match self.codec.encode(&request) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping {kind}: {e}");
                return;
            }
        };
        if let Err(e) = link.send(frame) {
            warn!("dropping {kind}: {e}");
            return;
        }
        self.dispatcher.note_request(&request);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send(request) => self.transmit(request),
            Command::Reconnect => {
                info!("explicit reconnect requested");
                self.pending_reconnect = None;
                self.opening = None;
                if self.machine.begin_close() {
                    self.publish_connection();
                }
                self.link = None;
                self.machine.reset_for_reconnect();
                self.publish_connection();
                self.connect();
            }
            Command::SwitchIdentity(identity) => {
                info!("switching identity to {} ({})", identity.sender_id, identity.sender_type);
                self.identity = Some(identity.clone());
                self.dispatcher.set_identity(Some(identity.clone()));
                self.transmit(RequestEnvelope::switch(identity));
            }
            Command::Shutdown(_) => {}
        }
    }

    fn teardown(&mut self) {
        self.pending_reconnect = None;
        if self.opening.take().is_some() {
            debug!("cancelling connect attempt on shutdown");
        }
        self.machine.shutdown();
        if self.link.take().is_some() {
            debug!("closing socket on shutdown");
        }
        self.publish_connection();
        info!("messaging client stopped");
    }
}
