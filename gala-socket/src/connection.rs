//! Connection lifecycle state machine.
//!
//! Pure state, no IO: the client actor feeds it socket outcomes and acts on
//! the decisions it returns. Retry timing is expressed as a delay the caller
//! schedules on its own timer.
//!
//! ```text
//! Idle -> Connecting -> Open -> Closing -> Closed -> Connecting (retry)
//!                                                -> TimedOut (terminal until reconnect)
//! ```

use std::time::Duration;

use tracing::{debug, info};

use gala_core::config::ReconnectSettings;
use gala_core::constants;

/// Connection state exposed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Fetching a token and opening the socket.
    Connecting,
    /// Socket open, frames flow.
    Open,
    /// A close was forced locally and is being processed.
    Closing,
    /// Socket closed; a retry may be pending.
    Closed,
    /// Retries exhausted, waits for an explicit reconnect.
    TimedOut,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Bounded, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive closes tolerated before `TimedOut`.
    pub max_retries: u32,
    /// Delay before each automatic attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::MAX_RECONNECT_ATTEMPTS,
            delay: Duration::from_secs(constants::RECONNECT_DELAY_SECS),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            delay: Duration::from_secs(settings.delay_secs),
        }
    }
}

/// What the caller must do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Schedule a connect attempt after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Retries exhausted; do nothing until `reset_for_reconnect`.
    TimedOut,
    /// The client is shutting down; do nothing.
    Stopped,
}

/// Connection lifecycle and retry bookkeeping for a single socket.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    retry_count: u32,
    last_error: Option<String>,
    policy: ReconnectPolicy,
    shutting_down: bool,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            retry_count: 0,
            last_error: None,
            policy,
            shutting_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_timed_out(&self) -> bool {
        self.state == ConnectionState::TimedOut
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("socket state: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Enter `Connecting`. Returns false when a connect must not start:
    /// already connecting or open, timed out, or shutting down.
    pub fn begin_connect(&mut self) -> bool {
        if self.shutting_down {
            return false;
        }
        match self.state {
            ConnectionState::Idle | ConnectionState::Closed => {
                self.transition(ConnectionState::Connecting);
                true
            }
            other => {
                debug!("connect skipped in state {other}");
                false
            }
        }
    }

    /// The socket opened: reset retries and clear the error.
    pub fn on_open(&mut self) {
        self.retry_count = 0;
        self.last_error = None;
        self.transition(ConnectionState::Open);
    }

    /// Record an error. Returns true when an open socket must be closed
    /// as a consequence.
    pub fn on_error(&mut self, error: impl Into<String>) -> bool {
        self.last_error = Some(error.into());
        match self.state {
            ConnectionState::Open => {
                self.transition(ConnectionState::Closing);
                true
            }
            _ => false,
        }
    }

    /// Start a locally requested close of an open socket.
    pub fn begin_close(&mut self) -> bool {
        if self.state == ConnectionState::Open {
            self.transition(ConnectionState::Closing);
            true
        } else {
            false
        }
    }

    /// The socket closed, or a connect attempt failed.
    ///
    /// Each close without an intervening open counts against the policy;
    /// the close that reaches `max_retries` times the connection out.
    pub fn on_close(&mut self) -> CloseOutcome {
        if self.shutting_down {
            self.transition(ConnectionState::Closed);
            return CloseOutcome::Stopped;
        }
        if self.state == ConnectionState::TimedOut {
            return CloseOutcome::TimedOut;
        }

        self.retry_count = self.retry_count.saturating_add(1);
        if self.retry_count >= self.policy.max_retries {
            self.retry_count = self.policy.max_retries;
            self.transition(ConnectionState::TimedOut);
            CloseOutcome::TimedOut
        } else {
            self.transition(ConnectionState::Closed);
            CloseOutcome::Retry {
                attempt: self.retry_count,
                delay: self.policy.delay,
            }
        }
    }

    /// Explicit user reconnect: zero the retry counter and leave
    /// `TimedOut`, ready for `begin_connect`.
    pub fn reset_for_reconnect(&mut self) {
        self.retry_count = 0;
        self.last_error = None;
        self.transition(ConnectionState::Closed);
    }

    /// Stop for good. Later closes yield `Stopped`.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        self.transition(ConnectionState::Closed);
    }
}
