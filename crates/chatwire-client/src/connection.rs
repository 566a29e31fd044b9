//! Connection lifecycle state machine.
//!
//! Tracks the state of one persistent bidirectional connection. The
//! underlying transport owns reconnection and backoff; this state machine
//! only reacts to its lifecycle signals and surfaces [`ConnectionState`]
//! plus a last-error signal to the rest of the system.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  begin_connect  ┌────────────┐    Opened    ┌───────────┐
//! │ Disconnected │────────────────>│ Connecting │─────────────>│ Connected │
//! └──────────────┘                 └────────────┘              └───────────┘
//!        ▲                                                           │
//!        │ ReconnectFailed      ┌──────────────┐       Closed        │
//!        └──────────────────────│ Reconnecting │<────────────────────┘
//!                               └──────────────┘
//!                                 │         ▲ Opened back to Connected
//!                                 └─────────┘ ReconnectAttempt/Error
//! ```

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no reconnection in progress.
    Disconnected,
    /// Initial connection in progress.
    Connecting,
    /// Connection open.
    Connected,
    /// Connection lost; the transport is retrying.
    Reconnecting,
}

/// Lifecycle signals emitted by the transport.
///
/// These mirror the transport's own connect/disconnect/reconnect callbacks.
/// Backoff timing lives in the transport; the state machine only observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// Connection established (initial connect or successful reconnect).
    Opened,

    /// Connection lost.
    Closed {
        /// Transport-level close reason.
        reason: String,
    },

    /// A reconnection attempt is starting.
    ReconnectAttempt {
        /// 1-indexed attempt number.
        attempt: u32,
    },

    /// A reconnection attempt failed.
    ReconnectError {
        /// Transport-level error message.
        message: String,
    },

    /// The transport gave up reconnecting (only for transports with a
    /// bounded attempt policy).
    ReconnectFailed,
}

/// Connection lifecycle manager.
///
/// Pure state machine: no I/O, no clock. Callers observe state; connectivity
/// problems are never raised as errors from these methods.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Current state.
    state: ConnectionState,
    /// Last transport-level error. Cleared on successful (re)connect.
    last_error: Option<String>,
    /// Set once a connect has been initiated for this session. Guards
    /// against a second open from re-invocation of the same setup path.
    started: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// Create a new connection manager in [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        Self { state: ConnectionState::Disconnected, last_error: None, started: false }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Last transport-level error message. `None` after a successful
    /// (re)connect.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Begin connecting. Returns `false` if a connection was already
    /// initiated this session (duplicate-open guard).
    pub fn begin_connect(&mut self) -> bool {
        if self.started {
            tracing::debug!("duplicate connect attempt ignored");
            return false;
        }
        self.started = true;
        self.state = ConnectionState::Connecting;
        true
    }

    /// Apply a transport lifecycle signal.
    ///
    /// Returns `true` when the signal opened the connection (initial connect
    /// or successful reconnect) - the caller uses this to trigger exactly one
    /// queue drain per open.
    pub fn apply(&mut self, signal: &TransportSignal) -> bool {
        match signal {
            TransportSignal::Opened => {
                self.state = ConnectionState::Connected;
                self.last_error = None;
                true
            },
            TransportSignal::Closed { reason } => {
                tracing::debug!(%reason, "connection closed");
                if !reason.is_empty() {
                    self.last_error = Some(reason.clone());
                }
                self.state = ConnectionState::Reconnecting;
                false
            },
            TransportSignal::ReconnectAttempt { attempt } => {
                tracing::debug!(attempt, "reconnecting");
                self.state = ConnectionState::Reconnecting;
                false
            },
            TransportSignal::ReconnectError { message } => {
                self.last_error = Some(message.clone());
                self.state = ConnectionState::Reconnecting;
                false
            },
            TransportSignal::ReconnectFailed => {
                if self.last_error.is_none() {
                    self.last_error = Some("reconnection failed".to_string());
                }
                self.state = ConnectionState::Disconnected;
                false
            },
        }
    }

    /// Tear down for session end: reset state and the re-open guard.
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.started = false;
    }
}
