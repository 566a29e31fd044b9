//! Reliable emit façade.
//!
//! [`Client`] is the single entry point feature code uses to send events:
//! connected means emit now, otherwise the event is queued and drained on
//! reconnect. It composes the [`Connection`] lifecycle manager and the
//! [`OutboundQueue`], receives [`ClientEvent`]s, and returns
//! [`ClientAction`]s for the driver to execute. No I/O happens here.

use chatwire_proto::OutboundEvent;

use crate::{
    connection::{Connection, ConnectionState, TransportSignal},
    queue::{OutboundQueue, QueueConfig},
};

/// Events fed into the client.
///
/// The driver is responsible for performing I/O, forwarding transport
/// lifecycle signals, and reporting the outcome of each tracked emit.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Begin the session's connection. Ignored if already begun
    /// (duplicate-open guard).
    Open,

    /// Transport lifecycle signal.
    Signal {
        /// The signal.
        signal: TransportSignal,
        /// Current time, for drain scheduling.
        now: I,
    },

    /// Application wants to send an event (the façade path).
    Emit {
        /// Event to send.
        event: OutboundEvent,
        /// Current time, recorded if the event is queued.
        now: I,
    },

    /// Outcome of the most recent [`ClientAction::SendTracked`] emit.
    EmitOutcome {
        /// Whether the emit succeeded.
        ok: bool,
        /// Current time.
        now: I,
    },

    /// Periodic tick; drives drain delays forward.
    Tick {
        /// Current time.
        now: I,
    },

    /// Session teardown: close the connection and discard queued events.
    Shutdown,
}

/// Actions the client produces for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Emit this event now, fire-and-forget (direct path).
    Send(OutboundEvent),

    /// Emit this event as part of a queue drain. The driver must report the
    /// result back via [`ClientEvent::EmitOutcome`].
    SendTracked(OutboundEvent),

    /// Close the underlying connection.
    Close,
}

/// Reliable event transport client.
///
/// Generic over the instant type to support virtual time in tests.
#[derive(Debug, Clone)]
pub struct Client<I = std::time::Instant> {
    connection: Connection,
    queue: OutboundQueue<I>,
}

impl<I> Client<I>
where
    I: Copy + Ord + std::ops::Add<std::time::Duration, Output = I>,
{
    /// Create a client with the default queue configuration.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a client with a custom queue configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        Self { connection: Connection::new(), queue: OutboundQueue::new(config) }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Last transport-level error. `None` after a successful (re)connect.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.connection.last_error()
    }

    /// Number of events waiting in the outbound queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Process an event and return resulting actions.
    pub fn handle(&mut self, event: ClientEvent<I>) -> Vec<ClientAction> {
        match event {
            ClientEvent::Open => {
                self.connection.begin_connect();
                vec![]
            },
            ClientEvent::Signal { signal, now } => self.handle_signal(&signal, now),
            ClientEvent::Emit { event, now } => self.handle_emit(event, now),
            ClientEvent::EmitOutcome { ok, now } => {
                if ok {
                    self.queue.confirm(now);
                } else {
                    self.queue.fail();
                }
                self.pump(now)
            },
            ClientEvent::Tick { now } => self.pump(now),
            ClientEvent::Shutdown => {
                self.queue.clear();
                self.connection.shutdown();
                vec![ClientAction::Close]
            },
        }
    }

    fn handle_signal(&mut self, signal: &TransportSignal, now: I) -> Vec<ClientAction> {
        let opened = self.connection.apply(signal);

        if opened {
            // Exactly one drain trigger per successful (re)connect
            self.queue.begin_drain();
            return self.pump(now);
        }

        if matches!(signal, TransportSignal::Closed { .. }) {
            // Teardown of the in-progress pass; the in-flight event (if any)
            // returns to the head unpenalized
            self.queue.abort_drain();
        }

        vec![]
    }

    fn handle_emit(&mut self, event: OutboundEvent, now: I) -> Vec<ClientAction> {
        if self.connection.is_connected() {
            // Common path: bypass the queue entirely
            return vec![ClientAction::Send(event)];
        }
        self.queue.push(event, now);
        vec![]
    }

    /// Advance the drain: emit the next queued event if the connection is
    /// open, nothing is in flight, and the inter-item delay has elapsed.
    fn pump(&mut self, now: I) -> Vec<ClientAction> {
        if !self.connection.is_connected() {
            return vec![];
        }
        match self.queue.next_to_emit(now) {
            Some(event) => vec![ClientAction::SendTracked(event)],
            None => vec![],
        }
    }
}

impl<I> Default for Client<I>
where
    I: Copy + Ord + std::ops::Add<std::time::Duration, Output = I>,
{
    fn default() -> Self {
        Self::new()
    }
}
