//! WebSocket transport with automatic reconnection.
//!
//! Thin I/O layer for the sans-IO [`crate::Client`]: a background task owns
//! the socket and bridges it to channels. Reconnection policy lives here
//! (unlimited attempts, fixed initial delay doubling to a bounded maximum);
//! the state machine only observes the resulting [`TransportSignal`]s.
//!
//! Events are JSON-encoded text frames in the `{"event", "data"}` envelope
//! defined by `chatwire-proto`.
//!
//! Drivers wire this to the client as follows: forward `signals` into
//! [`crate::ClientEvent::Signal`], forward `inbound` to the application's
//! reconciliation layer, and perform [`crate::ClientAction::Send`] /
//! `SendTracked` by pushing into `outbound` - reporting the push result as
//! the tracked emit's outcome.

use std::time::Duration;

use chatwire_proto::{InboundEvent, OutboundEvent};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::connection::TransportSignal;

/// Initial reconnect delay.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum reconnect delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Event encoding/decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The socket closed.
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// First reconnect delay.
    pub initial_backoff: Duration,
    /// Upper bound on the reconnect delay.
    pub max_backoff: Duration,
}

impl TransportConfig {
    /// Configuration with default backoff bounds for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), initial_backoff: INITIAL_BACKOFF, max_backoff: MAX_BACKOFF }
    }
}

/// Handle to a running transport task.
///
/// Dropping the handle does not stop the task; call
/// [`ConnectedTransport::stop`] on teardown.
pub struct ConnectedTransport {
    /// Send events to the server.
    pub outbound: mpsc::Sender<OutboundEvent>,
    /// Receive decoded events from the server.
    pub inbound: mpsc::Receiver<InboundEvent>,
    /// Receive connection lifecycle signals.
    pub signals: mpsc::Receiver<TransportSignal>,
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedTransport {
    /// Stop the transport task and drop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Spawn the transport task.
///
/// The task connects, reconnects forever on loss, and runs until aborted via
/// [`ConnectedTransport::stop`].
pub fn spawn(config: TransportConfig) -> ConnectedTransport {
    let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundEvent>(32);
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundEvent>(32);
    let (signal_tx, signal_rx) = mpsc::channel::<TransportSignal>(32);

    let handle = tokio::spawn(run(config, outbound_rx, inbound_tx, signal_tx));

    ConnectedTransport {
        outbound: outbound_tx,
        inbound: inbound_rx,
        signals: signal_rx,
        abort_handle: handle.abort_handle(),
    }
}

/// Connect/reconnect loop.
async fn run(
    config: TransportConfig,
    mut outbound: mpsc::Receiver<OutboundEvent>,
    inbound: mpsc::Sender<InboundEvent>,
    signals: mpsc::Sender<TransportSignal>,
) {
    let mut attempt: u32 = 0;
    let mut backoff = config.initial_backoff;

    loop {
        if attempt > 0 {
            if signals.send(TransportSignal::ReconnectAttempt { attempt }).await.is_err() {
                return;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(config.max_backoff);
        }

        match connect_async(&config.url).await {
            Ok((socket, _response)) => {
                attempt = 1;
                backoff = config.initial_backoff;

                if signals.send(TransportSignal::Opened).await.is_err() {
                    return;
                }

                let reason = run_session(socket, &mut outbound, &inbound).await;
                tracing::debug!(%reason, "websocket session ended");

                if signals.send(TransportSignal::Closed { reason }).await.is_err() {
                    return;
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, attempt, "websocket connect failed");
                attempt += 1;

                let message = e.to_string();
                if signals.send(TransportSignal::ReconnectError { message }).await.is_err() {
                    return;
                }
            },
        }
    }
}

/// Run one connected session until the socket or a channel closes.
///
/// Returns the close reason.
async fn run_session<S>(
    socket: S,
    outbound: &mut mpsc::Receiver<OutboundEvent>,
    inbound: &mpsc::Sender<InboundEvent>,
) -> String
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else {
                    return "outbound channel closed".to_string();
                };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            return format!("write failed: {e}");
                        }
                    },
                    Err(e) => {
                        // A non-serializable event is a programming error in
                        // the payload types; skip it rather than kill the link
                        tracing::error!(event = event.name(), error = %e, "encode failed");
                    },
                }
            },
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<InboundEvent>(&text) {
                            Ok(event) => {
                                if inbound.send(event).await.is_err() {
                                    return "inbound channel closed".to_string();
                                }
                            },
                            Err(e) => {
                                tracing::warn!(error = %e, "unrecognized inbound event");
                            },
                        }
                    },
                    Some(Ok(Message::Close(_)) ) => return "server closed".to_string(),
                    Some(Ok(_)) => {}, // Ping/pong/binary handled by tungstenite
                    Some(Err(e)) => return format!("read failed: {e}"),
                    None => return "stream ended".to_string(),
                }
            },
        }
    }
}
