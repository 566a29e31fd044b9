//! Reliable event transport for Chatwire.
//!
//! Guarantees at-least-once delivery of user actions across
//! disconnect/reconnect cycles: events emitted while the connection is down
//! are queued and drained in order on reconnect, with bounded capacity and a
//! bounded per-event retry.
//!
//! # Architecture
//!
//! The core is Sans-IO and action-based: [`Client`] receives events
//! ([`ClientEvent`]), processes them through pure state machine logic, and
//! returns actions ([`ClientAction`]) for the caller to execute. Time is
//! passed into the state machine, never read from a clock, so tests run on
//! virtual time.
//!
//! # Components
//!
//! - [`Client`]: reliable emit façade (connected means send now, else queue)
//! - [`Connection`]: lifecycle state machine over transport signals
//! - [`OutboundQueue`]: bounded FIFO with retry and throttled drain
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedTransport`]: channel handle to a WebSocket task
//! - [`transport::spawn`]: start the reconnecting transport task

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod connection;
mod queue;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{Client, ClientAction, ClientEvent};
pub use connection::{Connection, ConnectionState, TransportSignal};
pub use queue::{DRAIN_DELAY, MAX_QUEUE_SIZE, MAX_RETRIES, OutboundQueue, QueueConfig, QueuedEvent};
