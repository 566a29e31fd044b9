//! Wire protocol types for Chatwire.
//!
//! Defines the named events exchanged with the messaging endpoint and the
//! data types they carry. The wire encoding is JSON with an
//! `{"event": <name>, "data": <payload>}` envelope, expressed here through
//! serde's adjacently-tagged enum representation so that event names and
//! payload shapes live in one place.
//!
//! # Components
//!
//! - [`OutboundEvent`] / [`InboundEvent`]: client-to-server and
//!   server-to-client named events
//! - [`Message`], [`Reaction`], [`Contact`]: entities carried by events
//! - [`HistoryRequest`] / [`HistoryPage`]: paginated message-history fetch

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod events;
mod history;
mod message;

pub use events::{InboundEvent, OutboundEvent};
pub use history::{HistoryPage, HistoryRequest};
pub use message::{Contact, Message, MessageStatus, Reaction, ReactionAction};
