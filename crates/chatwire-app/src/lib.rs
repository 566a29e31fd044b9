//! Application layer for Chatwire: optimistic message store, update bus, and
//! the bridge that ties the store to the reliable transport.
//!
//! # Architecture
//!
//! - [`ChatStore`]: normalized, reconciling message cache. Local actions
//!   apply optimistically; server events merge in idempotently.
//! - [`Bridge`]: routes user intents into store mutations plus wire events
//!   through the [`chatwire_client::Client`] façade, and reconciles inbound
//!   server events back into the store.
//! - [`EventBus`]: publish/subscribe hub carrying [`StoreUpdate`]
//!   notifications to views, with RAII [`Subscription`] handles.
//! - [`ScrollCoordinator`]: decides when to fetch older history pages and
//!   keeps the viewport anchored across prepends.
//!
//! Everything here is Sans-IO and single-threaded; the driver owns the
//! actual transport and clock.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod bridge;
mod bus;
mod scroll;
mod state;
mod store;

pub use bridge::Bridge;
pub use bus::{EventBus, Subscription};
pub use scroll::{ScrollCoordinator, preserve_offset};
pub use state::{Conversation, Delivery, StoreUpdate};
pub use store::{ChatStore, StoreError, direct_room_id};
