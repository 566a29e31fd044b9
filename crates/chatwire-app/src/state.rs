//! Observable application state types.
//!
//! These structures are the "View Model" side of the message store: the
//! subset of cache state the rendering layer needs, without exposing the
//! reconciliation machinery.

/// Per-message reconciliation state.
///
/// Every locally-sent message walks this machine; messages that originate
/// remotely enter directly as `Confirmed`.
///
/// ```text
/// ┌─────────────────┐  message:sent   ┌───────────┐
/// │ Pending(tempId) │────────────────>│ Confirmed │
/// └─────────────────┘                 └───────────┘
///          │        message:received   ┌────────┐
///          └────────────(echo)────────>│ Merged │
///                                      └────────┘
/// ```
///
/// `Merged` records that the server echoed our own send back before (or
/// instead of) confirming it; a later confirmation for the same temp id is a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Optimistic entry awaiting server confirmation.
    Pending {
        /// The client-generated provisional id.
        temp_id: String,
    },
    /// Confirmed via `message:sent`.
    Confirmed,
    /// Adopted the server identity via a `message:received` echo.
    Merged,
}

/// Denormalized per-contact view for the conversation list.
///
/// Updated in lockstep with every message mutation. Invariant: when
/// `last_message_id` is set, it names the maximum-timestamp message of this
/// conversation's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// The other participant's user id.
    pub peer_id: String,
    /// Room shared with the peer.
    pub room_id: String,
    /// Id of the most recent message. `None` for an empty conversation.
    pub last_message_id: Option<String>,
    /// Messages received and not yet read locally.
    pub unread: u32,
}

impl Conversation {
    /// Create an empty conversation with a peer.
    pub fn new(peer_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self { peer_id: peer_id.into(), room_id: room_id.into(), last_message_id: None, unread: 0 }
    }
}

/// Updates published on the event bus after store mutations.
///
/// Coarse-grained by design: subscribers re-read the store through its
/// accessors rather than carrying state in the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUpdate {
    /// A message was inserted or changed.
    Message {
        /// Room containing the message.
        room_id: String,
        /// Current id of the message.
        message_id: String,
    },
    /// The conversation list changed (last message, unread counts).
    Conversations,
    /// The contact list changed.
    Contacts,
    /// The set of typing users changed in a room.
    Typing {
        /// Affected room.
        room_id: String,
    },
}
