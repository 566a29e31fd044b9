//! Message, reaction, and contact entities.
//!
//! These are the payload types carried by the named events in
//! [`crate::events`]. Field names follow the wire's camelCase convention.

use serde::{Deserialize, Serialize};

/// Delivery status of a message.
///
/// Locally-originated messages start as `Sending` and move to `Sent` once the
/// server confirms them. `Failed` is reserved for a future explicit-failure
/// surface; the current protocol leaves unconfirmed messages in `Sending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created locally, not yet confirmed by the server.
    Sending,
    /// Confirmed by the server.
    Sent,
    /// Permanently failed to send.
    Failed,
}

/// A chat message.
///
/// `id` is provisional (a client-generated temp id) while `status` is
/// [`MessageStatus::Sending`]; the server-assigned id replaces it on
/// confirmation. `temp_id` keeps the provisional id around so late events
/// addressed to it can still be matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier. Server-assigned once confirmed.
    pub id: String,

    /// Client-generated provisional id, if this message originated locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    /// Sender's user id.
    pub sender_id: String,

    /// Receiver's user id for direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,

    /// Room this message belongs to.
    pub room_id: String,

    /// Message text.
    pub content: String,

    /// Delivery status.
    pub status: MessageStatus,

    /// Whether the message has been read by anyone.
    #[serde(default)]
    pub is_read: bool,

    /// Unique user ids that have read this message.
    #[serde(default)]
    pub read_by: Vec<String>,

    /// Reactions on this message. Unique per `(user_id, emoji)`.
    #[serde(default)]
    pub reactions: Vec<Reaction>,

    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

/// A reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Reaction content (e.g. an emoji).
    pub emoji: String,

    /// Reacting user's id.
    pub user_id: String,

    /// Reacting user's display name.
    pub user_name: String,
}

/// Whether a reaction event adds or removes a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    /// Add the reaction. A no-op if `(user_id, emoji)` already present.
    Add,
    /// Remove the reaction. A no-op if not present.
    Remove,
}

/// A contact in the user's contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// User id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Whether the contact is currently online.
    #[serde(default)]
    pub online: bool,
}
