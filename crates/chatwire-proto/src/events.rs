//! Named events exchanged over the persistent connection.
//!
//! Each variant maps to one wire event. The adjacently-tagged serde layout
//! produces the `{"event": <name>, "data": <payload>}` envelope the endpoint
//! speaks, so encoding an [`OutboundEvent`] with `serde_json` yields a
//! complete wire frame.

use serde::{Deserialize, Serialize};

use crate::message::{Contact, Message, Reaction, ReactionAction};

/// Client-to-server events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    /// Announce this user to the server and request the contact list.
    #[serde(rename = "user:join")]
    UserJoin {
        /// Joining user's id.
        user_id: String,
    },

    /// Send a chat message. Carries the client-generated temp id so the
    /// confirmation can be matched back to the optimistic entry.
    #[serde(rename = "message:send")]
    MessageSend {
        /// The message, with its provisional id.
        msg: Message,
        /// Client-generated provisional id, duplicated from the message.
        temp_id: String,
    },

    /// Mark a single message as read.
    #[serde(rename = "message:read")]
    MessageRead {
        /// Message being marked read.
        message_id: String,
        /// Room the message belongs to.
        room_id: String,
    },

    /// Mark every message in a room as read.
    #[serde(rename = "messages:readAll")]
    MessagesReadAll {
        /// Target room.
        room_id: String,
    },

    /// Add or remove a reaction on a message.
    #[serde(rename = "message:reaction")]
    MessageReaction {
        /// Target message.
        message_id: String,
        /// Reaction content.
        emoji: String,
        /// Add or remove.
        #[serde(rename = "type")]
        action: ReactionAction,
    },

    /// Tell the server which room the user is currently viewing.
    #[serde(rename = "room:active")]
    RoomActive {
        /// The now-active room.
        room_id: String,
    },

    /// The user started typing in a room.
    #[serde(rename = "typing:start")]
    TypingStart {
        /// Room being typed in.
        room_id: String,
    },

    /// The user stopped typing in a room.
    #[serde(rename = "typing:stop")]
    TypingStop {
        /// Room typing stopped in.
        room_id: String,
    },
}

impl OutboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserJoin { .. } => "user:join",
            Self::MessageSend { .. } => "message:send",
            Self::MessageRead { .. } => "message:read",
            Self::MessagesReadAll { .. } => "messages:readAll",
            Self::MessageReaction { .. } => "message:reaction",
            Self::RoomActive { .. } => "room:active",
            Self::TypingStart { .. } => "typing:start",
            Self::TypingStop { .. } => "typing:stop",
        }
    }
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum InboundEvent {
    /// Acknowledgement of `user:join` with the current contact list.
    #[serde(rename = "user:joined")]
    UserJoined {
        /// The joined user.
        user: Contact,
        /// Current contact list.
        contacts: Vec<Contact>,
    },

    /// Contact list changed (presence, new contacts).
    #[serde(rename = "contacts:update")]
    ContactsUpdate {
        /// Replacement contact list.
        contacts: Vec<Contact>,
    },

    /// Confirmation of a locally-sent message. The `temp_id` matches the one
    /// sent with `message:send`; `message.id` is the server-assigned id.
    #[serde(rename = "message:sent")]
    MessageSent {
        /// Server's authoritative copy of the message.
        message: Message,
        /// Provisional id the client sent.
        temp_id: String,
    },

    /// A message arrived. May echo the sender's own message back.
    #[serde(rename = "message:received")]
    MessageReceived {
        /// The delivered message.
        message: Message,
    },

    /// A single message was read by a user.
    #[serde(rename = "message:read")]
    MessageRead {
        /// Message that was read.
        message_id: String,
        /// User who read it.
        user_id: String,
        /// Full set of readers after this read.
        read_by: Vec<String>,
    },

    /// All messages in the active room were read.
    #[serde(rename = "messages:readAll")]
    MessagesReadAll {
        /// Users whose reads this applies.
        read_by: Vec<String>,
    },

    /// Authoritative reaction set for a message after an add/remove.
    #[serde(rename = "message:reactionUpdated")]
    MessageReactionUpdated {
        /// Message whose reactions changed.
        message_id: String,
        /// Full replacement reaction list.
        reactions: Vec<Reaction>,
        /// The change that produced this list.
        action: ReactionAction,
    },

    /// Typing indicator change in a room.
    #[serde(rename = "typing:update")]
    TypingUpdate {
        /// Whether the user is typing.
        is_typing: bool,
        /// Room the indicator applies to.
        room_id: String,
        /// All users currently typing in the room.
        typing_users: Vec<String>,
        /// The user whose indicator changed.
        user_id: String,
    },
}

impl InboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserJoined { .. } => "user:joined",
            Self::ContactsUpdate { .. } => "contacts:update",
            Self::MessageSent { .. } => "message:sent",
            Self::MessageReceived { .. } => "message:received",
            Self::MessageRead { .. } => "message:read",
            Self::MessagesReadAll { .. } => "messages:readAll",
            Self::MessageReactionUpdated { .. } => "message:reactionUpdated",
            Self::TypingUpdate { .. } => "typing:update",
        }
    }
}
