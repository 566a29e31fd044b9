//! Optimistic message store.
//!
//! A reconciling cache layered over the paginated message history: local
//! actions (send, react, mark-read) apply immediately as optimistic entries,
//! authoritative server events merge in later, and the cache converges to
//! the server identity without duplicating or losing rows - regardless of
//! the order confirmations, echoes, and late events arrive in.
//!
//! Messages live in a normalized map keyed by current id, with a per-room
//! ordered id index, so reconciliation lookups are O(1) instead of scans
//! across page arrays. Every lookup checks both the current id and the
//! provisional temp id, because events may reference either until
//! reconciliation completes.

use std::collections::HashMap;

use chatwire_proto::{Contact, HistoryPage, Message, MessageStatus, Reaction, ReactionAction};
use thiserror::Error;

use crate::state::{Conversation, Delivery};

/// Errors from store mutations.
///
/// These indicate caller bugs (invalid arguments), not runtime conditions;
/// reconciliation misses are silent no-ops, never errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Message content was empty.
    #[error("message content is empty")]
    EmptyMessage,

    /// Recipient id was empty or the sender themselves.
    #[error("invalid recipient: {0:?}")]
    InvalidRecipient(String),

    /// A message with the generated temp id already exists.
    #[error("duplicate temp id: {0}")]
    DuplicateTempId(String),
}

/// A cached message with its reconciliation state.
#[derive(Debug, Clone)]
struct CachedMessage {
    message: Message,
    delivery: Delivery,
}

/// Snapshot of the state a send mutates, for rollback.
struct SendSnapshot {
    room_id: String,
    order: Option<Vec<String>>,
    conversation: Option<Conversation>,
    peer_id: String,
    inserted_id: String,
    /// Whatever already sat under `inserted_id`, so a failed insert cannot
    /// destroy a pre-existing row.
    previous: Option<CachedMessage>,
}

/// The reconciling message cache.
///
/// Single-owner, single-threaded: all mutation goes through these methods
/// (encapsulation is the concurrency discipline in a cooperative event-loop
/// model).
#[derive(Debug, Clone)]
pub struct ChatStore {
    user_id: String,
    user_name: String,

    /// All cached messages, keyed by current id.
    messages: HashMap<String, CachedMessage>,
    /// Provisional id -> current id, for lookups after reconciliation.
    temp_index: HashMap<String, String>,
    /// Per-room message ids in ascending timestamp order.
    order: HashMap<String, Vec<String>>,

    /// Per-peer conversation view, keyed by peer id.
    conversations: HashMap<String, Conversation>,
    /// Contact list from the server.
    contacts: Vec<Contact>,
    /// Users currently typing, per room.
    typing: HashMap<String, Vec<String>>,
    /// Room the UI is currently viewing.
    active_room: Option<String>,

    /// Session nonce embedded in temp ids so restarts cannot collide.
    session_nonce: u64,
    /// Monotonic counter for temp ids.
    temp_seq: u64,
}

/// Deterministic direct-message room id for a pair of users.
pub fn direct_room_id(a: &str, b: &str) -> String {
    if a <= b { format!("{a}:{b}") } else { format!("{b}:{a}") }
}

impl ChatStore {
    /// Create an empty store for the given local user.
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        session_nonce: u64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            messages: HashMap::new(),
            temp_index: HashMap::new(),
            order: HashMap::new(),
            conversations: HashMap::new(),
            contacts: Vec::new(),
            typing: HashMap::new(),
            active_room: None,
            session_nonce,
            temp_seq: 0,
        }
    }

    /// Local user's id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Local user's display name.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Messages in a room, ascending by timestamp.
    pub fn room_messages(&self, room_id: &str) -> Vec<&Message> {
        self.order
            .get(room_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.messages.get(id).map(|c| &c.message))
            .collect()
    }

    /// Look up a message by current id or provisional temp id.
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.resolve(id).and_then(|cur| self.messages.get(&cur)).map(|c| &c.message)
    }

    /// Reconciliation state of a message.
    pub fn delivery(&self, id: &str) -> Option<&Delivery> {
        self.resolve(id).and_then(|cur| self.messages.get(&cur)).map(|c| &c.delivery)
    }

    /// Conversation with a peer.
    pub fn conversation(&self, peer_id: &str) -> Option<&Conversation> {
        self.conversations.get(peer_id)
    }

    /// All conversations.
    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    /// The most recent message of a peer's conversation.
    pub fn last_message(&self, peer_id: &str) -> Option<&Message> {
        let conv = self.conversations.get(peer_id)?;
        let id = conv.last_message_id.as_ref()?;
        self.messages.get(id).map(|c| &c.message)
    }

    /// Current contact list.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Users currently typing in a room.
    pub fn typing_users(&self, room_id: &str) -> &[String] {
        self.typing.get(room_id).map_or(&[], Vec::as_slice)
    }

    /// Room the UI is currently viewing.
    #[must_use]
    pub fn active_room(&self) -> Option<&str> {
        self.active_room.as_deref()
    }

    /// Create an optimistic message for a send.
    ///
    /// Inserts the message in `Sending` status with a fresh temp id as its
    /// provisional id and updates the conversation's last message. Returns
    /// the created message for the caller to put on the wire. On error the
    /// pre-mutation state is restored.
    pub fn send_message(
        &mut self,
        content: &str,
        receiver_id: &str,
        now_ms: u64,
    ) -> Result<Message, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        if receiver_id.is_empty() || receiver_id == self.user_id {
            return Err(StoreError::InvalidRecipient(receiver_id.to_string()));
        }

        let temp_id = self.next_temp_id();
        let room_id = direct_room_id(&self.user_id, receiver_id);

        let snapshot = SendSnapshot {
            room_id: room_id.clone(),
            order: self.order.get(&room_id).cloned(),
            conversation: self.conversations.get(receiver_id).cloned(),
            peer_id: receiver_id.to_string(),
            inserted_id: temp_id.clone(),
            previous: self.messages.get(&temp_id).cloned(),
        };

        match self.insert_optimistic(&temp_id, content, receiver_id, &room_id, now_ms) {
            Ok(message) => Ok(message),
            Err(e) => {
                self.restore(snapshot);
                Err(e)
            },
        }
    }

    /// Reconcile a `message:sent` confirmation: replace the provisional id
    /// with the server-assigned one and mark the message `Sent`.
    ///
    /// No-op if the temp id is unknown (already reconciled and renamed, or
    /// the optimistic entry was never created). If an echo already inserted
    /// a row under the server id, the provisional row is collapsed into it.
    pub fn reconcile_sent(&mut self, temp_id: &str, server_id: &str) {
        let Some(current) = self.resolve(temp_id) else {
            tracing::debug!(temp_id, "sent confirmation for unknown message, ignoring");
            return;
        };

        if current != server_id {
            if self.messages.contains_key(server_id) {
                // The echo path already holds the server identity; drop the
                // provisional row so exactly one remains
                self.remove_row(&current);
            } else {
                self.rename(&current, server_id);
            }
        }

        if let Some(cached) = self.messages.get_mut(server_id) {
            cached.message.status = MessageStatus::Sent;
            if matches!(cached.delivery, Delivery::Pending { .. }) {
                cached.delivery = Delivery::Confirmed;
            }
        }
        self.temp_index.insert(temp_id.to_string(), server_id.to_string());
    }

    /// Merge an inbound `message:received`.
    ///
    /// Idempotent against duplicate delivery: a message whose id is already
    /// cached is a no-op. An echo of our own optimistic send (matched by
    /// temp id) merges into the existing row instead of inserting a second
    /// one. Returns `true` if the cache changed.
    pub fn apply_received(&mut self, message: Message) -> bool {
        if self.messages.contains_key(&message.id) {
            return false;
        }

        if let Some(existing) = message.temp_id.as_deref().and_then(|t| self.resolve(t)) {
            self.merge_echo(&existing, message);
            return true;
        }

        let unread = message.sender_id != self.user_id;
        self.insert_confirmed(message, unread);
        true
    }

    /// Apply a reaction add/remove to a message.
    ///
    /// One code path for the local user's optimistic action and for
    /// server-confirmed reactions of other users - only the supplied
    /// identity differs. Adding an existing `(user, emoji)` pair and
    /// removing a missing one are no-ops, as is an unknown message id.
    pub fn apply_reaction(
        &mut self,
        message_id: &str,
        emoji: &str,
        user_id: &str,
        user_name: &str,
        action: ReactionAction,
    ) {
        let Some(current) = self.resolve(message_id) else {
            tracing::debug!(message_id, "reaction for unknown message, ignoring");
            return;
        };
        let Some(cached) = self.messages.get_mut(&current) else {
            return;
        };

        let reactions = &mut cached.message.reactions;
        match action {
            ReactionAction::Add => {
                let present =
                    reactions.iter().any(|r| r.user_id == user_id && r.emoji == emoji);
                if !present {
                    reactions.push(Reaction {
                        emoji: emoji.to_string(),
                        user_id: user_id.to_string(),
                        user_name: user_name.to_string(),
                    });
                }
            },
            ReactionAction::Remove => {
                reactions.retain(|r| !(r.user_id == user_id && r.emoji == emoji));
            },
        }
    }

    /// Replace a message's reactions with the server's authoritative list
    /// (from `message:reactionUpdated`). No-op for unknown messages.
    pub fn reconcile_reactions(&mut self, message_id: &str, reactions: Vec<Reaction>) {
        let Some(current) = self.resolve(message_id) else {
            return;
        };
        if let Some(cached) = self.messages.get_mut(&current) {
            cached.message.reactions = reactions;
        }
    }

    /// Record read receipts: append each reader to each target message's
    /// `read_by` if absent. Unknown message ids are skipped.
    pub fn apply_read_receipt(&mut self, message_ids: &[String], reader_ids: &[String]) {
        for id in message_ids {
            let Some(current) = self.resolve(id) else {
                continue;
            };
            if let Some(cached) = self.messages.get_mut(&current) {
                Self::append_readers(&mut cached.message, reader_ids);
            }
        }
    }

    /// Record read receipts for every message in a room.
    pub fn mark_all_read(&mut self, room_id: &str, reader_ids: &[String]) {
        let ids = self.order.get(room_id).cloned().unwrap_or_default();
        for id in ids {
            if let Some(cached) = self.messages.get_mut(&id) {
                Self::append_readers(&mut cached.message, reader_ids);
            }
        }
    }

    /// Merge a fetched history page into the cache.
    ///
    /// The room's logical message list is the timestamp-sorted union of all
    /// fetched pages plus optimistic entries: already-cached ids are
    /// skipped, server copies of our own sends merge by temp id, and new
    /// rows are inserted in order. History never bumps unread counts.
    pub fn merge_page(&mut self, page: &HistoryPage) {
        for message in &page.messages {
            if self.messages.contains_key(&message.id) {
                continue;
            }
            if let Some(existing) = message.temp_id.as_deref().and_then(|t| self.resolve(t)) {
                self.merge_echo(&existing, message.clone());
                continue;
            }
            self.insert_confirmed(message.clone(), false);
        }
    }

    /// Mark a room as the one being viewed and clear its unread count.
    pub fn activate_room(&mut self, room_id: &str) {
        self.active_room = Some(room_id.to_string());
        if let Some(conv) = self.conversations.values_mut().find(|c| c.room_id == room_id) {
            conv.unread = 0;
        }
    }

    /// Replace the contact list and seed conversations for new contacts.
    pub fn set_contacts(&mut self, contacts: Vec<Contact>) {
        for contact in &contacts {
            if contact.id == self.user_id {
                continue;
            }
            let room_id = direct_room_id(&self.user_id, &contact.id);
            self.conversations
                .entry(contact.id.clone())
                .or_insert_with(|| Conversation::new(contact.id.clone(), room_id));
        }
        self.contacts = contacts;
    }

    /// Replace the set of typing users for a room.
    pub fn set_typing(&mut self, room_id: &str, mut typing_users: Vec<String>) {
        typing_users.retain(|u| u != &self.user_id);
        if typing_users.is_empty() {
            self.typing.remove(room_id);
        } else {
            self.typing.insert(room_id.to_string(), typing_users);
        }
    }

    fn next_temp_id(&mut self) -> String {
        self.temp_seq += 1;
        format!("temp-{:x}-{}", self.session_nonce, self.temp_seq)
    }

    /// Current id for a message referenced by id or temp id.
    fn resolve(&self, id: &str) -> Option<String> {
        if self.messages.contains_key(id) {
            return Some(id.to_string());
        }
        self.temp_index.get(id).filter(|cur| self.messages.contains_key(*cur)).cloned()
    }

    fn insert_optimistic(
        &mut self,
        temp_id: &str,
        content: &str,
        receiver_id: &str,
        room_id: &str,
        now_ms: u64,
    ) -> Result<Message, StoreError> {
        let message = Message {
            id: temp_id.to_string(),
            temp_id: Some(temp_id.to_string()),
            sender_id: self.user_id.clone(),
            receiver_id: Some(receiver_id.to_string()),
            room_id: room_id.to_string(),
            content: content.to_string(),
            status: MessageStatus::Sending,
            is_read: false,
            read_by: Vec::new(),
            reactions: Vec::new(),
            timestamp: now_ms,
        };

        self.insert_ordered(room_id, temp_id.to_string(), now_ms);
        self.bump_conversation(receiver_id, room_id, temp_id, now_ms, false);

        if self.messages.contains_key(temp_id) {
            return Err(StoreError::DuplicateTempId(temp_id.to_string()));
        }
        self.messages.insert(temp_id.to_string(), CachedMessage {
            message: message.clone(),
            delivery: Delivery::Pending { temp_id: temp_id.to_string() },
        });

        Ok(message)
    }

    fn restore(&mut self, snapshot: SendSnapshot) {
        match snapshot.previous {
            Some(previous) => {
                self.messages.insert(snapshot.inserted_id.clone(), previous);
            },
            None => {
                self.messages.remove(&snapshot.inserted_id);
            },
        }
        match snapshot.order {
            Some(order) => {
                self.order.insert(snapshot.room_id.clone(), order);
            },
            None => {
                self.order.remove(&snapshot.room_id);
            },
        }
        match snapshot.conversation {
            Some(conv) => {
                self.conversations.insert(snapshot.peer_id, conv);
            },
            None => {
                self.conversations.remove(&snapshot.peer_id);
            },
        }
    }

    /// Adopt a server copy into an existing (optimistic) row.
    ///
    /// The server owns identity, content, and timestamp; reactions and read
    /// receipts already applied to the pending row are unioned in, so an
    /// event that raced the echo is not lost.
    fn merge_echo(&mut self, existing_id: &str, server_copy: Message) {
        if existing_id != server_copy.id {
            self.rename(existing_id, &server_copy.id);
        }
        if let Some(temp) = server_copy.temp_id.clone() {
            self.temp_index.insert(temp, server_copy.id.clone());
        }

        let room_id = server_copy.room_id.clone();
        let id = server_copy.id.clone();
        let ts = server_copy.timestamp;

        if let Some(cached) = self.messages.get_mut(&id) {
            let old_ts = cached.message.timestamp;
            let mut merged = server_copy;
            for reaction in cached.message.reactions.drain(..) {
                let present = merged
                    .reactions
                    .iter()
                    .any(|r| r.user_id == reaction.user_id && r.emoji == reaction.emoji);
                if !present {
                    merged.reactions.push(reaction);
                }
            }
            for reader in cached.message.read_by.drain(..) {
                if !merged.read_by.contains(&reader) {
                    merged.read_by.push(reader);
                }
            }
            merged.is_read = !merged.read_by.is_empty();
            merged.status = MessageStatus::Sent;
            cached.message = merged;
            cached.delivery = Delivery::Merged;
            if old_ts != ts {
                self.reposition(&room_id, &id, ts);
            }
        }
        self.refresh_last_message(&room_id);
    }

    /// Insert a brand-new confirmed message and update its conversation.
    fn insert_confirmed(&mut self, message: Message, unread: bool) {
        let id = message.id.clone();
        let room_id = message.room_id.clone();
        let ts = message.timestamp;
        let peer = self.peer_of(&message);

        if let Some(temp) = message.temp_id.clone() {
            self.temp_index.insert(temp, id.clone());
        }
        self.messages.insert(id.clone(), CachedMessage { message, delivery: Delivery::Confirmed });
        self.insert_ordered(&room_id, id.clone(), ts);

        if let Some(peer) = peer {
            self.bump_conversation(&peer, &room_id, &id, ts, unread);
        }
    }

    /// The other participant of a direct message, from the local user's
    /// point of view. `None` when it cannot be determined.
    fn peer_of(&self, message: &Message) -> Option<String> {
        if message.sender_id != self.user_id {
            Some(message.sender_id.clone())
        } else {
            message.receiver_id.clone()
        }
    }

    /// Insert an id into a room's ordered index by timestamp (stable for
    /// equal timestamps).
    fn insert_ordered(&mut self, room_id: &str, id: String, ts: u64) {
        let pos = {
            let order = self.order.get(room_id).map_or(&[][..], Vec::as_slice);
            order.partition_point(|existing| {
                self.messages.get(existing).is_none_or(|c| c.message.timestamp <= ts)
            })
        };
        self.order.entry(room_id.to_string()).or_default().insert(pos, id);
    }

    /// Move an id to its correct position after a timestamp change.
    fn reposition(&mut self, room_id: &str, id: &str, ts: u64) {
        if let Some(order) = self.order.get_mut(room_id) {
            order.retain(|x| x != id);
        }
        self.insert_ordered(room_id, id.to_string(), ts);
    }

    /// Rewrite a message's id everywhere it appears.
    fn rename(&mut self, old_id: &str, new_id: &str) {
        let Some(mut cached) = self.messages.remove(old_id) else {
            return;
        };
        cached.message.id = new_id.to_string();
        let room_id = cached.message.room_id.clone();
        self.messages.insert(new_id.to_string(), cached);

        if let Some(order) = self.order.get_mut(&room_id) {
            for slot in order.iter_mut() {
                if slot == old_id {
                    *slot = new_id.to_string();
                }
            }
        }
        for target in self.temp_index.values_mut() {
            if target == old_id {
                *target = new_id.to_string();
            }
        }
        for conv in self.conversations.values_mut() {
            if conv.last_message_id.as_deref() == Some(old_id) {
                conv.last_message_id = Some(new_id.to_string());
            }
        }
    }

    /// Remove a row entirely (map, order index, conversation pointer).
    fn remove_row(&mut self, id: &str) {
        let Some(cached) = self.messages.remove(id) else {
            return;
        };
        let room_id = cached.message.room_id.clone();
        if let Some(order) = self.order.get_mut(&room_id) {
            order.retain(|x| x != id);
        }
        self.temp_index.retain(|_, target| target != id);
        self.refresh_last_message(&room_id);
    }

    /// Point a conversation at `id` if it is at least as recent as the
    /// current last message, bumping unread when asked.
    fn bump_conversation(&mut self, peer: &str, room_id: &str, id: &str, ts: u64, unread: bool) {
        let last_ts = self
            .conversations
            .get(peer)
            .and_then(|c| c.last_message_id.as_ref())
            .and_then(|last| self.messages.get(last))
            .map(|c| c.message.timestamp);

        let conv = self
            .conversations
            .entry(peer.to_string())
            .or_insert_with(|| Conversation::new(peer, room_id));

        if unread {
            conv.unread += 1;
        }
        if last_ts.is_none_or(|t| ts >= t) {
            conv.last_message_id = Some(id.to_string());
        }
    }

    /// Re-derive a room's last-message pointer from the ordered index.
    fn refresh_last_message(&mut self, room_id: &str) {
        let last = self.order.get(room_id).and_then(|o| o.last()).cloned();
        if let Some(conv) = self.conversations.values_mut().find(|c| c.room_id == room_id) {
            conv.last_message_id = last;
        }
    }

    fn append_readers(message: &mut Message, reader_ids: &[String]) {
        for reader in reader_ids {
            if !message.read_by.contains(reader) {
                message.read_by.push(reader.clone());
            }
        }
        message.is_read = !message.read_by.is_empty();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> ChatStore {
        ChatStore::new("alice", "Alice", 0xfeed)
    }

    fn inbound(id: &str, sender: &str, content: &str, ts: u64) -> Message {
        Message {
            id: id.to_string(),
            temp_id: None,
            sender_id: sender.to_string(),
            receiver_id: Some("alice".to_string()),
            room_id: direct_room_id("alice", sender),
            content: content.to_string(),
            status: MessageStatus::Sent,
            is_read: false,
            read_by: vec![],
            reactions: vec![],
            timestamp: ts,
        }
    }

    #[test]
    fn optimistic_send_then_confirm_keeps_one_row() {
        let mut store = store();
        let msg = store.send_message("hi", "bob", 1_000).unwrap();
        assert_eq!(msg.status, MessageStatus::Sending);

        let room = direct_room_id("alice", "bob");
        assert_eq!(store.room_messages(&room).len(), 1);

        store.reconcile_sent(&msg.id, "srv-1");
        let messages = store.room_messages(&room);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "srv-1");
        assert_eq!(messages[0].status, MessageStatus::Sent);

        // The temp id still resolves to the reconciled row
        assert_eq!(store.message(&msg.id).map(|m| m.id.as_str()), Some("srv-1"));
        assert_eq!(store.delivery("srv-1"), Some(&Delivery::Confirmed));
    }

    #[test]
    fn reconcile_unknown_temp_id_is_noop() {
        let mut store = store();
        store.reconcile_sent("temp-nope", "srv-9");
        assert!(store.message("srv-9").is_none());
    }

    #[test]
    fn duplicate_receive_is_idempotent() {
        let mut store = store();
        assert!(store.apply_received(inbound("srv-1", "bob", "hello", 10)));
        assert!(!store.apply_received(inbound("srv-1", "bob", "hello", 10)));

        let room = direct_room_id("alice", "bob");
        assert_eq!(store.room_messages(&room).len(), 1);
        assert_eq!(store.conversation("bob").map(|c| c.unread), Some(1));
    }

    #[test]
    fn echo_before_confirmation_converges_to_one_row() {
        let mut store = store();
        let msg = store.send_message("hi", "bob", 1_000).unwrap();
        let temp_id = msg.id.clone();

        // Server echoes the send back before confirming it
        let mut echo = inbound("srv-1", "alice", "hi", 1_001);
        echo.temp_id = Some(temp_id.clone());
        echo.receiver_id = Some("bob".to_string());
        assert!(store.apply_received(echo));

        let room = direct_room_id("alice", "bob");
        assert_eq!(store.room_messages(&room).len(), 1);
        assert_eq!(store.delivery("srv-1"), Some(&Delivery::Merged));

        // Late confirmation is a no-op on row count and keeps Merged
        store.reconcile_sent(&temp_id, "srv-1");
        assert_eq!(store.room_messages(&room).len(), 1);
        assert_eq!(store.delivery("srv-1"), Some(&Delivery::Merged));
        assert_eq!(store.message("srv-1").map(|m| m.status), Some(MessageStatus::Sent));
    }

    #[test]
    fn reaction_add_is_idempotent_and_remove_clears() {
        let mut store = store();
        store.apply_received(inbound("m1", "bob", "x", 1));

        store.apply_reaction("m1", "👍", "alice", "Alice", ReactionAction::Add);
        store.apply_reaction("m1", "👍", "alice", "Alice", ReactionAction::Add);
        assert_eq!(store.message("m1").map(|m| m.reactions.len()), Some(1));

        store.apply_reaction("m1", "👍", "alice", "Alice", ReactionAction::Remove);
        assert_eq!(store.message("m1").map(|m| m.reactions.len()), Some(0));

        // Removing again stays a no-op
        store.apply_reaction("m1", "👍", "alice", "Alice", ReactionAction::Remove);
        assert_eq!(store.message("m1").map(|m| m.reactions.len()), Some(0));
    }

    #[test]
    fn reaction_on_unreconciled_temp_id_lands_on_final_row() {
        let mut store = store();
        let msg = store.send_message("hi", "bob", 1_000).unwrap();

        store.apply_reaction(&msg.id, "🔥", "bob", "Bob", ReactionAction::Add);
        store.reconcile_sent(&msg.id, "srv-1");

        assert_eq!(store.message("srv-1").map(|m| m.reactions.len()), Some(1));
        // Late event still addressed to the temp id reaches the same row
        store.apply_reaction(&msg.id, "🔥", "bob", "Bob", ReactionAction::Add);
        assert_eq!(store.message("srv-1").map(|m| m.reactions.len()), Some(1));
    }

    #[test]
    fn echo_keeps_reactions_and_reads_applied_before_it() {
        let mut store = store();
        let msg = store.send_message("hi", "bob", 1_000).unwrap();
        let temp_id = msg.id.clone();

        // Reaction and read receipt land on the pending row first
        store.apply_reaction(&temp_id, "🔥", "bob", "Bob", ReactionAction::Add);
        let readers = vec!["bob".to_string()];
        store.apply_read_receipt(std::slice::from_ref(&temp_id), &readers);

        let mut echo = inbound("srv-1", "alice", "hi", 1_001);
        echo.temp_id = Some(temp_id.clone());
        echo.receiver_id = Some("bob".to_string());
        store.apply_received(echo);

        // The merge adopts the server identity without dropping either
        let merged = store.message("srv-1").cloned().unwrap();
        assert_eq!(merged.reactions.len(), 1);
        assert_eq!(merged.read_by, vec!["bob".to_string()]);
        assert!(merged.is_read);
        assert_eq!(merged.timestamp, 1_001);
    }

    #[test]
    fn read_receipt_is_idempotent() {
        let mut store = store();
        store.apply_received(inbound("m1", "bob", "x", 1));

        let ids = vec!["m1".to_string()];
        let readers = vec!["u2".to_string()];
        store.apply_read_receipt(&ids, &readers);
        store.apply_read_receipt(&ids, &readers);

        let read_by = store.message("m1").map(|m| m.read_by.clone()).unwrap_or_default();
        assert_eq!(read_by, vec!["u2".to_string()]);
    }

    #[test]
    fn conversation_tracks_max_timestamp_message() {
        let mut store = store();
        store.apply_received(inbound("m2", "bob", "second", 20));
        store.apply_received(inbound("m1", "bob", "first", 10));

        assert_eq!(store.last_message("bob").map(|m| m.id.as_str()), Some("m2"));

        let room = direct_room_id("alice", "bob");
        let ids: Vec<_> = store.room_messages(&room).iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn merge_page_dedupes_and_sorts() {
        let mut store = store();
        store.apply_received(inbound("m3", "bob", "newest", 30));

        let page = HistoryPage {
            messages: vec![
                inbound("m1", "bob", "old", 10),
                inbound("m2", "bob", "older", 20),
                inbound("m3", "bob", "newest", 30),
            ],
            has_more: false,
            total: 3,
            page: 1,
            limit: 50,
        };
        store.merge_page(&page);

        let room = direct_room_id("alice", "bob");
        let ids: Vec<_> = store.room_messages(&room).iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        // History does not inflate unread (only the live receive did)
        assert_eq!(store.conversation("bob").map(|c| c.unread), Some(1));
    }

    #[test]
    fn send_failure_rolls_back_to_snapshot() {
        let mut store = store();
        // Occupy the id the next send will generate
        store.apply_received(inbound("temp-feed-1", "bob", "squatter", 5));
        let room = direct_room_id("alice", "bob");

        let err = store.send_message("hi", "bob", 1_000).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTempId(_)));

        // The optimistic insertion was reverted and the pre-existing row
        // survived untouched
        let messages = store.room_messages(&room);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "temp-feed-1");
        assert_eq!(messages[0].content, "squatter");
        assert_eq!(store.last_message("bob").map(|m| m.id.as_str()), Some("temp-feed-1"));
        assert_eq!(store.conversation("bob").map(|c| c.unread), Some(1));
    }

    #[test]
    fn invalid_arguments_fail_fast_without_mutation() {
        let mut store = store();
        assert_eq!(store.send_message("  ", "bob", 1).unwrap_err(), StoreError::EmptyMessage);
        assert!(matches!(
            store.send_message("hi", "alice", 1).unwrap_err(),
            StoreError::InvalidRecipient(_)
        ));
        assert!(store.room_messages(&direct_room_id("alice", "bob")).is_empty());
    }

    #[test]
    fn activate_room_clears_unread() {
        let mut store = store();
        store.apply_received(inbound("m1", "bob", "x", 1));
        assert_eq!(store.conversation("bob").map(|c| c.unread), Some(1));

        store.activate_room(&direct_room_id("alice", "bob"));
        assert_eq!(store.conversation("bob").map(|c| c.unread), Some(0));
        assert_eq!(store.active_room(), Some(direct_room_id("alice", "bob").as_str()));
    }
}
