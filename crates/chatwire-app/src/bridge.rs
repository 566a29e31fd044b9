//! Intent-to-protocol translation layer.
//!
//! The [`Bridge`] sits between the UI and the transport: user intents apply
//! optimistically to the [`ChatStore`] and go out through the reliable
//! [`chatwire_client::Client`] façade, inbound server events reconcile the
//! store, and every store change is published on the [`EventBus`].
//!
//! The bridge performs no I/O itself. It accumulates the client's
//! [`ClientAction`]s for the driver to execute in its next cycle
//! ([`Bridge::take_actions`]), so the whole stack stays testable on virtual
//! time.

use chatwire_client::{Client, ClientAction, ClientEvent, TransportSignal};
use chatwire_proto::{HistoryPage, InboundEvent, Message, OutboundEvent, ReactionAction};

use crate::{
    bus::EventBus,
    state::StoreUpdate,
    store::{ChatStore, StoreError},
};

/// Application bridge: optimistic store + reliable emit, one seam.
///
/// Generic over the instant type to support virtual time in tests.
pub struct Bridge<I = std::time::Instant> {
    client: Client<I>,
    store: ChatStore,
    bus: EventBus,
    outgoing: Vec<ClientAction>,
}

impl<I> Bridge<I>
where
    I: Copy + Ord + std::ops::Add<std::time::Duration, Output = I>,
{
    /// Create a bridge for the given local user.
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        session_nonce: u64,
    ) -> Self {
        Self {
            client: Client::new(),
            store: ChatStore::new(user_id, user_name, session_nonce),
            bus: EventBus::new(),
            outgoing: Vec::new(),
        }
    }

    /// Read access to the message store.
    #[must_use]
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// The update bus views subscribe to.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Transport client, for connection state queries.
    #[must_use]
    pub fn client(&self) -> &Client<I> {
        &self.client
    }

    /// Take the actions accumulated since the last call. The driver executes
    /// these in order.
    pub fn take_actions(&mut self) -> Vec<ClientAction> {
        std::mem::take(&mut self.outgoing)
    }

    /// Begin the session's connection. The user announcement happens when
    /// the transport reports `Opened`.
    pub fn open(&mut self) {
        let open = self.client.handle(ClientEvent::Open);
        self.outgoing.extend(open);
    }

    /// Tear the session down, discarding queued events.
    pub fn shutdown(&mut self) {
        let actions = self.client.handle(ClientEvent::Shutdown);
        self.outgoing.extend(actions);
    }

    /// Forward a transport lifecycle signal. Every successful (re)connect
    /// announces the user and triggers the queue drain.
    pub fn handle_signal(&mut self, signal: TransportSignal, now: I) {
        let opened = matches!(signal, TransportSignal::Opened);
        let actions = self.client.handle(ClientEvent::Signal { signal, now });
        self.outgoing.extend(actions);
        if opened {
            self.emit(OutboundEvent::UserJoin { user_id: self.store.user_id().to_string() }, now);
        }
    }

    /// Report the outcome of a tracked drain emit.
    pub fn emit_outcome(&mut self, ok: bool, now: I) {
        let actions = self.client.handle(ClientEvent::EmitOutcome { ok, now });
        self.outgoing.extend(actions);
    }

    /// Advance drain timing.
    pub fn tick(&mut self, now: I) {
        let actions = self.client.handle(ClientEvent::Tick { now });
        self.outgoing.extend(actions);
    }

    /// Send a chat message: optimistic store insert, then the wire event.
    ///
    /// `wall_ms` is the wall-clock timestamp recorded on the optimistic
    /// entry; `now` drives queue scheduling.
    pub fn send_message(
        &mut self,
        content: &str,
        receiver_id: &str,
        wall_ms: u64,
        now: I,
    ) -> Result<(), StoreError> {
        let message = self.store.send_message(content, receiver_id, wall_ms)?;
        let temp_id = message.id.clone();
        let room_id = message.room_id.clone();

        self.emit(OutboundEvent::MessageSend { msg: message, temp_id: temp_id.clone() }, now);
        self.publish_message(room_id, temp_id);
        Ok(())
    }

    /// Add or remove the local user's reaction, optimistically.
    pub fn react(&mut self, message_id: &str, emoji: &str, action: ReactionAction, now: I) {
        let user_id = self.store.user_id().to_string();
        let user_name = self.store.user_name().to_string();
        self.store.apply_reaction(message_id, emoji, &user_id, &user_name, action);

        // Address the wire event to the message's current id so the server
        // never sees an already-reconciled temp id
        let Some(message) = self.store.message(message_id) else {
            return;
        };
        let (current_id, room_id) = (message.id.clone(), message.room_id.clone());
        self.emit(
            OutboundEvent::MessageReaction {
                message_id: current_id.clone(),
                emoji: emoji.to_string(),
                action,
            },
            now,
        );
        self.publish_message(room_id, current_id);
    }

    /// Mark one message read by the local user.
    pub fn mark_read(&mut self, message_id: &str, now: I) {
        let Some(message) = self.store.message(message_id) else {
            return;
        };
        let (current_id, room_id) = (message.id.clone(), message.room_id.clone());

        let readers = vec![self.store.user_id().to_string()];
        self.store.apply_read_receipt(std::slice::from_ref(&current_id), &readers);
        self.emit(
            OutboundEvent::MessageRead { message_id: current_id.clone(), room_id: room_id.clone() },
            now,
        );
        self.publish_message(room_id, current_id);
    }

    /// Mark every message in a room read by the local user.
    pub fn mark_all_read(&mut self, room_id: &str, now: I) {
        let readers = vec![self.store.user_id().to_string()];
        self.store.mark_all_read(room_id, &readers);
        self.emit(OutboundEvent::MessagesReadAll { room_id: room_id.to_string() }, now);
        self.bus.publish(&StoreUpdate::Conversations);
    }

    /// Switch the viewed room: clears its unread count, tells the server, and
    /// marks the room's messages read.
    pub fn set_active_room(&mut self, room_id: &str, now: I) {
        self.store.activate_room(room_id);
        self.emit(OutboundEvent::RoomActive { room_id: room_id.to_string() }, now);
        self.emit(OutboundEvent::MessagesReadAll { room_id: room_id.to_string() }, now);
        self.bus.publish(&StoreUpdate::Conversations);
    }

    /// Local typing indicator change.
    pub fn set_typing(&mut self, room_id: &str, typing: bool, now: I) {
        let event = if typing {
            OutboundEvent::TypingStart { room_id: room_id.to_string() }
        } else {
            OutboundEvent::TypingStop { room_id: room_id.to_string() }
        };
        self.emit(event, now);
    }

    /// Merge a fetched history page into the store.
    pub fn apply_history(&mut self, page: &HistoryPage) {
        self.store.merge_page(page);
        if let Some(first) = page.messages.first() {
            self.bus.publish(&StoreUpdate::Message {
                room_id: first.room_id.clone(),
                message_id: first.id.clone(),
            });
        }
        self.bus.publish(&StoreUpdate::Conversations);
    }

    /// Reconcile an inbound server event into the store.
    pub fn apply_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::UserJoined { contacts, .. }
            | InboundEvent::ContactsUpdate { contacts } => {
                self.store.set_contacts(contacts);
                self.bus.publish(&StoreUpdate::Contacts);
                self.bus.publish(&StoreUpdate::Conversations);
            },
            InboundEvent::MessageSent { message, temp_id } => {
                self.store.reconcile_sent(&temp_id, &message.id);
                self.publish_message(message.room_id, message.id);
            },
            InboundEvent::MessageReceived { message } => {
                self.receive_message(message);
            },
            InboundEvent::MessageRead { message_id, read_by, .. } => {
                let ids = vec![message_id.clone()];
                self.store.apply_read_receipt(&ids, &read_by);
                if let Some(message) = self.store.message(&message_id) {
                    let (room_id, id) = (message.room_id.clone(), message.id.clone());
                    self.publish_message(room_id, id);
                }
            },
            InboundEvent::MessagesReadAll { read_by } => {
                // Applies to the room the server knows we are viewing
                if let Some(room_id) = self.store.active_room().map(str::to_string) {
                    self.store.mark_all_read(&room_id, &read_by);
                    self.bus.publish(&StoreUpdate::Conversations);
                }
            },
            InboundEvent::MessageReactionUpdated { message_id, reactions, .. } => {
                self.store.reconcile_reactions(&message_id, reactions);
                if let Some(message) = self.store.message(&message_id) {
                    let (room_id, id) = (message.room_id.clone(), message.id.clone());
                    self.publish_message(room_id, id);
                }
            },
            InboundEvent::TypingUpdate { room_id, typing_users, .. } => {
                self.store.set_typing(&room_id, typing_users);
                self.bus.publish(&StoreUpdate::Typing { room_id });
            },
        }
    }

    fn receive_message(&mut self, message: Message) {
        let (room_id, id) = (message.room_id.clone(), message.id.clone());
        if self.store.apply_received(message) {
            self.publish_message(room_id, id);
        }
    }

    /// Route an outbound event through the reliable emit façade.
    fn emit(&mut self, event: OutboundEvent, now: I) {
        let actions = self.client.handle(ClientEvent::Emit { event, now });
        self.outgoing.extend(actions);
    }

    fn publish_message(&mut self, room_id: String, message_id: String) {
        self.bus.publish(&StoreUpdate::Message { room_id, message_id });
        self.bus.publish(&StoreUpdate::Conversations);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Instant;

    use chatwire_client::ConnectionState;
    use chatwire_proto::MessageStatus;

    use super::*;

    fn connected_bridge() -> (Bridge, Instant) {
        let now = Instant::now();
        let mut bridge: Bridge = Bridge::new("alice", "Alice", 1);
        bridge.open();
        bridge.handle_signal(TransportSignal::Opened, now);
        let _ = bridge.take_actions();
        (bridge, now)
    }

    #[test]
    fn open_announces_user() {
        let now = Instant::now();
        let mut bridge: Bridge = Bridge::new("alice", "Alice", 1);
        bridge.open();
        bridge.handle_signal(TransportSignal::Opened, now);

        let actions = bridge.take_actions();
        let announced = actions.iter().any(|a| {
            matches!(
                a,
                ClientAction::Send(OutboundEvent::UserJoin { user_id })
                    | ClientAction::SendTracked(OutboundEvent::UserJoin { user_id })
                    if user_id == "alice"
            )
        });
        assert!(announced);
        assert_eq!(bridge.client().state(), ConnectionState::Connected);
    }

    #[test]
    fn send_message_emits_wire_event_and_inserts_optimistically() {
        let (mut bridge, now) = connected_bridge();
        bridge.send_message("hi", "bob", 1_000, now).unwrap();

        let actions = bridge.take_actions();
        let sent = actions.iter().any(|a| {
            matches!(a, ClientAction::Send(OutboundEvent::MessageSend { temp_id, .. })
                if temp_id.starts_with("temp-"))
        });
        assert!(sent);

        let messages = bridge.store().room_messages("alice:bob");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Sending);
    }

    #[test]
    fn confirmation_reconciles_the_optimistic_entry() {
        let (mut bridge, now) = connected_bridge();
        bridge.send_message("hi", "bob", 1_000, now).unwrap();
        let temp_id = bridge.store().room_messages("alice:bob")[0].id.clone();

        let mut confirmed = bridge.store().room_messages("alice:bob")[0].clone();
        confirmed.id = "srv-1".to_string();
        confirmed.status = MessageStatus::Sent;
        bridge.apply_inbound(InboundEvent::MessageSent { message: confirmed, temp_id });

        let messages = bridge.store().room_messages("alice:bob");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "srv-1");
        assert_eq!(messages[0].status, MessageStatus::Sent);
    }

    #[test]
    fn reaction_on_pending_message_goes_out_with_current_id() {
        let (mut bridge, now) = connected_bridge();
        bridge.send_message("hi", "bob", 1_000, now).unwrap();
        let temp_id = bridge.store().room_messages("alice:bob")[0].id.clone();
        let _ = bridge.take_actions();

        bridge.react(&temp_id, "👍", ReactionAction::Add, now);

        let actions = bridge.take_actions();
        let wired = actions.iter().any(|a| {
            matches!(a, ClientAction::Send(OutboundEvent::MessageReaction { message_id, .. })
                if *message_id == temp_id)
        });
        assert!(wired);
        assert_eq!(bridge.store().message(&temp_id).map(|m| m.reactions.len()), Some(1));
    }

    #[test]
    fn offline_intents_queue_until_reconnect() {
        let now = Instant::now();
        let mut bridge: Bridge = Bridge::new("alice", "Alice", 1);
        bridge.open();
        // Not connected yet: the send queues instead of going direct
        bridge.send_message("hi", "bob", 1_000, now).unwrap();

        assert!(bridge.take_actions().is_empty());
        assert_eq!(bridge.client().queued(), 1);

        bridge.handle_signal(TransportSignal::Opened, now);
        let actions = bridge.take_actions();
        let drained = actions.iter().any(|a| {
            matches!(a, ClientAction::SendTracked(OutboundEvent::MessageSend { .. }))
        });
        let announced = actions
            .iter()
            .any(|a| matches!(a, ClientAction::Send(OutboundEvent::UserJoin { .. })));
        assert!(drained);
        assert!(announced);
    }

    #[test]
    fn typing_update_ignores_own_indicator() {
        let (mut bridge, _now) = connected_bridge();
        bridge.apply_inbound(InboundEvent::TypingUpdate {
            is_typing: true,
            room_id: "alice:bob".to_string(),
            typing_users: vec!["alice".to_string(), "bob".to_string()],
            user_id: "bob".to_string(),
        });

        assert_eq!(bridge.store().typing_users("alice:bob"), ["bob".to_string()]);
    }
}
