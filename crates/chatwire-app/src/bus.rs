//! In-process update bus.
//!
//! Store mutations publish coarse [`StoreUpdate`] notifications; views
//! subscribe and re-read the store through its accessors. Subscriptions are
//! RAII handles: dropping the [`Subscription`] unsubscribes, so a view that
//! goes away cannot leak its callback into the subscriber list.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::state::StoreUpdate;

type Callback = Box<dyn FnMut(&StoreUpdate)>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: Vec<Subscriber>,
    /// Ids unsubscribed while a publish is walking the list.
    removed: Vec<u64>,
    publishing: bool,
}

impl Inner {
    fn remove(&mut self, id: u64) {
        if self.publishing {
            self.removed.push(id);
        } else {
            self.subscribers.retain(|s| s.id != id);
        }
    }
}

/// Publish/subscribe hub for [`StoreUpdate`] notifications.
///
/// Single-threaded; cloning shares the subscriber list. Callbacks may
/// subscribe or unsubscribe during delivery, but must not publish.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Inner>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. The subscription lasts until the returned handle
    /// is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl FnMut(&StoreUpdate) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber { id, callback: Box::new(callback) });
        Subscription { id, inner: Rc::downgrade(&self.inner) }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Deliver an update to every live subscriber.
    pub fn publish(&self, update: &StoreUpdate) {
        // The list is taken out for the duration of delivery so callbacks can
        // re-borrow the bus to subscribe or drop their handles
        let mut current = {
            let mut inner = self.inner.borrow_mut();
            if inner.publishing {
                tracing::warn!("reentrant publish from a subscriber callback, dropping update");
                return;
            }
            inner.publishing = true;
            std::mem::take(&mut inner.subscribers)
        };

        for sub in &mut current {
            let dead = self.inner.borrow().removed.contains(&sub.id);
            if !dead {
                (sub.callback)(update);
            }
        }

        let mut inner = self.inner.borrow_mut();
        inner.publishing = false;
        let removed = std::mem::take(&mut inner.removed);
        current.retain(|s| !removed.contains(&s.id));
        // Subscribers added during delivery landed in the fresh list
        let added = std::mem::take(&mut inner.subscribers);
        inner.subscribers = current;
        inner.subscribers.extend(added);
    }
}

/// RAII subscription handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    id: u64,
    inner: Weak<RefCell<Inner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.borrow_mut().remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    #[test]
    fn publish_reaches_subscribers() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let _sub = bus.subscribe(move |_| h.set(h.get() + 1));

        bus.publish(&StoreUpdate::Conversations);
        bus.publish(&StoreUpdate::Contacts);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn dropping_the_handle_unsubscribes() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let sub = bus.subscribe(move |_| h.set(h.get() + 1));
        bus.publish(&StoreUpdate::Conversations);
        drop(sub);
        bus.publish(&StoreUpdate::Conversations);

        assert_eq!(hits.get(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_during_delivery_skips_later_calls() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));

        // First subscriber drops the second one's handle mid-publish
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let killer = slot.clone();
        let _first = bus.subscribe(move |_| {
            killer.borrow_mut().take();
        });

        let h = hits.clone();
        *slot.borrow_mut() = Some(bus.subscribe(move |_| h.set(h.get() + 1)));

        bus.publish(&StoreUpdate::Conversations);
        assert_eq!(hits.get(), 0);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn subscribe_during_delivery_takes_effect_next_publish() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));

        let bus2 = bus.clone();
        let h = hits.clone();
        let late: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let late2 = late.clone();
        let _sub = bus.subscribe(move |_| {
            if late2.borrow().is_none() {
                let h = h.clone();
                *late2.borrow_mut() = Some(bus2.subscribe(move |_| h.set(h.get() + 1)));
            }
        });

        bus.publish(&StoreUpdate::Conversations);
        assert_eq!(hits.get(), 0);
        bus.publish(&StoreUpdate::Conversations);
        assert_eq!(hits.get(), 1);
    }
}
