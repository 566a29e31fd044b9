//! Bounded outbound event queue with retry and throttled drain.
//!
//! Buffers not-yet-sent events while the connection is down and drains them
//! sequentially once it is up. The queue is a state machine in the action
//! pattern: time is passed into methods, emits happen outside, and the
//! caller reports each tracked emit's outcome back via [`OutboundQueue::confirm`]
//! or [`OutboundQueue::fail`].
//!
//! Ordering is strict FIFO with two documented relaxations: when full, the
//! oldest entry is evicted to admit the newest (lossy under pressure,
//! favoring recency), and a failed-but-retriable event moves to the tail
//! instead of retrying in place, so a stuck head cannot block the line.

use std::{collections::VecDeque, ops::Add, time::Duration};

use chatwire_proto::OutboundEvent;

/// Maximum queued events. Pushing beyond this evicts the oldest entry.
pub const MAX_QUEUE_SIZE: usize = 100;

/// Attempts per event before it is dropped.
pub const MAX_RETRIES: u32 = 3;

/// Pause between consecutive drain emits, to avoid saturating the transport
/// on a reconnect burst.
pub const DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Queue tunables. The defaults are the documented protocol constants;
/// overrides exist for tests.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Capacity bound.
    pub capacity: usize,
    /// Per-event attempt cap.
    pub max_retries: u32,
    /// Inter-item drain delay.
    pub drain_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: MAX_QUEUE_SIZE, max_retries: MAX_RETRIES, drain_delay: DRAIN_DELAY }
    }
}

/// A queued outbound event awaiting send.
#[derive(Debug, Clone)]
pub struct QueuedEvent<I> {
    /// The event to emit.
    pub event: OutboundEvent,
    /// When the event was enqueued.
    pub enqueued_at: I,
    /// Failed attempts so far.
    pub retries: u32,
}

/// Bounded FIFO of outbound events.
///
/// Generic over the instant type to support virtual time in tests.
#[derive(Debug, Clone)]
pub struct OutboundQueue<I> {
    config: QueueConfig,
    items: VecDeque<QueuedEvent<I>>,
    /// Drain-in-progress guard. Prevents two concurrent drain passes.
    draining: bool,
    /// The single event currently out for a tracked emit.
    in_flight: Option<QueuedEvent<I>>,
    /// Earliest instant the next emit may happen. `None` means immediately.
    next_emit_at: Option<I>,
}

impl<I> OutboundQueue<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create an empty queue with the given configuration.
    pub fn new(config: QueueConfig) -> Self {
        Self { config, items: VecDeque::new(), draining: false, in_flight: None, next_emit_at: None }
    }

    /// Number of waiting events (excluding any in-flight emit).
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no events are waiting or in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.in_flight.is_none()
    }

    /// Whether a drain pass is in progress.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Waiting events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent<I>> {
        self.items.iter()
    }

    /// Append an event. When the queue is full the oldest entry is evicted
    /// first. Safe to call while a drain is in progress: the tail append does
    /// not disturb the in-flight emit.
    pub fn push(&mut self, event: OutboundEvent, now: I) {
        if self.items.len() >= self.config.capacity {
            if let Some(evicted) = self.items.pop_front() {
                tracing::warn!(event = evicted.event.name(), "queue full, evicting oldest event");
            }
        }
        self.items.push_back(QueuedEvent { event, enqueued_at: now, retries: 0 });
    }

    /// Start a drain pass. Idempotent: returns `false` if a pass is already
    /// running or there is nothing to drain.
    pub fn begin_drain(&mut self) -> bool {
        if self.draining || self.is_empty() {
            return false;
        }
        self.draining = true;
        self.next_emit_at = None;
        true
    }

    /// Next event to emit, if the drain is running, nothing is in flight,
    /// and the inter-item delay has elapsed. Marks the event in-flight.
    pub fn next_to_emit(&mut self, now: I) -> Option<OutboundEvent> {
        if !self.draining || self.in_flight.is_some() {
            return None;
        }
        if let Some(at) = self.next_emit_at
            && now < at
        {
            return None;
        }
        let item = self.items.pop_front()?;
        let event = item.event.clone();
        self.in_flight = Some(item);
        Some(event)
    }

    /// Report the in-flight emit as successful. Schedules the inter-item
    /// delay before the next emit; ends the pass when the queue is empty.
    pub fn confirm(&mut self, now: I) {
        if self.in_flight.take().is_none() {
            tracing::debug!("emit confirmation with nothing in flight, ignoring");
            return;
        }
        if self.items.is_empty() {
            self.draining = false;
            self.next_emit_at = None;
        } else {
            self.next_emit_at = Some(now + self.config.drain_delay);
        }
    }

    /// Report the in-flight emit as failed.
    ///
    /// Increments the event's retry count; at the cap the event is dropped
    /// (logged, not surfaced - accepted loss for this best-effort channel),
    /// otherwise it moves to the tail. Either way the current pass stops; the
    /// next drain trigger resumes.
    pub fn fail(&mut self) {
        let Some(mut item) = self.in_flight.take() else {
            tracing::debug!("emit failure with nothing in flight, ignoring");
            return;
        };

        item.retries += 1;
        if item.retries >= self.config.max_retries {
            tracing::warn!(
                event = item.event.name(),
                retries = item.retries,
                "dropping event after retry cap"
            );
        } else {
            self.items.push_back(item);
        }

        self.draining = false;
        self.next_emit_at = None;
    }

    /// Abort an in-progress drain without penalizing the in-flight event.
    ///
    /// Used on disconnect: an emit whose outcome never arrives returns to the
    /// head with its retry count unchanged.
    pub fn abort_drain(&mut self) {
        if let Some(item) = self.in_flight.take() {
            self.items.push_front(item);
        }
        self.draining = false;
        self.next_emit_at = None;
    }

    /// Discard everything. Used on session teardown.
    pub fn clear(&mut self) {
        self.items.clear();
        self.in_flight = None;
        self.draining = false;
        self.next_emit_at = None;
    }
}
