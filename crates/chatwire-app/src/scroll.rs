//! Infinite-scroll pagination coordinator.
//!
//! Decides when scrolling near the oldest loaded message should fetch the
//! next (older) history page, and keeps the viewport anchored when a page is
//! prepended. Pure state, no I/O: the caller observes scroll positions and
//! executes the fetches this coordinator requests.

use chatwire_proto::{HistoryPage, HistoryRequest};

/// Per-room pagination state.
///
/// Page numbering is 1-indexed from the newest messages; page `n + 1` is
/// older than page `n`.
#[derive(Debug, Clone)]
pub struct ScrollCoordinator {
    room_id: String,
    limit: u32,
    /// Next (older) page to fetch.
    next_page: u32,
    /// Whether the server reported more history beyond the loaded pages.
    has_more: bool,
    /// A fetch is in flight; suppresses further triggers until it lands.
    pending: bool,
    /// Last observed "near oldest" flag, for edge detection.
    near_oldest: bool,
    /// Whether any position has been observed yet. The first observation
    /// only records state; it can never count as a crossing.
    primed: bool,
}

impl ScrollCoordinator {
    /// Create a coordinator for a room, assuming page 1 is already loaded.
    pub fn new(room_id: impl Into<String>, limit: u32) -> Self {
        Self {
            room_id: room_id.into(),
            limit,
            next_page: 2,
            has_more: true,
            pending: false,
            near_oldest: false,
            primed: false,
        }
    }

    /// Whether older history remains unfetched.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether a fetch is currently in flight.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Observe the current scroll position.
    ///
    /// Fires at most one request per crossing into the near-oldest zone:
    /// staying in the zone, or starting out in it before the user has
    /// scrolled, does not re-trigger. Returns the request to execute, if any.
    pub fn observe(&mut self, near_oldest: bool) -> Option<HistoryRequest> {
        let crossed = self.primed && near_oldest && !self.near_oldest;
        self.primed = true;
        self.near_oldest = near_oldest;

        if !crossed || self.pending || !self.has_more {
            return None;
        }

        self.pending = true;
        Some(HistoryRequest {
            room_id: self.room_id.clone(),
            page: self.next_page,
            limit: self.limit,
        })
    }

    /// Record a fetched page. Stale pages (out-of-order responses) are
    /// ignored so a duplicate response cannot skip a page.
    pub fn page_loaded(&mut self, page: &HistoryPage) {
        if page.page != self.next_page {
            tracing::debug!(
                got = page.page,
                expected = self.next_page,
                "out-of-order history page, ignoring"
            );
            return;
        }
        self.pending = false;
        self.next_page += 1;
        self.has_more = page.has_more;
    }

    /// Record a failed fetch so the next zone crossing can retry it.
    pub fn fetch_failed(&mut self) {
        self.pending = false;
    }
}

/// Scroll offset correction after prepending older content.
///
/// With content of height `prev_height` scrolled to offset `offset`, growing
/// to `new_height` by prepending keeps the same messages in view at
/// `offset + (new_height - prev_height)`.
#[must_use]
pub fn preserve_offset(offset: f64, prev_height: f64, new_height: f64) -> f64 {
    offset + (new_height - prev_height).max(0.0)
}
