//! Paginated message-history fetch types.
//!
//! History is fetched in pages, newest first: page 1 holds the most recent
//! messages, increasing page numbers reach older history.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Request for one page of a room's message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    /// Room whose history is requested.
    pub room_id: String,

    /// 1-indexed page number. Page 1 is the most recent.
    pub page: u32,

    /// Maximum messages per page.
    pub limit: u32,
}

/// One page of message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    /// Messages in this page, oldest first within the page.
    pub messages: Vec<Message>,

    /// Whether older pages remain.
    pub has_more: bool,

    /// Total messages in the room.
    pub total: u64,

    /// Echoed page number.
    pub page: u32,

    /// Echoed page size.
    pub limit: u32,
}
