//! # Chain Events
//!
//! Defines every event that flows through the shared bus. The set is closed:
//! adding a variant forces every exhaustive `match` on [`ChainEvent`] or
//! [`EventKind`] to be revisited at compile time.

use std::sync::Arc;

use serde::Serialize;
use shared_types::{Block, Hash, LogRecord, NetAddress};

/// All events that can be published to the event bus.
///
/// Payloads are reference counted so fan-out to many subscribers never
/// copies a block or a log batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ChainEvent {
    // =========================================================================
    // CONSENSUS
    // =========================================================================
    /// A block was committed and is final.
    NewBlock(Arc<Block>),

    /// A block was proposed but is not final yet.
    PendingBlock(Arc<Block>),

    // =========================================================================
    // EXECUTION
    // =========================================================================
    /// Ordered log records produced by a committed block.
    Logs(Arc<Vec<LogRecord>>),

    // =========================================================================
    // MEMPOOL
    // =========================================================================
    /// A transaction was admitted into the mempool.
    TxAdded {
        /// Hash of the admitted transaction.
        tx_hash: Hash,
    },

    // =========================================================================
    // SWITCH / PEX
    // =========================================================================
    /// A peer connection was established.
    PeerConnected {
        /// Remote address.
        address: NetAddress,
        /// Whether we dialed the peer.
        outbound: bool,
    },

    /// A peer connection was closed.
    PeerDisconnected {
        /// Remote address.
        address: NetAddress,
    },

    // =========================================================================
    // BLOCK SYNC
    // =========================================================================
    /// Block sync switched between fast-sync and caught-up.
    SyncStatusChanged {
        /// `true` while fast-syncing.
        syncing: bool,
        /// Local chain height at the time of the switch.
        height: u64,
    },
}

impl ChainEvent {
    /// Get the kind of this event (for filtering).
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewBlock(_) => EventKind::NewBlock,
            Self::PendingBlock(_) => EventKind::PendingBlock,
            Self::Logs(_) => EventKind::Logs,
            Self::TxAdded { .. } => EventKind::TxAdded,
            Self::PeerConnected { .. } => EventKind::PeerConnected,
            Self::PeerDisconnected { .. } => EventKind::PeerDisconnected,
            Self::SyncStatusChanged { .. } => EventKind::SyncStatusChanged,
        }
    }
}

/// Event kinds for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// [`ChainEvent::NewBlock`]
    NewBlock,
    /// [`ChainEvent::PendingBlock`]
    PendingBlock,
    /// [`ChainEvent::Logs`]
    Logs,
    /// [`ChainEvent::TxAdded`]
    TxAdded,
    /// [`ChainEvent::PeerConnected`]
    PeerConnected,
    /// [`ChainEvent::PeerDisconnected`]
    PeerDisconnected,
    /// [`ChainEvent::SyncStatusChanged`]
    SyncStatusChanged,
}

/// Filter for subscribing to specific event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific kinds.
    #[must_use]
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ChainEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_block() -> ChainEvent {
        ChainEvent::NewBlock(Arc::new(Block::default()))
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(new_block().kind(), EventKind::NewBlock);
        assert_eq!(
            ChainEvent::Logs(Arc::new(vec![])).kind(),
            EventKind::Logs
        );
        assert_eq!(
            ChainEvent::TxAdded { tx_hash: [0; 32] }.kind(),
            EventKind::TxAdded
        );
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&new_block()));
    }

    #[test]
    fn test_filter_by_kind() {
        let filter = EventFilter::kinds([EventKind::PendingBlock, EventKind::Logs]);
        assert!(!filter.matches(&new_block()));
        assert!(filter.matches(&ChainEvent::PendingBlock(Arc::new(Block::default()))));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(ChainEvent::TxAdded { tx_hash: [1; 32] }).unwrap();
        assert_eq!(json["type"], "TxAdded");
        assert!(json["data"]["tx_hash"].is_array());
    }
}
