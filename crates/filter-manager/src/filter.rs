//! # Filters
//!
//! A [`Filter`] is a caller-supplied rule carrying up to three optional
//! callbacks. A filter with no callbacks is legal and simply never fires.
//!
//! Filters are immutable once installed; the registry shares them as
//! `Arc<Filter>`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{Address, Block, Hash, LogRecord};

/// Handle returned by [`crate::FilterManager::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterId(pub u64);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Invoked with a finalized or pending block.
pub type BlockCallback = Box<dyn Fn(Arc<Block>) + Send + Sync>;

/// Invoked with the non-empty subset of a log batch the filter matched.
pub type LogsCallback = Box<dyn Fn(Vec<LogRecord>) + Send + Sync>;

/// Criteria a log record must satisfy to be delivered.
///
/// Empty criteria match every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCriteria {
    /// Emitting contracts. Empty means any address.
    pub addresses: Vec<Address>,

    /// Positional topic constraints.
    ///
    /// `None` at position `i` is a wildcard; `Some(set)` accepts any hash in
    /// `set`. A record with fewer topics than constrained positions never
    /// matches.
    pub topics: Vec<Option<Vec<Hash>>>,

    /// Inclusive lower bound on the record's block number.
    pub from_block: Option<u64>,

    /// Inclusive upper bound on the record's block number.
    pub to_block: Option<u64>,
}

impl LogCriteria {
    /// Criteria matching every record.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to records emitted by one of `addresses`.
    #[must_use]
    pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.addresses = addresses.into_iter().collect();
        self
    }

    /// Append a constraint for the next topic position.
    #[must_use]
    pub fn with_topic(mut self, accepted: Option<Vec<Hash>>) -> Self {
        self.topics.push(accepted);
        self
    }

    /// Restrict to an inclusive block range.
    #[must_use]
    pub fn with_block_range(mut self, from: Option<u64>, to: Option<u64>) -> Self {
        self.from_block = from;
        self.to_block = to;
        self
    }

    /// Whether a single record satisfies these criteria.
    #[must_use]
    pub fn matches(&self, log: &LogRecord) -> bool {
        if self.from_block.is_some_and(|from| log.block_number < from) {
            return false;
        }
        if self.to_block.is_some_and(|to| log.block_number > to) {
            return false;
        }
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        if self.topics.len() > log.topics.len() {
            return false;
        }
        self.topics
            .iter()
            .zip(&log.topics)
            .all(|(accepted, topic)| match accepted {
                None => true,
                Some(set) => set.is_empty() || set.contains(topic),
            })
    }
}

/// A caller-installed notification rule.
#[derive(Default)]
pub struct Filter {
    block_callback: Option<BlockCallback>,
    pending_callback: Option<BlockCallback>,
    logs_callback: Option<LogsCallback>,
    criteria: LogCriteria,
}

impl Filter {
    /// Create an inert filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire on every finalized block.
    #[must_use]
    pub fn on_block<F>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<Block>) + Send + Sync + 'static,
    {
        self.block_callback = Some(Box::new(callback));
        self
    }

    /// Fire on every pending (proposed, not final) block.
    #[must_use]
    pub fn on_pending<F>(mut self, callback: F) -> Self
    where
        F: Fn(Arc<Block>) + Send + Sync + 'static,
    {
        self.pending_callback = Some(Box::new(callback));
        self
    }

    /// Fire with the matched subset of each log batch.
    #[must_use]
    pub fn on_logs<F>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<LogRecord>) + Send + Sync + 'static,
    {
        self.logs_callback = Some(Box::new(callback));
        self
    }

    /// Set the log matching criteria.
    #[must_use]
    pub fn with_criteria(mut self, criteria: LogCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    #[must_use]
    pub fn criteria(&self) -> &LogCriteria {
        &self.criteria
    }

    #[must_use]
    pub fn block_callback(&self) -> Option<&BlockCallback> {
        self.block_callback.as_ref()
    }

    #[must_use]
    pub fn pending_callback(&self) -> Option<&BlockCallback> {
        self.pending_callback.as_ref()
    }

    #[must_use]
    pub fn logs_callback(&self) -> Option<&LogsCallback> {
        self.logs_callback.as_ref()
    }

    /// Whether the filter has no callbacks at all.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.block_callback.is_none()
            && self.pending_callback.is_none()
            && self.logs_callback.is_none()
    }

    /// The subset of `logs` this filter matches, in batch order.
    #[must_use]
    pub fn match_logs(&self, logs: &[LogRecord]) -> Vec<LogRecord> {
        logs.iter()
            .filter(|log| self.criteria.matches(log))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("block_callback", &self.block_callback.is_some())
            .field("pending_callback", &self.pending_callback.is_some())
            .field("logs_callback", &self.logs_callback.is_some())
            .field("criteria", &self.criteria)
            .finish()
    }
}
