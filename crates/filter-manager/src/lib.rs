//! # Filter Manager
//!
//! Lets external callers install interest filters and receive asynchronous
//! notifications for finalized blocks, pending blocks and matching log
//! records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  NewBlock / PendingBlock / Logs  ┌───────────────────┐
//! │ InMemoryEventBus│ ───────────────────────────────→ │  dispatch task    │
//! └─────────────────┘                                  │  (read lock)      │
//!                                                      └─────────┬─────────┘
//!  install / uninstall (write lock)                              │
//!           ↓                                                    ↓
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │           Registry: FilterId → Arc<Filter>                      │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let manager = FilterManager::new(bus.clone());
//! let id = manager.install(Filter::new().on_block(|block| {
//!     println!("new block {}", block.height());
//! }));
//! manager.start()?;
//! // ...
//! manager.stop();
//! manager.join().await;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod filter;
pub mod manager;

pub use error::FilterManagerError;
pub use filter::{BlockCallback, Filter, FilterId, LogCriteria, LogsCallback};
pub use manager::{FilterEvent, FilterManager, FilterManagerState, FilterStats};
