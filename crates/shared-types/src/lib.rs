//! # Shared Types Crate
//!
//! Domain entities used across the node:
//!
//! - **Chain**: `Block`, `BlockHeader`, `Transaction`
//! - **Logs**: `LogRecord`, emitted by block execution and matched by filters
//! - **Networking**: `NetAddress`, `NodeInfo`
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-crate types are defined here only.
//! - **Shared, immutable payloads**: blocks travel through the event bus as
//!   `Arc<Block>` and are never mutated after publication.

pub mod entities;
pub mod network;

pub use entities::*;
pub use network::*;
