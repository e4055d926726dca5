//! # Meridian Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (filter dispatch, log matching)
//! └── src/integration/  # Cross-crate flows over real nodes
//!     ├── filters.rs    # Node commits → bus → filter callbacks
//!     ├── peering.rs    # Two nodes over TCP, seed dialing, address book
//!     └── lifecycle.rs  # run_node_until, persisted stores, restart
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p node-tests
//! cargo test -p node-tests integration::peering
//! cargo bench -p node-tests
//! ```

pub mod integration;
