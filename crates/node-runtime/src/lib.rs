//! # Node Runtime Library
//!
//! The Meridian node: configuration, storage, reactors, lifecycle and the
//! JSON-RPC server. The `node-runtime` binary is a thin wrapper around
//! [`run_node`].
//!
//! ## Startup
//!
//! 1. Load configuration (file, then `MERIDIAN_*` environment)
//! 2. Validate it; bad RPC or P2P addresses stop here
//! 3. Construct the node from its stores
//! 4. Attach the P2P listener and start the switch
//! 5. Dial seeds, start RPC
//! 6. Wait for Ctrl-C / SIGTERM, then stop

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod node;
pub mod reactors;
pub mod rpc;
pub mod storage;

pub use config::{load_config, ConfigError, NodeConfig};
pub use error::NodeError;
pub use node::{run_node, run_node_until, shutdown_signal, Node, SeedDialReport, NODE_VERSION};
pub use storage::NodeStores;
