//! # JSON-RPC Server
//!
//! Read and submit endpoints over the node's stores and reactors, plus a
//! websocket bridge onto the event bus. Handlers receive an explicit
//! [`RpcContext`]; there is no global state.

pub mod context;
pub mod routes;
pub mod server;

pub use context::RpcContext;
pub use routes::{codes, dispatch, RpcFault, METHODS};
pub use server::{serve, RpcError, RpcServerHandle};
