//! Node-level errors

use p2p_switch::{AddrBookError, P2pError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::rpc::RpcError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("P2P error: {0}")]
    P2p(#[from] P2pError),

    #[error("Address book error: {0}")]
    AddrBook(#[from] AddrBookError),

    #[error("Genesis error: {0}")]
    Genesis(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Node is already started")]
    AlreadyStarted,

    #[error("Node has been stopped and cannot be restarted")]
    Stopped,
}
