//! Error types for the transport switch and address book

use shared_types::{AddressParseError, NetAddress};
use thiserror::Error;

/// Errors raised by the switch, dialers and listeners.
#[derive(Debug, Error)]
pub enum P2pError {
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressParseError),

    #[error("Dial to {addr} failed: {reason}")]
    DialFailed { addr: NetAddress, reason: String },

    #[error("Dial to {addr} timed out after {timeout_ms}ms")]
    DialTimeout { addr: NetAddress, timeout_ms: u64 },

    #[error("Cannot dial our own address {0}")]
    SelfDial(NetAddress),

    #[error("Listener failed: {0}")]
    Listener(#[source] std::io::Error),

    #[error("Switch is already running")]
    AlreadyStarted,

    #[error("Reactor {name} failed: {reason}")]
    Reactor { name: String, reason: String },
}

/// Errors raised while loading or persisting the address book.
#[derive(Debug, Error)]
pub enum AddrBookError {
    #[error("Address book I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address book encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
