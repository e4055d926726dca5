//! # P2P Switch
//!
//! Transport plumbing shared by every reactor of the node.
//!
//! - [`Switch`]: owns listeners, peers and reactors
//! - [`Dialer`] / [`TcpDialer`]: outbound connections
//! - [`Listener`] / [`DefaultListener`]: inbound connections
//! - [`AddrBook`]: persisted peer address cache
//! - [`Reactor`]: the subsystem contract, with [`PexReactor`] as the peer
//!   exchange implementation
//!
//! The wire protocol spoken over a connection belongs to the reactors and is
//! intentionally minimal.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod addrbook;
pub mod error;
pub mod peer;
pub mod pex;
pub mod reactor;
pub mod switch;
pub mod transport;

pub use addrbook::{
    AddrBook, AddrBookStore, FileAddrBookStore, KnownAddress, MemoryAddrBookStore,
    DEFAULT_SAVE_INTERVAL,
};
pub use error::{AddrBookError, P2pError};
pub use peer::{Connection, Peer};
pub use pex::{PexReactor, PEX_REACTOR_NAME};
pub use reactor::{BaseReactor, Reactor};
pub use switch::Switch;
pub use transport::{DefaultListener, Dialer, Listener, TcpDialer, DEFAULT_DIAL_TIMEOUT};
