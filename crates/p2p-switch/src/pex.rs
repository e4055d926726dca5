//! # Peer Exchange Reactor
//!
//! Feeds the address book: outbound peers are marked good and addresses
//! gossiped by peers are added with the gossiping peer as their source.
//! Inbound peers are not recorded; their remote port is ephemeral and not
//! dialable.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::{EventSink, Eventable};
use shared_types::NetAddress;
use tracing::debug;

use crate::addrbook::AddrBook;
use crate::error::P2pError;
use crate::peer::Peer;
use crate::reactor::{BaseReactor, Reactor};

/// Registration name of the peer exchange reactor.
pub const PEX_REACTOR_NAME: &str = "PEX";

/// Maximum addresses shared in one exchange.
pub const MAX_ADDRS_PER_EXCHANGE: usize = 250;

pub struct PexReactor {
    base: BaseReactor,
    book: Arc<AddrBook>,
}

impl PexReactor {
    #[must_use]
    pub fn new(book: Arc<AddrBook>) -> Self {
        Self {
            base: BaseReactor::new(PEX_REACTOR_NAME),
            book,
        }
    }

    #[must_use]
    pub fn addr_book(&self) -> &Arc<AddrBook> {
        &self.book
    }

    /// Handle addresses gossiped by `src`. Returns how many were new.
    pub fn receive_addrs(&self, addrs: Vec<NetAddress>, src: &NetAddress) -> usize {
        let added = addrs
            .into_iter()
            .take(MAX_ADDRS_PER_EXCHANGE)
            .filter(|addr| self.book.add_address(addr.clone(), src.clone()))
            .count();
        debug!(src = %src, added, "Received peer addresses");
        added
    }

    /// Addresses to answer an exchange request with.
    #[must_use]
    pub fn addrs_to_share(&self) -> Vec<NetAddress> {
        self.book.pick_random(MAX_ADDRS_PER_EXCHANGE)
    }
}

impl Eventable for PexReactor {
    fn set_event_sink(&self, sink: EventSink) {
        self.base.set_event_sink(sink);
    }
}

#[async_trait]
impl Reactor for PexReactor {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self) -> Result<(), P2pError> {
        self.base.start();
        Ok(())
    }

    async fn stop(&self) {
        self.base.stop();
    }

    fn is_running(&self) -> bool {
        self.base.is_running()
    }

    fn add_peer(&self, peer: &Peer) {
        let addr = peer.address().clone();
        if peer.is_outbound() {
            self.book.add_address(addr.clone(), addr.clone());
            self.book.mark_good(&addr);
        } else {
            debug!(peer = %addr, "Inbound peer not added to address book");
        }
    }
}
