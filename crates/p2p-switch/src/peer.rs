//! # Peers
//!
//! A [`Connection`] is what a dialer or listener hands to the switch; the
//! switch wraps it into a [`Peer`]. The wire protocol on top of the stream is
//! owned by the reactors and is out of scope here.
//!
//! A TCP-backed peer owns one reader task. No reactor consumes channel
//! messages yet, so inbound bytes are discarded; the task exists to notice
//! the remote hanging up and report it to the switch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use shared_types::NetAddress;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Read buffer of the per-peer reader task.
const READ_BUFFER_SIZE: usize = 4096;

/// An established (or simulated) transport connection.
pub struct Connection {
    remote: NetAddress,
    stream: Option<TcpStream>,
}

impl Connection {
    /// Wrap an accepted or connected TCP stream.
    #[must_use]
    pub fn tcp(remote: NetAddress, stream: TcpStream) -> Self {
        Self {
            remote,
            stream: Some(stream),
        }
    }

    /// A connection with no backing socket, used by in-process dialers.
    #[must_use]
    pub fn detached(remote: NetAddress) -> Self {
        Self {
            remote,
            stream: None,
        }
    }

    #[must_use]
    pub fn remote(&self) -> &NetAddress {
        &self.remote
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .field("tcp", &self.stream.is_some())
            .finish()
    }
}

/// A connected peer.
pub struct Peer {
    address: NetAddress,
    outbound: bool,
    connected_at: u64,
    closed: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Peer {
    pub(crate) fn new(connection: Connection, outbound: bool) -> Self {
        let connected_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            address: connection.remote,
            outbound,
            connected_at,
            closed: AtomicBool::new(false),
            stream: Mutex::new(connection.stream),
            reader: Mutex::new(None),
        }
    }

    /// Move the socket into a reader task that calls `on_hangup` once the
    /// remote closes or the read fails. Detached peers have nothing to watch.
    ///
    /// [`Peer::close`] aborts the task, so a local close never reports.
    pub(crate) fn spawn_reader<F>(self: &Arc<Self>, on_hangup: F)
    where
        F: FnOnce(Arc<Peer>) + Send + 'static,
    {
        let Some(mut stream) = self.stream.lock().take() else {
            return;
        };
        let peer: Weak<Peer> = Arc::downgrade(self);
        let address = self.address.clone();
        let task = tokio::spawn(async move {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => {
                        debug!(peer = %address, "Remote closed the connection");
                        break;
                    }
                    Ok(n) => trace!(peer = %address, bytes = n, "Discarding unrouted bytes"),
                    Err(e) => {
                        debug!(peer = %address, error = %e, "Peer read failed");
                        break;
                    }
                }
            }
            drop(stream);
            if let Some(peer) = peer.upgrade() {
                on_hangup(peer);
            }
        });

        // close() sets the flag before taking this lock
        let mut reader = self.reader.lock();
        if self.closed.load(Ordering::SeqCst) {
            task.abort();
        } else {
            *reader = Some(task);
        }
    }

    /// Remote address.
    #[must_use]
    pub fn address(&self) -> &NetAddress {
        &self.address
    }

    /// Whether we dialed this peer.
    #[must_use]
    pub fn is_outbound(&self) -> bool {
        self.outbound
    }

    /// Unix seconds at which the connection was established.
    #[must_use]
    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }

    /// Whether [`Peer::close`] has not been called yet.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Drop the socket without any goodbye exchange.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stream.lock().take();
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("address", &self.address)
            .field("outbound", &self.outbound)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
