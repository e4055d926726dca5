//! # Transport
//!
//! Outbound dialing and inbound listening, both behind traits so the switch
//! can be driven by in-process implementations in tests.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::NetAddress;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::P2pError;
use crate::peer::Connection;

/// Default timeout for a single outbound TCP connect.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// DIALER
// =============================================================================

/// Opens outbound connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `addr`.
    async fn dial(&self, addr: &NetAddress) -> Result<Connection, P2pError>;
}

/// TCP dialer with a per-attempt timeout. Hostnames are resolved here.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(DEFAULT_DIAL_TIMEOUT)
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: &NetAddress) -> Result<Connection, P2pError> {
        let connect = TcpStream::connect((addr.host.as_str(), addr.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => {
                debug!(peer = %addr, "TCP connection established");
                Ok(Connection::tcp(addr.clone(), stream))
            }
            Ok(Err(e)) => Err(P2pError::DialFailed {
                addr: addr.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(P2pError::DialTimeout {
                addr: addr.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

// =============================================================================
// LISTENER
// =============================================================================

/// Accepts inbound connections.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Address the socket is bound to.
    fn internal_address(&self) -> NetAddress;

    /// Address peers should use to reach us.
    fn external_address(&self) -> NetAddress;

    /// Wait for the next inbound connection.
    async fn accept(&self) -> Result<Connection, P2pError>;
}

/// TCP listener.
///
/// When bound to an unspecified IP (`0.0.0.0` or `::`), the external address
/// reports the matching loopback IP.
#[derive(Debug)]
pub struct DefaultListener {
    listener: TcpListener,
    internal: NetAddress,
    external: NetAddress,
}

impl DefaultListener {
    /// Bind a TCP socket at `addr`. Port 0 picks a free port.
    pub async fn bind(addr: &NetAddress) -> Result<Self, P2pError> {
        let listener = TcpListener::bind((addr.host.as_str(), addr.port))
            .await
            .map_err(P2pError::Listener)?;
        let local = listener.local_addr().map_err(P2pError::Listener)?;

        let internal = NetAddress::from(local);
        let external = NetAddress::from(external_for(local));
        info!(internal = %internal, external = %external, "Listener bound");

        Ok(Self {
            listener,
            internal,
            external,
        })
    }
}

fn external_for(local: SocketAddr) -> SocketAddr {
    let ip = local.ip();
    if !ip.is_unspecified() {
        return local;
    }
    let loopback = match ip {
        std::net::IpAddr::V4(_) => std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        std::net::IpAddr::V6(_) => std::net::IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
    };
    SocketAddr::new(loopback, local.port())
}

#[async_trait]
impl Listener for DefaultListener {
    fn internal_address(&self) -> NetAddress {
        self.internal.clone()
    }

    fn external_address(&self) -> NetAddress {
        self.external.clone()
    }

    async fn accept(&self) -> Result<Connection, P2pError> {
        let (stream, remote) = self.listener.accept().await.map_err(P2pError::Listener)?;
        Ok(Connection::tcp(NetAddress::from(remote), stream))
    }
}
