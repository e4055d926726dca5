//! # Networking Entities
//!
//! Peer addresses and the node identity advertised to peers.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a `host:port` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid network address {input:?}: expected <host>:<port>")]
pub struct AddressParseError {
    /// The rejected input.
    pub input: String,
}

/// A peer network address.
///
/// `host` is an IP literal or a DNS name; resolution happens at dial time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetAddress {
    /// IP literal or hostname (IPv6 literals stored without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl NetAddress {
    /// Create an address from its parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The IP, if `host` is an IP literal.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Whether the address can be dialed from elsewhere.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        if self.port == 0 {
            return false;
        }
        match self.ip() {
            Some(ip) => !ip.is_unspecified(),
            None => !self.host.is_empty(),
        }
    }
}

impl From<SocketAddr> for NetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for NetAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AddressParseError {
            input: s.to_string(),
        };
        let s = s.trim();
        let (host, port) = s.rsplit_once(':').ok_or_else(err)?;
        let port: u16 = port.parse().map_err(|_| err())?;

        let host = match host.strip_prefix('[') {
            Some(rest) => {
                let inner = rest.strip_suffix(']').ok_or_else(err)?;
                // bracketed hosts must be IPv6 literals
                inner.parse::<std::net::Ipv6Addr>().map_err(|_| err())?;
                inner
            }
            // unbracketed IPv6 would be ambiguous
            None if host.contains(':') => return Err(err()),
            None => host,
        };
        if host.is_empty() {
            return Err(err());
        }
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Identity a node advertises to its peers.
///
/// Derived at start time, never stored. `host`, `p2p_port` and `rpc_port`
/// stay empty until a listener is attached.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Human readable node name.
    pub moniker: String,
    /// Network (chain) identifier.
    pub network: String,
    /// Protocol version.
    pub version: String,
    /// Externally reachable host of the primary listener.
    pub host: Option<String>,
    /// P2P port of the primary listener.
    pub p2p_port: Option<u16>,
    /// RPC port, parsed from configuration.
    pub rpc_port: Option<u16>,
}

impl NodeInfo {
    /// Whether the identity carries a reachable P2P endpoint.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.host.is_some() && self.p2p_port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let addr: NetAddress = "10.0.0.1:26656".parse().unwrap();
        assert_eq!(addr.port, 26656);
        assert_eq!(addr.ip(), Some("10.0.0.1".parse().unwrap()));
        assert_eq!(addr.to_string(), "10.0.0.1:26656");
    }

    #[test]
    fn test_parse_ipv6() {
        let addr: NetAddress = "[::1]:9000".parse().unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.to_string(), "[::1]:9000");
    }

    #[test]
    fn test_parse_hostname() {
        let addr: NetAddress = "seed.example.org:26656".parse().unwrap();
        assert_eq!(addr.host, "seed.example.org");
        assert_eq!(addr.ip(), None);
        assert!(addr.is_routable());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("127.0.0.1".parse::<NetAddress>().is_err());
        assert!("127.0.0.1:xyz".parse::<NetAddress>().is_err());
        assert!(":80".parse::<NetAddress>().is_err());
        assert!("::1:80".parse::<NetAddress>().is_err());
        assert!("[nope]:80".parse::<NetAddress>().is_err());
    }

    #[test]
    fn test_routable() {
        assert!(!"0.0.0.0:1".parse::<NetAddress>().unwrap().is_routable());
        assert!(!"1.2.3.4:0".parse::<NetAddress>().unwrap().is_routable());
        assert!("1.2.3.4:1".parse::<NetAddress>().unwrap().is_routable());
    }

    #[test]
    fn test_from_socket_addr() {
        let sock: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(NetAddress::from(sock).to_string(), "127.0.0.1:4000");
    }

    #[test]
    fn test_default_node_info_not_listening() {
        assert!(!NodeInfo::default().is_listening());
    }
}
