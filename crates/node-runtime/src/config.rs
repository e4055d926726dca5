//! # Node Configuration
//!
//! One explicit configuration value, loaded from an optional TOML file and
//! then overridden from `MERIDIAN_*` environment variables. It is passed into
//! [`crate::Node::new`]; nothing reads configuration from global state.
//!
//! ## Validation
//!
//! - The RPC listen address, when set, must carry a numeric port
//! - The P2P listen address must parse as `host:port`
//!
//! Both are fatal before any socket is bound.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::NetAddress;
use thiserror::Error;
use tracing::info;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "MERIDIAN_";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid RPC listen address {addr:?}: port must be a number in 0..=65535")]
    InvalidRpcPort { addr: String },

    #[error("Invalid P2P listen address {addr:?}: expected <host>:<port>")]
    InvalidListenAddr { addr: String },

    #[error("Invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: String, value: String },
}

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Human readable node name.
    pub moniker: String,
    /// Network (chain) identifier advertised to peers.
    pub network: String,
    /// Base directory for every relative path below.
    pub root_dir: PathBuf,
    /// Genesis description (JSON).
    pub genesis_file: PathBuf,
    /// Run block sync ahead of consensus until caught up.
    pub fast_sync: bool,
    pub p2p: P2pConfig,
    pub validator: ValidatorConfig,
    pub rpc: RpcConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            moniker: "anonymous".to_string(),
            network: "meridian-devnet".to_string(),
            root_dir: PathBuf::from("./meridian"),
            genesis_file: PathBuf::from("genesis.json"),
            fast_sync: true,
            p2p: P2pConfig::default(),
            validator: ValidatorConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

/// P2P configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    pub listen_addr: String,
    /// Priority seed. When set, it is the only seed dialed.
    pub seed_node: Option<String>,
    /// Bootstrap seeds, dialed in random order.
    pub seed_nodes: Vec<String>,
    pub addrbook_file: PathBuf,
    pub dial_timeout_ms: u64,
    pub addrbook_save_interval_secs: u64,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:26656".to_string(),
            seed_node: None,
            seed_nodes: Vec::new(),
            addrbook_file: PathBuf::from("addrbook.json"),
            dial_timeout_ms: 3_000,
            addrbook_save_interval_secs: 120,
        }
    }
}

/// Validator (signing credential) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Load or generate a signing credential. `false` runs an observer node.
    pub enabled: bool,
    pub priv_validator_file: PathBuf,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priv_validator_file: PathBuf::from("priv_validator.json"),
        }
    }
}

/// JSON-RPC configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// `host:port` to serve on. Unset disables the RPC server.
    pub listen_addr: Option<String>,
}

impl NodeConfig {
    /// Resolve `path` against `root_dir` unless it is absolute.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    #[must_use]
    pub fn genesis_path(&self) -> PathBuf {
        self.resolve(&self.genesis_file)
    }

    #[must_use]
    pub fn addrbook_path(&self) -> PathBuf {
        self.resolve(&self.p2p.addrbook_file)
    }

    #[must_use]
    pub fn priv_validator_path(&self) -> PathBuf {
        self.resolve(&self.validator.priv_validator_file)
    }

    #[must_use]
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.p2p.dial_timeout_ms)
    }

    #[must_use]
    pub fn addrbook_save_interval(&self) -> Duration {
        Duration::from_secs(self.p2p.addrbook_save_interval_secs.max(1))
    }

    /// Port of the RPC listen address, if one is configured.
    pub fn rpc_port(&self) -> Result<Option<u16>, ConfigError> {
        let Some(addr) = self.rpc.listen_addr.as_deref() else {
            return Ok(None);
        };
        parse_port(addr)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidRpcPort {
                addr: addr.to_string(),
            })
    }

    /// The RPC listen address as a bindable `host:port`.
    pub fn rpc_listen_addr(&self) -> Result<Option<NetAddress>, ConfigError> {
        let Some(raw) = self.rpc.listen_addr.as_deref() else {
            return Ok(None);
        };
        let port = parse_port(raw).ok_or_else(|| ConfigError::InvalidRpcPort {
            addr: raw.to_string(),
        })?;
        let addr = strip_scheme(raw)
            .parse::<NetAddress>()
            .map_err(|_| ConfigError::InvalidRpcPort {
                addr: raw.to_string(),
            })?;
        Ok(Some(NetAddress::new(addr.host, port)))
    }

    pub fn p2p_listen_addr(&self) -> Result<NetAddress, ConfigError> {
        strip_scheme(&self.p2p.listen_addr)
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr {
                addr: self.p2p.listen_addr.clone(),
            })
    }

    /// Whether any seed is configured.
    #[must_use]
    pub fn has_seeds(&self) -> bool {
        self.priority_seed().is_some() || !self.p2p.seed_nodes.is_empty()
    }

    /// The priority seed, ignoring blank values.
    #[must_use]
    pub fn priority_seed(&self) -> Option<&str> {
        self.p2p
            .seed_node
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Reject settings that must not reach startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc_listen_addr()?;
        self.p2p_listen_addr()?;
        Ok(())
    }

    /// Apply `MERIDIAN_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(moniker) = var("MONIKER") {
            self.moniker = moniker;
        }
        if let Some(network) = var("NETWORK") {
            self.network = network;
        }
        if let Some(root) = var("ROOT_DIR") {
            self.root_dir = PathBuf::from(root);
        }
        if let Some(value) = var("FAST_SYNC") {
            self.fast_sync = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: format!("{ENV_PREFIX}FAST_SYNC"),
                value,
            })?;
        }
        if let Some(addr) = var("P2P_LISTEN_ADDR") {
            self.p2p.listen_addr = addr;
        }
        if let Some(seed) = var("SEED_NODE") {
            self.p2p.seed_node = Some(seed);
        }
        if let Some(seeds) = var("SEEDS") {
            self.p2p.seed_nodes = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(addr) = var("RPC_LISTEN_ADDR") {
            self.rpc.listen_addr = Some(addr).filter(|a| !a.is_empty());
        }
        Ok(())
    }
}

fn strip_scheme(addr: &str) -> &str {
    addr.trim().strip_prefix("tcp://").unwrap_or(addr.trim())
}

fn parse_port(addr: &str) -> Option<u16> {
    let (_, port) = strip_scheme(addr).rsplit_once(':')?;
    port.parse().ok()
}

/// Load configuration from `path` (if given), then apply environment
/// overrides.
pub fn load_config(path: Option<&Path>) -> Result<NodeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), "Loaded config file");
            toml::from_str(&raw)?
        }
        None => NodeConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}
