//! # Meridian Node
//!
//! Usage: `node-runtime [CONFIG.toml]`
//!
//! Logging follows `RUST_LOG` and defaults to `info`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use node_runtime::{load_config, run_node};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref()).context("loading configuration")?;
    config.validate().context("validating configuration")?;

    info!(
        moniker = %config.moniker,
        network = %config.network,
        root = %config.root_dir.display(),
        "Starting Meridian node"
    );
    run_node(config).await.context("node failed")?;

    info!("Shutdown complete");
    Ok(())
}
