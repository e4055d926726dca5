//! # Node lifecycle against on-disk stores
//!
//! Credentials, genesis and the address book survive a restart when the
//! node runs on [`node_runtime::NodeStores::open`].

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use node_runtime::{run_node_until, ConfigError, Node, NodeError, NodeStores};
    use shared_types::NetAddress;
    use tokio::sync::oneshot;

    use crate::integration::support::config;

    #[tokio::test]
    async fn test_restart_keeps_validator_identity() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let first = {
            let node = Node::new(config.clone(), NodeStores::open(&config).unwrap()).unwrap();
            node.start().await.unwrap();
            let key = node.validator_public_key().expect("validator enabled");
            node.stop().await;
            key
        };

        assert!(config.priv_validator_path().exists());
        assert!(config.genesis_path().exists());

        let node = Node::new(config.clone(), NodeStores::open(&config).unwrap()).unwrap();
        assert_eq!(node.validator_public_key(), Some(first));
        let state = node.chain_state();
        assert_eq!(state.chain_id, "meridian-itest");
        assert_eq!(state.validators.len(), 1);
        assert_eq!(state.validators[0].public_key, first);
    }

    #[tokio::test]
    async fn test_address_book_saved_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let peer: NetAddress = "10.0.0.7:26656".parse().unwrap();

        let node = Node::new(config.clone(), NodeStores::open(&config).unwrap()).unwrap();
        node.start().await.unwrap();
        node.addr_book().add_address(peer.clone(), peer.clone());
        node.stop().await;
        assert!(config.addrbook_path().exists());

        let node = Node::new(config.clone(), NodeStores::open(&config).unwrap()).unwrap();
        assert!(node.addr_book().get(&peer).is_some());
    }

    #[tokio::test]
    async fn test_run_until_signal_then_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.p2p.listen_addr = "127.0.0.1:0".into();
        config.rpc.listen_addr = Some("127.0.0.1:0".into());
        let stores = NodeStores::open(&config).unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let running = tokio::spawn(run_node_until(config.clone(), stores, async move {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!running.is_finished());
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(10), running)
            .await
            .expect("node did not shut down")
            .unwrap()
            .unwrap();
        assert!(config.addrbook_path().exists());
    }

    #[tokio::test]
    async fn test_run_rejects_unparsable_listen_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.p2p.listen_addr = "not-an-address".into();

        let result = run_node_until(config, NodeStores::in_memory(), async {}).await;
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_rejects_out_of_range_rpc_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.rpc.listen_addr = Some("127.0.0.1:70000".into());

        let result = run_node_until(config, NodeStores::in_memory(), async {}).await;
        assert!(matches!(
            result,
            Err(NodeError::Config(ConfigError::InvalidRpcPort { .. }))
        ));
    }
}
