//! Cross-crate integration flows.

pub mod filters;
pub mod lifecycle;
pub mod peering;

#[cfg(test)]
pub(crate) mod support {
    use std::path::Path;
    use std::sync::Arc;

    use node_runtime::{Node, NodeConfig, NodeStores};
    use p2p_switch::DefaultListener;
    use shared_types::{LogRecord, NetAddress};

    pub fn config(root: &Path) -> NodeConfig {
        NodeConfig {
            root_dir: root.to_path_buf(),
            network: "meridian-itest".into(),
            fast_sync: false,
            ..NodeConfig::default()
        }
    }

    pub fn node(root: &Path) -> Node {
        Node::new(config(root), NodeStores::in_memory()).unwrap()
    }

    /// A started node listening on an ephemeral loopback port.
    pub async fn listening_node(config: NodeConfig) -> Node {
        let mut node = Node::new(config, NodeStores::in_memory()).unwrap();
        let listener = DefaultListener::bind(&NetAddress::new("127.0.0.1", 0))
            .await
            .unwrap();
        node.add_listener(Arc::new(listener)).unwrap();
        node.start().await.unwrap();
        node
    }

    pub fn log(address: u8, topic: u8, block_number: u64) -> LogRecord {
        LogRecord {
            address: [address; 20],
            topics: vec![[topic; 32]],
            data: vec![],
            block_number,
            tx_hash: [0; 32],
            log_index: 0,
        }
    }
}
