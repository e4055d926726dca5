//! # Peering between two nodes
//!
//! Node B is configured with node A's listener as its seed. Dialing seeds
//! connects the pair over loopback TCP and records A in B's address book.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shared_bus::{ChainEvent, EventFilter, EventKind};
    use tokio::time::{sleep, timeout};

    use crate::integration::support::{config, listening_node};

    #[tokio::test]
    async fn test_seed_dial_connects_two_nodes() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        let a = listening_node(config(dir_a.path())).await;
        let a_addr = a.switch().listeners()[0].external_address();
        let mut a_events = a.bus().subscribe(EventFilter::kinds([EventKind::PeerConnected]));

        let mut b_config = config(dir_b.path());
        b_config.p2p.seed_node = Some(format!("tcp://{a_addr}"));
        let b = listening_node(b_config).await;
        let mut b_events = b.bus().subscribe(EventFilter::kinds([EventKind::PeerConnected]));

        let report = b.dial_seeds().await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.connected, vec![a_addr.clone()]);
        assert!(report.failed.is_empty());

        assert_eq!(b.switch().num_peers(), 1);
        assert!(b.switch().peers()[0].is_outbound());
        let known = b.addr_book().get(&a_addr).expect("seed recorded");
        // a successful dial resets the attempt counter
        assert_eq!(known.attempts, 0);
        assert!(known.last_attempt.is_some());
        assert!(known.last_success.is_some());

        match timeout(Duration::from_secs(5), b_events.recv()).await.unwrap() {
            Some(ChainEvent::PeerConnected { address, outbound }) => {
                assert_eq!(address, a_addr);
                assert!(outbound);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        timeout(Duration::from_secs(5), async {
            while a.switch().num_peers() == 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("inbound peer never registered");
        assert!(!a.switch().peers()[0].is_outbound());

        match timeout(Duration::from_secs(5), a_events.recv()).await.unwrap() {
            Some(ChainEvent::PeerConnected { outbound, .. }) => assert!(!outbound),
            other => panic!("unexpected event: {other:?}"),
        }

        b.stop().await;
        a.stop().await;
        assert_eq!(b.switch().num_peers(), 0);
    }

    #[tokio::test]
    async fn test_seed_list_dials_every_reachable_seed() {
        let dirs: Vec<_> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
        let a = listening_node(config(dirs[0].path())).await;
        let c = listening_node(config(dirs[1].path())).await;
        let a_addr = a.switch().listeners()[0].external_address();
        let c_addr = c.switch().listeners()[0].external_address();

        let mut b_config = config(dirs[2].path());
        b_config.p2p.seed_nodes = vec![
            a_addr.to_string(),
            // nothing listens on port 1
            "127.0.0.1:1".to_string(),
            c_addr.to_string(),
        ];
        let b = listening_node(b_config).await;

        let mut report = b.dial_seeds().await;
        report.connected.sort();
        let mut expected = vec![a_addr, c_addr];
        expected.sort();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.connected, expected);
        assert_eq!(report.failed, vec!["127.0.0.1:1".to_string()]);
        assert_eq!(b.switch().num_peers(), 2);

        b.stop().await;
        a.stop().await;
        c.stop().await;
    }

    #[tokio::test]
    async fn test_node_info_reports_listener() {
        let dir = tempfile::tempdir().unwrap();
        let node = listening_node(config(dir.path())).await;
        let port = node.switch().listeners()[0].external_address().port;

        let info = node.switch().node_info().expect("set on start");
        assert_eq!(info.network, "meridian-itest");
        assert_eq!(info.p2p_port, Some(port));
        assert!(info.is_listening());

        node.stop().await;
    }
}
