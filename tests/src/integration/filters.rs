//! # Filters over a live node
//!
//! Blocks committed by the node's consensus reach installed filters through
//! the event bus:
//!
//! ```text
//! ConsensusState::commit ──NewBlock, Logs──→ InMemoryEventBus ──→ FilterManager
//! ConsensusState::propose ──PendingBlock──↗
//! ```

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use filter_manager::{Filter, FilterManager, LogCriteria};
    use parking_lot::Mutex;
    use shared_types::LogRecord;
    use tokio::time::{sleep, timeout};

    use crate::integration::support::{log, node};

    async fn wait_for(cond: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !cond() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_committed_blocks_reach_filters() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());
        node.start().await.unwrap();

        let manager = FilterManager::new(node.bus().clone());
        let finalized = Arc::new(Mutex::new(Vec::new()));
        let pending = Arc::new(AtomicUsize::new(0));
        let f = finalized.clone();
        let p = pending.clone();
        manager.install(
            Filter::new()
                .on_block(move |block| f.lock().push(block.height()))
                .on_pending(move |_| {
                    p.fetch_add(1, Ordering::SeqCst);
                }),
        );
        manager.start().unwrap();

        for _ in 0..3 {
            node.consensus().commit_next_block(vec![]).unwrap();
        }

        wait_for(|| finalized.lock().len() == 3).await;
        assert_eq!(*finalized.lock(), vec![1, 2, 3]);
        assert_eq!(pending.load(Ordering::SeqCst), 3);

        manager.stop();
        manager.join().await;
        node.stop().await;
    }

    #[tokio::test]
    async fn test_log_filters_receive_matching_subset() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());

        let manager = FilterManager::new(node.bus().clone());
        let received: Arc<Mutex<Vec<Vec<LogRecord>>>> = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        manager.install(
            Filter::new()
                .with_criteria(LogCriteria::any().with_addresses([[0xaa; 20]]))
                .on_logs(move |logs| r.lock().push(logs)),
        );
        let other_calls = Arc::new(AtomicUsize::new(0));
        let o = other_calls.clone();
        manager.install(
            Filter::new()
                .with_criteria(LogCriteria::any().with_addresses([[0xcc; 20]]))
                .on_logs(move |_| {
                    o.fetch_add(1, Ordering::SeqCst);
                }),
        );
        manager.start().unwrap();

        node.consensus()
            .commit_next_block(vec![log(0xaa, 1, 1), log(0xbb, 1, 1), log(0xaa, 2, 1)])
            .unwrap();
        // a block whose logs match nobody
        node.consensus()
            .commit_next_block(vec![log(0xbb, 1, 2)])
            .unwrap();
        node.consensus()
            .commit_next_block(vec![log(0xaa, 3, 3)])
            .unwrap();

        wait_for(|| received.lock().len() == 2).await;
        let received = received.lock().clone();
        assert_eq!(received[0], vec![log(0xaa, 1, 1), log(0xaa, 2, 1)]);
        assert_eq!(received[1], vec![log(0xaa, 3, 3)]);

        // give the dispatcher a moment; nothing ever matched 0xcc
        sleep(Duration::from_millis(50)).await;
        assert_eq!(other_calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.stats().callback_faults, 0);

        manager.stop();
    }

    #[tokio::test]
    async fn test_stopped_manager_ignores_later_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());

        let manager = FilterManager::new(node.bus().clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        manager.install(Filter::new().on_block(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        manager.start().unwrap();

        node.consensus().commit_next_block(vec![]).unwrap();
        wait_for(|| calls.load(Ordering::SeqCst) == 1).await;

        manager.stop();
        manager.stop();
        for _ in 0..5 {
            node.consensus().commit_next_block(vec![]).unwrap();
        }
        manager.join().await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uninstalled_filter_stops_receiving() {
        let dir = tempfile::tempdir().unwrap();
        let node = node(dir.path());

        let manager = FilterManager::new(node.bus().clone());
        let kept = Arc::new(AtomicUsize::new(0));
        let removed = Arc::new(AtomicUsize::new(0));
        let k = kept.clone();
        let r = removed.clone();
        manager.install(Filter::new().on_block(move |_| {
            k.fetch_add(1, Ordering::SeqCst);
        }));
        let id = manager.install(Filter::new().on_block(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        manager.start().unwrap();

        node.consensus().commit_next_block(vec![]).unwrap();
        wait_for(|| kept.load(Ordering::SeqCst) == 1 && removed.load(Ordering::SeqCst) == 1).await;

        manager.uninstall(id);
        assert!(manager.get(id).is_none());
        node.consensus().commit_next_block(vec![]).unwrap();
        wait_for(|| kept.load(Ordering::SeqCst) == 2).await;
        assert_eq!(removed.load(Ordering::SeqCst), 1);

        manager.stop();
    }
}
