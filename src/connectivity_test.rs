use std::sync::Arc;

use super::*;
use crate::cache::MemoryCache;
use crate::retry::AuthPhase;
use crate::test_helpers::{ScriptedTransport, alice, refused, settle_tasks, store_with};

#[tokio::test(start_paused = true)]
async fn coming_online_preempts_retry_and_recovers() {
    let transport = Arc::new(ScriptedTransport::new(vec![Err(refused()), Ok(alice())]));
    let store = store_with(&transport, &Arc::new(MemoryCache::new()));
    let (online_tx, online_rx) = watch::channel(false);
    store.watch_connectivity(online_rx);
    settle_tasks().await;

    store.init().await;
    assert_eq!(store.session().phase, AuthPhase::AwaitingRetry);

    online_tx.send_replace(true);
    settle_tasks().await;

    assert_eq!(transport.probe_calls(), 2);
    assert!(store.is_authenticated());
    assert!(!store.has_pending_retry());
}

#[tokio::test(start_paused = true)]
async fn staying_online_does_not_probe() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(alice())]));
    let store = store_with(&transport, &Arc::new(MemoryCache::new()));
    let (online_tx, online_rx) = watch::channel(true);
    store.watch_connectivity(online_rx);
    store.init().await;

    online_tx.send_replace(true);
    settle_tasks().await;
    assert_eq!(transport.probe_calls(), 1);

    online_tx.send_replace(false);
    settle_tasks().await;
    online_tx.send_replace(true);
    settle_tasks().await;
    assert_eq!(transport.probe_calls(), 2, "offline then online re-probes once");
}

#[tokio::test(start_paused = true)]
async fn disposed_store_ignores_connectivity() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(alice())]));
    let store = store_with(&transport, &Arc::new(MemoryCache::new()));
    let (online_tx, online_rx) = watch::channel(false);
    store.watch_connectivity(online_rx);

    store.dispose();
    settle_tasks().await;
    online_tx.send_replace(true);
    settle_tasks().await;

    assert_eq!(transport.probe_calls(), 0);
    assert!(online_tx.is_closed(), "watcher task was aborted");
}

#[tokio::test]
async fn reachability_goes_offline_when_backend_disappears() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let timeouts = HttpTimeouts { request: Duration::from_secs(2), connect: Duration::from_secs(1) };
    let (mut online, _task) = poll_reachability(&format!("http://{addr}/"), Duration::from_millis(50), timeouts).unwrap();

    let went_offline = tokio::time::timeout(Duration::from_secs(5), online.wait_for(|up| !*up)).await;
    assert!(went_offline.is_ok_and(|r| r.is_ok()));
}
