//! Scheduler → recon cache reporting.

use std::sync::Arc;
use std::time::Duration;

use scour_audit::{OBJECT_AUDIT_SWEEP, ReconCache, Shutdown, SweepScheduler};
use scour_tests::{TestNode, put_object, unlimited};

#[tokio::test]
async fn test_scheduler_writes_sweep_time_to_recon_cache() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, "127.0.0.1:6001");
    put_object(&a, 0, "/acct/cont/o", b"payload").await;

    let recon_path = node.path("cache").join("object.recon");
    std::fs::create_dir_all(recon_path.parent().unwrap()).unwrap();
    std::fs::write(&recon_path, r#"{"object_replication_last": 1.0}"#).unwrap();
    let cache = Arc::new(ReconCache::new(&recon_path));

    let (tx, shutdown) = Shutdown::channel();
    let scheduler = Arc::new(
        SweepScheduler::new(node.auditor(unlimited()), cache.clone(), shutdown)
            .with_interval(Duration::from_millis(50)),
    );
    let task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_forever().await })
    };

    // Wait for the first report to land.
    let mut reported = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if cache.load().await.unwrap().contains_key(OBJECT_AUDIT_SWEEP) {
            reported = true;
            break;
        }
    }
    tx.send(true).unwrap();
    let completed = task.await.unwrap();

    assert!(reported);
    assert!(completed >= 1);
    let map = cache.load().await.unwrap();
    assert!(map[OBJECT_AUDIT_SWEEP].as_f64().unwrap() >= 0.0);
    assert_eq!(map["object_replication_last"], serde_json::json!(1.0));
}

#[tokio::test]
async fn test_single_run_leaves_recon_cache_alone() {
    let mut node = TestNode::new();
    node.add_drive(0, "127.0.0.1:6001");
    let recon_path = node.path("object.recon");
    let cache = Arc::new(ReconCache::new(&recon_path));

    let scheduler = SweepScheduler::new(node.auditor(unlimited()), cache, Shutdown::never());
    let summary = scheduler.run_once().await;
    assert_eq!(summary.stats.device_success, 1);
    assert!(!recon_path.exists());
}
