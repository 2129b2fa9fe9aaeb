//! End-to-end sweeps over file-backed drives.

use scour_audit::Shutdown;
use scour_tests::{
    TEST_CHUNK_SIZE, TestNode, drop_chunk, keys_with_prefix, overwrite_chunk, put_object,
    test_data, unlimited,
};

const DEV_A: &str = "127.0.0.1:6001";
const DEV_B: &str = "127.0.0.1:6002";
const DEV_C: &str = "127.0.0.1:6003";

#[tokio::test]
async fn test_healthy_node_sweeps_clean() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    let b = node.add_drive(1, DEV_B);
    for i in 0..10u32 {
        let body = test_data(TEST_CHUNK_SIZE * 3 + i as usize, i);
        put_object(&a, 0, &format!("/acct/cont/a{i}"), &body).await;
        put_object(&b, 1, &format!("/acct/cont/b{i}"), &body).await;
    }

    let auditor = node.auditor(unlimited());
    let summary = auditor.run_once(&[], &Shutdown::never()).await;
    assert_eq!(summary.devices, 2);
    assert_eq!(summary.stats.found_objects, 20);
    assert_eq!(summary.stats.success, 20);
    assert_eq!(summary.stats.failures, 0);
    assert_eq!(summary.stats.device_success, 2);
    assert!(keys_with_prefix(&a, "quarantine.").await.is_empty());
}

#[tokio::test]
async fn test_truncated_hello_world_is_quarantined() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    let good = put_object(&a, 0, "/acct/cont/good", b"hello world").await;
    let bad = put_object(&a, 0, "/acct/cont/bad", b"hello world").await;
    overwrite_chunk(&a, &bad, 1, b"hello worl").await;

    let auditor = node.auditor(unlimited());
    let stats = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(stats.found_objects, 2);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.quarantines, 1);

    assert!(a.get(&good).await.unwrap().is_some());
    assert!(a.get(&bad).await.unwrap().is_none());
    let quarantined = keys_with_prefix(&a, "quarantine.").await;
    assert_eq!(quarantined.len(), 2);
    assert!(quarantined.iter().any(|k| k.ends_with(&bad)));
}

#[tokio::test]
async fn test_missing_chunk_is_caught_by_size() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    let key = put_object(&a, 0, "/acct/cont/o", &test_data(TEST_CHUNK_SIZE * 4, 7)).await;
    drop_chunk(&a, &key, 2).await;

    let auditor = node.auditor(unlimited());
    let stats = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(stats.quarantines, 1);
    // The three surviving chunks and the head key.
    assert_eq!(keys_with_prefix(&a, "quarantine.").await.len(), 4);
    assert!(keys_with_prefix(&a, "chunks.").await.is_empty());
}

#[tokio::test]
async fn test_bit_flip_is_caught_by_etag() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    let key = put_object(&a, 0, "/acct/cont/o", &[b'x'; TEST_CHUNK_SIZE * 2]).await;
    overwrite_chunk(&a, &key, 2, &[b'y'; TEST_CHUNK_SIZE]).await;

    let auditor = node.auditor(unlimited());
    let stats = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.quarantines, 1);
    assert_eq!(stats.total_bytes_processed, (TEST_CHUNK_SIZE * 2) as u64);
}

#[tokio::test]
async fn test_missing_drive_is_a_device_failure() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    node.add_missing_drive(0, DEV_B);
    put_object(&a, 0, "/acct/cont/o", b"payload").await;

    let auditor = node.auditor(unlimited());
    let stats = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(stats.device_success, 1);
    assert_eq!(stats.device_failures, 1);
    assert_eq!(stats.success, 1);
}

#[tokio::test]
async fn test_override_list_limits_sweep() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    let c = node.add_drive(0, DEV_C);
    put_object(&a, 0, "/acct/cont/a", b"a").await;
    put_object(&c, 0, "/acct/cont/c", b"c").await;

    let auditor = node.auditor(unlimited());
    let summary = auditor
        .run_once(&[DEV_C.to_string()], &Shutdown::never())
        .await;
    assert_eq!(summary.devices, 1);
    assert_eq!(summary.stats.found_objects, 1);
}

#[tokio::test]
async fn test_second_sweep_finds_nothing_new() {
    let mut node = TestNode::new();
    let a = node.add_drive(0, DEV_A);
    for i in 0..5u32 {
        let key = put_object(&a, 0, &format!("/acct/cont/{i}"), &test_data(100, i)).await;
        if i % 2 == 0 {
            overwrite_chunk(&a, &key, 1, b"garbage").await;
        }
    }

    let auditor = node.auditor(unlimited());
    let first = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(first.quarantines, 3);
    assert_eq!(first.success, 2);

    let second = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(second.found_objects, 2);
    assert_eq!(second.success, 2);
    assert_eq!(second.quarantines, 0);
}
