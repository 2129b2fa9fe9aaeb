//! Randomly damage a subset of objects and check the auditor finds exactly
//! those.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;
use scour_audit::Shutdown;
use scour_tests::{
    TEST_CHUNK_SIZE, TestNode, drop_chunk, keys_with_prefix, overwrite_chunk, put_object,
    test_data, unlimited,
};

#[tokio::test]
async fn test_random_damage_is_fully_quarantined() {
    let mut rng = rand::rng();
    let mut node = TestNode::new();
    let drive = node.add_drive(0, "127.0.0.1:6001");

    let mut keys = Vec::new();
    for i in 0..40u32 {
        let size = rng.random_range(1..TEST_CHUNK_SIZE * 5);
        keys.push(put_object(&drive, 0, &format!("/acct/cont/{i}"), &test_data(size, i)).await);
    }

    keys.shuffle(&mut rng);
    let damaged: BTreeSet<String> = keys.iter().take(12).cloned().collect();
    for (n, key) in damaged.iter().enumerate() {
        if n % 2 == 0 {
            drop_chunk(&drive, key, 1).await;
        } else {
            // Chunk 1 always exists; this changes its content and usually its size.
            overwrite_chunk(&drive, key, 1, b"\x00corrupt\x00").await;
        }
    }

    let auditor = node.auditor(unlimited());
    let stats = auditor.run_once(&[], &Shutdown::never()).await.stats;
    assert_eq!(stats.found_objects, 40);
    assert_eq!(stats.quarantines, 12);
    assert_eq!(stats.success, 28);

    for key in &keys {
        let present = drive.get(key).await.unwrap().is_some();
        assert_eq!(present, !damaged.contains(key), "unexpected state for {key}");
    }

    let quarantined_heads: BTreeSet<String> = keys_with_prefix(&drive, "quarantine.")
        .await
        .into_iter()
        .filter_map(|k| k.find("objects.").map(|i| k[i..].to_string()))
        .collect();
    assert_eq!(quarantined_heads, damaged);
}
