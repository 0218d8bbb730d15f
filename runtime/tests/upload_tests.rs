//! Partition allocation for code uploads.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use prize_inventory_core::error::{InventoryError, ValidationError};
use prize_inventory_core::partition::code_namespace;
use prize_inventory_runtime::InventoryConfig;

fn small_partitions() -> Harness {
    let mut config = InventoryConfig::default();
    config.partitioning.threshold = 1000;
    config.partitioning.batch_size = 40;
    Harness::with_config(&config)
}

#[tokio::test]
async fn upload_below_threshold_is_not_partitioned() {
    let h = small_partitions();
    let key = h.stocked("coffee", 100);

    let session = h.inventory.start_upload(&key, 100).await.unwrap();

    assert!(!session.plan.use_partitions);
    assert_eq!(session.batches.len(), 3);
    assert!(session.batches.iter().all(|b| b.partition.is_none()));
    assert_eq!(h.inventory.commit_upload(&key, &session).await.unwrap(), None);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn crossing_the_threshold_starts_at_partition_zero_then_continues() {
    let h = small_partitions();
    let key = h.stocked("coffee", 950);

    let plan = h.inventory.plan_partition_for_upload(&key, 100).await.unwrap();
    assert!(plan.use_partitions);
    assert_eq!((plan.partition_number, plan.active_partition), (0, 0));

    let session = h.inventory.start_upload(&key, 30).await.unwrap();
    let prize = h.inventory.commit_upload(&key, &session).await.unwrap().unwrap();
    assert_eq!(prize.total_partitions, Some(0));
    assert_eq!(prize.active_partition, Some(0));

    let plan = h.inventory.plan_partition_for_upload(&key, 100).await.unwrap();
    assert_eq!(plan.partition_number, 1);
}

#[tokio::test]
async fn each_batch_gets_its_own_partition() {
    let h = small_partitions();
    let key = h.stocked("coffee", 2000);

    let session = h.inventory.start_upload(&key, 100).await.unwrap();
    let tags: Vec<_> = session
        .batches
        .iter()
        .map(|b| (b.offset, b.len, b.partition))
        .collect();
    assert_eq!(
        tags,
        [(0, 40, Some(0)), (40, 40, Some(1)), (80, 20, Some(2))]
    );

    let namespaces: Vec<_> = session
        .batches
        .iter()
        .map(|b| code_namespace(&key.prize_id, b.partition))
        .collect();
    assert_eq!(namespaces, ["coffee", "coffee-1", "coffee-2"]);

    let prize = h.inventory.commit_upload(&key, &session).await.unwrap().unwrap();
    assert_eq!(prize.total_partitions, Some(2));

    let next = h.inventory.start_upload(&key, 10).await.unwrap();
    assert_eq!(next.batches[0].partition, Some(3));
}

#[tokio::test]
async fn commit_keeps_the_active_partition_and_counters() {
    let h = small_partitions();
    let key = h.stocked("coffee", 2000);
    h.inventory.reserve(&key, 5).await.unwrap();
    h.inventory
        .transition(
            &key,
            prize_inventory_core::Counter::Reserved,
            prize_inventory_core::Counter::Redeemed,
            1,
            prize_inventory_core::transition::TransitionExtra::NONE.with_active_partition(4),
        )
        .await
        .unwrap();

    let session = h.inventory.start_upload(&key, 10).await.unwrap();
    assert_eq!(session.plan.active_partition, 4);
    let prize = h.inventory.commit_upload(&key, &session).await.unwrap().unwrap();

    assert_eq!(prize.active_partition, Some(4));
    assert_eq!(prize.counters.reserved, 4);
    assert!(prize.counters.conservation_holds());
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let h = small_partitions();
    let key = h.stocked("coffee", 10);

    assert_eq!(
        h.inventory.start_upload(&key, 0).await.unwrap_err(),
        InventoryError::Validation(ValidationError::EmptyUpload)
    );
}

#[tokio::test]
async fn upload_for_missing_prize_is_not_found() {
    let h = small_partitions();
    let key = Harness::key("ghost");

    assert_eq!(
        h.inventory.plan_partition_for_upload(&key, 5).await.unwrap_err(),
        InventoryError::RecordNotFound(key)
    );
}
