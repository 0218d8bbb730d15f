//! Contention, retry and timeout behaviour of the engine.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{Harness, fast_retries};
use prize_inventory_core::counter::{Counter, Counters};
use prize_inventory_core::error::InventoryError;
use prize_inventory_core::mutation::MutationList;
use prize_inventory_core::store::StoreError;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversell() {
    let h = Harness::new();
    let key = h.stocked("coffee", 50);

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let inventory = h.inventory.clone();
            let key = key.clone();
            tokio::spawn(async move { inventory.reserve(&key, 1).await })
        })
        .collect();

    let mut granted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => granted += 1,
            Err(InventoryError::InsufficientBalance { .. }) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(granted, 50);
    assert_eq!(refused, 150);
    let counters = h.counters(&key);
    assert_eq!((counters.available, counters.reserved), (0, 50));
    assert!(counters.conservation_holds());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_concurrent_movements_conserve_units() {
    let h = Harness::new();
    let key = h.stocked("coffee", 20);

    let mut handles = Vec::new();
    for i in 0..60 {
        let inventory = h.inventory.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            match i % 3 {
                0 => inventory.reserve(&key, 2).await,
                1 => inventory.release(&key, 1).await,
                _ => inventory.top_up(&key, 1).await,
            }
        }));
    }
    for handle in handles {
        let result = handle.await.expect("task panicked");
        assert!(
            result.is_ok() || matches!(result, Err(InventoryError::InsufficientBalance { .. })),
            "{result:?}"
        );
    }

    let counters = h.counters(&key);
    assert_eq!(counters.amount, 40);
    assert!(counters.conservation_holds(), "{counters:?}");
}

#[tokio::test]
async fn lost_race_is_retried_with_a_fresh_write() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    h.store.fail_next(StoreError::ConditionFailed(key.clone()));
    h.store.fail_next(StoreError::ConditionFailed(key.clone()));

    let counters = h.inventory.reserve(&key, 1).await.unwrap();

    assert_eq!((counters.available, counters.reserved), (4, 1));
    assert_eq!(h.store.write_count(), 1);
}

#[tokio::test]
async fn persistent_contention_exhausts_the_retry_budget() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    for _ in 0..6 {
        h.store.fail_next(StoreError::ConditionFailed(key.clone()));
    }

    let err = h.inventory.reserve(&key, 1).await.unwrap_err();

    assert_eq!(
        err,
        InventoryError::ConcurrentUpdateExhausted {
            key: key.clone(),
            attempts: 6,
        }
    );
    assert_eq!(h.counters(&key), Counters::stocked(5));
}

#[tokio::test]
async fn retry_budget_follows_the_policy() {
    let mut h = Harness::new();
    h.inventory = h.inventory.clone().with_retry_policy(fast_retries(1));
    let key = h.stocked("coffee", 5);
    for _ in 0..2 {
        h.store.fail_next(StoreError::ConditionFailed(key.clone()));
    }

    let err = h.inventory.claim(&key, 0).await.unwrap_err();
    assert!(matches!(err, InventoryError::Validation(_)));

    let err = h.inventory.reserve(&key, 1).await.unwrap_err();
    assert!(matches!(
        err,
        InventoryError::ConcurrentUpdateExhausted { attempts: 2, .. }
    ));
}

#[tokio::test]
async fn competing_writer_draining_stock_yields_insufficient_balance() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    h.store.interfere_next(
        key.clone(),
        MutationList::new()
            .decrement(Counter::Available.attribute(), 5)
            .increment(Counter::Reserved.attribute(), 5),
    );

    let err = h.inventory.reserve(&key, 2).await.unwrap_err();

    assert_eq!(
        err,
        InventoryError::InsufficientBalance {
            key: key.clone(),
            counter: Counter::Available,
            requested: 2,
            available: 0,
        }
    );
    assert_eq!(h.counters(&key).reserved, 5);
}

#[tokio::test]
async fn competing_writer_leaving_enough_stock_does_not_block() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    h.store.interfere_next(
        key.clone(),
        MutationList::new()
            .decrement(Counter::Available.attribute(), 3)
            .increment(Counter::Reserved.attribute(), 3),
    );

    let counters = h.inventory.reserve(&key, 2).await.unwrap();
    assert_eq!((counters.available, counters.reserved), (0, 5));
}

#[tokio::test]
async fn transient_store_errors_are_retried() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    h.store.fail_next(StoreError::Unavailable("connection reset".into()));
    h.store.fail_next(StoreError::TransactionConflict("serialization failure".into()));

    let counters = h.inventory.reserve(&key, 1).await.unwrap();
    assert_eq!(counters.reserved, 1);
}

#[tokio::test]
async fn unreachable_store_surfaces_after_the_budget() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    for _ in 0..6 {
        h.store.fail_next(StoreError::Unavailable("connection refused".into()));
    }

    let err = h.inventory.top_up(&key, 1).await.unwrap_err();

    match err {
        InventoryError::StoreUnavailable { attempts, message } => {
            assert_eq!(attempts, 6);
            assert!(message.contains("connection refused"), "{message}");
        }
        other => panic!("expected StoreUnavailable, got {other:?}"),
    }
    assert_eq!(h.counters(&key), Counters::stocked(5));
}

#[tokio::test]
async fn slow_write_reports_unknown_outcome_and_still_applies() {
    let mut h = Harness::new();
    h.inventory = h
        .inventory
        .clone()
        .with_response_timeout(Some(Duration::from_millis(20)));
    let key = h.stocked("coffee", 5);
    h.store.set_write_latency(Some(Duration::from_millis(150)));

    let err = h.inventory.reserve(&key, 1).await.unwrap_err();
    assert_eq!(err, InventoryError::OutcomeUnknown { key: key.clone() });
    assert!(!err.is_business_outcome());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let counters = h.counters(&key);
    assert_eq!((counters.available, counters.reserved), (4, 1));
}

#[tokio::test]
async fn unknown_outcome_is_not_retried() {
    let mut h = Harness::new();
    h.inventory = h
        .inventory
        .clone()
        .with_response_timeout(Some(Duration::from_millis(20)));
    let key = h.stocked("coffee", 5);
    h.store.set_write_latency(Some(Duration::from_millis(100)));

    assert!(h.inventory.top_up(&key, 1).await.is_err());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.store.write_count(), 1);
    assert_eq!(h.counters(&key), Counters::stocked(6));
}

#[tokio::test]
async fn dropped_caller_does_not_cancel_a_submitted_write() {
    let h = Harness::new();
    let key = h.stocked("coffee", 5);
    h.store.set_write_latency(Some(Duration::from_millis(100)));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), h.inventory.reserve(&key, 1)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.counters(&key).reserved, 1);
}
