//! In-memory record store for fast, deterministic testing.
//!
//! [`InMemoryRecordStore`] implements the full [`RecordStore`] contract: every
//! write evaluates its predicate and applies its mutation under one write
//! lock, so check-and-write is atomic exactly like the production store.
//!
//! Fault injection lets tests reproduce what only shows up under real
//! contention:
//! - [`InMemoryRecordStore::fail_next`] makes the next write return an error
//! - [`InMemoryRecordStore::interfere_next`] applies a competing mutation just
//!   before the next write is evaluated (a concurrent writer winning the race)
//! - [`InMemoryRecordStore::set_write_latency`] delays writes to exercise
//!   response timeouts

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning is the only panic source

use prize_inventory_core::PrizeKey;
use prize_inventory_core::mutation::MutationList;
use prize_inventory_core::record::{CONFIGURATION_ID, PRIZE_ID, Record};
use prize_inventory_core::store::{
    CancellationReason, DeleteItem, PutItem, RecordQuery, RecordStore, StoreError, StoreFuture,
    UpdateItem, WriteItem,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// A scripted fault consumed by the next write.
#[derive(Clone, Debug)]
enum Fault {
    Fail(StoreError),
    Interfere { key: PrizeKey, mutation: MutationList },
}

/// In-memory [`RecordStore`].
///
/// Cloning shares the underlying data, so a clone can be handed to the engine
/// while the test keeps another for seeding and assertions.
///
/// # Example
///
/// ```
/// use prize_inventory_testing::InMemoryRecordStore;
/// use prize_inventory_testing::fixtures::stocked_prize;
/// use prize_inventory_core::store::RecordStore;
/// use prize_inventory_core::PrizeKey;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new();
/// let key = PrizeKey::new("summer", "coffee");
/// store.insert(stocked_prize(&key, 10));
///
/// let record = store.get(&key).await?;
/// assert_eq!(record.and_then(|r| r.number("total_available")), Some(10));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<BTreeMap<PrizeKey, Record>>>,
    faults: Arc<Mutex<VecDeque<Fault>>>,
    write_latency: Arc<RwLock<Option<Duration>>>,
    writes: Arc<AtomicU64>,
    condition_failures: Arc<AtomicU64>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing guards. The record must carry its key.
    pub fn insert(&self, record: Record) {
        let key = record.key().unwrap();
        self.records.write().unwrap().insert(key, record);
    }

    /// Current copy of a record.
    #[must_use]
    pub fn snapshot(&self, key: &PrizeKey) -> Option<Record> {
        self.records.read().unwrap().get(key).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Make the next write fail with `error` without touching any record.
    pub fn fail_next(&self, error: StoreError) {
        self.faults.lock().unwrap().push_back(Fault::Fail(error));
    }

    /// Apply `mutation` to `key` immediately before the next write is
    /// evaluated, simulating a concurrent writer that got there first.
    pub fn interfere_next(&self, key: PrizeKey, mutation: MutationList) {
        self.faults
            .lock()
            .unwrap()
            .push_back(Fault::Interfere { key, mutation });
    }

    /// Delay every write by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        *self.write_latency.write().unwrap() = latency;
    }

    /// Writes that reached the store (applied or rejected by a guard).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Writes rejected because a guard did not hold.
    #[must_use]
    pub fn condition_failure_count(&self) -> u64 {
        self.condition_failures.load(Ordering::SeqCst)
    }

    async fn before_write(&self) -> Result<(), StoreError> {
        let latency = *self.write_latency.read().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let fault = self.faults.lock().unwrap().pop_front();
        match fault {
            Some(Fault::Fail(error)) => Err(error),
            Some(Fault::Interfere { key, mutation }) => {
                if let Some(record) = self.records.write().unwrap().get_mut(&key) {
                    mutation.apply_to(record);
                }
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn condition_failed(&self, key: &PrizeKey) -> StoreError {
        self.condition_failures.fetch_add(1, Ordering::SeqCst);
        StoreError::ConditionFailed(key.clone())
    }
}

fn keyed(mut record: Record, key: &PrizeKey) -> Record {
    record.set(CONFIGURATION_ID, key.configuration_id.as_str());
    record.set(PRIZE_ID, key.prize_id.as_str());
    record
}

fn check(records: &BTreeMap<PrizeKey, Record>, item: &WriteItem) -> CancellationReason {
    let empty = Record::new();
    let (current, condition, must_exist) = match item {
        WriteItem::Put(put) => (records.get(&put.key), &put.condition, false),
        WriteItem::Update(update) => (records.get(&update.key), &update.condition, true),
        WriteItem::Delete(delete) => (records.get(&delete.key), &delete.condition, true),
        WriteItem::ConditionCheck(check) => (records.get(&check.key), &check.condition, false),
    };
    match current {
        None if must_exist => CancellationReason::NotFound,
        current if !condition.evaluate(current.unwrap_or(&empty)) => {
            CancellationReason::ConditionFailed
        }
        _ => CancellationReason::None,
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, key: &PrizeKey) -> StoreFuture<'_, Option<Record>> {
        let record = self.snapshot(key);
        Box::pin(async move { Ok(record) })
    }

    fn put(&self, item: PutItem) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.before_write().await?;
            let mut records = self.records.write().unwrap();
            let empty = Record::new();
            let current = records.get(&item.key).unwrap_or(&empty);
            if !item.condition.evaluate(current) {
                drop(records);
                return Err(self.condition_failed(&item.key));
            }
            let record = keyed(item.record, &item.key);
            records.insert(item.key, record);
            Ok(())
        })
    }

    fn conditional_update(&self, item: UpdateItem) -> StoreFuture<'_, Record> {
        Box::pin(async move {
            self.before_write().await?;
            let mut records = self.records.write().unwrap();
            let Some(record) = records.get_mut(&item.key) else {
                return Err(StoreError::NotFound(item.key));
            };
            if !item.condition.evaluate(record) {
                drop(records);
                return Err(self.condition_failed(&item.key));
            }
            item.mutation.apply_to(record);
            Ok(record.clone())
        })
    }

    fn transact_write(&self, items: Vec<WriteItem>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.before_write().await?;
            let mut records = self.records.write().unwrap();

            let reasons: Vec<CancellationReason> =
                items.iter().map(|item| check(&records, item)).collect();
            if reasons.iter().any(|r| *r != CancellationReason::None) {
                drop(records);
                self.condition_failures.fetch_add(1, Ordering::SeqCst);
                return Err(StoreError::TransactionCanceled { reasons });
            }

            for item in items {
                match item {
                    WriteItem::Put(put) => {
                        let record = keyed(put.record, &put.key);
                        records.insert(put.key, record);
                    }
                    WriteItem::Update(update) => {
                        if let Some(record) = records.get_mut(&update.key) {
                            update.mutation.apply_to(record);
                        }
                    }
                    WriteItem::Delete(delete) => {
                        records.remove(&delete.key);
                    }
                    WriteItem::ConditionCheck(_) => {}
                }
            }
            Ok(())
        })
    }

    fn delete(&self, item: DeleteItem) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.before_write().await?;
            let mut records = self.records.write().unwrap();
            let Some(record) = records.get(&item.key) else {
                return Err(StoreError::NotFound(item.key));
            };
            if !item.condition.evaluate(record) {
                drop(records);
                return Err(self.condition_failed(&item.key));
            }
            records.remove(&item.key);
            Ok(())
        })
    }

    fn query(&self, query: RecordQuery) -> StoreFuture<'_, Vec<Record>> {
        let matches = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|record| query.key_condition.matches(record) && query.filter.evaluate(record))
            .cloned()
            .collect();
        Box::pin(async move { Ok(matches) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::stocked_prize;
    use prize_inventory_core::mutation::Predicate;
    use prize_inventory_core::store::{ConditionCheck, KeyCondition};

    fn key(id: &str) -> PrizeKey {
        PrizeKey::new("cfg", id)
    }

    fn reserve(id: &str, amount: i64) -> UpdateItem {
        UpdateItem {
            key: key(id),
            mutation: MutationList::new()
                .decrement("total_available", amount)
                .increment("total_reserved", amount),
            condition: Predicate::at_least("total_available", amount),
        }
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let store = InMemoryRecordStore::new();
        let result = store.conditional_update(reserve("ghost", 1)).await;
        assert_eq!(result, Err(StoreError::NotFound(key("ghost"))));
    }

    #[tokio::test]
    async fn failed_guard_leaves_record_untouched() {
        let store = InMemoryRecordStore::new();
        store.insert(stocked_prize(&key("a"), 1));

        let result = store.conditional_update(reserve("a", 2)).await;
        assert_eq!(result, Err(StoreError::ConditionFailed(key("a"))));
        assert_eq!(store.snapshot(&key("a")), Some(stocked_prize(&key("a"), 1)));
        assert_eq!(store.condition_failure_count(), 1);
    }

    #[tokio::test]
    async fn transaction_is_all_or_nothing() {
        let store = InMemoryRecordStore::new();
        store.insert(stocked_prize(&key("a"), 5));
        store.insert(stocked_prize(&key("b"), 0));

        let result = store
            .transact_write(vec![
                reserve("a", 1).into_write_item(),
                reserve("b", 1).into_write_item(),
            ])
            .await;

        assert_eq!(
            result,
            Err(StoreError::TransactionCanceled {
                reasons: vec![CancellationReason::None, CancellationReason::ConditionFailed],
            })
        );
        assert_eq!(
            store.snapshot(&key("a")).and_then(|r| r.number("total_available")),
            Some(5)
        );
    }

    #[tokio::test]
    async fn put_with_not_exists_guard_never_overwrites() {
        let store = InMemoryRecordStore::new();
        let put = PutItem {
            key: key("a"),
            record: stocked_prize(&key("a"), 3),
            condition: Predicate::NotExists(PRIZE_ID.to_string()),
        };
        store.put(put.clone()).await.unwrap();
        assert_eq!(
            store.put(put).await,
            Err(StoreError::ConditionFailed(key("a")))
        );
    }

    #[tokio::test]
    async fn condition_check_on_missing_record_sees_empty_image() {
        let store = InMemoryRecordStore::new();
        let result = store
            .transact_write(vec![WriteItem::ConditionCheck(ConditionCheck {
                key: key("nobody"),
                condition: Predicate::NotExists(PRIZE_ID.to_string()),
            })])
            .await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn injected_faults_are_consumed_in_order() {
        let store = InMemoryRecordStore::new();
        store.insert(stocked_prize(&key("a"), 2));
        store.fail_next(StoreError::Unavailable("injected".into()));
        store.interfere_next(key("a"), MutationList::new().decrement("total_available", 2));

        assert!(matches!(
            store.conditional_update(reserve("a", 1)).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(
            store.conditional_update(reserve("a", 1)).await,
            Err(StoreError::ConditionFailed(key("a")))
        );
    }

    #[tokio::test]
    async fn query_filters_by_key_condition_and_predicate() {
        let store = InMemoryRecordStore::new();
        store.insert(stocked_prize(&key("a"), 0));
        store.insert(stocked_prize(&key("b"), 4));
        store.insert(stocked_prize(&PrizeKey::new("other", "c"), 4));

        let found = store
            .query(
                RecordQuery::new(KeyCondition::Configuration("cfg".into())).with_filter(
                    Predicate::compare(
                        "total_available",
                        prize_inventory_core::mutation::Comparison::Gt,
                        0_i64,
                    ),
                ),
            )
            .await
            .unwrap();
        let keys: Vec<_> = found.iter().filter_map(Record::key).collect();
        assert_eq!(keys, vec![key("b")]);
    }
}
