//! Shared harness for engine integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use prize_inventory_core::PrizeKey;
use prize_inventory_core::counter::Counters;
use prize_inventory_core::environment::Clock;
use prize_inventory_runtime::{InventoryConfig, PrizeInventory, RetryPolicy};
use prize_inventory_testing::{FixedClock, InMemoryRecordStore, fixtures, init_tracing, test_clock};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIGURATION: &str = "summer";

/// Retry policy with millisecond delays and no jitter.
pub fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .multiplier(1.0)
        .jitter(Duration::ZERO)
        .build()
}

/// Engine wired to an in-memory store and a fixed clock.
pub struct Harness {
    pub store: InMemoryRecordStore,
    pub clock: FixedClock,
    pub inventory: PrizeInventory,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&InventoryConfig::default())
    }

    pub fn with_config(config: &InventoryConfig) -> Self {
        init_tracing();
        let store = InMemoryRecordStore::new();
        let clock = test_clock();
        let inventory = PrizeInventory::new(Arc::new(store.clone()), Arc::new(clock.clone()), config)
            .with_retry_policy(fast_retries(5));
        Self {
            store,
            clock,
            inventory,
        }
    }

    pub fn key(prize_id: &str) -> PrizeKey {
        PrizeKey::new(CONFIGURATION, prize_id)
    }

    /// Seed a prize with `amount` available units.
    pub fn stocked(&self, prize_id: &str, amount: i64) -> PrizeKey {
        let key = Self::key(prize_id);
        self.store.insert(fixtures::stocked_prize(&key, amount));
        key
    }

    /// Counters as currently stored, bypassing the engine.
    pub fn counters(&self, key: &PrizeKey) -> Counters {
        Counters::from_record(&self.store.snapshot(key).unwrap()).unwrap()
    }

    /// Current test time as stored in `entry_date`.
    pub fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}
