//! # Prize Inventory Testing
//!
//! Testing utilities and helpers for the prize inventory engine.
//!
//! This crate provides:
//! - [`InMemoryRecordStore`]: atomic in-memory store with fault injection
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//! - [`fixtures`]: ready-made prize records and drafts
//! - [`properties`]: proptest strategies for operation sequences
//! - [`init_tracing`]: test log output controlled by `RUST_LOG`
//!
//! ## Example
//!
//! ```ignore
//! use prize_inventory_testing::{InMemoryRecordStore, fixtures, test_clock};
//! use prize_inventory_runtime::PrizeInventory;
//!
//! #[tokio::test]
//! async fn reserve_one() {
//!     let store = InMemoryRecordStore::new();
//!     let key = PrizeKey::new("summer", "coffee");
//!     store.insert(fixtures::stocked_prize(&key, 10));
//!
//!     let inventory = PrizeInventory::new(Arc::new(store), Arc::new(test_clock()), config);
//!     inventory.reserve(&key, 1).await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use prize_inventory_core::environment::Clock;

pub mod fixtures;
pub mod properties;
pub mod record_store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until [`FixedClock::advance`] or
    /// [`FixedClock::set`] is called; clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use prize_inventory_testing::mocks::FixedClock;
    /// use prize_inventory_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock to `time`.
        #[allow(clippy::unwrap_used)] // Lock poisoning only follows a panicking test
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap() = time;
        }

        /// Move the clock forward.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a `tracing` subscriber for tests.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test:
/// only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,prize_inventory_runtime=info".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use record_store::InMemoryRecordStore;
