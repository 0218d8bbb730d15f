//! # Prize Inventory Core
//!
//! Core types and the store contract for the prize inventory consistency engine.
//!
//! This crate keeps a prize's counters (available, reserved, claimed, redeemed,
//! expired, removed) correct under unbounded concurrency using nothing but
//! conditional single-record writes and all-or-nothing multi-record batches
//! supplied by the store.
//!
//! ## Core Concepts
//!
//! - **Record**: the attribute map persisted for one prize ([`record`])
//! - **Counter / Edge**: the counter schema and the closed set of legal moves ([`counter`])
//! - **Mutation list / Predicate**: store-agnostic description of a guarded write ([`mutation`])
//! - **`RecordStore`**: the adapter contract implemented per backend ([`store`])
//! - **Builders**: pure functions producing guarded writes ([`transition`])
//! - **Partition plan**: sharding of bulk code uploads ([`partition`])
//! - **Status filters**: stored-flag and date-window listings ([`status`])
//!
//! ## Architecture Principles
//!
//! - The guard is the only defense against oversell and is always evaluated
//!   by the store against the record's current value
//! - Builders are pure; I/O lives in the runtime crate
//! - Dependencies (store, clock) are injected, never global
//!
//! ## Example
//!
//! ```
//! use prize_inventory_core::counter::Edge;
//! use prize_inventory_core::key::PrizeKey;
//! use prize_inventory_core::transition::{build_transition, TransitionExtra};
//!
//! # fn main() -> Result<(), prize_inventory_core::ValidationError> {
//! let key = PrizeKey::new("summer-promo", "free-coffee");
//! let item = build_transition(&key, Edge::Reserve, 1, TransitionExtra::NONE, prize_inventory_core::Utc::now())?;
//! assert_eq!(item.key, key);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod counter;
pub mod error;
pub mod key;
pub mod mutation;
pub mod partition;
pub mod prize;
pub mod record;
pub mod status;
pub mod store;
pub mod transition;

pub use counter::{Counter, Counters, Edge};
pub use error::{InventoryError, ValidationError};
pub use key::{ConfigurationId, PrizeId, PrizeKey};
pub use prize::{Prize, PrizeDraft, PrizeUpdate};
pub use store::{RecordStore, StoreError};

/// Environment module - Dependency injection traits
///
/// External dependencies are abstracted behind traits and injected into the
/// engine at construction time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Every mutating write stamps `entry_date` from the injected clock, and
    /// date-window listings compare against it.
    ///
    /// # Examples
    ///
    /// ```
    /// use prize_inventory_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// assert!(clock.now().timestamp_millis() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock reading the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
