//! Record store trait and write descriptors.
//!
//! This module defines the contract the engine needs from the underlying table:
//! get-by-key, conditional single-item writes, all-or-nothing multi-item
//! transactions and key/index queries.
//!
//! # Semantics
//!
//! - Every write carries a [`Predicate`] evaluated against the record's state
//!   *before* the write. Check and write are atomic per key.
//! - Updates and deletes of a missing record fail with [`StoreError::NotFound`].
//!   Puts and condition checks evaluate their predicate against an empty record
//!   when the key does not exist, which is how `attribute_not_exists` guards
//!   work.
//! - [`RecordStore::transact_write`] applies every item or none of them.
//!
//! # Implementations
//!
//! - `PostgresRecordStore` (in `prize-inventory-postgres` crate): Production implementation
//! - `InMemoryRecordStore` (in `prize-inventory-testing` crate): Fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` so the engine can hold an
//! `Arc<dyn RecordStore>` and move it into spawned tasks.

use crate::key::{ConfigurationId, PrizeId, PrizeKey};
use crate::mutation::{MutationList, Predicate};
use crate::prize::attr;
use crate::record::{AttributeValue, CONFIGURATION_ID, PRIZE_ID, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`RecordStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Why a single item of a canceled transaction failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// The item itself was fine; the transaction failed because of another item.
    None,
    /// The item's predicate did not hold.
    ConditionFailed,
    /// The item targeted a record that does not exist.
    NotFound,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ConditionFailed => f.write_str("ConditionalCheckFailed"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Errors reported by a [`RecordStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The targeted record does not exist.
    #[error("Record not found: {0}")]
    NotFound(PrizeKey),

    /// The write's predicate did not hold on the current record.
    #[error("Conditional check failed for {0}")]
    ConditionFailed(PrizeKey),

    /// A multi-item transaction was rejected; nothing was applied.
    #[error("Transaction canceled: {}", format_reasons(.reasons))]
    TransactionCanceled {
        /// One reason per submitted item, in submission order.
        reasons: Vec<CancellationReason>,
    },

    /// The store detected a conflicting concurrent transaction.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// Transport or backend failure.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

fn format_reasons(reasons: &[CancellationReason]) -> String {
    let parts: Vec<String> = reasons.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

impl StoreError {
    /// Whether a retry of the same logical operation could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransactionConflict(_) | Self::Unavailable(_))
    }
}

/// Insert or replace a whole record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutItem {
    /// Target key.
    pub key: PrizeKey,
    /// Full record to store. Key attributes are overwritten from `key`.
    pub record: Record,
    /// Guard evaluated against the existing record (empty when absent).
    pub condition: Predicate,
}

/// Conditionally apply a mutation list to an existing record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    /// Target key.
    pub key: PrizeKey,
    /// Changes to apply.
    pub mutation: MutationList,
    /// Guard evaluated against the pre-image.
    pub condition: Predicate,
}

impl UpdateItem {
    /// Wrap this update as a transaction item.
    #[must_use]
    pub fn into_write_item(self) -> WriteItem {
        WriteItem::Update(self)
    }
}

/// Physically remove a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItem {
    /// Target key.
    pub key: PrizeKey,
    /// Guard evaluated against the pre-image.
    pub condition: Predicate,
}

/// Assert a predicate on a record inside a transaction without writing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheck {
    /// Target key.
    pub key: PrizeKey,
    /// Guard evaluated against the current record (empty when absent).
    pub condition: Predicate,
}

/// One element of an atomic multi-item write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteItem {
    /// See [`PutItem`].
    Put(PutItem),
    /// See [`UpdateItem`].
    Update(UpdateItem),
    /// See [`DeleteItem`].
    Delete(DeleteItem),
    /// See [`ConditionCheck`].
    ConditionCheck(ConditionCheck),
}

impl WriteItem {
    /// Key this item targets.
    #[must_use]
    pub const fn key(&self) -> &PrizeKey {
        match self {
            Self::Put(item) => &item.key,
            Self::Update(item) => &item.key,
            Self::Delete(item) => &item.key,
            Self::ConditionCheck(item) => &item.key,
        }
    }
}

/// Key condition of a [`RecordQuery`]: the table's primary key or one of its
/// secondary indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCondition {
    /// Every prize of a configuration (primary partition key).
    Configuration(ConfigurationId),
    /// Prizes with this id in any configuration (`prizeIdIndex`).
    PrizeId(PrizeId),
    /// Prizes flagged for automatic voucher top-up (`autoUploadVouchers`).
    AutoUploadVouchers,
    /// Prizes with `has_end_date = true AND end_date < t` (`endDateIndex`).
    EndDateBefore(i64),
    /// Every prize still flagged `has_end_date`, whatever its date (`endDateIndex`).
    EndDateFlagged,
}

impl KeyCondition {
    /// Whether `record` falls under this key condition.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let flag = |field: &str| record.get(field).and_then(AttributeValue::as_bool) == Some(true);
        match self {
            Self::Configuration(configuration_id) => {
                record.get(CONFIGURATION_ID).and_then(AttributeValue::as_text)
                    == Some(configuration_id.as_str())
            }
            Self::PrizeId(prize_id) => {
                record.get(PRIZE_ID).and_then(AttributeValue::as_text) == Some(prize_id.as_str())
            }
            Self::AutoUploadVouchers => flag(attr::AUTO_UPLOAD_VOUCHERS),
            Self::EndDateBefore(t) => {
                flag(attr::HAS_END_DATE) && record.number(attr::END_DATE).is_some_and(|end| end < *t)
            }
            Self::EndDateFlagged => flag(attr::HAS_END_DATE),
        }
    }
}

/// A read over the table or one of its indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Which records are candidates.
    pub key_condition: KeyCondition,
    /// Post-filter applied to each candidate.
    pub filter: Predicate,
}

impl RecordQuery {
    /// Query with no post-filter.
    #[must_use]
    pub const fn new(key_condition: KeyCondition) -> Self {
        Self {
            key_condition,
            filter: Predicate::Always,
        }
    }

    /// Attach a post-filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }
}

/// Conditional key-value store holding one [`Record`] per prize.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single instance is constructed at
/// startup and shared by every component through `Arc<dyn RecordStore>`.
pub trait RecordStore: Send + Sync {
    /// Load a record by key. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: backend failure
    /// - `Corrupt`: stored data could not be decoded
    fn get(&self, key: &PrizeKey) -> StoreFuture<'_, Option<Record>>;

    /// Insert or replace a record when its guard holds.
    ///
    /// # Errors
    ///
    /// - `ConditionFailed`: the guard did not hold on the existing record
    /// - `Unavailable`: backend failure
    fn put(&self, item: PutItem) -> StoreFuture<'_, ()>;

    /// Apply a mutation list when its guard holds and return the post-image.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the record does not exist
    /// - `ConditionFailed`: the guard did not hold
    /// - `TransactionConflict` / `Unavailable`: transient backend failure
    fn conditional_update(&self, item: UpdateItem) -> StoreFuture<'_, Record>;

    /// Apply several items atomically: all succeed or none are applied.
    ///
    /// # Errors
    ///
    /// - `TransactionCanceled`: at least one item failed; carries one reason per item
    /// - `TransactionConflict` / `Unavailable`: transient backend failure
    fn transact_write(&self, items: Vec<WriteItem>) -> StoreFuture<'_, ()>;

    /// Physically remove a record when its guard holds.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the record does not exist
    /// - `ConditionFailed`: the guard did not hold
    fn delete(&self, item: DeleteItem) -> StoreFuture<'_, ()>;

    /// Run a key/index query with an optional post-filter.
    ///
    /// Results are ordered by `(configuration_id, prize_id)`.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: backend failure
    /// - `Corrupt`: stored data could not be decoded
    fn query(&self, query: RecordQuery) -> StoreFuture<'_, Vec<Record>>;
}
