//! Error taxonomy of the inventory engine.
//!
//! Validation and business-outcome errors (`Validation`, `InsufficientBalance`,
//! `RecordNotFound`, `PrizeAlreadyExists`) are never retried. Transient store
//! failures are retried by the runtime and only their exhaustion is surfaced
//! (`ConcurrentUpdateExhausted`, `StoreUnavailable`).

use crate::counter::{Counter, IllegalTransition};
use crate::key::PrizeKey;
use crate::store::StoreError;
use thiserror::Error;

/// Input rejected before any store call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Mandatory attributes are absent.
    #[error("Missing mandatory attributes: {}", .0.join(", "))]
    Missing(Vec<String>),

    /// Attributes carry values outside their allowed set.
    #[error("Invalid attribute values: {}", .0.join(", "))]
    Invalid(Vec<String>),

    /// Transition amounts must be strictly positive.
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(i64),

    /// The combined amount does not fit a counter.
    #[error("Amount overflows counter range")]
    AmountOverflow,

    /// An expiration must name at least one source counter.
    #[error("Expiration requires at least one source counter")]
    EmptyExpiration,

    /// A bulk upload carried no codes.
    #[error("No codes found for upload")]
    EmptyUpload,

    /// The requested counters do not form a legal edge.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Malformed or out-of-enumeration input.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The guard is genuinely unmet on a fresh read.
    #[error("Not enough {counter} on {key}: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Prize the request targeted.
        key: PrizeKey,
        /// First counter whose balance is short.
        counter: Counter,
        /// Amount the request needed from that counter.
        requested: i64,
        /// Balance observed on the fresh read.
        available: u64,
    },

    /// The guard kept failing because of contention across the retry budget.
    #[error("Concurrent updates on {key} exhausted {attempts} attempts")]
    ConcurrentUpdateExhausted {
        /// Contended prize.
        key: PrizeKey,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// The targeted prize does not exist.
    #[error("Prize not found: {0}")]
    RecordNotFound(PrizeKey),

    /// A prize with this key already exists.
    #[error("Prize already exists: {0}")]
    PrizeAlreadyExists(PrizeKey),

    /// The store stayed unreachable across the retry budget.
    #[error("Store unavailable after {attempts} attempts: {message}")]
    StoreUnavailable {
        /// Attempts made, including the first.
        attempts: u32,
        /// Last transport error.
        message: String,
    },

    /// A submitted write did not answer in time; it may or may not have applied.
    ///
    /// Re-query the prize before assuming failure. Never retried.
    #[error("Outcome unknown for {key}: no response within the configured timeout")]
    OutcomeUnknown {
        /// Prize the write targeted.
        key: PrizeKey,
    },

    /// Stored data failed to decode.
    #[error("Corrupt prize record: {0}")]
    CorruptRecord(String),

    /// Store error with no more specific mapping.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl InventoryError {
    /// Whether this error reports a business outcome rather than a fault.
    #[must_use]
    pub const fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } | Self::RecordNotFound(_) | Self::PrizeAlreadyExists(_)
        )
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_list_fields() {
        let error = ValidationError::Missing(vec!["name".into(), "desc".into()]);
        assert_eq!(error.to_string(), "Missing mandatory attributes: name, desc");
    }

    #[test]
    fn illegal_transition_converts_into_validation() {
        let error: InventoryError = ValidationError::from(IllegalTransition {
            from: Counter::Redeemed,
            to: Counter::Available,
        })
        .into();
        assert!(matches!(
            error,
            InventoryError::Validation(ValidationError::IllegalTransition(_))
        ));
        assert!(!error.is_business_outcome());
    }
}
