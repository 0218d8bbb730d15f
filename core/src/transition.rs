//! Builders for the guarded counter writes.
//!
//! Each builder is pure: it validates its input and returns the
//! [`UpdateItem`] the store must apply atomically. The runtime executes the
//! item; an external orchestrator can instead wrap it with
//! [`UpdateItem::into_write_item`] and bundle it into its own transaction.
//!
//! All counter deltas use create-if-absent semantics (a missing counter reads
//! as zero) and every write refreshes `entry_date`.

use crate::counter::{Counter, Counters, Edge, IllegalTransition};
use crate::error::ValidationError;
use crate::key::PrizeKey;
use crate::mutation::{Comparison, MutationList, Predicate};
use crate::prize::attr;
use crate::record::{ENTRY_DATE, PRIZE_ID};
use crate::store::UpdateItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Co-updates bundled into the same atomic write as a transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionExtra {
    /// Set `active_partition` (e.g. when redemption crosses a partition boundary).
    pub active_partition: Option<u32>,
    /// Set `has_end_date` (cleared by end-date sweeps).
    pub has_end_date: Option<bool>,
}

impl TransitionExtra {
    /// No co-updates.
    pub const NONE: Self = Self {
        active_partition: None,
        has_end_date: None,
    };

    /// Also move redemption to `partition`.
    #[must_use]
    pub const fn with_active_partition(mut self, partition: u32) -> Self {
        self.active_partition = Some(partition);
        self
    }

    fn apply(self, mutation: MutationList) -> MutationList {
        let mutation = match self.active_partition {
            Some(partition) => mutation.set(attr::ACTIVE_PARTITION, i64::from(partition)),
            None => mutation,
        };
        match self.has_end_date {
            Some(flag) => mutation.set(attr::HAS_END_DATE, flag),
            None => mutation,
        }
    }
}

/// Balance a write needs from one counter.
///
/// Used to tell a genuine shortfall from contention when a guard fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Demand {
    /// Counter being decremented.
    pub counter: Counter,
    /// Amount required.
    pub amount: i64,
}

impl Demand {
    /// Whether `counters` cannot cover this demand.
    #[must_use]
    pub fn is_short(&self, counters: &Counters) -> bool {
        i128::from(counters.get(self.counter)) < i128::from(self.amount)
    }
}

/// A counter movement, rebuilt into a fresh [`UpdateItem`] on every attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    /// Move `amount` along a legal edge.
    Transition {
        /// Edge to move along.
        edge: Edge,
        /// Quantity to move.
        amount: i64,
        /// Co-updates.
        extra: TransitionExtra,
    },
    /// Move several sources into `total_expired` at once.
    Expire(BTreeMap<Counter, i64>),
    /// Raise `total_amount` and `total_available` together.
    TopUp(i64),
}

impl Movement {
    /// Build the conditional write for `key` stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for non-positive amounts, empty or illegal
    /// expirations and overflowing sums.
    pub fn build(&self, key: &PrizeKey, now: DateTime<Utc>) -> Result<UpdateItem, ValidationError> {
        match self {
            Self::Transition { edge, amount, extra } => {
                build_transition(key, *edge, *amount, *extra, now)
            }
            Self::Expire(decrements) => build_expire(key, decrements, now),
            Self::TopUp(amount) => build_top_up(key, *amount, now),
        }
    }

    /// Balances the write consumes.
    #[must_use]
    pub fn demands(&self) -> SmallVec<[Demand; 3]> {
        match self {
            Self::Transition { edge, amount, .. } => smallvec::smallvec![Demand {
                counter: edge.source(),
                amount: *amount,
            }],
            Self::Expire(decrements) => decrements
                .iter()
                .map(|(counter, amount)| Demand {
                    counter: *counter,
                    amount: *amount,
                })
                .collect(),
            Self::TopUp(_) => SmallVec::new(),
        }
    }

    /// Whether applying the write to `counters` would push a counter past
    /// the `i64` range.
    #[must_use]
    pub fn overflows(&self, counters: &Counters) -> bool {
        match self {
            Self::TopUp(amount) => [Counter::Amount, Counter::Available]
                .iter()
                .any(|c| i128::from(counters.get(*c)) + i128::from(*amount) > i128::from(i64::MAX)),
            Self::Transition { .. } | Self::Expire(_) => false,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transition { edge, .. } => edge.label(),
            Self::Expire(_) => "expire",
            Self::TopUp(_) => "top_up",
        }
    }
}

const fn require_positive(amount: i64) -> Result<i64, ValidationError> {
    if amount > 0 {
        Ok(amount)
    } else {
        Err(ValidationError::NonPositiveAmount(amount))
    }
}

/// Move `amount` units along `edge`.
///
/// Guard: `attribute_exists(from) AND from >= amount`. The destination needs
/// no guard since a missing counter is created at zero.
///
/// # Errors
///
/// [`ValidationError::NonPositiveAmount`] when `amount <= 0`.
pub fn build_transition(
    key: &PrizeKey,
    edge: Edge,
    amount: i64,
    extra: TransitionExtra,
    now: DateTime<Utc>,
) -> Result<UpdateItem, ValidationError> {
    let amount = require_positive(amount)?;
    let from = edge.source().attribute();
    let to = edge.target().attribute();

    let mutation = MutationList::new()
        .decrement(from, amount)
        .increment(to, amount)
        .set(ENTRY_DATE, now.timestamp_millis());

    Ok(UpdateItem {
        key: key.clone(),
        mutation: extra.apply(mutation),
        condition: Predicate::at_least(from, amount),
    })
}

/// Move several source counters into `total_expired` in one write.
///
/// The sink grows by the sum of all amounts; the guard is the conjunction of
/// per-source sufficiency checks, so either every source is decremented or
/// none is.
///
/// # Errors
///
/// - [`ValidationError::EmptyExpiration`] for an empty map
/// - [`ValidationError::IllegalTransition`] for a source that cannot expire
/// - [`ValidationError::NonPositiveAmount`] for any amount `<= 0`
/// - [`ValidationError::AmountOverflow`] when the sum overflows
pub fn build_expire(
    key: &PrizeKey,
    decrements: &BTreeMap<Counter, i64>,
    now: DateTime<Utc>,
) -> Result<UpdateItem, ValidationError> {
    if decrements.is_empty() {
        return Err(ValidationError::EmptyExpiration);
    }

    let mut total: i64 = 0;
    let mut mutation = MutationList::new();
    let mut guards = Vec::with_capacity(decrements.len() * 2);

    for (&counter, &amount) in decrements {
        if !counter.can_expire() {
            return Err(IllegalTransition {
                from: counter,
                to: Counter::Expired,
            }
            .into());
        }
        let amount = require_positive(amount)?;
        total = total
            .checked_add(amount)
            .ok_or(ValidationError::AmountOverflow)?;
        mutation = mutation.decrement(counter.attribute(), amount);
        guards.push(Predicate::at_least(counter.attribute(), amount));
    }

    let mutation = mutation
        .increment(Counter::Expired.attribute(), total)
        .set(ENTRY_DATE, now.timestamp_millis());

    let condition = guards.into_iter().fold(Predicate::Always, Predicate::and);

    Ok(UpdateItem {
        key: key.clone(),
        mutation,
        condition,
    })
}

/// `field` is absent or can grow by `amount` without leaving the `i64` range.
fn has_headroom(field: &str, amount: i64) -> Predicate {
    Predicate::Or(vec![
        Predicate::NotExists(field.to_string()),
        Predicate::compare(field, Comparison::Le, i64::MAX - amount),
    ])
}

/// Add `amount` fresh units to a prize.
///
/// Raises `total_amount` and `total_available` by the same quantity, so
/// conservation holds before and after. Guarded on the prize existing and on
/// both counters having room for `amount`; a store never clamps a counter.
///
/// # Errors
///
/// [`ValidationError::NonPositiveAmount`] when `amount <= 0`.
pub fn build_top_up(
    key: &PrizeKey,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<UpdateItem, ValidationError> {
    let amount = require_positive(amount)?;

    Ok(UpdateItem {
        key: key.clone(),
        mutation: MutationList::new()
            .increment(Counter::Amount.attribute(), amount)
            .increment(Counter::Available.attribute(), amount)
            .set(ENTRY_DATE, now.timestamp_millis()),
        condition: Predicate::Exists(PRIZE_ID.to_string())
            .and(has_headroom(Counter::Amount.attribute(), amount))
            .and(has_headroom(Counter::Available.attribute(), amount)),
    })
}

/// Counter-free write that only refreshes `entry_date`, and `active_partition`
/// when given, for bundling into a caller's transaction.
#[must_use]
pub fn build_entry_date_refresh(
    key: &PrizeKey,
    active_partition: Option<u32>,
    now: DateTime<Utc>,
) -> UpdateItem {
    let mutation = MutationList::new().set(ENTRY_DATE, now.timestamp_millis());
    let mutation = match active_partition {
        Some(partition) => mutation.set(attr::ACTIVE_PARTITION, i64::from(partition)),
        None => mutation,
    };
    UpdateItem {
        key: key.clone(),
        mutation,
        condition: Predicate::Exists(PRIZE_ID.to_string()),
    }
}
