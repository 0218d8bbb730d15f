//! Counter schema: the inventory counters of a prize and the legal moves between them.
//!
//! Every unit of a prize is in exactly one state at a time. The counters are the
//! population histogram of those states, and they always add up to
//! `total_amount`:
//!
//! ```text
//! available + reserved + claimed + redeemed + expired + removed == amount
//! ```
//!
//! Quantity only moves along the edges in [`Edge`]. `total_amount` changes only
//! through a top-up, which raises `total_amount` and `total_available` together.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A named inventory counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    /// Lifetime total ever added.
    Amount,
    /// Units that can still be handed out.
    Available,
    /// Units held for a participant, not yet claimed.
    Reserved,
    /// Units claimed by a participant.
    Claimed,
    /// Units redeemed (terminal).
    Redeemed,
    /// Units that expired (terminal).
    Expired,
    /// Units written off administratively (terminal).
    Removed,
}

impl Counter {
    /// All counters, `Amount` first.
    pub const ALL: [Self; 7] = [
        Self::Amount,
        Self::Available,
        Self::Reserved,
        Self::Claimed,
        Self::Redeemed,
        Self::Expired,
        Self::Removed,
    ];

    /// Counters whose sum must equal `Amount`.
    pub const STATES: [Self; 6] = [
        Self::Available,
        Self::Reserved,
        Self::Claimed,
        Self::Redeemed,
        Self::Expired,
        Self::Removed,
    ];

    /// Persisted attribute name.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::Amount => "total_amount",
            Self::Available => "total_available",
            Self::Reserved => "total_reserved",
            Self::Claimed => "total_claimed",
            Self::Redeemed => "total_redeemed",
            Self::Expired => "total_expired",
            Self::Removed => "total_removed",
        }
    }

    /// Counters that may feed `total_expired` in a multi-source expiration.
    #[must_use]
    pub const fn can_expire(self) -> bool {
        matches!(self, Self::Available | Self::Reserved | Self::Claimed)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Error returned when a pair of counters is not a legal edge.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Requested source counter.
    pub from: Counter,
    /// Requested destination counter.
    pub to: Counter,
}

/// A legal directed move of quantity between two counters.
///
/// The set is closed: constructing an edge from arbitrary counters goes through
/// [`Edge::between`], which rejects anything not listed here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// `available -> reserved`
    Reserve,
    /// `reserved -> claimed`
    Claim,
    /// `claimed -> redeemed`
    RedeemClaimed,
    /// `reserved -> redeemed` (direct path)
    RedeemReserved,
    /// `available -> removed`
    Remove,
    /// `available -> expired`
    ExpireAvailable,
    /// `reserved -> available` (compensation)
    ReleaseReserved,
    /// `claimed -> available` (compensation)
    ReleaseClaimed,
}

impl Edge {
    /// Every legal edge.
    pub const ALL: [Self; 8] = [
        Self::Reserve,
        Self::Claim,
        Self::RedeemClaimed,
        Self::RedeemReserved,
        Self::Remove,
        Self::ExpireAvailable,
        Self::ReleaseReserved,
        Self::ReleaseClaimed,
    ];

    /// Counter the quantity is taken from.
    #[must_use]
    pub const fn source(self) -> Counter {
        match self {
            Self::Reserve | Self::Remove | Self::ExpireAvailable => Counter::Available,
            Self::Claim | Self::RedeemReserved | Self::ReleaseReserved => Counter::Reserved,
            Self::RedeemClaimed | Self::ReleaseClaimed => Counter::Claimed,
        }
    }

    /// Counter the quantity is moved to.
    #[must_use]
    pub const fn target(self) -> Counter {
        match self {
            Self::Reserve => Counter::Reserved,
            Self::Claim => Counter::Claimed,
            Self::RedeemClaimed | Self::RedeemReserved => Counter::Redeemed,
            Self::Remove => Counter::Removed,
            Self::ExpireAvailable => Counter::Expired,
            Self::ReleaseReserved | Self::ReleaseClaimed => Counter::Available,
        }
    }

    /// Resolve a `(from, to)` pair into a legal edge.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] when the pair is not in the transition table.
    pub fn between(from: Counter, to: Counter) -> Result<Self, IllegalTransition> {
        Self::ALL
            .into_iter()
            .find(|edge| edge.source() == from && edge.target() == to)
            .ok_or(IllegalTransition { from, to })
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Claim => "claim",
            Self::RedeemClaimed => "redeem_claimed",
            Self::RedeemReserved => "redeem_reserved",
            Self::Remove => "remove",
            Self::ExpireAvailable => "expire_available",
            Self::ReleaseReserved => "release_reserved",
            Self::ReleaseClaimed => "release_claimed",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source(), self.target())
    }
}

/// Error decoding counters from a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterDecodeError {
    /// A stored counter is negative.
    #[error("Counter {counter} is negative: {value}")]
    Negative {
        /// Offending counter.
        counter: Counter,
        /// Stored value.
        value: i64,
    },
    /// A stored counter is not a number.
    #[error("Counter {0} is not a number")]
    NotANumber(Counter),
}

/// Snapshot of all counters of a prize.
///
/// Missing attributes read as zero (create-if-absent semantics on the write
/// path mean a counter may not exist until its first increment).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// `total_amount`
    pub amount: u64,
    /// `total_available`
    pub available: u64,
    /// `total_reserved`
    pub reserved: u64,
    /// `total_claimed`
    pub claimed: u64,
    /// `total_redeemed`
    pub redeemed: u64,
    /// `total_expired`
    pub expired: u64,
    /// `total_removed`
    pub removed: u64,
}

impl Counters {
    /// Counters of a freshly stocked prize.
    #[must_use]
    pub const fn stocked(amount: u64) -> Self {
        Self {
            amount,
            available: amount,
            reserved: 0,
            claimed: 0,
            redeemed: 0,
            expired: 0,
            removed: 0,
        }
    }

    /// Value of one counter.
    #[must_use]
    pub const fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Amount => self.amount,
            Counter::Available => self.available,
            Counter::Reserved => self.reserved,
            Counter::Claimed => self.claimed,
            Counter::Redeemed => self.redeemed,
            Counter::Expired => self.expired,
            Counter::Removed => self.removed,
        }
    }

    /// Sum of the per-state counters.
    #[must_use]
    pub fn states_total(&self) -> u64 {
        Counter::STATES.iter().map(|c| self.get(*c)).sum()
    }

    /// Whether the per-state counters add up to `amount`.
    #[must_use]
    pub fn conservation_holds(&self) -> bool {
        self.states_total() == self.amount
    }

    /// Decode counters from a record.
    ///
    /// # Errors
    ///
    /// Returns [`CounterDecodeError`] if a counter is negative or not numeric.
    pub fn from_record(record: &Record) -> Result<Self, CounterDecodeError> {
        let read = |counter: Counter| -> Result<u64, CounterDecodeError> {
            match record.get(counter.attribute()) {
                None => Ok(0),
                Some(value) => {
                    let n = value
                        .as_number()
                        .ok_or(CounterDecodeError::NotANumber(counter))?;
                    u64::try_from(n).map_err(|_| CounterDecodeError::Negative { counter, value: n })
                }
            }
        };

        Ok(Self {
            amount: read(Counter::Amount)?,
            available: read(Counter::Available)?,
            reserved: read(Counter::Reserved)?,
            claimed: read(Counter::Claimed)?,
            redeemed: read(Counter::Redeemed)?,
            expired: read(Counter::Expired)?,
            removed: read(Counter::Removed)?,
        })
    }
}
