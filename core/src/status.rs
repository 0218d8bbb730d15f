//! Status filters for prize listings.
//!
//! Two modes exist. [`StatusMode::StoredFlag`] trusts the persisted `active`
//! attribute and is pushed down to the store as a filter predicate.
//! [`StatusMode::DateWindow`] (claim-and-go promotions) ignores the stored flag
//! and derives status from the validity window at read time; the derived flag
//! is only ever set on the returned views.

use crate::counter::Counter;
use crate::mutation::{Comparison, Predicate};
use crate::prize::{Prize, attr};
use serde::{Deserialize, Serialize};

/// Which prizes a listing returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    /// Every prize.
    All,
    /// Active prizes.
    #[default]
    Active,
    /// Prizes that are not active.
    Inactive,
    /// Active prizes with `total_available > 0`.
    Available,
}

/// How status is determined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// Use the stored `active` attribute.
    #[default]
    StoredFlag,
    /// Derive status from `start_date < now < end_date`; a prize missing
    /// either date takes both from the configuration's window.
    DateWindow {
        /// Configuration start (epoch millis).
        fallback_start: Option<i64>,
        /// Configuration end (epoch millis).
        fallback_end: Option<i64>,
    },
}

impl StatusFilter {
    /// Store-side filter for [`StatusMode::StoredFlag`].
    #[must_use]
    pub fn stored_flag_predicate(self) -> Predicate {
        let active = |flag: bool| Predicate::compare(attr::ACTIVE, Comparison::Eq, flag);
        match self {
            Self::All => Predicate::Always,
            Self::Active => active(true),
            Self::Inactive => active(false),
            Self::Available => active(true).and(Predicate::compare(
                Counter::Available.attribute(),
                Comparison::Gt,
                0_i64,
            )),
        }
    }

    /// Whether a prize whose (derived) active flag is `active` passes.
    #[must_use]
    pub const fn accepts(self, active: bool, available: u64) -> bool {
        match self {
            Self::All => true,
            Self::Active => active,
            Self::Inactive => !active,
            Self::Available => active && available > 0,
        }
    }
}

/// Whether `now` lies strictly inside `(start, end)`. Missing bounds never match.
#[must_use]
pub fn within_window(start: Option<i64>, end: Option<i64>, now: i64) -> bool {
    matches!((start, end), (Some(start), Some(end)) if start < now && now < end)
}

/// Derive `active` from the validity window. `now` on either edge reads as inactive.
///
/// A prize with an incomplete window (either date missing) is evaluated
/// against the configuration window as a whole; its own single date is
/// discarded. Returns the view only; nothing is written back.
#[must_use]
pub fn derive_window_status(
    mut prize: Prize,
    fallback_start: Option<i64>,
    fallback_end: Option<i64>,
    now: i64,
) -> Prize {
    if prize.start_date.is_none() || prize.end_date.is_none() {
        prize.start_date = fallback_start;
        prize.end_date = fallback_end;
    }
    prize.active = within_window(prize.start_date, prize.end_date, now);
    prize
}
