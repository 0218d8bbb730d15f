//! Ready-made prize records and drafts.

use prize_inventory_core::PrizeKey;
use prize_inventory_core::counter::Counter;
use prize_inventory_core::prize::{PrizeDraft, attr};
use prize_inventory_core::record::Record;

/// A prize record holding `amount` available units and nothing else in flight.
#[must_use]
pub fn stocked_prize(key: &PrizeKey, amount: i64) -> Record {
    let mut record = Record::with_key(key);
    record.set(attr::NAME, "Test prize");
    record.set(attr::ACTIVE, true);
    for counter in Counter::ALL {
        let value = match counter {
            Counter::Amount | Counter::Available => amount,
            _ => 0,
        };
        record.set(counter.attribute(), value);
    }
    record
}

/// Set one counter on a record, keeping `total_amount` consistent with the
/// per-state counters.
#[must_use]
pub fn with_counter(mut record: Record, counter: Counter, value: i64) -> Record {
    record.set(counter.attribute(), value);
    let total: i64 = Counter::STATES
        .iter()
        .filter_map(|c| record.number(c.attribute()))
        .sum();
    record.set(Counter::Amount.attribute(), total);
    record
}

/// A prize that has never been stocked and has no counter attributes at all.
#[must_use]
pub fn bare_prize(key: &PrizeKey) -> Record {
    let mut record = Record::with_key(key);
    record.set(attr::NAME, "Bare prize");
    record.set(attr::ACTIVE, true);
    record
}

/// A complete creation draft for `configuration_id`.
#[must_use]
pub fn prize_draft(configuration_id: &str, prize_id: Option<&str>) -> PrizeDraft {
    PrizeDraft {
        configuration_id: Some(configuration_id.to_string()),
        prize_id: prize_id.map(str::to_string),
        name: Some("Free coffee".to_string()),
        desc: Some("One free coffee at any store".to_string()),
        active: Some(true),
        delivery_type: Some(1),
        barcode_type: Some(0),
        ..PrizeDraft::default()
    }
}
