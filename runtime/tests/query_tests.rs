//! Listings, index queries and end-date sweeps.

#![allow(clippy::unwrap_used)]

mod common;

use common::{CONFIGURATION, Harness};
use prize_inventory_core::counter::{Counter, Counters};
use prize_inventory_core::key::{ConfigurationId, PrizeId, PrizeKey};
use prize_inventory_core::mutation::MutationList;
use prize_inventory_core::prize::{Prize, attr};
use prize_inventory_core::record::Record;
use prize_inventory_core::status::{StatusFilter, StatusMode};
use prize_inventory_testing::fixtures;

const HOUR: i64 = 3_600_000;

fn ids(prizes: &[Prize]) -> Vec<&str> {
    prizes.iter().map(|p| p.key.prize_id.as_str()).collect()
}

fn configuration() -> ConfigurationId {
    ConfigurationId::new(CONFIGURATION)
}

/// Seed a prize built from the stocked fixture with extra attributes.
fn seed(h: &Harness, id: &str, amount: i64, edit: impl FnOnce(&mut Record)) -> PrizeKey {
    let key = Harness::key(id);
    let mut record = fixtures::stocked_prize(&key, amount);
    edit(&mut record);
    h.store.insert(record);
    key
}

fn shop(h: &Harness) {
    seed(h, "a-stocked", 3, |_| {});
    seed(h, "b-sold-out", 0, |_| {});
    seed(h, "c-paused", 4, |r| r.set(attr::ACTIVE, false));
    seed(h, "d-sold-out", 0, |_| {});
    h.store
        .insert(fixtures::stocked_prize(&PrizeKey::new("winter", "a-stocked"), 9));
}

#[tokio::test]
async fn stored_flag_listing_filters_in_the_store() {
    let h = Harness::new();
    shop(&h);
    let cfg = configuration();
    let (inventory, cfg) = (&h.inventory, &cfg);
    let list = move |filter| inventory.list_prizes(cfg, filter, StatusMode::StoredFlag);

    assert_eq!(
        ids(&list(StatusFilter::All).await.unwrap()),
        ["a-stocked", "b-sold-out", "c-paused", "d-sold-out"]
    );
    assert_eq!(
        ids(&list(StatusFilter::Active).await.unwrap()),
        ["a-stocked", "b-sold-out", "d-sold-out"]
    );
    assert_eq!(ids(&list(StatusFilter::Inactive).await.unwrap()), ["c-paused"]);
    assert_eq!(ids(&list(StatusFilter::Available).await.unwrap()), ["a-stocked"]);
}

#[tokio::test]
async fn date_window_listing_derives_status_without_writing() {
    let h = Harness::new();
    let now = h.now_millis();
    seed(&h, "live", 2, |r| {
        r.set(attr::ACTIVE, false);
        r.set(attr::START_DATE, now - HOUR);
        r.set(attr::END_DATE, now + HOUR);
    });
    seed(&h, "ended", 2, |r| {
        r.set(attr::START_DATE, now - 2 * HOUR);
        r.set(attr::END_DATE, now - HOUR);
    });
    seed(&h, "undated", 2, |_| {});
    seed(&h, "starts-now", 2, |r| {
        r.set(attr::START_DATE, now);
        r.set(attr::END_DATE, now + HOUR);
    });
    let before = h.store.snapshot(&Harness::key("live")).unwrap();

    let mode = StatusMode::DateWindow {
        fallback_start: None,
        fallback_end: None,
    };
    let active = h
        .inventory
        .list_prizes(&configuration(), StatusFilter::Active, mode)
        .await
        .unwrap();
    assert_eq!(ids(&active), ["live"]);
    assert!(active[0].active);

    let inactive = h
        .inventory
        .list_prizes(&configuration(), StatusFilter::Inactive, mode)
        .await
        .unwrap();
    assert_eq!(ids(&inactive), ["ended", "starts-now", "undated"]);

    assert_eq!(h.store.snapshot(&Harness::key("live")).unwrap(), before);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn incomplete_date_windows_use_the_configuration_window() {
    let h = Harness::new();
    let now = h.now_millis();
    seed(&h, "undated", 2, |_| {});
    seed(&h, "undated-empty", 0, |_| {});
    seed(&h, "own-end", 2, |r| r.set(attr::END_DATE, now - 1));

    let mode = StatusMode::DateWindow {
        fallback_start: Some(now - HOUR),
        fallback_end: Some(now + HOUR),
    };
    let available = h
        .inventory
        .list_prizes(&configuration(), StatusFilter::Available, mode)
        .await
        .unwrap();

    assert_eq!(ids(&available), ["own-end", "undated"]);
    for prize in &available {
        assert_eq!(prize.start_date, Some(now - HOUR));
        assert_eq!(prize.end_date, Some(now + HOUR));
    }
}

#[tokio::test]
async fn prize_id_index_spans_configurations() {
    let h = Harness::new();
    shop(&h);

    let found = h
        .inventory
        .query_by_prize_id(&PrizeId::new("a-stocked"))
        .await
        .unwrap();

    let configurations: Vec<_> = found
        .iter()
        .map(|p| p.key.configuration_id.as_str())
        .collect();
    assert_eq!(configurations, ["summer", "winter"]);
}

#[tokio::test]
async fn auto_upload_index_lists_flagged_prizes() {
    let h = Harness::new();
    seed(&h, "vouchers", 1, |r| r.set(attr::AUTO_UPLOAD_VOUCHERS, true));
    seed(&h, "manual", 1, |r| r.set(attr::AUTO_UPLOAD_VOUCHERS, false));
    seed(&h, "unset", 1, |_| {});

    let found = h.inventory.query_auto_upload_prizes().await.unwrap();
    assert_eq!(ids(&found), ["vouchers"]);
    assert!(found[0].auto_upload_vouchers);
}

#[tokio::test]
async fn always_win_pool_keeps_active_pool_prizes_that_can_still_be_won() {
    let h = Harness::new();
    let pool = |r: &mut Record| r.set(attr::POOL_PRIZE, true);
    seed(&h, "a-pool", 2, |r| {
        pool(r);
        r.set(attr::WINNING_RATIO, 0_i64);
    });
    seed(&h, "b-pool-ratio", 0, |r| {
        pool(r);
        r.set(attr::WINNING_RATIO, 2_500_i64);
    });
    seed(&h, "c-pool-paused", 5, |r| {
        pool(r);
        r.set(attr::ACTIVE, false);
        r.set(attr::WINNING_RATIO, 10_000_i64);
    });
    seed(&h, "d-not-pool", 5, |r| r.set(attr::WINNING_RATIO, 10_000_i64));
    seed(&h, "e-pool-empty", 0, pool);

    let cfg = configuration();
    assert_eq!(
        ids(&h.inventory.query_always_win_pool(&cfg, false).await.unwrap()),
        ["a-pool"]
    );
    assert_eq!(
        ids(&h.inventory.query_always_win_pool(&cfg, true).await.unwrap()),
        ["b-pool-ratio"]
    );
}

#[tokio::test]
async fn auto_redeem_listing_stays_within_the_configuration() {
    let h = Harness::new();
    seed(&h, "instant", 1, |r| r.set(attr::AUTO_REDEEM, true));
    seed(&h, "manual", 1, |r| r.set(attr::AUTO_REDEEM, false));
    seed(&h, "unset", 1, |_| {});
    let mut elsewhere = fixtures::stocked_prize(&PrizeKey::new("winter", "instant"), 1);
    elsewhere.set(attr::AUTO_REDEEM, true);
    h.store.insert(elsewhere);

    let found = h.inventory.query_auto_redeem_prizes(&configuration()).await.unwrap();
    assert_eq!(ids(&found), ["instant"]);
    assert_eq!(found[0].key.configuration_id, configuration());
}

#[tokio::test]
async fn expirable_moment_prizes_ignore_the_end_date_itself() {
    let h = Harness::new();
    for (id, offset, flagged) in [("past", -HOUR, true), ("future", HOUR, true), ("no-moments", -HOUR, false)] {
        let end_date = h.now_millis() + offset;
        seed(&h, id, 1, |r| {
            r.set(attr::HAS_END_DATE, true);
            r.set(attr::END_DATE, end_date);
            r.set(attr::HAS_EXPIRABLE_MOMENTS, flagged);
        });
    }
    seed(&h, "swept", 1, |r| {
        r.set(attr::HAS_END_DATE, false);
        r.set(attr::HAS_EXPIRABLE_MOMENTS, true);
    });

    assert_eq!(
        ids(&h.inventory.query_expirable_moment_prizes().await.unwrap()),
        ["future", "past"]
    );
}

#[tokio::test]
async fn has_available_inventory_counts_inactive_stock() {
    let h = Harness::new();
    seed(&h, "empty", 0, |_| {});
    h.store.insert(fixtures::bare_prize(&Harness::key("uncounted")));
    assert!(!h.inventory.has_available_inventory(&configuration()).await.unwrap());

    seed(&h, "paused", 4, |r| r.set(attr::ACTIVE, false));
    assert!(h.inventory.has_available_inventory(&configuration()).await.unwrap());

    assert!(!h
        .inventory
        .has_available_inventory(&ConfigurationId::new("nobody"))
        .await
        .unwrap());
}

fn ending(h: &Harness, id: &str, amount: i64, end_offset: i64) -> PrizeKey {
    let end = h.now_millis() + end_offset;
    seed(h, id, amount, |r| {
        r.set(attr::HAS_END_DATE, true);
        r.set(attr::END_DATE, end);
    })
}

#[tokio::test]
async fn end_date_query_uses_the_engine_clock() {
    let h = Harness::new();
    ending(&h, "past", 1, -HOUR);
    ending(&h, "future", 1, HOUR);
    seed(&h, "already-swept", 1, |r| {
        r.set(attr::HAS_END_DATE, false);
        r.set(attr::END_DATE, 0_i64);
    });

    assert_eq!(ids(&h.inventory.query_end_date_passed().await.unwrap()), ["past"]);

    h.clock.advance(chrono::Duration::hours(2));
    assert_eq!(
        ids(&h.inventory.query_end_date_passed().await.unwrap()),
        ["future", "past"]
    );
}

#[tokio::test]
async fn end_date_expiry_moves_remaining_stock_and_clears_the_flag() {
    let h = Harness::new();
    let key = ending(&h, "past", 5, -HOUR);
    h.inventory.reserve(&key, 2).await.unwrap();

    let counters = h.inventory.expire_available_at_end_date(&key).await.unwrap();

    assert_eq!(
        (counters.available, counters.reserved, counters.expired),
        (0, 2, 3)
    );
    assert!(counters.conservation_holds());
    let prize = h.inventory.get_prize(&key).await.unwrap();
    assert!(!prize.has_end_date);
    assert!(h.inventory.query_end_date_passed().await.unwrap().is_empty());
}

#[tokio::test]
async fn end_date_expiry_of_sold_out_prize_only_clears_the_flag() {
    let h = Harness::new();
    let key = ending(&h, "past", 0, -HOUR);

    let counters = h.inventory.expire_available_at_end_date(&key).await.unwrap();

    assert_eq!(counters, Counters::default());
    assert!(!h.inventory.get_prize(&key).await.unwrap().has_end_date);
}

fn top_up_race(h: &Harness, key: &PrizeKey, amount: i64) {
    h.store.interfere_next(
        key.clone(),
        MutationList::new()
            .increment(Counter::Amount.attribute(), amount)
            .increment(Counter::Available.attribute(), amount),
    );
}

#[tokio::test]
async fn end_date_expiry_takes_units_topped_up_after_the_read() {
    let h = Harness::new();
    let key = ending(&h, "past", 3, -HOUR);
    top_up_race(&h, &key, 5);

    let counters = h.inventory.expire_available_at_end_date(&key).await.unwrap();

    assert_eq!((counters.amount, counters.available, counters.expired), (8, 0, 8));
    assert!(counters.conservation_holds());
    assert_eq!(h.counters(&key), counters);
    assert!(!h.inventory.get_prize(&key).await.unwrap().has_end_date);
}

#[tokio::test]
async fn sold_out_prize_restocked_during_expiry_is_still_expired() {
    let h = Harness::new();
    let key = ending(&h, "past", 0, -HOUR);
    top_up_race(&h, &key, 5);

    let counters = h.inventory.expire_available_at_end_date(&key).await.unwrap();

    assert_eq!((counters.available, counters.expired), (0, 5));
    assert!(!h.inventory.get_prize(&key).await.unwrap().has_end_date);
    assert!(h.inventory.query_end_date_passed().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_expires_every_due_prize() {
    let h = Harness::new();
    let first = ending(&h, "first", 4, -HOUR);
    let second = ending(&h, "second", 0, -1);
    let later = ending(&h, "later", 7, HOUR);
    let third = ending(&h, "third", 2, -HOUR);

    let results = h.inventory.sweep_end_dates(2).await.unwrap();

    let keys: Vec<_> = results.iter().map(|(key, _)| key.clone()).collect();
    assert_eq!(keys, [first.clone(), second.clone(), third.clone()]);
    assert!(results.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(h.counters(&first).get(Counter::Expired), 4);
    assert_eq!(h.counters(&third).get(Counter::Expired), 2);
    assert_eq!(h.counters(&later), Counters::stocked(7));

    let again = h.inventory.sweep_end_dates(2).await.unwrap();
    assert!(again.is_empty());
}
