//! Reads: keyed lookups, index queries and status-filtered listings.

use crate::engine::{Failure, PrizeInventory, classify, decode_prize, fatal};
use crate::metrics::StoreMetrics;
use crate::retry::Attempt;
use prize_inventory_core::counter::{Counter, Counters};
use prize_inventory_core::error::{InventoryError, Result};
use prize_inventory_core::key::{ConfigurationId, PrizeId, PrizeKey};
use prize_inventory_core::mutation::{Comparison, Predicate};
use prize_inventory_core::prize::{Prize, attr};
use prize_inventory_core::status::{StatusFilter, StatusMode, derive_window_status};
use prize_inventory_core::store::{KeyCondition, RecordQuery, StoreError};
use std::time::Instant;

fn flag_set(field: &str) -> Predicate {
    Predicate::compare(field, Comparison::Eq, true)
}

fn classify_query(err: StoreError) -> Attempt<Failure> {
    if err.is_transient() {
        return Attempt::Retry(Failure::Transient(err));
    }
    match err {
        StoreError::Corrupt(message) => fatal(InventoryError::CorruptRecord(message)),
        other => fatal(InventoryError::Store(other)),
    }
}

impl PrizeInventory {
    /// Load one prize.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::RecordNotFound`] when the prize does not exist
    /// - [`InventoryError::CorruptRecord`] when it cannot be decoded
    /// - [`InventoryError::StoreUnavailable`] when the store stays unreachable
    pub async fn get_prize(&self, key: &PrizeKey) -> Result<Prize> {
        let record = self
            .with_retry("get_prize", move |_| async move {
                match self.fetch(key).await {
                    Ok(Some(record)) => Ok(record),
                    Ok(None) => Err(fatal(InventoryError::RecordNotFound(key.clone()))),
                    Err(err) => Err(classify(err, key)),
                }
            })
            .await?;
        decode_prize(record)
    }

    /// Load only the counters of a prize.
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::get_prize`].
    pub async fn get_counters(&self, key: &PrizeKey) -> Result<Counters> {
        Ok(self.get_prize(key).await?.counters)
    }

    /// List the prizes of a configuration that pass `filter`.
    ///
    /// With [`StatusMode::StoredFlag`] the filter is evaluated by the store.
    /// With [`StatusMode::DateWindow`] every prize of the configuration is read
    /// and `active` is derived from the validity window on the returned views;
    /// nothing is written back.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn list_prizes(
        &self,
        configuration_id: &ConfigurationId,
        filter: StatusFilter,
        mode: StatusMode,
    ) -> Result<Vec<Prize>> {
        let key_condition = KeyCondition::Configuration(configuration_id.clone());

        match mode {
            StatusMode::StoredFlag => {
                self.query_prizes(RecordQuery::new(key_condition).with_filter(filter.stored_flag_predicate()))
                    .await
            }
            StatusMode::DateWindow {
                fallback_start,
                fallback_end,
            } => {
                let now = self.clock.now().timestamp_millis();
                let prizes = self.query_prizes(RecordQuery::new(key_condition)).await?;
                Ok(prizes
                    .into_iter()
                    .map(|prize| derive_window_status(prize, fallback_start, fallback_end, now))
                    .filter(|prize| filter.accepts(prize.active, prize.counters.available))
                    .collect())
            }
        }
    }

    /// Prizes with this id in any configuration.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn query_by_prize_id(&self, prize_id: &PrizeId) -> Result<Vec<Prize>> {
        self.query_prizes(RecordQuery::new(KeyCondition::PrizeId(prize_id.clone())))
            .await
    }

    /// Prizes flagged for automatic voucher top-up.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn query_auto_upload_prizes(&self) -> Result<Vec<Prize>> {
        self.query_prizes(RecordQuery::new(KeyCondition::AutoUploadVouchers))
            .await
    }

    /// Prizes still flagged `has_end_date` whose `end_date` lies before the
    /// engine clock's current time.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn query_end_date_passed(&self) -> Result<Vec<Prize>> {
        let now = self.clock.now().timestamp_millis();
        self.query_prizes(RecordQuery::new(KeyCondition::EndDateBefore(now)))
            .await
    }

    /// Prizes still flagged `has_end_date` that also carry expirable winning
    /// moments, whatever their end date.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn query_expirable_moment_prizes(&self) -> Result<Vec<Prize>> {
        self.query_prizes(
            RecordQuery::new(KeyCondition::EndDateFlagged).with_filter(flag_set(attr::HAS_EXPIRABLE_MOMENTS)),
        )
        .await
    }

    /// Active pool prizes of a configuration that can still be won: positive
    /// `winning_ratio` when `ratio_winning`, positive `total_available` otherwise.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn query_always_win_pool(
        &self,
        configuration_id: &ConfigurationId,
        ratio_winning: bool,
    ) -> Result<Vec<Prize>> {
        let winnable = if ratio_winning {
            attr::WINNING_RATIO
        } else {
            Counter::Available.attribute()
        };
        let filter = flag_set(attr::ACTIVE)
            .and(flag_set(attr::POOL_PRIZE))
            .and(Predicate::compare(winnable, Comparison::Gt, 0_i64));
        self.query_prizes(RecordQuery::new(KeyCondition::Configuration(configuration_id.clone())).with_filter(filter))
            .await
    }

    /// Prizes of a configuration redeemed automatically on claim.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn query_auto_redeem_prizes(&self, configuration_id: &ConfigurationId) -> Result<Vec<Prize>> {
        self.query_prizes(
            RecordQuery::new(KeyCondition::Configuration(configuration_id.clone()))
                .with_filter(flag_set(attr::AUTO_REDEEM)),
        )
        .await
    }

    /// Whether any prize of the configuration, active or not, has units available.
    ///
    /// # Errors
    ///
    /// [`InventoryError::StoreUnavailable`] or [`InventoryError::CorruptRecord`].
    pub async fn has_available_inventory(&self, configuration_id: &ConfigurationId) -> Result<bool> {
        let stocked = self
            .query_prizes(
                RecordQuery::new(KeyCondition::Configuration(configuration_id.clone()))
                    .with_filter(Predicate::compare(Counter::Available.attribute(), Comparison::Gt, 0_i64)),
            )
            .await?;
        Ok(!stocked.is_empty())
    }

    async fn query_prizes(&self, query: RecordQuery) -> Result<Vec<Prize>> {
        let query_ref = &query;
        let records = self
            .with_retry("query", move |_| {
                let query = query_ref.clone();
                async move {
                    let started = Instant::now();
                    let result = self.store.query(query).await;
                    StoreMetrics::record_call("query", started.elapsed());
                    result.map_err(|err| {
                        if err.is_transient() {
                            StoreMetrics::record_error("query");
                        }
                        classify_query(err)
                    })
                }
            })
            .await?;

        records.into_iter().map(decode_prize).collect()
    }
}
