//! The inventory engine: guarded counter movements with bounded conflict retries.
//!
//! Every mutation is one conditional round trip against the record store. A
//! failed guard is never taken at face value: the engine re-reads the prize
//! and tells a genuine shortfall ([`InventoryError::InsufficientBalance`],
//! returned at once) from a lost race (retried with a freshly built write).
//!
//! Writes run on a spawned task, so once submitted they complete even if the
//! caller's future is dropped. With a response timeout configured, a write that
//! does not answer in time is reported as [`InventoryError::OutcomeUnknown`]
//! and never retried.

use crate::config::{InventoryConfig, PartitioningConfig};
use crate::metrics::{InventoryMetrics, RetryMetrics, StoreMetrics};
use crate::retry::{Attempt, RetryError, RetryPolicy, retry_with_backoff};
use futures::stream::{self, StreamExt};
use prize_inventory_core::counter::{Counter, Counters, Edge};
use prize_inventory_core::environment::Clock;
use prize_inventory_core::error::{InventoryError, Result, ValidationError};
use prize_inventory_core::key::PrizeKey;
use prize_inventory_core::mutation::{Comparison, Predicate};
use prize_inventory_core::prize::{Prize, PrizeDraft, PrizeUpdate};
use prize_inventory_core::record::{PRIZE_ID, Record};
use prize_inventory_core::store::{DeleteItem, RecordStore, StoreError, UpdateItem, WriteItem};
use prize_inventory_core::transition::{
    Movement, TransitionExtra, build_entry_date_refresh, build_expire, build_transition,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why one attempt failed, as seen by the retry loop.
#[derive(Error, Debug)]
pub(crate) enum Failure {
    /// A guard failed although a fresh read shows enough balance.
    #[error("Guard on {0} failed under contention")]
    Contended(PrizeKey),
    /// Transport or backend failure.
    #[error(transparent)]
    Transient(StoreError),
    /// Final answer; retrying cannot change it.
    #[error(transparent)]
    Fatal(InventoryError),
}

impl Failure {
    fn into_error(self, attempts: u32) -> InventoryError {
        match self {
            Self::Contended(key) => InventoryError::ConcurrentUpdateExhausted { key, attempts },
            Self::Transient(err) => InventoryError::StoreUnavailable {
                attempts,
                message: err.to_string(),
            },
            Self::Fatal(err) => err,
        }
    }
}

/// Failure of a submitted write.
#[derive(Debug)]
pub(crate) enum SubmitError {
    Store(StoreError),
    OutcomeUnknown,
}

pub(crate) fn fatal(err: impl Into<InventoryError>) -> Attempt<Failure> {
    Attempt::Abort(Failure::Fatal(err.into()))
}

/// Map a store error that needs no further diagnosis.
pub(crate) fn classify(err: StoreError, key: &PrizeKey) -> Attempt<Failure> {
    if err.is_transient() {
        return Attempt::Retry(Failure::Transient(err));
    }
    match err {
        StoreError::NotFound(_) => fatal(InventoryError::RecordNotFound(key.clone())),
        StoreError::Corrupt(message) => fatal(InventoryError::CorruptRecord(message)),
        other => fatal(InventoryError::Store(other)),
    }
}

pub(crate) fn classify_submit(
    err: SubmitError,
    key: &PrizeKey,
    operation: &'static str,
) -> Attempt<Failure> {
    match err {
        SubmitError::Store(err) => classify(err, key),
        SubmitError::OutcomeUnknown => {
            InventoryMetrics::record_outcome_unknown(operation);
            tracing::warn!(operation, key = %key, "No response within timeout, outcome unknown");
            fatal(InventoryError::OutcomeUnknown { key: key.clone() })
        }
    }
}

pub(crate) fn decode_counters(record: &Record) -> std::result::Result<Counters, Attempt<Failure>> {
    Counters::from_record(record).map_err(|err| fatal(InventoryError::CorruptRecord(err.to_string())))
}

pub(crate) fn decode_prize(record: Record) -> Result<Prize> {
    Prize::from_record(record).map_err(|err| InventoryError::CorruptRecord(err.to_string()))
}

/// `total_available` still holds exactly `amount` (a missing counter reads as zero).
fn available_exactly(amount: i64) -> Predicate {
    let field = Counter::Available.attribute();
    let equal = Predicate::compare(field, Comparison::Eq, amount);
    if amount == 0 {
        Predicate::Or(vec![Predicate::NotExists(field.to_string()), equal])
    } else {
        equal
    }
}

fn outcome_tag<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(InventoryError::InsufficientBalance { .. }) => "insufficient",
        Err(InventoryError::ConcurrentUpdateExhausted { .. }) => "exhausted",
        Err(InventoryError::RecordNotFound(_)) => "not_found",
        Err(InventoryError::OutcomeUnknown { .. }) => "unknown",
        Err(InventoryError::StoreUnavailable { .. }) => "unavailable",
        Err(InventoryError::Validation(_)) => "invalid",
        Err(_) => "error",
    }
}

/// Prize inventory engine.
///
/// Cheap to clone; clones share the store, clock and configuration. Construct
/// one at startup and hand it to every caller.
///
/// # Example
///
/// ```ignore
/// let inventory = PrizeInventory::new(store, Arc::new(SystemClock), &InventoryConfig::from_env()?);
/// let key = inventory.create_prize(draft).await?;
/// inventory.top_up(&key, 100).await?;
/// inventory.reserve(&key, 1).await?;
/// ```
#[derive(Clone)]
pub struct PrizeInventory {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) response_timeout: Option<Duration>,
    pub(crate) partitioning: PartitioningConfig,
}

impl PrizeInventory {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: &InventoryConfig) -> Self {
        Self {
            store,
            clock,
            retry_policy: config.retry_policy(),
            response_timeout: config.response_timeout(),
            partitioning: config.partitioning,
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the response timeout.
    #[must_use]
    pub const fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Active retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    // ----- Administrative writes -----

    /// Validate `draft` and store it as a new prize with seeded counters.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Validation`] for missing or out-of-enumeration attributes
    /// - [`InventoryError::PrizeAlreadyExists`] when the key is taken
    /// - [`InventoryError::StoreUnavailable`] / [`InventoryError::OutcomeUnknown`]
    pub async fn create_prize(&self, draft: PrizeDraft) -> Result<PrizeKey> {
        let new_prize = draft.validate(self.clock.now())?;
        let key = new_prize.key.clone();
        let item = new_prize.into_put_item();

        let key_ref = &key;
        let item_ref = &item;
        self.with_retry("create_prize", move |_| {
            let item = item_ref.clone();
            async move {
                match self.submit("put", move |store| async move { store.put(item).await }).await {
                    Ok(()) => Ok(()),
                    Err(SubmitError::Store(StoreError::ConditionFailed(_))) => {
                        Err(fatal(InventoryError::PrizeAlreadyExists(key_ref.clone())))
                    }
                    Err(err) => Err(classify_submit(err, key_ref, "create_prize")),
                }
            }
        })
        .await?;

        tracing::info!(key = %key, "Prize created");
        Ok(key)
    }

    /// Apply non-counter attribute changes and refresh `entry_date`.
    ///
    /// An empty update only refreshes `entry_date`.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::RecordNotFound`] when the prize does not exist
    /// - [`InventoryError::StoreUnavailable`] / [`InventoryError::OutcomeUnknown`]
    pub async fn update_attributes(&self, key: &PrizeKey, update: PrizeUpdate) -> Result<Prize> {
        let update_ref = &update;
        let record = self
            .with_retry("update_attributes", move |_| {
                let item = update_ref.clone().into_update_item(key.clone(), self.clock.now());
                self.attempt_update(key, item, "update_attributes")
            })
            .await?;

        tracing::debug!(key = %key, "Prize attributes updated");
        decode_prize(record)
    }

    /// Physically delete a prize.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::RecordNotFound`] when the prize does not exist
    /// - [`InventoryError::StoreUnavailable`] / [`InventoryError::OutcomeUnknown`]
    pub async fn delete_prize(&self, key: &PrizeKey) -> Result<()> {
        self.with_retry("delete_prize", move |_| {
            let item = DeleteItem {
                key: key.clone(),
                condition: Predicate::Exists(PRIZE_ID.to_string()),
            };
            async move {
                match self.submit("delete", move |store| async move { store.delete(item).await }).await {
                    Ok(()) => Ok(()),
                    Err(SubmitError::Store(StoreError::ConditionFailed(_))) => {
                        Err(fatal(InventoryError::RecordNotFound(key.clone())))
                    }
                    Err(err) => Err(classify_submit(err, key, "delete_prize")),
                }
            }
        })
        .await?;

        tracing::info!(key = %key, "Prize deleted");
        Ok(())
    }

    // ----- Counter movements -----

    /// Add `amount` fresh units: `total_amount` and `total_available` grow together.
    ///
    /// Missing counters start from zero.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::AmountOverflow`] (as [`InventoryError::Validation`])
    ///   when either counter would leave the `i64` range
    /// - otherwise see [`PrizeInventory::transition`]
    pub async fn top_up(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.run_movement(key, Movement::TopUp(amount)).await
    }

    /// Move `amount` units from `from` to `to`, optionally co-updating
    /// partition or end-date metadata in the same write.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Validation`] for a non-positive amount or an illegal edge
    /// - [`InventoryError::InsufficientBalance`] when `from` holds less than `amount`
    /// - [`InventoryError::RecordNotFound`] when the prize does not exist
    /// - [`InventoryError::ConcurrentUpdateExhausted`] when contention outlasts the retry budget
    /// - [`InventoryError::StoreUnavailable`] when the store stays unreachable
    /// - [`InventoryError::OutcomeUnknown`] when a write does not answer in time
    pub async fn transition(
        &self,
        key: &PrizeKey,
        from: Counter,
        to: Counter,
        amount: i64,
        extra: TransitionExtra,
    ) -> Result<Counters> {
        let edge = Edge::between(from, to).map_err(ValidationError::from)?;
        self.run_movement(key, Movement::Transition { edge, amount, extra })
            .await
    }

    /// `available -> reserved`
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn reserve(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::Reserve, amount).await
    }

    /// `reserved -> claimed`
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn claim(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::Claim, amount).await
    }

    /// `claimed -> redeemed`
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn redeem(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::RedeemClaimed, amount).await
    }

    /// `reserved -> redeemed`, skipping the claim step.
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn redeem_reserved(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::RedeemReserved, amount).await
    }

    /// `reserved -> available`
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn release(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::ReleaseReserved, amount).await
    }

    /// `claimed -> available`
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn release_claimed(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::ReleaseClaimed, amount).await
    }

    /// `available -> removed`, for administrative write-off.
    ///
    /// # Errors
    ///
    /// See [`PrizeInventory::transition`].
    pub async fn remove(&self, key: &PrizeKey, amount: i64) -> Result<Counters> {
        self.move_along(key, Edge::Remove, amount).await
    }

    /// Move several source counters into `total_expired` in one atomic write.
    ///
    /// Either every listed source is decremented or nothing changes.
    ///
    /// # Errors
    ///
    /// As [`PrizeInventory::transition`]; `InsufficientBalance` names the first
    /// short source.
    pub async fn expire(&self, key: &PrizeKey, decrements: BTreeMap<Counter, i64>) -> Result<Counters> {
        self.run_movement(key, Movement::Expire(decrements)).await
    }

    /// Expire whatever is still available and clear `has_end_date`, in one write.
    ///
    /// Used by end-date sweeps. The write is guarded on `total_available`
    /// being unchanged since the read, and the amount is re-read on every
    /// attempt: a concurrent reservation shrinks the expiry and a concurrent
    /// top-up grows it, instead of either failing it or surviving it.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::RecordNotFound`] when the prize does not exist
    /// - [`InventoryError::ConcurrentUpdateExhausted`] / [`InventoryError::StoreUnavailable`]
    /// - [`InventoryError::OutcomeUnknown`]
    pub async fn expire_available_at_end_date(&self, key: &PrizeKey) -> Result<Counters> {
        let started = Instant::now();
        let result = self
            .with_retry("expire_at_end_date", move |_| self.attempt_end_date_expiry(key))
            .await;

        InventoryMetrics::record_transition("expire_at_end_date", outcome_tag(&result), started.elapsed());
        if let Ok(counters) = &result {
            tracing::info!(key = %key, expired = counters.expired, "Prize end date reached");
        }
        result
    }

    /// Expire every prize whose end date has passed, at most `concurrency`
    /// prizes at a time.
    ///
    /// Returns one result per due prize, ordered by key. A failure on one
    /// prize does not stop the others; the caller decides what to do with it.
    ///
    /// # Errors
    ///
    /// Only the initial index query fails the whole sweep.
    pub async fn sweep_end_dates(&self, concurrency: usize) -> Result<Vec<(PrizeKey, Result<Counters>)>> {
        let due = self.query_end_date_passed().await?;

        let mut results: Vec<(PrizeKey, Result<Counters>)> = stream::iter(due.into_iter().map(|prize| prize.key))
            .map(move |key| async move {
                let result = self.expire_available_at_end_date(&key).await;
                (key, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let failed = results.iter().filter(|(_, result)| result.is_err()).count();
        tracing::info!(swept = results.len(), failed, "End-date sweep finished");
        Ok(results)
    }

    // ----- Transaction item builders -----

    /// Build, without executing, the write for a `from -> to` movement so a
    /// caller can bundle it into its own multi-item transaction.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Validation`] for a non-positive amount or an illegal edge.
    pub fn build_transition_item(
        &self,
        key: &PrizeKey,
        from: Counter,
        to: Counter,
        amount: i64,
        extra: TransitionExtra,
    ) -> Result<WriteItem> {
        let edge = Edge::between(from, to).map_err(ValidationError::from)?;
        Ok(build_transition(key, edge, amount, extra, self.clock.now())?.into_write_item())
    }

    /// Build, without executing, a multi-source expiration write.
    ///
    /// # Errors
    ///
    /// [`InventoryError::Validation`] for empty, illegal or non-positive decrements.
    pub fn build_expire_item(&self, key: &PrizeKey, decrements: &BTreeMap<Counter, i64>) -> Result<WriteItem> {
        Ok(build_expire(key, decrements, self.clock.now())?.into_write_item())
    }

    /// Build, without executing, a counter-free write that refreshes
    /// `entry_date` (and `active_partition` when given), for a caller that
    /// must touch the prize inside its own transaction.
    #[must_use]
    pub fn build_entry_date_item(&self, key: &PrizeKey, active_partition: Option<u32>) -> WriteItem {
        build_entry_date_refresh(key, active_partition, self.clock.now()).into_write_item()
    }

    // ----- Plumbing -----

    async fn move_along(&self, key: &PrizeKey, edge: Edge, amount: i64) -> Result<Counters> {
        self.run_movement(
            key,
            Movement::Transition {
                edge,
                amount,
                extra: TransitionExtra::NONE,
            },
        )
        .await
    }

    async fn run_movement(&self, key: &PrizeKey, movement: Movement) -> Result<Counters> {
        let operation = movement.label();
        let started = Instant::now();

        // Invalid input never reaches the store.
        movement.build(key, self.clock.now())?;

        let movement_ref = &movement;
        let result = self
            .with_retry(operation, move |_| self.attempt_movement(key, movement_ref))
            .await;

        InventoryMetrics::record_transition(operation, outcome_tag(&result), started.elapsed());
        match &result {
            Ok(counters) => {
                tracing::debug!(
                    operation,
                    key = %key,
                    available = counters.available,
                    "Counters moved"
                );
            }
            Err(err) if err.is_business_outcome() => {
                tracing::info!(operation, key = %key, error = %err, "Movement rejected");
            }
            Err(err) => {
                tracing::warn!(operation, key = %key, error = %err, "Movement failed");
            }
        }
        result
    }

    async fn attempt_movement(
        &self,
        key: &PrizeKey,
        movement: &Movement,
    ) -> std::result::Result<Counters, Attempt<Failure>> {
        // Rebuilt on every attempt: fresh guard, fresh entry_date.
        let item = movement.build(key, self.clock.now()).map_err(fatal)?;

        match self
            .submit("conditional_update", move |store| async move {
                store.conditional_update(item).await
            })
            .await
        {
            Ok(record) => decode_counters(&record),
            Err(SubmitError::Store(StoreError::ConditionFailed(_))) => {
                Err(self.diagnose_guard_failure(key, movement).await)
            }
            Err(err) => Err(classify_submit(err, key, movement.label())),
        }
    }

    /// Re-read the prize after a failed guard and decide whether the failure
    /// is final or a lost race.
    async fn diagnose_guard_failure(&self, key: &PrizeKey, movement: &Movement) -> Attempt<Failure> {
        let record = match self.fetch(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return fatal(InventoryError::RecordNotFound(key.clone())),
            Err(err) => return classify(err, key),
        };
        let counters = match decode_counters(&record) {
            Ok(counters) => counters,
            Err(failure) => return failure,
        };

        if movement.overflows(&counters) {
            return fatal(ValidationError::AmountOverflow);
        }

        match movement.demands().into_iter().find(|demand| demand.is_short(&counters)) {
            Some(demand) => fatal(InventoryError::InsufficientBalance {
                key: key.clone(),
                counter: demand.counter,
                requested: demand.amount,
                available: counters.get(demand.counter),
            }),
            None => {
                InventoryMetrics::record_conflict(movement.label());
                tracing::debug!(
                    operation = movement.label(),
                    key = %key,
                    "Guard failed but fresh read has enough balance, retrying"
                );
                Attempt::Retry(Failure::Contended(key.clone()))
            }
        }
    }

    async fn attempt_end_date_expiry(&self, key: &PrizeKey) -> std::result::Result<Counters, Attempt<Failure>> {
        let record = match self.fetch(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(fatal(InventoryError::RecordNotFound(key.clone()))),
            Err(err) => return Err(classify(err, key)),
        };
        let counters = decode_counters(&record)?;
        let now = self.clock.now();

        let amount = i64::try_from(counters.available)
            .map_err(|_| fatal(InventoryError::CorruptRecord(format!("{key}: available out of range"))))?;
        let mut item = if amount == 0 {
            PrizeUpdate {
                has_end_date: Some(false),
                ..PrizeUpdate::default()
            }
            .into_update_item(key.clone(), now)
        } else {
            let extra = TransitionExtra {
                has_end_date: Some(false),
                ..TransitionExtra::NONE
            };
            build_transition(key, Edge::ExpireAvailable, amount, extra, now).map_err(fatal)?
        };
        // Clearing the flag is only safe if no units arrived since the read.
        item.condition = item.condition.and(available_exactly(amount));

        match self
            .submit("conditional_update", move |store| async move {
                store.conditional_update(item).await
            })
            .await
        {
            Ok(record) => decode_counters(&record),
            Err(SubmitError::Store(StoreError::ConditionFailed(_))) => {
                // Availability changed since the read; the next attempt re-reads it.
                InventoryMetrics::record_conflict("expire_at_end_date");
                Err(Attempt::Retry(Failure::Contended(key.clone())))
            }
            Err(err) => Err(classify_submit(err, key, "expire_at_end_date")),
        }
    }

    async fn attempt_update(
        &self,
        key: &PrizeKey,
        item: UpdateItem,
        operation: &'static str,
    ) -> std::result::Result<Record, Attempt<Failure>> {
        match self
            .submit("conditional_update", move |store| async move {
                store.conditional_update(item).await
            })
            .await
        {
            Ok(record) => Ok(record),
            // The only guard on attribute updates is the prize existing.
            Err(SubmitError::Store(StoreError::ConditionFailed(_))) => {
                Err(fatal(InventoryError::RecordNotFound(key.clone())))
            }
            Err(err) => Err(classify_submit(err, key, operation)),
        }
    }

    /// Run `op` against the store on a spawned task and wait for its response,
    /// up to the configured timeout.
    pub(crate) async fn submit<T, F, Fut>(
        &self,
        call: &'static str,
        op: F,
    ) -> std::result::Result<T, SubmitError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn RecordStore>) -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>> + Send + 'static,
    {
        let started = Instant::now();
        let task = tokio::spawn(op(Arc::clone(&self.store)));

        let joined = match self.response_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                // Dropping the handle detaches the task; the write still completes.
                Err(_) => return Err(SubmitError::OutcomeUnknown),
            },
            None => task.await,
        };
        StoreMetrics::record_call(call, started.elapsed());

        match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err.is_transient() {
                    StoreMetrics::record_error(call);
                }
                Err(SubmitError::Store(err))
            }
            Err(join_error) => {
                tracing::error!(call, error = %join_error, "Store write task failed");
                Err(SubmitError::OutcomeUnknown)
            }
        }
    }

    /// Read one record.
    pub(crate) async fn fetch(&self, key: &PrizeKey) -> std::result::Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let result = self.store.get(key).await;
        StoreMetrics::record_call("get", started.elapsed());
        if result.as_ref().is_err_and(StoreError::is_transient) {
            StoreMetrics::record_error("get");
        }
        result
    }

    /// Drive `attempt` through the retry policy and map exhaustion to the
    /// caller-facing error.
    pub(crate) async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, Attempt<Failure>>>,
    {
        retry_with_backoff(&self.retry_policy, |n| {
            if n > 0 {
                RetryMetrics::record_retry(operation);
            }
            attempt(n)
        })
        .await
        .map_err(|err| match err {
            RetryError::Aborted(failure) => failure.into_error(1),
            RetryError::Exhausted { attempts, last } => last.into_error(attempts),
        })
    }
}
