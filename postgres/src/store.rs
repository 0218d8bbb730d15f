//! [`RecordStore`] over a single `prizes` table.

use crate::sql::{Bind, SqlBuilder, bind_all};
use prize_inventory_core::key::PrizeKey;
use prize_inventory_core::record::{CONFIGURATION_ID, PRIZE_ID, Record};
use prize_inventory_core::store::{
    CancellationReason, DeleteItem, PutItem, RecordQuery, RecordStore, StoreError, StoreFuture,
    UpdateItem, WriteItem,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};
use std::collections::BTreeMap;
use std::time::Duration;

/// SQL states Postgres reports for serialization failures and deadlocks.
const RETRYABLE_STATES: [&str; 2] = ["40001", "40P01"];

/// Map a driver error onto the store error taxonomy.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) if RETRYABLE_STATES.contains(&code.as_ref()) => {
                StoreError::TransactionConflict(db.message().to_string())
            }
            Some(code) if code.starts_with("22") => StoreError::Corrupt(db.message().to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Corrupt(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<Record, StoreError> {
    row.try_get::<sqlx::types::Json<Record>, _>("attributes")
        .map(|json| json.0)
        .map_err(map_sqlx)
}

fn encode(record: &Record) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Record with its key attributes overwritten from `key`.
fn keyed(mut record: Record, key: &PrizeKey) -> Record {
    record.set(CONFIGURATION_ID, key.configuration_id.as_str());
    record.set(PRIZE_ID, key.prize_id.as_str());
    record
}

/// Binds the primary key as `$1`, `$2` and returns the row selection.
fn key_filter(sql: &mut SqlBuilder, key: &PrizeKey) -> String {
    let configuration_id = sql.bind(Bind::Text(key.configuration_id.to_string()));
    let prize_id = sql.bind(Bind::Text(key.prize_id.to_string()));
    format!("prizes.configuration_id = {configuration_id} AND prizes.prize_id = {prize_id}")
}

/// `PostgreSQL` record store.
///
/// Each prize is one row; its attributes (counters included) form a JSONB
/// document. Single-record writes compile their mutation list and guard into
/// one `UPDATE … WHERE <guard>` statement, so check-and-write is atomic
/// without an explicit lock. Multi-item transactions lock every targeted row
/// with `SELECT … FOR UPDATE` in key order before evaluating the guards.
///
/// # Example
///
/// ```ignore
/// use prize_inventory_postgres::PostgresRecordStore;
///
/// let store = PostgresRecordStore::new("postgres://localhost/prizes").await?;
/// store.migrate().await?;
/// let inventory = PrizeInventory::new(Arc::new(store), Arc::new(SystemClock), &config);
/// ```
#[derive(Clone, Debug)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Connect with a pool of 10 connections.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the database cannot be reached.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with(database_url, 10, Duration::from_secs(5)).await
    }

    /// Connect with an explicit pool size and acquire timeout.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] when the database cannot be reached.
    pub async fn connect_with(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections, "Connected prize store pool");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `prizes` table and its indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))
    }

    /// Tell a missing row from a failed guard after a write matched nothing.
    async fn missing_or_failed(&self, key: &PrizeKey) -> StoreError {
        match self.exists(key).await {
            Ok(true) => StoreError::ConditionFailed(key.clone()),
            Ok(false) => StoreError::NotFound(key.clone()),
            Err(err) => err,
        }
    }

    async fn exists(&self, key: &PrizeKey) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM prizes WHERE configuration_id = $1 AND prize_id = $2)",
        )
        .bind(key.configuration_id.as_str())
        .bind(key.prize_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn put_record(&self, item: PutItem) -> Result<(), StoreError> {
        let PutItem { key, record, condition } = item;
        let document = encode(&keyed(record, &key))?;

        let mut sql = SqlBuilder::new();
        let selection = key_filter(&mut sql, &key);
        let document = sql.bind(Bind::Json(document));

        // A guard that holds on an empty record may create the row; any other
        // guard needs an existing row to hold on.
        let statement = if condition.evaluate(&Record::new()) {
            let guard = sql.predicate(&condition);
            format!(
                "INSERT INTO prizes (configuration_id, prize_id, attributes) \
                 VALUES ($1, $2, {document}::jsonb) \
                 ON CONFLICT (configuration_id, prize_id) \
                 DO UPDATE SET attributes = EXCLUDED.attributes WHERE {guard}"
            )
        } else {
            let guard = sql.predicate(&condition);
            format!("UPDATE prizes SET attributes = {document}::jsonb WHERE {selection} AND {guard}")
        };

        let result = bind_all(sqlx::query(&statement), sql.into_binds())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed(key));
        }
        Ok(())
    }

    async fn update_record(&self, item: UpdateItem) -> Result<Record, StoreError> {
        let mut sql = SqlBuilder::new();
        let selection = key_filter(&mut sql, &item.key);
        let post_image = sql.mutation(&item.mutation)?;
        let guard = sql.predicate(&item.condition);
        let statement = format!(
            "UPDATE prizes SET attributes = {post_image} WHERE {selection} AND {guard} RETURNING attributes"
        );

        let row = bind_all(sqlx::query(&statement), sql.into_binds())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => decode(&row),
            None => Err(self.missing_or_failed(&item.key).await),
        }
    }

    async fn delete_record(&self, item: DeleteItem) -> Result<(), StoreError> {
        let mut sql = SqlBuilder::new();
        let selection = key_filter(&mut sql, &item.key);
        let guard = sql.predicate(&item.condition);
        let statement = format!("DELETE FROM prizes WHERE {selection} AND {guard}");

        let result = bind_all(sqlx::query(&statement), sql.into_binds())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_failed(&item.key).await);
        }
        Ok(())
    }

    async fn run_query(&self, query: RecordQuery) -> Result<Vec<Record>, StoreError> {
        let mut sql = SqlBuilder::new();
        let selection = sql.key_condition(&query.key_condition);
        let filter = sql.predicate(&query.filter);
        let statement = format!(
            "SELECT attributes FROM prizes WHERE ({selection}) AND {filter} \
             ORDER BY configuration_id, prize_id"
        );

        let rows = bind_all(sqlx::query(&statement), sql.into_binds())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode).collect()
    }

    async fn transact(&self, items: Vec<WriteItem>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let mut keys: Vec<PrizeKey> = items.iter().map(|item| item.key().clone()).collect();
        keys.sort();
        keys.dedup();

        let mut images: BTreeMap<PrizeKey, Option<Record>> = BTreeMap::new();
        for key in keys {
            let image = lock_row(&mut tx, &key).await?;
            images.insert(key, image);
        }

        let reasons: Vec<CancellationReason> = items.iter().map(|item| check(&images, item)).collect();
        if reasons.iter().any(|r| *r != CancellationReason::None) {
            tx.rollback().await.map_err(map_sqlx)?;
            metrics::counter!("prize_inventory_postgres_transactions_canceled_total").increment(1);
            return Err(StoreError::TransactionCanceled { reasons });
        }

        for item in items {
            apply(&mut tx, &mut images, item).await?;
        }
        tx.commit().await.map_err(map_sqlx)
    }
}

async fn lock_row(tx: &mut Transaction<'_, Postgres>, key: &PrizeKey) -> Result<Option<Record>, StoreError> {
    let row = sqlx::query(
        "SELECT attributes FROM prizes WHERE configuration_id = $1 AND prize_id = $2 FOR UPDATE",
    )
    .bind(key.configuration_id.as_str())
    .bind(key.prize_id.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx)?;
    row.as_ref().map(decode).transpose()
}

/// Cancellation reason of one item against the locked pre-images.
fn check(images: &BTreeMap<PrizeKey, Option<Record>>, item: &WriteItem) -> CancellationReason {
    let empty = Record::new();
    let (condition, must_exist) = match item {
        WriteItem::Put(put) => (&put.condition, false),
        WriteItem::Update(update) => (&update.condition, true),
        WriteItem::Delete(delete) => (&delete.condition, true),
        WriteItem::ConditionCheck(check) => (&check.condition, false),
    };
    match images.get(item.key()).and_then(Option::as_ref) {
        None if must_exist => CancellationReason::NotFound,
        current if !condition.evaluate(current.unwrap_or(&empty)) => CancellationReason::ConditionFailed,
        _ => CancellationReason::None,
    }
}

async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    images: &mut BTreeMap<PrizeKey, Option<Record>>,
    item: WriteItem,
) -> Result<(), StoreError> {
    let (key, post_image) = match item {
        WriteItem::Put(put) => {
            let record = keyed(put.record, &put.key);
            (put.key, Some(record))
        }
        WriteItem::Update(update) => {
            let mut record = images.get(&update.key).cloned().flatten().unwrap_or_default();
            update.mutation.apply_to(&mut record);
            (update.key, Some(record))
        }
        WriteItem::Delete(delete) => (delete.key, None),
        WriteItem::ConditionCheck(_) => return Ok(()),
    };

    let existed = images.get(&key).is_some_and(Option::is_some);
    match &post_image {
        Some(record) if existed => {
            sqlx::query("UPDATE prizes SET attributes = $3 WHERE configuration_id = $1 AND prize_id = $2")
                .bind(key.configuration_id.as_str())
                .bind(key.prize_id.as_str())
                .bind(sqlx::types::Json(encode(record)?))
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx)?;
        }
        Some(record) => {
            let inserted = sqlx::query(
                "INSERT INTO prizes (configuration_id, prize_id, attributes) VALUES ($1, $2, $3) \
                 ON CONFLICT (configuration_id, prize_id) DO NOTHING",
            )
            .bind(key.configuration_id.as_str())
            .bind(key.prize_id.as_str())
            .bind(sqlx::types::Json(encode(record)?))
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
            if inserted.rows_affected() == 0 {
                // Another transaction created the row after our unlocked read.
                tracing::warn!(key = %key, "Concurrent insert inside transaction");
                return Err(StoreError::TransactionConflict(format!("concurrent insert of {key}")));
            }
        }
        None => {
            sqlx::query("DELETE FROM prizes WHERE configuration_id = $1 AND prize_id = $2")
                .bind(key.configuration_id.as_str())
                .bind(key.prize_id.as_str())
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx)?;
        }
    }
    images.insert(key, post_image);
    Ok(())
}

impl RecordStore for PostgresRecordStore {
    fn get(&self, key: &PrizeKey) -> StoreFuture<'_, Option<Record>> {
        let key = key.clone();
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT attributes FROM prizes WHERE configuration_id = $1 AND prize_id = $2",
            )
            .bind(key.configuration_id.as_str())
            .bind(key.prize_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
            row.as_ref().map(decode).transpose()
        })
    }

    fn put(&self, item: PutItem) -> StoreFuture<'_, ()> {
        Box::pin(self.put_record(item))
    }

    fn conditional_update(&self, item: UpdateItem) -> StoreFuture<'_, Record> {
        Box::pin(self.update_record(item))
    }

    fn transact_write(&self, items: Vec<WriteItem>) -> StoreFuture<'_, ()> {
        Box::pin(self.transact(items))
    }

    fn delete(&self, item: DeleteItem) -> StoreFuture<'_, ()> {
        Box::pin(self.delete_record(item))
    }

    fn query(&self, query: RecordQuery) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(self.run_query(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prize_inventory_core::mutation::Predicate;

    fn images(key: &PrizeKey, record: Option<Record>) -> BTreeMap<PrizeKey, Option<Record>> {
        BTreeMap::from([(key.clone(), record)])
    }

    #[test]
    fn missing_rows_fail_updates_but_not_checks() {
        let key = PrizeKey::new("c", "p");
        let locked = images(&key, None);

        let update = WriteItem::Update(UpdateItem {
            key: key.clone(),
            mutation: prize_inventory_core::mutation::MutationList::new(),
            condition: Predicate::Always,
        });
        let absent = WriteItem::ConditionCheck(prize_inventory_core::store::ConditionCheck {
            key: key.clone(),
            condition: Predicate::NotExists(PRIZE_ID.to_string()),
        });

        assert_eq!(check(&locked, &update), CancellationReason::NotFound);
        assert_eq!(check(&locked, &absent), CancellationReason::None);
    }

    #[test]
    fn guards_see_the_locked_image() {
        let key = PrizeKey::new("c", "p");
        let mut record = Record::with_key(&key);
        record.set("total_available", 1_i64);
        let locked = images(&key, Some(record));

        let put = WriteItem::Put(PutItem {
            key: key.clone(),
            record: Record::new(),
            condition: Predicate::at_least("total_available", 2),
        });
        assert_eq!(check(&locked, &put), CancellationReason::ConditionFailed);
    }

    #[test]
    fn key_attributes_follow_the_key() {
        let key = PrizeKey::new("c", "p");
        let mut record = Record::new();
        record.set(PRIZE_ID, "other");
        assert_eq!(keyed(record, &key).key(), Some(key));
    }
}
