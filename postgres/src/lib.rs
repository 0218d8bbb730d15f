//! `PostgreSQL` record store for the prize inventory engine.
//!
//! Implements the `RecordStore` contract from `prize-inventory-core` on top of
//! sqlx. Every prize is one row of the `prizes` table keyed by
//! `(configuration_id, prize_id)`; the remaining attributes live in a JSONB
//! document. Guards are compiled to SQL and evaluated by the database against
//! the row it is about to write, so concurrent engines sharing one database
//! never oversell.
//!
//! Secondary lookups (by prize id, auto-upload flag, end date) are backed by
//! indexes created in `migrations/`.
//!
//! # Example
//!
//! ```ignore
//! use prize_inventory_postgres::PostgresRecordStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresRecordStore::new("postgres://localhost/prizes").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod sql;
mod store;

pub use store::PostgresRecordStore;
