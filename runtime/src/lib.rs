//! # Prize Inventory Runtime
//!
//! Executes the guarded counter writes defined in `prize-inventory-core`
//! against a [`RecordStore`](prize_inventory_core::RecordStore).
//!
//! ## Core Components
//!
//! - **[`PrizeInventory`]**: the engine; creates prizes, moves units between
//!   counters, plans uploads and answers status queries
//! - **[`retry`]**: bounded, jittered retries with per-attempt classification
//! - **[`config`]**: environment-driven configuration
//! - **[`metrics`]**: Prometheus metrics for movements, retries and store calls
//!
//! ## Example
//!
//! ```ignore
//! use prize_inventory_runtime::{InventoryConfig, PrizeInventory};
//! use prize_inventory_core::environment::SystemClock;
//!
//! let config = InventoryConfig::from_env()?;
//! let inventory = PrizeInventory::new(store, Arc::new(SystemClock), &config);
//!
//! inventory.top_up(&key, 100).await?;
//! match inventory.reserve(&key, 1).await {
//!     Ok(counters) => println!("{} left", counters.available),
//!     Err(InventoryError::InsufficientBalance { .. }) => println!("sold out"),
//!     Err(other) => return Err(other.into()),
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// The inventory engine
pub mod engine;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with bounded, jittered backoff
pub mod retry;

mod query;
mod upload;

pub use config::{ConfigError, InventoryConfig};
pub use engine::PrizeInventory;
pub use retry::RetryPolicy;
