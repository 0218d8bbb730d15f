//! Prometheus metrics for the inventory engine.
//!
//! This module provides metric collection for:
//! - Counter movements (transitions, expirations, top-ups) and their outcome
//! - Conflict retries and guard failures caused by contention
//! - Record store round trips
//!
//! Recording is a no-op until a recorder is installed, so the engine records
//! unconditionally and embedding services decide whether to export.
//!
//! # Example
//!
//! ```rust,no_run
//! use prize_inventory_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Render the exposition text from your own HTTP handler
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics exporter.
///
/// Installs the global recorder and renders the exposition format on demand.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe every inventory metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. An already
    /// installed recorder is tolerated.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - scrape http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "prize_inventory_transitions_total",
        "Counter movements by operation and outcome"
    );
    describe_histogram!(
        "prize_inventory_transition_duration_seconds",
        "End-to-end latency of a counter movement, retries included"
    );
    describe_counter!(
        "prize_inventory_retries_total",
        "Attempts repeated after contention or a transient store failure"
    );
    describe_counter!(
        "prize_inventory_conflicts_total",
        "Guard failures that a fresh read attributed to a concurrent writer"
    );
    describe_counter!(
        "prize_inventory_outcome_unknown_total",
        "Writes whose response did not arrive within the timeout"
    );
    describe_histogram!(
        "prize_inventory_store_duration_seconds",
        "Latency of record store calls"
    );
    describe_counter!(
        "prize_inventory_store_errors_total",
        "Record store calls that failed with a transport or backend error"
    );
}

/// Counter movement metrics recorder.
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Record a finished movement. `outcome` is a short tag such as `ok`,
    /// `insufficient` or `exhausted`.
    pub fn record_transition(operation: &'static str, outcome: &'static str, duration: Duration) {
        counter!(
            "prize_inventory_transitions_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        histogram!("prize_inventory_transition_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    /// Record a guard failure caused by contention.
    pub fn record_conflict(operation: &'static str) {
        counter!("prize_inventory_conflicts_total", "operation" => operation).increment(1);
    }

    /// Record a write with an unknown outcome.
    pub fn record_outcome_unknown(operation: &'static str) {
        counter!("prize_inventory_outcome_unknown_total", "operation" => operation).increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a repeated attempt.
    pub fn record_retry(operation: &'static str) {
        counter!("prize_inventory_retries_total", "operation" => operation).increment(1);
    }
}

/// Record store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record a store round trip.
    pub fn record_call(call: &'static str, duration: Duration) {
        histogram!("prize_inventory_store_duration_seconds", "call" => call)
            .record(duration.as_secs_f64());
    }

    /// Record a failed store round trip.
    pub fn record_error(call: &'static str) {
        counter!("prize_inventory_store_errors_total", "call" => call).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn test_metrics_server_start() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);

        assert!(server.start().is_ok());
        // A second start hits the already-installed recorder and still succeeds
        let mut second = MetricsServer::new(addr);
        assert!(second.start().is_ok());
    }

    #[test]
    fn recorders_are_noops_without_exporter() {
        InventoryMetrics::record_transition("reserve", "ok", Duration::from_millis(3));
        InventoryMetrics::record_conflict("reserve");
        InventoryMetrics::record_outcome_unknown("claim");
        RetryMetrics::record_retry("reserve");
        StoreMetrics::record_call("conditional_update", Duration::from_millis(1));
        StoreMetrics::record_error("get");
    }
}
