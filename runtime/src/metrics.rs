//! Prometheus metrics for the inventory store.
//!
//! Metrics are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed. The server installs the Prometheus exporter when
//! `METRICS_ADDR` is configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use ticket_inventory_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build or install the exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter bound to its own HTTP listener.
#[derive(Debug, Clone, Copy)]
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and start the exporter.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed or
    /// the listener cannot be set up.
    pub fn start(&self) -> Result<(), MetricsError> {
        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Install(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        tracing::info!(addr = %self.addr, "Metrics exporter listening");
        Ok(())
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "inventory_upserts_total",
        "Total number of ticket option upserts"
    );
    describe_counter!(
        "inventory_purchases_committed_total",
        "Total number of committed purchases"
    );
    describe_counter!(
        "inventory_purchases_rejected_total",
        "Total number of purchases rejected by business rules"
    );
    describe_counter!(
        "inventory_purchase_conflicts_total",
        "Total number of purchase transactions retried after a write conflict"
    );
    describe_counter!(
        "inventory_purchase_retries_exhausted_total",
        "Total number of purchases that failed after exhausting retries"
    );
    describe_histogram!(
        "inventory_purchase_duration_seconds",
        "Time taken to run a purchase, including retries"
    );
}

/// Inventory store metrics recorder.
pub struct InventoryMetrics;

impl InventoryMetrics {
    /// Record an upsert.
    pub fn record_upsert() {
        counter!("inventory_upserts_total").increment(1);
    }

    /// Record a committed purchase.
    pub fn record_committed(duration: Duration) {
        counter!("inventory_purchases_committed_total").increment(1);
        histogram!("inventory_purchase_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a purchase rejected for `reason` (`not_found` or `insufficient_allocation`).
    pub fn record_rejected(reason: &'static str) {
        counter!("inventory_purchases_rejected_total", "reason" => reason).increment(1);
    }

    /// Record a write conflict that triggered a retry.
    pub fn record_conflict() {
        counter!("inventory_purchase_conflicts_total").increment(1);
    }

    /// Record a purchase that ran out of retries.
    pub fn record_exhausted() {
        counter!("inventory_purchase_retries_exhausted_total").increment(1);
    }
}
