//! # Ticket Inventory Runtime
//!
//! Runtime support shared by the store, the gateway and the supervisor.
//!
//! ## Components
//!
//! - **Retry**: Exponential backoff for transactions that hit write conflicts
//! - **Health**: The lock-guarded status map behind the liveness probe
//! - **Shutdown**: Cancellation signal driven by OS signals
//! - **Metrics**: Prometheus counters for purchases and upserts
//!
//! ## Example
//!
//! ```ignore
//! use ticket_inventory_runtime::{HealthRegistry, ShutdownSignal, listen_for_os_signals};
//!
//! let health = Arc::new(HealthRegistry::new());
//! let shutdown = ShutdownSignal::new();
//! listen_for_os_signals(shutdown.clone());
//!
//! shutdown.wait().await;
//! health.begin_shutdown();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Retry logic with exponential backoff
pub mod retry;

/// Liveness status registry
pub mod health;

/// Shutdown signalling
pub mod shutdown;

/// Prometheus metrics for observability
pub mod metrics;

pub use health::{HealthRegistry, HealthReport};
pub use retry::{RetryError, RetryPolicy, retry_with_predicate};
pub use shutdown::{OsSignal, ShutdownSignal, listen_for_os_signals};
