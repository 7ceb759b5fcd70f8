//! Process supervisor for the ticket inventory service.
//!
//! Wires configuration, the `PostgreSQL` store, the HTTP gateway and the
//! shutdown sequence together. The binary in `main.rs` only sets up logging
//! and calls [`bootstrap::run`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod lifecycle;

pub use config::{Config, ConfigError, ServerConfig};
pub use lifecycle::{Application, VERSION};

use thiserror::Error;
use ticket_inventory_core::StoreError;
use ticket_inventory_runtime::metrics::MetricsError;

/// Fatal errors that stop the process.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store could not be reached or migrated
    #[error("store initialization failed: {0}")]
    Store(#[from] StoreError),

    /// The metrics exporter could not be installed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Listener bind or accept failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server task panicked or was cancelled
    #[error("server task failed: {0}")]
    Task(String),
}
