//! `PostgreSQL` inventory store for the ticket inventory service.
//!
//! Implements [`InventoryStore`](ticket_inventory_core::InventoryStore) on top
//! of a sqlx connection pool:
//!
//! - Additive upsert keyed on the option name in a single statement
//! - Row-locked purchase transactions with bounded retry on conflict
//! - Embedded, idempotent schema migrations
//!
//! # Example
//!
//! ```ignore
//! use ticket_inventory_postgres::{PostgresConfig, PostgresInventoryStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresInventoryStore::connect(&PostgresConfig::new("postgres://localhost/tickets")).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod store;

pub use config::PostgresConfig;
pub use store::PostgresInventoryStore;
