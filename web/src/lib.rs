//! HTTP gateway for the ticket inventory service.
//!
//! Thin Axum layer over the [`AllocationService`](ticket_inventory_core::AllocationService):
//! extract and validate the request shape, call the service, map the outcome to
//! a status code. Error bodies are plain text.
//!
//! # Example
//!
//! ```ignore
//! use ticket_inventory_web::{AppState, router};
//!
//! let app = router(AppState::new(store));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AppJson, OptionIdPath};
pub use routes::{DEFAULT_REQUEST_TIMEOUT, router, router_with_timeout};
pub use state::AppState;
