//! Application state for Axum handlers.

use std::sync::Arc;
use ticket_inventory_core::{AllocationService, InventoryStore};
use ticket_inventory_runtime::HealthRegistry;

/// Application state shared across all HTTP handlers.
///
/// The health registry is owned here for the lifetime of the gateway; the
/// supervisor keeps a second handle so it can flip the probe at shutdown.
#[derive(Clone)]
pub struct AppState {
    /// Validation and store access for the ticket routes
    pub service: AllocationService,
    /// Status map behind `/-/health`
    pub health: Arc<HealthRegistry>,
}

impl AppState {
    /// Build state around a store with a fresh health registry.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self::with_health(store, Arc::new(HealthRegistry::new()))
    }

    /// Build state around a store and an existing health registry.
    #[must_use]
    pub fn with_health(store: Arc<dyn InventoryStore>, health: Arc<HealthRegistry>) -> Self {
        Self {
            service: AllocationService::new(store),
            health,
        }
    }
}
