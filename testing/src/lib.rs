//! # Ticket Inventory Testing
//!
//! Testing utilities for the ticket inventory service.
//!
//! This crate provides:
//! - [`InMemoryInventoryStore`], a store with the same consistency contract as
//!   the Postgres backend plus failure injection
//! - Helpers for seeding stores and capturing logs
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use ticket_inventory_testing::helpers::seeded_store;
//!
//! #[tokio::test]
//! async fn test_purchase_flow() {
//!     let (store, id) = seeded_store("GA", 10).await;
//!     let service = AllocationService::new(store.clone());
//!
//!     service
//!         .purchase_ticket(id, PurchaseRequest { quantity: 2, user_id: "u-1".into() })
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(store.purchases().await.len(), 1);
//! }
//! ```

pub mod inventory;

pub use inventory::{FailurePoint, InMemoryInventoryStore};

/// Test helpers.
pub mod helpers {
    use super::InMemoryInventoryStore;
    use std::sync::Arc;
    use ticket_inventory_core::{InventoryStore, NewTicketOption, TicketOptionId};

    /// Create a store holding one option named `name` with `allocation` tickets.
    ///
    /// # Panics
    ///
    /// Panics if the fresh store rejects the upsert, which only happens for a
    /// non-positive allocation.
    #[allow(clippy::expect_used)] // Test helper
    pub async fn seeded_store(
        name: &str,
        allocation: i32,
    ) -> (Arc<InMemoryInventoryStore>, TicketOptionId) {
        let store = Arc::new(InMemoryInventoryStore::new());
        let option = store
            .upsert_ticket_option(NewTicketOption::new(name, format!("{name} tickets"), allocation))
            .await
            .expect("seeding a fresh store should succeed");
        (store, option.id)
    }

    /// Install a test-writer subscriber so `tracing` output shows up for failing tests.
    ///
    /// Safe to call from every test; only the first call installs anything.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ticket_inventory=debug")
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;

    /// A starting allocation between 1 and 50.
    pub fn allocation() -> impl Strategy<Value = i32> {
        1..=50_i32
    }

    /// Up to 20 purchase quantities between 1 and 10.
    pub fn purchase_quantities() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(1..=10_i32, 1..20)
    }

    /// A plausible ticket option name.
    pub fn option_name() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z0-9 ]{0,15}"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::helpers::seeded_store;
    use ticket_inventory_core::InventoryStore;

    #[tokio::test]
    async fn seeded_store_holds_one_option() {
        let (store, id) = seeded_store("VIP", 5).await;
        assert_eq!(store.ticket_option_count().await, 1);

        let option = store.get_ticket_option(id).await.unwrap();
        assert_eq!(option.name, "VIP");
        assert_eq!(option.allocation, 5);
    }
}
