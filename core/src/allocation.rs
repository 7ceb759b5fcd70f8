//! Allocation service: request validation in front of the inventory store.
//!
//! The service is stateless. It rejects malformed input before any backend
//! round trip, delegates to the [`InventoryStore`], and translates store
//! outcomes into [`ServiceError`]. It never retries; retries belong inside the
//! store's transaction boundary.

use crate::inventory_store::{InventoryStore, StoreError};
use crate::ticket::{NewTicketOption, Purchase, PurchaseRequest, TicketOption, TicketOptionId};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the allocation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Input was rejected before reaching the store.
    #[error("{0}")]
    Validation(String),

    /// The referenced ticket option does not exist.
    #[error("ticket option {0} not found")]
    NotFound(TicketOptionId),

    /// Not enough allocation left; nothing was written.
    #[error("not enough tickets available: requested {requested}, available {available}")]
    InsufficientAllocation {
        /// The option that was short.
        id: TicketOptionId,
        /// Units asked for.
        requested: i32,
        /// Units left at the time of the check.
        available: i32,
    },

    /// Backend failure, including exhausted transaction retries.
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::InsufficientAllocation {
                id,
                requested,
                available,
            } => Self::InsufficientAllocation {
                id,
                requested,
                available,
            },
            other => Self::Store(other),
        }
    }
}

/// Validate an upsert request.
///
/// # Errors
///
/// Returns [`ServiceError::Validation`] if the name is blank or the
/// allocation is not positive.
pub fn validate_new_ticket_option(option: &NewTicketOption) -> Result<(), ServiceError> {
    if option.name.trim().is_empty() {
        return Err(ServiceError::Validation("name must not be empty".to_string()));
    }
    if option.allocation <= 0 {
        return Err(ServiceError::Validation(format!(
            "allocation must be positive, got {}",
            option.allocation
        )));
    }
    Ok(())
}

/// Validate a purchase request.
///
/// # Errors
///
/// Returns [`ServiceError::Validation`] if the quantity is not positive.
/// The user id is opaque and passed through unchecked.
pub fn validate_purchase(request: &PurchaseRequest) -> Result<(), ServiceError> {
    if request.quantity <= 0 {
        return Err(ServiceError::Validation(format!(
            "quantity must be positive, got {}",
            request.quantity
        )));
    }
    Ok(())
}

fn validate_id(id: TicketOptionId) -> Result<(), ServiceError> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("invalid ticket option id {id}")))
    }
}

/// Stateless orchestration over an [`InventoryStore`].
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn InventoryStore>,
}

impl AllocationService {
    /// Create a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    /// Create a ticket option or restock an existing one with the same name.
    ///
    /// # Errors
    ///
    /// - `Validation`: blank name or non-positive allocation
    /// - `Store`: backend failure
    pub async fn create_ticket_option(
        &self,
        option: NewTicketOption,
    ) -> Result<TicketOption, ServiceError> {
        validate_new_ticket_option(&option)?;

        let name = option.name.clone();
        let delta = option.allocation;
        match self.store.upsert_ticket_option(option).await {
            Ok(updated) => {
                tracing::debug!(
                    ticket_option_id = %updated.id,
                    name = %name,
                    delta,
                    allocation = updated.allocation,
                    "Ticket option upserted"
                );
                Ok(updated)
            }
            Err(err) => {
                tracing::error!(name = %name, error = %err, "Ticket option upsert failed");
                Err(err.into())
            }
        }
    }

    /// Buy units of a ticket option.
    ///
    /// # Errors
    ///
    /// - `Validation`: non-positive quantity, blank user id or invalid id
    /// - `NotFound`: no such option
    /// - `InsufficientAllocation`: not enough units left
    /// - `Store`: backend failure after the store's own retries
    pub async fn purchase_ticket(
        &self,
        id: TicketOptionId,
        request: PurchaseRequest,
    ) -> Result<Purchase, ServiceError> {
        validate_id(id)?;
        validate_purchase(&request)?;

        let quantity = request.quantity;
        match self
            .store
            .purchase_ticket(id, request.quantity, request.user_id)
            .await
        {
            Ok(purchase) => {
                tracing::debug!(
                    ticket_option_id = %id,
                    quantity,
                    user_id = %purchase.user_id,
                    "Purchase committed"
                );
                Ok(purchase)
            }
            Err(err @ (StoreError::NotFound(_) | StoreError::InsufficientAllocation { .. })) => {
                tracing::info!(ticket_option_id = %id, quantity, reason = %err, "Purchase rejected");
                Err(err.into())
            }
            Err(err) => {
                tracing::error!(ticket_option_id = %id, quantity, error = %err, "Purchase failed");
                Err(err.into())
            }
        }
    }

    /// Read the current state of a ticket option.
    ///
    /// # Errors
    ///
    /// - `Validation`: invalid id
    /// - `NotFound`: no such option
    /// - `Store`: backend failure
    pub async fn get_ticket_option(&self, id: TicketOptionId) -> Result<TicketOption, ServiceError> {
        validate_id(id)?;
        self.store.get_ticket_option(id).await.map_err(|err| {
            if !matches!(err, StoreError::NotFound(_)) {
                tracing::error!(ticket_option_id = %id, error = %err, "Ticket option read failed");
            }
            ServiceError::from(err)
        })
    }
}
