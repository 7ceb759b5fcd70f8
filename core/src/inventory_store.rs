//! Inventory store trait and related types.
//!
//! This module defines the persistence port of the system: durable,
//! consistency-preserving access to ticket options and purchases.
//!
//! # Consistency Contract
//!
//! Every implementation must guarantee, for each ticket option, that the sum of
//! committed purchase quantities never exceeds the sum of allocation added to it.
//! Concretely:
//!
//! - [`InventoryStore::upsert_ticket_option`] is a single atomic
//!   insert-or-increment keyed on the option name. Two concurrent upserts for a
//!   brand-new name produce one row.
//! - [`InventoryStore::purchase_ticket`] runs read, check, insert and decrement
//!   in one transaction that is serializable with respect to every other
//!   purchase or upsert on the same option. A rejected purchase writes nothing.
//! - [`InventoryStore::get_ticket_option`] reads the latest committed state.
//!
//! # Implementations
//!
//! - `PostgresInventoryStore` (in `ticket-inventory-postgres`): row-locking
//!   transactions with bounded retry on write conflicts
//! - `InMemoryInventoryStore` (in `ticket-inventory-testing`): deterministic
//!   tests and failure injection

use crate::ticket::{NewTicketOption, Purchase, TicketOption, TicketOptionId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`InventoryStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during inventory store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No ticket option exists with the given id.
    #[error("ticket option {0} not found")]
    NotFound(TicketOptionId),

    /// The option does not have enough allocation left for the purchase.
    ///
    /// This is a business-rule rejection, not a system fault. The transaction
    /// was rolled back and no purchase was recorded.
    #[error("not enough tickets available for option {id}: requested {requested}, available {available}")]
    InsufficientAllocation {
        /// The option that was short.
        id: TicketOptionId,
        /// Units asked for.
        requested: i32,
        /// Units left at the time of the check.
        available: i32,
    },

    /// A concurrent transaction modified the same row; the operation may be retried.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Backend I/O or query failure.
    #[error("database error: {0}")]
    Database(String),

    /// The operation kept conflicting until the retry budget ran out.
    #[error("transaction failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Total attempts made, including the first.
        attempts: usize,
        /// Error reported by the final attempt.
        last_error: String,
    },

    /// The store has been closed during shutdown.
    #[error("inventory store is closed")]
    Closed,
}

impl StoreError {
    /// Whether retrying the whole transaction may succeed.
    ///
    /// Only write conflicts are retryable. Business rejections and plain
    /// database errors are surfaced immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Persistence port for ticket options and purchases.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store instance is shared by all
/// request handlers.
///
/// # Dyn Compatibility
///
/// Methods return [`StoreFuture`] instead of using `async fn` so the store can
/// be held as `Arc<dyn InventoryStore>` by the service and the supervisor.
pub trait InventoryStore: Send + Sync {
    /// Create a ticket option, or add to its allocation if the name exists.
    ///
    /// The description of an existing option is left unchanged. The returned
    /// option reflects the state after the delta was applied.
    ///
    /// # Errors
    ///
    /// - `Database`: Backend failure, surfaced untranslated, not retried
    /// - `Closed`: The store was closed
    fn upsert_ticket_option(&self, option: NewTicketOption) -> StoreFuture<'_, TicketOption>;

    /// Buy `quantity` units of a ticket option on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: No option with this id
    /// - `InsufficientAllocation`: Fewer than `quantity` units left; nothing written
    /// - `RetriesExhausted`: Commit kept conflicting with concurrent buyers
    /// - `Database`: Backend failure
    /// - `Closed`: The store was closed
    fn purchase_ticket(
        &self,
        id: TicketOptionId,
        quantity: i32,
        user_id: String,
    ) -> StoreFuture<'_, Purchase>;

    /// Read the latest committed state of a ticket option.
    ///
    /// # Errors
    ///
    /// - `NotFound`: No option with this id
    /// - `Database`: Backend failure
    /// - `Closed`: The store was closed
    fn get_ticket_option(&self, id: TicketOptionId) -> StoreFuture<'_, TicketOption>;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `Database` or `Closed` when the backend cannot serve requests.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// Release backend resources. Safe to call more than once.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(StoreError::Conflict("row changed".into()).is_retryable());
        assert!(!StoreError::Database("connection reset".into()).is_retryable());
        assert!(!StoreError::NotFound(TicketOptionId::new(1)).is_retryable());
        assert!(!StoreError::Closed.is_retryable());
        assert!(
            !StoreError::InsufficientAllocation {
                id: TicketOptionId::new(1),
                requested: 5,
                available: 3,
            }
            .is_retryable()
        );
    }

    #[test]
    fn insufficient_allocation_message_names_the_numbers() {
        let err = StoreError::InsufficientAllocation {
            id: TicketOptionId::new(9),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "not enough tickets available for option 9: requested 5, available 3"
        );
    }
}
