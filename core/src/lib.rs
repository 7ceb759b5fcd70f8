//! # Ticket Inventory Core
//!
//! Core types and ports for the ticket inventory service.
//!
//! Callers register ticket options with a name, description and allocation;
//! buyers purchase quantities against an option, decrementing its remaining
//! allocation; anyone can read the current state of an option.
//!
//! ## Components
//!
//! - [`ticket`]: `TicketOption`, `Purchase` and request types
//! - [`inventory_store`]: The `InventoryStore` port and its consistency contract
//! - [`allocation`]: `AllocationService`, validation and error translation
//!
//! ## Data Flow
//!
//! ```text
//! Request Gateway → AllocationService → InventoryStore → PostgreSQL
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use ticket_inventory_core::{AllocationService, NewTicketOption, PurchaseRequest};
//!
//! let service = AllocationService::new(store);
//! let option = service
//!     .create_ticket_option(NewTicketOption::new("GA", "General", 100))
//!     .await?;
//! service
//!     .purchase_ticket(option.id, PurchaseRequest { quantity: 2, user_id: "u-1".into() })
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocation;
pub mod inventory_store;
pub mod ticket;

pub use allocation::{AllocationService, ServiceError};
pub use inventory_store::{InventoryStore, StoreError, StoreFuture};
pub use ticket::{NewTicketOption, Purchase, PurchaseRequest, TicketOption, TicketOptionId};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
