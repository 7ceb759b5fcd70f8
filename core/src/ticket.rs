//! Ticket option and purchase types.
//!
//! A [`TicketOption`] is a named pool of sellable units. Its `allocation` is the
//! count of units still available and is never negative once a transaction has
//! committed. A [`Purchase`] is the immutable record of units taken from an option.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `TicketOptionId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid ticket option id: {0}")]
pub struct ParseTicketOptionIdError(String);

/// Surrogate key of a ticket option, assigned by the store on creation.
///
/// Serialized as a bare integer so JSON bodies read `"id": 7`.
///
/// # Validation
///
/// - `FromStr::from_str()`: Rejects anything that is not a positive integer
/// - `new()`: No validation (for ids coming back from the store)
///
/// # Examples
///
/// ```
/// use ticket_inventory_core::ticket::TicketOptionId;
///
/// let id: TicketOptionId = "42".parse().unwrap();
/// assert_eq!(id.get(), 42);
/// assert!("0".parse::<TicketOptionId>().is_err());
/// assert!("abc".parse::<TicketOptionId>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketOptionId(i32);

impl TicketOptionId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// The raw integer value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Whether the id could have been assigned by a store (ids start at 1).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for TicketOptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketOptionId {
    type Err = ParseTicketOptionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i32>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(ParseTicketOptionIdError(s.to_string())),
        }
    }
}

impl From<i32> for TicketOptionId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Current state of a ticket option.
///
/// ```json
/// {"id": 1, "name": "GA", "desc": "General admission", "allocation": 100}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOption {
    /// Store-assigned id
    pub id: TicketOptionId,
    /// Display label, also the natural key used by upserts
    pub name: String,
    /// Free text, may be empty
    pub desc: String,
    /// Units still available for purchase
    pub allocation: i32,
}

/// Input to an upsert: create the option, or restock it if the name exists.
///
/// ```json
/// {"name": "GA", "desc": "General admission", "allocation": 100}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicketOption {
    /// Natural key
    pub name: String,
    /// Description, only used when the option is created
    #[serde(default)]
    pub desc: String,
    /// Units to add
    pub allocation: i32,
}

impl NewTicketOption {
    /// Build an upsert request.
    #[must_use]
    pub fn new(name: impl Into<String>, desc: impl Into<String>, allocation: i32) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            allocation,
        }
    }
}

/// Body of a purchase request. The option id comes from the request path.
///
/// ```json
/// {"quantity": 2, "user_id": "406c1d05-bbb2-4e94-b183-7d208c2692e1"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Units to buy
    pub quantity: i32,
    /// Opaque buyer identifier, stored as given. Missing means empty.
    #[serde(default)]
    pub user_id: String,
}

/// A committed purchase. Never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Option the units were taken from
    pub ticket_option_id: TicketOptionId,
    /// Units bought, always positive
    pub quantity: i32,
    /// Buyer
    pub user_id: String,
    /// Assigned by the store at commit
    pub created_at: DateTime<Utc>,
}
