//! Custom Axum extractors.
//!
//! Wrap the stock extractors so that every rejection renders through
//! [`AppError`] as a plain-text `400`:
//! - `AppJson`: JSON request body
//! - `OptionIdPath`: ticket option id from the `:id` path segment
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     OptionIdPath(id): OptionIdPath,
//!     AppJson(request): AppJson<PurchaseRequest>,
//! ) -> Result<StatusCode, AppError> {
//!     state.service.purchase_ticket(id, request).await?;
//!     Ok(StatusCode::OK)
//! }
//! ```

use crate::error::AppError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use ticket_inventory_core::TicketOptionId;

/// JSON body whose rejections (bad syntax, wrong content type, missing
/// fields) all map to `400 Bad Request`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Ticket option id taken from the `:id` path segment.
///
/// Only positive integers are accepted.
#[derive(Debug, Clone, Copy)]
pub struct OptionIdPath(pub TicketOptionId);

#[async_trait]
impl<S> FromRequestParts<S> for OptionIdPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await?;
        raw.parse::<TicketOptionId>()
            .map(Self)
            .map_err(|e| AppError::bad_request(e.to_string()))
    }
}
