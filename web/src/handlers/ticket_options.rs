//! Ticket option and purchase endpoints.

use crate::error::AppError;
use crate::extractors::{AppJson, OptionIdPath};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use ticket_inventory_core::{NewTicketOption, PurchaseRequest, TicketOption};

/// Create a ticket option, or add to its allocation if the name exists.
///
/// ```text
/// POST /ticket_options
/// {"name": "GA", "desc": "General admission", "allocation": 100}
/// ```
///
/// # Errors
///
/// `400` for a malformed body or failed validation, `500` on store failure.
pub async fn create_ticket_option(
    State(state): State<AppState>,
    AppJson(request): AppJson<NewTicketOption>,
) -> Result<Json<TicketOption>, AppError> {
    let option = state.service.create_ticket_option(request).await?;
    Ok(Json(option))
}

/// Buy tickets from an option. Success has an empty body.
///
/// ```text
/// POST /ticket_options/:id/purchases
/// {"quantity": 2, "user_id": "406c1d05-bbb2-4e94-b183-7d208c2692e1"}
/// ```
///
/// # Errors
///
/// `400` for bad input, `404` for an unknown option, `409` when there are not
/// enough tickets left, `500` on store failure.
pub async fn purchase_ticket(
    State(state): State<AppState>,
    OptionIdPath(id): OptionIdPath,
    AppJson(request): AppJson<PurchaseRequest>,
) -> Result<StatusCode, AppError> {
    state.service.purchase_ticket(id, request).await?;
    Ok(StatusCode::OK)
}

/// Read the current state of an option.
///
/// ```text
/// GET /ticket/:id
/// ```
///
/// # Errors
///
/// `400` for a non-numeric id, `404` for an unknown option.
pub async fn get_ticket_option(
    State(state): State<AppState>,
    OptionIdPath(id): OptionIdPath,
) -> Result<Json<TicketOption>, AppError> {
    let option = state.service.get_ticket_option(id).await?;
    Ok(Json(option))
}
