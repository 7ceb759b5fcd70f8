//! Router assembly.

use crate::handlers::{health, ticket_options};
use crate::state::AppState;
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Per-request budget used by [`router`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the full HTTP router with [`DEFAULT_REQUEST_TIMEOUT`].
///
/// Routes:
/// - `GET /-/health`
/// - `GET /-/ready`
/// - `POST /ticket_options`
/// - `POST /ticket_options/:id/purchases`
/// - `GET /ticket/:id`
pub fn router(state: AppState) -> Router {
    router_with_timeout(state, DEFAULT_REQUEST_TIMEOUT)
}

/// Build the full HTTP router.
///
/// A request that has not produced a response within `request_timeout`,
/// body upload included, is answered with `408 Request Timeout`.
pub fn router_with_timeout(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/-/health", get(health::health))
        .route("/-/ready", get(health::ready))
        .route("/ticket_options", post(ticket_options::create_ticket_option))
        .route(
            "/ticket_options/:id/purchases",
            post(ticket_options::purchase_ticket),
        )
        .route("/ticket/:id", get(ticket_options::get_ticket_option))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
