//! Health check endpoints.
//!
//! `/-/health` is the liveness probe: it reports the status map kept in the
//! [`HealthRegistry`](ticket_inventory_runtime::HealthRegistry) and does not
//! touch the database. `/-/ready` additionally pings the store.

use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ticket_inventory_runtime::HealthReport;

/// Liveness probe.
///
/// # Endpoint
///
/// ```text
/// GET /-/health
/// ```
///
/// # Response
///
/// `200` with the status map while serving:
///
/// ```json
/// {
///   "http": "OK: 2024-05-01T10:00:00Z",
///   "version": "ticket-inventory@0.1.0"
/// }
/// ```
///
/// `503` with a plain-text notice once shutdown has begun.
#[allow(clippy::unused_async)]
pub async fn health(State(state): State<AppState>) -> Response {
    match state.health.report() {
        HealthReport::Live(entries) => (StatusCode::OK, Json(entries)).into_response(),
        HealthReport::ShuttingDown(notice) => {
            (StatusCode::SERVICE_UNAVAILABLE, notice).into_response()
        }
    }
}

/// Readiness probe: can this instance serve ticket requests right now?
///
/// # Status Codes
///
/// - 200 OK: store reachable and not shutting down
/// - 503 Service Unavailable: otherwise
pub async fn ready(State(state): State<AppState>) -> (StatusCode, String) {
    if state.health.is_shutting_down() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "server is shutting down".to_string(),
        );
    }

    match state.service.store().ping().await {
        Ok(()) => (StatusCode::OK, "ready".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}
