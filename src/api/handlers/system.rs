//! System endpoints: health check and settlement parameters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Settlement parameters clients need to preview payouts.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementParams {
    commission_bps: u16,
    currency: String,
}

/// `GET /config/settlement`: Commission rate and currency.
#[utoipa::path(
    get,
    path = "/config/settlement",
    tag = "System",
    summary = "Settlement parameters",
    description = "Returns the configured platform commission (basis points) and display currency.",
    responses(
        (status = 200, description = "Settlement parameters", body = SettlementParams),
    )
)]
pub async fn settlement_params_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(SettlementParams {
        commission_bps: state.calculator.rate().bps(),
        currency: state.currency.to_string(),
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/settlement", get(settlement_params_handler))
}
