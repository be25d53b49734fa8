//! REST endpoint handlers organized by resource.

pub mod campaign;
pub mod clip;
pub mod settlement;
pub mod system;
pub mod wallet;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(wallet::routes())
        .merge(campaign::routes())
        .merge(clip::routes())
        .merge(settlement::routes())
}
