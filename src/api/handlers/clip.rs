//! Clip handlers: submission, review, view updates and deletion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, put};
use axum::{Json, Router};

use crate::api::dto::{ReviewClipRequest, SubmitClipRequest, ViewCountRequest};
use crate::api::extract::ApiJson;
use crate::app_state::AppState;
use crate::domain::{CampaignId, Clip, ClipId, Identity};
use crate::error::{ErrorResponse, SettlementError};
use crate::service::ViewCountUpdate;

/// `POST /campaigns/{id}/clips`: Submit a clip.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidState`] if the campaign is not live.
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/clips",
    tag = "Clips",
    summary = "Submit a clip",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = SubmitClipRequest,
    responses(
        (status = 201, description = "Clip awaiting review", body = Clip),
        (status = 409, description = "Campaign not live", body = ErrorResponse),
    )
)]
pub async fn submit_clip(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<SubmitClipRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let clip = state
        .campaigns
        .submit_clip(&identity, CampaignId::from_uuid(id), &req.clip_url)
        .await?;
    Ok((StatusCode::CREATED, Json(clip)))
}

/// `GET /campaigns/{id}/clips`: Clips of a campaign.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] for brands that do not own the
/// campaign.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/clips",
    tag = "Clips",
    summary = "List clips",
    description = "Managers see every clip; creators see their own.",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Clips, oldest first", body = Vec<Clip>),
    )
)]
pub async fn list_clips(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(
        state
            .campaigns
            .campaign_clips(&identity, CampaignId::from_uuid(id))
            .await?,
    ))
}

/// `PATCH /clips/{id}/review`: Accept or reject a clip.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidState`] for clips already reviewed.
#[utoipa::path(
    patch,
    path = "/api/v1/clips/{id}/review",
    tag = "Clips",
    summary = "Review a clip",
    params(("id" = uuid::Uuid, Path, description = "Clip UUID")),
    request_body = ReviewClipRequest,
    responses(
        (status = 200, description = "Reviewed clip", body = Clip),
        (status = 409, description = "Already reviewed", body = ErrorResponse),
    )
)]
pub async fn review_clip(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<ReviewClipRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let clip = state
        .campaigns
        .review_clip(&identity, ClipId::from_uuid(id), req.into())
        .await?;
    Ok(Json(clip))
}

/// `PUT /clips/{id}/views`: Record polled views.
///
/// # Errors
///
/// Returns [`SettlementError::ClipNotFound`] for unknown clips.
#[utoipa::path(
    put,
    path = "/api/v1/clips/{id}/views",
    tag = "Clips",
    summary = "Update view count",
    params(("id" = uuid::Uuid, Path, description = "Clip UUID")),
    request_body = ViewCountRequest,
    responses(
        (status = 200, description = "Old and new counts", body = ViewCountUpdate),
        (status = 404, description = "Unknown clip", body = ErrorResponse),
    )
)]
pub async fn update_views(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<ViewCountRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let update = state
        .campaigns
        .update_clip_view_count(&identity, ClipId::from_uuid(id), req.view_count)
        .await?;
    Ok(Json(update))
}

/// `DELETE /clips/{id}`: Delete a clip.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidState`] once the creator has been
/// paid by the campaign.
#[utoipa::path(
    delete,
    path = "/api/v1/clips/{id}",
    tag = "Clips",
    summary = "Delete a clip",
    params(("id" = uuid::Uuid, Path, description = "Clip UUID")),
    responses(
        (status = 200, description = "Deleted clip", body = Clip),
        (status = 409, description = "Creator already paid", body = ErrorResponse),
    )
)]
pub async fn delete_clip(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let clip = state
        .campaigns
        .delete_clip(&identity, ClipId::from_uuid(id))
        .await?;
    Ok(Json(clip))
}

/// Clip routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns/{id}/clips", get(list_clips).post(submit_clip))
        .route("/clips/{id}", delete(delete_clip))
        .route("/clips/{id}/review", patch(review_clip))
        .route("/clips/{id}/views", put(update_views))
}
