//! Campaign handlers: lifecycle, pool funding, refunds and reporting.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{
    AmountRequest, CampaignListResponse, CreateCampaignRequest, EarningsQuery, SetActiveRequest,
    UpdateBudgetRequest, UpdateDeadlineRequest, UpdateViewThresholdRequest,
};
use crate::api::extract::{ApiJson, ApiQuery};
use crate::app_state::AppState;
use crate::domain::{ActorId, Campaign, CampaignId, Identity};
use crate::error::{ErrorResponse, SettlementError};
use crate::service::{
    CampaignDeletion, CampaignPerformance, CampaignRefund, CampaignSummary, EarningsReport,
    FundsMovement, PendingPayouts,
};

/// `POST /campaigns`: Create a campaign.
///
/// # Errors
///
/// Returns [`SettlementError`] for non-brand callers or invalid terms.
#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    tag = "Campaigns",
    summary = "Create a campaign",
    description = "Creates an active campaign owned by the calling brand with an empty pool.",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = Campaign),
        (status = 400, description = "Invalid terms", body = ErrorResponse),
    )
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<CreateCampaignRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let campaign = state
        .campaigns
        .create_campaign(&identity, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `GET /campaigns`: Campaigns visible to the caller.
///
/// # Errors
///
/// Returns [`SettlementError::Unauthenticated`] without identity headers.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    tag = "Campaigns",
    summary = "List campaigns",
    description = "Brands see their own campaigns, creators see campaigns open for submissions, admins see all.",
    responses(
        (status = 200, description = "Campaigns", body = CampaignListResponse),
    )
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, SettlementError> {
    let campaigns = state.campaigns.list_campaigns(&identity).await;
    Ok(Json(CampaignListResponse {
        count: campaigns.len(),
        campaigns,
    }))
}

/// `GET /campaigns/{id}`: Campaign details.
///
/// # Errors
///
/// Returns [`SettlementError::CampaignNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}",
    tag = "Campaigns",
    summary = "Get a campaign",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Campaign", body = Campaign),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
    )
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(
        state
            .campaigns
            .get_campaign(CampaignId::from_uuid(id))
            .await?,
    ))
}

/// `PATCH /campaigns/{id}/status`: Activate or deactivate.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller owns the
/// campaign.
#[utoipa::path(
    patch,
    path = "/api/v1/campaigns/{id}/status",
    tag = "Campaigns",
    summary = "Set campaign activity",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Updated campaign", body = Campaign),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn set_active(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<SetActiveRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let campaign = state
        .campaigns
        .set_active(&identity, CampaignId::from_uuid(id), req.is_active)
        .await?;
    Ok(Json(campaign))
}

/// `PATCH /campaigns/{id}/deadline`: Move the submission deadline.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller owns the
/// campaign, or [`SettlementError::InvalidRequest`] for a past deadline.
#[utoipa::path(
    patch,
    path = "/api/v1/campaigns/{id}/deadline",
    tag = "Campaigns",
    summary = "Update deadline",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = UpdateDeadlineRequest,
    responses(
        (status = 200, description = "Updated campaign", body = Campaign),
        (status = 400, description = "Deadline not in the future", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn update_deadline(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<UpdateDeadlineRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let campaign = state
        .campaigns
        .update_deadline(&identity, CampaignId::from_uuid(id), req.deadline)
        .await?;
    Ok(Json(campaign))
}

/// `PATCH /campaigns/{id}/view-threshold`: Change the milestone size.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller owns the
/// campaign, or [`SettlementError::InvalidRequest`] for a zero threshold.
#[utoipa::path(
    patch,
    path = "/api/v1/campaigns/{id}/view-threshold",
    tag = "Campaigns",
    summary = "Update view threshold",
    description = "Applies to distributions made after the change.",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = UpdateViewThresholdRequest,
    responses(
        (status = 200, description = "Updated campaign", body = Campaign),
        (status = 400, description = "Zero threshold", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn update_view_threshold(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<UpdateViewThresholdRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let campaign = state
        .campaigns
        .update_view_threshold(&identity, CampaignId::from_uuid(id), req.view_threshold)
        .await?;
    Ok(Json(campaign))
}

/// `PATCH /campaigns/{id}/budget`: Change the spending target.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller owns the
/// campaign, or [`SettlementError::InvalidAmount`] for a zero budget.
#[utoipa::path(
    patch,
    path = "/api/v1/campaigns/{id}/budget",
    tag = "Campaigns",
    summary = "Update budget",
    description = "The budget is a target; allocated funds are not moved.",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = UpdateBudgetRequest,
    responses(
        (status = 200, description = "Updated campaign", body = Campaign),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn update_budget(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<UpdateBudgetRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let campaign = state
        .campaigns
        .update_budget(&identity, CampaignId::from_uuid(id), req.budget)
        .await?;
    Ok(Json(campaign))
}

/// `POST /campaigns/{id}/view-count/recompute`: Re-sum accepted clip views.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller is the owning
/// brand or an admin.
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/view-count/recompute",
    tag = "Campaigns",
    summary = "Recompute view count",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Updated campaign", body = Campaign),
        (status = 403, description = "Not a manager", body = ErrorResponse),
    )
)]
pub async fn recompute_view_count(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let campaign = state
        .campaigns
        .recompute_view_count(&identity, CampaignId::from_uuid(id))
        .await?;
    Ok(Json(campaign))
}

/// `DELETE /campaigns/{id}`: Refund the pool, then delete.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller is the owning
/// brand or an admin, or [`SettlementError::CampaignLive`] for a brand
/// while the campaign is live.
#[utoipa::path(
    delete,
    path = "/api/v1/campaigns/{id}",
    tag = "Campaigns",
    summary = "Delete a campaign",
    description = "Returns the undistributed pool to the brand wallet and removes the campaign with its clips. Brands must wait until the campaign is no longer live.",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Campaign deleted", body = CampaignDeletion),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
        (status = 409, description = "Campaign is live", body = ErrorResponse),
    )
)]
pub async fn delete_campaign(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let deletion = state
        .campaigns
        .delete_campaign(&identity, CampaignId::from_uuid(id))
        .await?;
    Ok(Json(deletion))
}

/// `POST /campaigns/{id}/allocate`: Move funds into the pool.
///
/// # Errors
///
/// Returns [`SettlementError::InsufficientFunds`],
/// [`SettlementError::InvalidAmount`] or [`SettlementError::Forbidden`].
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/allocate",
    tag = "Campaign Funds",
    summary = "Allocate budget",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Funds allocated", body = FundsMovement),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 422, description = "Insufficient funds", body = ErrorResponse),
    )
)]
pub async fn allocate(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<AmountRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let movement = state
        .allocator
        .allocate(&identity, CampaignId::from_uuid(id), req.amount)
        .await?;
    Ok(Json(movement))
}

/// `POST /campaigns/{id}/reclaim`: Move unused funds back to the wallet.
///
/// # Errors
///
/// Returns [`SettlementError::OverReclaim`] or
/// [`SettlementError::CampaignLive`].
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/reclaim",
    tag = "Campaign Funds",
    summary = "Reclaim budget",
    description = "Refused while the campaign is active and before its deadline.",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Funds reclaimed", body = FundsMovement),
        (status = 409, description = "Campaign is live", body = ErrorResponse),
        (status = 422, description = "Exceeds refundable", body = ErrorResponse),
    )
)]
pub async fn reclaim(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<AmountRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let movement = state
        .allocator
        .reclaim(&identity, CampaignId::from_uuid(id), req.amount)
        .await?;
    Ok(Json(movement))
}

/// `POST /campaigns/{id}/refund`: Return the whole undistributed pool.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller is the owning
/// brand or an admin, or [`SettlementError::CampaignLive`] for a brand
/// while the campaign is live.
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/refund",
    tag = "Campaign Funds",
    summary = "Refund campaign",
    description = "Credits `funds_allocated - funds_distributed` back to the brand. A no-op when nothing is refundable.",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Refund result", body = CampaignRefund),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
        (status = 409, description = "Campaign is live", body = ErrorResponse),
    )
)]
pub async fn refund_campaign(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let refund = state
        .settlement
        .refund_campaign(&identity, CampaignId::from_uuid(id))
        .await?;
    Ok(Json(refund))
}

/// `GET /campaigns/{id}/summary`: Financial snapshot.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller manages the
/// campaign.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/summary",
    tag = "Reports",
    summary = "Campaign summary",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Summary", body = CampaignSummary),
    )
)]
pub async fn campaign_summary(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(
        state
            .campaigns
            .campaign_summary(&identity, CampaignId::from_uuid(id))
            .await?,
    ))
}

/// `GET /campaigns/{id}/earnings/{creator_id}`: Earnings breakdown.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller is the creator,
/// the owning brand or an admin.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/earnings/{creator_id}",
    tag = "Reports",
    summary = "Calculate earnings",
    description = "Milestone-based earnings of one creator, with the commission split and what is still pending.",
    params(
        ("id" = uuid::Uuid, Path, description = "Campaign UUID"),
        ("creator_id" = uuid::Uuid, Path, description = "Creator UUID"),
        EarningsQuery,
    ),
    responses(
        (status = 200, description = "Earnings", body = EarningsReport),
    )
)]
pub async fn calculate_earnings(
    State(state): State<AppState>,
    identity: Identity,
    Path((id, creator_id)): Path<(uuid::Uuid, uuid::Uuid)>,
    ApiQuery(query): ApiQuery<EarningsQuery>,
) -> Result<impl IntoResponse, SettlementError> {
    let report = state
        .calculator
        .calculate_earnings(
            &identity,
            CampaignId::from_uuid(id),
            ActorId::from_uuid(creator_id),
            query.include_clips.unwrap_or(false),
        )
        .await?;
    Ok(Json(report))
}

/// `GET /campaigns/{id}/pending-payouts`: Creators still owed money.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller manages the
/// campaign.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/pending-payouts",
    tag = "Reports",
    summary = "Pending payouts",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Pending payouts", body = PendingPayouts),
    )
)]
pub async fn pending_payouts(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(
        state
            .calculator
            .pending_payouts(&identity, CampaignId::from_uuid(id))
            .await?,
    ))
}

/// `GET /campaigns/{id}/performance`: Campaign performance report.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller manages the
/// campaign.
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/performance",
    tag = "Reports",
    summary = "Campaign performance",
    params(("id" = uuid::Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Performance", body = CampaignPerformance),
    )
)]
pub async fn campaign_performance(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(
        state
            .calculator
            .campaign_performance(&identity, CampaignId::from_uuid(id))
            .await?,
    ))
}

/// Campaign routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", post(create_campaign).get(list_campaigns))
        .route("/campaigns/{id}", get(get_campaign).delete(delete_campaign))
        .route("/campaigns/{id}/status", patch(set_active))
        .route("/campaigns/{id}/deadline", patch(update_deadline))
        .route("/campaigns/{id}/view-threshold", patch(update_view_threshold))
        .route("/campaigns/{id}/budget", patch(update_budget))
        .route(
            "/campaigns/{id}/view-count/recompute",
            post(recompute_view_count),
        )
        .route("/campaigns/{id}/allocate", post(allocate))
        .route("/campaigns/{id}/reclaim", post(reclaim))
        .route("/campaigns/{id}/refund", post(refund_campaign))
        .route("/campaigns/{id}/summary", get(campaign_summary))
        .route("/campaigns/{id}/pending-payouts", get(pending_payouts))
        .route("/campaigns/{id}/performance", get(campaign_performance))
        .route(
            "/campaigns/{id}/earnings/{creator_id}",
            get(calculate_earnings),
        )
}
