//! Distribution and refund request handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ApproveRefundRequest, ApproveRefundResponse, BulkDistributeRequest, CreateRefundRequest,
    RefundListQuery, RejectRefundRequest,
};
use crate::api::extract::{ApiJson, ApiQuery};
use crate::app_state::AppState;
use crate::domain::{Identity, RefundId, RefundRequest, RefundType};
use crate::error::{ErrorResponse, SettlementError};
use crate::service::{
    BulkDistribution, DistributionOrder, DistributionResult, RefundAuditTrail, RefundPage,
    RefundStatusView,
};

/// `POST /distributions`: Pay a creator what a campaign owes them.
///
/// # Errors
///
/// Returns [`SettlementError::NothingToDistribute`] or
/// [`SettlementError::InsufficientCampaignFunds`].
#[utoipa::path(
    post,
    path = "/api/v1/distributions",
    tag = "Distributions",
    summary = "Distribute to creator",
    description = "Recomputes earnings from the supplied view count and the campaign's stored terms, then credits the creator share and books the platform commission.",
    request_body = DistributionOrder,
    responses(
        (status = 200, description = "Payout applied", body = DistributionResult),
        (status = 409, description = "Nothing to distribute", body = ErrorResponse),
        (status = 422, description = "Insufficient campaign funds", body = ErrorResponse),
    )
)]
pub async fn distribute(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(order): ApiJson<DistributionOrder>,
) -> Result<impl IntoResponse, SettlementError> {
    let result = state
        .settlement
        .distribute_to_creator(&identity, &order)
        .await?;
    Ok(Json(result))
}

/// `POST /distributions/bulk`: Apply many distributions independently.
///
/// # Errors
///
/// Only fails on a malformed request; per-item failures are reported in
/// the body.
#[utoipa::path(
    post,
    path = "/api/v1/distributions/bulk",
    tag = "Distributions",
    summary = "Bulk distribute",
    request_body = BulkDistributeRequest,
    responses(
        (status = 200, description = "Per-item results and totals", body = BulkDistribution),
    )
)]
pub async fn bulk_distribute(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<BulkDistributeRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    if req.distributions.is_empty() {
        return Err(SettlementError::InvalidRequest(
            "distributions must not be empty".to_string(),
        ));
    }
    Ok(Json(
        state
            .settlement
            .bulk_distribute(&identity, &req.distributions)
            .await,
    ))
}

/// `POST /refunds`: File a refund request.
///
/// # Errors
///
/// Returns [`SettlementError::ExceedsRefundable`] above the refundable
/// amount.
#[utoipa::path(
    post,
    path = "/api/v1/refunds",
    tag = "Refunds",
    summary = "Request a refund",
    request_body = CreateRefundRequest,
    responses(
        (status = 201, description = "Pending request", body = RefundRequest),
        (status = 422, description = "Exceeds refundable", body = ErrorResponse),
    )
)]
pub async fn request_refund(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<CreateRefundRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let request = state
        .settlement
        .request_refund(
            &identity,
            req.campaign_id,
            req.requested_amount,
            &req.reason,
            req.refund_type.unwrap_or(RefundType::MidCampaign),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /refunds`: Refund requests visible to the caller.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] for creators.
#[utoipa::path(
    get,
    path = "/api/v1/refunds",
    tag = "Refunds",
    summary = "List refund requests",
    params(RefundListQuery),
    responses(
        (status = 200, description = "One page of requests", body = RefundPage),
    )
)]
pub async fn list_refunds(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<RefundListQuery>,
) -> Result<impl IntoResponse, SettlementError> {
    let page = state
        .settlement
        .list_refund_requests(
            &identity,
            query.filter(),
            query.limit,
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(page))
}

/// `GET /refunds/audit`: Admin audit trail.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] for non-admin callers.
#[utoipa::path(
    get,
    path = "/api/v1/refunds/audit",
    tag = "Refunds",
    summary = "Refund audit trail",
    params(RefundListQuery),
    responses(
        (status = 200, description = "Requests with totals", body = RefundAuditTrail),
        (status = 403, description = "Admins only", body = ErrorResponse),
    )
)]
pub async fn refund_audit_trail(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<RefundListQuery>,
) -> Result<impl IntoResponse, SettlementError> {
    let trail = state
        .settlement
        .refund_audit_trail(
            &identity,
            query.filter(),
            query.limit,
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(trail))
}

/// `GET /refunds/{id}`: Request status with timeline.
///
/// # Errors
///
/// Returns [`SettlementError::RefundNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/refunds/{id}",
    tag = "Refunds",
    summary = "Refund status",
    params(("id" = uuid::Uuid, Path, description = "Refund request UUID")),
    responses(
        (status = 200, description = "Request and timeline", body = RefundStatusView),
        (status = 404, description = "Unknown request", body = ErrorResponse),
    )
)]
pub async fn refund_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(
        state
            .settlement
            .refund_status(&identity, RefundId::from_uuid(id))
            .await?,
    ))
}

/// `POST /refunds/{id}/approve`: Approve and credit the brand.
///
/// # Errors
///
/// Returns [`SettlementError::ExceedsRefundable`] if the amount no longer
/// fits the pool.
#[utoipa::path(
    post,
    path = "/api/v1/refunds/{id}/approve",
    tag = "Refunds",
    summary = "Approve a refund",
    params(("id" = uuid::Uuid, Path, description = "Refund request UUID")),
    request_body = ApproveRefundRequest,
    responses(
        (status = 200, description = "Refund completed", body = ApproveRefundResponse),
        (status = 409, description = "Request not pending", body = ErrorResponse),
        (status = 422, description = "Exceeds refundable", body = ErrorResponse),
    )
)]
pub async fn approve_refund(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    body: Option<ApiJson<ApproveRefundRequest>>,
) -> Result<impl IntoResponse, SettlementError> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let approval = state
        .settlement
        .approve_refund(
            &identity,
            RefundId::from_uuid(id),
            req.approved_amount,
            req.approval_reason,
        )
        .await?;
    Ok(Json(ApproveRefundResponse::from(approval)))
}

/// `POST /refunds/{id}/reject`: Decline a request.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidRequest`] without a reason.
#[utoipa::path(
    post,
    path = "/api/v1/refunds/{id}/reject",
    tag = "Refunds",
    summary = "Reject a refund",
    params(("id" = uuid::Uuid, Path, description = "Refund request UUID")),
    request_body = RejectRefundRequest,
    responses(
        (status = 200, description = "Request rejected", body = RefundRequest),
        (status = 409, description = "Request not pending", body = ErrorResponse),
    )
)]
pub async fn reject_refund(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<RejectRefundRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let request = state
        .settlement
        .reject_refund(&identity, RefundId::from_uuid(id), &req.rejection_reason)
        .await?;
    Ok(Json(request))
}

/// Distribution and refund routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/distributions", post(distribute))
        .route("/distributions/bulk", post(bulk_distribute))
        .route("/refunds", post(request_refund).get(list_refunds))
        .route("/refunds/audit", get(refund_audit_trail))
        .route("/refunds/{id}", get(refund_status))
        .route("/refunds/{id}/approve", post(approve_refund))
        .route("/refunds/{id}/reject", post(reject_refund))
}
