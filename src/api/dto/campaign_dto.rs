//! Campaign, allocation and clip DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Campaign, ClipStatus, Money};
use crate::service::{ClipReview, NewCampaign};

/// Request body for `POST /campaigns`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    /// Display name.
    pub name: String,
    /// Social platform (e.g. `instagram`).
    #[serde(default)]
    pub platform: String,
    /// Spending target.
    pub budget: Money,
    /// Price per `view_threshold` views.
    pub cpv: Money,
    /// Views per payout milestone.
    pub view_threshold: u64,
    /// End of the submission window.
    pub deadline: DateTime<Utc>,
}

impl From<CreateCampaignRequest> for NewCampaign {
    fn from(req: CreateCampaignRequest) -> Self {
        Self {
            name: req.name,
            platform: req.platform,
            budget: req.budget,
            cpv: req.cpv,
            view_threshold: req.view_threshold,
            deadline: req.deadline,
        }
    }
}

/// Response body for campaign listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignListResponse {
    /// Campaigns, newest first.
    pub campaigns: Vec<Campaign>,
    /// Number of campaigns returned.
    pub count: usize,
}

/// Request body for `PATCH /campaigns/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    /// New activity flag.
    pub is_active: bool,
}

/// Request body for `PATCH /campaigns/{id}/deadline`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeadlineRequest {
    /// New submission deadline; must be in the future.
    pub deadline: DateTime<Utc>,
}

/// Request body for `PATCH /campaigns/{id}/view-threshold`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateViewThresholdRequest {
    /// New milestone size in views.
    pub view_threshold: u64,
}

/// Request body for `PATCH /campaigns/{id}/budget`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBudgetRequest {
    /// New spending target.
    pub budget: Money,
}

/// Request body for allocate and reclaim.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AmountRequest {
    /// Amount to move.
    pub amount: Money,
}

/// Query parameters for `GET /campaigns/{id}/earnings/{creator_id}`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EarningsQuery {
    /// Include the accepted clips in the response.
    #[serde(default)]
    pub include_clips: Option<bool>,
}

/// Request body for `POST /campaigns/{id}/clips`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitClipRequest {
    /// Public URL of the post.
    pub clip_url: String,
}

/// Request body for `PATCH /clips/{id}/review`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewClipRequest {
    /// `accepted` or `rejected`.
    pub status: ClipStatus,
    /// Reviewer feedback.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Platform media id of the accepted post.
    #[serde(default)]
    pub media_id: Option<String>,
    /// Caption of the accepted post.
    #[serde(default)]
    pub caption: Option<String>,
    /// When the accepted post went live.
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

impl From<ReviewClipRequest> for ClipReview {
    fn from(req: ReviewClipRequest) -> Self {
        Self {
            status: req.status,
            feedback: req.feedback,
            media_id: req.media_id,
            caption: req.caption,
            posted_at: req.posted_at,
        }
    }
}

/// Request body for `PUT /clips/{id}/views`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ViewCountRequest {
    /// Latest polled view count.
    pub view_count: u64,
}
