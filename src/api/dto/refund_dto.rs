//! Distribution and refund DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    ActorId, CampaignId, Money, RefundId, RefundStatus, RefundType, TransactionId,
};
use crate::service::{DistributionOrder, RefundApproval, RefundQuery};

/// Request body for `POST /distributions/bulk`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDistributeRequest {
    /// Orders applied independently, in order.
    pub distributions: Vec<DistributionOrder>,
}

/// Request body for `POST /refunds`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRefundRequest {
    /// Campaign to refund from.
    pub campaign_id: CampaignId,
    /// Amount wanted back.
    pub requested_amount: Money,
    /// Why the brand wants it back.
    pub reason: String,
    /// Request category. Defaults to `mid_campaign`.
    #[serde(default)]
    pub refund_type: Option<RefundType>,
}

/// Request body for `POST /refunds/{id}/approve`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveRefundRequest {
    /// Amount to credit; defaults to the requested amount.
    #[serde(default)]
    pub approved_amount: Option<Money>,
    /// Admin note.
    #[serde(default)]
    pub approval_reason: Option<String>,
}

/// Response body for `POST /refunds/{id}/approve`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApproveRefundResponse {
    /// Request approved.
    pub refund_id: RefundId,
    /// Final status (`completed`).
    pub status: RefundStatus,
    /// Amount credited.
    pub approved_amount: Money,
    /// `true` once the brand wallet was credited.
    pub brand_wallet_updated: bool,
    /// Brand balance afterwards.
    pub new_wallet_balance: Money,
    /// Refund ledger entry.
    pub transaction_id: Option<TransactionId>,
}

impl From<RefundApproval> for ApproveRefundResponse {
    fn from(approval: RefundApproval) -> Self {
        Self {
            refund_id: approval.request.refund_id,
            status: approval.request.status,
            approved_amount: approval.approved_amount,
            brand_wallet_updated: approval.brand_wallet_updated,
            new_wallet_balance: approval.new_wallet_balance,
            transaction_id: approval.request.transaction_id,
        }
    }
}

/// Request body for `POST /refunds/{id}/reject`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRefundRequest {
    /// Why the request was declined.
    pub rejection_reason: String,
}

/// Query parameters for refund listings and the audit trail.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RefundListQuery {
    /// Restrict to one brand (audit trail only).
    #[serde(default)]
    #[param(value_type = Option<String>, format = Uuid)]
    pub brand_id: Option<ActorId>,
    /// Restrict to one campaign.
    #[serde(default)]
    #[param(value_type = Option<String>, format = Uuid)]
    pub campaign_id: Option<CampaignId>,
    /// Restrict to one status.
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub status: Option<RefundStatus>,
    /// Page size (default 50, max 200).
    #[serde(default)]
    pub limit: Option<usize>,
    /// Entries to skip.
    #[serde(default)]
    pub offset: Option<usize>,
}

impl RefundListQuery {
    /// Service-level filter.
    #[must_use]
    pub fn filter(&self) -> RefundQuery {
        RefundQuery {
            brand_id: self.brand_id,
            campaign_id: self.campaign_id,
            status: self.status,
        }
    }
}
