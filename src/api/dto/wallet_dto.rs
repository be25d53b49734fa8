//! Wallet, withdrawal and payout detail DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    ActorId, ActorKind, CampaignId, Money, PayoutDetails, PayoutFields, PayoutMethod, Transaction,
    TransactionPage, TransactionStatus, TransactionType,
};
use crate::error::SettlementError;
use crate::service::GatewayOutcome;

/// Response body for balance queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Wallet owner type.
    pub user_type: ActorKind,
    /// Wallet owner id.
    pub user_id: ActorId,
    /// Current balance.
    pub balance: Money,
    /// Display currency code.
    pub currency: String,
}

/// Request body for `POST /wallet/deposits`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Amount confirmed by the payment gateway.
    pub amount: Money,
    /// Gateway payment id; repeated confirmations are ignored.
    pub external_txn_id: String,
}

/// Request body for `POST /wallet/withdrawals`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    /// Amount to withdraw.
    pub amount: Money,
    /// Destination kind.
    pub payout_method: PayoutMethod,
    /// Destination details; missing ones fall back to saved details.
    #[serde(flatten)]
    pub fields: PayoutFields,
}

/// Gateway verdict carried by a settlement callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementVerdict {
    /// Transfer completed.
    Success,
    /// Transfer rejected.
    Failed,
}

/// Request body for `POST /wallet/withdrawals/{id}/settle`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SettleWithdrawalRequest {
    /// Gateway verdict.
    pub status: SettlementVerdict,
    /// Bank reference, required on success.
    #[serde(default)]
    pub utr: Option<String>,
    /// Failure reason, required on failure.
    #[serde(default)]
    pub reason: Option<String>,
}

impl TryFrom<SettleWithdrawalRequest> for GatewayOutcome {
    type Error = SettlementError;

    fn try_from(req: SettleWithdrawalRequest) -> Result<Self, Self::Error> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match req.status {
            SettlementVerdict::Success => non_blank(req.utr)
                .map(|utr| Self::Success { utr })
                .ok_or_else(|| {
                    SettlementError::InvalidRequest("utr is required on success".to_string())
                }),
            SettlementVerdict::Failed => non_blank(req.reason)
                .map(|reason| Self::Failed { reason })
                .ok_or_else(|| {
                    SettlementError::InvalidRequest("reason is required on failure".to_string())
                }),
        }
    }
}

/// Query parameters for transaction history.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    /// Restrict to one campaign.
    #[serde(default)]
    #[param(value_type = Option<String>, format = Uuid)]
    pub campaign_id: Option<CampaignId>,
    /// Restrict to one entry kind.
    #[serde(default, rename = "type")]
    #[param(rename = "type", value_type = Option<String>)]
    pub txn_type: Option<TransactionType>,
    /// Restrict to one status.
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub status: Option<TransactionStatus>,
    /// Page size (default 50, max 200).
    #[serde(default)]
    pub limit: Option<usize>,
    /// Entries to skip.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Query parameters for withdrawal history.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WithdrawalQuery {
    /// Restrict to one status.
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub status: Option<TransactionStatus>,
    /// Page size (default 50, max 200).
    #[serde(default)]
    pub limit: Option<usize>,
    /// Entries to skip.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// One page of ledger entries.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Entries on this page, newest first.
    pub transactions: Vec<Transaction>,
    /// Entries on this page.
    pub count: usize,
    /// Matching entries across all pages.
    pub total: usize,
    /// Entries skipped.
    pub offset: usize,
}

impl TransactionListResponse {
    /// Wraps a page returned by the ledger.
    #[must_use]
    pub fn from_page(page: TransactionPage, offset: usize) -> Self {
        Self {
            count: page.transactions.len(),
            transactions: page.transactions,
            total: page.total,
            offset,
        }
    }
}

/// Request body for `PUT /wallet/payout-details`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SavePayoutDetailsRequest {
    /// Destination kind.
    pub payout_method: PayoutMethod,
    /// Destination details.
    #[serde(flatten)]
    pub fields: PayoutFields,
}

/// Response body for `GET /wallet/payout-details`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutDetailsResponse {
    /// Creator the details belong to.
    pub creator_id: ActorId,
    /// Saved details, if any.
    pub details: Option<PayoutDetails>,
}
