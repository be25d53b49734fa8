//! Brand refund requests and their state machine.
//!
//! ```text
//! pending ──► approved ──► completed
//!    │
//!    ├──────► rejected
//!    └──────► failed
//! ```
//!
//! `completed`, `rejected` and `failed` are terminal.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{ActorId, CampaignId, Money, RefundId, TransactionId};
use crate::error::SettlementError;

/// Why the brand wants money back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    /// Partial refund while the campaign is running.
    MidCampaign,
    /// Return of an unused portion after the campaign.
    PartialReturn,
    /// Mandatory refund before deletion.
    CampaignDeletion,
    /// Refund settled by dispute resolution.
    DisputeResolution,
}

/// Refund request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Awaiting an admin decision.
    Pending,
    /// Approved; wallet credit in progress.
    Approved,
    /// Declined by an admin.
    Rejected,
    /// Brand wallet credited.
    Completed,
    /// Could not be carried out.
    Failed,
}

impl RefundStatus {
    /// Returns `true` for states with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Failed)
    }

    /// Returns `true` if the state machine allows `self -> to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved | Self::Rejected | Self::Failed)
                | (Self::Approved, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

impl FromStr for RefundStatus {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SettlementError::InvalidRequest(format!(
                "unknown refund status: {other}"
            ))),
        }
    }
}

/// A brand's request to take money out of a campaign pool.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundRequest {
    /// Request id.
    pub refund_id: RefundId,
    /// Campaign the money comes from.
    pub campaign_id: CampaignId,
    /// Requesting brand.
    pub brand_id: ActorId,
    /// Request kind.
    #[serde(rename = "type")]
    pub refund_type: RefundType,
    /// Amount asked for.
    pub requested_amount: Money,
    /// Amount actually granted.
    pub approved_amount: Option<Money>,
    /// Refundable ceiling when the request was created.
    pub refundable_amount: Money,
    /// Current state.
    pub status: RefundStatus,
    /// Brand's reason.
    pub reason: String,
    /// Admin's approval note.
    pub approval_reason: Option<String>,
    /// Admin's rejection reason.
    pub rejection_reason: Option<String>,
    /// Why the request failed.
    pub failure_reason: Option<String>,
    /// Ledger entry that credited the brand.
    pub transaction_id: Option<TransactionId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
    /// When the request reached `completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl RefundRequest {
    /// Creates a pending request.
    #[must_use]
    pub fn new(
        campaign_id: CampaignId,
        brand_id: ActorId,
        refund_type: RefundType,
        requested_amount: Money,
        refundable_amount: Money,
        reason: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            refund_id: RefundId::new(),
            campaign_id,
            brand_id,
            refund_type,
            requested_amount,
            approved_amount: None,
            refundable_amount,
            status: RefundStatus::Pending,
            reason,
            approval_reason: None,
            rejection_reason: None,
            failure_reason: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Moves the request to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidState`] for transitions the state
    /// machine does not allow.
    pub fn transition(&mut self, to: RefundStatus) -> Result<(), SettlementError> {
        if !self.status.can_transition_to(to) {
            return Err(SettlementError::InvalidState(format!(
                "refund {} cannot move from {} to {to}",
                self.refund_id, self.status
            )));
        }
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to == RefundStatus::Completed {
            self.completed_at = Some(now);
        }
        Ok(())
    }
}

/// Shared handle to one refund request.
pub type RefundHandle = Arc<RwLock<RefundRequest>>;

/// Store of refund requests. First in the lock order.
#[derive(Debug, Default)]
pub struct RefundBook {
    requests: RwLock<HashMap<RefundId, RefundHandle>>,
}

impl RefundBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a request.
    pub async fn insert(&self, request: RefundRequest) -> RefundId {
        let id = request.refund_id;
        self.requests
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(request)));
        id
    }

    /// Returns the lock guarding a request.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::RefundNotFound`] for unknown ids.
    pub async fn get(&self, id: RefundId) -> Result<RefundHandle, SettlementError> {
        self.requests
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SettlementError::RefundNotFound(id))
    }

    /// Snapshots requests matching `keep`, newest first.
    pub async fn filter(&self, keep: impl Fn(&RefundRequest) -> bool) -> Vec<RefundRequest> {
        let handles: Vec<RefundHandle> = self.requests.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for handle in handles {
            let request = handle.read().await;
            if keep(&request) {
                out.push(request.clone());
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RefundRequest {
        RefundRequest::new(
            CampaignId::new(),
            ActorId::new(),
            RefundType::MidCampaign,
            Money::from_major(100),
            Money::from_major(500),
            "budget cut".to_string(),
        )
    }

    #[test]
    fn pending_to_completed_goes_through_approved() {
        let mut r = request();
        assert!(r.transition(RefundStatus::Completed).is_err());
        assert!(r.transition(RefundStatus::Approved).is_ok());
        assert!(r.transition(RefundStatus::Completed).is_ok());
        assert!(r.completed_at.is_some());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [RefundStatus::Completed, RefundStatus::Rejected, RefundStatus::Failed] {
            assert!(terminal.is_terminal());
            for to in [
                RefundStatus::Pending,
                RefundStatus::Approved,
                RefundStatus::Rejected,
                RefundStatus::Completed,
                RefundStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn rejected_request_cannot_be_approved() {
        let mut r = request();
        assert!(r.transition(RefundStatus::Rejected).is_ok());
        assert!(matches!(
            r.transition(RefundStatus::Approved),
            Err(SettlementError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn filter_returns_matching_requests() {
        let book = RefundBook::new();
        let kept = request();
        let campaign = kept.campaign_id;
        book.insert(kept).await;
        book.insert(request()).await;
        let found = book.filter(|r| r.campaign_id == campaign).await;
        assert_eq!(found.len(), 1);
    }
}
