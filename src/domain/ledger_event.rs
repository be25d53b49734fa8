//! Domain events reflecting ledger and campaign mutations.
//!
//! Every state change emits a [`LedgerEvent`] through the
//! [`super::EventBus`] after all locks are released. Every ledger entry
//! that is created or settled is additionally published as
//! [`LedgerEvent::TransactionPosted`], which the optional PostgreSQL
//! writer mirrors into the `transactions` table.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    ActorId, CampaignId, ClipId, ClipStatus, Money, RefundId, RefundStatus, Transaction,
    TransactionId, TransactionStatus,
};

/// Domain event emitted after every state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A brand created a campaign.
    CampaignCreated {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Owning brand.
        brand_id: ActorId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A campaign was switched on or off.
    CampaignActivityChanged {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// New activity flag.
        is_active: bool,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An owner or admin changed a campaign setting.
    CampaignUpdated {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// What changed.
        change: CampaignChange,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A campaign was deleted after its pool was refunded.
    CampaignDeleted {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Owning brand.
        brand_id: ActorId,
        /// Amount returned to the brand before deletion.
        refunded: Money,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A gateway-confirmed deposit landed in a brand wallet.
    FundsDeposited {
        /// Depositing brand.
        brand_id: ActorId,
        /// Deposited amount.
        amount: Money,
        /// Gateway correlation id.
        external_txn_id: String,
        /// Deposit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Money moved from a brand wallet into a campaign pool.
    FundsAllocated {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Owning brand.
        brand_id: ActorId,
        /// Amount allocated.
        amount: Money,
        /// Pool size after the allocation.
        funds_allocated: Money,
        /// Allocation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Money moved from a campaign pool back to the brand wallet.
    FundsReclaimed {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Owning brand.
        brand_id: ActorId,
        /// Amount reclaimed.
        amount: Money,
        /// Pool size after the reclaim.
        funds_allocated: Money,
        /// Reclaim timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A creator was paid out of a campaign pool.
    EarningsDistributed {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Paid creator.
        creator_id: ActorId,
        /// Amount taken from the pool.
        gross: Money,
        /// Amount credited to the creator.
        creator_share: Money,
        /// Amount retained by the platform.
        commission: Money,
        /// Payout timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The undistributed pool was returned to the brand.
    CampaignRefunded {
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Owning brand.
        brand_id: ActorId,
        /// Amount refunded.
        amount: Money,
        /// Refund timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A brand filed a refund request.
    RefundRequested {
        /// Request identifier.
        refund_id: RefundId,
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Requesting brand.
        brand_id: ActorId,
        /// Amount asked for.
        amount: Money,
        /// Request timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A refund request reached a terminal state.
    RefundResolved {
        /// Request identifier.
        refund_id: RefundId,
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Final status.
        status: RefundStatus,
        /// Amount credited, for completed requests.
        #[serde(skip_serializing_if = "Option::is_none")]
        amount: Option<Money>,
        /// Resolution timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A creator asked to withdraw to bank or UPI.
    WithdrawalRequested {
        /// Pending withdrawal entry.
        transaction_id: TransactionId,
        /// Withdrawing creator.
        creator_id: ActorId,
        /// Amount debited.
        amount: Money,
        /// Request timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The gateway reported the outcome of a withdrawal.
    WithdrawalSettled {
        /// Withdrawal entry.
        transaction_id: TransactionId,
        /// Withdrawing creator.
        creator_id: ActorId,
        /// Final status.
        status: TransactionStatus,
        /// Settlement timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A failed withdrawal was credited back to the creator.
    WithdrawalReversed {
        /// Failed withdrawal entry.
        transaction_id: TransactionId,
        /// Compensating entry.
        reversal_id: TransactionId,
        /// Creator credited.
        creator_id: ActorId,
        /// Amount credited back.
        amount: Money,
        /// Reversal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An admin reviewed a clip.
    ClipReviewed {
        /// Clip identifier.
        clip_id: ClipId,
        /// Campaign identifier.
        campaign_id: CampaignId,
        /// Review outcome.
        status: ClipStatus,
        /// Review timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A ledger entry was created or settled.
    TransactionPosted {
        /// Entry as it stands after the change.
        transaction: Box<Transaction>,
    },
}

/// Campaign setting changed by [`LedgerEvent::CampaignUpdated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum CampaignChange {
    /// Submission deadline moved.
    Deadline {
        /// New deadline.
        deadline: DateTime<Utc>,
    },
    /// Milestone size changed.
    ViewThreshold {
        /// New milestone size in views.
        view_threshold: u64,
    },
    /// Spending target changed.
    Budget {
        /// New budget.
        budget: Money,
    },
    /// View aggregate re-summed from accepted clips.
    ViewCount {
        /// Aggregate after the recount.
        total_view_count: u64,
    },
}

impl LedgerEvent {
    /// Wraps a ledger entry.
    #[must_use]
    pub fn posted(transaction: Transaction) -> Self {
        Self::TransactionPosted {
            transaction: Box::new(transaction),
        }
    }

    /// Returns the campaign this event concerns, if any.
    #[must_use]
    pub fn campaign_id(&self) -> Option<CampaignId> {
        match self {
            Self::CampaignCreated { campaign_id, .. }
            | Self::CampaignActivityChanged { campaign_id, .. }
            | Self::CampaignUpdated { campaign_id, .. }
            | Self::CampaignDeleted { campaign_id, .. }
            | Self::FundsAllocated { campaign_id, .. }
            | Self::FundsReclaimed { campaign_id, .. }
            | Self::EarningsDistributed { campaign_id, .. }
            | Self::CampaignRefunded { campaign_id, .. }
            | Self::RefundRequested { campaign_id, .. }
            | Self::RefundResolved { campaign_id, .. }
            | Self::ClipReviewed { campaign_id, .. } => Some(*campaign_id),
            Self::TransactionPosted { transaction } => transaction.campaign_id,
            Self::FundsDeposited { .. }
            | Self::WithdrawalRequested { .. }
            | Self::WithdrawalSettled { .. }
            | Self::WithdrawalReversed { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::CampaignCreated { .. } => "campaign_created",
            Self::CampaignActivityChanged { .. } => "campaign_activity_changed",
            Self::CampaignUpdated { .. } => "campaign_updated",
            Self::CampaignDeleted { .. } => "campaign_deleted",
            Self::FundsDeposited { .. } => "funds_deposited",
            Self::FundsAllocated { .. } => "funds_allocated",
            Self::FundsReclaimed { .. } => "funds_reclaimed",
            Self::EarningsDistributed { .. } => "earnings_distributed",
            Self::CampaignRefunded { .. } => "campaign_refunded",
            Self::RefundRequested { .. } => "refund_requested",
            Self::RefundResolved { .. } => "refund_resolved",
            Self::WithdrawalRequested { .. } => "withdrawal_requested",
            Self::WithdrawalSettled { .. } => "withdrawal_settled",
            Self::WithdrawalReversed { .. } => "withdrawal_reversed",
            Self::ClipReviewed { .. } => "clip_reviewed",
            Self::TransactionPosted { .. } => "transaction_posted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_event_serializes_with_tag() {
        let event = LedgerEvent::EarningsDistributed {
            campaign_id: CampaignId::new(),
            creator_id: ActorId::new(),
            gross: Money::from_major(3000),
            creator_share: Money::from_major(2400),
            commission: Money::from_major(600),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type_str(), "earnings_distributed");
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"earnings_distributed\""));
        assert!(json.contains("\"gross\":\"3000.00\""));
    }

    #[test]
    fn campaign_id_accessor() {
        let id = CampaignId::new();
        let event = LedgerEvent::CampaignRefunded {
            campaign_id: id,
            brand_id: ActorId::new(),
            amount: Money::from_major(1),
            timestamp: Utc::now(),
        };
        assert_eq!(event.campaign_id(), Some(id));

        let deposit = LedgerEvent::FundsDeposited {
            brand_id: ActorId::new(),
            amount: Money::from_major(1),
            external_txn_id: "order_1".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(deposit.campaign_id(), None);
    }

    #[test]
    fn campaign_update_names_the_field() {
        let id = CampaignId::new();
        let event = LedgerEvent::CampaignUpdated {
            campaign_id: id,
            change: CampaignChange::Budget {
                budget: Money::from_major(250),
            },
            timestamp: Utc::now(),
        };
        assert_eq!(event.campaign_id(), Some(id));
        assert_eq!(event.event_type_str(), "campaign_updated");
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"campaign_updated\""));
        assert!(json.contains("\"change\":{\"field\":\"budget\",\"budget\":\"250.00\"}"));
    }
}
