//! Distribution and refund orchestrator.
//!
//! Applies payout calculations to campaign pools: creator distributions
//! (single and bulk), campaign refunds, and the two-phase refund request
//! workflow approved by an admin.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PayoutCalculator, WalletLedger, clamp_limit};
use crate::domain::{
    ActorId, ActorRef, Campaign, CampaignBook, CampaignId, Identity, LedgerEvent, Money,
    NewTransaction, RefundBook, RefundId, RefundRequest, RefundStatus, RefundType, Role,
    TransactionId, TransactionType,
};
use crate::error::SettlementError;

/// One distribution instruction.
///
/// `view_count` is the authoritative view figure when present; otherwise
/// the views of the creator's accepted clips are used. `cpv` and
/// `view_threshold` are informational: the campaign's stored terms always
/// apply.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DistributionOrder {
    /// Campaign to pay from.
    pub campaign_id: CampaignId,
    /// Creator to pay.
    pub creator_id: ActorId,
    /// Views to base the payout on.
    #[serde(default)]
    pub view_count: Option<u64>,
    /// CPV the caller expects.
    #[serde(default)]
    pub cpv: Option<Money>,
    /// Threshold the caller expects.
    #[serde(default)]
    pub view_threshold: Option<u64>,
}

/// Result of a successful distribution.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DistributionResult {
    /// Campaign paid from.
    pub campaign_id: CampaignId,
    /// Creator paid.
    pub creator_id: ActorId,
    /// Amount taken out of the pool.
    pub gross_amount: Money,
    /// Amount credited to the creator.
    pub creator_share: Money,
    /// Amount retained by the platform.
    pub platform_commission: Money,
    /// Creator balance after the credit.
    pub new_creator_wallet: Money,
    /// Campaign `funds_distributed` after the payout.
    pub new_funds_distributed: Money,
    /// Earning entry, absent when the creator share rounds to zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earning_transaction_id: Option<TransactionId>,
    /// Commission entry, absent for a zero commission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_transaction_id: Option<TransactionId>,
}

/// Outcome of one item in a bulk distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BulkItemStatus {
    /// Money moved.
    Success,
    /// Nothing moved; see `reason`.
    Failed,
}

/// Per-item report of a bulk distribution.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkItemResult {
    /// Campaign of the item.
    pub campaign_id: CampaignId,
    /// Creator of the item.
    pub creator_id: ActorId,
    /// Outcome.
    pub status: BulkItemStatus,
    /// Distribution details on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DistributionResult>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Machine-readable failure kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Totals of a bulk distribution.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkSummary {
    /// Items submitted.
    pub total_requested: usize,
    /// Items that moved money.
    pub successful: usize,
    /// Items that failed.
    pub failed: usize,
    /// Gross amount moved out of campaign pools.
    pub total_distributed: Money,
}

/// Report of a bulk distribution.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkDistribution {
    /// Totals.
    pub summary: BulkSummary,
    /// One entry per submitted item, in order.
    pub results: Vec<BulkItemResult>,
}

/// Result of returning a campaign's undistributed pool to its brand.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignRefund {
    /// Campaign refunded.
    pub campaign_id: CampaignId,
    /// Amount returned; zero for a no-op.
    pub refundable_amount: Money,
    /// Brand balance afterwards.
    pub new_wallet_balance: Money,
    /// Refund entry, absent for a no-op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
}

/// Result of approving a refund request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundApproval {
    /// Request after approval.
    pub request: RefundRequest,
    /// Amount credited to the brand.
    pub approved_amount: Money,
    /// `true` once the brand wallet was credited.
    pub brand_wallet_updated: bool,
    /// Brand balance afterwards.
    pub new_wallet_balance: Money,
}

/// One step in a refund request's history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundTimelineEntry {
    /// State reached.
    pub status: RefundStatus,
    /// When it was reached.
    pub at: DateTime<Utc>,
    /// Reason attached to the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A refund request with its history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundStatusView {
    /// The request.
    pub request: RefundRequest,
    /// Steps in chronological order.
    pub timeline: Vec<RefundTimelineEntry>,
}

/// One page of refund requests.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundPage {
    /// Requests on this page, newest first.
    pub requests: Vec<RefundRequest>,
    /// Matching requests across all pages.
    pub total: usize,
}

/// Aggregates over an audit trail selection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundAuditSummary {
    /// Sum of approved amounts of completed requests.
    pub total_refunded: Money,
    /// Requests still awaiting a decision.
    pub pending_approval: usize,
    /// Completed requests.
    pub completed: usize,
    /// Rejected requests.
    pub rejected: usize,
    /// Failed requests.
    pub failed: usize,
}

/// Admin view over refund requests.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundAuditTrail {
    /// Requests on this page, newest first.
    pub requests: Vec<RefundRequest>,
    /// Matching requests across all pages.
    pub total: usize,
    /// Aggregates over every matching request.
    pub summary: RefundAuditSummary,
}

/// Filters shared by the refund listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefundQuery {
    /// Restrict to one brand (admin only).
    pub brand_id: Option<ActorId>,
    /// Restrict to one campaign.
    pub campaign_id: Option<CampaignId>,
    /// Restrict to one status.
    pub status: Option<RefundStatus>,
}

impl RefundQuery {
    fn matches(&self, r: &RefundRequest) -> bool {
        self.brand_id.is_none_or(|b| r.brand_id == b)
            && self.campaign_id.is_none_or(|c| r.campaign_id == c)
            && self.status.is_none_or(|s| r.status == s)
    }
}

fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: usize) -> Vec<T> {
    items
        .into_iter()
        .skip(offset)
        .take(clamp_limit(limit))
        .collect()
}

/// Money moved by a refund applied under the campaign lock.
pub(crate) struct LockedRefund {
    pub(crate) amount: Money,
    pub(crate) new_wallet_balance: Money,
    pub(crate) transaction_id: Option<TransactionId>,
    pub(crate) events: Vec<LedgerEvent>,
}

/// Orchestrates distributions and refunds.
#[derive(Debug)]
pub struct SettlementService {
    campaigns: Arc<CampaignBook>,
    refunds: Arc<RefundBook>,
    ledger: Arc<WalletLedger>,
    calculator: Arc<PayoutCalculator>,
}

impl SettlementService {
    /// Creates the orchestrator.
    #[must_use]
    pub fn new(
        campaigns: Arc<CampaignBook>,
        refunds: Arc<RefundBook>,
        ledger: Arc<WalletLedger>,
        calculator: Arc<PayoutCalculator>,
    ) -> Self {
        Self {
            campaigns,
            refunds,
            ledger,
            calculator,
        }
    }

    /// Pays a creator everything they are owed by a campaign.
    ///
    /// The creator share is credited to the creator wallet, the commission
    /// is booked against the platform account and `funds_distributed` grows
    /// by the gross amount. All of it happens under the campaign and wallet
    /// locks, or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown campaigns,
    /// [`SettlementError::Forbidden`] unless the caller is the owning brand
    /// or an admin, [`SettlementError::NothingToDistribute`] if nothing is
    /// pending and [`SettlementError::InsufficientCampaignFunds`] if the
    /// pending amount exceeds the undistributed pool.
    pub async fn distribute_to_creator(
        &self,
        identity: &Identity,
        order: &DistributionOrder,
    ) -> Result<DistributionResult, SettlementError> {
        let campaign_id = order.campaign_id;
        let creator_id = order.creator_id;
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;

        if order.cpv.is_some_and(|cpv| cpv != campaign.terms.cpv)
            || order
                .view_threshold
                .is_some_and(|t| t != campaign.terms.view_threshold)
        {
            tracing::warn!(
                %campaign_id,
                requested_cpv = ?order.cpv,
                requested_threshold = ?order.view_threshold,
                "distribution terms differ from campaign terms; using campaign terms"
            );
        }
        let views = match order.view_count {
            Some(views) => views,
            None => self.calculator.accepted_views(campaign_id, creator_id).await,
        };
        let earnings = self
            .calculator
            .earnings_for(&campaign, creator_id, views)?;

        let gross = earnings.pending_amount;
        if gross.is_zero() {
            tracing::warn!(%campaign_id, %creator_id, views, "nothing to distribute");
            return Err(SettlementError::NothingToDistribute);
        }
        let refundable = campaign.refundable();
        if gross > refundable {
            tracing::warn!(%campaign_id, %creator_id, %gross, %refundable, "distribution exceeds campaign funds");
            return Err(SettlementError::InsufficientCampaignFunds {
                available: refundable,
                required: gross,
            });
        }
        let creator_share = earnings.pending_creator_share;
        let commission = earnings.pending_commission;
        let new_funds_distributed = campaign.funds_distributed.try_add(gross)?;
        let new_commission_collected = campaign.commission_collected.try_add(commission)?;
        let new_paid = campaign.paid_to(creator_id).try_add(gross)?;

        let creator = ActorRef::creator(creator_id);
        let wallet_handle = self.ledger.wallet(creator).await;
        let mut wallet = wallet_handle.write().await;
        let new_creator_wallet = wallet.balance_after_credit(creator_share)?;

        let mut posted = Vec::with_capacity(2);
        if !creator_share.is_zero() {
            posted.push(
                self.ledger
                    .post(
                        NewTransaction::success(
                            creator,
                            TransactionType::Earning,
                            creator_share,
                            format!("Earnings from campaign {}", campaign.name),
                        )
                        .for_campaign(campaign_id),
                    )
                    .await,
            );
        }
        let earning_transaction_id = posted.first().map(|t| t.id);
        let mut commission_transaction_id = None;
        if !commission.is_zero() {
            let txn = self
                .ledger
                .post(
                    NewTransaction::success(
                        ActorRef::PLATFORM,
                        TransactionType::Commission,
                        commission,
                        format!("Platform commission on payout to creator {creator_id}"),
                    )
                    .for_campaign(campaign_id),
                )
                .await;
            commission_transaction_id = Some(txn.id);
            posted.push(txn);
        }
        wallet.set_balance(new_creator_wallet);
        campaign.funds_distributed = new_funds_distributed;
        campaign.commission_collected = new_commission_collected;
        campaign.paid_to_creators.insert(creator_id, new_paid);
        campaign.touch();
        drop(wallet);
        drop(campaign);

        tracing::info!(%campaign_id, %creator_id, %gross, %creator_share, %commission, %new_funds_distributed, "earnings distributed");
        let bus = self.ledger.event_bus();
        bus.publish(LedgerEvent::EarningsDistributed {
            campaign_id,
            creator_id,
            gross,
            creator_share,
            commission,
            timestamp: Utc::now(),
        });
        bus.publish_all(posted.into_iter().map(LedgerEvent::posted));

        Ok(DistributionResult {
            campaign_id,
            creator_id,
            gross_amount: gross,
            creator_share,
            platform_commission: commission,
            new_creator_wallet,
            new_funds_distributed,
            earning_transaction_id,
            commission_transaction_id,
        })
    }

    /// Applies each order independently; failures are reported per item
    /// and never undo earlier successes.
    pub async fn bulk_distribute(
        &self,
        identity: &Identity,
        orders: &[DistributionOrder],
    ) -> BulkDistribution {
        let mut results = Vec::with_capacity(orders.len());
        let mut successful = 0_usize;
        let mut total_distributed = Money::ZERO;
        for order in orders {
            match self.distribute_to_creator(identity, order).await {
                Ok(result) => {
                    successful = successful.saturating_add(1);
                    total_distributed = total_distributed.saturating_add(result.gross_amount);
                    results.push(BulkItemResult {
                        campaign_id: order.campaign_id,
                        creator_id: order.creator_id,
                        status: BulkItemStatus::Success,
                        result: Some(result),
                        reason: None,
                        error: None,
                    });
                }
                Err(e) => results.push(BulkItemResult {
                    campaign_id: order.campaign_id,
                    creator_id: order.creator_id,
                    status: BulkItemStatus::Failed,
                    result: None,
                    reason: Some(e.to_string()),
                    error: Some(e.kind()),
                }),
            }
        }
        let summary = BulkSummary {
            total_requested: orders.len(),
            successful,
            failed: orders.len().saturating_sub(successful),
            total_distributed,
        };
        tracing::info!(
            total = summary.total_requested,
            successful = summary.successful,
            failed = summary.failed,
            total_distributed = %summary.total_distributed,
            "bulk distribution finished"
        );
        BulkDistribution { summary, results }
    }

    /// Returns everything undistributed in a campaign to its brand.
    ///
    /// Succeeds as a no-op when nothing is refundable.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown campaigns,
    /// [`SettlementError::Forbidden`] unless the caller is the owning brand
    /// or an admin, and [`SettlementError::CampaignLive`] when the brand
    /// asks while the campaign is live.
    pub async fn refund_campaign(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<CampaignRefund, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;
        campaign.ensure_drainable(identity, Utc::now())?;
        let refund = self.refund_locked(&mut campaign).await?;
        drop(campaign);

        self.ledger.event_bus().publish_all(refund.events);
        Ok(CampaignRefund {
            campaign_id,
            refundable_amount: refund.amount,
            new_wallet_balance: refund.new_wallet_balance,
            transaction_id: refund.transaction_id,
        })
    }

    /// Refunds the undistributed pool of a campaign whose write guard the
    /// caller holds. Events are returned for publishing after the guard is
    /// released.
    pub(crate) async fn refund_locked(
        &self,
        campaign: &mut Campaign,
    ) -> Result<LockedRefund, SettlementError> {
        let brand = ActorRef::brand(campaign.brand_id);
        let wallet_handle = self.ledger.wallet(brand).await;
        let mut wallet = wallet_handle.write().await;
        let amount = campaign.refundable();
        if amount.is_zero() {
            tracing::debug!(campaign_id = %campaign.id, "nothing refundable");
            return Ok(LockedRefund {
                amount,
                new_wallet_balance: wallet.balance,
                transaction_id: None,
                events: Vec::new(),
            });
        }
        let new_wallet_balance = wallet.balance_after_credit(amount)?;
        let transaction = self
            .ledger
            .post(
                NewTransaction::success(
                    brand,
                    TransactionType::Refund,
                    amount,
                    format!("Refund of unused funds from campaign {}", campaign.name),
                )
                .for_campaign(campaign.id),
            )
            .await;
        wallet.set_balance(new_wallet_balance);
        campaign.funds_allocated = campaign.funds_distributed;
        campaign.touch();

        tracing::info!(campaign_id = %campaign.id, brand_id = %brand.id, %amount, %new_wallet_balance, "campaign refunded");
        let transaction_id = Some(transaction.id);
        Ok(LockedRefund {
            amount,
            new_wallet_balance,
            transaction_id,
            events: vec![
                LedgerEvent::CampaignRefunded {
                    campaign_id: campaign.id,
                    brand_id: brand.id,
                    amount,
                    timestamp: Utc::now(),
                },
                LedgerEvent::posted(transaction),
            ],
        })
    }

    /// Records an already-executed deletion refund in the refund audit
    /// trail.
    pub(crate) async fn record_deletion_refund(
        &self,
        campaign_id: CampaignId,
        brand_id: ActorId,
        amount: Money,
        transaction_id: Option<TransactionId>,
    ) -> Result<RefundId, SettlementError> {
        let mut request = RefundRequest::new(
            campaign_id,
            brand_id,
            RefundType::CampaignDeletion,
            amount,
            amount,
            "Campaign deleted".to_string(),
        );
        request.transition(RefundStatus::Approved)?;
        request.approved_amount = Some(amount);
        request.approval_reason = Some("Mandatory refund before deletion".to_string());
        request.transaction_id = transaction_id;
        request.transition(RefundStatus::Completed)?;
        Ok(self.refunds.insert(request).await)
    }

    /// Files a pending refund request for admin review.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAmount`] for zero amounts,
    /// [`SettlementError::InvalidRequest`] without a reason,
    /// [`SettlementError::Forbidden`] unless the caller is the owning brand
    /// and [`SettlementError::ExceedsRefundable`] above
    /// `funds_allocated - funds_distributed`.
    pub async fn request_refund(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        requested_amount: Money,
        reason: &str,
        refund_type: RefundType,
    ) -> Result<RefundRequest, SettlementError> {
        requested_amount.ensure_positive()?;
        identity.require(Role::Brand)?;
        if reason.trim().is_empty() {
            return Err(SettlementError::InvalidRequest(
                "a refund reason is required".to_string(),
            ));
        }
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        campaign.ensure_owner(identity.actor_id)?;
        let refundable = campaign.refundable();
        if requested_amount > refundable {
            tracing::warn!(%campaign_id, %requested_amount, %refundable, "refund request exceeds refundable");
            return Err(SettlementError::ExceedsRefundable {
                refundable,
                requested: requested_amount,
            });
        }
        let request = RefundRequest::new(
            campaign_id,
            identity.actor_id,
            refund_type,
            requested_amount,
            refundable,
            reason.trim().to_string(),
        );
        self.refunds.insert(request.clone()).await;
        drop(campaign);

        tracing::info!(refund_id = %request.refund_id, %campaign_id, %requested_amount, "refund requested");
        self.ledger.event_bus().publish(LedgerEvent::RefundRequested {
            refund_id: request.refund_id,
            campaign_id,
            brand_id: identity.actor_id,
            amount: requested_amount,
            timestamp: request.created_at,
        });
        Ok(request)
    }

    /// Approves a pending request and credits the brand.
    ///
    /// The refundable ceiling is re-read at approval time. A request whose
    /// campaign no longer exists is moved to `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-admin callers,
    /// [`SettlementError::InvalidState`] unless the request is pending,
    /// [`SettlementError::CampaignNotFound`] if the campaign was deleted and
    /// [`SettlementError::ExceedsRefundable`] if the amount no longer fits.
    pub async fn approve_refund(
        &self,
        identity: &Identity,
        refund_id: RefundId,
        approved_amount: Option<Money>,
        approval_reason: Option<String>,
    ) -> Result<RefundApproval, SettlementError> {
        identity.require(Role::Admin)?;
        let request_handle = self.refunds.get(refund_id).await?;
        let mut request = request_handle.write().await;
        if request.status != RefundStatus::Pending {
            return Err(SettlementError::InvalidState(format!(
                "refund {refund_id} is {} and cannot be approved",
                request.status
            )));
        }
        let amount = approved_amount.unwrap_or(request.requested_amount);
        amount.ensure_positive()?;
        let campaign_id = request.campaign_id;

        let campaign_handle = match self.campaigns.get(campaign_id).await {
            Ok(handle) => handle,
            Err(e) => {
                request.transition(RefundStatus::Failed)?;
                request.failure_reason = Some("campaign no longer exists".to_string());
                drop(request);
                tracing::warn!(%refund_id, %campaign_id, "refund failed: campaign gone");
                self.ledger.event_bus().publish(LedgerEvent::RefundResolved {
                    refund_id,
                    campaign_id,
                    status: RefundStatus::Failed,
                    amount: None,
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };
        let mut campaign = campaign_handle.write().await;
        if campaign.deleted {
            drop(campaign);
            request.transition(RefundStatus::Failed)?;
            request.failure_reason = Some("campaign no longer exists".to_string());
            drop(request);
            tracing::warn!(%refund_id, %campaign_id, "refund failed: campaign deleted");
            self.ledger.event_bus().publish(LedgerEvent::RefundResolved {
                refund_id,
                campaign_id,
                status: RefundStatus::Failed,
                amount: None,
                timestamp: Utc::now(),
            });
            return Err(SettlementError::CampaignNotFound(campaign_id));
        }
        let refundable = campaign.refundable();
        if amount > refundable {
            tracing::warn!(%refund_id, %amount, %refundable, "approval exceeds current refundable");
            return Err(SettlementError::ExceedsRefundable {
                refundable,
                requested: amount,
            });
        }
        let new_funds_allocated = campaign
            .funds_allocated
            .checked_sub(amount)
            .ok_or(SettlementError::ExceedsRefundable {
                refundable,
                requested: amount,
            })?;

        let brand = ActorRef::brand(campaign.brand_id);
        let wallet_handle = self.ledger.wallet(brand).await;
        let mut wallet = wallet_handle.write().await;
        let new_wallet_balance = wallet.balance_after_credit(amount)?;

        let transaction = self
            .ledger
            .post(
                NewTransaction::success(
                    brand,
                    TransactionType::Refund,
                    amount,
                    format!("Approved refund {refund_id} from campaign {}", campaign.name),
                )
                .for_campaign(campaign_id),
            )
            .await;
        wallet.set_balance(new_wallet_balance);
        campaign.funds_allocated = new_funds_allocated;
        campaign.touch();
        request.transition(RefundStatus::Approved)?;
        request.approved_amount = Some(amount);
        request.approval_reason = approval_reason;
        request.transaction_id = Some(transaction.id);
        request.transition(RefundStatus::Completed)?;
        let snapshot = request.clone();
        drop(wallet);
        drop(campaign);
        drop(request);

        tracing::info!(%refund_id, %campaign_id, %amount, %new_wallet_balance, "refund approved");
        self.ledger.event_bus().publish_all([
            LedgerEvent::RefundResolved {
                refund_id,
                campaign_id,
                status: RefundStatus::Completed,
                amount: Some(amount),
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(transaction),
        ]);
        Ok(RefundApproval {
            request: snapshot,
            approved_amount: amount,
            brand_wallet_updated: true,
            new_wallet_balance,
        })
    }

    /// Rejects a pending request. No money moves.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-admin callers,
    /// [`SettlementError::InvalidRequest`] without a reason and
    /// [`SettlementError::InvalidState`] unless the request is pending.
    pub async fn reject_refund(
        &self,
        identity: &Identity,
        refund_id: RefundId,
        rejection_reason: &str,
    ) -> Result<RefundRequest, SettlementError> {
        identity.require(Role::Admin)?;
        if rejection_reason.trim().is_empty() {
            return Err(SettlementError::InvalidRequest(
                "rejection_reason is required".to_string(),
            ));
        }
        let handle = self.refunds.get(refund_id).await?;
        let mut request = handle.write().await;
        request.transition(RefundStatus::Rejected)?;
        request.rejection_reason = Some(rejection_reason.trim().to_string());
        let snapshot = request.clone();
        drop(request);

        tracing::info!(%refund_id, campaign_id = %snapshot.campaign_id, "refund rejected");
        self.ledger.event_bus().publish(LedgerEvent::RefundResolved {
            refund_id,
            campaign_id: snapshot.campaign_id,
            status: RefundStatus::Rejected,
            amount: None,
            timestamp: snapshot.updated_at,
        });
        Ok(snapshot)
    }

    /// A request with its timeline.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::RefundNotFound`] for unknown ids and
    /// [`SettlementError::Forbidden`] unless the caller is the requesting
    /// brand or an admin.
    pub async fn refund_status(
        &self,
        identity: &Identity,
        refund_id: RefundId,
    ) -> Result<RefundStatusView, SettlementError> {
        let handle = self.refunds.get(refund_id).await?;
        let request = handle.read().await.clone();
        identity.require_self_or_admin(ActorRef::brand(request.brand_id))?;

        let mut timeline = vec![RefundTimelineEntry {
            status: RefundStatus::Pending,
            at: request.created_at,
            note: Some(request.reason.clone()),
        }];
        match request.status {
            RefundStatus::Pending => {}
            RefundStatus::Approved | RefundStatus::Completed => {
                timeline.push(RefundTimelineEntry {
                    status: RefundStatus::Approved,
                    at: request.completed_at.unwrap_or(request.updated_at),
                    note: request.approval_reason.clone(),
                });
                if let Some(at) = request.completed_at {
                    timeline.push(RefundTimelineEntry {
                        status: RefundStatus::Completed,
                        at,
                        note: None,
                    });
                }
            }
            RefundStatus::Rejected => timeline.push(RefundTimelineEntry {
                status: RefundStatus::Rejected,
                at: request.updated_at,
                note: request.rejection_reason.clone(),
            }),
            RefundStatus::Failed => timeline.push(RefundTimelineEntry {
                status: RefundStatus::Failed,
                at: request.updated_at,
                note: request.failure_reason.clone(),
            }),
        }
        Ok(RefundStatusView { request, timeline })
    }

    /// Refund requests visible to the caller: brands see their own, admins
    /// see everything.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for creators.
    pub async fn list_refund_requests(
        &self,
        identity: &Identity,
        mut query: RefundQuery,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<RefundPage, SettlementError> {
        match identity.role {
            Role::Admin => {}
            Role::Brand => query.brand_id = Some(identity.actor_id),
            Role::Creator => {
                return Err(SettlementError::Forbidden(
                    "creators have no refund requests".to_string(),
                ));
            }
        }
        let matching = self.refunds.filter(|r| query.matches(r)).await;
        let total = matching.len();
        Ok(RefundPage {
            requests: paginate(matching, limit, offset),
            total,
        })
    }

    /// Admin audit trail with refund totals.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-admin callers.
    pub async fn refund_audit_trail(
        &self,
        identity: &Identity,
        query: RefundQuery,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<RefundAuditTrail, SettlementError> {
        identity.require(Role::Admin)?;
        let matching = self.refunds.filter(|r| query.matches(r)).await;
        let mut summary = RefundAuditSummary {
            total_refunded: Money::ZERO,
            pending_approval: 0,
            completed: 0,
            rejected: 0,
            failed: 0,
        };
        for r in &matching {
            match r.status {
                RefundStatus::Pending => summary.pending_approval = summary.pending_approval.saturating_add(1),
                RefundStatus::Completed => {
                    summary.completed = summary.completed.saturating_add(1);
                    summary.total_refunded = summary
                        .total_refunded
                        .saturating_add(r.approved_amount.unwrap_or(Money::ZERO));
                }
                RefundStatus::Rejected => summary.rejected = summary.rejected.saturating_add(1),
                RefundStatus::Failed => summary.failed = summary.failed.saturating_add(1),
                RefundStatus::Approved => {}
            }
        }
        let total = matching.len();
        Ok(RefundAuditTrail {
            requests: paginate(matching, limit, offset),
            total,
            summary,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::campaign::tests::make_campaign;
    use crate::domain::{
        ClipBook, CommissionRate, EventBus, PayoutDetailsBook, TransactionLog, WalletBook,
    };
    use tokio_test::{assert_err, assert_ok};

    struct Fixture {
        settlement: Arc<SettlementService>,
        ledger: Arc<WalletLedger>,
        campaigns: Arc<CampaignBook>,
        brand: Identity,
        admin: Identity,
    }

    fn fixture() -> Fixture {
        let campaigns = Arc::new(CampaignBook::new());
        let ledger = Arc::new(WalletLedger::new(
            Arc::new(WalletBook::new()),
            Arc::new(TransactionLog::new()),
            Arc::new(PayoutDetailsBook::new()),
            EventBus::new(256),
        ));
        let Ok(rate) = CommissionRate::from_bps(2000) else {
            panic!("valid rate");
        };
        let calculator = Arc::new(PayoutCalculator::new(
            Arc::clone(&campaigns),
            Arc::new(ClipBook::new()),
            rate,
        ));
        let settlement = Arc::new(SettlementService::new(
            Arc::clone(&campaigns),
            Arc::new(RefundBook::new()),
            Arc::clone(&ledger),
            calculator,
        ));
        Fixture {
            settlement,
            ledger,
            campaigns,
            brand: Identity::new(Role::Brand, ActorId::new()),
            admin: Identity::new(Role::Admin, ActorId::new()),
        }
    }

    /// Campaign with `cpv=100`, `threshold=1000` and `allocated` in the pool.
    async fn funded_campaign(f: &Fixture, allocated: u64) -> CampaignId {
        let mut campaign = make_campaign(f.brand.actor_id);
        campaign.funds_allocated = Money::from_major(allocated);
        assert_ok!(f.campaigns.insert(campaign).await)
    }

    fn order(campaign_id: CampaignId, creator_id: ActorId, views: u64) -> DistributionOrder {
        DistributionOrder {
            campaign_id,
            creator_id,
            view_count: Some(views),
            cpv: None,
            view_threshold: None,
        }
    }

    async fn snapshot(f: &Fixture, id: CampaignId) -> Campaign {
        let handle = assert_ok!(f.campaigns.get(id).await);
        handle.read().await.clone()
    }

    #[tokio::test]
    async fn full_pool_distribution_splits_commission() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 3000).await;
        let creator = ActorId::new();

        // 30 milestones * 100 = 3000 gross
        let result = assert_ok!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, creator, 30_000))
                .await
        );
        assert_eq!(result.gross_amount, Money::from_major(3000));
        assert_eq!(result.creator_share, Money::from_major(2400));
        assert_eq!(result.platform_commission, Money::from_major(600));
        assert_eq!(result.new_funds_distributed, Money::from_major(3000));
        assert_eq!(
            f.ledger.get_balance(ActorRef::creator(creator)).await,
            Money::from_major(2400)
        );

        let campaign = snapshot(&f, campaign_id).await;
        assert_eq!(campaign.commission_collected, Money::from_major(600));
        assert!(campaign.funds_distributed <= campaign.funds_allocated);
    }

    #[tokio::test]
    async fn second_distribution_has_nothing_left() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 3000).await;
        let creator = ActorId::new();
        assert_ok!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, creator, 30_000))
                .await
        );
        let log_len = f.ledger.log().len().await;

        let err = assert_err!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, creator, 30_000))
                .await
        );
        assert!(matches!(err, SettlementError::NothingToDistribute));
        assert_eq!(f.ledger.log().len().await, log_len);
        assert_eq!(
            snapshot(&f, campaign_id).await.funds_distributed,
            Money::from_major(3000)
        );
    }

    #[tokio::test]
    async fn distribution_beyond_pool_is_refused() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 500).await;
        let creator = ActorId::new();
        let err = assert_err!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, creator, 6000))
                .await
        );
        assert!(matches!(
            err,
            SettlementError::InsufficientCampaignFunds { available, required }
                if available == Money::from_major(500) && required == Money::from_major(600)
        ));
        assert_eq!(f.ledger.get_balance(ActorRef::creator(creator)).await, Money::ZERO);
        assert_eq!(snapshot(&f, campaign_id).await.funds_distributed, Money::ZERO);
    }

    #[tokio::test]
    async fn only_incremental_earnings_are_paid() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 5000).await;
        let creator = ActorId::new();
        assert_ok!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, creator, 1000))
                .await
        );
        let second = assert_ok!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, creator, 3500))
                .await
        );
        assert_eq!(second.gross_amount, Money::from_major(200));
        assert_eq!(second.new_funds_distributed, Money::from_major(300));
    }

    #[tokio::test]
    async fn bulk_reports_partial_failures() {
        let f = fixture();
        let rich = funded_campaign(&f, 1000).await;
        let poor = funded_campaign(&f, 50).await;
        let (a, b, c) = (ActorId::new(), ActorId::new(), ActorId::new());

        let report = f
            .settlement
            .bulk_distribute(
                &f.brand,
                &[
                    order(rich, a, 2000),
                    order(poor, b, 1000),
                    order(rich, c, 3000),
                ],
            )
            .await;
        assert_eq!(report.summary.total_requested, 3);
        assert_eq!(report.summary.successful, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.total_distributed, Money::from_major(500));

        let failed = report.results.get(1);
        assert_eq!(failed.map(|r| r.status), Some(BulkItemStatus::Failed));
        assert_eq!(
            failed.and_then(|r| r.error),
            Some("insufficient_campaign_funds")
        );
        assert!(failed.and_then(|r| r.reason.as_ref()).is_some());

        assert_eq!(
            f.ledger.get_balance(ActorRef::creator(a)).await,
            Money::from_major(160)
        );
        assert_eq!(
            f.ledger.get_balance(ActorRef::creator(c)).await,
            Money::from_major(240)
        );
        assert_eq!(f.ledger.get_balance(ActorRef::creator(b)).await, Money::ZERO);
    }

    #[tokio::test]
    async fn refund_campaign_twice_is_a_no_op() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        assert_ok!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, ActorId::new(), 4000))
                .await
        );

        let live = assert_err!(f.settlement.refund_campaign(&f.brand, campaign_id).await);
        assert!(matches!(live, SettlementError::CampaignLive { .. }));
        assert_eq!(snapshot(&f, campaign_id).await.funds_allocated, Money::from_major(1000));
        {
            let handle = assert_ok!(f.campaigns.get(campaign_id).await);
            handle.write().await.is_active = false;
        }

        let first = assert_ok!(f.settlement.refund_campaign(&f.brand, campaign_id).await);
        assert_eq!(first.refundable_amount, Money::from_major(600));
        assert_eq!(first.new_wallet_balance, Money::from_major(600));

        let second = assert_ok!(f.settlement.refund_campaign(&f.brand, campaign_id).await);
        assert_eq!(second.refundable_amount, Money::ZERO);
        assert!(second.transaction_id.is_none());
        assert_eq!(second.new_wallet_balance, Money::from_major(600));

        let campaign = snapshot(&f, campaign_id).await;
        assert_eq!(campaign.funds_allocated, campaign.funds_distributed);
    }

    #[tokio::test]
    async fn refund_request_is_capped_at_refundable() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        let err = assert_err!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(1001), "cut", RefundType::MidCampaign)
                .await
        );
        assert!(matches!(err, SettlementError::ExceedsRefundable { .. }));

        let request = assert_ok!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(400), "cut", RefundType::MidCampaign)
                .await
        );
        assert_eq!(request.status, RefundStatus::Pending);
        assert_eq!(request.refundable_amount, Money::from_major(1000));
    }

    #[tokio::test]
    async fn approval_rechecks_the_ceiling() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        let request = assert_ok!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(800), "cut", RefundType::MidCampaign)
                .await
        );
        // 500 leaves the pool after the request was filed
        assert_ok!(
            f.settlement
                .distribute_to_creator(&f.brand, &order(campaign_id, ActorId::new(), 5000))
                .await
        );

        let err = assert_err!(
            f.settlement
                .approve_refund(&f.admin, request.refund_id, None, None)
                .await
        );
        assert!(matches!(err, SettlementError::ExceedsRefundable { .. }));

        let approval = assert_ok!(
            f.settlement
                .approve_refund(
                    &f.admin,
                    request.refund_id,
                    Some(Money::from_major(500)),
                    Some("partial".to_string()),
                )
                .await
        );
        assert_eq!(approval.request.status, RefundStatus::Completed);
        assert_eq!(approval.approved_amount, Money::from_major(500));
        assert_eq!(approval.new_wallet_balance, Money::from_major(500));
        let campaign = snapshot(&f, campaign_id).await;
        assert_eq!(campaign.funds_allocated, Money::from_major(500));
        assert_eq!(campaign.refundable(), Money::ZERO);
    }

    #[tokio::test]
    async fn only_admin_decides_and_terminal_states_stick() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        let request = assert_ok!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(100), "cut", RefundType::PartialReturn)
                .await
        );
        let err = assert_err!(
            f.settlement
                .approve_refund(&f.brand, request.refund_id, None, None)
                .await
        );
        assert!(matches!(err, SettlementError::Forbidden(_)));

        let blank = assert_err!(
            f.settlement
                .reject_refund(&f.admin, request.refund_id, "  ")
                .await
        );
        assert!(matches!(blank, SettlementError::InvalidRequest(_)));

        let rejected = assert_ok!(
            f.settlement
                .reject_refund(&f.admin, request.refund_id, "not eligible")
                .await
        );
        assert_eq!(rejected.status, RefundStatus::Rejected);

        let late = assert_err!(
            f.settlement
                .approve_refund(&f.admin, request.refund_id, None, None)
                .await
        );
        assert!(matches!(late, SettlementError::InvalidState(_)));
        assert_eq!(
            f.ledger.get_balance(ActorRef::brand(f.brand.actor_id)).await,
            Money::ZERO
        );
    }

    #[tokio::test]
    async fn approval_of_deleted_campaign_fails_request() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        let request = assert_ok!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(100), "cut", RefundType::MidCampaign)
                .await
        );
        assert_ok!(f.campaigns.remove(campaign_id).await);

        let err = assert_err!(
            f.settlement
                .approve_refund(&f.admin, request.refund_id, None, None)
                .await
        );
        assert!(matches!(err, SettlementError::CampaignNotFound(_)));
        let status = assert_ok!(f.settlement.refund_status(&f.brand, request.refund_id).await);
        assert_eq!(status.request.status, RefundStatus::Failed);
        assert_eq!(status.timeline.len(), 2);
    }

    #[tokio::test]
    async fn listings_respect_roles() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        let request = assert_ok!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(300), "cut", RefundType::MidCampaign)
                .await
        );
        assert_ok!(
            f.settlement
                .approve_refund(&f.admin, request.refund_id, None, None)
                .await
        );
        assert_ok!(
            f.settlement
                .request_refund(&f.brand, campaign_id, Money::from_major(100), "more", RefundType::MidCampaign)
                .await
        );

        let own = assert_ok!(
            f.settlement
                .list_refund_requests(&f.brand, RefundQuery::default(), None, 0)
                .await
        );
        assert_eq!(own.total, 2);
        let other_brand = Identity::new(Role::Brand, ActorId::new());
        let none = assert_ok!(
            f.settlement
                .list_refund_requests(&other_brand, RefundQuery::default(), None, 0)
                .await
        );
        assert_eq!(none.total, 0);

        let trail = assert_ok!(
            f.settlement
                .refund_audit_trail(&f.admin, RefundQuery::default(), None, 0)
                .await
        );
        assert_eq!(trail.summary.total_refunded, Money::from_major(300));
        assert_eq!(trail.summary.pending_approval, 1);
        assert!(
            f.settlement
                .refund_audit_trail(&f.brand, RefundQuery::default(), None, 0)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn concurrent_distributions_never_overdraw_the_pool() {
        let f = fixture();
        let campaign_id = funded_campaign(&f, 1000).await;
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let settlement = Arc::clone(&f.settlement);
            let brand = f.brand;
            tasks.push(tokio::spawn(async move {
                settlement
                    .distribute_to_creator(&brand, &order(campaign_id, ActorId::new(), 3000))
                    .await
            }));
        }
        let mut successes = 0;
        for task in tasks {
            let Ok(result) = task.await else {
                panic!("task panicked");
            };
            if result.is_ok() {
                successes += 1;
            }
        }
        // each payout is 300 gross; only three fit in 1000
        assert_eq!(successes, 3);
        let campaign = snapshot(&f, campaign_id).await;
        assert_eq!(campaign.funds_distributed, Money::from_major(900));
        assert!(campaign.funds_distributed <= campaign.funds_allocated);
    }
}
