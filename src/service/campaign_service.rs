//! Campaign and clip lifecycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::SettlementService;
use crate::domain::{
    ActorId, Campaign, CampaignBook, CampaignChange, CampaignId, Clip, ClipBook, ClipId,
    ClipStatus, EventBus, Identity, LedgerEvent, Money, PayoutTerms, RefundId, Role,
};
use crate::error::SettlementError;

/// Input for [`CampaignService::create_campaign`].
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Display name.
    pub name: String,
    /// Social platform.
    pub platform: String,
    /// Spending target.
    pub budget: Money,
    /// Price per `view_threshold` views.
    pub cpv: Money,
    /// Views per milestone.
    pub view_threshold: u64,
    /// End of the submission window.
    pub deadline: DateTime<Utc>,
}

/// Review decision for a clip.
#[derive(Debug, Clone)]
pub struct ClipReview {
    /// `accepted` or `rejected`.
    pub status: ClipStatus,
    /// Reviewer feedback.
    pub feedback: Option<String>,
    /// Platform media id of the accepted post.
    pub media_id: Option<String>,
    /// Caption of the accepted post.
    pub caption: Option<String>,
    /// When the accepted post went live.
    pub posted_at: Option<DateTime<Utc>>,
}

/// Result of a view count update.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViewCountUpdate {
    /// Clip updated.
    pub clip_id: ClipId,
    /// Views before the update.
    pub old_view_count: u64,
    /// Views after the update.
    pub new_view_count: u64,
    /// Campaign aggregate after the update.
    pub campaign_total_view_count: u64,
}

/// Result of deleting a campaign.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignDeletion {
    /// Campaign removed.
    pub campaign_id: CampaignId,
    /// Amount returned to the brand before removal.
    pub refunded_amount: Money,
    /// Brand balance afterwards.
    pub new_wallet_balance: Money,
    /// Audit record of the deletion refund, when money moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<RefundId>,
    /// Clips removed together with the campaign.
    pub clips_removed: usize,
}

/// Financial snapshot of one campaign.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignSummary {
    /// Campaign id.
    pub campaign_id: CampaignId,
    /// Display name.
    pub name: String,
    /// Spending target.
    pub budget: Money,
    /// Money locked in the pool.
    pub funds_allocated: Money,
    /// Money paid out of the pool.
    pub funds_distributed: Money,
    /// `funds_allocated - funds_distributed`.
    pub refundable: Money,
    /// Commission collected on payouts.
    pub platform_earnings: Money,
    /// `funds_distributed` as a percentage of `funds_allocated`.
    pub utilization_pct: f64,
    /// Distinct creators with at least one clip.
    pub creator_count: usize,
    /// Clips submitted.
    pub clip_count: usize,
    /// Clips accepted.
    pub accepted_clip_count: usize,
    /// Views across accepted clips.
    pub total_view_count: u64,
    /// Whether the campaign is active.
    pub is_active: bool,
    /// Submission deadline.
    pub deadline: DateTime<Utc>,
}

/// Coordinates campaign and clip state.
#[derive(Debug)]
pub struct CampaignService {
    campaigns: Arc<CampaignBook>,
    clips: Arc<ClipBook>,
    settlement: Arc<SettlementService>,
    event_bus: EventBus,
}

impl CampaignService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        campaigns: Arc<CampaignBook>,
        clips: Arc<ClipBook>,
        settlement: Arc<SettlementService>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            campaigns,
            clips,
            settlement,
            event_bus,
        }
    }

    /// Creates an active campaign with an empty pool.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-brand callers,
    /// [`SettlementError::InvalidRequest`] for a blank name or a past
    /// deadline, and [`SettlementError::InvalidAmount`] for invalid money
    /// terms.
    pub async fn create_campaign(
        &self,
        identity: &Identity,
        input: NewCampaign,
    ) -> Result<Campaign, SettlementError> {
        identity.require(Role::Brand)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(SettlementError::InvalidRequest(
                "campaign name must not be empty".to_string(),
            ));
        }
        if input.deadline <= Utc::now() {
            return Err(SettlementError::InvalidRequest(
                "deadline must be in the future".to_string(),
            ));
        }
        input.budget.ensure_positive()?;
        let terms = PayoutTerms::new(input.cpv, input.view_threshold)?;

        let campaign = Campaign::new(
            identity.actor_id,
            name.to_string(),
            input.platform.trim().to_string(),
            input.budget,
            terms,
            input.deadline,
        );
        let snapshot = campaign.clone();
        let campaign_id = self.campaigns.insert(campaign).await?;

        tracing::info!(%campaign_id, brand_id = %identity.actor_id, budget = %snapshot.budget, "campaign created");
        self.event_bus.publish(LedgerEvent::CampaignCreated {
            campaign_id,
            brand_id: identity.actor_id,
            timestamp: snapshot.created_at,
        });
        Ok(snapshot)
    }

    /// Snapshot of a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids.
    pub async fn get_campaign(&self, campaign_id: CampaignId) -> Result<Campaign, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        Ok(campaign.clone())
    }

    /// Campaigns visible to the caller: brands see their own, creators see
    /// campaigns open for submissions, admins see everything.
    pub async fn list_campaigns(&self, identity: &Identity) -> Vec<Campaign> {
        match identity.role {
            Role::Brand => self.campaigns.list(Some(identity.actor_id)).await,
            Role::Admin => self.campaigns.list(None).await,
            Role::Creator => {
                let now = Utc::now();
                let mut live = self.campaigns.list(None).await;
                live.retain(|c| c.is_live(now));
                live
            }
        }
    }

    /// Activates or deactivates a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids and
    /// [`SettlementError::Forbidden`] unless the caller owns the campaign.
    pub async fn set_active(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        is_active: bool,
    ) -> Result<Campaign, SettlementError> {
        identity.require(Role::Brand)?;
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_owner(identity.actor_id)?;
        campaign.is_active = is_active;
        campaign.touch();
        let snapshot = campaign.clone();
        drop(campaign);

        tracing::info!(%campaign_id, is_active, "campaign activity changed");
        self.event_bus.publish(LedgerEvent::CampaignActivityChanged {
            campaign_id,
            is_active,
            timestamp: snapshot.updated_at,
        });
        Ok(snapshot)
    }

    /// Moves the submission deadline. Only the owning brand may, and only
    /// to a future instant.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller owns the
    /// campaign and [`SettlementError::InvalidRequest`] for a past deadline.
    pub async fn update_deadline(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        deadline: DateTime<Utc>,
    ) -> Result<Campaign, SettlementError> {
        identity.require(Role::Brand)?;
        if deadline <= Utc::now() {
            return Err(SettlementError::InvalidRequest(
                "deadline must be in the future".to_string(),
            ));
        }
        self.update_owned(identity, campaign_id, |campaign| {
            campaign.deadline = deadline;
            Ok(CampaignChange::Deadline { deadline })
        })
        .await
    }

    /// Changes the milestone size. Payouts already made stay put; later
    /// distributions use the new threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller owns the
    /// campaign and [`SettlementError::InvalidRequest`] for a zero
    /// threshold.
    pub async fn update_view_threshold(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        view_threshold: u64,
    ) -> Result<Campaign, SettlementError> {
        identity.require(Role::Brand)?;
        self.update_owned(identity, campaign_id, |campaign| {
            campaign.terms = PayoutTerms::new(campaign.terms.cpv, view_threshold)?;
            Ok(CampaignChange::ViewThreshold { view_threshold })
        })
        .await
    }

    /// Changes the spending target. The pool is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller owns the
    /// campaign and [`SettlementError::InvalidAmount`] for a zero budget.
    pub async fn update_budget(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        budget: Money,
    ) -> Result<Campaign, SettlementError> {
        identity.require(Role::Brand)?;
        budget.ensure_positive()?;
        self.update_owned(identity, campaign_id, |campaign| {
            campaign.budget = budget;
            Ok(CampaignChange::Budget { budget })
        })
        .await
    }

    /// Re-sums `total_view_count` from the campaign's accepted clips.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller is the
    /// owning brand or an admin.
    pub async fn recompute_view_count(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<Campaign, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;
        let total_view_count = self
            .clips
            .for_campaign(campaign_id)
            .await
            .iter()
            .filter(|c| c.is_accepted())
            .fold(0_u64, |sum, c| sum.saturating_add(c.view_count));
        let previous = campaign.total_view_count;
        campaign.total_view_count = total_view_count;
        campaign.touch();
        let snapshot = campaign.clone();
        drop(campaign);

        tracing::info!(%campaign_id, previous, total_view_count, "campaign views recounted");
        self.event_bus.publish(LedgerEvent::CampaignUpdated {
            campaign_id,
            change: CampaignChange::ViewCount { total_view_count },
            timestamp: snapshot.updated_at,
        });
        Ok(snapshot)
    }

    /// Applies an owner-only setting change under the campaign write lock.
    async fn update_owned(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        apply: impl FnOnce(&mut Campaign) -> Result<CampaignChange, SettlementError>,
    ) -> Result<Campaign, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_owner(identity.actor_id)?;
        let change = apply(&mut *campaign)?;
        campaign.touch();
        let snapshot = campaign.clone();
        drop(campaign);

        tracing::info!(%campaign_id, ?change, "campaign updated");
        self.event_bus.publish(LedgerEvent::CampaignUpdated {
            campaign_id,
            change,
            timestamp: snapshot.updated_at,
        });
        Ok(snapshot)
    }

    /// Refunds whatever is left in the pool, then removes the campaign and
    /// its clips.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids,
    /// [`SettlementError::Forbidden`] unless the caller is the owning brand
    /// or an admin, and [`SettlementError::CampaignLive`] when the brand
    /// asks while the campaign is live.
    pub async fn delete_campaign(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<CampaignDeletion, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;
        campaign.ensure_drainable(identity, Utc::now())?;
        let brand_id = campaign.brand_id;

        let refund = self.settlement.refund_locked(&mut campaign).await?;
        let refund_id = if refund.amount.is_zero() {
            None
        } else {
            Some(
                self.settlement
                    .record_deletion_refund(campaign_id, brand_id, refund.amount, refund.transaction_id)
                    .await?,
            )
        };
        campaign.deleted = true;
        campaign.touch();
        self.campaigns.remove(campaign_id).await?;
        let clips_removed = self.clips.remove_for_campaign(campaign_id).await;
        drop(campaign);

        tracing::info!(%campaign_id, %brand_id, refunded = %refund.amount, clips_removed, "campaign deleted");
        self.event_bus.publish_all(refund.events);
        self.event_bus.publish(LedgerEvent::CampaignDeleted {
            campaign_id,
            brand_id,
            refunded: refund.amount,
            timestamp: Utc::now(),
        });
        Ok(CampaignDeletion {
            campaign_id,
            refunded_amount: refund.amount,
            new_wallet_balance: refund.new_wallet_balance,
            refund_id,
            clips_removed,
        })
    }

    /// Marks active campaigns whose deadline is at or before `now` as
    /// inactive. Returns the ids that changed.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Vec<CampaignId> {
        let mut expired = Vec::new();
        for handle in self.campaigns.handles().await {
            let mut campaign = handle.write().await;
            if campaign.deleted || !campaign.is_active || campaign.deadline > now {
                continue;
            }
            campaign.is_active = false;
            campaign.touch();
            expired.push(campaign.id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired campaigns deactivated");
        }
        self.event_bus
            .publish_all(expired.iter().map(|&campaign_id| LedgerEvent::CampaignActivityChanged {
                campaign_id,
                is_active: false,
                timestamp: now,
            }));
        expired
    }

    /// Submits a clip for review.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-creator callers,
    /// [`SettlementError::InvalidRequest`] for a blank URL and
    /// [`SettlementError::InvalidState`] if the campaign is not live.
    pub async fn submit_clip(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        clip_url: &str,
    ) -> Result<Clip, SettlementError> {
        identity.require(Role::Creator)?;
        let clip_url = clip_url.trim();
        if clip_url.is_empty() {
            return Err(SettlementError::InvalidRequest(
                "clip_url must not be empty".to_string(),
            ));
        }
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        if !campaign.is_live(Utc::now()) {
            return Err(SettlementError::InvalidState(format!(
                "campaign {campaign_id} is not accepting submissions"
            )));
        }
        let clip = Clip::new(campaign_id, identity.actor_id, clip_url.to_string());
        self.clips.insert(clip.clone()).await;
        drop(campaign);

        tracing::info!(clip_id = %clip.id, %campaign_id, creator_id = %identity.actor_id, "clip submitted");
        Ok(clip)
    }

    /// Accepts or rejects a clip. Acceptance adds its views to the
    /// campaign aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-admin callers,
    /// [`SettlementError::ClipNotFound`] for unknown clips and
    /// [`SettlementError::InvalidState`] for clips already reviewed.
    pub async fn review_clip(
        &self,
        identity: &Identity,
        clip_id: ClipId,
        review: ClipReview,
    ) -> Result<Clip, SettlementError> {
        identity.require(Role::Admin)?;
        let campaign_id = self.clips.get(clip_id).await?.campaign_id;
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;

        let clip = self
            .clips
            .update(clip_id, |clip| {
                clip.review(review.status, review.feedback)?;
                if clip.is_accepted() {
                    clip.media_id = review.media_id;
                    clip.caption = review.caption;
                    clip.posted_at = review.posted_at;
                }
                Ok(clip.clone())
            })
            .await?;
        if clip.is_accepted() {
            campaign.total_view_count = campaign.total_view_count.saturating_add(clip.view_count);
            campaign.touch();
        }
        drop(campaign);

        tracing::info!(%clip_id, %campaign_id, status = %clip.status, "clip reviewed");
        self.event_bus.publish(LedgerEvent::ClipReviewed {
            clip_id,
            campaign_id,
            status: clip.status,
            timestamp: Utc::now(),
        });
        Ok(clip)
    }

    /// Records a new view count from the platform poller.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-admin callers and
    /// [`SettlementError::ClipNotFound`] for unknown clips.
    pub async fn update_clip_view_count(
        &self,
        identity: &Identity,
        clip_id: ClipId,
        view_count: u64,
    ) -> Result<ViewCountUpdate, SettlementError> {
        identity.require(Role::Admin)?;
        let campaign_id = self.clips.get(clip_id).await?.campaign_id;
        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;

        let (old_view_count, accepted) = self
            .clips
            .update(clip_id, |clip| {
                let old = clip.view_count;
                clip.view_count = view_count;
                Ok((old, clip.is_accepted()))
            })
            .await?;
        if accepted {
            campaign.total_view_count = campaign
                .total_view_count
                .saturating_sub(old_view_count)
                .saturating_add(view_count);
            campaign.touch();
        }
        let campaign_total_view_count = campaign.total_view_count;
        drop(campaign);

        tracing::debug!(%clip_id, old_view_count, view_count, "clip views updated");
        Ok(ViewCountUpdate {
            clip_id,
            old_view_count,
            new_view_count: view_count,
            campaign_total_view_count,
        })
    }

    /// Deletes a clip. Creators may delete their own clips while they have
    /// been paid nothing by the campaign; admins always may.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::ClipNotFound`] for unknown clips,
    /// [`SettlementError::Forbidden`] for other callers and
    /// [`SettlementError::InvalidState`] once the creator has been paid.
    pub async fn delete_clip(&self, identity: &Identity, clip_id: ClipId) -> Result<Clip, SettlementError> {
        let clip = self.clips.get(clip_id).await?;
        match identity.role {
            Role::Admin => {}
            Role::Creator if identity.actor_id == clip.creator_id => {}
            _ => {
                return Err(SettlementError::Forbidden(format!(
                    "clip {clip_id} belongs to another creator"
                )));
            }
        }
        // a campaign deleted mid-request leaves no handle to update
        let handle = self.campaigns.get(clip.campaign_id).await.ok();
        let mut campaign = match &handle {
            Some(h) => Some(h.write().await),
            None => None,
        };
        if let Some(c) = campaign.as_deref()
            && identity.role == Role::Creator
            && !c.paid_to(clip.creator_id).is_zero()
        {
            return Err(SettlementError::InvalidState(format!(
                "clip {clip_id} cannot be deleted after payouts"
            )));
        }
        let removed = self.clips.remove(clip_id).await?;
        if let Some(c) = campaign.as_deref_mut()
            && removed.is_accepted()
        {
            c.total_view_count = c.total_view_count.saturating_sub(removed.view_count);
            c.touch();
        }
        drop(campaign);

        tracing::info!(%clip_id, campaign_id = %removed.campaign_id, "clip deleted");
        Ok(removed)
    }

    /// Clips of a campaign: managers see all, creators see their own.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids and
    /// [`SettlementError::Forbidden`] for brands that do not own it.
    pub async fn campaign_clips(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<Vec<Clip>, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        let mut clips = self.clips.for_campaign(campaign_id).await;
        if identity.role == Role::Creator {
            clips.retain(|c| c.creator_id == identity.actor_id);
        } else {
            campaign.ensure_manager(identity)?;
        }
        Ok(clips)
    }

    /// Financial snapshot of a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids and
    /// [`SettlementError::Forbidden`] unless the caller manages it.
    pub async fn campaign_summary(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<CampaignSummary, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;
        let clips = self.clips.for_campaign(campaign_id).await;
        let creators: HashSet<ActorId> = clips.iter().map(|c| c.creator_id).collect();

        tracing::debug!(%campaign_id, "campaign summary");
        Ok(CampaignSummary {
            campaign_id,
            name: campaign.name.clone(),
            budget: campaign.budget,
            funds_allocated: campaign.funds_allocated,
            funds_distributed: campaign.funds_distributed,
            refundable: campaign.refundable(),
            platform_earnings: campaign.commission_collected,
            utilization_pct: campaign.funds_distributed.percentage_of(campaign.funds_allocated),
            creator_count: creators.len(),
            clip_count: clips.len(),
            accepted_clip_count: clips.iter().filter(|c| c.is_accepted()).count(),
            total_view_count: campaign.total_view_count,
            is_active: campaign.is_active,
            deadline: campaign.deadline,
        })
    }
}
