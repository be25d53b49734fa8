//! Payout calculator: read-only earnings projections.
//!
//! Earnings are stepwise. A creator earns exactly `cpv` for every complete
//! multiple of `view_threshold` views across their accepted clips in a
//! campaign; views short of the next multiple earn nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    ActorId, Campaign, CampaignBook, CampaignId, Clip, ClipBook, ClipStatus, CommissionRate,
    Identity, Money, PayoutTerms, Role,
};
use crate::error::SettlementError;

/// Earnings of one creator in one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Earnings {
    /// Views the calculation is based on.
    pub total_views: u64,
    /// Milestone size.
    pub view_threshold: u64,
    /// Price per milestone.
    pub cpv: Money,
    /// `floor(total_views / view_threshold)`.
    pub milestones_reached: u64,
    /// `milestones_reached * cpv`.
    pub total_earned: Money,
    /// Creator part of `total_earned`.
    pub creator_share: Money,
    /// Platform part of `total_earned`.
    pub platform_commission: Money,
    /// Commission rate applied, in basis points.
    pub commission_bps: u16,
    /// Gross amount already paid to this creator for this campaign.
    pub already_paid: Money,
    /// `total_earned - already_paid`, floored at zero.
    pub pending_amount: Money,
    /// Creator part of `pending_amount`.
    pub pending_creator_share: Money,
    /// Platform part of `pending_amount`.
    pub pending_commission: Money,
}

impl Earnings {
    /// Computes earnings from raw figures.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::AmountOverflow`] if `milestones * cpv`
    /// does not fit.
    pub fn compute(
        terms: PayoutTerms,
        rate: CommissionRate,
        total_views: u64,
        already_paid: Money,
    ) -> Result<Self, SettlementError> {
        // PayoutTerms guarantees a positive threshold
        let milestones_reached = total_views
            .checked_div(terms.view_threshold)
            .unwrap_or(0);
        let total_earned = terms
            .cpv
            .checked_mul(milestones_reached)
            .ok_or(SettlementError::AmountOverflow)?;
        let (creator_share, platform_commission) = rate.split(total_earned);
        let pending_amount = total_earned.saturating_sub(already_paid);
        let (pending_creator_share, pending_commission) = rate.split(pending_amount);
        Ok(Self {
            total_views,
            view_threshold: terms.view_threshold,
            cpv: terms.cpv,
            milestones_reached,
            total_earned,
            creator_share,
            platform_commission,
            commission_bps: rate.bps(),
            already_paid,
            pending_amount,
            pending_creator_share,
            pending_commission,
        })
    }
}

/// Earnings report for one creator, optionally with the clips behind it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EarningsReport {
    /// Campaign.
    pub campaign_id: CampaignId,
    /// Creator.
    pub creator_id: ActorId,
    /// Number of accepted clips counted.
    pub accepted_clips: usize,
    /// The calculation.
    pub earnings: Earnings,
    /// Accepted clips, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clips: Option<Vec<Clip>>,
}

/// Earnings of one creator within a campaign-wide report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatorPayout {
    /// Creator.
    pub creator_id: ActorId,
    /// The calculation.
    pub earnings: Earnings,
}

/// Creators a campaign still owes money to.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingPayouts {
    /// Campaign.
    pub campaign_id: CampaignId,
    /// Creators with a positive pending amount.
    pub creators: Vec<CreatorPayout>,
    /// Sum of the pending gross amounts.
    pub total_pending: Money,
    /// Undistributed pool the pending amounts would be paid from.
    pub refundable: Money,
}

/// Clip and view overview of a campaign.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceOverview {
    /// All clips.
    pub total_clips: usize,
    /// Accepted clips.
    pub accepted_clips: usize,
    /// Clips awaiting review.
    pub in_review_clips: usize,
    /// Rejected clips.
    pub rejected_clips: usize,
    /// Creators with at least one accepted clip.
    pub creators: usize,
    /// Views across accepted clips.
    pub total_views: u64,
    /// Milestones reached across creators.
    pub milestones_reached: u64,
}

/// Money overview of a campaign.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PerformanceFinancials {
    /// Aspirational budget.
    pub budget: Money,
    /// Pool size.
    pub funds_allocated: Money,
    /// Paid out of the pool.
    pub funds_distributed: Money,
    /// Still undistributed.
    pub refundable: Money,
    /// Commission retained so far.
    pub commission_collected: Money,
    /// Earned by all creators, paid or not.
    pub total_earned: Money,
    /// Earned but not yet paid.
    pub total_pending: Money,
    /// `funds_distributed / budget` in percent.
    pub budget_utilization_pct: f64,
}

/// One creator's row in a performance report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatorPerformance {
    /// Creator.
    pub creator_id: ActorId,
    /// Clips submitted.
    pub clips: usize,
    /// Clips accepted.
    pub accepted_clips: usize,
    /// The calculation over accepted clips.
    pub earnings: Earnings,
}

/// Campaign analytics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignPerformance {
    /// Campaign.
    pub campaign_id: CampaignId,
    /// Clip and view figures.
    pub overview: PerformanceOverview,
    /// Money figures.
    pub financial: PerformanceFinancials,
    /// Per-creator rows, ordered by creator id.
    pub creators: Vec<CreatorPerformance>,
}

#[derive(Default)]
struct CreatorTally {
    clips: usize,
    accepted: usize,
    views: u64,
}

fn tally_by_creator(clips: &[Clip]) -> BTreeMap<ActorId, CreatorTally> {
    let mut tallies: BTreeMap<ActorId, CreatorTally> = BTreeMap::new();
    for clip in clips {
        let tally = tallies.entry(clip.creator_id).or_default();
        tally.clips = tally.clips.saturating_add(1);
        if clip.is_accepted() {
            tally.accepted = tally.accepted.saturating_add(1);
            tally.views = tally.views.saturating_add(clip.view_count);
        }
    }
    tallies
}

/// Computes creator earnings from campaign terms and clip views.
#[derive(Debug)]
pub struct PayoutCalculator {
    campaigns: Arc<CampaignBook>,
    clips: Arc<ClipBook>,
    rate: CommissionRate,
}

impl PayoutCalculator {
    /// Creates a calculator applying `rate` to every payout.
    #[must_use]
    pub fn new(campaigns: Arc<CampaignBook>, clips: Arc<ClipBook>, rate: CommissionRate) -> Self {
        Self {
            campaigns,
            clips,
            rate,
        }
    }

    /// Configured commission rate.
    #[must_use]
    pub const fn rate(&self) -> CommissionRate {
        self.rate
    }

    /// Earnings of `creator` in `campaign` for a given view figure.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::AmountOverflow`] on overflow.
    pub fn earnings_for(
        &self,
        campaign: &Campaign,
        creator: ActorId,
        total_views: u64,
    ) -> Result<Earnings, SettlementError> {
        Earnings::compute(campaign.terms, self.rate, total_views, campaign.paid_to(creator))
    }

    /// Sum of the views of `creator`'s accepted clips in a campaign.
    pub async fn accepted_views(&self, campaign_id: CampaignId, creator: ActorId) -> u64 {
        self.clips
            .accepted_for(campaign_id, creator)
            .await
            .iter()
            .fold(0_u64, |acc, c| acc.saturating_add(c.view_count))
    }

    /// Earnings of one creator from their accepted clips.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown campaigns
    /// and [`SettlementError::Forbidden`] unless the caller is that creator,
    /// the owning brand or an admin.
    pub async fn calculate_earnings(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        creator_id: ActorId,
        include_clips: bool,
    ) -> Result<EarningsReport, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        let is_self = identity.role == Role::Creator && identity.actor_id == creator_id;
        if !is_self {
            campaign.ensure_manager(identity)?;
        }

        let clips = self.clips.accepted_for(campaign_id, creator_id).await;
        let total_views = clips
            .iter()
            .fold(0_u64, |acc, c| acc.saturating_add(c.view_count));
        let earnings = self.earnings_for(&campaign, creator_id, total_views)?;
        drop(campaign);

        tracing::debug!(%campaign_id, %creator_id, total_views, total_earned = %earnings.total_earned, "earnings calculated");
        Ok(EarningsReport {
            campaign_id,
            creator_id,
            accepted_clips: clips.len(),
            earnings,
            clips: include_clips.then_some(clips),
        })
    }

    /// Creators with earnings not yet paid out.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown campaigns
    /// and [`SettlementError::Forbidden`] unless the caller is the owning
    /// brand or an admin.
    pub async fn pending_payouts(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<PendingPayouts, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;

        let clips = self.clips.for_campaign(campaign_id).await;
        let mut creators = Vec::new();
        let mut total_pending = Money::ZERO;
        for (creator_id, tally) in tally_by_creator(&clips) {
            let earnings = self.earnings_for(&campaign, creator_id, tally.views)?;
            if earnings.pending_amount.is_zero() {
                continue;
            }
            total_pending = total_pending.try_add(earnings.pending_amount)?;
            creators.push(CreatorPayout {
                creator_id,
                earnings,
            });
        }
        Ok(PendingPayouts {
            campaign_id,
            creators,
            total_pending,
            refundable: campaign.refundable(),
        })
    }

    /// Clip, view and money analytics for a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown campaigns
    /// and [`SettlementError::Forbidden`] unless the caller is the owning
    /// brand or an admin.
    pub async fn campaign_performance(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
    ) -> Result<CampaignPerformance, SettlementError> {
        let handle = self.campaigns.get(campaign_id).await?;
        let campaign = handle.read().await;
        campaign.ensure_present()?;
        campaign.ensure_manager(identity)?;

        let clips = self.clips.for_campaign(campaign_id).await;
        let count = |status: ClipStatus| clips.iter().filter(|c| c.status == status).count();

        let mut rows = Vec::new();
        let mut total_views = 0_u64;
        let mut milestones_reached = 0_u64;
        let mut total_earned = Money::ZERO;
        let mut total_pending = Money::ZERO;
        for (creator_id, tally) in tally_by_creator(&clips) {
            let earnings = self.earnings_for(&campaign, creator_id, tally.views)?;
            total_views = total_views.saturating_add(tally.views);
            milestones_reached = milestones_reached.saturating_add(earnings.milestones_reached);
            total_earned = total_earned.try_add(earnings.total_earned)?;
            total_pending = total_pending.try_add(earnings.pending_amount)?;
            rows.push(CreatorPerformance {
                creator_id,
                clips: tally.clips,
                accepted_clips: tally.accepted,
                earnings,
            });
        }

        let overview = PerformanceOverview {
            total_clips: clips.len(),
            accepted_clips: count(ClipStatus::Accepted),
            in_review_clips: count(ClipStatus::InReview),
            rejected_clips: count(ClipStatus::Rejected),
            creators: rows.iter().filter(|r| r.accepted_clips > 0).count(),
            total_views,
            milestones_reached,
        };
        let financial = PerformanceFinancials {
            budget: campaign.budget,
            funds_allocated: campaign.funds_allocated,
            funds_distributed: campaign.funds_distributed,
            refundable: campaign.refundable(),
            commission_collected: campaign.commission_collected,
            total_earned,
            total_pending,
            budget_utilization_pct: campaign.funds_distributed.percentage_of(campaign.budget),
        };
        Ok(CampaignPerformance {
            campaign_id,
            overview,
            financial,
            creators: rows,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::campaign::tests::make_campaign;
    use tokio_test::{assert_err, assert_ok};

    fn terms() -> PayoutTerms {
        let Ok(terms) = PayoutTerms::new(Money::from_major(100), 1000) else {
            panic!("valid terms");
        };
        terms
    }

    fn rate(bps: u16) -> CommissionRate {
        let Ok(rate) = CommissionRate::from_bps(bps) else {
            panic!("valid rate");
        };
        rate
    }

    #[test]
    fn earnings_are_discretized_by_threshold() {
        let below = assert_ok!(Earnings::compute(terms(), rate(0), 1999, Money::ZERO));
        assert_eq!(below.milestones_reached, 1);
        assert_eq!(below.total_earned, Money::from_major(100));

        let exact = assert_ok!(Earnings::compute(terms(), rate(0), 2000, Money::ZERO));
        assert_eq!(exact.total_earned, Money::from_major(200));

        let none = assert_ok!(Earnings::compute(terms(), rate(0), 999, Money::ZERO));
        assert_eq!(none.total_earned, Money::ZERO);
    }

    #[test]
    fn pending_subtracts_what_was_paid() {
        let e = assert_ok!(Earnings::compute(
            terms(),
            rate(2000),
            30_000,
            Money::from_major(1000)
        ));
        assert_eq!(e.total_earned, Money::from_major(3000));
        assert_eq!(e.creator_share, Money::from_major(2400));
        assert_eq!(e.platform_commission, Money::from_major(600));
        assert_eq!(e.pending_amount, Money::from_major(2000));
        assert_eq!(e.pending_creator_share, Money::from_major(1600));
        assert_eq!(e.pending_commission, Money::from_major(400));
    }

    #[test]
    fn overpaid_creator_has_nothing_pending() {
        let e = assert_ok!(Earnings::compute(
            terms(),
            rate(2000),
            1000,
            Money::from_major(500)
        ));
        assert_eq!(e.pending_amount, Money::ZERO);
    }

    #[test]
    fn overflowing_earnings_are_rejected() {
        let Ok(huge) = PayoutTerms::new(Money::from_minor(u64::MAX), 1) else {
            panic!("valid terms");
        };
        let err = assert_err!(Earnings::compute(huge, rate(0), 2, Money::ZERO));
        assert!(matches!(err, SettlementError::AmountOverflow));
    }

    async fn setup() -> (PayoutCalculator, Arc<ClipBook>, Identity, CampaignId) {
        let campaigns = Arc::new(CampaignBook::new());
        let clips = Arc::new(ClipBook::new());
        let brand = Identity::new(Role::Brand, ActorId::new());
        let campaign_id = assert_ok!(campaigns.insert(make_campaign(brand.actor_id)).await);
        let calc = PayoutCalculator::new(campaigns, Arc::clone(&clips), rate(2000));
        (calc, clips, brand, campaign_id)
    }

    fn clip(campaign_id: CampaignId, creator: ActorId, views: u64, status: ClipStatus) -> Clip {
        let mut clip = Clip::new(campaign_id, creator, "https://example.com/p".to_string());
        clip.view_count = views;
        clip.status = status;
        clip
    }

    #[tokio::test]
    async fn only_accepted_clips_count() {
        let (calc, clips, brand, campaign_id) = setup().await;
        let creator = ActorId::new();
        clips
            .insert(clip(campaign_id, creator, 1500, ClipStatus::Accepted))
            .await;
        clips
            .insert(clip(campaign_id, creator, 500, ClipStatus::Accepted))
            .await;
        clips
            .insert(clip(campaign_id, creator, 9000, ClipStatus::Rejected))
            .await;

        let report = assert_ok!(
            calc.calculate_earnings(&brand, campaign_id, creator, true)
                .await
        );
        assert_eq!(report.earnings.total_views, 2000);
        assert_eq!(report.earnings.total_earned, Money::from_major(200));
        assert_eq!(report.accepted_clips, 2);
        assert_eq!(report.clips.map(|c| c.len()), Some(2));
    }

    #[tokio::test]
    async fn creator_sees_own_earnings_only() {
        let (calc, _clips, _brand, campaign_id) = setup().await;
        let creator = Identity::new(Role::Creator, ActorId::new());
        assert_ok!(
            calc.calculate_earnings(&creator, campaign_id, creator.actor_id, false)
                .await
        );
        let err = assert_err!(
            calc.calculate_earnings(&creator, campaign_id, ActorId::new(), false)
                .await
        );
        assert!(matches!(err, SettlementError::Forbidden(_)));
    }

    #[tokio::test]
    async fn pending_payouts_skip_creators_below_threshold() {
        let (calc, clips, brand, campaign_id) = setup().await;
        let earning = ActorId::new();
        clips
            .insert(clip(campaign_id, earning, 3000, ClipStatus::Accepted))
            .await;
        clips
            .insert(clip(campaign_id, ActorId::new(), 999, ClipStatus::Accepted))
            .await;

        let pending = assert_ok!(calc.pending_payouts(&brand, campaign_id).await);
        assert_eq!(pending.creators.len(), 1);
        assert_eq!(pending.total_pending, Money::from_major(300));
    }

    #[tokio::test]
    async fn performance_counts_clips_by_status() {
        let (calc, clips, brand, campaign_id) = setup().await;
        let creator = ActorId::new();
        clips
            .insert(clip(campaign_id, creator, 2500, ClipStatus::Accepted))
            .await;
        clips
            .insert(clip(campaign_id, creator, 0, ClipStatus::InReview))
            .await;
        clips
            .insert(clip(campaign_id, ActorId::new(), 0, ClipStatus::Rejected))
            .await;

        let perf = assert_ok!(calc.campaign_performance(&brand, campaign_id).await);
        assert_eq!(perf.overview.total_clips, 3);
        assert_eq!(perf.overview.accepted_clips, 1);
        assert_eq!(perf.overview.in_review_clips, 1);
        assert_eq!(perf.overview.rejected_clips, 1);
        assert_eq!(perf.overview.creators, 1);
        assert_eq!(perf.overview.milestones_reached, 2);
        assert_eq!(perf.financial.total_earned, Money::from_major(200));
        assert_eq!(perf.creators.len(), 2);
    }
}
