//! Campaigns and their locked fund pools.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{ActorId, CampaignId, Identity, Money, Role};
use crate::error::SettlementError;

/// Payout terms of a campaign: `cpv` is paid per `view_threshold` views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayoutTerms {
    /// Price per completed view milestone.
    pub cpv: Money,
    /// Milestone size in views; always positive.
    pub view_threshold: u64,
}

impl PayoutTerms {
    /// Validates and creates payout terms.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] for a zero threshold and
    /// [`SettlementError::InvalidAmount`] for a zero CPV.
    pub fn new(cpv: Money, view_threshold: u64) -> Result<Self, SettlementError> {
        if view_threshold == 0 {
            return Err(SettlementError::InvalidRequest(
                "view_threshold must be greater than zero".to_string(),
            ));
        }
        cpv.ensure_positive()?;
        Ok(Self {
            cpv,
            view_threshold,
        })
    }
}

/// One marketing campaign together with its fund counters.
///
/// Invariant: `funds_distributed <= funds_allocated`. Every mutation goes
/// through the campaign's write lock in the service layer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Campaign {
    /// Campaign id.
    pub id: CampaignId,
    /// Owning brand.
    pub brand_id: ActorId,
    /// Display name.
    pub name: String,
    /// Social platform the clips are posted on.
    pub platform: String,
    /// Aspirational spend target; not a cap.
    pub budget: Money,
    /// Payout terms.
    #[serde(flatten)]
    pub terms: PayoutTerms,
    /// Money currently locked from the brand wallet.
    pub funds_allocated: Money,
    /// Money paid out of the pool so far (creator shares plus commission).
    pub funds_distributed: Money,
    /// Commission retained by the platform out of `funds_distributed`.
    pub commission_collected: Money,
    /// Aggregate views across accepted clips.
    pub total_view_count: u64,
    /// Submission deadline.
    pub deadline: DateTime<Utc>,
    /// Whether the campaign accepts clips.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last mutation.
    pub updated_at: DateTime<Utc>,
    /// Gross amount paid per creator.
    #[serde(skip)]
    pub paid_to_creators: HashMap<ActorId, Money>,
    /// Set once the campaign is removed; late lock holders see it as gone.
    #[serde(skip)]
    pub deleted: bool,
}

impl Campaign {
    /// Creates an active campaign with an empty pool.
    #[must_use]
    pub fn new(
        brand_id: ActorId,
        name: String,
        platform: String,
        budget: Money,
        terms: PayoutTerms,
        deadline: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CampaignId::new(),
            brand_id,
            name,
            platform,
            budget,
            terms,
            funds_allocated: Money::ZERO,
            funds_distributed: Money::ZERO,
            commission_collected: Money::ZERO,
            total_view_count: 0,
            deadline,
            is_active: true,
            created_at: now,
            updated_at: now,
            paid_to_creators: HashMap::new(),
            deleted: false,
        }
    }

    /// `funds_allocated - funds_distributed`: the ceiling for any reclaim,
    /// refund or payout.
    #[must_use]
    pub fn refundable(&self) -> Money {
        self.funds_allocated.saturating_sub(self.funds_distributed)
    }

    /// A campaign is live while it is active and its deadline has not passed.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.deadline
    }

    /// Gross amount already paid to `creator`.
    #[must_use]
    pub fn paid_to(&self, creator: ActorId) -> Money {
        self.paid_to_creators
            .get(&creator)
            .copied()
            .unwrap_or(Money::ZERO)
    }

    /// Fails if the campaign was deleted after the caller looked it up.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for deleted campaigns.
    pub fn ensure_present(&self) -> Result<(), SettlementError> {
        if self.deleted {
            return Err(SettlementError::CampaignNotFound(self.id));
        }
        Ok(())
    }

    /// Fails unless `brand` owns the campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for other brands.
    pub fn ensure_owner(&self, brand: ActorId) -> Result<(), SettlementError> {
        if self.brand_id != brand {
            return Err(SettlementError::Forbidden(format!(
                "campaign {} belongs to another brand",
                self.id
            )));
        }
        Ok(())
    }

    /// Fails unless the caller is the owning brand or an admin.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] otherwise.
    pub fn ensure_manager(&self, identity: &Identity) -> Result<(), SettlementError> {
        if identity.is_admin() {
            return Ok(());
        }
        if identity.role == Role::Brand {
            return self.ensure_owner(identity.actor_id);
        }
        Err(SettlementError::Forbidden(format!(
            "campaign {} can only be managed by its brand or an admin",
            self.id
        )))
    }

    /// Brands may only drain a pool that is no longer live; admins always
    /// may.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignLive`] for a non-admin caller
    /// while the campaign is live.
    pub fn ensure_drainable(&self, identity: &Identity, now: DateTime<Utc>) -> Result<(), SettlementError> {
        if !identity.is_admin() && self.is_live(now) {
            return Err(SettlementError::CampaignLive {
                deadline: self.deadline,
            });
        }
        Ok(())
    }

    /// Marks the campaign as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Shared handle to one campaign.
pub type CampaignHandle = Arc<RwLock<Campaign>>;

/// Central store of campaigns with per-campaign locking.
#[derive(Debug, Default)]
pub struct CampaignBook {
    campaigns: RwLock<HashMap<CampaignId, CampaignHandle>>,
}

impl CampaignBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidRequest`] if the id is taken.
    pub async fn insert(&self, campaign: Campaign) -> Result<CampaignId, SettlementError> {
        let id = campaign.id;
        let mut map = self.campaigns.write().await;
        if map.contains_key(&id) {
            return Err(SettlementError::InvalidRequest(format!(
                "campaign {id} already exists"
            )));
        }
        map.insert(id, Arc::new(RwLock::new(campaign)));
        Ok(id)
    }

    /// Returns the lock guarding a campaign.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids.
    pub async fn get(&self, id: CampaignId) -> Result<CampaignHandle, SettlementError> {
        let map = self.campaigns.read().await;
        map.get(&id)
            .cloned()
            .ok_or(SettlementError::CampaignNotFound(id))
    }

    /// Removes a campaign from the book.
    ///
    /// The caller is expected to have flagged the entry as deleted while
    /// holding its write lock.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::CampaignNotFound`] for unknown ids.
    pub async fn remove(&self, id: CampaignId) -> Result<CampaignHandle, SettlementError> {
        let mut map = self.campaigns.write().await;
        map.remove(&id).ok_or(SettlementError::CampaignNotFound(id))
    }

    /// Snapshots every campaign, optionally restricted to one brand.
    pub async fn list(&self, brand_filter: Option<ActorId>) -> Vec<Campaign> {
        let handles: Vec<CampaignHandle> = self.campaigns.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let campaign = handle.read().await;
            if let Some(brand) = brand_filter
                && campaign.brand_id != brand
            {
                continue;
            }
            out.push(campaign.clone());
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Returns handles to every campaign.
    pub async fn handles(&self) -> Vec<CampaignHandle> {
        self.campaigns.read().await.values().cloned().collect()
    }

    /// Number of campaigns.
    pub async fn len(&self) -> usize {
        self.campaigns.read().await.len()
    }

    /// Returns `true` if there are no campaigns.
    pub async fn is_empty(&self) -> bool {
        self.campaigns.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn make_campaign(brand: ActorId) -> Campaign {
        let Ok(terms) = PayoutTerms::new(Money::from_major(100), 1000) else {
            panic!("valid terms");
        };
        Campaign::new(
            brand,
            "Summer drop".to_string(),
            "instagram".to_string(),
            Money::from_major(10_000),
            terms,
            Utc::now() + Duration::days(7),
        )
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(PayoutTerms::new(Money::from_major(1), 0).is_err());
        assert!(PayoutTerms::new(Money::ZERO, 10).is_err());
    }

    #[test]
    fn live_requires_active_and_future_deadline() {
        let mut campaign = make_campaign(ActorId::new());
        let now = Utc::now();
        assert!(campaign.is_live(now));
        campaign.is_active = false;
        assert!(!campaign.is_live(now));
        campaign.is_active = true;
        campaign.deadline = now - Duration::days(1);
        assert!(!campaign.is_live(now));
    }

    #[test]
    fn refundable_is_allocated_minus_distributed() {
        let mut campaign = make_campaign(ActorId::new());
        campaign.funds_allocated = Money::from_major(3000);
        campaign.funds_distributed = Money::from_major(1200);
        assert_eq!(campaign.refundable(), Money::from_major(1800));
    }

    #[test]
    fn only_owner_and_admin_manage() {
        let brand = ActorId::new();
        let campaign = make_campaign(brand);
        assert!(campaign.ensure_manager(&Identity::new(Role::Brand, brand)).is_ok());
        assert!(campaign.ensure_manager(&Identity::new(Role::Admin, ActorId::new())).is_ok());
        assert!(campaign.ensure_manager(&Identity::new(Role::Brand, ActorId::new())).is_err());
        assert!(campaign.ensure_manager(&Identity::new(Role::Creator, brand)).is_err());
    }

    #[test]
    fn brands_wait_for_the_lock_to_lift_admins_do_not() {
        let brand = ActorId::new();
        let mut campaign = make_campaign(brand);
        let now = Utc::now();
        let owner = Identity::new(Role::Brand, brand);
        assert!(matches!(
            campaign.ensure_drainable(&owner, now),
            Err(SettlementError::CampaignLive { .. })
        ));
        assert!(campaign.ensure_drainable(&Identity::new(Role::Admin, ActorId::new()), now).is_ok());
        campaign.is_active = false;
        assert!(campaign.ensure_drainable(&owner, now).is_ok());
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let book = CampaignBook::new();
        let campaign = make_campaign(ActorId::new());
        let id = campaign.id;
        assert!(book.insert(campaign).await.is_ok());
        assert!(book.get(id).await.is_ok());
        assert!(book.remove(id).await.is_ok());
        assert!(matches!(
            book.get(id).await,
            Err(SettlementError::CampaignNotFound(_))
        ));
        assert!(book.is_empty().await);
    }

    #[tokio::test]
    async fn list_filters_by_brand() {
        let book = CampaignBook::new();
        let brand = ActorId::new();
        let _ = book.insert(make_campaign(brand)).await;
        let _ = book.insert(make_campaign(ActorId::new())).await;
        assert_eq!(book.list(None).await.len(), 2);
        assert_eq!(book.list(Some(brand)).await.len(), 1);
        assert_eq!(book.len().await, 2);
    }
}
