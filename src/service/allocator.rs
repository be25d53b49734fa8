//! Campaign fund allocator: moves money between a brand wallet and the
//! locked pool of one of its campaigns.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::WalletLedger;
use crate::domain::{
    ActorRef, CampaignBook, CampaignId, Identity, LedgerEvent, Money, NewTransaction, Role,
    TransactionId, TransactionType,
};
use crate::error::SettlementError;

/// Result of an allocation or a reclaim.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FundsMovement {
    /// Campaign whose pool changed.
    pub campaign_id: CampaignId,
    /// Amount moved.
    pub amount: Money,
    /// Brand balance after the move.
    pub new_wallet_balance: Money,
    /// Campaign pool after the move.
    pub new_funds_allocated: Money,
    /// Ledger entry of the move.
    pub transaction_id: TransactionId,
}

/// Allocates and reclaims campaign funds.
///
/// Each operation holds the campaign lock and then the brand wallet lock
/// for the whole validate-then-commit sequence, so the wallet debit and
/// the pool increment are applied together or not at all.
#[derive(Debug)]
pub struct FundAllocator {
    campaigns: Arc<CampaignBook>,
    ledger: Arc<WalletLedger>,
}

impl FundAllocator {
    /// Creates an allocator.
    #[must_use]
    pub fn new(campaigns: Arc<CampaignBook>, ledger: Arc<WalletLedger>) -> Self {
        Self { campaigns, ledger }
    }

    /// Moves `amount` from the calling brand's wallet into the campaign
    /// pool.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAmount`] for zero amounts,
    /// [`SettlementError::Forbidden`] unless the caller is the owning brand,
    /// [`SettlementError::CampaignNotFound`] for unknown campaigns and
    /// [`SettlementError::InsufficientFunds`] if the wallet is too low. No
    /// state changes on error.
    pub async fn allocate(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        amount: Money,
    ) -> Result<FundsMovement, SettlementError> {
        amount.ensure_positive()?;
        identity.require(Role::Brand)?;
        let owner = ActorRef::brand(identity.actor_id);

        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_owner(owner.id)?;

        let wallet_handle = self.ledger.wallet(owner).await;
        let mut wallet = wallet_handle.write().await;
        let new_wallet_balance = match wallet.balance_after_debit(amount) {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(%campaign_id, brand_id = %owner.id, %amount, balance = %wallet.balance, "allocation rejected");
                return Err(e);
            }
        };
        let new_funds_allocated = campaign.funds_allocated.try_add(amount)?;

        let transaction = self
            .ledger
            .post(
                NewTransaction::success(
                    owner,
                    TransactionType::Allocation,
                    amount,
                    format!("Budget allocated to campaign {}", campaign.name),
                )
                .for_campaign(campaign_id),
            )
            .await;
        wallet.set_balance(new_wallet_balance);
        campaign.funds_allocated = new_funds_allocated;
        campaign.touch();
        drop(wallet);
        drop(campaign);

        tracing::info!(%campaign_id, brand_id = %owner.id, %amount, %new_wallet_balance, %new_funds_allocated, "funds allocated");
        let transaction_id = transaction.id;
        self.ledger.event_bus().publish_all([
            LedgerEvent::FundsAllocated {
                campaign_id,
                brand_id: owner.id,
                amount,
                funds_allocated: new_funds_allocated,
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(transaction),
        ]);
        Ok(FundsMovement {
            campaign_id,
            amount,
            new_wallet_balance,
            new_funds_allocated,
            transaction_id,
        })
    }

    /// Moves `amount` of undistributed pool money back to the calling
    /// brand's wallet.
    ///
    /// Refused while the campaign is live (active and before its
    /// deadline).
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAmount`] for zero amounts,
    /// [`SettlementError::Forbidden`] unless the caller is the owning brand,
    /// [`SettlementError::CampaignLive`] while the campaign is live and
    /// [`SettlementError::OverReclaim`] if `amount` exceeds
    /// `funds_allocated - funds_distributed`. No state changes on error.
    pub async fn reclaim(
        &self,
        identity: &Identity,
        campaign_id: CampaignId,
        amount: Money,
    ) -> Result<FundsMovement, SettlementError> {
        amount.ensure_positive()?;
        identity.require(Role::Brand)?;
        let owner = ActorRef::brand(identity.actor_id);

        let handle = self.campaigns.get(campaign_id).await?;
        let mut campaign = handle.write().await;
        campaign.ensure_present()?;
        campaign.ensure_owner(owner.id)?;

        if campaign.is_live(Utc::now()) {
            tracing::warn!(%campaign_id, deadline = %campaign.deadline, "reclaim refused on live campaign");
            return Err(SettlementError::CampaignLive {
                deadline: campaign.deadline,
            });
        }
        let refundable = campaign.refundable();
        if amount > refundable {
            tracing::warn!(%campaign_id, %amount, %refundable, "reclaim exceeds undistributed funds");
            return Err(SettlementError::OverReclaim {
                refundable,
                requested: amount,
            });
        }
        let new_funds_allocated = campaign
            .funds_allocated
            .checked_sub(amount)
            .ok_or(SettlementError::OverReclaim {
                refundable,
                requested: amount,
            })?;

        let wallet_handle = self.ledger.wallet(owner).await;
        let mut wallet = wallet_handle.write().await;
        let new_wallet_balance = wallet.balance_after_credit(amount)?;

        let transaction = self
            .ledger
            .post(
                NewTransaction::success(
                    owner,
                    TransactionType::Reclaim,
                    amount,
                    format!("Budget reclaimed from campaign {}", campaign.name),
                )
                .for_campaign(campaign_id),
            )
            .await;
        wallet.set_balance(new_wallet_balance);
        campaign.funds_allocated = new_funds_allocated;
        campaign.touch();
        drop(wallet);
        drop(campaign);

        tracing::info!(%campaign_id, brand_id = %owner.id, %amount, %new_wallet_balance, %new_funds_allocated, "funds reclaimed");
        let transaction_id = transaction.id;
        self.ledger.event_bus().publish_all([
            LedgerEvent::FundsReclaimed {
                campaign_id,
                brand_id: owner.id,
                amount,
                funds_allocated: new_funds_allocated,
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(transaction),
        ]);
        Ok(FundsMovement {
            campaign_id,
            amount,
            new_wallet_balance,
            new_funds_allocated,
            transaction_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::campaign::tests::make_campaign;
    use crate::domain::{
        ActorId, EventBus, PayoutDetailsBook, TransactionFilter, TransactionLog, WalletBook,
    };
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    struct Fixture {
        allocator: FundAllocator,
        ledger: Arc<WalletLedger>,
        campaigns: Arc<CampaignBook>,
        brand: Identity,
        campaign_id: CampaignId,
    }

    async fn fixture(balance: u64) -> Fixture {
        let campaigns = Arc::new(CampaignBook::new());
        let ledger = Arc::new(WalletLedger::new(
            Arc::new(WalletBook::new()),
            Arc::new(TransactionLog::new()),
            Arc::new(PayoutDetailsBook::new()),
            EventBus::new(64),
        ));
        let brand = Identity::new(Role::Brand, ActorId::new());
        if balance > 0 {
            assert_ok!(
                ledger
                    .credit(
                        ActorRef::brand(brand.actor_id),
                        Money::from_major(balance),
                        TransactionType::Deposit,
                        "seed",
                    )
                    .await
            );
        }
        let campaign_id = assert_ok!(campaigns.insert(make_campaign(brand.actor_id)).await);
        Fixture {
            allocator: FundAllocator::new(Arc::clone(&campaigns), Arc::clone(&ledger)),
            ledger,
            campaigns,
            brand,
            campaign_id,
        }
    }

    async fn end_campaign(f: &Fixture) {
        let handle = assert_ok!(f.campaigns.get(f.campaign_id).await);
        handle.write().await.deadline = Utc::now() - Duration::hours(1);
    }

    #[tokio::test]
    async fn allocation_moves_wallet_money_into_pool() {
        let f = fixture(5000).await;
        let moved = assert_ok!(
            f.allocator
                .allocate(&f.brand, f.campaign_id, Money::from_major(3000))
                .await
        );
        assert_eq!(moved.new_wallet_balance, Money::from_major(2000));
        assert_eq!(moved.new_funds_allocated, Money::from_major(3000));

        let owner = ActorRef::brand(f.brand.actor_id);
        let allocations = TransactionFilter {
            txn_type: Some(TransactionType::Allocation),
            ..TransactionFilter::default()
        };
        let page = f
            .ledger
            .log()
            .query((owner.kind, owner.id), &allocations, 10, 0)
            .await;
        assert_eq!(page.total, 1);
        assert_eq!(
            page.transactions.first().map(|t| t.amount),
            Some(Money::from_major(3000))
        );
    }

    #[tokio::test]
    async fn insufficient_balance_rolls_back_everything() {
        let f = fixture(100).await;
        let err = assert_err!(
            f.allocator
                .allocate(&f.brand, f.campaign_id, Money::from_major(101))
                .await
        );
        assert!(matches!(err, SettlementError::InsufficientFunds { .. }));
        let handle = assert_ok!(f.campaigns.get(f.campaign_id).await);
        assert_eq!(handle.read().await.funds_allocated, Money::ZERO);
        assert_eq!(
            f.ledger.get_balance(ActorRef::brand(f.brand.actor_id)).await,
            Money::from_major(100)
        );
        // only the seed deposit
        assert_eq!(f.ledger.log().len().await, 1);
    }

    #[tokio::test]
    async fn other_brand_is_forbidden() {
        let f = fixture(100).await;
        let stranger = Identity::new(Role::Brand, ActorId::new());
        let err = assert_err!(
            f.allocator
                .allocate(&stranger, f.campaign_id, Money::from_major(1))
                .await
        );
        assert!(matches!(err, SettlementError::Forbidden(_)));
    }

    #[tokio::test]
    async fn zero_amount_is_invalid() {
        let f = fixture(100).await;
        let err = assert_err!(f.allocator.allocate(&f.brand, f.campaign_id, Money::ZERO).await);
        assert!(matches!(err, SettlementError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn reclaim_is_locked_while_live() {
        let f = fixture(1000).await;
        assert_ok!(
            f.allocator
                .allocate(&f.brand, f.campaign_id, Money::from_major(500))
                .await
        );
        let err = assert_err!(
            f.allocator
                .reclaim(&f.brand, f.campaign_id, Money::from_major(100))
                .await
        );
        assert!(matches!(err, SettlementError::CampaignLive { .. }));
        let handle = assert_ok!(f.campaigns.get(f.campaign_id).await);
        assert_eq!(handle.read().await.funds_allocated, Money::from_major(500));
    }

    #[tokio::test]
    async fn inactive_campaign_can_be_reclaimed_before_deadline() {
        let f = fixture(1000).await;
        assert_ok!(
            f.allocator
                .allocate(&f.brand, f.campaign_id, Money::from_major(500))
                .await
        );
        let handle = assert_ok!(f.campaigns.get(f.campaign_id).await);
        handle.write().await.is_active = false;
        assert_ok!(
            f.allocator
                .reclaim(&f.brand, f.campaign_id, Money::from_major(500))
                .await
        );
    }

    #[tokio::test]
    async fn allocate_then_reclaim_round_trips() {
        let f = fixture(5000).await;
        assert_ok!(
            f.allocator
                .allocate(&f.brand, f.campaign_id, Money::from_major(1200))
                .await
        );
        end_campaign(&f).await;
        let back = assert_ok!(
            f.allocator
                .reclaim(&f.brand, f.campaign_id, Money::from_major(1200))
                .await
        );
        assert_eq!(back.new_wallet_balance, Money::from_major(5000));
        assert_eq!(back.new_funds_allocated, Money::ZERO);
    }

    #[tokio::test]
    async fn reclaim_cannot_touch_distributed_money() {
        let f = fixture(5000).await;
        assert_ok!(
            f.allocator
                .allocate(&f.brand, f.campaign_id, Money::from_major(1000))
                .await
        );
        end_campaign(&f).await;
        let handle = assert_ok!(f.campaigns.get(f.campaign_id).await);
        handle.write().await.funds_distributed = Money::from_major(700);

        let err = assert_err!(
            f.allocator
                .reclaim(&f.brand, f.campaign_id, Money::from_major(301))
                .await
        );
        assert!(matches!(
            err,
            SettlementError::OverReclaim { refundable, .. } if refundable == Money::from_major(300)
        ));
        assert_ok!(
            f.allocator
                .reclaim(&f.brand, f.campaign_id, Money::from_major(300))
                .await
        );
        let campaign = handle.read().await;
        assert!(campaign.funds_distributed <= campaign.funds_allocated);
    }
}
