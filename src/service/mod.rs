//! Service layer: business logic orchestration.
//!
//! Services own `Arc` references to the domain books and emit events
//! through the shared [`super::domain::EventBus`] once a mutation has
//! committed.
//!
//! Locks are always taken in the same order: refund request, campaign,
//! clip, wallet, transaction log.
//!
//! - [`WalletLedger`]: balances, deposits, withdrawals, payout details.
//! - [`FundAllocator`]: moves money between brand wallets and campaign pools.
//! - [`PayoutCalculator`]: read-only earnings projections.
//! - [`SettlementService`]: distributions and refunds.
//! - [`CampaignService`]: campaign and clip lifecycle.

pub mod allocator;
pub mod campaign_service;
pub mod ledger;
pub mod payout;
pub mod settlement;

pub use allocator::{FundAllocator, FundsMovement};
pub use campaign_service::{
    CampaignDeletion, CampaignService, CampaignSummary, ClipReview, NewCampaign, ViewCountUpdate,
};
pub use ledger::{
    DEFAULT_PAGE_SIZE, DepositOutcome, GatewayOutcome, MAX_PAGE_SIZE, PayoutVerification, Posting,
    WalletLedger, WithdrawalOutcome, clamp_limit,
};
pub use payout::{
    CampaignPerformance, CreatorPayout, CreatorPerformance, Earnings, EarningsReport,
    PayoutCalculator, PendingPayouts, PerformanceFinancials, PerformanceOverview,
};
pub use settlement::{
    BulkDistribution, BulkItemResult, BulkItemStatus, BulkSummary, CampaignRefund,
    DistributionOrder, DistributionResult, RefundApproval, RefundAuditSummary, RefundAuditTrail,
    RefundPage, RefundQuery, RefundStatusView, RefundTimelineEntry, SettlementService,
};
