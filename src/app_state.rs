//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::SettlementConfig;
use crate::domain::{
    CampaignBook, ClipBook, EventBus, PayoutDetailsBook, RefundBook, TransactionLog, WalletBook,
};
use crate::service::{
    CampaignService, FundAllocator, PayoutCalculator, SettlementService, WalletLedger,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Wallets, transactions and payout details.
    pub ledger: Arc<WalletLedger>,
    /// Brand wallet to campaign pool movements.
    pub allocator: Arc<FundAllocator>,
    /// Read-only earnings projections.
    pub calculator: Arc<PayoutCalculator>,
    /// Distributions and refunds.
    pub settlement: Arc<SettlementService>,
    /// Campaign and clip lifecycle.
    pub campaigns: Arc<CampaignService>,
    /// Event bus shared by every service.
    pub event_bus: EventBus,
    /// Display currency code.
    pub currency: Arc<str>,
}

impl AppState {
    /// Builds empty books and wires every service around them.
    #[must_use]
    pub fn new(config: &SettlementConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let campaign_book = Arc::new(CampaignBook::new());
        let clip_book = Arc::new(ClipBook::new());

        let ledger = Arc::new(WalletLedger::new(
            Arc::new(WalletBook::new()),
            Arc::new(TransactionLog::new()),
            Arc::new(PayoutDetailsBook::new()),
            event_bus.clone(),
        ));
        let allocator = Arc::new(FundAllocator::new(
            Arc::clone(&campaign_book),
            Arc::clone(&ledger),
        ));
        let calculator = Arc::new(PayoutCalculator::new(
            Arc::clone(&campaign_book),
            Arc::clone(&clip_book),
            config.commission,
        ));
        let settlement = Arc::new(SettlementService::new(
            Arc::clone(&campaign_book),
            Arc::new(RefundBook::new()),
            Arc::clone(&ledger),
            Arc::clone(&calculator),
        ));
        let campaigns = Arc::new(CampaignService::new(
            campaign_book,
            clip_book,
            Arc::clone(&settlement),
            event_bus.clone(),
        ));

        Self {
            ledger,
            allocator,
            calculator,
            settlement,
            campaigns,
            event_bus,
            currency: Arc::from(config.currency.as_str()),
        }
    }
}
