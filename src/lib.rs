//! # campaign-settlement
//!
//! Wallet ledger and settlement engine for a brand/creator campaign
//! marketplace.
//!
//! Brands deposit money into wallets and fund campaigns from them.
//! Creators submit clips, earn against accepted views at the campaign's
//! cost-per-view, and withdraw to UPI or bank. The platform keeps a
//! commission on every payout. Every balance change is paired with one
//! append-only ledger [`domain::Transaction`]; amounts are integer minor
//! units and all checks run under the locks that guard the mutation.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers + Identity extraction (api/)
//!     │
//!     ├── WalletLedger · FundAllocator · PayoutCalculator (service/)
//!     ├── SettlementService · CampaignService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── WalletBook · CampaignBook · ClipBook · RefundBook (domain/)
//!     ├── TransactionLog (domain/)
//!     │
//!     └── PostgreSQL event log (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
