//! Domain layer: money, identities, the concurrent books and the event
//! system.
//!
//! Each book (`WalletBook`, `CampaignBook`, `RefundBook`) keeps its
//! entries behind per-entry locks so unrelated entities never contend.
//! The [`TransactionLog`] is the append-only record of every balance
//! change, and the [`EventBus`] broadcasts a [`LedgerEvent`] after each
//! committed mutation.

pub mod campaign;
pub mod clip;
pub mod event_bus;
pub mod identity;
pub mod ids;
pub mod ledger_event;
pub mod money;
pub mod payout_details;
pub mod refund;
pub mod transaction;
pub mod wallet;

pub use campaign::{Campaign, CampaignBook, CampaignHandle, PayoutTerms};
pub use clip::{Clip, ClipBook, ClipStatus};
pub use event_bus::EventBus;
pub use identity::{ActorKind, ActorRef, Identity, Role};
pub use ids::{ActorId, CampaignId, ClipId, RefundId, TransactionId};
pub use ledger_event::{CampaignChange, LedgerEvent};
pub use money::{AMOUNT_ERROR_TAG, CommissionRate, Money, MoneyParseError};
pub use payout_details::{PayoutDetails, PayoutDetailsBook, PayoutFields, PayoutMethod};
pub use refund::{RefundBook, RefundHandle, RefundRequest, RefundStatus, RefundType};
pub use transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionLog, TransactionPage,
    TransactionStatus, TransactionType,
};
pub use wallet::{Wallet, WalletBook, WalletHandle};
