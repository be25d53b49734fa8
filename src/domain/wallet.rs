//! Wallets and their concurrent store.
//!
//! [`WalletBook`] keeps every wallet behind its own
//! [`tokio::sync::RwLock`]: balance reads on one wallet run concurrently,
//! writes to one wallet are serialized, and different wallets never
//! contend.
//!
//! # Lock ordering
//!
//! Operations that touch several entities acquire locks in this order and
//! never the reverse: refund request → campaign → clip → wallet →
//! transaction log. Every two-entity operation in the service layer
//! follows it, which rules out lock-order deadlocks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{ActorRef, Money};
use crate::error::SettlementError;

/// Balance of one actor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Wallet {
    /// Owner of the wallet.
    pub owner: ActorRef,
    /// Current balance; never negative.
    pub balance: Money,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last balance change.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Creates an empty wallet.
    #[must_use]
    pub fn new(owner: ActorRef) -> Self {
        let now = Utc::now();
        Self {
            owner,
            balance: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance after crediting `amount`, without applying it.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::AmountOverflow`] if the balance would
    /// overflow.
    pub fn balance_after_credit(&self, amount: Money) -> Result<Money, SettlementError> {
        self.balance.try_add(amount)
    }

    /// Balance after debiting `amount`, without applying it.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InsufficientFunds`] if `amount` exceeds
    /// the balance.
    pub fn balance_after_debit(&self, amount: Money) -> Result<Money, SettlementError> {
        self.balance
            .checked_sub(amount)
            .ok_or(SettlementError::InsufficientFunds {
                available: self.balance,
                requested: amount,
            })
    }

    /// Commits a balance computed by one of the `balance_after_*` checks.
    pub fn set_balance(&mut self, balance: Money) {
        self.balance = balance;
        self.updated_at = Utc::now();
    }
}

/// Shared handle to one wallet.
pub type WalletHandle = Arc<RwLock<Wallet>>;

/// Central store of all wallets.
///
/// Wallets are created implicitly on first access with a zero balance and
/// are never removed.
#[derive(Debug, Default)]
pub struct WalletBook {
    wallets: RwLock<HashMap<ActorRef, WalletHandle>>,
}

impl WalletBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wallet for `owner`, creating it if needed.
    pub async fn entry(&self, owner: ActorRef) -> WalletHandle {
        if let Some(handle) = self.wallets.read().await.get(&owner) {
            return Arc::clone(handle);
        }
        let mut map = self.wallets.write().await;
        Arc::clone(
            map.entry(owner)
                .or_insert_with(|| Arc::new(RwLock::new(Wallet::new(owner)))),
        )
    }

    /// Current balance of `owner`; zero for a wallet never seen before.
    pub async fn balance(&self, owner: ActorRef) -> Money {
        let handle = self.entry(owner).await;
        let wallet = handle.read().await;
        wallet.balance
    }

    /// Number of wallets in the book.
    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }

    /// Returns `true` if no wallet has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.wallets.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActorId;

    #[tokio::test]
    async fn unknown_actor_gets_zero_balance_wallet() {
        let book = WalletBook::new();
        assert!(book.is_empty().await);
        let owner = ActorRef::brand(ActorId::new());
        assert_eq!(book.balance(owner).await, Money::ZERO);
        assert_eq!(book.len().await, 1);
    }

    #[tokio::test]
    async fn entry_returns_the_same_wallet() {
        let book = WalletBook::new();
        let owner = ActorRef::creator(ActorId::new());
        let a = book.entry(owner).await;
        let b = book.entry(owner).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn debit_beyond_balance_is_refused() {
        let mut wallet = Wallet::new(ActorRef::brand(ActorId::new()));
        wallet.set_balance(Money::from_major(10));
        let result = wallet.balance_after_debit(Money::from_major(11));
        assert!(matches!(
            result,
            Err(SettlementError::InsufficientFunds { .. })
        ));
        assert_eq!(wallet.balance, Money::from_major(10));
    }

    #[test]
    fn same_kind_different_ids_are_distinct_keys() {
        let a = ActorRef::brand(ActorId::new());
        let b = ActorRef::brand(ActorId::new());
        assert_ne!(a, b);
        assert_ne!(ActorRef::brand(a.id), ActorRef::creator(a.id));
    }
}
