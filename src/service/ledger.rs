//! Wallet ledger: balances, gateway-fed deposits and withdrawals, and the
//! transaction history.
//!
//! Every balance change happens under the owning wallet's write lock and
//! appends its ledger entry before the lock is released, so a reader never
//! sees a balance without the entry that explains it.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    ActorId, ActorKind, ActorRef, EventBus, Identity, LedgerEvent, Money, NewTransaction,
    PayoutDetails, PayoutDetailsBook, PayoutFields, PayoutMethod, Role, Transaction,
    TransactionFilter, TransactionId, TransactionLog, TransactionPage, TransactionStatus,
    TransactionType, WalletBook, WalletHandle,
};
use crate::error::SettlementError;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 200;

/// Clamps a requested page size to `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Result of a single credit or debit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Posting {
    /// Balance after the change.
    pub new_balance: Money,
    /// Ledger entry recording the change.
    pub transaction: Transaction,
}

/// Result of a gateway-confirmed deposit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepositOutcome {
    /// Brand balance after the deposit.
    pub new_balance: Money,
    /// Ledger entry of the deposit (the original one for duplicates).
    pub transaction_id: TransactionId,
    /// `true` if this confirmation was already applied.
    pub duplicate: bool,
}

/// Result of a withdrawal request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalOutcome {
    /// Creator balance after the debit.
    pub new_balance: Money,
    /// Reference handed to the payment gateway.
    pub reference_id: String,
    /// Pending withdrawal entry.
    pub transaction_id: TransactionId,
    /// Bank reference; set once the gateway settles.
    pub utr: Option<String>,
    /// Entry status.
    pub status: TransactionStatus,
}

/// What the payment gateway reported for a withdrawal.
#[derive(Debug, Clone)]
pub enum GatewayOutcome {
    /// Money reached the creator's account.
    Success {
        /// Bank reference number.
        utr: String,
    },
    /// Transfer was rejected.
    Failed {
        /// Gateway-supplied reason.
        reason: String,
    },
}

/// Result of checking a creator's saved payout details.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayoutVerification {
    /// `true` if a withdrawal could use the saved details as they are.
    pub verified: bool,
    /// Saved method, if any.
    pub payout_method: Option<PayoutMethod>,
    /// Fields the saved method still needs.
    #[schema(value_type = Vec<String>)]
    pub missing_fields: Vec<&'static str>,
}

/// Owner of all wallet balance mutations.
#[derive(Debug)]
pub struct WalletLedger {
    wallets: Arc<WalletBook>,
    log: Arc<TransactionLog>,
    payout_details: Arc<PayoutDetailsBook>,
    event_bus: EventBus,
}

impl WalletLedger {
    /// Creates a ledger over the given books.
    #[must_use]
    pub fn new(
        wallets: Arc<WalletBook>,
        log: Arc<TransactionLog>,
        payout_details: Arc<PayoutDetailsBook>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            wallets,
            log,
            payout_details,
            event_bus,
        }
    }

    /// Returns the event bus mutations are published on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the underlying transaction log.
    #[must_use]
    pub fn log(&self) -> &Arc<TransactionLog> {
        &self.log
    }

    /// Lock handle of a wallet, for services that move money between a
    /// wallet and a campaign pool under both locks.
    pub(crate) async fn wallet(&self, owner: ActorRef) -> WalletHandle {
        self.wallets.entry(owner).await
    }

    /// Appends an entry. Callers hold the wallet guard the entry explains.
    pub(crate) async fn post(&self, new: NewTransaction) -> Transaction {
        self.log.append(new).await
    }

    /// Current balance; unknown actors get an implicit zero-balance wallet.
    pub async fn get_balance(&self, owner: ActorRef) -> Money {
        let balance = self.wallets.balance(owner).await;
        tracing::debug!(%owner, %balance, "balance read");
        balance
    }

    /// Credits a wallet and records a settled entry.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAmount`] for zero amounts and
    /// [`SettlementError::AmountOverflow`] if the balance would overflow.
    pub async fn credit(
        &self,
        owner: ActorRef,
        amount: Money,
        txn_type: TransactionType,
        description: &str,
    ) -> Result<Posting, SettlementError> {
        amount.ensure_positive()?;
        let handle = self.wallets.entry(owner).await;
        let mut wallet = handle.write().await;
        let new_balance = wallet.balance_after_credit(amount)?;
        let transaction = self
            .log
            .append(NewTransaction::success(owner, txn_type, amount, description))
            .await;
        wallet.set_balance(new_balance);
        drop(wallet);

        tracing::info!(%owner, %amount, %new_balance, txn_type = %txn_type, "wallet credited");
        self.event_bus.publish(LedgerEvent::posted(transaction.clone()));
        Ok(Posting {
            new_balance,
            transaction,
        })
    }

    /// Debits a wallet and records a settled entry.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAmount`] for zero amounts and
    /// [`SettlementError::InsufficientFunds`] if `amount` exceeds the
    /// balance; the balance is unchanged in both cases.
    pub async fn debit(
        &self,
        owner: ActorRef,
        amount: Money,
        txn_type: TransactionType,
        description: &str,
    ) -> Result<Posting, SettlementError> {
        amount.ensure_positive()?;
        let handle = self.wallets.entry(owner).await;
        let mut wallet = handle.write().await;
        let new_balance = match wallet.balance_after_debit(amount) {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(%owner, %amount, balance = %wallet.balance, "debit rejected");
                return Err(e);
            }
        };
        let transaction = self
            .log
            .append(NewTransaction::success(owner, txn_type, amount, description))
            .await;
        wallet.set_balance(new_balance);
        drop(wallet);

        tracing::info!(%owner, %amount, %new_balance, txn_type = %txn_type, "wallet debited");
        self.event_bus.publish(LedgerEvent::posted(transaction.clone()));
        Ok(Posting {
            new_balance,
            transaction,
        })
    }

    /// Applies a gateway-confirmed deposit to the caller's brand wallet.
    ///
    /// Idempotent on `external_txn_id`: a repeated confirmation returns the
    /// current balance with `duplicate = true` and credits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-brand callers,
    /// [`SettlementError::InvalidRequest`] for a blank external id or one
    /// already used by another wallet, and the errors of
    /// [`WalletLedger::credit`].
    pub async fn deposit(
        &self,
        identity: &Identity,
        amount: Money,
        external_txn_id: &str,
    ) -> Result<DepositOutcome, SettlementError> {
        identity.require(Role::Brand)?;
        amount.ensure_positive()?;
        let external_txn_id = external_txn_id.trim();
        if external_txn_id.is_empty() {
            return Err(SettlementError::InvalidRequest(
                "external_txn_id is required".to_string(),
            ));
        }
        let owner = ActorRef::brand(identity.actor_id);

        let handle = self.wallets.entry(owner).await;
        let mut wallet = handle.write().await;
        if let Some(existing) = self.log.find_external(external_txn_id).await {
            if (existing.user_type, existing.user_id) != (owner.kind, owner.id) {
                return Err(SettlementError::InvalidRequest(format!(
                    "external_txn_id {external_txn_id} belongs to another wallet"
                )));
            }
            tracing::info!(%owner, external_txn_id, "duplicate deposit confirmation ignored");
            return Ok(DepositOutcome {
                new_balance: wallet.balance,
                transaction_id: existing.id,
                duplicate: true,
            });
        }

        let new_balance = wallet.balance_after_credit(amount)?;
        let transaction = self
            .log
            .append(
                NewTransaction::success(owner, TransactionType::Deposit, amount, "Wallet deposit")
                    .with_external_id(external_txn_id),
            )
            .await;
        wallet.set_balance(new_balance);
        drop(wallet);

        tracing::info!(%owner, %amount, %new_balance, external_txn_id, "deposit applied");
        let transaction_id = transaction.id;
        self.event_bus.publish_all([
            LedgerEvent::FundsDeposited {
                brand_id: owner.id,
                amount,
                external_txn_id: external_txn_id.to_string(),
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(transaction),
        ]);
        Ok(DepositOutcome {
            new_balance,
            transaction_id,
            duplicate: false,
        })
    }

    /// Debits the caller's creator wallet and records a pending withdrawal
    /// for the payment gateway to settle.
    ///
    /// Blank destination fields fall back to the creator's saved payout
    /// details.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-creator callers,
    /// [`SettlementError::InvalidAmount`] for zero amounts,
    /// [`SettlementError::IncompletePayoutDetails`] if the destination is
    /// incomplete and [`SettlementError::InsufficientFunds`] if the balance
    /// is too low.
    pub async fn creator_withdraw(
        &self,
        identity: &Identity,
        amount: Money,
        method: PayoutMethod,
        fields: PayoutFields,
    ) -> Result<WithdrawalOutcome, SettlementError> {
        identity.require(Role::Creator)?;
        amount.ensure_positive()?;
        let fields = match self.payout_details.get(identity.actor_id).await {
            Some(saved) => fields.or_saved(&saved.fields),
            None => fields,
        };
        fields.require(method)?;

        let owner = ActorRef::creator(identity.actor_id);
        let reference_id = format!("wd_{}", Uuid::new_v4().simple());

        let handle = self.wallets.entry(owner).await;
        let mut wallet = handle.write().await;
        let new_balance = match wallet.balance_after_debit(amount) {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(%owner, %amount, balance = %wallet.balance, "withdrawal rejected");
                return Err(e);
            }
        };
        let mut new = NewTransaction::success(
            owner,
            TransactionType::Withdrawal,
            amount,
            format!("Withdrawal via {method}"),
        )
        .with_external_id(reference_id.clone());
        new.status = TransactionStatus::Pending;
        new.payout_method = Some(method.to_string());
        let transaction = self.log.append(new).await;
        wallet.set_balance(new_balance);
        drop(wallet);

        tracing::info!(%owner, %amount, %new_balance, reference_id, "withdrawal requested");
        let transaction_id = transaction.id;
        self.event_bus.publish_all([
            LedgerEvent::WithdrawalRequested {
                transaction_id,
                creator_id: owner.id,
                amount,
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(transaction),
        ]);
        Ok(WithdrawalOutcome {
            new_balance,
            reference_id,
            transaction_id,
            utr: None,
            status: TransactionStatus::Pending,
        })
    }

    /// Records the gateway's verdict on a pending withdrawal.
    ///
    /// A failed withdrawal keeps the money out of the wallet until the
    /// creator asks for a reversal.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-admin callers,
    /// [`SettlementError::TransactionNotFound`] for unknown ids and
    /// [`SettlementError::InvalidState`] unless the entry is a pending
    /// withdrawal.
    pub async fn settle_withdrawal(
        &self,
        identity: &Identity,
        transaction_id: TransactionId,
        outcome: GatewayOutcome,
    ) -> Result<Transaction, SettlementError> {
        identity.require(Role::Admin)?;
        let settled = self
            .log
            .update(transaction_id, |txn| {
                if txn.txn_type != TransactionType::Withdrawal
                    || txn.status != TransactionStatus::Pending
                {
                    return Err(SettlementError::InvalidState(format!(
                        "transaction {} is a {} {} entry, not a pending withdrawal",
                        txn.id, txn.status, txn.txn_type
                    )));
                }
                match outcome {
                    GatewayOutcome::Success { utr } => {
                        txn.status = TransactionStatus::Success;
                        txn.utr = Some(utr);
                    }
                    GatewayOutcome::Failed { reason } => {
                        txn.status = TransactionStatus::Failed;
                        txn.failure_reason = Some(reason);
                    }
                }
                Ok(txn.clone())
            })
            .await?;

        tracing::info!(%transaction_id, status = %settled.status, "withdrawal settled");
        self.event_bus.publish_all([
            LedgerEvent::WithdrawalSettled {
                transaction_id,
                creator_id: settled.user_id,
                status: settled.status,
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(settled.clone()),
        ]);
        Ok(settled)
    }

    /// Credits a failed withdrawal back to its creator with a separate
    /// `reversal` entry. Each withdrawal can be reversed once.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller owns the
    /// withdrawal, [`SettlementError::InvalidState`] unless it is a failed,
    /// not yet reversed withdrawal, and
    /// [`SettlementError::AmountOverflow`] if the balance would overflow.
    pub async fn revert_failed_withdrawal(
        &self,
        identity: &Identity,
        transaction_id: TransactionId,
    ) -> Result<Posting, SettlementError> {
        identity.require(Role::Creator)?;
        let owner = ActorRef::creator(identity.actor_id);
        let original = self.log.get(transaction_id).await?;
        if (original.user_type, original.user_id) != (owner.kind, owner.id) {
            return Err(SettlementError::Forbidden(
                "withdrawal belongs to another creator".to_string(),
            ));
        }

        let handle = self.wallets.entry(owner).await;
        let mut wallet = handle.write().await;
        let new_balance = wallet.balance_after_credit(original.amount)?;
        let reversal = self
            .log
            .append_reversal(
                transaction_id,
                |txn| {
                    if txn.txn_type == TransactionType::Withdrawal
                        && txn.status == TransactionStatus::Failed
                    {
                        Ok(())
                    } else {
                        Err(SettlementError::InvalidState(format!(
                            "only failed withdrawals can be reversed; {} is {}",
                            txn.id, txn.status
                        )))
                    }
                },
                NewTransaction::success(
                    owner,
                    TransactionType::Reversal,
                    original.amount,
                    format!("Reversal of failed withdrawal {transaction_id}"),
                ),
            )
            .await?;
        wallet.set_balance(new_balance);
        drop(wallet);

        tracing::info!(%owner, %transaction_id, amount = %original.amount, "failed withdrawal reversed");
        let original = self.log.get(transaction_id).await?;
        self.event_bus.publish_all([
            LedgerEvent::WithdrawalReversed {
                transaction_id,
                reversal_id: reversal.id,
                creator_id: owner.id,
                amount: reversal.amount,
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(original),
            LedgerEvent::posted(reversal.clone()),
        ]);
        Ok(Posting {
            new_balance,
            transaction: reversal,
        })
    }

    /// Looks up one entry; the status query behind gateway polling.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::TransactionNotFound`] for unknown ids and
    /// [`SettlementError::Forbidden`] unless the caller owns the entry or
    /// is an admin.
    pub async fn get_transaction(
        &self,
        identity: &Identity,
        id: TransactionId,
    ) -> Result<Transaction, SettlementError> {
        let txn = self.log.get(id).await?;
        identity.require_self_or_admin(ActorRef {
            kind: txn.user_type,
            id: txn.user_id,
        })?;
        Ok(txn)
    }

    /// History of one wallet, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller owns the
    /// wallet or is an admin.
    pub async fn get_transactions(
        &self,
        identity: &Identity,
        owner: ActorRef,
        filter: &TransactionFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<TransactionPage, SettlementError> {
        identity.require_self_or_admin(owner)?;
        Ok(self
            .log
            .query((owner.kind, owner.id), filter, clamp_limit(limit), offset)
            .await)
    }

    /// Withdrawals of the calling creator, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-creator callers.
    pub async fn withdrawal_history(
        &self,
        identity: &Identity,
        status: Option<TransactionStatus>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<TransactionPage, SettlementError> {
        identity.require(Role::Creator)?;
        let filter = TransactionFilter {
            txn_type: Some(TransactionType::Withdrawal),
            status,
            ..TransactionFilter::default()
        };
        Ok(self
            .log
            .query(
                (ActorKind::Creator, identity.actor_id),
                &filter,
                clamp_limit(limit),
                offset,
            )
            .await)
    }

    /// Saves the calling creator's payout destination.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-creator callers and
    /// [`SettlementError::IncompletePayoutDetails`] for incomplete fields.
    pub async fn save_payout_details(
        &self,
        identity: &Identity,
        method: PayoutMethod,
        fields: PayoutFields,
    ) -> Result<PayoutDetails, SettlementError> {
        identity.require(Role::Creator)?;
        let details = self
            .payout_details
            .save(identity.actor_id, method, fields)
            .await?;
        tracing::info!(creator_id = %identity.actor_id, %method, "payout details saved");
        Ok(details)
    }

    /// Saved payout details of a creator.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] unless the caller is that
    /// creator or an admin.
    pub async fn get_payout_details(
        &self,
        identity: &Identity,
        creator: ActorId,
    ) -> Result<Option<PayoutDetails>, SettlementError> {
        identity.require_self_or_admin(ActorRef::creator(creator))?;
        Ok(self.payout_details.get(creator).await)
    }

    /// Checks whether the caller's saved details are usable for a payout.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Forbidden`] for non-creator callers.
    pub async fn verify_payout_details(
        &self,
        identity: &Identity,
    ) -> Result<PayoutVerification, SettlementError> {
        identity.require(Role::Creator)?;
        Ok(match self.payout_details.get(identity.actor_id).await {
            Some(saved) => {
                let missing_fields = saved.fields.missing_for(saved.payout_method);
                PayoutVerification {
                    verified: missing_fields.is_empty(),
                    payout_method: Some(saved.payout_method),
                    missing_fields,
                }
            }
            None => PayoutVerification {
                verified: false,
                payout_method: None,
                missing_fields: vec!["payout_method"],
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn ledger() -> WalletLedger {
        WalletLedger::new(
            Arc::new(WalletBook::new()),
            Arc::new(TransactionLog::new()),
            Arc::new(PayoutDetailsBook::new()),
            EventBus::new(64),
        )
    }

    fn brand() -> Identity {
        Identity::new(Role::Brand, ActorId::new())
    }

    fn creator() -> Identity {
        Identity::new(Role::Creator, ActorId::new())
    }

    fn admin() -> Identity {
        Identity::new(Role::Admin, ActorId::new())
    }

    fn upi() -> PayoutFields {
        PayoutFields {
            upi_id: Some("creator@upi".to_string()),
            ..PayoutFields::default()
        }
    }

    #[tokio::test]
    async fn unknown_actor_has_zero_balance() {
        let ledger = ledger();
        assert_eq!(
            ledger.get_balance(ActorRef::brand(ActorId::new())).await,
            Money::ZERO
        );
    }

    #[tokio::test]
    async fn credit_and_debit_record_one_entry_each() {
        let ledger = ledger();
        let owner = ActorRef::brand(ActorId::new());
        let credited = assert_ok!(
            ledger
                .credit(owner, Money::from_major(50), TransactionType::Deposit, "top up")
                .await
        );
        assert_eq!(credited.new_balance, Money::from_major(50));
        let debited = assert_ok!(
            ledger
                .debit(owner, Money::from_major(20), TransactionType::Allocation, "spend")
                .await
        );
        assert_eq!(debited.new_balance, Money::from_major(30));
        assert_eq!(debited.transaction.amount, Money::from_major(20));
        assert_eq!(ledger.log().len().await, 2);
    }

    #[tokio::test]
    async fn overdraft_leaves_balance_untouched() {
        let ledger = ledger();
        let owner = ActorRef::creator(ActorId::new());
        assert_ok!(
            ledger
                .credit(owner, Money::from_major(10), TransactionType::Earning, "e")
                .await
        );
        let err = assert_err!(
            ledger
                .debit(owner, Money::from_major(11), TransactionType::Withdrawal, "w")
                .await
        );
        assert!(matches!(err, SettlementError::InsufficientFunds { .. }));
        assert_eq!(ledger.get_balance(owner).await, Money::from_major(10));
        assert_eq!(ledger.log().len().await, 1);
    }

    #[tokio::test]
    async fn zero_amounts_are_invalid() {
        let ledger = ledger();
        let owner = ActorRef::brand(ActorId::new());
        let err = assert_err!(
            ledger
                .credit(owner, Money::ZERO, TransactionType::Deposit, "nothing")
                .await
        );
        assert!(matches!(err, SettlementError::InvalidAmount(_)));
        assert!(ledger.log().is_empty().await);
    }

    #[tokio::test]
    async fn deposit_is_idempotent_on_external_id() {
        let ledger = ledger();
        let brand = brand();
        let first = assert_ok!(
            ledger
                .deposit(&brand, Money::from_major(5000), "order_1")
                .await
        );
        assert!(!first.duplicate);
        let again = assert_ok!(
            ledger
                .deposit(&brand, Money::from_major(5000), "order_1")
                .await
        );
        assert!(again.duplicate);
        assert_eq!(again.transaction_id, first.transaction_id);
        assert_eq!(again.new_balance, Money::from_major(5000));

        let other = assert_err!(
            ledger
                .deposit(&self::brand(), Money::from_major(1), "order_1")
                .await
        );
        assert!(matches!(other, SettlementError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn withdrawal_falls_back_to_saved_details() {
        let ledger = ledger();
        let creator = creator();
        let owner = ActorRef::creator(creator.actor_id);
        assert_ok!(
            ledger
                .credit(owner, Money::from_major(100), TransactionType::Earning, "e")
                .await
        );

        let err = assert_err!(
            ledger
                .creator_withdraw(&creator, Money::from_major(10), PayoutMethod::Upi, PayoutFields::default())
                .await
        );
        assert!(matches!(err, SettlementError::IncompletePayoutDetails(ref f) if f == &vec!["upi_id"]));

        assert_ok!(
            ledger
                .save_payout_details(&creator, PayoutMethod::Upi, upi())
                .await
        );
        let outcome = assert_ok!(
            ledger
                .creator_withdraw(&creator, Money::from_major(40), PayoutMethod::Upi, PayoutFields::default())
                .await
        );
        assert_eq!(outcome.new_balance, Money::from_major(60));
        assert_eq!(outcome.status, TransactionStatus::Pending);
        assert!(outcome.reference_id.starts_with("wd_"));
    }

    #[tokio::test]
    async fn failed_withdrawal_can_be_reversed_once() {
        let ledger = ledger();
        let creator = creator();
        let owner = ActorRef::creator(creator.actor_id);
        assert_ok!(
            ledger
                .credit(owner, Money::from_major(100), TransactionType::Earning, "e")
                .await
        );
        let outcome = assert_ok!(
            ledger
                .creator_withdraw(&creator, Money::from_major(100), PayoutMethod::Upi, upi())
                .await
        );

        // still pending: nothing to reverse yet
        let early = assert_err!(
            ledger
                .revert_failed_withdrawal(&creator, outcome.transaction_id)
                .await
        );
        assert!(matches!(early, SettlementError::InvalidState(_)));

        let settled = assert_ok!(
            ledger
                .settle_withdrawal(
                    &admin(),
                    outcome.transaction_id,
                    GatewayOutcome::Failed {
                        reason: "account closed".to_string(),
                    },
                )
                .await
        );
        assert_eq!(settled.status, TransactionStatus::Failed);

        let reversal = assert_ok!(
            ledger
                .revert_failed_withdrawal(&creator, outcome.transaction_id)
                .await
        );
        assert_eq!(reversal.new_balance, Money::from_major(100));
        assert_eq!(reversal.transaction.txn_type, TransactionType::Reversal);

        let twice = assert_err!(
            ledger
                .revert_failed_withdrawal(&creator, outcome.transaction_id)
                .await
        );
        assert!(matches!(twice, SettlementError::InvalidState(_)));
        assert_eq!(ledger.get_balance(owner).await, Money::from_major(100));
    }

    #[tokio::test]
    async fn settled_withdrawal_cannot_be_settled_again() {
        let ledger = ledger();
        let creator = creator();
        assert_ok!(
            ledger
                .credit(
                    ActorRef::creator(creator.actor_id),
                    Money::from_major(5),
                    TransactionType::Earning,
                    "e",
                )
                .await
        );
        let outcome = assert_ok!(
            ledger
                .creator_withdraw(&creator, Money::from_major(5), PayoutMethod::Upi, upi())
                .await
        );
        let ok = GatewayOutcome::Success {
            utr: "UTR123".to_string(),
        };
        let settled = assert_ok!(
            ledger
                .settle_withdrawal(&admin(), outcome.transaction_id, ok.clone())
                .await
        );
        assert_eq!(settled.utr.as_deref(), Some("UTR123"));
        let err = assert_err!(
            ledger
                .settle_withdrawal(&admin(), outcome.transaction_id, ok)
                .await
        );
        assert!(matches!(err, SettlementError::InvalidState(_)));
    }

    #[tokio::test]
    async fn history_is_private_to_owner_and_admin() {
        let ledger = ledger();
        let brand = brand();
        let owner = ActorRef::brand(brand.actor_id);
        assert_ok!(ledger.deposit(&brand, Money::from_major(1), "o1").await);

        let page = assert_ok!(
            ledger
                .get_transactions(&brand, owner, &TransactionFilter::default(), None, 0)
                .await
        );
        assert_eq!(page.total, 1);
        assert_ok!(
            ledger
                .get_transactions(&admin(), owner, &TransactionFilter::default(), None, 0)
                .await
        );
        let err = assert_err!(
            ledger
                .get_transactions(&self::brand(), owner, &TransactionFilter::default(), None, 0)
                .await
        );
        assert!(matches!(err, SettlementError::Forbidden(_)));
    }

    #[tokio::test]
    async fn verify_reports_missing_fields() {
        let ledger = ledger();
        let creator = creator();
        let before = assert_ok!(ledger.verify_payout_details(&creator).await);
        assert!(!before.verified);
        assert_ok!(
            ledger
                .save_payout_details(&creator, PayoutMethod::Upi, upi())
                .await
        );
        let after = assert_ok!(ledger.verify_payout_details(&creator).await);
        assert!(after.verified);
        assert_eq!(after.payout_method, Some(PayoutMethod::Upi));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_PAGE_SIZE);
    }
}
