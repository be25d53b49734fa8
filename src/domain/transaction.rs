//! Append-only transaction ledger.
//!
//! Every wallet balance change is matched by exactly one [`Transaction`]
//! with the same amount. Entries are never removed. The only in-place
//! changes are the `pending -> success | failed` settlement of gateway
//! driven withdrawals and the `reversed_by` link set when a failed
//! withdrawal is reversed by a separate entry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{ActorId, ActorKind, ActorRef, CampaignId, Money, TransactionId};
use crate::error::SettlementError;

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Gateway-confirmed money into a brand wallet.
    Deposit,
    /// Brand wallet → campaign pool.
    Allocation,
    /// Campaign pool → brand wallet, before the campaign winds down.
    Reclaim,
    /// Campaign pool → creator wallet.
    Earning,
    /// Campaign pool → brand wallet at refund time.
    Refund,
    /// Creator wallet → bank / UPI.
    Withdrawal,
    /// Platform share of a payout; bookkeeping only.
    Commission,
    /// Compensating credit for a failed withdrawal.
    Reversal,
}

impl TransactionType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Allocation => "allocation",
            Self::Reclaim => "reclaim",
            Self::Earning => "earning",
            Self::Refund => "refund",
            Self::Withdrawal => "withdrawal",
            Self::Commission => "commission",
            Self::Reversal => "reversal",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "deposit" => Self::Deposit,
            "allocation" => Self::Allocation,
            "reclaim" => Self::Reclaim,
            "earning" | "distribution" => Self::Earning,
            "refund" => Self::Refund,
            "withdrawal" | "payout" => Self::Withdrawal,
            "commission" => Self::Commission,
            "reversal" => Self::Reversal,
            other => {
                return Err(SettlementError::InvalidRequest(format!(
                    "unknown transaction type: {other}"
                )));
            }
        })
    }
}

/// Settlement status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Waiting on the payment gateway.
    Pending,
    /// Settled.
    Success,
    /// Rejected by the gateway.
    Failed,
}

impl TransactionStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(SettlementError::InvalidRequest(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Transaction {
    /// Entry id.
    pub id: TransactionId,
    /// Owner type.
    pub user_type: ActorKind,
    /// Owner id.
    pub user_id: ActorId,
    /// Campaign the entry relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
    /// Amount moved; always positive.
    pub amount: Money,
    /// Entry kind.
    #[serde(rename = "type")]
    pub txn_type: TransactionType,
    /// Settlement status.
    pub status: TransactionStatus,
    /// Payment-gateway correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_txn_id: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
    /// Bank reference (UTR) reported by the gateway on settlement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utr: Option<String>,
    /// Gateway failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Payout method used for withdrawals (`upi` or `bank`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_method: Option<String>,
    /// Entry that reversed this one, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversed_by: Option<TransactionId>,
}

/// Everything needed to create a ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Owner of the entry.
    pub owner: (ActorKind, ActorId),
    /// Related campaign.
    pub campaign_id: Option<CampaignId>,
    /// Amount moved.
    pub amount: Money,
    /// Entry kind.
    pub txn_type: TransactionType,
    /// Initial status.
    pub status: TransactionStatus,
    /// Gateway correlation id.
    pub external_txn_id: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Payout method for withdrawals.
    pub payout_method: Option<String>,
}

impl NewTransaction {
    /// A settled entry against a wallet.
    #[must_use]
    pub fn success(
        owner: ActorRef,
        txn_type: TransactionType,
        amount: Money,
        description: impl Into<String>,
    ) -> Self {
        Self {
            owner: (owner.kind, owner.id),
            campaign_id: None,
            amount,
            txn_type,
            status: TransactionStatus::Success,
            external_txn_id: None,
            description: description.into(),
            payout_method: None,
        }
    }

    /// Tags the entry with a campaign.
    #[must_use]
    pub fn for_campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    fn into_transaction(self, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            user_type: self.owner.0,
            user_id: self.owner.1,
            campaign_id: self.campaign_id,
            amount: self.amount,
            txn_type: self.txn_type,
            status: self.status,
            external_txn_id: self.external_txn_id,
            description: self.description,
            created_at: now,
            updated_at: now,
            utr: None,
            failure_reason: None,
            payout_method: self.payout_method,
            reversed_by: None,
        }
    }

    /// Sets the gateway correlation id.
    #[must_use]
    pub fn with_external_id(mut self, external_txn_id: impl Into<String>) -> Self {
        self.external_txn_id = Some(external_txn_id.into());
        self
    }
}

/// Query filters for [`TransactionLog::query`].
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to one campaign.
    pub campaign_id: Option<CampaignId>,
    /// Restrict to one entry kind.
    pub txn_type: Option<TransactionType>,
    /// Restrict to one status.
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    fn matches(&self, txn: &Transaction) -> bool {
        self.campaign_id.is_none_or(|c| txn.campaign_id == Some(c))
            && self.txn_type.is_none_or(|t| txn.txn_type == t)
            && self.status.is_none_or(|s| txn.status == s)
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct TransactionPage {
    /// Entries on this page, newest first.
    pub transactions: Vec<Transaction>,
    /// Number of entries matching the filter across all pages.
    pub total: usize,
}

#[derive(Debug, Default)]
struct LogInner {
    entries: Vec<Transaction>,
    by_id: HashMap<TransactionId, usize>,
    by_external_id: HashMap<String, TransactionId>,
}

/// In-memory append-only ledger.
///
/// Last in the lock order: callers may hold campaign and wallet guards
/// while appending.
#[derive(Debug, Default)]
pub struct TransactionLog {
    inner: RwLock<LogInner>,
}

impl TransactionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns it.
    pub async fn append(&self, new: NewTransaction) -> Transaction {
        let txn = new.into_transaction(Utc::now());
        let mut inner = self.inner.write().await;
        let index = inner.entries.len();
        inner.by_id.insert(txn.id, index);
        if let Some(ext) = &txn.external_txn_id {
            inner.by_external_id.insert(ext.clone(), txn.id);
        }
        inner.entries.push(txn.clone());
        txn
    }

    /// Looks up an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::TransactionNotFound`] for unknown ids.
    pub async fn get(&self, id: TransactionId) -> Result<Transaction, SettlementError> {
        let inner = self.inner.read().await;
        inner
            .by_id
            .get(&id)
            .and_then(|&i| inner.entries.get(i))
            .cloned()
            .ok_or(SettlementError::TransactionNotFound(id))
    }

    /// Looks up an entry by its gateway correlation id.
    pub async fn find_external(&self, external_txn_id: &str) -> Option<Transaction> {
        let inner = self.inner.read().await;
        let id = inner.by_external_id.get(external_txn_id)?;
        inner
            .by_id
            .get(id)
            .and_then(|&i| inner.entries.get(i))
            .cloned()
    }

    /// Applies `f` to an entry under the write lock.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::TransactionNotFound`] for unknown ids, or
    /// the error returned by `f`.
    pub async fn update<T>(
        &self,
        id: TransactionId,
        f: impl FnOnce(&mut Transaction) -> Result<T, SettlementError>,
    ) -> Result<T, SettlementError> {
        let mut inner = self.inner.write().await;
        let index = *inner
            .by_id
            .get(&id)
            .ok_or(SettlementError::TransactionNotFound(id))?;
        let txn = inner
            .entries
            .get_mut(index)
            .ok_or(SettlementError::TransactionNotFound(id))?;
        let out = f(txn)?;
        txn.updated_at = Utc::now();
        Ok(out)
    }

    /// Appends a compensating entry for `original` and links the two.
    ///
    /// `check` runs against the original under the same write lock as the
    /// append, so two reversals of one entry cannot both pass it.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::TransactionNotFound`] for unknown ids,
    /// [`SettlementError::InvalidState`] if the original was already
    /// reversed, or the error returned by `check`.
    pub async fn append_reversal(
        &self,
        original: TransactionId,
        check: impl FnOnce(&Transaction) -> Result<(), SettlementError>,
        new: NewTransaction,
    ) -> Result<Transaction, SettlementError> {
        let mut inner = self.inner.write().await;
        let index = *inner
            .by_id
            .get(&original)
            .ok_or(SettlementError::TransactionNotFound(original))?;
        let target = inner
            .entries
            .get(index)
            .ok_or(SettlementError::TransactionNotFound(original))?;
        if let Some(existing) = target.reversed_by {
            return Err(SettlementError::InvalidState(format!(
                "transaction {original} was already reversed by {existing}"
            )));
        }
        check(target)?;

        let now = Utc::now();
        let reversal = new.into_transaction(now);
        if let Some(target) = inner.entries.get_mut(index) {
            target.reversed_by = Some(reversal.id);
            target.updated_at = now;
        }
        let reversal_index = inner.entries.len();
        inner.by_id.insert(reversal.id, reversal_index);
        inner.entries.push(reversal.clone());
        Ok(reversal)
    }

    /// Entries of one owner matching `filter`, newest first, paginated.
    pub async fn query(
        &self,
        owner: (ActorKind, ActorId),
        filter: &TransactionFilter,
        limit: usize,
        offset: usize,
    ) -> TransactionPage {
        let inner = self.inner.read().await;
        let matching: Vec<&Transaction> = inner
            .entries
            .iter()
            .rev()
            .filter(|t| (t.user_type, t.user_id) == owner && filter.matches(t))
            .collect();
        let total = matching.len();
        let transactions = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        TransactionPage {
            transactions,
            total,
        }
    }

    /// Sum of entries of one kind for a campaign.
    pub async fn campaign_total(&self, campaign_id: CampaignId, txn_type: TransactionType) -> Money {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|t| {
                t.campaign_id == Some(campaign_id)
                    && t.txn_type == txn_type
                    && t.status == TransactionStatus::Success
            })
            .fold(Money::ZERO, |acc, t| {
                acc.checked_add(t.amount).unwrap_or(acc)
            })
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Returns `true` if the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ActorId;

    fn deposit(owner: ActorRef, major: u64) -> NewTransaction {
        NewTransaction::success(owner, TransactionType::Deposit, Money::from_major(major), "deposit")
    }

    #[tokio::test]
    async fn append_and_get() {
        let log = TransactionLog::new();
        let owner = ActorRef::brand(ActorId::new());
        let txn = log.append(deposit(owner, 10)).await;
        let Ok(fetched) = log.get(txn.id).await else {
            panic!("transaction should exist");
        };
        assert_eq!(fetched.amount, Money::from_major(10));
        assert_eq!(fetched.status, TransactionStatus::Success);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn query_filters_and_paginates_newest_first() {
        let log = TransactionLog::new();
        let owner = ActorRef::brand(ActorId::new());
        let campaign = CampaignId::new();
        for major in 1..=5 {
            log.append(deposit(owner, major)).await;
        }
        log.append(
            NewTransaction::success(owner, TransactionType::Allocation, Money::from_major(7), "a")
                .for_campaign(campaign),
        )
        .await;
        log.append(deposit(ActorRef::brand(ActorId::new()), 99)).await;

        let all = log
            .query((owner.kind, owner.id), &TransactionFilter::default(), 2, 0)
            .await;
        assert_eq!(all.total, 6);
        assert_eq!(all.transactions.len(), 2);
        assert_eq!(
            all.transactions.first().map(|t| t.txn_type),
            Some(TransactionType::Allocation)
        );

        let deposits = TransactionFilter {
            txn_type: Some(TransactionType::Deposit),
            ..TransactionFilter::default()
        };
        let page = log.query((owner.kind, owner.id), &deposits, 10, 3).await;
        assert_eq!(page.total, 5);
        assert_eq!(page.transactions.len(), 2);

        let by_campaign = TransactionFilter {
            campaign_id: Some(campaign),
            ..TransactionFilter::default()
        };
        assert_eq!(
            log.query((owner.kind, owner.id), &by_campaign, 10, 0).await.total,
            1
        );
    }

    #[tokio::test]
    async fn external_id_lookup() {
        let log = TransactionLog::new();
        let owner = ActorRef::brand(ActorId::new());
        log.append(deposit(owner, 1).with_external_id("order_42")).await;
        assert!(log.find_external("order_42").await.is_some());
        assert!(log.find_external("order_43").await.is_none());
    }

    #[tokio::test]
    async fn reversal_links_once() {
        let log = TransactionLog::new();
        let owner = ActorRef::creator(ActorId::new());
        let original = log.append(deposit(owner, 5)).await;
        let reversal = NewTransaction::success(owner, TransactionType::Reversal, Money::from_major(5), "r");

        let Ok(first) = log
            .append_reversal(original.id, |_| Ok(()), reversal.clone())
            .await
        else {
            panic!("first reversal should succeed");
        };
        let Ok(linked) = log.get(original.id).await else {
            panic!("original should exist");
        };
        assert_eq!(linked.reversed_by, Some(first.id));

        let second = log.append_reversal(original.id, |_| Ok(()), reversal).await;
        assert!(matches!(second, Err(SettlementError::InvalidState(_))));
        assert_eq!(log.len().await, 2);
    }

    #[test]
    fn parses_legacy_type_aliases() {
        assert_eq!("distribution".parse::<TransactionType>().ok(), Some(TransactionType::Earning));
        assert_eq!("payout".parse::<TransactionType>().ok(), Some(TransactionType::Withdrawal));
        assert!("bonus".parse::<TransactionType>().is_err());
    }
}
