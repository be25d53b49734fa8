//! Database rows for the ledger event log and the transaction table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{LedgerEvent, Transaction};
use crate::error::SettlementError;

/// A stored row from the `ledger_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// Campaign the event concerns, if any.
    pub campaign_id: Option<Uuid>,
    /// Event type discriminator (e.g. `"creator_paid"`).
    pub event_type: String,
    /// JSONB payload with event-specific data.
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An event ready to be appended to the log.
#[derive(Debug, Clone)]
pub struct NewEventRow {
    /// Campaign the event concerns, if any.
    pub campaign_id: Option<Uuid>,
    /// Event type discriminator.
    pub event_type: &'static str,
    /// Serialized event.
    pub payload: serde_json::Value,
}

impl TryFrom<&LedgerEvent> for NewEventRow {
    type Error = SettlementError;

    fn try_from(event: &LedgerEvent) -> Result<Self, Self::Error> {
        let payload = serde_json::to_value(event)
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;
        Ok(Self {
            campaign_id: event.campaign_id().map(Uuid::from),
            event_type: event.event_type_str(),
            payload,
        })
    }
}

/// A row of the `transactions` table.
///
/// Amounts are stored as `BIGINT` minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    /// Entry id.
    pub id: Uuid,
    /// Owner type (`brand`, `creator` or `platform`).
    pub user_type: &'static str,
    /// Owner id.
    pub user_id: Uuid,
    /// Related campaign.
    pub campaign_id: Option<Uuid>,
    /// Amount in minor units.
    pub amount_minor: i64,
    /// Entry kind.
    pub txn_type: &'static str,
    /// Settlement status.
    pub status: &'static str,
    /// Gateway correlation id.
    pub external_txn_id: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Bank reference.
    pub utr: Option<String>,
    /// Gateway failure reason.
    pub failure_reason: Option<String>,
    /// Payout method for withdrawals.
    pub payout_method: Option<String>,
    /// Compensating entry.
    pub reversed_by: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Transaction> for TransactionRow {
    type Error = SettlementError;

    fn try_from(txn: &Transaction) -> Result<Self, Self::Error> {
        let amount_minor =
            i64::try_from(txn.amount.minor()).map_err(|_| SettlementError::AmountOverflow)?;
        Ok(Self {
            id: txn.id.into(),
            user_type: txn.user_type.as_str(),
            user_id: txn.user_id.into(),
            campaign_id: txn.campaign_id.map(Uuid::from),
            amount_minor,
            txn_type: txn.txn_type.as_str(),
            status: txn.status.as_str(),
            external_txn_id: txn.external_txn_id.clone(),
            description: txn.description.clone(),
            utr: txn.utr.clone(),
            failure_reason: txn.failure_reason.clone(),
            payout_method: txn.payout_method.clone(),
            reversed_by: txn.reversed_by.map(Uuid::from),
            created_at: txn.created_at,
            updated_at: txn.updated_at,
        })
    }
}
