//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{NewEventRow, StoredEvent, TransactionRow};
use crate::config::SettlementConfig;
use crate::error::SettlementError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from the configured database URL and applies the
    /// bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &SettlementConfig) -> Result<Self, SettlementError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Appends an event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::PersistenceError`] on database failure.
    pub async fn save_event(&self, event: &NewEventRow) -> Result<i64, SettlementError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO ledger_events (campaign_id, event_type, payload) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(event.campaign_id)
        .bind(event.event_type)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Inserts a ledger entry, or refreshes the mutable settlement columns
    /// when the entry already exists.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::PersistenceError`] on database failure.
    pub async fn upsert_transaction(&self, txn: &TransactionRow) -> Result<(), SettlementError> {
        sqlx::query(
            "INSERT INTO transactions (id, user_type, user_id, campaign_id, amount_minor, txn_type, \
             status, external_txn_id, description, utr, failure_reason, payout_method, reversed_by, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, utr = EXCLUDED.utr, \
             failure_reason = EXCLUDED.failure_reason, reversed_by = EXCLUDED.reversed_by, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(txn.id)
        .bind(txn.user_type)
        .bind(txn.user_id)
        .bind(txn.campaign_id)
        .bind(txn.amount_minor)
        .bind(txn.txn_type)
        .bind(txn.status)
        .bind(txn.external_txn_id.as_deref())
        .bind(&txn.description)
        .bind(txn.utr.as_deref())
        .bind(txn.failure_reason.as_deref())
        .bind(txn.payout_method.as_deref())
        .bind(txn.reversed_by)
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    /// Loads events after the given timestamp, optionally filtered by
    /// campaign.
    ///
    /// # Errors
    ///
    /// Returns a [`SettlementError::PersistenceError`] on database failure.
    pub async fn load_events_after(
        &self,
        after: DateTime<Utc>,
        campaign_id: Option<Uuid>,
    ) -> Result<Vec<StoredEvent>, SettlementError> {
        let rows = if let Some(cid) = campaign_id {
            sqlx::query_as::<_, (i64, Option<Uuid>, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, campaign_id, event_type, payload, created_at FROM ledger_events \
                 WHERE created_at > $1 AND campaign_id = $2 ORDER BY id ASC",
            )
            .bind(after)
            .bind(cid)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, (i64, Option<Uuid>, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, campaign_id, event_type, payload, created_at FROM ledger_events \
                 WHERE created_at > $1 ORDER BY id ASC",
            )
            .bind(after)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| SettlementError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, campaign_id, event_type, payload, created_at)| StoredEvent {
                    id,
                    campaign_id,
                    event_type,
                    payload,
                    created_at,
                },
            )
            .collect())
    }
}
