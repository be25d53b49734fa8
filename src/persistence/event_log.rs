//! Background writer that mirrors the event bus into durable storage.
//!
//! Every [`LedgerEvent`] is appended to the event log. `transaction_posted`
//! events additionally upsert the entry into the transaction table, so the
//! table tracks settlement and reversal updates as well as new entries.
//! Persistence failures are logged and never reach the request path.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::models::{NewEventRow, TransactionRow};
use super::postgres::PostgresPersistence;
use crate::domain::{EventBus, LedgerEvent};
use crate::error::SettlementError;

/// Durable destination for ledger events.
pub trait LedgerSink: Send + Sync + 'static {
    /// Appends one event row.
    fn append_event(
        &self,
        event: &NewEventRow,
    ) -> impl Future<Output = Result<(), SettlementError>> + Send;

    /// Inserts or refreshes one ledger entry.
    fn store_transaction(
        &self,
        txn: &TransactionRow,
    ) -> impl Future<Output = Result<(), SettlementError>> + Send;
}

impl LedgerSink for PostgresPersistence {
    async fn append_event(&self, event: &NewEventRow) -> Result<(), SettlementError> {
        self.save_event(event).await.map(|_| ())
    }

    async fn store_transaction(&self, txn: &TransactionRow) -> Result<(), SettlementError> {
        self.upsert_transaction(txn).await
    }
}

/// Subscribes to `bus` and spawns the writer task.
pub fn spawn_event_log<S: LedgerSink>(sink: S, bus: &EventBus) -> JoinHandle<()> {
    let events = bus.subscribe();
    tokio::spawn(run_event_log(sink, events))
}

/// Drains `events` into `sink` until the bus closes.
pub async fn run_event_log<S: LedgerSink>(sink: S, mut events: broadcast::Receiver<LedgerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = record(&sink, &event).await {
                    tracing::warn!(
                        event_type = event.event_type_str(),
                        error = %e,
                        "failed to persist ledger event"
                    );
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event log writer lagged behind event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    tracing::debug!("event log writer stopped");
}

async fn record<S: LedgerSink>(sink: &S, event: &LedgerEvent) -> Result<(), SettlementError> {
    sink.append_event(&NewEventRow::try_from(event)?).await?;
    if let LedgerEvent::TransactionPosted { transaction } = event {
        sink.store_transaction(&TransactionRow::try_from(transaction.as_ref())?)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::{
        ActorId, ActorRef, CampaignId, Money, NewTransaction, TransactionLog, TransactionStatus,
        TransactionType,
    };

    #[derive(Debug, Clone, Default)]
    struct MemorySink {
        events: Arc<Mutex<Vec<NewEventRow>>>,
        transactions: Arc<Mutex<Vec<TransactionRow>>>,
    }

    impl LedgerSink for MemorySink {
        async fn append_event(&self, event: &NewEventRow) -> Result<(), SettlementError> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }

        async fn store_transaction(&self, txn: &TransactionRow) -> Result<(), SettlementError> {
            self.transactions.lock().await.push(txn.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn writer_records_events_and_posted_transactions() {
        let bus = EventBus::new(16);
        let events = bus.subscribe();
        let sink = MemorySink::default();

        let campaign_id = CampaignId::new();
        let brand = ActorRef::brand(ActorId::new());
        let log = TransactionLog::new();
        let txn = log
            .append(
                NewTransaction::success(
                    brand,
                    TransactionType::Allocation,
                    Money::from_minor(250_000),
                    "Campaign allocation",
                )
                .for_campaign(campaign_id),
            )
            .await;

        bus.publish_all([
            LedgerEvent::CampaignCreated {
                campaign_id,
                brand_id: brand.id,
                timestamp: Utc::now(),
            },
            LedgerEvent::posted(txn.clone()),
        ]);
        drop(bus);

        run_event_log(sink.clone(), events).await;

        let stored = sink.events.lock().await;
        assert_eq!(stored.len(), 2);
        let Some(first) = stored.first() else {
            panic!("no events stored");
        };
        assert_eq!(first.event_type, "campaign_created");
        assert_eq!(first.campaign_id, Some(campaign_id.into()));
        assert_eq!(first.payload["event_type"], "campaign_created");

        let rows = sink.transactions.lock().await;
        let Some(row) = rows.first() else {
            panic!("no transaction stored");
        };
        assert_eq!(row.id, uuid::Uuid::from(txn.id));
        assert_eq!(row.amount_minor, 250_000);
        assert_eq!(row.txn_type, "allocation");
        assert_eq!(row.status, TransactionStatus::Success.as_str());
        assert_eq!(row.user_type, "brand");
    }

    #[tokio::test]
    async fn lagged_writer_keeps_draining() {
        let bus = EventBus::new(1);
        let events = bus.subscribe();
        let sink = MemorySink::default();

        for _ in 0..3 {
            bus.publish(LedgerEvent::CampaignCreated {
                campaign_id: CampaignId::new(),
                brand_id: ActorId::new(),
                timestamp: Utc::now(),
            });
        }
        drop(bus);

        run_event_log(sink.clone(), events).await;
        assert_eq!(sink.events.lock().await.len(), 1);
    }
}
