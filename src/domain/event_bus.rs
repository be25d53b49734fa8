//! Fan-out of committed ledger mutations.
//!
//! Services publish only after every book lock is released, so a
//! subscriber never observes an event whose state change could still be
//! rolled back. The optional PostgreSQL event log is the main subscriber.

use tokio::sync::broadcast;

use super::LedgerEvent;

/// Cloneable handle on the [`LedgerEvent`] stream.
///
/// Capacity comes from `EVENT_BUS_CAPACITY`. A subscriber that falls more
/// than that many events behind gets `RecvError::Lagged` and skips ahead;
/// publishers never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Creates a bus buffering at most `capacity` unread events per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes one event and returns how many subscribers got it.
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Publishes the events of one mutation back to back.
    pub fn publish_all(&self, events: impl IntoIterator<Item = LedgerEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, CampaignId, Money};
    use chrono::Utc;
    use tokio::sync::broadcast::error::RecvError;

    fn allocated(campaign_id: CampaignId, amount: u64) -> LedgerEvent {
        LedgerEvent::FundsAllocated {
            campaign_id,
            brand_id: ActorId::new(),
            amount: Money::from_major(amount),
            funds_allocated: Money::from_major(amount),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn unobserved_mutation_is_dropped() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(allocated(CampaignId::new(), 10)), 0);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_allocations() {
        let bus = EventBus::new(8);
        let campaign = CampaignId::new();
        bus.publish(allocated(campaign, 10));

        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(allocated(campaign, 20)), 1);
        let Ok(LedgerEvent::FundsAllocated { amount, .. }) = rx.recv().await else {
            panic!("allocation event expected");
        };
        assert_eq!(amount, Money::from_major(20));
    }

    #[tokio::test]
    async fn refund_events_arrive_in_posting_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let campaign = CampaignId::new();
        let brand = ActorId::new();

        bus.publish_all([
            LedgerEvent::CampaignRefunded {
                campaign_id: campaign,
                brand_id: brand,
                amount: Money::from_major(600),
                timestamp: Utc::now(),
            },
            LedgerEvent::CampaignDeleted {
                campaign_id: campaign,
                brand_id: brand,
                refunded: Money::from_major(600),
                timestamp: Utc::now(),
            },
        ]);

        let Ok(first) = rx.recv().await else {
            panic!("refund event missing");
        };
        let Ok(second) = rx.recv().await else {
            panic!("deletion event missing");
        };
        assert_eq!(first.event_type_str(), "campaign_refunded");
        assert_eq!(second.event_type_str(), "campaign_deleted");
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        let campaign = CampaignId::new();
        for amount in 1..=3 {
            bus.publish(allocated(campaign, amount));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(1))));
        let Ok(LedgerEvent::FundsAllocated { amount, .. }) = rx.recv().await else {
            panic!("oldest retained event expected");
        };
        assert_eq!(amount, Money::from_major(2));
    }
}
