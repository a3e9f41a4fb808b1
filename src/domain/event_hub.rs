//! Broadcast channel fanning WAL records out to live observers.
//!
//! [`EventHub`] wraps a [`tokio::sync::broadcast`] channel. Every WAL
//! append publishes its record through the hub, and all WebSocket
//! connections subscribe to receive the stream.

use tokio::sync::broadcast;

use crate::wal::WalRecord;

/// Broadcast hub for [`WalRecord`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When a subscriber's ring buffer is full, its oldest
/// unread records are dropped rather than stalling the append path.
/// Subscribers receive only records published after they connect; there
/// is no backfill.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<WalRecord>,
}

impl EventHub {
    /// Creates a new `EventHub` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a record to all subscribers.
    ///
    /// Returns the number of receivers that received the record.
    /// If there are no active receivers, the record is silently dropped.
    pub fn publish(&self, record: WalRecord) -> usize {
        self.sender.send(record).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future records.
    ///
    /// Each WebSocket connection should call this once on connect.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WalRecord> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{JobId, WalEvent};
    use chrono::Utc;

    fn make_record(sequence: u64) -> WalRecord {
        WalRecord {
            sequence,
            timestamp: Utc::now(),
            event: WalEvent::JobStarted { job_id: JobId::new() },
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let hub = EventHub::new(100);
        let count = hub.publish(make_record(1));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_record() {
        let hub = EventHub::new(100);
        let mut rx = hub.subscribe();

        hub.publish(make_record(7));

        let record = rx.recv().await;
        let Ok(record) = record else {
            panic!("expected to receive record");
        };
        assert_eq!(record.sequence, 7);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_record() {
        let hub = EventHub::new(100);
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        let count = hub.publish(make_record(1));
        assert_eq!(count, 2);

        let r1 = rx1.recv().await;
        let r2 = rx2.recv().await;
        let Ok(r1) = r1 else {
            panic!("rx1 failed");
        };
        let Ok(r2) = r2 else {
            panic!("rx2 failed");
        };
        assert_eq!(r1.sequence, r2.sequence);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest() {
        let hub = EventHub::new(2);
        let mut rx = hub.subscribe();

        for seq in 1..=4 {
            hub.publish(make_record(seq));
        }

        // The two oldest records were dropped for the lagging receiver.
        let result = rx.recv().await;
        assert!(matches!(
            result,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        let record = rx.recv().await;
        let Ok(record) = record else {
            panic!("expected record after lag");
        };
        assert_eq!(record.sequence, 3);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let hub = EventHub::new(100);
        assert_eq!(hub.receiver_count(), 0);

        let _rx1 = hub.subscribe();
        assert_eq!(hub.receiver_count(), 1);

        let _rx2 = hub.subscribe();
        assert_eq!(hub.receiver_count(), 2);

        drop(_rx1);
        assert_eq!(hub.receiver_count(), 1);
    }
}
