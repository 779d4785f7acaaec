//! The activity notifier (§4.7): a multi-subscriber, fire-and-forget
//! publish surface carrying one event type — a timestamp plus the set of
//! conversation uuids a watcher just discovered.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// One discovery event: a local-storage scan (or any future producer)
/// found these conversation uuids.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub uuids: HashSet<String>,
}

/// Broadcast publish surface. Cheap to clone — every clone shares the same
/// underlying channel. No delivery acknowledgment: a publish with no
/// subscribers simply has no effect (§4.7).
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ActivityEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }

    /// Publish a set of uuids discovered just now. Fire-and-forget — if no
    /// subscriber is listening this is a silent no-op, not an error.
    pub fn publish(&self, uuids: HashSet<String>) {
        if uuids.is_empty() {
            return;
        }
        let _ = self.tx.send(ActivityEvent { timestamp: Utc::now(), uuids });
    }

    /// Forward every set received on `source` (e.g. the ldb scanner's event
    /// channel) into this notifier until the channel closes. Bridges a
    /// single-producer `mpsc` feed into the broadcast fan-out.
    pub async fn forward_from(self, mut source: tokio::sync::mpsc::Receiver<HashSet<String>>) {
        while let Some(uuids) = source.recv().await {
            self.publish(uuids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_received_by_every_subscriber() {
        let notifier = Notifier::new();
        let mut sub_a = notifier.subscribe();
        let mut sub_b = notifier.subscribe();

        notifier.publish(HashSet::from(["abc".to_string()]));

        let event_a = sub_a.recv().await.unwrap();
        let event_b = sub_b.recv().await.unwrap();
        assert!(event_a.uuids.contains("abc"));
        assert!(event_b.uuids.contains("abc"));
    }

    #[tokio::test]
    async fn publishing_an_empty_set_is_a_no_op() {
        let notifier = Notifier::new();
        let mut sub = notifier.subscribe();
        notifier.publish(HashSet::new());
        notifier.publish(HashSet::from(["x".to_string()]));
        let event = sub.recv().await.unwrap();
        assert!(event.uuids.contains("x"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let notifier = Notifier::new();
        notifier.publish(HashSet::from(["abc".to_string()]));
    }

    #[tokio::test]
    async fn forward_from_bridges_an_mpsc_feed_into_the_broadcast() {
        let notifier = Notifier::new();
        let mut sub = notifier.subscribe();
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        let forward_notifier = notifier.clone();
        tokio::spawn(forward_notifier.forward_from(rx));

        tx.send(HashSet::from(["z".to_string()])).await.unwrap();
        let event = sub.recv().await.unwrap();
        assert!(event.uuids.contains("z"));
    }
}
