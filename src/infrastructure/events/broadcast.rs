//! In-process change notifier built on tokio broadcast channels

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::events::{ChangeEvent, ChangeNotifier};
use crate::domain::DomainError;

/// Default per-channel buffer; lagging receivers lose the oldest events
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Per-process subscriber registry
///
/// One broadcast sender per channel, created on first subscribe. The map lock is only held to
/// look up or insert a sender, never while sending, so publishing and (un)subscribing from
/// different tasks do not block each other.
#[derive(Debug)]
pub struct BroadcastNotifier {
    channels: RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>,
    capacity: usize,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<ChangeEvent> {
        if let Some(sender) = self
            .channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
        {
            return sender.clone();
        }

        self.channels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Hands an event to local subscribers, returning how many received it
    pub fn deliver(&self, channel: &str, event: ChangeEvent) -> usize {
        let sender = self
            .channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
            .cloned();

        match sender {
            // `send` only fails when there are no receivers
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }
}

#[async_trait]
impl ChangeNotifier for BroadcastNotifier {
    async fn publish(&self, channel: &str, event: &ChangeEvent) -> Result<usize, DomainError> {
        Ok(self.deliver(channel, event.clone()))
    }

    fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChangeEvent> {
        self.sender(channel).subscribe()
    }

    fn subscriber_counts(&self) -> HashMap<String, usize> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, sender)| (name.clone(), sender.receiver_count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "in_process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe("poi");

        let event = ChangeEvent::deleted(42, None);
        let delivered = notifier.publish("poi", &event).await.unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let notifier = BroadcastNotifier::default();

        let delivered = notifier
            .publish("poi", &ChangeEvent::deleted(1, None))
            .await
            .unwrap();

        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let notifier = BroadcastNotifier::default();
        let mut poi_rx = notifier.subscribe("poi");
        let mut other_rx = notifier.subscribe("other");

        notifier
            .publish("poi", &ChangeEvent::deleted(1, None))
            .await
            .unwrap();

        assert_eq!(poi_rx.recv().await.unwrap().poi_id, 1);
        assert!(matches!(
            other_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let notifier = BroadcastNotifier::default();
        let _early = notifier.subscribe("poi");

        notifier
            .publish("poi", &ChangeEvent::deleted(1, None))
            .await
            .unwrap();

        let mut late = notifier.subscribe("poi");
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_counts_follow_drops() {
        let notifier = BroadcastNotifier::default();

        let a = notifier.subscribe("poi");
        let b = notifier.subscribe("poi");
        assert_eq!(notifier.subscriber_counts().get("poi"), Some(&2));

        drop(a);
        assert_eq!(notifier.subscriber_counts().get("poi"), Some(&1));

        drop(b);
        assert!(notifier.subscriber_counts().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_publish() {
        let notifier = Arc::new(BroadcastNotifier::default());
        let mut handles = Vec::new();

        for i in 0..16 {
            let notifier = notifier.clone();
            handles.push(tokio::spawn(async move {
                let mut rx = notifier.subscribe("poi");
                notifier
                    .publish("poi", &ChangeEvent::deleted(i, None))
                    .await
                    .unwrap();
                // Own event is always observed; others may or may not be
                loop {
                    let event = rx.recv().await.unwrap();
                    if event.poi_id == i {
                        break;
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
