//! Change notifier trait

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::broadcast;

#[cfg(test)]
use mockall::automock;

use crate::domain::error::DomainError;

use super::event::ChangeEvent;

/// Publish/subscribe channel for committed mutations
///
/// Delivery is best-effort and at-most-once per subscriber connected at publish time; there is
/// no replay. Dropping a receiver unsubscribes it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Publishes an event, returning how many subscribers it reached (where known)
    async fn publish(&self, channel: &str, event: &ChangeEvent) -> Result<usize, DomainError>;

    /// Subscribes to a channel
    fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChangeEvent>;

    /// Local subscribers per channel, channels without subscribers omitted
    fn subscriber_counts(&self) -> HashMap<String, usize>;

    /// Short backend name for logs and stats
    fn backend_name(&self) -> &'static str;
}
