//! Redis pub/sub change notifier

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::events::{ChangeEvent, ChangeNotifier};
use crate::domain::DomainError;

use super::broadcast::BroadcastNotifier;

/// Prefix of the Redis channels events are published on
pub const DEFAULT_CHANNEL_PREFIX: &str = "geosearch:events:";

/// Configuration for the Redis notifier
#[derive(Debug, Clone)]
pub struct RedisNotifierConfig {
    pub url: String,
    pub channel_prefix: String,
    /// Local broadcast buffer per channel
    pub capacity: usize,
}

impl RedisNotifierConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            capacity: super::broadcast::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Messages read from the pattern subscription: Redis channel name and payload
type RelayStream = BoxStream<'static, (String, redis::RedisResult<String>)>;

/// Delay between relay resubscription attempts, doubling up to `max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RelayBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
        }
    }
}

/// Cross-instance notifier
///
/// `publish` issues `PUBLISH {prefix}{channel}`. A relay task pattern-subscribed to
/// `{prefix}*` feeds every received message into a local [`BroadcastNotifier`], so local
/// subscribers on every instance (including the publishing one) see the event exactly once.
/// When the subscription drops (e.g. Redis restarts) the relay resubscribes with backoff;
/// events published while it is down are not replayed.
pub struct RedisNotifier {
    connection: ConnectionManager,
    local: Arc<BroadcastNotifier>,
    channel_prefix: String,
    relay: JoinHandle<()>,
}

impl fmt::Debug for RedisNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisNotifier")
            .field("channel_prefix", &self.channel_prefix)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisNotifier {
    /// Connects and starts the relay task
    ///
    /// The first subscription is opened here so a bad URL fails startup instead of retrying.
    pub async fn connect(config: RedisNotifierConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::event(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| DomainError::event(format!("Failed to connect to Redis: {}", e)))?;

        let pattern = format!("{}*", config.channel_prefix);
        let initial = open_subscription(client.clone(), pattern.clone()).await?;

        let local = Arc::new(BroadcastNotifier::new(config.capacity));
        let relay = tokio::spawn(run_relay(
            Some(initial),
            move || open_subscription(client.clone(), pattern.clone()),
            local.clone(),
            config.channel_prefix.clone(),
            RelayBackoff::default(),
        ));

        Ok(Self {
            connection,
            local,
            channel_prefix: config.channel_prefix,
            relay,
        })
    }
}

async fn open_subscription(client: Client, pattern: String) -> Result<RelayStream, DomainError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| DomainError::event(format!("Failed to open Redis pub/sub: {}", e)))?;

    pubsub
        .psubscribe(&pattern)
        .await
        .map_err(|e| DomainError::event(format!("Failed to subscribe to events: {}", e)))?;

    Ok(pubsub
        .into_on_message()
        .map(|message| {
            (
                message.get_channel_name().to_string(),
                message.get_payload::<String>(),
            )
        })
        .boxed())
}

/// Relays subscription streams into `local` for as long as the task lives
async fn run_relay<F, Fut>(
    initial: Option<RelayStream>,
    mut open: F,
    local: Arc<BroadcastNotifier>,
    prefix: String,
    backoff: RelayBackoff,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RelayStream, DomainError>>,
{
    let mut current = initial;
    let mut delay = backoff.initial;

    loop {
        let stream = match current.take() {
            Some(stream) => stream,
            None => match open().await {
                Ok(stream) => {
                    info!("Redis event relay resubscribed");
                    delay = backoff.initial;
                    stream
                }
                Err(e) => {
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Redis event relay resubscribe failed");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(backoff.max);
                    continue;
                }
            },
        };

        let relayed = pump(stream, &local, &prefix).await;
        warn!(relayed, "Redis event subscription ended, resubscribing");
    }
}

/// Forwards messages until the stream ends, returning how many events were relayed
async fn pump(mut stream: RelayStream, local: &BroadcastNotifier, prefix: &str) -> usize {
    let mut relayed = 0;

    while let Some((channel_name, payload)) = stream.next().await {
        let Some(channel) = channel_name.strip_prefix(prefix) else {
            continue;
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Unreadable event payload");
                continue;
            }
        };

        match serde_json::from_str::<ChangeEvent>(&payload) {
            Ok(event) => {
                let delivered = local.deliver(channel, event);
                relayed += 1;
                debug!(channel = %channel, delivered, "Relayed event");
            }
            Err(e) => warn!(channel = %channel, error = %e, "Malformed event payload"),
        }
    }

    relayed
}

impl Drop for RedisNotifier {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

#[async_trait]
impl ChangeNotifier for RedisNotifier {
    async fn publish(&self, channel: &str, event: &ChangeEvent) -> Result<usize, DomainError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| DomainError::event(format!("Failed to serialize event: {}", e)))?;

        let mut conn = self.connection.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(format!("{}{}", self.channel_prefix, channel))
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::event(format!("Failed to publish event: {}", e)))?;

        Ok(receivers.max(0) as usize)
    }

    fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChangeEvent> {
        self.local.subscribe(channel)
    }

    fn subscriber_counts(&self) -> HashMap<String, usize> {
        self.local.subscriber_counts()
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PREFIX: &str = "geosearch:events:";

    fn message(channel: &str, event: &ChangeEvent) -> (String, redis::RedisResult<String>) {
        (
            format!("{}{}", PREFIX, channel),
            Ok(serde_json::to_string(event).unwrap()),
        )
    }

    fn ending(items: Vec<(String, redis::RedisResult<String>)>) -> RelayStream {
        futures::stream::iter(items).boxed()
    }

    fn fast_backoff() -> RelayBackoff {
        RelayBackoff {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(4),
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<ChangeEvent>) -> ChangeEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_pump_skips_foreign_and_malformed_messages() {
        let local = BroadcastNotifier::default();
        let mut rx = local.subscribe("poi");

        let stream = ending(vec![
            ("other:poi".to_string(), Ok("{}".to_string())),
            (format!("{}poi", PREFIX), Ok("not json".to_string())),
            (
                format!("{}poi", PREFIX),
                Err(redis::RedisError::from((redis::ErrorKind::TypeError, "bad payload"))),
            ),
            message("poi", &ChangeEvent::deleted(7, None)),
        ]);

        assert_eq!(pump(stream, &local, PREFIX).await, 1);
        assert_eq!(rx.recv().await.unwrap().poi_id, 7);
    }

    #[tokio::test]
    async fn test_relay_resubscribes_after_stream_ends() {
        let local = Arc::new(BroadcastNotifier::default());
        let mut rx = local.subscribe("poi");
        let attempts = Arc::new(AtomicUsize::new(0));

        let open = {
            let attempts = attempts.clone();
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    match attempt {
                        0 => Err(DomainError::event("connection refused")),
                        1 => Ok(ending(vec![message("poi", &ChangeEvent::deleted(2, None))])),
                        _ => Ok(futures::stream::pending::<(String, redis::RedisResult<String>)>()
                            .boxed()),
                    }
                }
            }
        };

        let relay = tokio::spawn(run_relay(
            Some(ending(vec![message("poi", &ChangeEvent::deleted(1, None))])),
            open,
            local.clone(),
            PREFIX.to_string(),
            fast_backoff(),
        ));

        assert_eq!(next_event(&mut rx).await.poi_id, 1);
        assert_eq!(next_event(&mut rx).await.poi_id, 2);

        // Still alive and parked on the third subscription
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!relay.is_finished());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        relay.abort();
    }

    #[test]
    fn test_config_defaults() {
        let config = RedisNotifierConfig::new("redis://localhost:6379").with_capacity(8);

        assert_eq!(config.channel_prefix, "geosearch:events:");
        assert_eq!(config.capacity, 8);
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_round_trip() {
        let notifier = RedisNotifier::connect(
            RedisNotifierConfig::new("redis://127.0.0.1:6379")
                .with_channel_prefix("geosearch-test:events:"),
        )
        .await
        .unwrap();

        let mut rx = notifier.subscribe("poi");
        // Give the relay time to register its pattern subscription
        tokio::time::sleep(Duration::from_millis(100)).await;

        let event = ChangeEvent::deleted(5, None);
        let reached = notifier.publish("poi", &event).await.unwrap();
        assert!(reached >= 1);

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, event);
    }
}
