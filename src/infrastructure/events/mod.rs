//! Events infrastructure - Change notifier implementations

mod broadcast;
mod factory;
mod redis;

pub use broadcast::{BroadcastNotifier, DEFAULT_CHANNEL_CAPACITY};
pub use factory::{NotifierConfig, NotifierFactory, NotifierType};
pub use redis::{RedisNotifier, RedisNotifierConfig, RelayBackoff, DEFAULT_CHANNEL_PREFIX};
