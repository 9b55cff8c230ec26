//! Change events - mutation notifications for live listeners

mod event;
mod notifier;

pub use event::{ChangeEvent, ChangeKind};
pub use notifier::ChangeNotifier;

#[cfg(test)]
pub use notifier::MockChangeNotifier;

/// Channel carrying POI mutations
pub const POI_CHANNEL: &str = "poi";
