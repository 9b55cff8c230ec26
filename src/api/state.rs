//! Application state for shared services

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::events::ChangeNotifier;
use crate::infrastructure::services::PoiServiceTrait;

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub poi_service: Arc<dyn PoiServiceTrait>,
    pub notifier: Arc<dyn ChangeNotifier>,
    /// Radius used when a nearby search omits one
    pub default_radius_m: f64,
    ws_connections: Arc<AtomicUsize>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("notifier", &self.notifier.backend_name())
            .field("default_radius_m", &self.default_radius_m)
            .field("ws_connections", &self.ws_connections())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        poi_service: Arc<dyn PoiServiceTrait>,
        notifier: Arc<dyn ChangeNotifier>,
        default_radius_m: f64,
    ) -> Self {
        Self {
            poi_service,
            notifier,
            default_radius_m,
            ws_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open WebSocket connections
    pub fn ws_connections(&self) -> usize {
        self.ws_connections.load(Ordering::Relaxed)
    }

    /// Counts a WebSocket connection until the returned guard is dropped
    pub fn track_ws_connection(&self) -> ConnectionGuard {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            counter: self.ws_connections.clone(),
        }
    }
}

/// Decrements the connection count on drop
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::cache::MockCache;
    use crate::infrastructure::events::BroadcastNotifier;
    use crate::infrastructure::services::{PoiService, ResultCache};
    use crate::infrastructure::storage::InMemoryPoiRepository;

    fn state() -> AppState {
        let notifier = Arc::new(BroadcastNotifier::default());
        let service = PoiService::new(
            Arc::new(InMemoryPoiRepository::new()),
            ResultCache::new(Arc::new(MockCache::new())),
            notifier.clone(),
        );
        AppState::new(Arc::new(service), notifier, 750.0)
    }

    #[test]
    fn test_connection_guard_counts() {
        let state = state();
        let first = state.track_ws_connection();
        let second = state.clone().track_ws_connection();
        assert_eq!(state.ws_connections(), 2);

        drop(first);
        drop(second);
        assert_eq!(state.ws_connections(), 0);
    }

    #[test]
    fn test_debug_names_backends() {
        let rendered = format!("{:?}", state());

        assert!(rendered.contains("in_process"));
        assert!(rendered.contains("750"));
    }
}
