//! Change event entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::poi::{Poi, PoiId};

/// Kind of mutation that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Name used by live clients, e.g. `poi_created`
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created => "poi_created",
            Self::Updated => "poi_updated",
            Self::Deleted => "poi_deleted",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A committed POI mutation
///
/// Ephemeral: delivered at most once to subscribers connected at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub poi_id: PoiId,
    /// Entity snapshot; post-mutation for create/update, last known state for delete
    pub poi: Option<Poi>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, poi_id: PoiId, poi: Option<Poi>) -> Self {
        Self {
            kind,
            poi_id,
            poi,
            timestamp: Utc::now(),
        }
    }

    pub fn created(poi: Poi) -> Self {
        Self::new(ChangeKind::Created, poi.id, Some(poi))
    }

    pub fn updated(poi: Poi) -> Self {
        Self::new(ChangeKind::Updated, poi.id, Some(poi))
    }

    pub fn deleted(poi_id: PoiId, last_known: Option<Poi>) -> Self {
        Self::new(ChangeKind::Deleted, poi_id, last_known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::poi::Metadata;

    fn sample_poi() -> Poi {
        let now = Utc::now();
        Poi {
            id: 7,
            name: "Test Cafe".to_string(),
            category: Some("cafe".to_string()),
            lat: 29.7604,
            lon: -95.3698,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(ChangeKind::Created.event_type(), "poi_created");
        assert_eq!(ChangeKind::Updated.event_type(), "poi_updated");
        assert_eq!(ChangeKind::Deleted.event_type(), "poi_deleted");
    }

    #[test]
    fn test_constructors() {
        let created = ChangeEvent::created(sample_poi());
        assert_eq!(created.kind, ChangeKind::Created);
        assert_eq!(created.poi_id, 7);
        assert!(created.poi.is_some());

        let deleted = ChangeEvent::deleted(7, None);
        assert_eq!(deleted.kind, ChangeKind::Deleted);
        assert!(deleted.poi.is_none());
    }

    #[test]
    fn test_serialization() {
        let event = ChangeEvent::updated(sample_poi());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "updated");
        assert_eq!(json["poi_id"], 7);
        assert_eq!(json["poi"]["name"], "Test Cafe");

        let back: ChangeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
