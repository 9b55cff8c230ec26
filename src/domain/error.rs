use thiserror::Error;

/// Core domain errors
///
/// `Cache` errors are produced by cache backends only. The query service absorbs them,
/// so callers of [`crate::infrastructure::services::PoiService`] never observe one.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Event error: {message}")]
    Event { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn event(message: impl Into<String>) -> Self {
        Self::Event {
            message: message.into(),
        }
    }

    /// Shorthand for the error returned when a POI id does not exist
    pub fn poi_not_found(id: i64) -> Self {
        Self::not_found(format!("POI {} not found", id))
    }

    /// Whether the transport layer should report this as a retryable server-side fault
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::poi_not_found(42);
        assert_eq!(error.to_string(), "Not found: POI 42 not found");
    }

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid bounding box");
        assert_eq!(error.to_string(), "Validation error: Invalid bounding box");
    }

    #[test]
    fn test_only_storage_errors_are_retryable() {
        assert!(DomainError::storage("connection reset").is_retryable());
        assert!(!DomainError::validation("bad").is_retryable());
        assert!(!DomainError::poi_not_found(1).is_retryable());
    }
}
