//! Metrics settings, read from the `[metrics]` config section

use serde::Deserialize;

/// Prometheus exporter settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route serving the text exposition format
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// The configured path as an axum route; a missing leading slash is added
    pub fn route_path(&self) -> String {
        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            return Self::default().path;
        }
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_section() {
        let config: MetricsConfig = serde_json::from_str("{}").unwrap();

        assert!(config.enabled);
        assert_eq!(config.route_path(), "/metrics");
    }

    #[test]
    fn test_route_path_normalization() {
        let config = MetricsConfig {
            enabled: true,
            path: "internal/metrics".to_string(),
        };
        assert_eq!(config.route_path(), "/internal/metrics");

        let blank = MetricsConfig {
            enabled: true,
            path: "  ".to_string(),
        };
        assert_eq!(blank.route_path(), "/metrics");
    }
}
