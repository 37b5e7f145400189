//! Forecast configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use sealed_forecast_client::DecryptionConfig;
use sealed_forecast_registry::RegistryConfig;

/// Configuration for a [`Forecast`](crate::Forecast) and its local deployment.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```json
/// { "registry": { "name": "SecretTGE" }, "decryption": { "approval_timeout_ms": 60000 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub registry: RegistryConfig,
    pub decryption: DecryptionConfig,
    /// How long to wait for a submission to be confirmed.
    pub submission_timeout_ms: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            decryption: DecryptionConfig::default(),
            submission_timeout_ms: 60_000,
        }
    }
}

impl ForecastConfig {
    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_timeout_ms)
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid forecast configuration")
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ForecastConfig::from_json(
            r#"{"registry": {"name": "Other"}, "decryption": {"request_timeout_ms": 500}}"#,
        )
        .unwrap();

        assert_eq!(config.registry.name, "Other");
        assert!(config.registry.verify_signatures);
        assert_eq!(config.decryption.request_timeout(), Duration::from_millis(500));
        assert_eq!(config.decryption.approval_timeout_ms, 120_000);
        assert_eq!(config.submission_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let err = ForecastConfig::from_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("invalid forecast configuration"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.json");
        std::fs::write(&path, r#"{"submission_timeout_ms": 10}"#).unwrap();

        let config = ForecastConfig::load(&path).unwrap();
        assert_eq!(config.submission_timeout_ms, 10);

        assert!(ForecastConfig::load(dir.path().join("missing.json")).is_err());
    }
}
