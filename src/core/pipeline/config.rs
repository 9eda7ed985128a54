//! Engine configuration.

use crate::core::categorizer::ThresholdStrategy;
use crate::core::evidence::EvidencePolicy;
use crate::core::fingerprint::FingerprintConfig;
use crate::core::scorer::ScorerConfig;
use crate::error::ProvenanceError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A JSON search endpoint to wrap in an `HttpJsonBackend`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub id: String,
    pub endpoint: String,
}

/// Everything tunable about the engine.
///
/// Every field has a default, so a JSON file only needs the values it changes:
///
/// ```json
/// { "max_results": 20, "thresholds": { "exact": 0.97 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fingerprint: FingerprintConfig,
    pub scorer: ScorerConfig,
    pub thresholds: ThresholdStrategy,
    pub evidence: EvidencePolicy,
    /// Timeout applied to each backend call
    pub per_backend_timeout_ms: u64,
    /// Budget for searching plus downloading candidates; defaults to the
    /// per-backend timeout plus the candidate fetch timeout
    pub request_timeout_ms: Option<u64>,
    /// Cap on the aggregated result list
    pub max_results: usize,
    /// Lifetime of cached reports
    pub cache_ttl_secs: u64,
    /// HTTP backends created at build time, in priority order
    pub backends: Vec<BackendEndpoint>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintConfig::default(),
            scorer: ScorerConfig::default(),
            thresholds: ThresholdStrategy::default(),
            evidence: EvidencePolicy::default(),
            per_backend_timeout_ms: 15_000,
            request_timeout_ms: None,
            max_results: 50,
            cache_ttl_secs: 24 * 60 * 60,
            backends: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ProvenanceError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ProvenanceError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self, ProvenanceError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProvenanceError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn per_backend_timeout(&self) -> Duration {
        Duration::from_millis(self.per_backend_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.per_backend_timeout() + self.scorer.fetch_timeout(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> Result<(), ProvenanceError> {
        self.fingerprint.validate()?;
        self.scorer.validate()?;
        self.thresholds.validate()?;
        if self.per_backend_timeout_ms == 0 {
            return Err(ProvenanceError::Config(
                "per_backend_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ProvenanceError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(ProvenanceError::Config(
                "max_results must be greater than zero".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = self.backends.iter().find(|b| !seen.insert(b.id.as_str())) {
            return Err(ProvenanceError::Config(format!(
                "backend id '{}' is configured twice",
                duplicate.id
            )));
        }
        Ok(())
    }
}
