//! Trait definitions for tier strategies.

use super::MatchTier;
use crate::error::CategorizeError;
use serde::{Deserialize, Serialize};

/// Strategy trait for assigning a similarity to a tier
pub trait TierStrategy: Send + Sync {
    /// Tier for `similarity`, or `None` when it falls below the floor
    fn classify(&self, similarity: f64) -> Option<MatchTier>;

    /// Lowest similarity that is kept at all
    fn floor(&self) -> f64;

    /// Human-readable description of the strategy
    fn description(&self) -> String;
}

/// Fixed similarity thresholds.
///
/// | Similarity    | Tier     |
/// |---------------|----------|
/// | >= exact      | Exact    |
/// | >= similar    | Similar  |
/// | >= modified   | Modified |
/// | below         | dropped  |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdStrategy {
    pub exact: f64,
    pub similar: f64,
    pub modified: f64,
}

impl ThresholdStrategy {
    /// Create a strategy; requires `0 <= modified <= similar <= exact <= 1`
    pub fn new(exact: f64, similar: f64, modified: f64) -> Result<Self, CategorizeError> {
        let strategy = Self {
            exact,
            similar,
            modified,
        };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Check threshold ordering (also needed after deserializing)
    pub fn validate(&self) -> Result<(), CategorizeError> {
        let ordered = 0.0 <= self.modified
            && self.modified <= self.similar
            && self.similar <= self.exact
            && self.exact <= 1.0;
        if !ordered {
            return Err(CategorizeError::InvalidThresholds {
                exact: self.exact,
                similar: self.similar,
                modified: self.modified,
            });
        }
        Ok(())
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self {
            exact: 0.95,
            similar: 0.75,
            modified: 0.5,
        }
    }
}

impl TierStrategy for ThresholdStrategy {
    fn classify(&self, similarity: f64) -> Option<MatchTier> {
        if similarity >= self.exact {
            Some(MatchTier::Exact)
        } else if similarity >= self.similar {
            Some(MatchTier::Similar)
        } else if similarity >= self.modified {
            Some(MatchTier::Modified)
        } else {
            None
        }
    }

    fn floor(&self) -> f64 {
        self.modified
    }

    fn description(&self) -> String {
        format!(
            "Threshold strategy: exact >= {}, similar >= {}, modified >= {}",
            self.exact, self.similar, self.modified
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_at_boundaries() {
        let strategy = ThresholdStrategy::default();

        assert_eq!(strategy.classify(1.0), Some(MatchTier::Exact));
        assert_eq!(strategy.classify(0.95), Some(MatchTier::Exact));
        assert_eq!(strategy.classify(0.9499), Some(MatchTier::Similar));
        assert_eq!(strategy.classify(0.75), Some(MatchTier::Similar));
        assert_eq!(strategy.classify(0.7499), Some(MatchTier::Modified));
        assert_eq!(strategy.classify(0.5), Some(MatchTier::Modified));
        assert_eq!(strategy.classify(0.4999), None);
        assert_eq!(strategy.classify(f64::NAN), None);
    }

    #[test]
    fn rejects_unordered_thresholds() {
        assert!(ThresholdStrategy::new(0.7, 0.8, 0.5).is_err());
        assert!(ThresholdStrategy::new(1.2, 0.8, 0.5).is_err());
        assert!(ThresholdStrategy::new(0.9, 0.8, -0.1).is_err());
        assert!(ThresholdStrategy::new(0.9, 0.8, 0.6).is_ok());
    }

    #[test]
    fn description_includes_thresholds() {
        let desc = ThresholdStrategy::default().description();
        assert!(desc.contains("0.95"));
        assert!(desc.contains("0.5"));
    }
}
