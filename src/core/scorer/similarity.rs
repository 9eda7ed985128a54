//! Fingerprint-to-fingerprint similarity measures.

use crate::core::fingerprint::{HashAlgorithmKind, ImageFingerprint};
use crate::error::{CompareError, ProvenanceError};
use serde::{Deserialize, Serialize};

/// Weights of the combined similarity score.
///
/// Defaults are 0.4 pHash, 0.3 dHash, 0.2 aHash and 0.1 color. They are
/// starting points, not calibrated values. The score is divided by the sum
/// of the weights, so identical fingerprints always score exactly 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub phash: f64,
    pub dhash: f64,
    pub ahash: f64,
    pub color: f64,
    /// Off by default
    pub whash: f64,
    /// Off by default
    pub edges: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            phash: 0.4,
            dhash: 0.3,
            ahash: 0.2,
            color: 0.1,
            whash: 0.0,
            edges: 0.0,
        }
    }
}

impl SimilarityWeights {
    fn all(&self) -> [f64; 6] {
        [self.phash, self.dhash, self.ahash, self.color, self.whash, self.edges]
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.all().iter().sum()
    }

    /// Reject negative, non-finite or all-zero weights
    pub fn validate(&self) -> Result<(), ProvenanceError> {
        if self.all().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ProvenanceError::Config(format!(
                "similarity weights must be finite and non-negative: {:?}",
                self
            )));
        }
        if self.total() <= 0.0 {
            return Err(ProvenanceError::Config(
                "at least one similarity weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// `1 - hamming / bits` for one algorithm; lengths must match
pub fn hash_similarity(
    left: &ImageFingerprint,
    right: &ImageFingerprint,
    kind: HashAlgorithmKind,
) -> Result<f64, CompareError> {
    left.hash(kind).checked_similarity(right.hash(kind))
}

/// Histogram intersection `sum(min(a[i], b[i]))`, clamped to [0, 1]
pub fn color_similarity(left: &[f64], right: &[f64]) -> Result<f64, CompareError> {
    check_lengths("color histogram", left.len(), right.len())?;
    let intersection: f64 = left.iter().zip(right).map(|(a, b)| a.min(*b)).sum();
    Ok(intersection.clamp(0.0, 1.0))
}

/// `1 - mean |a[i] - b[i]|` over edge samples in [0, 1]
pub fn edge_similarity(left: &[f64], right: &[f64]) -> Result<f64, CompareError> {
    check_lengths("edge features", left.len(), right.len())?;
    if left.is_empty() {
        return Ok(1.0);
    }
    let mean_diff =
        left.iter().zip(right).map(|(a, b)| (a - b).abs()).sum::<f64>() / left.len() as f64;
    Ok((1.0 - mean_diff).clamp(0.0, 1.0))
}

/// Weighted combination of the individual measures.
///
/// Components with zero weight are not computed.
pub fn weighted_similarity(
    query: &ImageFingerprint,
    candidate: &ImageFingerprint,
    weights: &SimilarityWeights,
) -> Result<f64, CompareError> {
    let total = weights.total();
    if total <= 0.0 {
        return Ok(0.0);
    }

    let mut score = 0.0;
    for (weight, kind) in [
        (weights.phash, HashAlgorithmKind::Perceptual),
        (weights.dhash, HashAlgorithmKind::Difference),
        (weights.ahash, HashAlgorithmKind::Average),
        (weights.whash, HashAlgorithmKind::Wavelet),
    ] {
        if weight > 0.0 {
            score += weight * hash_similarity(query, candidate, kind)?;
        }
    }
    if weights.color > 0.0 {
        score += weights.color * color_similarity(&query.color_histogram, &candidate.color_histogram)?;
    }
    if weights.edges > 0.0 {
        score += weights.edges * edge_similarity(&query.edge_features, &candidate.edge_features)?;
    }

    Ok((score / total).clamp(0.0, 1.0))
}

fn check_lengths(what: &str, left: usize, right: usize) -> Result<(), CompareError> {
    if left != right {
        return Err(CompareError::IncomparableHash {
            algorithm: what.to_string(),
            left: left as u32,
            right: right as u32,
        });
    }
    Ok(())
}
