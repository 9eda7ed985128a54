//! # Categorizer Module
//!
//! Sorts scored candidates into disjoint match tiers.
//!
//! ## How It Works
//! 1. Deduplicate by (image URL, source page URL), keeping the highest similarity
//! 2. Classify each survivor with a [`TierStrategy`] (default thresholds below)
//! 3. Order every tier deterministically
//!
//! ## Default Tiers
//! | Similarity  | Tier     |
//! |-------------|----------|
//! | 0.95 - 1.0  | Exact    |
//! | 0.75 - 0.95 | Similar  |
//! | 0.50 - 0.75 | Modified |
//! | < 0.50      | dropped  |
//!
//! Ordering is similarity descending, then discovery rank (configured backend
//! order, then position in that backend's response), then identity key. The
//! result therefore does not depend on the order candidates arrive in.

mod traits;

pub use traits::{ThresholdStrategy, TierStrategy};

use crate::core::scorer::ScoredCandidate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Match tier of a retained candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Similar,
    Modified,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "Exact Match"),
            MatchTier::Similar => write!(f, "Similar"),
            MatchTier::Modified => write!(f, "Modified"),
        }
    }
}

/// Disjoint tiers; each list is in canonical order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizedResultSet {
    pub exact: Vec<ScoredCandidate>,
    pub similar: Vec<ScoredCandidate>,
    pub modified: Vec<ScoredCandidate>,
}

impl CategorizedResultSet {
    /// Number of retained candidates across all tiers
    pub fn total(&self) -> usize {
        self.exact.len() + self.similar.len() + self.modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The list for one tier
    pub fn tier(&self, tier: MatchTier) -> &[ScoredCandidate] {
        match tier {
            MatchTier::Exact => &self.exact,
            MatchTier::Similar => &self.similar,
            MatchTier::Modified => &self.modified,
        }
    }

    /// All retained candidates, best first, capped at `max_results`
    pub fn aggregated(&self, max_results: usize) -> Vec<ScoredCandidate> {
        let mut all: Vec<ScoredCandidate> = self
            .exact
            .iter()
            .chain(&self.similar)
            .chain(&self.modified)
            .cloned()
            .collect();
        all.sort_by(canonical_order);
        all.truncate(max_results);
        all
    }
}

/// Canonical result order: similarity descending, then discovery rank, then identity key.
///
/// "First seen wins" on ties relies on the [`DiscoveryRank`] the orchestrator
/// stamps. Candidates built by hand all share the default rank, so their ties
/// fall through to the identity key.
///
/// [`DiscoveryRank`]: crate::core::search::DiscoveryRank
pub fn canonical_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.candidate.discovery_rank.cmp(&b.candidate.discovery_rank))
        .then_with(|| a.candidate.identity_key().cmp(&b.candidate.identity_key()))
}

/// Keep one entry per identity key: the highest similarity, earliest discovery on ties
pub fn deduplicate(scored: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut best: HashMap<(String, String), ScoredCandidate> = HashMap::new();

    for candidate in scored {
        let key = (
            candidate.candidate.image_url.clone(),
            candidate.candidate.source_url.clone(),
        );
        match best.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                if canonical_order(&candidate, slot.get()) == Ordering::Less {
                    slot.insert(candidate);
                }
            }
        }
    }

    let mut unique: Vec<ScoredCandidate> = best.into_values().collect();
    unique.sort_by(canonical_order);
    unique
}

/// Assigns scored candidates to tiers
#[derive(Clone)]
pub struct ResultCategorizer {
    strategy: Arc<dyn TierStrategy>,
}

impl ResultCategorizer {
    pub fn new(strategy: Arc<dyn TierStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &dyn TierStrategy {
        self.strategy.as_ref()
    }

    /// Deduplicate, classify and order.
    ///
    /// Equal similarities are ordered by discovery rank, so first-seen order
    /// holds only for candidates that came through the orchestrator; see
    /// [`canonical_order`].
    pub fn categorize(&self, scored: Vec<ScoredCandidate>) -> CategorizedResultSet {
        let incoming = scored.len();
        let mut result = CategorizedResultSet::default();
        let mut dropped = 0usize;

        // Already in canonical order, so every tier stays ordered
        for candidate in deduplicate(scored) {
            match self.strategy.classify(candidate.similarity) {
                Some(MatchTier::Exact) => result.exact.push(candidate),
                Some(MatchTier::Similar) => result.similar.push(candidate),
                Some(MatchTier::Modified) => result.modified.push(candidate),
                None => dropped += 1,
            }
        }

        debug!(
            incoming,
            exact = result.exact.len(),
            similar = result.similar.len(),
            modified = result.modified.len(),
            dropped,
            "Categorized candidates"
        );
        result
    }
}

impl Default for ResultCategorizer {
    fn default() -> Self {
        Self::new(Arc::new(ThresholdStrategy::default()))
    }
}

/// Categorize with the default thresholds
pub fn categorize(scored: Vec<ScoredCandidate>) -> CategorizedResultSet {
    ResultCategorizer::default().categorize(scored)
}
