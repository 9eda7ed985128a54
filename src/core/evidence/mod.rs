//! # Evidence Module
//!
//! Condenses the retained matches into one [`EvidenceSummary`].
//!
//! The credibility score is a heuristic, not a probability. Every increment
//! and threshold lives in [`EvidencePolicy`] so it can be recalibrated:
//!
//! | Condition                          | Effect |
//! |------------------------------------|--------|
//! | no matches at all                  | = 0.1  |
//! | otherwise                          | 0.5    |
//! | more than 10 matches               | + 0.2  |
//! | mean similarity above 0.8          | + 0.2  |
//! | more than 3 distinct top domains   | + 0.1  |
//! | at least one dated match           | + 0.1  |
//!
//! The result is clamped to [0, 1].
//!
//! Unverified matches, including those carrying only the scorer's default
//! similarity, count toward the totals and the mean like any other match.
//! `trust_weighted_similarity` reports the mean with each match weighted by
//! [`Verification::trust_weight`], so callers can discount them.
//!
//! [`Verification::trust_weight`]: crate::core::scorer::Verification::trust_weight

use crate::core::scorer::ScoredCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Heuristic observations about the matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousFlag {
    NoMatchesFound,
    VeryFewMatches,
    LowSimilarityMatches,
    StockPhotoUsage,
    UnverifiedMatches,
}

impl std::fmt::Display for SuspiciousFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SuspiciousFlag::NoMatchesFound => "no_matches_found",
            SuspiciousFlag::VeryFewMatches => "very_few_matches",
            SuspiciousFlag::LowSimilarityMatches => "low_similarity_matches",
            SuspiciousFlag::StockPhotoUsage => "stock_photo_usage",
            SuspiciousFlag::UnverifiedMatches => "unverified_matches",
        };
        f.write_str(name)
    }
}

/// A domain and how many matches it hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

/// A dated match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedMatch {
    pub image_url: String,
    pub source_url: String,
    pub domain: String,
    pub publish_date: DateTime<Utc>,
    pub similarity: f64,
}

impl DatedMatch {
    fn from_scored(scored: &ScoredCandidate) -> Option<Self> {
        let candidate = &scored.candidate;
        candidate.publish_date.map(|publish_date| Self {
            image_url: candidate.image_url.clone(),
            source_url: candidate.source_url.clone(),
            domain: candidate.domain.clone(),
            publish_date,
            similarity: scored.similarity,
        })
    }
}

/// Evidence derived from one request's results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub total_matches: usize,
    pub oldest_match: Option<DatedMatch>,
    pub most_recent_match: Option<DatedMatch>,
    pub top_domains: Vec<DomainCount>,
    pub suspicious_flags: BTreeSet<SuspiciousFlag>,
    pub credibility_score: f64,
    pub average_similarity: f64,
    /// Mean similarity weighted by each match's verification trust
    pub trust_weighted_similarity: f64,
    pub unverified_count: usize,
}

impl EvidenceSummary {
    pub fn has_flag(&self, flag: SuspiciousFlag) -> bool {
        self.suspicious_flags.contains(&flag)
    }
}

/// Tunable constants of the evidence heuristics.
///
/// Counts and means cover every retained match, verified or not: a link
/// that could not be downloaded still counts toward `many_matches_threshold`
/// with its advisory or default similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidencePolicy {
    /// Domains kept in `top_domains`
    pub top_domains_limit: usize,
    /// Stock photo sites; subdomains match too
    pub stock_domains: Vec<String>,
    /// Fewer matches than this raises `very_few_matches`
    pub few_matches_threshold: usize,
    /// Mean similarity below this raises `low_similarity_matches`
    pub low_similarity_threshold: f64,
    /// Share of unverified matches above which `unverified_matches` is raised
    pub unverified_ratio_threshold: f64,
    pub empty_score: f64,
    pub base_score: f64,
    pub many_matches_threshold: usize,
    pub many_matches_bonus: f64,
    pub high_similarity_threshold: f64,
    pub high_similarity_bonus: f64,
    pub domain_diversity_threshold: usize,
    pub domain_diversity_bonus: f64,
    pub dated_match_bonus: f64,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            top_domains_limit: 5,
            stock_domains: [
                "shutterstock.com",
                "gettyimages.com",
                "istockphoto.com",
                "stock.adobe.com",
                "depositphotos.com",
                "dreamstime.com",
                "123rf.com",
                "alamy.com",
                "unsplash.com",
                "pexels.com",
                "pixabay.com",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            few_matches_threshold: 3,
            low_similarity_threshold: 0.7,
            unverified_ratio_threshold: 0.5,
            empty_score: 0.1,
            base_score: 0.5,
            many_matches_threshold: 10,
            many_matches_bonus: 0.2,
            high_similarity_threshold: 0.8,
            high_similarity_bonus: 0.2,
            domain_diversity_threshold: 3,
            domain_diversity_bonus: 0.1,
            dated_match_bonus: 0.1,
        }
    }
}

impl EvidencePolicy {
    /// True when `domain` is, or is a subdomain of, a known stock site
    pub fn is_stock_domain(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        self.stock_domains.iter().any(|stock| {
            domain == *stock
                || domain
                    .strip_suffix(stock.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Builds evidence summaries; pure and infallible
#[derive(Debug, Clone, Default)]
pub struct EvidenceAnalyzer {
    policy: EvidencePolicy,
}

impl EvidenceAnalyzer {
    pub fn new(policy: EvidencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EvidencePolicy {
        &self.policy
    }

    /// Summarize `results` (normally the aggregated, capped result list)
    pub fn analyze(&self, results: &[ScoredCandidate]) -> EvidenceSummary {
        let policy = &self.policy;

        if results.is_empty() {
            return EvidenceSummary {
                total_matches: 0,
                oldest_match: None,
                most_recent_match: None,
                top_domains: Vec::new(),
                suspicious_flags: BTreeSet::from([SuspiciousFlag::NoMatchesFound]),
                credibility_score: policy.empty_score.clamp(0.0, 1.0),
                average_similarity: 0.0,
                trust_weighted_similarity: 0.0,
                unverified_count: 0,
            };
        }

        let total = results.len();
        let average_similarity = results.iter().map(|r| r.similarity).sum::<f64>() / total as f64;
        let unverified_count = results.iter().filter(|r| !r.is_verified()).count();
        let total_trust: f64 = results.iter().map(|r| r.trust_weight()).sum();
        let trust_weighted_similarity =
            results.iter().map(|r| r.similarity * r.trust_weight()).sum::<f64>() / total_trust;

        // First in list order wins on equal dates
        let dated: Vec<DatedMatch> = results.iter().filter_map(DatedMatch::from_scored).collect();
        let oldest_match = dated
            .iter()
            .min_by(|a, b| a.publish_date.cmp(&b.publish_date))
            .cloned();
        let most_recent_match = dated
            .iter()
            .min_by(|a, b| b.publish_date.cmp(&a.publish_date))
            .cloned();

        let top_domains = top_domains(results, policy.top_domains_limit);

        let mut flags = BTreeSet::new();
        if total < policy.few_matches_threshold {
            flags.insert(SuspiciousFlag::VeryFewMatches);
        }
        if average_similarity < policy.low_similarity_threshold {
            flags.insert(SuspiciousFlag::LowSimilarityMatches);
        }
        if top_domains.iter().any(|d| policy.is_stock_domain(&d.domain)) {
            flags.insert(SuspiciousFlag::StockPhotoUsage);
        }
        if unverified_count as f64 > total as f64 * policy.unverified_ratio_threshold {
            flags.insert(SuspiciousFlag::UnverifiedMatches);
        }

        let mut score = policy.base_score;
        if total > policy.many_matches_threshold {
            score += policy.many_matches_bonus;
        }
        if average_similarity > policy.high_similarity_threshold {
            score += policy.high_similarity_bonus;
        }
        if top_domains.len() > policy.domain_diversity_threshold {
            score += policy.domain_diversity_bonus;
        }
        if oldest_match.is_some() {
            score += policy.dated_match_bonus;
        }

        EvidenceSummary {
            total_matches: total,
            oldest_match,
            most_recent_match,
            top_domains,
            suspicious_flags: flags,
            credibility_score: score.clamp(0.0, 1.0),
            average_similarity,
            trust_weighted_similarity,
            unverified_count,
        }
    }
}

/// Analyze with the default policy
pub fn analyze(results: &[ScoredCandidate]) -> EvidenceSummary {
    EvidenceAnalyzer::default().analyze(results)
}

/// Most frequent domains; count descending, then name
fn top_domains(results: &[ScoredCandidate], limit: usize) -> Vec<DomainCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for result in results {
        let domain = result.candidate.domain.as_str();
        if !domain.is_empty() {
            *counts.entry(domain).or_default() += 1;
        }
    }

    let mut ranked: Vec<DomainCount> = counts
        .into_iter()
        .map(|(domain, count)| DomainCount {
            domain: domain.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
    ranked.truncate(limit);
    ranked
}
