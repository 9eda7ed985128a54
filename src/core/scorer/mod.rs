//! # Scorer Module
//!
//! Recomputes the similarity of every candidate against the query image.
//!
//! ## How It Works
//! 1. Download candidate images concurrently (bounded, each with a timeout)
//! 2. Fingerprint the downloaded batch in parallel on the blocking pool
//! 3. Combine hash, color and edge similarities with [`SimilarityWeights`]
//!
//! A candidate that cannot be downloaded or decoded is never dropped and
//! never blocks the others: it keeps the backend's advisory similarity (or a
//! conservative default) and is marked unverified.
//!
//! ## Trust
//! | Verification | Source of similarity          | Trust |
//! |--------------|-------------------------------|-------|
//! | Verified     | recomputed from fingerprints  | 1.0   |
//! | Advisory     | backend-reported similarity   | 0.5   |
//! | Default      | configured default (0.5)      | 0.25  |

mod fetcher;
pub mod similarity;

pub use fetcher::{HttpImageFetcher, ImageFetcher, StaticFetcher};
pub use similarity::{weighted_similarity, SimilarityWeights};

use crate::core::fingerprint::{Fingerprinter, ImageFingerprint};
use crate::core::search::SearchCandidate;
use crate::error::{CompareError, FetchError, ProvenanceError};
use crate::events::{null_sender, Event, EventSender, ScoreEvent};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How a candidate's similarity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// Recomputed from the candidate's own pixels
    Verified,
    /// Backend-reported similarity stands in
    Advisory,
    /// Nothing was known; the configured default stands in
    Default,
}

impl Verification {
    /// Relative confidence in the similarity value
    pub fn trust_weight(&self) -> f64 {
        match self {
            Verification::Verified => 1.0,
            Verification::Advisory => 0.5,
            Verification::Default => 0.25,
        }
    }
}

/// A candidate with its recomputed (or substituted) similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: SearchCandidate,
    /// Similarity to the query image in [0, 1]
    pub similarity: f64,
    pub verification: Verification,
}

impl ScoredCandidate {
    /// A candidate whose similarity was recomputed
    pub fn verified(candidate: SearchCandidate, similarity: f64) -> Self {
        Self {
            candidate,
            similarity: similarity.clamp(0.0, 1.0),
            verification: Verification::Verified,
        }
    }

    /// Substitute similarity for a candidate that could not be measured
    pub fn unverified(candidate: SearchCandidate, default_similarity: f64) -> Self {
        let (similarity, verification) = match candidate.backend_similarity {
            Some(advisory) => (advisory, Verification::Advisory),
            None => (default_similarity, Verification::Default),
        };
        Self {
            candidate,
            similarity: similarity.clamp(0.0, 1.0),
            verification,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Verified
    }

    pub fn trust_weight(&self) -> f64 {
        self.verification.trust_weight()
    }
}

/// Scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Timeout for one candidate download
    pub fetch_timeout_ms: u64,
    /// Similarity assumed for unmeasurable candidates without an advisory value
    pub default_similarity: f64,
    /// Concurrent candidate downloads
    pub max_concurrent_fetches: usize,
    /// Largest accepted image body
    pub max_image_bytes: usize,
    pub weights: SimilarityWeights,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            default_similarity: 0.5,
            max_concurrent_fetches: 8,
            max_image_bytes: 20 * 1024 * 1024,
            weights: SimilarityWeights::default(),
        }
    }
}

impl ScorerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ProvenanceError> {
        if self.fetch_timeout_ms == 0 {
            return Err(ProvenanceError::Config(
                "fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_similarity) {
            return Err(ProvenanceError::Config(format!(
                "default_similarity ({}) must be within [0, 1]",
                self.default_similarity
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ProvenanceError::Config(
                "max_concurrent_fetches must be greater than zero".to_string(),
            ));
        }
        self.weights.validate()
    }
}

/// Outcome of measuring one downloaded candidate
enum Measured {
    Similarity(f64),
    Unusable(String),
}

/// Scores candidates against a query fingerprint
pub struct CandidateScorer {
    fetcher: Arc<dyn ImageFetcher>,
    fingerprinter: Arc<Fingerprinter>,
    config: ScorerConfig,
}

impl CandidateScorer {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        fingerprinter: Arc<Fingerprinter>,
        config: ScorerConfig,
    ) -> Self {
        Self {
            fetcher,
            fingerprinter,
            config,
        }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score a single candidate
    pub async fn score(
        &self,
        candidate: SearchCandidate,
        query: Arc<ImageFingerprint>,
    ) -> Result<ScoredCandidate, CompareError> {
        let mut scored = self.score_all(vec![candidate], query).await?;
        // score_all returns exactly one entry per input
        Ok(scored.remove(0))
    }

    /// Score a batch without progress events
    pub async fn score_all(
        &self,
        candidates: Vec<SearchCandidate>,
        query: Arc<ImageFingerprint>,
    ) -> Result<Vec<ScoredCandidate>, CompareError> {
        self.score_all_with_events(candidates, query, &null_sender()).await
    }

    /// Score a batch; the output has one entry per input, in input order.
    ///
    /// Only [`CompareError::IncomparableHash`] fails the batch.
    pub async fn score_all_with_events(
        &self,
        candidates: Vec<SearchCandidate>,
        query: Arc<ImageFingerprint>,
        events: &EventSender,
    ) -> Result<Vec<ScoredCandidate>, CompareError> {
        self.score_batch(candidates, query, None, events).await
    }

    /// Score a batch, abandoning downloads still running at `deadline`.
    ///
    /// Candidates whose image had not arrived by then are scored as
    /// unverified. Images already downloaded are always measured.
    pub async fn score_all_until(
        &self,
        candidates: Vec<SearchCandidate>,
        query: Arc<ImageFingerprint>,
        deadline: Instant,
        events: &EventSender,
    ) -> Result<Vec<ScoredCandidate>, CompareError> {
        self.score_batch(candidates, query, Some(deadline), events).await
    }

    async fn score_batch(
        &self,
        candidates: Vec<SearchCandidate>,
        query: Arc<ImageFingerprint>,
        deadline: Option<Instant>,
        events: &EventSender,
    ) -> Result<Vec<ScoredCandidate>, CompareError> {
        let total = candidates.len();
        events.send(Event::Score(ScoreEvent::Started {
            total_candidates: total,
        }));
        if total == 0 {
            events.send(Event::Score(ScoreEvent::Completed {
                verified: 0,
                unverified: 0,
            }));
            return Ok(Vec::new());
        }

        let downloads = self.fetch_all(&candidates, deadline).await;
        let measured = self.measure_all(downloads, query).await?;

        let mut scored = Vec::with_capacity(total);
        for (candidate, measured) in candidates.into_iter().zip(measured) {
            match measured {
                Measured::Similarity(similarity) => {
                    debug!(url = %candidate.image_url, similarity, "Scored candidate");
                    scored.push(ScoredCandidate::verified(candidate, similarity));
                }
                Measured::Unusable(message) => {
                    warn!(url = %candidate.image_url, error = %message, "Candidate unverified");
                    events.send(Event::Score(ScoreEvent::CandidateUnverified {
                        image_url: candidate.image_url.clone(),
                        message,
                    }));
                    scored.push(ScoredCandidate::unverified(
                        candidate,
                        self.config.default_similarity,
                    ));
                }
            }
        }

        let verified = scored.iter().filter(|s| s.is_verified()).count();
        info!(verified, unverified = total - verified, "Candidate scoring complete");
        events.send(Event::Score(ScoreEvent::Completed {
            verified,
            unverified: total - verified,
        }));

        Ok(scored)
    }

    /// Download every candidate image, at most `max_concurrent_fetches` at a time
    async fn fetch_all(
        &self,
        candidates: &[SearchCandidate],
        deadline: Option<Instant>,
    ) -> Vec<Result<Vec<u8>, FetchError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let timeout = self.config.fetch_timeout();
        let mut join_set = JoinSet::new();

        for (idx, candidate) in candidates.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let url = candidate.image_url.clone();

            join_set.spawn(async move {
                let fetched = match semaphore.acquire_owned().await {
                    Ok(_permit) => match tokio::time::timeout(timeout, fetcher.fetch(&url)).await {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout {
                            url: url.clone(),
                            timeout,
                        }),
                    },
                    Err(_) => Err(FetchError::Request {
                        url: url.clone(),
                        reason: "download pool closed".to_string(),
                    }),
                };
                (idx, fetched)
            });
        }

        let mut ordered: Vec<Option<Result<Vec<u8>, FetchError>>> =
            (0..candidates.len()).map(|_| None).collect();
        let mut abandoned = false;
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let pending = ordered.iter().filter(|slot| slot.is_none()).count();
                        warn!(pending, "Request deadline reached; abandoning remaining downloads");
                        join_set.abort_all();
                        abandoned = true;
                        break;
                    }
                },
                None => join_set.join_next().await,
            };
            let Some(joined) = next else { break };
            match joined {
                Ok((idx, fetched)) => ordered[idx] = Some(fetched),
                Err(join_err) => warn!(error = %join_err, "Candidate download task failed"),
            }
        }
        let reason = if abandoned {
            "request deadline exceeded"
        } else {
            "download task aborted"
        };

        ordered
            .into_iter()
            .zip(candidates)
            .map(|(slot, candidate)| {
                slot.unwrap_or_else(|| {
                    Err(FetchError::Request {
                        url: candidate.image_url.clone(),
                        reason: reason.to_string(),
                    })
                })
            })
            .collect()
    }

    /// Fingerprint downloaded images in parallel off the async threads
    async fn measure_all(
        &self,
        downloads: Vec<Result<Vec<u8>, FetchError>>,
        query: Arc<ImageFingerprint>,
    ) -> Result<Vec<Measured>, CompareError> {
        let count = downloads.len();
        let fingerprinter = Arc::clone(&self.fingerprinter);
        let weights = self.config.weights.clone();

        let joined = tokio::task::spawn_blocking(move || {
            downloads
                .into_par_iter()
                .map(|download| {
                    let bytes = match download {
                        Ok(bytes) => bytes,
                        Err(e) => return Ok(Measured::Unusable(e.to_string())),
                    };
                    let fingerprint = match fingerprinter.fingerprint(&bytes) {
                        Ok(fingerprint) => fingerprint,
                        Err(e) => return Ok(Measured::Unusable(e.to_string())),
                    };
                    weighted_similarity(&query, &fingerprint, &weights).map(Measured::Similarity)
                })
                .collect::<Result<Vec<_>, CompareError>>()
        })
        .await;

        match joined {
            Ok(Ok(measured)) => Ok(measured),
            Ok(Err(e)) => {
                error!(error = %e, "Fingerprint configuration mismatch while scoring");
                Err(e)
            }
            Err(join_err) => {
                warn!(error = %join_err, "Fingerprinting task failed; all candidates unverified");
                Ok((0..count)
                    .map(|_| Measured::Unusable(format!("fingerprinting aborted: {}", join_err)))
                    .collect())
            }
        }
    }
}
