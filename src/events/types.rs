//! Event type definitions for progress reporting.

use crate::core::search::{BackendId, BackendRunResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All events emitted while answering a provenance request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Backend fan-out events
    Search(SearchEvent),
    /// Candidate download and scoring events
    Score(ScoreEvent),
    /// Request-level events
    Pipeline(PipelineEvent),
}

/// Events during the backend fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SearchEvent {
    /// Backends are being queried
    Started { backends: Vec<BackendId> },
    /// One backend finished, failed or timed out
    BackendCompleted(BackendRunResult),
    /// Every backend has reported
    Completed {
        total_candidates: usize,
        failed_backends: usize,
    },
}

/// Events during candidate scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScoreEvent {
    /// Scoring has started
    Started { total_candidates: usize },
    /// A candidate image could not be used; its advisory similarity stands in
    CandidateUnverified { image_url: String, message: String },
    /// Scoring completed
    Completed { verified: usize, unverified: usize },
}

/// Request-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A request has started
    Started { request_id: Uuid },
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// The report was served from the evidence cache
    CacheHit { content_key: String },
    /// The request completed
    Completed { summary: PipelineSummary },
    /// The request failed fatally
    Error { message: String },
}

/// Phases of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Fingerprinting,
    Searching,
    Scoring,
    Categorizing,
    Analyzing,
}

/// Summary of one completed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Raw candidates returned by all backends
    pub total_candidates: usize,
    /// Candidates retained after categorization
    pub total_matches: usize,
    /// Final heuristic credibility score
    pub credibility_score: f64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Fingerprinting => write!(f, "Fingerprinting"),
            PipelinePhase::Searching => write!(f, "Searching"),
            PipelinePhase::Scoring => write!(f, "Scoring"),
            PipelinePhase::Categorizing => write!(f, "Categorizing"),
            PipelinePhase::Analyzing => write!(f, "Analyzing"),
        }
    }
}
