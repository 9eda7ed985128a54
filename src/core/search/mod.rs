//! # Search Module
//!
//! Fans one query image out to every configured reverse-search backend.
//!
//! ## How It Works
//! 1. Each backend implements [`SearchBackend`] and maps its own payload
//!    into the fixed [`SearchCandidate`] shape
//! 2. [`BackendOrchestrator`] queries all selected backends concurrently,
//!    each under its own timeout, one attempt per backend
//! 3. A failing, hanging or panicking backend contributes zero candidates and a
//!    [`BackendRunResult`] describing what happened
//!
//! Candidates are stamped with a [`DiscoveryRank`] derived from the configured
//! backend order, never from completion order.

mod http;
mod orchestrator;
mod static_backend;
mod traits;

pub use http::HttpJsonBackend;
pub use orchestrator::{BackendOrchestrator, SearchOutcome};
pub use static_backend::StaticBackend;
pub use traits::SearchBackend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of a search backend ("tineye", "bing", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Pixel dimensions reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Where a candidate was first seen: configured backend position, then
/// position within that backend's response. Lower ranks were seen first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DiscoveryRank {
    pub backend_index: u32,
    pub position: u32,
}

/// One hit from one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub image_url: String,
    pub source_url: String,
    pub title: String,
    pub snippet: String,
    pub domain: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub dimensions: Option<Dimensions>,
    /// Backend-estimated similarity; advisory only
    pub backend_similarity: Option<f64>,
    /// Backend that produced the hit (set by the orchestrator)
    #[serde(default)]
    pub backend: BackendId,
    /// Set by the orchestrator
    #[serde(default)]
    pub discovery_rank: DiscoveryRank,
}

impl SearchCandidate {
    /// Create a candidate; the domain is derived from the source page URL
    pub fn new(image_url: impl Into<String>, source_url: impl Into<String>) -> Self {
        let source_url = source_url.into();
        let domain = domain_of(&source_url).unwrap_or_default();
        Self {
            image_url: image_url.into(),
            source_url,
            title: String::new(),
            snippet: String::new(),
            domain,
            publish_date: None,
            dimensions: None,
            backend_similarity: None,
            backend: BackendId::default(),
            discovery_rank: DiscoveryRank::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = normalize_domain(&domain.into());
        self
    }

    pub fn with_publish_date(mut self, date: DateTime<Utc>) -> Self {
        self.publish_date = Some(date);
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some(Dimensions { width, height });
        self
    }

    pub fn with_backend_similarity(mut self, similarity: f64) -> Self {
        self.backend_similarity = Some(similarity);
        self
    }

    /// Deduplication key: (image URL, source page URL)
    pub fn identity_key(&self) -> (&str, &str) {
        (&self.image_url, &self.source_url)
    }

    /// Drop unusable hits and clamp the advisory similarity into [0, 1].
    pub(crate) fn sanitized(mut self) -> Option<Self> {
        if self.image_url.trim().is_empty() {
            return None;
        }
        self.backend_similarity = self
            .backend_similarity
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));
        if self.domain.is_empty() {
            self.domain = domain_of(&self.source_url)
                .or_else(|| domain_of(&self.image_url))
                .unwrap_or_default();
        }
        Some(self)
    }
}

/// The image being searched for
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub image_bytes: Arc<[u8]>,
    pub image_url: Option<String>,
}

impl SearchQuery {
    pub fn new(image_bytes: impl Into<Arc<[u8]>>, image_url: Option<String>) -> Self {
        Self {
            image_bytes: image_bytes.into(),
            image_url,
        }
    }
}

/// Outcome of one backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Success,
    Failed,
    Timeout,
}

/// Per-backend bookkeeping, for observability only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRunResult {
    pub backend: BackendId,
    pub status: BackendStatus,
    pub result_count: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Host of a URL, lowercased and without a leading `www.`
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed.host_str().map(normalize_domain)
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_ascii_lowercase();
    lower.strip_prefix("www.").map(str::to_string).unwrap_or(lower)
}
