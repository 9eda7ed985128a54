//! Generic JSON-over-HTTP search backend.
//!
//! Any endpoint answering with a JSON array of hits in the shape below can be
//! plugged in without a dedicated adapter:
//!
//! ```json
//! [{ "imageUrl": "...", "sourceUrl": "...", "title": "...", "snippet": "...",
//!    "domain": "...", "similarity": 0.93, "publishDate": "2021-04-01",
//!    "width": 800, "height": 600 }]
//! ```

use super::{BackendId, SearchBackend, SearchCandidate, SearchQuery};
use crate::error::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHit {
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    similarity: Option<f64>,
    #[serde(default)]
    publish_date: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Backend calling a JSON search endpoint
pub struct HttpJsonBackend {
    id: BackendId,
    endpoint: Url,
    client: Client,
}

impl HttpJsonBackend {
    /// Create a backend for `endpoint`.
    ///
    /// `timeout` bounds the whole HTTP exchange; the orchestrator applies its
    /// own per-backend timeout on top.
    pub fn new(id: impl Into<String>, endpoint: &str, timeout: Duration) -> Result<Self, BackendError> {
        let id = BackendId::new(id);
        let endpoint = Url::parse(endpoint).map_err(|e| BackendError::Failed {
            backend: id.to_string(),
            reason: format!("invalid endpoint {}: {}", endpoint, e),
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Failed {
                backend: id.to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { id, endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn failed(&self, reason: impl Into<String>) -> BackendError {
        BackendError::Failed {
            backend: self.id.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SearchBackend for HttpJsonBackend {
    fn id(&self) -> BackendId {
        self.id.clone()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchCandidate>, BackendError> {
        let start = Instant::now();

        let request = match &query.image_url {
            Some(image_url) => {
                let mut url = self.endpoint.clone();
                url.query_pairs_mut().append_pair("url", image_url);
                self.client.get(url)
            }
            None => self
                .client
                .post(self.endpoint.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(query.image_bytes.to_vec()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.failed(format!("request failed: {}", e)))?;

        let status = response.status();
        debug!(backend = %self.id, status = %status, "Received HTTP response");
        if !status.is_success() {
            return Err(self.failed(format!("HTTP {}", status.as_u16())));
        }

        let hits: Vec<RawHit> = response.json().await.map_err(|e| {
            warn!(backend = %self.id, error = %e, "Failed to parse JSON response");
            BackendError::InvalidResponse {
                backend: self.id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let candidates = map_hits(hits);
        debug!(
            backend = %self.id,
            result_count = candidates.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed successfully"
        );
        Ok(candidates)
    }
}

fn map_hits(hits: Vec<RawHit>) -> Vec<SearchCandidate> {
    hits.into_iter()
        .filter(|hit| !hit.image_url.trim().is_empty())
        .map(|hit| {
            let mut candidate = SearchCandidate::new(hit.image_url, hit.source_url)
                .with_title(hit.title.unwrap_or_default())
                .with_snippet(hit.snippet.unwrap_or_default());
            if let Some(domain) = hit.domain.filter(|d| !d.trim().is_empty()) {
                candidate = candidate.with_domain(domain);
            }
            if let Some(similarity) = hit.similarity {
                candidate = candidate.with_backend_similarity(similarity);
            }
            if let Some(date) = hit.publish_date.as_deref().and_then(parse_publish_date) {
                candidate = candidate.with_publish_date(date);
            }
            if let (Some(width), Some(height)) = (hit.width, hit.height) {
                candidate = candidate.with_dimensions(width, height);
            }
            candidate
        })
        .collect()
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates
fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
