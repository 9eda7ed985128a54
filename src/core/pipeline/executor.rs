//! Engine execution implementation.

use super::EngineConfig;
use crate::core::cache::{content_key, CacheEntry, EvidenceCache, InMemoryCache};
use crate::core::categorizer::{CategorizedResultSet, ResultCategorizer};
use crate::core::evidence::{EvidenceAnalyzer, EvidenceSummary};
use crate::core::fingerprint::{Fingerprinter, ImageFingerprint};
use crate::core::scorer::{CandidateScorer, HttpImageFetcher, ImageFetcher, ScoredCandidate};
use crate::core::search::{
    BackendId, BackendOrchestrator, BackendRunResult, HttpJsonBackend, SearchBackend, SearchQuery,
};
use crate::error::{CacheError, FetchError, FingerprintError, ProvenanceError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase, PipelineSummary};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything produced for one query image
///
/// Serialized field names are snake_case throughout (`credibility_score`,
/// `total_matches`, `aggregated_results`, ...); the camelCase spellings
/// `credibilityScore`, `totalMatches` and `aggregatedResults` used by some
/// consumers map one-to-one onto them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub request_id: Uuid,
    /// Content hash of the query bytes
    pub content_key: String,
    pub query_fingerprint: ImageFingerprint,
    pub backend_runs: Vec<BackendRunResult>,
    pub categorized: CategorizedResultSet,
    /// All tiers merged, best first, capped at `max_results`
    pub aggregated_results: Vec<ScoredCandidate>,
    pub evidence: EvidenceSummary,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Builder for engine configuration
pub struct EngineBuilder {
    config: EngineConfig,
    backends: Vec<Arc<dyn SearchBackend>>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    cache: Option<Arc<dyn EvidenceCache>>,
    cache_enabled: bool,
}

impl EngineBuilder {
    /// Create a new engine builder
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            backends: Vec::new(),
            fetcher: None,
            cache: None,
            cache_enabled: true,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a backend; backends rank in the order they are added
    pub fn backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Add several backends
    pub fn backends(mut self, backends: impl IntoIterator<Item = Arc<dyn SearchBackend>>) -> Self {
        self.backends.extend(backends);
        self
    }

    /// Set the image fetcher (defaults to HTTP)
    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the cache backend (defaults to in-memory)
    pub fn cache(mut self, cache: Arc<dyn EvidenceCache>) -> Self {
        self.cache = Some(cache);
        self.cache_enabled = true;
        self
    }

    /// Never read or write cached reports
    pub fn disable_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Cap the aggregated result list
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.config.max_results = max_results;
        self
    }

    /// Set the per-backend timeout
    pub fn per_backend_timeout(mut self, timeout: Duration) -> Self {
        self.config.per_backend_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Bound searching plus candidate downloads for one request
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<Engine, ProvenanceError> {
        let config = self.config;
        config.validate()?;

        let mut backends = self.backends;
        for endpoint in &config.backends {
            let backend =
                HttpJsonBackend::new(&endpoint.id, &endpoint.endpoint, config.per_backend_timeout())?;
            backends.push(Arc::new(backend));
        }

        let fetcher: Arc<dyn ImageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpImageFetcher::new(
                config.scorer.fetch_timeout(),
                config.scorer.max_image_bytes,
            )?),
        };

        let cache = if self.cache_enabled {
            Some(
                self.cache
                    .unwrap_or_else(|| Arc::new(InMemoryCache::new()) as Arc<dyn EvidenceCache>),
            )
        } else {
            None
        };

        let fingerprinter = Arc::new(Fingerprinter::new(config.fingerprint.clone())?);

        Ok(Engine {
            orchestrator: BackendOrchestrator::new(backends, config.per_backend_timeout()),
            scorer: CandidateScorer::new(
                Arc::clone(&fetcher),
                Arc::clone(&fingerprinter),
                config.scorer.clone(),
            ),
            categorizer: ResultCategorizer::new(Arc::new(config.thresholds.clone())),
            analyzer: EvidenceAnalyzer::new(config.evidence.clone()),
            fingerprinter,
            fetcher,
            cache,
            config,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The provenance engine
///
/// Holds no per-request state; one instance can serve concurrent requests.
pub struct Engine {
    config: EngineConfig,
    fingerprinter: Arc<Fingerprinter>,
    orchestrator: BackendOrchestrator,
    scorer: CandidateScorer,
    categorizer: ResultCategorizer,
    analyzer: EvidenceAnalyzer,
    fetcher: Arc<dyn ImageFetcher>,
    cache: Option<Arc<dyn EvidenceCache>>,
}

impl Engine {
    /// Create a new engine builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Configured backend identifiers, in rank order
    pub fn backend_ids(&self) -> Vec<BackendId> {
        self.orchestrator.backend_ids()
    }

    /// Analyze raw image bytes
    pub async fn analyze_bytes(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        image_url: Option<String>,
    ) -> Result<SearchReport, ProvenanceError> {
        self.analyze_with_backends(bytes, image_url, None, &null_sender()).await
    }

    /// Download the image at `url`, then analyze it
    pub async fn analyze_url(&self, url: &str) -> Result<SearchReport, ProvenanceError> {
        let timeout = self.config.scorer.fetch_timeout();
        let bytes = match tokio::time::timeout(timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                }
                .into())
            }
        };
        debug!(url, bytes = bytes.len(), "Fetched query image");
        self.analyze_bytes(bytes, Some(url.to_string())).await
    }

    /// Analyze raw image bytes with progress events
    pub async fn analyze_bytes_with_events(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        image_url: Option<String>,
        events: &EventSender,
    ) -> Result<SearchReport, ProvenanceError> {
        self.analyze_with_backends(bytes, image_url, None, events).await
    }

    /// Analyze with an optional subset of backends.
    ///
    /// The cache is consulted and filled only when every backend is used.
    pub async fn analyze_with_backends(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        image_url: Option<String>,
        selection: Option<&HashSet<BackendId>>,
        events: &EventSender,
    ) -> Result<SearchReport, ProvenanceError> {
        let start_time = Instant::now();
        let request_id = Uuid::new_v4();
        let bytes: Arc<[u8]> = bytes.into();
        let key = content_key(&bytes);

        events.send(Event::Pipeline(PipelineEvent::Started { request_id }));

        let cache = self.cache.as_ref().filter(|_| selection.is_none());
        if let Some(cache) = cache {
            match cache_lookup(Arc::clone(cache), key.clone()).await {
                Ok(Some(entry)) => {
                    info!(%request_id, content_key = %key, "Serving cached report");
                    events.send(Event::Pipeline(PipelineEvent::CacheHit {
                        content_key: key,
                    }));
                    events.send(Event::Pipeline(PipelineEvent::Completed {
                        summary: summarize(&entry.report, start_time),
                    }));
                    return Ok(entry.report);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Cache lookup failed; computing report"),
            }
        }

        let result = self
            .compute(request_id, key, bytes, image_url, selection, events, start_time)
            .await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                events.send(Event::Pipeline(PipelineEvent::Error {
                    message: e.to_string(),
                }));
                return Err(e);
            }
        };

        if let Some(cache) = cache {
            let entry = CacheEntry::new(report.content_key.clone(), report.clone(), self.config.cache_ttl());
            if let Err(e) = cache_store(Arc::clone(cache), entry).await {
                warn!(error = %e, "Failed to cache report");
            }
        }

        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: summarize(&report, start_time),
        }));

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn compute(
        &self,
        request_id: Uuid,
        key: String,
        bytes: Arc<[u8]>,
        image_url: Option<String>,
        selection: Option<&HashSet<BackendId>>,
        events: &EventSender,
        start_time: Instant,
    ) -> Result<SearchReport, ProvenanceError> {
        // Phase 1: Fingerprinting
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Fingerprinting,
        }));
        let query_fingerprint = Arc::new(self.fingerprint_query(Arc::clone(&bytes)).await?);

        // Phase 2: Searching
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Searching,
        }));
        let budget = self.config.request_timeout();
        let deadline = tokio::time::Instant::now() + budget;
        let query = Arc::new(SearchQuery::new(bytes, image_url));
        let outcome = self
            .orchestrator
            .search_within(query, selection, budget, events)
            .await;
        let total_candidates = outcome.candidates.len();

        // Phase 3: Scoring
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Scoring,
        }));
        let scored = self
            .scorer
            .score_all_until(outcome.candidates, Arc::clone(&query_fingerprint), deadline, events)
            .await
            .map_err(|e| {
                error!(%request_id, error = %e, "Incomparable fingerprints");
                e
            })?;

        // Phase 4: Categorizing
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Categorizing,
        }));
        let categorized = self.categorizer.categorize(scored);
        let aggregated_results = categorized.aggregated(self.config.max_results);

        // Phase 5: Analyzing
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Analyzing,
        }));
        let evidence = self.analyzer.analyze(&aggregated_results);

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            %request_id,
            candidates = total_candidates,
            matches = aggregated_results.len(),
            credibility_score = evidence.credibility_score,
            duration_ms,
            "Provenance analysis complete"
        );

        Ok(SearchReport {
            request_id,
            content_key: key,
            query_fingerprint: Arc::unwrap_or_clone(query_fingerprint),
            backend_runs: outcome.run_results,
            categorized,
            aggregated_results,
            evidence,
            duration_ms,
        })
    }

    /// Fingerprint the query image on the blocking pool
    async fn fingerprint_query(&self, bytes: Arc<[u8]>) -> Result<ImageFingerprint, ProvenanceError> {
        let fingerprinter = Arc::clone(&self.fingerprinter);
        let fingerprint = tokio::task::spawn_blocking(move || fingerprinter.fingerprint(&bytes))
            .await
            .map_err(|e| FingerprintError::ComputationFailed(format!("fingerprint task failed: {}", e)))?;
        Ok(fingerprint?)
    }
}

/// Cache reads touch SQLite under a mutex, so they run on the blocking pool
async fn cache_lookup(
    cache: Arc<dyn EvidenceCache>,
    key: String,
) -> Result<Option<CacheEntry>, CacheError> {
    tokio::task::spawn_blocking(move || cache.get(&key, Utc::now()))
        .await
        .map_err(|e| CacheError::QueryFailed(format!("cache task failed: {}", e)))?
}

async fn cache_store(cache: Arc<dyn EvidenceCache>, entry: CacheEntry) -> Result<(), CacheError> {
    tokio::task::spawn_blocking(move || cache.set(entry))
        .await
        .map_err(|e| CacheError::QueryFailed(format!("cache task failed: {}", e)))?
}

fn summarize(report: &SearchReport, start_time: Instant) -> PipelineSummary {
    PipelineSummary {
        total_candidates: report.backend_runs.iter().map(|r| r.result_count).sum(),
        total_matches: report.aggregated_results.len(),
        credibility_score: report.evidence.credibility_score,
        duration_ms: start_time.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scorer::StaticFetcher;
    use crate::core::search::{SearchCandidate, StaticBackend};
    use crate::events::EventChannel;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(seed: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 48, |x, y| {
            Rgb([
                ((x * 4 + seed * 9) % 256) as u8,
                ((y * 5 + seed) % 256) as u8,
                ((x * y + seed * 3) % 256) as u8,
            ])
        }));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn engine_with(backends: Vec<Arc<dyn SearchBackend>>, fetcher: StaticFetcher) -> Engine {
        Engine::builder()
            .backends(backends)
            .fetcher(Arc::new(fetcher))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = Engine::builder().max_results(0).build();
        assert!(matches!(result, Err(ProvenanceError::Config(_))));
    }

    #[test]
    fn builder_creates_configured_http_backends() {
        let mut config = EngineConfig::default();
        config.backends.push(crate::core::pipeline::BackendEndpoint {
            id: "mirror".to_string(),
            endpoint: "https://search.example.com/api".to_string(),
        });

        let engine = Engine::builder()
            .backend(Arc::new(StaticBackend::empty("local")))
            .config(config)
            .build()
            .unwrap();

        let ids: Vec<_> = engine.backend_ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["local", "mirror"]);
    }

    #[tokio::test]
    async fn undecodable_query_is_fatal() {
        let engine = engine_with(vec![Arc::new(StaticBackend::empty("a"))], StaticFetcher::new());

        let result = engine.analyze_bytes(b"not an image".to_vec(), None).await;

        assert!(matches!(result, Err(ProvenanceError::Fingerprint(_))));
    }

    #[tokio::test]
    async fn no_backends_yields_low_confidence_report() {
        let engine = engine_with(Vec::new(), StaticFetcher::new());

        let report = engine.analyze_bytes(png(1), None).await.unwrap();

        assert!(report.backend_runs.is_empty());
        assert_eq!(report.evidence.credibility_score, 0.1);
    }

    #[tokio::test]
    async fn repeated_query_is_served_from_cache() {
        let engine = engine_with(vec![Arc::new(StaticBackend::empty("a"))], StaticFetcher::new());
        let bytes = png(2);

        let first = engine.analyze_bytes(bytes.clone(), None).await.unwrap();
        let (sender, receiver) = EventChannel::new();
        let second = engine
            .analyze_bytes_with_events(bytes, None, &sender)
            .await
            .unwrap();

        assert_eq!(first.request_id, second.request_id);
        assert!(receiver
            .drain()
            .iter()
            .any(|e| matches!(e, Event::Pipeline(PipelineEvent::CacheHit { .. }))));
    }

    #[tokio::test]
    async fn disabled_cache_recomputes() {
        let engine = Engine::builder()
            .fetcher(Arc::new(StaticFetcher::new()))
            .disable_cache()
            .build()
            .unwrap();
        let bytes = png(2);

        let first = engine.analyze_bytes(bytes.clone(), None).await.unwrap();
        let second = engine.analyze_bytes(bytes, None).await.unwrap();

        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.content_key, second.content_key);
    }

    #[tokio::test]
    async fn backend_selection_bypasses_cache() {
        let hit = SearchCandidate::new("https://img.example.com/a.png", "https://example.com/a");
        let engine = engine_with(
            vec![
                Arc::new(StaticBackend::with_results("a", vec![hit])),
                Arc::new(StaticBackend::empty("b")),
            ],
            StaticFetcher::new(),
        );
        let selection: HashSet<BackendId> = [BackendId::new("b")].into();

        let report = engine
            .analyze_with_backends(png(3), None, Some(&selection), &null_sender())
            .await
            .unwrap();

        assert_eq!(report.backend_runs.len(), 1);
        assert_eq!(report.backend_runs[0].backend.as_str(), "b");
    }

    #[tokio::test]
    async fn analyze_url_fetches_query_image() {
        let fetcher = StaticFetcher::new().with_image("https://example.com/query.png", png(4));
        let engine = engine_with(Vec::new(), fetcher);

        let report = engine.analyze_url("https://example.com/query.png").await.unwrap();
        assert_eq!(report.evidence.total_matches, 0);

        let missing = engine.analyze_url("https://example.com/missing.png").await;
        assert!(matches!(missing, Err(ProvenanceError::Fetch(FetchError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn emits_phases_in_order() {
        let engine = engine_with(vec![Arc::new(StaticBackend::empty("a"))], StaticFetcher::new());
        let (sender, receiver) = EventChannel::new();

        engine
            .analyze_bytes_with_events(png(5), None, &sender)
            .await
            .unwrap();

        let phases: Vec<PipelinePhase> = receiver
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                PipelinePhase::Fingerprinting,
                PipelinePhase::Searching,
                PipelinePhase::Scoring,
                PipelinePhase::Categorizing,
                PipelinePhase::Analyzing,
            ]
        );
    }

    #[tokio::test]
    async fn request_timeout_bounds_candidate_downloads() {
        let hits: Vec<_> = (0..40)
            .map(|n| {
                SearchCandidate::new(
                    format!("https://img.example.com/{}.png", n),
                    format!("https://site{}.example.com/", n),
                )
            })
            .collect();
        let mut config = EngineConfig::default();
        config.per_backend_timeout_ms = 150;
        config.scorer.fetch_timeout_ms = 1_000;
        config.request_timeout_ms = Some(300);
        let engine = Engine::builder()
            .config(config)
            .backend(Arc::new(StaticBackend::with_results("a", hits)))
            .fetcher(Arc::new(StaticFetcher::new().with_delay(Duration::from_secs(30))))
            .disable_cache()
            .build()
            .unwrap();

        let start = Instant::now();
        let report = engine.analyze_bytes(png(7), None).await.unwrap();

        // Five sequential fetch-timeout batches would take five seconds
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(report.categorized.total(), 40);
        assert!(report.aggregated_results.iter().all(|r| !r.is_verified()));
    }

    #[derive(Default)]
    struct ThreadRecordingCache {
        inner: InMemoryCache,
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ThreadRecordingCache {
        fn record(&self) {
            self.threads.lock().unwrap().push(std::thread::current().id());
        }
    }

    impl EvidenceCache for ThreadRecordingCache {
        fn get(&self, key: &str, now: chrono::DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
            self.record();
            self.inner.get(key, now)
        }

        fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
            self.record();
            self.inner.set(entry)
        }

        fn remove(&self, key: &str) -> Result<(), CacheError> {
            self.inner.remove(key)
        }

        fn clear(&self) -> Result<(), CacheError> {
            self.inner.clear()
        }

        fn stats(&self) -> Result<crate::core::cache::CacheStats, CacheError> {
            self.inner.stats()
        }

        fn prune_expired(&self, now: chrono::DateTime<Utc>) -> Result<usize, CacheError> {
            self.inner.prune_expired(now)
        }
    }

    #[tokio::test]
    async fn cache_io_runs_on_the_blocking_pool() {
        let cache = Arc::new(ThreadRecordingCache::default());
        let engine = Engine::builder()
            .fetcher(Arc::new(StaticFetcher::new()))
            .cache(cache.clone())
            .build()
            .unwrap();

        engine.analyze_bytes(png(8), None).await.unwrap();

        // The single-threaded test runtime drives the engine on this thread
        let threads = cache.threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != std::thread::current().id()));
    }
}
