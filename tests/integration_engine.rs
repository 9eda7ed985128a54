//! Integration tests for the engine.
//!
//! These tests verify end-to-end behavior including:
//! - An exact duplicate found by one backend
//! - Every backend failing
//! - The same hit reported by two backends
//! - Persistent caching across engine instances

use chrono::{TimeZone, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use image_provenance::core::cache::{EvidenceCache, SqliteCache};
use image_provenance::core::evidence::SuspiciousFlag;
use image_provenance::core::fingerprint::fingerprint;
use image_provenance::core::scorer::{weighted_similarity, SimilarityWeights, StaticFetcher, Verification};
use image_provenance::core::search::{BackendStatus, SearchBackend, SearchCandidate, StaticBackend};
use image_provenance::events::{Event, EventChannel, PipelineEvent};
use image_provenance::{Engine, ProvenanceError};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Broad shapes over a gradient; survives re-encoding well
fn scene(seed: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(160, 120, |x, y| {
        let cx = 40 + (seed * 17) % 80;
        let dx = x as i64 - cx as i64;
        let dy = y as i64 - 60;
        let in_disc = dx * dx + dy * dy < 900;
        let base = (x * 255 / 160) as u8;
        if in_disc {
            Rgb([255 - base, 40, (seed * 50 % 256) as u8])
        } else {
            Rgb([base, (y * 255 / 120) as u8, 128])
        }
    }))
}

fn png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

fn jpeg(image: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(image)
        .unwrap();
    bytes
}

fn hit(image_url: &str, source_url: &str) -> SearchCandidate {
    SearchCandidate::new(image_url, source_url)
}

fn engine(backends: Vec<Arc<dyn SearchBackend>>, fetcher: StaticFetcher) -> Engine {
    Engine::builder()
        .backends(backends)
        .fetcher(Arc::new(fetcher))
        .per_backend_timeout(Duration::from_millis(200))
        .build()
        .unwrap()
}

#[tokio::test]
async fn exact_duplicate_is_found() {
    let query = png(&scene(1));
    let backend = StaticBackend::with_results(
        "mirror",
        vec![hit("https://cdn.example.com/copy.png", "https://blog.example.com/post")],
    );
    let fetcher = StaticFetcher::new().with_image("https://cdn.example.com/copy.png", query.clone());

    let report = engine(vec![Arc::new(backend)], fetcher)
        .analyze_bytes(query, None)
        .await
        .unwrap();

    assert_eq!(report.categorized.exact.len(), 1);
    let top = &report.aggregated_results[0];
    assert_eq!(top.verification, Verification::Verified);
    assert!(top.similarity >= 0.99);

    let evidence = &report.evidence;
    assert_eq!(evidence.total_matches, 1);
    assert!((evidence.credibility_score - 0.7).abs() < 1e-9);
    assert!(evidence.has_flag(SuspiciousFlag::VeryFewMatches));
    assert!(evidence.oldest_match.is_none());
    assert_eq!(evidence.top_domains[0].domain, "blog.example.com");
}

#[tokio::test]
async fn all_backends_failing_yields_empty_summary() {
    let backends: Vec<Arc<dyn SearchBackend>> = vec![
        Arc::new(StaticBackend::failing("first", "HTTP 500")),
        Arc::new(StaticBackend::failing("second", "connection reset")),
        Arc::new(
            StaticBackend::with_results("slow", vec![hit("https://a.com/x.png", "https://a.com/")])
                .with_delay(Duration::from_secs(10)),
        ),
    ];

    let report = engine(backends, StaticFetcher::new())
        .analyze_bytes(png(&scene(2)), None)
        .await
        .unwrap();

    let statuses: Vec<_> = report.backend_runs.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![BackendStatus::Failed, BackendStatus::Failed, BackendStatus::Timeout]
    );
    assert!(report.categorized.is_empty());
    assert_eq!(report.evidence.total_matches, 0);
    assert_eq!(report.evidence.credibility_score, 0.1);
    assert_eq!(report.evidence.suspicious_flags.len(), 1);
    assert!(report.evidence.has_flag(SuspiciousFlag::NoMatchesFound));
}

#[tokio::test]
async fn duplicate_across_backends_keeps_highest_similarity() {
    // Image unreachable, so each backend's advisory similarity stands in
    let backends: Vec<Arc<dyn SearchBackend>> = vec![
        Arc::new(StaticBackend::with_results(
            "low",
            vec![hit("https://img.example.com/a.jpg", "https://news.example.com/a").with_backend_similarity(0.8)],
        )),
        Arc::new(StaticBackend::with_results(
            "high",
            vec![hit("https://img.example.com/a.jpg", "https://news.example.com/a").with_backend_similarity(0.97)],
        )),
    ];

    let report = engine(backends, StaticFetcher::new())
        .analyze_bytes(png(&scene(3)), None)
        .await
        .unwrap();

    assert_eq!(report.aggregated_results.len(), 1);
    let kept = &report.aggregated_results[0];
    assert_eq!(kept.similarity, 0.97);
    assert_eq!(kept.verification, Verification::Advisory);
    assert_eq!(kept.candidate.backend.as_str(), "high");
    assert_eq!(report.categorized.exact.len(), 1);
    assert!(report.evidence.has_flag(SuspiciousFlag::UnverifiedMatches));
}

#[tokio::test]
async fn equal_duplicates_keep_first_configured_backend() {
    let query = png(&scene(4));
    let same = || vec![hit("https://img.example.com/b.png", "https://news.example.com/b")];
    let backends: Vec<Arc<dyn SearchBackend>> = vec![
        Arc::new(StaticBackend::with_results("primary", same()).with_delay(Duration::from_millis(30))),
        Arc::new(StaticBackend::with_results("secondary", same())),
    ];
    let fetcher = StaticFetcher::new().with_image("https://img.example.com/b.png", query.clone());

    let report = engine(backends, fetcher).analyze_bytes(query, None).await.unwrap();

    assert_eq!(report.aggregated_results.len(), 1);
    assert_eq!(report.aggregated_results[0].candidate.backend.as_str(), "primary");
}

#[tokio::test]
async fn dated_matches_raise_credibility() {
    let query = png(&scene(5));
    let backend = StaticBackend::with_results(
        "mirror",
        vec![
            hit("https://img.example.com/c.png", "https://old.example.org/2015")
                .with_publish_date(Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap()),
            hit("https://img.example.com/c.png", "https://new.example.net/2020")
                .with_publish_date(Utc.with_ymd_and_hms(2020, 7, 9, 0, 0, 0).unwrap()),
        ],
    );
    let fetcher = StaticFetcher::new().with_image("https://img.example.com/c.png", query.clone());

    let report = engine(vec![Arc::new(backend)], fetcher)
        .analyze_bytes(query, None)
        .await
        .unwrap();

    let evidence = &report.evidence;
    assert_eq!(evidence.total_matches, 2);
    assert_eq!(evidence.oldest_match.as_ref().unwrap().domain, "old.example.org");
    assert_eq!(evidence.most_recent_match.as_ref().unwrap().domain, "new.example.net");
    assert!((evidence.credibility_score - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn results_are_capped_at_max_results() {
    let query = png(&scene(6));
    let hits: Vec<_> = (0..8)
        .map(|n| hit("https://img.example.com/d.png", &format!("https://site{}.example.com/", n)))
        .collect();
    let fetcher = StaticFetcher::new().with_image("https://img.example.com/d.png", query.clone());

    let engine = Engine::builder()
        .backend(Arc::new(StaticBackend::with_results("mirror", hits)))
        .fetcher(Arc::new(fetcher))
        .max_results(3)
        .build()
        .unwrap();
    let report = engine.analyze_bytes(query, None).await.unwrap();

    assert_eq!(report.categorized.total(), 8);
    assert_eq!(report.aggregated_results.len(), 3);
    assert_eq!(report.evidence.total_matches, 3);
}

#[test]
fn self_similarity_is_at_least_099() {
    let bytes = png(&scene(7));
    let fp = fingerprint(&bytes).unwrap();

    let score = weighted_similarity(&fp, &fp, &SimilarityWeights::default()).unwrap();

    assert!(score >= 0.99);
}

#[test]
fn fingerprint_is_deterministic_across_calls() {
    let bytes = png(&scene(8));
    assert_eq!(fingerprint(&bytes).unwrap(), fingerprint(&bytes).unwrap());
}

#[tokio::test]
async fn reencoded_copy_is_retained() {
    let image = scene(9);
    let query = png(&image);
    let backend = StaticBackend::with_results(
        "mirror",
        vec![hit("https://img.example.com/e.jpg", "https://forum.example.com/t/1")],
    );
    let fetcher = StaticFetcher::new().with_image("https://img.example.com/e.jpg", jpeg(&image, 95));

    let report = engine(vec![Arc::new(backend)], fetcher)
        .analyze_bytes(query, None)
        .await
        .unwrap();

    assert_eq!(report.aggregated_results.len(), 1);
    assert_eq!(report.aggregated_results[0].verification, Verification::Verified);
}

#[tokio::test]
async fn undecodable_query_is_rejected() {
    let result = engine(Vec::new(), StaticFetcher::new())
        .analyze_bytes(b"GIF89a but not really".to_vec(), None)
        .await;
    assert!(matches!(result, Err(ProvenanceError::Fingerprint(_))));
}

#[tokio::test]
async fn sqlite_cache_serves_second_engine() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("evidence.db");
    let query = png(&scene(10));

    let first = Engine::builder()
        .fetcher(Arc::new(StaticFetcher::new()))
        .cache(Arc::new(SqliteCache::open(&db_path).unwrap()))
        .build()
        .unwrap()
        .analyze_bytes(query.clone(), None)
        .await
        .unwrap();

    let cache = Arc::new(SqliteCache::open(&db_path).unwrap());
    assert_eq!(cache.stats().unwrap().total_entries, 1);

    let (sender, receiver) = EventChannel::new();
    let second = Engine::builder()
        .fetcher(Arc::new(StaticFetcher::new()))
        .cache(cache)
        .build()
        .unwrap()
        .analyze_bytes_with_events(query, None, &sender)
        .await
        .unwrap();

    assert_eq!(first.request_id, second.request_id);
    assert!(receiver
        .drain()
        .iter()
        .any(|e| matches!(e, Event::Pipeline(PipelineEvent::CacheHit { .. }))));
}

#[tokio::test]
async fn report_serializes_to_json() {
    let query = png(&scene(11));
    let backend = StaticBackend::with_results(
        "mirror",
        vec![hit("https://img.example.com/f.png", "https://www.shutterstock.com/f")],
    );
    let fetcher = StaticFetcher::new().with_image("https://img.example.com/f.png", query.clone());

    let report = engine(vec![Arc::new(backend)], fetcher)
        .analyze_bytes(query, None)
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert!(json["evidence"]["credibility_score"].is_number());
    assert_eq!(json["evidence"]["total_matches"], 1);
    assert!(json["evidence"].get("credibilityScore").is_none());
    assert!(json["aggregated_results"].is_array());

    let flags = json["evidence"]["suspicious_flags"].as_array().unwrap();
    assert!(flags.iter().any(|f| f == "stock_photo_usage"));
    assert_eq!(json["aggregated_results"][0]["verification"], "verified");
    assert_eq!(json["aggregated_results"][0]["domain"], "shutterstock.com");
}
