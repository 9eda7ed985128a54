//! # Image Provenance
//!
//! Finds where else an image appears on the web and turns that evidence into
//! one credibility signal.
//!
//! ## How It Works
//! 1. Fingerprint the query image with four perceptual hashes plus color and
//!    edge features
//! 2. Ask every reverse-search backend for candidates, concurrently
//! 3. Download each candidate and recompute its similarity to the query
//! 4. Split the matches into exact / similar / modified tiers
//! 5. Summarize: dates, domains, suspicious patterns, credibility score
//!
//! ## Architecture
//! - `core` - The engine and its stages
//! - `events` - Progress reporting over channels
//! - `error` - Error types per stage
//!
//! ## Example
//! ```rust,ignore
//! use image_provenance::core::pipeline::Engine;
//! use image_provenance::core::search::HttpJsonBackend;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = Engine::builder()
//!     .backend(Arc::new(HttpJsonBackend::new("mirror", "https://search.example.com/api", Duration::from_secs(15))?))
//!     .build()?;
//! let report = engine.analyze_url("https://example.com/photo.jpg").await?;
//! println!("credibility: {:.2}", report.evidence.credibility_score);
//! ```

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use crate::core::pipeline::{Engine, EngineBuilder, EngineConfig, SearchReport};
pub use error::{ProvenanceError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Filtering follows
/// `RUST_LOG`. Calling it again once a subscriber is installed does nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
