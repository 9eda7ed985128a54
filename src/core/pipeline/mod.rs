//! # Pipeline Module
//!
//! Runs one provenance request end to end.
//!
//! ## Pipeline Stages
//! 1. **Fingerprint** - Hash the query image (on the blocking pool)
//! 2. **Search** - Fan out to every backend concurrently
//! 3. **Score** - Download and re-score each candidate against the query
//! 4. **Categorize** - Deduplicate and split into exact / similar / modified
//! 5. **Analyze** - Condense the aggregated results into evidence
//!
//! Finished reports are cached by image content; see [`crate::core::cache`].

mod config;
mod executor;

pub use config::{BackendEndpoint, EngineConfig};
pub use executor::{Engine, EngineBuilder, SearchReport};
