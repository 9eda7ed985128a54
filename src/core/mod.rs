//! # Core Module
//!
//! The provenance engine.
//!
//! ## Modules
//! - `fingerprint` - Perceptual hashes and features of one image
//! - `search` - Reverse-search backends and their concurrent fan-out
//! - `scorer` - Downloads candidates and recomputes their similarity
//! - `categorizer` - Deduplicates and tiers scored candidates
//! - `evidence` - Summarizes matches into a credibility signal
//! - `cache` - Stores finished reports by image content
//! - `pipeline` - Orchestrates the full workflow

pub mod cache;
pub mod categorizer;
pub mod evidence;
pub mod fingerprint;
pub mod pipeline;
pub mod scorer;
pub mod search;

#[cfg(test)]
pub(crate) mod test_server;

// Re-export commonly used types
pub use categorizer::{CategorizedResultSet, MatchTier};
pub use evidence::{EvidenceSummary, SuspiciousFlag};
pub use fingerprint::{fingerprint, FingerprintConfig, ImageFingerprint};
pub use scorer::{ScoredCandidate, Verification};
pub use search::{BackendRunResult, SearchBackend, SearchCandidate};
