//! # Error Module
//!
//! Error types for the provenance engine.
//!
//! ## Design Principles
//! - **Never panic** on untrusted image bytes - return errors instead
//! - **Include context** - URLs, backend ids, what went wrong
//! - **Recover locally** - backend and candidate failures become empty contributions;
//!   only the query image and hash configuration bugs are fatal

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Categorization error: {0}")]
    Categorize(#[from] CategorizeError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while turning bytes into a fingerprint
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Failed to decode image: {reason}")]
    DecodeError { reason: String },

    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Fingerprint computation failed: {0}")]
    ComputationFailed(String),
}

/// Errors raised by a single search backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend {backend} failed: {reason}")]
    Failed { backend: String, reason: String },

    #[error("Backend {backend} timed out after {}ms", .timeout.as_millis())]
    Timeout { backend: String, timeout: Duration },

    #[error("Backend {backend} returned an unreadable response: {reason}")]
    InvalidResponse { backend: String, reason: String },
}

/// Errors downloading a candidate (or query) image
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Fetching {url} timed out after {}ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("{url} exceeded the {limit} byte limit")]
    TooLarge { url: String, limit: usize },

    #[error("No image registered for {url}")]
    NotFound { url: String },
}

/// Errors comparing two fingerprints
#[derive(Error, Debug)]
pub enum CompareError {
    #[error(
        "Cannot compare {algorithm} hashes of different lengths ({left} vs {right} bits); \
         fingerprint configuration mismatch"
    )]
    IncomparableHash {
        algorithm: String,
        left: u32,
        right: u32,
    },
}

/// Errors configuring the categorizer
#[derive(Error, Debug)]
pub enum CategorizeError {
    #[error(
        "Invalid thresholds: exact={exact}, similar={similar}, modified={modified} \
         (must satisfy 0 <= modified <= similar <= exact <= 1)"
    )]
    InvalidThresholds { exact: f64, similar: f64, modified: f64 },
}

/// Errors that occur with the evidence cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Failed to serialize cached report: {0}")]
    SerializationFailed(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ProvenanceError>;
