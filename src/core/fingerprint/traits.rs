//! Trait definitions for perceptual hashing.

use crate::error::{CompareError, FingerprintError};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// A computed perceptual hash that can be compared
pub trait PerceptualHash: Clone + Send + Sync {
    /// Compute the Hamming distance to another hash
    ///
    /// Returns the number of bits that differ between the two hashes.
    /// Lower distance = more similar images.
    fn distance(&self, other: &Self) -> u32;

    /// Get the raw hash bytes
    fn as_bytes(&self) -> &[u8];

    /// Get the hash as a hexadecimal string
    fn to_hex(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Get the total number of bits in this hash
    fn bit_count(&self) -> u32 {
        (self.as_bytes().len() * 8) as u32
    }

    /// Similarity in [0, 1]: `1 - distance / bit_count`
    fn similarity(&self, other: &Self) -> f64 {
        let max_distance = self.bit_count();
        if max_distance == 0 {
            return 1.0;
        }
        1.0 - (self.distance(other) as f64 / max_distance as f64)
    }
}

/// Available hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithmKind {
    /// Average Hash (aHash) - pixels against the mean brightness
    Average,
    /// Difference Hash (dHash) - horizontal brightness gradients
    Difference,
    /// Perceptual Hash (pHash) - low DCT frequencies against their median
    Perceptual,
    /// Wavelet Hash (wHash) - Haar approximation band against its mean
    Wavelet,
}

impl HashAlgorithmKind {
    /// Get a human-readable description of the algorithm
    pub fn description(&self) -> &'static str {
        match self {
            HashAlgorithmKind::Average => {
                "Average Hash (aHash) - Fast comparison based on average brightness"
            }
            HashAlgorithmKind::Difference => {
                "Difference Hash (dHash) - Compares brightness gradients between pixels"
            }
            HashAlgorithmKind::Perceptual => {
                "Perceptual Hash (pHash) - DCT-based, robust to edits and transformations"
            }
            HashAlgorithmKind::Wavelet => {
                "Wavelet Hash (wHash) - Haar decomposition, robust to rescaling"
            }
        }
    }
}

impl std::fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithmKind::Average => write!(f, "aHash"),
            HashAlgorithmKind::Difference => write!(f, "dHash"),
            HashAlgorithmKind::Perceptual => write!(f, "pHash"),
            HashAlgorithmKind::Wavelet => write!(f, "wHash"),
        }
    }
}

/// Trait for hash algorithm implementations
///
/// Every algorithm works on the same normalized grayscale raster so that
/// hashes computed at fingerprint time and at comparison time line up.
pub trait HashAlgorithm: Send + Sync {
    /// Compute a hash from the normalized raster
    fn hash_raster(&self, raster: &GrayImage) -> Result<ImageHashValue, FingerprintError>;

    /// Get the algorithm kind
    fn kind(&self) -> HashAlgorithmKind;
}

/// Concrete hash value type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashValue {
    /// The raw hash bytes
    bytes: Vec<u8>,
    /// The algorithm that produced this hash
    algorithm: HashAlgorithmKind,
}

impl ImageHashValue {
    /// Create a new hash value
    pub fn new(bytes: Vec<u8>, algorithm: HashAlgorithmKind) -> Self {
        Self { bytes, algorithm }
    }

    /// Get the algorithm that produced this hash
    pub fn algorithm(&self) -> HashAlgorithmKind {
        self.algorithm
    }

    /// Similarity that refuses to compare hashes of different lengths
    pub fn checked_similarity(&self, other: &Self) -> Result<f64, CompareError> {
        if self.bit_count() != other.bit_count() {
            return Err(CompareError::IncomparableHash {
                algorithm: self.algorithm.to_string(),
                left: self.bit_count(),
                right: other.bit_count(),
            });
        }
        Ok(self.similarity(other))
    }
}

impl PerceptualHash for ImageHashValue {
    fn distance(&self, other: &Self) -> u32 {
        // Hamming distance: count differing bits
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
