//! # Fingerprint Module
//!
//! Turns raw image bytes into a compact, comparable [`ImageFingerprint`].
//!
//! ## Supported Hashes
//! - **aHash (Average Hash)** - Fastest, good for exact duplicates
//! - **dHash (Difference Hash)** - Best balance of speed and accuracy
//! - **pHash (Perceptual Hash)** - Most robust, handles edits well
//! - **wHash (Wavelet Hash)** - Haar-based, robust to rescaling
//!
//! ## How It Works
//! 1. Decode the bytes (zune-jpeg fast path, image crate fallback)
//! 2. Convert to grayscale and resize to a fixed square raster
//! 3. Derive every hash from that one raster
//! 4. Add a luminance histogram of the full image and Sobel edge samples
//!
//! All hashes of a fingerprint are `hash_size * hash_size` bits long, so any
//! two fingerprints built from the same [`FingerprintConfig`] are comparable.
//!
//! ## Example
//! ```rust,ignore
//! use image_provenance::core::fingerprint::{Fingerprinter, FingerprintConfig};
//!
//! let fingerprinter = Fingerprinter::new(FingerprintConfig::default())?;
//! let fingerprint = fingerprinter.fingerprint(&bytes)?;
//! ```

mod algorithms;
pub mod decode;
pub mod features;
pub mod resize;
mod traits;

pub use algorithms::{AverageHasher, DifferenceHasher, PerceptualHasher, WaveletHasher};
pub use decode::decode_image;
pub use traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue, PerceptualHash};

use crate::error::{FingerprintError, ProvenanceError};
use image::DynamicImage;
use resize::FastResizer;
use serde::{Deserialize, Serialize};

/// Configuration for fingerprint generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Side of the normalized grayscale raster (power of two)
    pub raster_size: u32,
    /// Side of each hash grid; every hash has `hash_size^2` bits (power of two)
    pub hash_size: u32,
    /// Number of edge magnitude samples kept
    pub edge_samples: usize,
    /// Compute a real Haar wavelet hash. When false the average hash
    /// algorithm stands in and the fingerprint is marked reduced-accuracy.
    pub wavelet_enabled: bool,
}

impl FingerprintConfig {
    /// Create a configuration with defaults (64px raster, 256-bit hashes)
    pub fn new() -> Self {
        Self {
            raster_size: 64,
            hash_size: 16,
            edge_samples: 256,
            wavelet_enabled: true,
        }
    }

    /// Set the normalized raster side
    pub fn raster_size(mut self, size: u32) -> Self {
        self.raster_size = size;
        self
    }

    /// Set the hash grid side
    ///
    /// - 8: 64 bits, fast
    /// - 16: 256 bits, default
    /// - 32: 1024 bits, very accurate
    pub fn hash_size(mut self, size: u32) -> Self {
        self.hash_size = size;
        self
    }

    /// Set the number of edge samples
    pub fn edge_samples(mut self, samples: usize) -> Self {
        self.edge_samples = samples;
        self
    }

    /// Enable or disable the Haar wavelet hash
    pub fn wavelet_enabled(mut self, enabled: bool) -> Self {
        self.wavelet_enabled = enabled;
        self
    }

    /// Check that the sizes are usable
    pub fn validate(&self) -> Result<(), ProvenanceError> {
        if !self.raster_size.is_power_of_two() || !self.hash_size.is_power_of_two() {
            return Err(ProvenanceError::Config(format!(
                "raster_size ({}) and hash_size ({}) must be powers of two",
                self.raster_size, self.hash_size
            )));
        }
        if self.hash_size < 2 || self.hash_size > self.raster_size {
            return Err(ProvenanceError::Config(format!(
                "hash_size ({}) must be between 2 and raster_size ({})",
                self.hash_size, self.raster_size
            )));
        }
        if self.edge_samples == 0 {
            return Err(ProvenanceError::Config(
                "edge_samples must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How the wavelet hash slot of a fingerprint was filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveletMode {
    /// Real Haar decomposition
    Haar,
    /// Reduced-accuracy mode: the average hash algorithm was reused
    AverageFallback,
}

/// The full comparable feature set of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFingerprint {
    pub ahash: ImageHashValue,
    pub dhash: ImageHashValue,
    pub phash: ImageHashValue,
    pub whash: ImageHashValue,
    pub wavelet_mode: WaveletMode,
    /// Luminance histogram over the full image, sums to 1
    pub color_histogram: Vec<f64>,
    /// Sobel magnitude samples in [0, 1]
    pub edge_features: Vec<f64>,
}

impl ImageFingerprint {
    /// Look up a hash by algorithm
    pub fn hash(&self, kind: HashAlgorithmKind) -> &ImageHashValue {
        match kind {
            HashAlgorithmKind::Average => &self.ahash,
            HashAlgorithmKind::Difference => &self.dhash,
            HashAlgorithmKind::Perceptual => &self.phash,
            HashAlgorithmKind::Wavelet => &self.whash,
        }
    }

    /// True when the wavelet slot holds the average-hash fallback
    pub fn is_reduced_accuracy(&self) -> bool {
        self.wavelet_mode == WaveletMode::AverageFallback
    }
}

/// Computes fingerprints with a fixed configuration
pub struct Fingerprinter {
    config: FingerprintConfig,
    average: AverageHasher,
    difference: DifferenceHasher,
    perceptual: PerceptualHasher,
    wavelet: Option<WaveletHasher>,
}

impl Fingerprinter {
    /// Build a fingerprinter, rejecting unusable sizes
    pub fn new(config: FingerprintConfig) -> Result<Self, ProvenanceError> {
        config.validate()?;
        let size = config.hash_size;
        Ok(Self {
            average: AverageHasher::new(size),
            difference: DifferenceHasher::new(size),
            perceptual: PerceptualHasher::new(size),
            wavelet: config.wavelet_enabled.then(|| WaveletHasher::new(size)),
            config,
        })
    }

    /// The configuration in use
    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Decode `bytes` and fingerprint the result
    pub fn fingerprint(&self, bytes: &[u8]) -> Result<ImageFingerprint, FingerprintError> {
        let image = decode_image(bytes)?;
        self.fingerprint_image(&image)
    }

    /// Fingerprint an already-decoded image
    pub fn fingerprint_image(&self, image: &DynamicImage) -> Result<ImageFingerprint, FingerprintError> {
        let size = self.config.raster_size;
        let raster = FastResizer::new().normalize(image, size, size)?;

        let ahash = self.average.hash_raster(&raster)?;
        let dhash = self.difference.hash_raster(&raster)?;
        let phash = self.perceptual.hash_raster(&raster)?;
        let (whash, wavelet_mode) = match &self.wavelet {
            Some(wavelet) => (wavelet.hash_raster(&raster)?, WaveletMode::Haar),
            None => (
                ImageHashValue::new(ahash.as_bytes().to_vec(), HashAlgorithmKind::Wavelet),
                WaveletMode::AverageFallback,
            ),
        };

        Ok(ImageFingerprint {
            ahash,
            dhash,
            phash,
            whash,
            wavelet_mode,
            color_histogram: features::color_histogram(image),
            edge_features: features::edge_features(&raster, self.config.edge_samples),
        })
    }
}

/// Fingerprint bytes with the default configuration
pub fn fingerprint(bytes: &[u8]) -> Result<ImageFingerprint, FingerprintError> {
    let fingerprinter = Fingerprinter::new(FingerprintConfig::default())
        .map_err(|e| FingerprintError::ComputationFailed(e.to_string()))?;
    fingerprinter.fingerprint(bytes)
}
