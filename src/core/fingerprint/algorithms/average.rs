//! Average Hash (aHash) implementation.
//!
//! aHash works by:
//! 1. Downsampling the normalized raster to hash_size x hash_size
//! 2. Computing the mean brightness
//! 3. For each pixel: if brighter than the mean, set bit to 1, else 0
//!
//! This is the fastest hash but less robust to edits.

use super::super::resize::resize_gray;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use super::pack_bits;
use crate::error::FingerprintError;
use image::GrayImage;

/// Average Hash (aHash) implementation
pub struct AverageHasher {
    /// Size of the hash (width and height)
    hash_size: u32,
}

impl AverageHasher {
    /// Create a new aHash hasher
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }

    /// Mean-threshold bits of an already-sized grid
    pub(crate) fn threshold_bits(grid: &GrayImage) -> Vec<u8> {
        let count = grid.pixels().len().max(1) as f64;
        let mean = grid.pixels().map(|p| p[0] as f64).sum::<f64>() / count;

        pack_bits(grid.pixels().map(|p| p[0] as f64 > mean))
    }
}

impl HashAlgorithm for AverageHasher {
    fn hash_raster(&self, raster: &GrayImage) -> Result<ImageHashValue, FingerprintError> {
        let grid = if raster.dimensions() == (self.hash_size, self.hash_size) {
            raster.clone()
        } else {
            resize_gray(raster, self.hash_size, self.hash_size)?
        };

        Ok(ImageHashValue::new(
            Self::threshold_bits(&grid),
            HashAlgorithmKind::Average,
        ))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Average
    }
}
