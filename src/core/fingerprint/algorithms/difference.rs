//! Difference Hash (dHash) implementation.
//!
//! dHash works by:
//! 1. Downsampling the normalized raster to (hash_size+1) x hash_size
//! 2. Comparing each pixel to the one to its right
//! 3. If left pixel is brighter, set bit to 1, else 0
//!
//! This captures the relative gradient of brightness changes.

use super::super::resize::resize_gray;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use super::pack_bits;
use crate::error::FingerprintError;
use image::GrayImage;

/// Difference Hash (dHash) implementation
pub struct DifferenceHasher {
    /// Size of the hash (width and height of comparison grid)
    hash_size: u32,
}

impl DifferenceHasher {
    /// Create a new dHash hasher
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn hash_raster(&self, raster: &GrayImage) -> Result<ImageHashValue, FingerprintError> {
        // One extra column to compute differences
        let gray = resize_gray(raster, self.hash_size + 1, self.hash_size)?;
        let size = self.hash_size;

        let grid = &gray;
        let bits = (0..size).flat_map(move |y| {
            (0..size).map(move |x| grid.get_pixel(x, y)[0] > grid.get_pixel(x + 1, y)[0])
        });

        Ok(ImageHashValue::new(pack_bits(bits), HashAlgorithmKind::Difference))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Difference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::traits::PerceptualHash;
    use image::Luma;

    fn left_to_right_gradient() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]))
    }

    fn right_to_left_gradient() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, _| Luma([((63 - x) * 4) as u8]))
    }

    #[test]
    fn identical_rasters_produce_identical_hash() {
        let hasher = DifferenceHasher::new(8);
        let raster = left_to_right_gradient();

        let hash1 = hasher.hash_raster(&raster).unwrap();
        let hash2 = hasher.hash_raster(&raster).unwrap();

        assert_eq!(hash1.distance(&hash2), 0);
    }

    #[test]
    fn opposite_gradients_are_far_apart() {
        let hasher = DifferenceHasher::new(8);

        let hash1 = hasher.hash_raster(&left_to_right_gradient()).unwrap();
        let hash2 = hasher.hash_raster(&right_to_left_gradient()).unwrap();

        // Brightening rows never set a bit, darkening rows set every bit
        assert!(hash1.as_bytes().iter().all(|&b| b == 0x00));
        assert!(hash1.distance(&hash2) > 32);
    }

    #[test]
    fn hash_size_affects_output_length() {
        let raster = left_to_right_gradient();

        assert_eq!(DifferenceHasher::new(8).hash_raster(&raster).unwrap().as_bytes().len(), 8);
        assert_eq!(DifferenceHasher::new(16).hash_raster(&raster).unwrap().as_bytes().len(), 32);
    }

    #[test]
    fn kind_returns_difference() {
        assert_eq!(DifferenceHasher::new(8).kind(), HashAlgorithmKind::Difference);
    }
}
