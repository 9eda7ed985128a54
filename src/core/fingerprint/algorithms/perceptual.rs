//! Perceptual Hash (pHash) implementation.
//!
//! pHash uses the Discrete Cosine Transform (DCT) to extract
//! frequency information from the image. This makes it more
//! robust to:
//! - Scaling
//! - Brightness/contrast changes
//! - Compression artifacts
//!
//! The DCT, low-frequency crop and median binarization come from the
//! image_hasher crate, fed with our normalized raster.

use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use crate::error::FingerprintError;
use image::{DynamicImage, GrayImage};
use image_hasher::{HashAlg, HasherConfig as ImageHasherConfig};

/// Perceptual Hash (pHash) implementation using DCT
pub struct PerceptualHasher {
    /// Internal hasher from image_hasher crate
    hasher: image_hasher::Hasher,
}

impl PerceptualHasher {
    /// Create a new pHash hasher producing `hash_size * hash_size` bits
    pub fn new(hash_size: u32) -> Self {
        let hasher = ImageHasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();

        Self { hasher }
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_raster(&self, raster: &GrayImage) -> Result<ImageHashValue, FingerprintError> {
        let image = DynamicImage::ImageLuma8(raster.clone());
        let hash = self.hasher.hash_image(&image);

        Ok(ImageHashValue::new(
            hash.as_bytes().to_vec(),
            HashAlgorithmKind::Perceptual,
        ))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Perceptual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::traits::PerceptualHash;
    use image::Luma;

    fn checkerboard() -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Luma([40])
            } else {
                Luma([200])
            }
        })
    }

    #[test]
    fn identical_rasters_produce_identical_hash() {
        let hasher = PerceptualHasher::new(8);
        let raster = checkerboard();

        let hash1 = hasher.hash_raster(&raster).unwrap();
        let hash2 = hasher.hash_raster(&raster).unwrap();

        assert_eq!(hash1.distance(&hash2), 0);
    }

    #[test]
    fn mirrored_gradient_changes_hash() {
        let hasher = PerceptualHasher::new(8);
        let rising = GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]));
        let falling = GrayImage::from_fn(64, 64, |x, _| Luma([((63 - x) * 4) as u8]));

        let hash1 = hasher.hash_raster(&rising).unwrap();
        let hash2 = hasher.hash_raster(&falling).unwrap();

        assert!(hash1.distance(&hash2) > 0);
    }

    #[test]
    fn hash_size_sets_bit_count() {
        let hasher = PerceptualHasher::new(16);
        let hash = hasher.hash_raster(&checkerboard()).unwrap();
        assert_eq!(hash.bit_count(), 256);
    }

    #[test]
    fn kind_returns_perceptual() {
        assert_eq!(PerceptualHasher::new(8).kind(), HashAlgorithmKind::Perceptual);
    }
}
