//! Wavelet Hash (wHash) implementation.
//!
//! wHash works by:
//! 1. Fully decomposing the normalized raster with a 2D Haar transform
//! 2. Zeroing the DC coefficient and reconstructing (removes global brightness)
//! 3. Decomposing again down to a hash_size x hash_size approximation band
//! 4. Setting a bit for each approximation coefficient above the band mean
//!
//! The raster side and the hash size must both be powers of two.

use super::super::traits::{HashAlgorithm, HashAlgorithmKind, ImageHashValue};
use super::pack_bits;
use crate::error::FingerprintError;
use image::GrayImage;

/// Wavelet Hash (wHash) implementation
pub struct WaveletHasher {
    hash_size: u32,
}

impl WaveletHasher {
    /// Create a new wHash hasher
    pub fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }
}

/// One forward Haar level over the top-left `span` x `span` block.
fn forward_level(data: &mut [f64], stride: usize, span: usize) {
    let half = span / 2;
    let mut scratch = vec![0.0; span];

    for row in 0..span {
        let base = row * stride;
        for j in 0..half {
            let (a, b) = (data[base + 2 * j], data[base + 2 * j + 1]);
            scratch[j] = (a + b) / 2.0;
            scratch[half + j] = (a - b) / 2.0;
        }
        data[base..base + span].copy_from_slice(&scratch);
    }

    for col in 0..span {
        for i in 0..half {
            let (a, b) = (data[2 * i * stride + col], data[(2 * i + 1) * stride + col]);
            scratch[i] = (a + b) / 2.0;
            scratch[half + i] = (a - b) / 2.0;
        }
        for (i, value) in scratch.iter().enumerate() {
            data[i * stride + col] = *value;
        }
    }
}

/// Inverse of [`forward_level`].
fn inverse_level(data: &mut [f64], stride: usize, span: usize) {
    let half = span / 2;
    let mut scratch = vec![0.0; span];

    for col in 0..span {
        for i in 0..half {
            let (avg, diff) = (data[i * stride + col], data[(half + i) * stride + col]);
            scratch[2 * i] = avg + diff;
            scratch[2 * i + 1] = avg - diff;
        }
        for (i, value) in scratch.iter().enumerate() {
            data[i * stride + col] = *value;
        }
    }

    for row in 0..span {
        let base = row * stride;
        for j in 0..half {
            let (avg, diff) = (data[base + j], data[base + half + j]);
            scratch[2 * j] = avg + diff;
            scratch[2 * j + 1] = avg - diff;
        }
        data[base..base + span].copy_from_slice(&scratch);
    }
}

impl HashAlgorithm for WaveletHasher {
    fn hash_raster(&self, raster: &GrayImage) -> Result<ImageHashValue, FingerprintError> {
        let (width, height) = raster.dimensions();
        let hash_size = self.hash_size;
        if width != height
            || !width.is_power_of_two()
            || !hash_size.is_power_of_two()
            || hash_size > width
        {
            return Err(FingerprintError::ComputationFailed(format!(
                "wavelet hash needs a power-of-two square raster of at least {}px, got {}x{}",
                hash_size, width, height
            )));
        }

        let size = width as usize;
        let mut data: Vec<f64> = raster.pixels().map(|p| p[0] as f64 / 255.0).collect();

        let mut span = size;
        while span > 1 {
            forward_level(&mut data, size, span);
            span /= 2;
        }
        data[0] = 0.0;
        let mut span = 2;
        while span <= size {
            inverse_level(&mut data, size, span);
            span *= 2;
        }

        let mut span = size;
        while span > hash_size as usize {
            forward_level(&mut data, size, span);
            span /= 2;
        }

        let band: Vec<f64> = (0..span)
            .flat_map(|row| data[row * size..row * size + span].iter().copied())
            .collect();
        let mean = band.iter().sum::<f64>() / band.len() as f64;

        Ok(ImageHashValue::new(
            pack_bits(band.iter().map(|&c| c > mean)),
            HashAlgorithmKind::Wavelet,
        ))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Wavelet
    }
}
