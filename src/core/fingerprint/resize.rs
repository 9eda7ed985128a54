//! SIMD-accelerated normalization resizing.
//!
//! Uses fast_image_resize with one fixed bilinear convolution filter for every
//! resize in the crate. Query images and candidate images go through exactly
//! the same code path, which keeps their hashes comparable.

use crate::error::FingerprintError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

/// Reusable grayscale resizer
pub struct FastResizer {
    resizer: Resizer,
    options: ResizeOptions,
}

impl FastResizer {
    /// Create a new resizer with the fixed normalization filter
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        }
    }

    /// Convert to grayscale and resize to `width` x `height`.
    pub fn normalize(
        &mut self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, FingerprintError> {
        // Grayscale first, then resize a single channel
        self.resize_gray(&image.to_luma8(), width, height)
    }

    /// Resize an already-grayscale raster.
    pub fn resize_gray(
        &mut self,
        gray: &GrayImage,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, FingerprintError> {
        let (src_width, src_height) = gray.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(FingerprintError::EmptyImage {
                width: src_width,
                height: src_height,
            });
        }
        if width == 0 || height == 0 {
            return Err(FingerprintError::ComputationFailed(format!(
                "Invalid destination dimensions {}x{}",
                width, height
            )));
        }

        let src_image = Image::from_vec_u8(src_width, src_height, gray.as_raw().clone(), PixelType::U8)
            .map_err(|e| {
                FingerprintError::ComputationFailed(format!("Failed to create source image: {}", e))
            })?;
        let mut dst_image = Image::new(width, height, PixelType::U8);

        self.resizer
            .resize(&src_image, &mut dst_image, &self.options)
            .map_err(|e| FingerprintError::ComputationFailed(format!("Resize failed: {}", e)))?;

        let result: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(width, height, dst_image.into_vec()).ok_or_else(|| {
                FingerprintError::ComputationFailed("Failed to create result buffer".to_string())
            })?;

        Ok(result)
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function for one-off grayscale resizing
pub fn resize_gray(gray: &GrayImage, width: u32, height: u32) -> Result<GrayImage, FingerprintError> {
    FastResizer::new().resize_gray(gray, width, height)
}
