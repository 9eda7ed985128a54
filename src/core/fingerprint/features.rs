//! Non-hash fingerprint features: luminance histogram and edge samples.

use image::{DynamicImage, GrayImage};

/// Number of luminance buckets in the color histogram
pub const HISTOGRAM_BUCKETS: usize = 256;

/// Largest possible Sobel magnitude for 8-bit input (|gx| = |gy| = 4 * 255)
const MAX_SOBEL_MAGNITUDE: f64 = 1442.497_833_620_557_7;

/// 256-bucket luminance histogram over the full decoded image, normalized to sum to 1.
pub fn color_histogram(image: &DynamicImage) -> Vec<f64> {
    let gray = image.to_luma8();
    let mut counts = [0u64; HISTOGRAM_BUCKETS];
    for pixel in gray.pixels() {
        counts[pixel[0] as usize] += 1;
    }

    let total = gray.pixels().len() as f64;
    if total == 0.0 {
        return vec![0.0; HISTOGRAM_BUCKETS];
    }
    counts.iter().map(|&c| c as f64 / total).collect()
}

/// Sobel gradient magnitudes at interior raster pixels, scaled to [0, 1] and
/// sampled at evenly spaced positions to exactly `samples` values.
///
/// Rasters with fewer interior pixels than `samples` are zero-padded.
pub fn edge_features(raster: &GrayImage, samples: usize) -> Vec<f64> {
    let (width, height) = raster.dimensions();
    let mut magnitudes = Vec::new();

    if width >= 3 && height >= 3 {
        let px = |x: u32, y: u32| raster.get_pixel(x, y)[0] as f64;
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let gx = px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2.0 * px(x - 1, y)
                    - px(x - 1, y + 1);
                let gy = px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2.0 * px(x, y - 1)
                    - px(x + 1, y - 1);
                magnitudes.push((gx * gx + gy * gy).sqrt() / MAX_SOBEL_MAGNITUDE);
            }
        }
    }

    if magnitudes.len() <= samples {
        magnitudes.resize(samples, 0.0);
        return magnitudes;
    }

    (0..samples)
        .map(|i| magnitudes[i * magnitudes.len() / samples])
        .collect()
}
