// SPDX-License-Identifier: MIT

//! Laplacian-variance sharpness gate.
//!
//! Converts the image to single-channel luminance, convolves with a 3x3
//! Laplacian kernel, and takes the variance of the filtered output. Low
//! variance means few edges, i.e. a blurry image.

use crate::error::{AppError, Result};
use image::GrayImage;

/// Verdict of the sharpness assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharpness {
    Sharp,
    Blurry,
}

/// Pure, deterministic blur detector.
#[derive(Debug, Clone)]
pub struct BlurDetector {
    /// Variance below this is blurry. Camera/domain dependent.
    threshold: f64,
}

impl BlurDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Assess raw image bytes.
    ///
    /// Fails only with `InvalidImageFormat` when the bytes do not decode.
    pub fn assess(&self, image_bytes: &[u8]) -> Result<Sharpness> {
        let decoded = image::load_from_memory(image_bytes)
            .map_err(|e| AppError::InvalidImageFormat(e.to_string()))?;
        let gray = decoded.to_luma8();

        let variance = laplacian_variance(&gray);
        tracing::debug!(variance, threshold = self.threshold, "Sharpness assessed");

        if variance < self.threshold {
            Ok(Sharpness::Blurry)
        } else {
            Ok(Sharpness::Sharp)
        }
    }
}

/// Variance of the 3x3 Laplacian response over the interior pixels.
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        // Too small to carry edge information; treat as zero variance.
        return 0.0;
    }

    let px = |x: u32, y: u32| -> f64 { f64::from(gray.get_pixel(x, y).0[0]) };

    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            // 4-neighbor Laplacian: center weighted -4, cross neighbors +1.
            let response = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1)
                - 4.0 * px(x, y);
            responses.push(response);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n
}
