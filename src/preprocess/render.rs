use std::fs;
use std::path::Path;

use image::{GrayImage, Luma};

use crate::error::{DigitError, Result};
use crate::sample::{DigitSample, IMAGE_SIDE};

// Ink is drawn bright, matching how the classifier sees it
pub fn digit_to_image(sample: &DigitSample) -> GrayImage {
    GrayImage::from_fn(IMAGE_SIDE as u32, IMAGE_SIDE as u32, |x, y| {
        let value = sample.pixel(y as usize, x as usize).clamp(0.0, 1.0);
        Luma([(value * 255.0).round() as u8])
    })
}

/// Save a sample as a 28x28 grayscale image, creating the output directory if needed.
pub fn render_digit(sample: &DigitSample, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    digit_to_image(sample)
        .save(path)
        .map_err(|source| DigitError::Image {
            path: path.to_path_buf(),
            source,
        })
}
