use std::path::Path;

use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Luma};

use crate::error::{DigitError, Result};
use crate::sample::{DigitSample, IMAGE_AREA, IMAGE_SIDE};

// The digit is scaled so its longer side spans this many pixels
const DIGIT_SPAN: u32 = 20;
// Offset of the digit along its longer side
const MARGIN: i64 = 4;
const CANVAS_SIDE: u32 = IMAGE_SIDE as u32;

// 3x3 sharpening kernel, applied as sum / 16
const SHARPEN_KERNEL: [i32; 9] = [-2, -2, -2, -2, 32, -2, -2, -2, -2];
const SHARPEN_SCALE: i32 = 16;

/// Open an image file and turn it into a classifier-ready digit.
pub fn normalize_path(path: impl AsRef<Path>) -> Result<DigitSample> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| DigitError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!(
        "Normalizing {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    normalize_image(&image)
}

/// Turn an arbitrary image of a single dark-on-light digit into a 28x28 sample.
///
/// The longer side is resized to 20 pixels (the shorter one proportionally, never
/// below 1), sharpened, pasted on a white 28x28 canvas 4 pixels in from the edge
/// along the longer side and centered along the other, then inverted so strokes
/// become the high values.
pub fn normalize_image(image: &DynamicImage) -> Result<DigitSample> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(DigitError::Shape {
            expected: IMAGE_AREA,
            actual: 0,
        });
    }

    let (new_width, new_height, left, top) = if width > height {
        let new_height = scale_side(height, width);
        (DIGIT_SPAN, new_height, MARGIN, centered_offset(new_height))
    } else {
        let new_width = scale_side(width, height);
        (new_width, DIGIT_SPAN, centered_offset(new_width), MARGIN)
    };

    let resized = imageops::resize(&gray, new_width, new_height, FilterType::Lanczos3);
    let digit = sharpen(&resized);

    let mut canvas = GrayImage::from_pixel(CANVAS_SIDE, CANVAS_SIDE, Luma([u8::MAX]));
    imageops::replace(&mut canvas, &digit, left, top);

    let pixels = canvas
        .pixels()
        .map(|p| (u8::MAX - p[0]) as f32 / u8::MAX as f32)
        .collect();
    DigitSample::new(pixels)
}

// Proportional length of the shorter side once the longer one spans DIGIT_SPAN
fn scale_side(short: u32, long: u32) -> u32 {
    let scaled = (DIGIT_SPAN as f64 / long as f64 * short as f64).round_ties_even() as u32;
    scaled.max(1)
}

fn centered_offset(length: u32) -> i64 {
    ((CANVAS_SIDE - length) as f64 / 2.0).round_ties_even() as i64
}

// Border pixels are copied through unchanged, so images narrower than the kernel
// come back as-is.
fn sharpen(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut output = image.clone();
    if width < 3 || height < 3 {
        return output;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum = 0;
            for (tap, weight) in SHARPEN_KERNEL.iter().enumerate() {
                let tx = x + tap as u32 % 3 - 1;
                let ty = y + tap as u32 / 3 - 1;
                sum += weight * image.get_pixel(tx, ty)[0] as i32;
            }
            let value = (sum as f32 / SHARPEN_SCALE as f32).round();
            output.put_pixel(x, y, Luma([value.clamp(0.0, 255.0) as u8]));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgb, RgbImage};

    fn gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    fn ink_count(sample: &DigitSample) -> usize {
        sample.pixels().iter().filter(|&&p| p > 0.5).count()
    }

    #[test]
    fn test_white_square_has_no_ink() {
        for side in [5, 28, 64, 300] {
            let sample = normalize_image(&gray(side, side, 255)).unwrap();
            assert_eq!(sample.pixels().len(), IMAGE_AREA);
            assert!(sample.pixels().iter().all(|&p| p.abs() < 1e-2), "side {}", side);
        }
    }

    #[test]
    fn test_color_input_is_accepted() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([255, 255, 255])));
        let sample = normalize_image(&white).unwrap();
        assert!(sample.pixels().iter().all(|&p| p.abs() < 1e-2));
    }

    #[test]
    fn test_output_length_for_any_aspect_ratio() {
        for (w, h) in [(1, 1), (1000, 1), (1, 1000), (3, 97), (250, 40), (2, 2)] {
            let sample = normalize_image(&gray(w, h, 0)).unwrap();
            assert_eq!(sample.pixels().len(), IMAGE_AREA, "{}x{}", w, h);
        }
    }

    #[test]
    fn test_values_in_unit_interval() {
        // A checkerboard rings under both the resize and the sharpen
        let board = GrayImage::from_fn(37, 23, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let sample = normalize_image(&DynamicImage::ImageLuma8(board)).unwrap();
        assert!(sample.pixels().iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_black_square_fills_centered_block() {
        let sample = normalize_image(&gray(40, 40, 0)).unwrap();
        assert_eq!(ink_count(&sample), 400);
        assert_eq!(sample.pixel(4, 4), 1.0);
        assert_eq!(sample.pixel(23, 23), 1.0);
        assert_eq!(sample.pixel(3, 3), 0.0);
        assert_eq!(sample.pixel(24, 24), 0.0);
    }

    #[test]
    fn test_wide_image_is_centered_vertically() {
        // 40x20 scales to 20x10, pasted at x=4, y=9
        let sample = normalize_image(&gray(40, 20, 0)).unwrap();
        assert_eq!(ink_count(&sample), 200);
        assert_eq!(sample.pixel(9, 4), 1.0);
        assert_eq!(sample.pixel(18, 23), 1.0);
        assert_eq!(sample.pixel(8, 4), 0.0);
        assert_eq!(sample.pixel(19, 4), 0.0);
    }

    #[test]
    fn test_tall_image_is_centered_horizontally() {
        // 20x40 scales to 10x20, pasted at x=9, y=4
        let sample = normalize_image(&gray(20, 40, 0)).unwrap();
        assert_eq!(ink_count(&sample), 200);
        assert_eq!(sample.pixel(4, 9), 1.0);
        assert_eq!(sample.pixel(4, 8), 0.0);
    }

    #[test]
    fn test_degenerate_side_clamps_to_one_pixel() {
        assert_eq!(scale_side(1, 1000), 1);
        assert_eq!(scale_side(10, 40), 5);
        // Ties round to even
        assert_eq!(centered_offset(1), 14);
        assert_eq!(centered_offset(3), 12);
        assert_eq!(centered_offset(20), 4);
    }

    #[test]
    fn test_sharpen_keeps_flat_regions() {
        let flat = GrayImage::from_pixel(6, 6, Luma([120]));
        assert_eq!(sharpen(&flat), flat);
    }

    #[test]
    fn test_sharpen_boosts_isolated_pixel() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([100]));
        img.put_pixel(2, 2, Luma([116]));
        let out = sharpen(&img);
        // Eight neighbours at 100 with weight -2 each
        let expected = ((32 * 116 - 16 * 100) as f32 / 16.0).round() as u8;
        assert_eq!(out.get_pixel(2, 2)[0], expected);
        assert_eq!(out.get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn test_path_round_trip() {
        let dir = std::env::temp_dir().join("digit_recognizer_normalize_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("black.png");
        GrayImage::from_pixel(40, 40, Luma([0])).save(&path).unwrap();

        let sample = normalize_path(&path).unwrap();
        assert_eq!(sample, normalize_image(&gray(40, 40, 0)).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = normalize_path("no/such/digit.png").unwrap_err();
        assert!(matches!(err, DigitError::Image { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
