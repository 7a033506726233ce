use crate::error::{DigitError, Result};

pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_AREA: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;

/// A 28x28 grayscale digit, row-major from the top-left corner, with every
/// value in [0, 1] and ink stored as the high value.
#[derive(Clone, Debug, PartialEq)]
pub struct DigitSample {
    pixels: Vec<f32>,
    label: Option<usize>,
}

impl DigitSample {
    pub fn new(pixels: Vec<f32>) -> Result<Self> {
        if pixels.len() != IMAGE_AREA {
            return Err(DigitError::Shape {
                expected: IMAGE_AREA,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            label: None,
        })
    }

    pub fn labelled(pixels: Vec<f32>, label: usize) -> Result<Self> {
        if label >= NUM_CLASSES {
            return Err(DigitError::Label(label));
        }
        let mut sample = Self::new(pixels)?;
        sample.label = Some(label);
        Ok(sample)
    }

    /// Splits a flat buffer into consecutive samples. The buffer length has to be
    /// an exact multiple of 784.
    pub fn batch_from_flat(values: &[f32]) -> Result<Vec<Self>> {
        if values.is_empty() || values.len() % IMAGE_AREA != 0 {
            return Err(DigitError::Shape {
                expected: IMAGE_AREA,
                actual: values.len(),
            });
        }
        values
            .chunks(IMAGE_AREA)
            .map(|chunk| Self::new(chunk.to_vec()))
            .collect()
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn label(&self) -> Option<usize> {
        self.label
    }

    pub fn pixel(&self, row: usize, col: usize) -> f32 {
        self.pixels[row * IMAGE_SIDE + col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.pixels.chunks(IMAGE_SIDE)
    }

    pub fn mean_ink(&self) -> f32 {
        self.pixels.iter().sum::<f32>() / IMAGE_AREA as f32
    }
}

/// One-hot encoding of a class label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelVector([f32; NUM_CLASSES]);

impl LabelVector {
    pub fn new(label: usize) -> Result<Self> {
        if label >= NUM_CLASSES {
            return Err(DigitError::Label(label));
        }
        let mut v = [0.0; NUM_CLASSES];
        v[label] = 1.0;
        Ok(Self(v))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    // Index of the hot position
    pub fn class(&self) -> usize {
        self.0
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_one_hot_two() {
        let v = LabelVector::new(2).unwrap();
        assert_eq!(
            v.as_slice(),
            &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(v.class(), 2);
    }

    #[test]
    fn test_one_hot_rejects_out_of_range() {
        assert!(matches!(LabelVector::new(10), Err(DigitError::Label(10))));
    }

    #[test]
    fn test_sample_requires_784_values() {
        let err = DigitSample::new(vec![0.0; 783]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(DigitSample::new(vec![0.0; IMAGE_AREA]).is_ok());
    }

    #[test]
    fn test_batch_from_flat() {
        let samples = DigitSample::batch_from_flat(&vec![0.5; IMAGE_AREA * 3]).unwrap();
        assert_eq!(samples.len(), 3);

        let err = DigitSample::batch_from_flat(&vec![0.5; IMAGE_AREA * 2 + 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_row_major_access() {
        let mut pixels = vec![0.0; IMAGE_AREA];
        pixels[IMAGE_SIDE + 3] = 1.0;
        let sample = DigitSample::labelled(pixels, 7).unwrap();
        assert_eq!(sample.pixel(1, 3), 1.0);
        assert_eq!(sample.rows().nth(1).unwrap()[3], 1.0);
        assert_eq!(sample.rows().count(), IMAGE_SIDE);
        assert_eq!(sample.label(), Some(7));
    }
}
