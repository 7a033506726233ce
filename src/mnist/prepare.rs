use rand::{prelude::SliceRandom, rngs::SmallRng, SeedableRng};

use crate::error::{DigitError, Result};
use crate::mnist::RawDigit;
use crate::sample::{DigitSample, LabelVector};

// Maps a stored intensity 0-255 onto [0, 1].
// Tabular pixels are already stored ink-as-high-value, so unlike scanned images
// they are not inverted.
#[inline]
pub fn normalize_pixel(raw: u8) -> f32 {
    raw as f32 / 255.0
}

pub fn to_sample(raw: &RawDigit) -> Result<DigitSample> {
    let pixels = raw.pixels.iter().map(|&p| normalize_pixel(p)).collect();
    match raw.label {
        Some(label) => DigitSample::labelled(pixels, label),
        None => DigitSample::new(pixels),
    }
}

pub fn to_samples(raw: &[RawDigit]) -> Result<Vec<DigitSample>> {
    raw.iter().map(to_sample).collect()
}

// One-hot targets for every labelled sample; fails on the first unlabelled one
pub fn one_hot_targets(samples: &[DigitSample]) -> Result<Vec<LabelVector>> {
    samples
        .iter()
        .map(|sample| {
            sample
                .label()
                .ok_or_else(|| DigitError::Config("sample has no label to encode".into()))
                .and_then(LabelVector::new)
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct TrainValidationSplit {
    pub train: Vec<DigitSample>,
    pub validation: Vec<DigitSample>,
}

/// Shuffle with a seeded RNG and hold out `ceil(holdout * n)` samples for
/// validation. The same seed always produces the same partition.
pub fn split_train_validation(
    samples: Vec<DigitSample>,
    holdout: f64,
    seed: u64,
) -> Result<TrainValidationSplit> {
    if !(holdout > 0.0 && holdout < 1.0) {
        return Err(DigitError::Config(format!(
            "holdout fraction must be within (0, 1), got {}",
            holdout
        )));
    }
    let n_validation = (holdout * samples.len() as f64).ceil() as usize;
    if samples.len() < 2 || n_validation >= samples.len() {
        return Err(DigitError::Config(format!(
            "cannot hold out {} of {} samples",
            n_validation,
            samples.len()
        )));
    }

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.shuffle(&mut rng);

    let mut slots: Vec<Option<DigitSample>> = samples.into_iter().map(Some).collect();
    let mut take = |i: &usize| slots[*i].take();
    let validation: Vec<DigitSample> = order[..n_validation].iter().filter_map(&mut take).collect();
    let train: Vec<DigitSample> = order[n_validation..].iter().filter_map(&mut take).collect();

    Ok(TrainValidationSplit { train, validation })
}
