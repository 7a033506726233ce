//! Owned configuration for a training run and for grid predictions.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DigitError, Result};
use crate::sample::NUM_CLASSES;

/// Shape of the hyperdimensional classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hypervector length in 32-bit chunks
    pub dimension_chunks: usize,
    /// Number of levels each pixel intensity is quantized into
    pub quanta: usize,
    pub classes: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dimension_chunks: 156,
            quanta: 16,
            classes: NUM_CLASSES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of the labelled data held out for validation
    pub holdout: f64,
    /// Seeds both the split and the model's random vectors
    pub seed: u64,
    pub max_epochs: usize,
    /// Retraining stops once validation accuracy has not improved for this many epochs
    pub patience: usize,
    pub model: ModelConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout: 0.1,
            seed: 42,
            max_epochs: 20,
            patience: 3,
            model: ModelConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.holdout > 0.0 && self.holdout < 1.0) {
            return Err(DigitError::Config(format!(
                "holdout must be within (0, 1), got {}",
                self.holdout
            )));
        }
        if self.model.dimension_chunks == 0 {
            return Err(DigitError::Config("dimension_chunks must be positive".into()));
        }
        if self.model.quanta < 2 || self.model.quanta > 256 {
            return Err(DigitError::Config(format!(
                "quanta must be within 2..=256, got {}",
                self.model.quanta
            )));
        }
        if self.model.classes != NUM_CLASSES {
            return Err(DigitError::Config(format!(
                "digit models need {} classes, got {}",
                NUM_CLASSES, self.model.classes
            )));
        }
        Ok(())
    }
}

/// A composite image and the size of the square grid it holds, written `PATH:N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridSpec {
    pub path: PathBuf,
    pub size: u32,
}

impl FromStr for GridSpec {
    type Err = DigitError;

    fn from_str(s: &str) -> Result<Self> {
        // Split at the last colon so Windows drive letters survive
        let (path, size) = s
            .rsplit_once(':')
            .ok_or_else(|| DigitError::Config(format!("expected PATH:N, got {:?}", s)))?;
        let size: u32 = size
            .trim()
            .parse()
            .map_err(|_| DigitError::Config(format!("invalid grid size in {:?}", s)))?;
        if path.is_empty() || size == 0 {
            return Err(DigitError::Config(format!("invalid grid spec {:?}", s)));
        }
        Ok(Self {
            path: PathBuf::from(path),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        assert_eq!(config.holdout, 0.1);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TrainingConfig::default();
        config.holdout = 1.5;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.model.quanta = 1;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.model.classes = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grid_spec_parsing() {
        let spec: GridSpec = "data/5x5split.png:5".parse().unwrap();
        assert_eq!(spec.path, PathBuf::from("data/5x5split.png"));
        assert_eq!(spec.size, 5);

        let spec: GridSpec = r"C:\digits\split.png:4".parse().unwrap();
        assert_eq!(spec.path, PathBuf::from(r"C:\digits\split.png"));
        assert_eq!(spec.size, 4);

        assert!("split.png".parse::<GridSpec>().is_err());
        assert!("split.png:0".parse::<GridSpec>().is_err());
        assert!(":3".parse::<GridSpec>().is_err());
        assert!("split.png:x".parse::<GridSpec>().is_err());
    }
}
