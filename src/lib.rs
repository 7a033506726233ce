pub mod classifier;
pub mod config;
pub mod error;
pub mod integer;
pub mod mnist;
pub mod preprocess;
pub mod sample;

pub use classifier::{evaluate, Classifier, Evaluation};
pub use config::{GridSpec, ModelConfig, TrainingConfig};
pub use error::{DigitError, ErrorKind, Result};
pub use integer::IntegerHDModel;
pub use sample::{DigitSample, LabelVector, IMAGE_AREA, IMAGE_SIDE, NUM_CLASSES};
