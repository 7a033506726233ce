// This module contains all the tabular MNIST-specific code in the project

mod load_mnist;
pub use load_mnist::{load_digits, load_digits_from_reader, CsvLayout, RawDigit};

mod prepare;
pub use prepare::{
    normalize_pixel, one_hot_targets, split_train_validation, to_sample, to_samples,
    TrainValidationSplit,
};

mod submission;
pub use submission::{write_submission, write_submission_to};
