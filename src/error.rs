use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, DigitError>;

// Coarse grouping of failures, so callers can tell "could not read it" apart from
// "read it, but the numbers don't line up"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Shape,
    Format,
    Config,
}

#[derive(Debug)]
pub enum DigitError {
    Io(std::io::Error),
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    Csv(csv::Error),
    Json(serde_json::Error),
    Parse {
        record: usize,
        column: usize,
        value: String,
    },
    Shape {
        expected: usize,
        actual: usize,
    },
    Label(usize),
    Grid(String),
    Config(String),
}

impl DigitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DigitError::Io(_) | DigitError::Image { .. } => ErrorKind::Io,
            DigitError::Csv(err) if err.is_io_error() => ErrorKind::Io,
            DigitError::Shape { .. } | DigitError::Grid(_) => ErrorKind::Shape,
            DigitError::Csv(_) | DigitError::Json(_) | DigitError::Parse { .. } => {
                ErrorKind::Format
            }
            DigitError::Label(_) => ErrorKind::Format,
            DigitError::Config(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for DigitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigitError::Io(err) => write!(f, "IO error: {}", err),
            DigitError::Image { path, source } => {
                write!(f, "Failed to read image {}: {}", path.display(), source)
            }
            DigitError::Csv(err) => write!(f, "CSV error: {}", err),
            DigitError::Json(err) => write!(f, "JSON error: {}", err),
            DigitError::Parse {
                record,
                column,
                value,
            } => write!(
                f,
                "Failed to parse value {:?} at record {}, column {}",
                value, record, column
            ),
            DigitError::Shape { expected, actual } => write!(
                f,
                "Shape mismatch: expected {} values, got {}",
                expected, actual
            ),
            DigitError::Label(label) => write!(f, "Label {} is outside 0-9", label),
            DigitError::Grid(msg) => write!(f, "Grid error: {}", msg),
            DigitError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for DigitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DigitError::Io(err) => Some(err),
            DigitError::Image { source, .. } => Some(source),
            DigitError::Csv(err) => Some(err),
            DigitError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DigitError {
    fn from(value: std::io::Error) -> Self {
        DigitError::Io(value)
    }
}

impl From<csv::Error> for DigitError {
    fn from(value: csv::Error) -> Self {
        DigitError::Csv(value)
    }
}

impl From<serde_json::Error> for DigitError {
    fn from(value: serde_json::Error) -> Self {
        DigitError::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_and_grid_errors_are_shape_kind() {
        let err = DigitError::Shape {
            expected: 784,
            actual: 783,
        };
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(DigitError::Grid("empty".into()).kind(), ErrorKind::Shape);
    }

    #[test]
    fn shape_message_names_both_counts() {
        let err = DigitError::Shape {
            expected: 785,
            actual: 784,
        };
        assert_eq!(err.to_string(), "Shape mismatch: expected 785 values, got 784");
    }

    #[test]
    fn io_errors_are_io_kind() {
        let err: DigitError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("gone"));
    }
}
