use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{DigitError, Result};
use crate::sample::{IMAGE_AREA, NUM_CLASSES};

// How a digit CSV is laid out.
// - Optional header row
// - One image per row
// - Labelled files start each row with the class label 0-9
// - The rest of the row consists of 28x28 pixel values, integers 0-255
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CsvLayout {
    pub has_headers: bool,
    pub labelled: bool,
}

impl CsvLayout {
    pub fn train(has_headers: bool) -> Self {
        Self {
            has_headers,
            labelled: true,
        }
    }

    pub fn test(has_headers: bool) -> Self {
        Self {
            has_headers,
            labelled: false,
        }
    }

    fn columns(&self) -> usize {
        IMAGE_AREA + self.labelled as usize
    }
}

// Raw pixels exactly as stored in the file, before any normalization
#[derive(Clone, Debug, PartialEq)]
pub struct RawDigit {
    pub pixels: Vec<u8>,
    pub label: Option<usize>,
}

pub fn load_digits(path: impl AsRef<Path>, layout: CsvLayout, limit: usize) -> Result<Vec<RawDigit>> {
    let file = File::open(path.as_ref())?;
    let digits = load_digits_from_reader(file, layout, limit)?;
    log::debug!("Read {} rows from {}", digits.len(), path.as_ref().display());
    Ok(digits)
}

pub fn load_digits_from_reader(reader: impl Read, layout: CsvLayout, limit: usize) -> Result<Vec<RawDigit>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(layout.has_headers)
        // Row widths are checked below so they surface as shape errors
        .flexible(true)
        .from_reader(reader);

    reader
        .records()
        .take(limit)
        .enumerate()
        .map(|(index, result)| {
            let record = result?;
            // 1-based for error messages
            let number = index + 1;
            if record.len() != layout.columns() {
                return Err(DigitError::Shape {
                    expected: layout.columns(),
                    actual: record.len(),
                });
            }

            let label = if layout.labelled {
                let label = parse_cell::<usize>(&record[0], number, 0)?;
                if label >= NUM_CLASSES {
                    return Err(DigitError::Label(label));
                }
                Some(label)
            } else {
                None
            };

            let pixels = record
                .iter()
                .enumerate()
                .skip(layout.labelled as usize) // Skip the label
                .map(|(column, cell)| parse_cell::<u8>(cell, number, column))
                .collect::<Result<Vec<u8>>>()?;

            Ok(RawDigit { pixels, label })
        })
        .collect()
}

fn parse_cell<T: std::str::FromStr>(cell: &str, record: usize, column: usize) -> Result<T> {
    cell.trim().parse::<T>().map_err(|_| DigitError::Parse {
        record,
        column,
        value: cell.to_string(),
    })
}
