use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct SubmissionRow {
    #[serde(rename = "ImageId")]
    image_id: usize,
    #[serde(rename = "Label")]
    label: usize,
}

// Writes "ImageId,Label" rows, with ids counting from 1
pub fn write_submission_to(writer: impl Write, labels: &[usize]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for (i, &label) in labels.iter().enumerate() {
        writer.serialize(SubmissionRow {
            image_id: i + 1,
            label,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_submission(path: impl AsRef<Path>, labels: &[usize]) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    write_submission_to(fs::File::create(path)?, labels)
}
