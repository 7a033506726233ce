use std::fmt;
use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::classifier::Classifier;
use crate::error::{DigitError, Result};
use crate::preprocess::normalize_image;
use crate::sample::DigitSample;

// One cell of a sliced grid image
#[derive(Clone, Debug)]
pub struct Tile {
    pub row: u32,
    pub column: u32,
    pub image: DynamicImage,
}

pub fn open_grid_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path).map_err(|source| DigitError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Cut an image into `grid_size` x `grid_size` equal tiles, returned row-major.
///
/// Tiles are `width / n` by `height / n` pixels; leftover pixels along the right
/// and bottom edges are dropped.
pub fn slice_grid(image: &DynamicImage, grid_size: u32) -> Result<Vec<Tile>> {
    if grid_size == 0 {
        return Err(DigitError::Grid("grid size must be at least 1".into()));
    }
    let tile_width = image.width() / grid_size;
    let tile_height = image.height() / grid_size;
    if tile_width == 0 || tile_height == 0 {
        return Err(DigitError::Grid(format!(
            "a {}x{} image cannot be cut into a {}x{} grid",
            image.width(),
            image.height(),
            grid_size,
            grid_size
        )));
    }

    let tiles = (0..grid_size)
        .flat_map(|row| (0..grid_size).map(move |column| (row, column)))
        .map(|(row, column)| Tile {
            row,
            column,
            image: image.crop_imm(column * tile_width, row * tile_height, tile_width, tile_height),
        })
        .collect();
    Ok(tiles)
}

pub fn normalize_tiles(tiles: &[Tile]) -> Result<Vec<DigitSample>> {
    tiles.iter().map(|tile| normalize_image(&tile.image)).collect()
}

/// Predictions laid out the same way as the tiles they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridPrediction {
    size: usize,
    labels: Vec<usize>,
}

impl GridPrediction {
    pub fn size(&self) -> usize {
        self.size
    }

    // None outside the grid
    pub fn get(&self, row: usize, column: usize) -> Option<usize> {
        if row >= self.size || column >= self.size {
            return None;
        }
        self.labels.get(row * self.size + column).copied()
    }

    // Row-major
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn rows(&self) -> impl Iterator<Item = &[usize]> {
        self.labels.chunks(self.size)
    }
}

impl fmt::Display for GridPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: Vec<String> = row.iter().map(|label| label.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

pub fn predict_grid<C: Classifier + ?Sized>(
    classifier: &C,
    image: &DynamicImage,
    grid_size: u32,
) -> Result<GridPrediction> {
    let tiles = slice_grid(image, grid_size)?;
    let samples = normalize_tiles(&tiles)?;
    let predictions = classifier.classify_batch(&samples);

    // Place by the tile's own coordinates rather than trusting iteration order
    let size = grid_size as usize;
    let mut labels = vec![0; size * size];
    for (tile, label) in tiles.iter().zip(predictions) {
        labels[tile.row as usize * size + tile.column as usize] = label;
    }
    Ok(GridPrediction { size, labels })
}

pub fn predict_grid_path<C: Classifier + ?Sized>(
    classifier: &C,
    path: impl AsRef<Path>,
    grid_size: u32,
) -> Result<GridPrediction> {
    let image = open_grid_image(path)?;
    predict_grid(classifier, &image, grid_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::CenterInk;
    use crate::error::ErrorKind;
    use image::{GrayImage, Luma};

    // A 3x3 grid of 10x10 flat tiles; the tile at index k has ink level k/9
    fn graded_grid() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(30, 30, |x, y| {
            let k = (y / 10) * 3 + x / 10;
            Luma([255 - (k * 255 / 9) as u8])
        }))
    }

    #[test]
    fn test_tiles_are_row_major_with_coordinates() {
        let tiles = slice_grid(&graded_grid(), 3).unwrap();
        assert_eq!(tiles.len(), 9);
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.row as usize, i / 3);
            assert_eq!(tile.column as usize, i % 3);
            assert_eq!(tile.image.width(), 10);
            assert_eq!(tile.image.height(), 10);
        }
    }

    #[test]
    fn test_remainder_pixels_are_dropped() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(31, 29));
        let tiles = slice_grid(&image, 2).unwrap();
        assert!(tiles.iter().all(|t| t.image.width() == 15 && t.image.height() == 14));
    }

    #[test]
    fn test_grid_size_one_matches_direct_normalization() {
        let image = graded_grid();
        let tiles = slice_grid(&image, 1).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(
            normalize_tiles(&tiles).unwrap()[0],
            normalize_image(&image).unwrap()
        );
        assert_eq!(
            predict_grid(&CenterInk, &image, 1).unwrap().labels(),
            &[CenterInk.classify(&normalize_image(&image).unwrap())]
        );
    }

    #[test]
    fn test_predictions_keep_spatial_layout() {
        let prediction = predict_grid(&CenterInk, &graded_grid(), 3).unwrap();
        assert_eq!(prediction.size(), 3);
        assert_eq!(prediction.labels(), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(prediction.get(2, 1), Some(7));
        assert_eq!(prediction.get(0, 3), None);
        assert_eq!(prediction.get(3, 0), None);
        assert_eq!(prediction.to_string(), "0 1 2\n3 4 5\n6 7 8\n");
    }

    #[test]
    fn test_ink_stays_in_its_tile() {
        // White 56x56 canvas with a black square inside the top-left 28x28 cell
        let canvas = GrayImage::from_fn(56, 56, |x, y| {
            if (6..22).contains(&x) && (6..22).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let tiles = slice_grid(&DynamicImage::ImageLuma8(canvas), 2).unwrap();
        let ink: Vec<f32> = normalize_tiles(&tiles)
            .unwrap()
            .iter()
            .map(|s| s.mean_ink())
            .collect();
        assert!(ink[1..].iter().all(|&other| ink[0] > other));
    }

    #[test]
    fn test_invalid_grid_sizes() {
        let image = graded_grid();
        assert_eq!(slice_grid(&image, 0).unwrap_err().kind(), ErrorKind::Shape);
        assert_eq!(slice_grid(&image, 31).unwrap_err().kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_missing_grid_image_is_io_error() {
        let err = predict_grid_path(&CenterInk, "missing/split.png", 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
