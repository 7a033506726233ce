// Turning arbitrary image files into digits the classifier understands

mod normalize;
pub use normalize::{normalize_image, normalize_path};

mod slice;
pub use slice::{
    normalize_tiles, open_grid_image, predict_grid, predict_grid_path, slice_grid,
    GridPrediction, Tile,
};

mod render;
pub use render::{digit_to_image, render_digit};
