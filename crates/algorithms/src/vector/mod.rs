//! Vector-to-raster operations
//!
//! - Rasterize: burn polygon features (optionally buffered) onto a grid

mod rasterize;

pub use rasterize::{rasterize, rasterize_index, rasterize_mask, RasterizeParams};
