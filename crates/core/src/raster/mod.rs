//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod layout;
mod neighborhood;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use layout::Grid;
pub use neighborhood::Neighborhood;
