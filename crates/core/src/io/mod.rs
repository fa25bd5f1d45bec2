//! I/O for the pipeline's inputs and products
//!
//! Rasters are GeoTIFF; vector layers and the per-region table are GeoJSON.

mod geojson_io;
mod native;

pub use geojson_io::{parse_geojson, read_geojson, to_geojson_string, write_geojson};
pub use native::{read_geotiff, write_geotiff};

// Buffer-based I/O (no filesystem dependency)
pub use native::{read_geotiff_from_buffer, write_geotiff_to_buffer};
