//! Error types for ecosystem-type mapping

use thiserror::Error;

/// Main error type for raster, vector and export operations
///
/// Per-cell problems (missing data, unmapped codes) are never errors; they
/// travel through rasters as no-data. Only whole-raster or whole-job failures
/// end up here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Grid mismatch for {layer}: rasters must share transform and shape")]
    GridMismatch { layer: &'static str },

    #[error("Rule table '{table}' needs the {layer} layer, which was not supplied")]
    MissingLayer { table: String, layer: &'static str },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing attribute '{0}' on feature")]
    MissingAttribute(String),

    #[error("Export '{description}' needs {pixels} pixels, budget is {max_pixels}")]
    PixelBudgetExceeded {
        description: String,
        pixels: u64,
        max_pixels: u64,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for ecotypes operations
pub type Result<T> = std::result::Result<T, Error>;
