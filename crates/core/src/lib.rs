//! # Ecotypes Core
//!
//! Core types, traits and I/O for ecosystem-type mapping.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced grid (categorical codes, masks, areas)
//! - `Grid`: Shape + transform + CRS of a raster, used as a resampling target
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling and UTM/geographic transforms
//! - `FeatureCollection`: Attributed vector features (regions, zones)
//! - I/O for GeoTIFF rasters and GeoJSON vectors

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Grid, Raster, RasterElement};
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Core trait for all pipeline stages.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
