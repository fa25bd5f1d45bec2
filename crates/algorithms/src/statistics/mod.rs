//! Area statistics of the unified ecosystem-type raster
//!
//! - **focal**: Focal mode smoothing of categorical rasters
//! - **recode**: Dense category index and presence bands
//! - **area**: Ground area of raster cells
//! - **zonal**: Area sums per region

pub mod area;
pub mod focal;
pub mod recode;
pub mod zonal;

pub use area::{cell_dimensions, pixel_areas, CellDimensions, SpheroidalParams};
pub use focal::{focal_mode, mode_of, FocalModeParams};
pub use recode::{dense_code, dense_recode, presence_bands, PresenceBand, DENSE_NODATA};
pub use zonal::{region_sums, RegionRow, RegionTable};

use crate::config::StatsParams;
use ecotypes_core::raster::Raster;
use ecotypes_core::vector::FeatureCollection;
use ecotypes_core::Result;
use tracing::info;

/// Hectares of every ecosystem category within each region.
///
/// Each presence band gets its own focal mode pass before the sums, so
/// isolated cells do not count towards a category.
pub fn aggregate(unified: &Raster<i32>, regions: &FeatureCollection, params: &StatsParams) -> Result<RegionTable> {
    let dense = dense_recode(unified)?;
    let smoothing = FocalModeParams::default();
    let bands = presence_bands(&dense)?
        .into_iter()
        .map(|band| {
            Ok(PresenceBand {
                raster: focal_mode(&band.raster, smoothing.clone())?,
                ..band
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let areas = pixel_areas(&unified.grid());
    info!(
        "Aggregating {} categories over {} regions",
        bands.len(),
        regions.len()
    );
    region_sums(&bands, &areas, params.area_factor, regions, params.computation_scale)
}
