//! Fusion of the two classified rasters and cleanup
//!
//! The taxonomy-A result wins wherever it has a value; taxonomy B fills the
//! gaps. Afterwards leftover "not mapped" cells are removed and one focal
//! mode pass smooths single-pixel noise. The cleaned raster is the single
//! source for every raster product and for the statistics.

use crate::maybe_rayon::*;
use crate::statistics::{focal_mode, FocalModeParams};
use ecotypes_core::raster::Raster;
use ecotypes_core::{Error, Result};
use tracing::{debug, info};

/// Primary where it has a value, else fallback, else no-data
pub fn fuse(primary: &Raster<i32>, fallback: &Raster<i32>) -> Result<Raster<i32>> {
    fallback.ensure_on(&primary.grid(), "fallback")?;

    let (rows, cols) = primary.shape();
    let nodata = primary.nodata().unwrap_or(i32::MIN);

    let data: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    primary
                        .valid(row, col)
                        .or_else(|| fallback.valid(row, col))
                        .unwrap_or(nodata)
                })
                .collect::<Vec<i32>>()
        })
        .collect();

    primary.derive(data, Some(nodata))
}

/// Keep cells where `mask` is 1; everything else becomes no-data
pub fn apply_mask(raster: &Raster<i32>, mask: &Raster<u8>) -> Result<Raster<i32>> {
    mask.ensure_on(&raster.grid(), "validity mask")?;

    let nodata = raster.nodata().unwrap_or(i32::MIN);
    let data: Vec<i32> = raster
        .data()
        .iter()
        .zip(mask.data().iter())
        .map(|(&v, &m)| if m == 1 { v } else { nodata })
        .collect();

    raster.derive(data, Some(nodata))
}

/// Turn every cell equal to `value` into no-data
pub fn mask_value(raster: &Raster<i32>, value: i32) -> Result<Raster<i32>> {
    let nodata = raster.nodata().unwrap_or(i32::MIN);
    if value == nodata {
        return Err(Error::InvalidParameter {
            name: "value",
            value: value.to_string(),
            reason: "is already the no-data value".into(),
        });
    }

    let mut removed = 0usize;
    let data: Vec<i32> = raster
        .data()
        .iter()
        .map(|&v| {
            if v == value {
                removed += 1;
                nodata
            } else {
                v
            }
        })
        .collect();

    if removed > 0 {
        debug!("Masked {} cells equal to {}", removed, value);
    }
    raster.derive(data, Some(nodata))
}

/// Remove `not_mapped` slivers, then one focal mode pass
pub fn cleanup(fused: &Raster<i32>, not_mapped: i32) -> Result<Raster<i32>> {
    let masked = mask_value(fused, not_mapped)?;
    let smoothed = focal_mode(&masked, FocalModeParams::default())?;
    info!(
        "Cleaned fused raster: {} of {} cells classified",
        smoothed.valid_count(),
        smoothed.len()
    );
    Ok(smoothed)
}
