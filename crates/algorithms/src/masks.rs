//! Auxiliary masks conditioning the rule tables
//!
//! All masks are `Raster<u8>` holding 1 (true) or 0 (false) with no no-data,
//! laid out on the grid they are built for.

use crate::config::MaskParams;
use crate::maybe_rayon::*;
use crate::resample::{resample, ResampleParams};
use crate::vector::rasterize_mask;
use ecotypes_core::vector::FeatureCollection;
use ecotypes_core::{Grid, Raster, Result};
use tracing::{debug, info};

/// Arctic-zone mask: 1 inside the arctic polygons
pub fn arctic_mask(arctic: &FeatureCollection, grid: &Grid) -> Result<Raster<u8>> {
    let mask = rasterize_mask(arctic, grid, 0.0)?;
    debug!("Arctic mask: {} cells", count_set(&mask));
    Ok(mask)
}

/// Coastal-vegetation mask: 1 within the buffer distance of a coastal zone.
///
/// Zones are selected by name from the vegetation-zone layer.
pub fn coastal_mask(zones: &FeatureCollection, grid: &Grid, params: &MaskParams) -> Result<Raster<u8>> {
    let names: Vec<&str> = params.coastal_zones.iter().map(String::as_str).collect();
    let coastal = zones.filter_in(&params.zone_attribute, &names);
    info!(
        "Coastal zones: {} of {} vegetation zones, buffered by {}",
        coastal.len(),
        zones.len(),
        params.coastal_buffer
    );

    let mask = rasterize_mask(&coastal, grid, params.coastal_buffer)?;
    debug!("Coastal mask: {} cells", count_set(&mask));
    Ok(mask)
}

/// Above-forest-line mask from the vegetation-zone-line raster.
///
/// The sentinel value is masked out, the remaining cells are 1 when their
/// zone index exceeds the threshold, and every masked or missing cell
/// becomes 0. The mask stays on the zone-line raster's own grid.
pub fn forest_line_mask(zone_line: &Raster<i32>, params: &MaskParams) -> Result<Raster<u8>> {
    let (rows, cols) = zone_line.shape();
    let sentinel = params.forest_line_sentinel;
    let threshold = params.forest_line_threshold;

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| match zone_line.valid(row, col) {
                    Some(v) if v != sentinel && v > threshold => 1,
                    _ => 0,
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    let mask = zone_line.derive(data, None)?;
    debug!("Forest-line mask: {} cells above", count_set(&mask));
    Ok(mask)
}

/// Bring a mask onto `grid` with the mode reducer.
///
/// Target cells outside the mask's extent become 0.
pub fn align_mask(mask: &Raster<u8>, grid: &Grid) -> Result<Raster<u8>> {
    let mut aligned = resample(mask, grid, ResampleParams::default())?;
    if let Some(nd) = aligned.nodata() {
        aligned.data_mut().mapv_inplace(|v| if v == nd { 0 } else { v });
    }
    aligned.set_nodata(None);
    Ok(aligned)
}

fn count_set(mask: &Raster<u8>) -> usize {
    mask.data().iter().filter(|&&v| v == 1).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotypes_core::{Feature, GeoTransform};
    use geo::{polygon, Geometry};

    fn grid() -> Grid {
        Grid::new(40, 40, GeoTransform::new(0.0, 4000.0, 100.0, -100.0), None)
    }

    fn zone(name: &str, x0: f64) -> Feature {
        let p = polygon![
            (x: x0, y: 0.0),
            (x: x0 + 500.0, y: 0.0),
            (x: x0 + 500.0, y: 4000.0),
            (x: x0, y: 4000.0),
            (x: x0, y: 0.0),
        ];
        Feature::new(Geometry::Polygon(p)).with_property("NAVN", name)
    }

    #[test]
    fn test_forest_line_thresholds_and_defaults() {
        let n = i32::MIN;
        let mut zl = Raster::from_vec(vec![1, 2, 3, 0, n, 5], 2, 3).unwrap();
        zl.set_nodata(Some(n));

        let mask = forest_line_mask(&zl, &MaskParams::default()).unwrap();
        assert_eq!(mask.data().iter().copied().collect::<Vec<_>>(), vec![0, 1, 1, 0, 0, 1]);
        assert_eq!(mask.nodata(), None);
    }

    #[test]
    fn test_coastal_mask_selects_named_zones_and_buffers() {
        let zones = FeatureCollection::with_crs(
            vec![
                zone("O3-Sterkt ocean", 0.0),
                zone("O1-Svakt ocean", 1500.0),
                zone("O3t-Vintermild", 3000.0),
            ],
            None,
        );
        let mask = coastal_mask(&zones, &grid(), &MaskParams::default()).unwrap();

        // strong-oceanic strip 0..500 buffered by 1000 reaches x = 1500
        assert_eq!(mask.get(20, 0).unwrap(), 1);
        assert_eq!(mask.get(20, 14).unwrap(), 1);
        // weak-oceanic zone alone (x 1500..2000) is outside both buffers
        assert_eq!(mask.get(20, 17).unwrap(), 0);
        // winter-mild strip 3000..3500 buffered
        assert_eq!(mask.get(20, 21).unwrap(), 1);
        assert_eq!(mask.get(20, 39).unwrap(), 1);
    }

    #[test]
    fn test_arctic_mask() {
        let arctic = FeatureCollection::with_crs(vec![zone("arctic", 0.0)], None);
        let mask = arctic_mask(&arctic, &grid()).unwrap();
        assert_eq!(count_set(&mask), 5 * 40);
    }

    #[test]
    fn test_align_mask_fills_outside_with_zero() {
        let mut mask: Raster<u8> = Raster::filled(2, 2, 1);
        mask.set_transform(GeoTransform::new(0.0, 50.0, 25.0, -25.0));

        let target = Grid::new(20, 20, GeoTransform::new(0.0, 100.0, 5.0, -5.0), None);
        let aligned = align_mask(&mask, &target).unwrap();
        assert_eq!(aligned.nodata(), None);
        assert_eq!(aligned.get(19, 0).unwrap(), 1);
        assert_eq!(aligned.get(0, 0).unwrap(), 0);
        assert_eq!(count_set(&aligned), 100);
    }
}
