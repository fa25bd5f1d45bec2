//! Per-region area sums
//!
//! Regions are rasterized onto a zone grid at the computation scale that
//! covers the band rasters. Each band cell then adds its area to the region
//! whose zone cell contains the cell's centre. Where regions overlap, the
//! later region in the collection owns the zone cell.

use super::recode::PresenceBand;
use crate::config::REGION_NAME_ATTRIBUTE;
use crate::vector::rasterize_index;
use ecotypes_core::vector::{AttributeValue, Feature, FeatureCollection};
use ecotypes_core::{Error, Grid, Result, CRS};
use tracing::{debug, info};

/// Area sums for one region
#[derive(Debug, Clone)]
pub struct RegionRow {
    /// The region, attributes and geometry unchanged
    pub region: Feature,
    /// Area per band, in band order
    pub areas: Vec<f64>,
}

impl RegionRow {
    /// Sum over all bands
    pub fn total(&self) -> f64 {
        self.areas.iter().sum()
    }

    /// Region name read from [`REGION_NAME_ATTRIBUTE`]
    pub fn name(&self) -> Option<&str> {
        self.region.get_property(REGION_NAME_ATTRIBUTE).and_then(|v| v.as_str())
    }
}

/// One row per region, one area column per band
#[derive(Debug, Clone)]
pub struct RegionTable {
    pub band_names: Vec<String>,
    pub rows: Vec<RegionRow>,
    pub crs: Option<CRS>,
}

impl RegionTable {
    /// Area of `band` in row `row`
    pub fn area(&self, row: usize, band: &str) -> Option<f64> {
        let col = self.band_names.iter().position(|b| b == band)?;
        self.rows.get(row)?.areas.get(col).copied()
    }

    /// Regions as features with one numeric attribute per band
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .rows
            .iter()
            .map(|row| {
                let mut feature = row.region.clone();
                for (name, area) in self.band_names.iter().zip(&row.areas) {
                    feature.set_property(name.clone(), AttributeValue::Float(*area));
                }
                feature
            })
            .collect();
        FeatureCollection::with_crs(features, self.crs.clone())
    }
}

/// Sum `area_factor * cell area` of every band cell set to 1, per region.
///
/// `cell_areas` holds the area of one cell for each band row. Regions that
/// cover no band cell get a row of zeros.
pub fn region_sums(
    bands: &[PresenceBand],
    cell_areas: &[f64],
    area_factor: f64,
    regions: &FeatureCollection,
    computation_scale: f64,
) -> Result<RegionTable> {
    let first = bands.first().ok_or_else(|| Error::InvalidParameter {
        name: "bands",
        value: "0".into(),
        reason: "at least one band is required".into(),
    })?;
    let grid = first.raster.grid();
    for band in &bands[1..] {
        band.raster.ensure_on(&grid, "presence band")?;
    }
    if cell_areas.len() != grid.rows {
        return Err(Error::SizeMismatch {
            er: grid.rows,
            ec: 1,
            ar: cell_areas.len(),
            ac: 1,
        });
    }
    if computation_scale.is_nan() || computation_scale <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "computation_scale",
            value: computation_scale.to_string(),
            reason: "must be positive".into(),
        });
    }

    let zone_grid = Grid::covering(grid.bounds(), computation_scale, grid.crs.clone());
    let zones = rasterize_index(regions, &zone_grid)?;
    debug!(
        "Zone grid {}x{} at scale {} for {} regions",
        zone_grid.rows,
        zone_grid.cols,
        computation_scale,
        regions.len()
    );

    let mut sums = vec![vec![0.0f64; bands.len()]; regions.len()];

    for row in 0..grid.rows {
        let area = cell_areas[row] * area_factor;
        for col in 0..grid.cols {
            let (x, y) = grid.transform.pixel_to_geo(col, row);
            let Some((zc, zr)) = zone_grid.cell_at(x, y) else { continue };
            let Some(region) = zones.valid(zr, zc) else { continue };
            let acc = &mut sums[region as usize];

            for (k, band) in bands.iter().enumerate() {
                if band.raster.valid(row, col) == Some(1) {
                    acc[k] += area;
                }
            }
        }
    }

    let rows: Vec<RegionRow> = regions
        .iter()
        .zip(sums)
        .map(|(region, areas)| RegionRow { region: region.clone(), areas })
        .collect();

    info!("Summed {} bands over {} regions", bands.len(), rows.len());

    Ok(RegionTable {
        band_names: bands.iter().map(|b| b.name.to_string()).collect(),
        rows,
        crs: regions.crs.clone(),
    })
}
