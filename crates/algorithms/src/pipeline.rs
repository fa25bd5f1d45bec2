//! The mapping pipeline as a chain of named stages
//!
//! ```text
//! tiles A ─┐                         ┌─ taxonomy A ─┐
//! tiles B ─┴─ composite ─ masks ─────┤              ├─ fuse ─ cleanup ─┬─ products (5/25/50 m)
//!                                    └─ taxonomy B ─┘                  └─ statistics (per region)
//! ```
//!
//! Each stage is a pure function of its inputs, so a run can be resumed or
//! inspected between any two of them. The taxonomy-A mosaic defines the
//! reference grid every other layer is brought onto.

use crate::composite::{mosaic, validity_mask};
use crate::config::{
    MaskParams, PipelineParams, ProductParams, StatsParams, COARSE_EXPORT, MEDIUM_EXPORT, NATIVE_EXPORT,
    TABLE_EXPORT,
};
use crate::export::ExportJob;
use crate::fusion::{apply_mask, cleanup, fuse};
use crate::masks::{align_mask, arctic_mask, coastal_mask, forest_line_mask};
use crate::resample::{resample, target_grid, ResampleParams};
use crate::rules::{reclassify, taxonomy_a, taxonomy_b, RuleLayers};
use crate::statistics::{aggregate, RegionTable};
use ecotypes_core::raster::Raster;
use ecotypes_core::vector::FeatureCollection;
use ecotypes_core::{Algorithm, Error, Grid, Result, CRS};
use std::path::Path;
use tracing::info;

/// Everything a run reads
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// Fine-scale land-cover tiles (taxonomy A)
    pub taxonomy_a: Vec<Raster<i32>>,
    /// Coarse land-cover tiles (taxonomy B)
    pub taxonomy_b: Vec<Raster<i32>>,
    /// Vegetation-zone-line raster
    pub zone_line: Raster<i32>,
    /// Vegetation-zone polygons
    pub vegetation_zones: FeatureCollection,
    /// Arctic-zone polygons
    pub arctic: FeatureCollection,
    /// Administrative regions, all countries
    pub regions: FeatureCollection,
}

/// The three auxiliary masks, on the reference grid
#[derive(Debug, Clone)]
pub struct Masks {
    pub coastal: Raster<u8>,
    pub forest_line: Raster<u8>,
    pub arctic: Raster<u8>,
}

/// Source composites on the reference grid
#[derive(Debug, Clone)]
pub struct Composites {
    pub taxonomy_a: Raster<i32>,
    pub taxonomy_b: Raster<i32>,
    /// 1 where taxonomy A holds a mapped code
    pub valid_a: Raster<u8>,
}

impl Composites {
    pub fn grid(&self) -> Grid {
        self.taxonomy_a.grid()
    }
}

/// Both taxonomies translated to ecosystem-type codes
#[derive(Debug, Clone)]
pub struct Classified {
    pub taxonomy_a: Raster<i32>,
    pub taxonomy_b: Raster<i32>,
}

/// The raster products
#[derive(Debug, Clone)]
pub struct Products {
    pub native: Raster<i32>,
    pub medium: Raster<i32>,
    pub coarse: Raster<i32>,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    /// Fused and cleaned raster every product derives from
    pub unified: Raster<i32>,
    pub products: Products,
    pub table: RegionTable,
}

/// Mosaic both tile collections, bring B onto A's grid and build A's
/// validity mask
pub fn composite_sources(
    taxonomy_a: &[Raster<i32>],
    taxonomy_b: &[Raster<i32>],
    not_mapped: i32,
) -> Result<Composites> {
    let a = mosaic(taxonomy_a)?;
    let grid = a.grid();

    let b = mosaic(taxonomy_b)?;
    let b = if b.grid().is_aligned_with(&grid) {
        b
    } else {
        info!("Aligning taxonomy B ({}x{}) onto the reference grid", b.rows(), b.cols());
        resample(&b, &grid, ResampleParams::default())?
    };

    let valid_a = validity_mask(&a, not_mapped)?;
    Ok(Composites {
        taxonomy_a: a,
        taxonomy_b: b,
        valid_a,
    })
}

/// Build the three masks on `grid`.
///
/// The forest-line mask is thresholded on the zone-line raster's own grid
/// and then brought onto `grid`.
pub fn build_masks(
    grid: &Grid,
    zone_line: &Raster<i32>,
    vegetation_zones: &FeatureCollection,
    arctic: &FeatureCollection,
    params: &MaskParams,
) -> Result<Masks> {
    let coastal = coastal_mask(vegetation_zones, grid, params)?;
    let forest_line = align_mask(&forest_line_mask(zone_line, params)?, grid)?;
    let arctic = arctic_mask(arctic, grid)?;
    Ok(Masks {
        coastal,
        forest_line,
        arctic,
    })
}

/// Run both rule tables
pub fn classify(composites: &Composites, masks: &Masks) -> Result<Classified> {
    let layers = RuleLayers {
        other: Some(&composites.taxonomy_b),
        coastal: Some(&masks.coastal),
        forest_line: Some(&masks.forest_line),
        arctic: Some(&masks.arctic),
    };
    let taxonomy_a = reclassify(&composites.taxonomy_a, &taxonomy_a(), &layers)?;

    let layers = RuleLayers {
        forest_line: Some(&masks.forest_line),
        arctic: Some(&masks.arctic),
        ..Default::default()
    };
    let taxonomy_b = reclassify(&composites.taxonomy_b, &taxonomy_b(), &layers)?;

    Ok(Classified { taxonomy_a, taxonomy_b })
}

/// Hide unmapped A cells, let B fill them, then clean up
pub fn fuse_and_clean(classified: &Classified, valid_a: &Raster<u8>, not_mapped: i32) -> Result<Raster<i32>> {
    let primary = apply_mask(&classified.taxonomy_a, valid_a)?;
    let fused = fuse(&primary, &classified.taxonomy_b)?;
    cleanup(&fused, not_mapped)
}

/// CRS of the 25 m and 50 m products: the explicit EPSG code if given,
/// else the zone-line raster's CRS, else the unified raster's
pub fn output_crs(params: &PipelineParams, zone_line: &Raster<i32>, unified: &Raster<i32>) -> Option<CRS> {
    params
        .output_epsg
        .map(CRS::from_epsg)
        .or_else(|| zone_line.crs().cloned())
        .or_else(|| unified.crs().cloned())
}

/// The three raster products.
///
/// The native product stays in the reference CRS. The medium product is
/// aggregated from it in `output_crs`; the coarse product is aggregated
/// from the medium one, so the two nest.
pub fn products(unified: &Raster<i32>, output_crs: Option<&CRS>, params: &ProductParams) -> Result<Products> {
    let mode = ResampleParams::default();

    let native_grid = target_grid(unified, None, params.native_scale)?;
    let native = if native_grid.is_aligned_with(&unified.grid()) {
        unified.clone()
    } else {
        resample(unified, &native_grid, mode.clone())?
    };

    let medium = resample(&native, &target_grid(&native, output_crs, params.medium_scale)?, mode.clone())?;
    let coarse = resample(&medium, &target_grid(&medium, None, params.coarse_scale)?, mode)?;

    info!(
        "Products: {}x{} native, {}x{} medium, {}x{} coarse",
        native.rows(),
        native.cols(),
        medium.rows(),
        medium.cols(),
        coarse.rows(),
        coarse.cols()
    );
    Ok(Products { native, medium, coarse })
}

/// Region table for the configured country
pub fn statistics(unified: &Raster<i32>, regions: &FeatureCollection, params: &StatsParams) -> Result<RegionTable> {
    let regions = regions.filter_eq(&params.country_attribute, &params.country_code);
    if regions.is_empty() {
        return Err(Error::Algorithm(format!(
            "no region has {} = {}",
            params.country_attribute, params.country_code
        )));
    }
    aggregate(unified, &regions, params)
}

/// One export job per product, writing into `dir`
pub fn export_jobs(outputs: &PipelineOutputs, dir: &Path, params: &ProductParams) -> Vec<ExportJob> {
    let raster_job = |name: &str, raster: &Raster<i32>, scale: f64| {
        ExportJob::raster(
            name,
            raster.clone(),
            params.max_pixels,
            PipelineParams::product_path(dir, name, "tif"),
        )
        .with_scale(scale)
    };

    vec![
        raster_job(NATIVE_EXPORT, &outputs.products.native, params.native_scale),
        raster_job(MEDIUM_EXPORT, &outputs.products.medium, params.medium_scale),
        raster_job(COARSE_EXPORT, &outputs.products.coarse, params.coarse_scale),
        ExportJob::table(
            TABLE_EXPORT,
            outputs.table.clone(),
            PipelineParams::product_path(dir, TABLE_EXPORT, "geojson"),
        ),
    ]
}

/// Classification only: composite, masks, rules, fusion and cleanup
pub fn unify(inputs: &PipelineInputs, params: &PipelineParams) -> Result<Raster<i32>> {
    let composites = composite_sources(&inputs.taxonomy_a, &inputs.taxonomy_b, params.not_mapped_code)?;
    let masks = build_masks(
        &composites.grid(),
        &inputs.zone_line,
        &inputs.vegetation_zones,
        &inputs.arctic,
        &params.masks,
    )?;
    let classified = classify(&composites, &masks)?;
    fuse_and_clean(&classified, &composites.valid_a, params.not_mapped_code)
}

/// The whole mapping run
#[derive(Debug, Clone, Default)]
pub struct EcotypePipeline;

impl Algorithm for EcotypePipeline {
    type Input = PipelineInputs;
    type Output = PipelineOutputs;
    type Params = PipelineParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "EcotypePipeline"
    }

    fn description(&self) -> &'static str {
        "Classify land cover into ecosystem types, export 5/25/50 m rasters and per-region areas"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let unified = unify(&input, &params)?;
        let crs = output_crs(&params, &input.zone_line, &unified);
        let products = products(&unified, crs.as_ref(), &params.products)?;
        let table = statistics(&unified, &input.regions, &params.stats)?;
        Ok(PipelineOutputs {
            unified,
            products,
            table,
        })
    }
}
