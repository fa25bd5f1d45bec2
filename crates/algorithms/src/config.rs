//! Pipeline constants
//!
//! Every domain parameter of the mapping lives here: the no-data code, zone
//! names, buffer distance, export scales and names, pixel budget, area unit
//! conversion and the statistics categories. Nothing is read from the
//! environment or a config file; [`PipelineParams::default`] is the one
//! place the constants are gathered.

use std::path::{Path, PathBuf};

/// Taxonomy-A code for "not mapped"; also the sliver code removed after fusion
pub const NOT_MAPPED_CODE: i32 = 99;

/// Attribute holding the vegetation-zone name
pub const ZONE_NAME_ATTRIBUTE: &str = "NAVN";

/// Region attribute holding the region (municipality) name
pub const REGION_NAME_ATTRIBUTE: &str = "NAVN";

/// Code for cells where overlapping tiles disagree so that their mean is
/// not a whole code. No rule table matches it and it folds onto no band.
pub const MIXED_TILE_CODE: i32 = -1;

/// Vegetation zones counted as coastal
pub const COASTAL_ZONE_NAMES: [&str; 2] = ["O3-Sterkt ocean", "O3t-Vintermild"];

/// Buffer around coastal zones, in grid units (meters on projected grids)
pub const COASTAL_BUFFER: f64 = 1000.0;

/// Zone-line value masked out before thresholding
pub const FOREST_LINE_SENTINEL: i32 = 1;

/// Zone-line values strictly above this are above the forest line
pub const FOREST_LINE_THRESHOLD: i32 = 1;

/// Native export scale (reference grid)
pub const NATIVE_SCALE: f64 = 5.0;

/// First aggregation step, in the output CRS
pub const MEDIUM_SCALE: f64 = 25.0;

/// Second aggregation step, aggregated from the medium product
pub const COARSE_SCALE: f64 = 50.0;

pub const NATIVE_EXPORT: &str = "ecoTypes_5m";
pub const MEDIUM_EXPORT: &str = "ecoTypes_25m";
pub const COARSE_EXPORT: &str = "ecoTypes_50m";
pub const TABLE_EXPORT: &str = "EcoType_municipal";

/// Largest raster any export job may write
pub const MAX_PIXELS: u64 = 1_324_129_936_480;

/// m² to hectares
pub const AREA_FACTOR: f64 = 1e-4;

/// Cell size of the region zone grid used for per-region sums
pub const COMPUTATION_SCALE: f64 = 20.0;

/// Region attribute holding the country code
pub const COUNTRY_ATTRIBUTE: &str = "countryCod";

/// Regions kept for the statistics table
pub const COUNTRY_CODE: &str = "NO";

/// Ecosystem-type code to dense statistics index.
///
/// 602 is never produced by either rule table but still folds onto 6.
pub const DENSE_CODES: [(i32, u8); 22] = [
    (101, 1), (102, 1),
    (201, 2), (202, 2),
    (301, 3), (302, 3),
    (401, 4), (402, 4),
    (501, 5),
    (601, 6), (602, 6),
    (701, 7), (702, 7),
    (801, 8), (802, 8),
    (412, 9),
    (811, 10),
    (831, 11),
    (841, 12),
    (842, 13),
    (832, 14),
    (822, 15),
];

/// Presence-band names, indexed by dense code - 1
pub const BAND_NAMES: [&str; 15] = [
    "101", "201", "301", "401", "501", "601", "701", "801",
    "412", "811", "831", "841", "842", "832", "822",
];

/// Number of statistics categories
pub const CATEGORY_COUNT: usize = BAND_NAMES.len();

/// Major ecosystem groups by leading digit of the code
///
/// Only 801/802 are freshwater; the other 8xx subtypes are "Other".
pub const GROUP_NAMES: [(i32, &str); 8] = [
    (1, "Skog"),
    (2, "Fjell"),
    (3, "Arktisk tundra"),
    (4, "Våtmark"),
    (5, "Semi-naturlig"),
    (6, "Naturlig åpent"),
    (7, "Hav"),
    (8, "Ferskvann"),
];

/// Group name for an ecosystem-type code ("Other" outside the table)
pub fn group_name(code: i32) -> &'static str {
    if code / 100 == 8 && code % 100 != 1 && code % 100 != 2 {
        return "Other";
    }
    GROUP_NAMES
        .iter()
        .find(|(lead, _)| code / 100 == *lead)
        .map(|(_, name)| *name)
        .unwrap_or("Other")
}

/// Parameters of the mask builder
#[derive(Debug, Clone)]
pub struct MaskParams {
    pub zone_attribute: String,
    pub coastal_zones: Vec<String>,
    pub coastal_buffer: f64,
    pub forest_line_sentinel: i32,
    pub forest_line_threshold: i32,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            zone_attribute: ZONE_NAME_ATTRIBUTE.to_string(),
            coastal_zones: COASTAL_ZONE_NAMES.iter().map(|s| s.to_string()).collect(),
            coastal_buffer: COASTAL_BUFFER,
            forest_line_sentinel: FOREST_LINE_SENTINEL,
            forest_line_threshold: FOREST_LINE_THRESHOLD,
        }
    }
}

/// Parameters of the statistics aggregator
#[derive(Debug, Clone)]
pub struct StatsParams {
    pub area_factor: f64,
    pub computation_scale: f64,
    pub country_attribute: String,
    pub country_code: String,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self {
            area_factor: AREA_FACTOR,
            computation_scale: COMPUTATION_SCALE,
            country_attribute: COUNTRY_ATTRIBUTE.to_string(),
            country_code: COUNTRY_CODE.to_string(),
        }
    }
}

/// Scales and names of the three raster products
#[derive(Debug, Clone)]
pub struct ProductParams {
    pub native_scale: f64,
    pub medium_scale: f64,
    pub coarse_scale: f64,
    pub max_pixels: u64,
}

impl Default for ProductParams {
    fn default() -> Self {
        Self {
            native_scale: NATIVE_SCALE,
            medium_scale: MEDIUM_SCALE,
            coarse_scale: COARSE_SCALE,
            max_pixels: MAX_PIXELS,
        }
    }
}

/// All parameters of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub not_mapped_code: i32,
    pub masks: MaskParams,
    pub products: ProductParams,
    pub stats: StatsParams,
    /// EPSG code of the 25 m and 50 m products; `None` keeps the reference CRS
    pub output_epsg: Option<u32>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            not_mapped_code: NOT_MAPPED_CODE,
            masks: MaskParams::default(),
            products: ProductParams::default(),
            stats: StatsParams::default(),
            output_epsg: None,
        }
    }
}

impl PipelineParams {
    /// Destination of a named product inside `dir`
    pub fn product_path(dir: &Path, name: &str, extension: &str) -> PathBuf {
        dir.join(format!("{}.{}", name, extension))
    }
}
