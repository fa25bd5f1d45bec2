//! Ground area of raster cells
//!
//! Projected grids have one planar cell area everywhere. On geographic
//! (lon/lat) grids the area shrinks towards the poles; it is computed on the
//! WGS84 spheroid from the radii of curvature at each row's latitude.

use ecotypes_core::Grid;

/// WGS84 ellipsoid parameters
const WGS84_A: f64 = 6_378_137.0; // semi-major axis (m)
const WGS84_F: f64 = 1.0 / 298.257_223_563; // flattening

/// Spheroid used for geographic cell areas
#[derive(Debug, Clone)]
pub struct SpheroidalParams {
    /// Semi-major axis in meters. Default: WGS84 (6378137.0)
    pub semi_major: f64,
    /// Flattening. Default: WGS84 (1/298.257223563)
    pub flattening: f64,
}

impl Default for SpheroidalParams {
    fn default() -> Self {
        Self {
            semi_major: WGS84_A,
            flattening: WGS84_F,
        }
    }
}

/// Grid cell dimensions at a given latitude on the spheroid
#[derive(Debug, Clone, Copy)]
pub struct CellDimensions {
    /// East-West cell size in meters
    pub dx: f64,
    /// North-South cell size in meters
    pub dy: f64,
    /// Cell area in m²
    pub area: f64,
}

/// Cell dimensions at `latitude_deg` for a grid spacing of `d_lon` by
/// `d_lat` degrees
pub fn cell_dimensions(latitude_deg: f64, d_lon: f64, d_lat: f64, params: &SpheroidalParams) -> CellDimensions {
    let lat = latitude_deg.to_radians();
    let a = params.semi_major;
    let f = params.flattening;
    let e2 = 2.0 * f - f * f; // first eccentricity squared

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();

    // Radius of curvature in the prime vertical (N)
    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    // Radius of curvature in the meridional plane (M)
    let m = a * (1.0 - e2) / (1.0 - e2 * sin_lat * sin_lat).powf(1.5);

    let dx = (n * cos_lat * d_lon.to_radians()).abs();
    let dy = (m * d_lat.to_radians()).abs();

    CellDimensions { dx, dy, area: dx * dy }
}

/// Area of one cell in each row of `grid`, in squared meters (squared map
/// units on projected grids)
pub fn pixel_areas(grid: &Grid) -> Vec<f64> {
    let t = &grid.transform;
    let geographic = grid.crs.as_ref().is_some_and(|c| c.is_geographic());

    if !geographic {
        return vec![t.cell_area(); grid.rows];
    }

    let params = SpheroidalParams::default();
    (0..grid.rows)
        .map(|row| {
            let (_, lat) = t.pixel_to_geo(0, row);
            cell_dimensions(lat, t.pixel_width, t.pixel_height, &params).area
        })
        .collect()
}
