//! Pure-Rust geographic ↔ UTM transforms (Snyder 1987, USGS formulas).
//!
//! Covers EPSG 4326/4258 (geographic), 326xx/327xx (WGS84 UTM) and 258xx
//! (ETRS89 UTM). ETRS89 and WGS84 differ by well under a metre, far below the
//! 5 m cell size of the land-cover products, so both use the WGS84 ellipsoid.

use super::CRS;
use crate::error::Result;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Projection family of a supported CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Longitude/latitude in degrees
    Geographic,
    /// Universal Transverse Mercator, metres
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// Map an EPSG code to its projection, if supported.
    ///
    /// - 4326, 4258 → geographic
    /// - 326xx → UTM zone xx North, 327xx → UTM zone xx South
    /// - 258xx → ETRS89 UTM zone xx North (zones 28–38)
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            4326 | 4258 => Some(Projection::Geographic),
            32601..=32660 => Some(Projection::Utm { zone: epsg - 32600, north: true }),
            32701..=32760 => Some(Projection::Utm { zone: epsg - 32700, north: false }),
            25828..=25838 => Some(Projection::Utm { zone: epsg - 25800, north: true }),
            _ => None,
        }
    }

    /// Map coordinate → (longitude, latitude) in degrees
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Projection::Geographic => (x, y),
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    /// (longitude, latitude) in degrees → map coordinate
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match *self {
            Projection::Geographic => (lon, lat),
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// Point transform between two CRSs.
///
/// Identity when either side is unknown or both are equivalent, so rasters
/// without CRS metadata still combine as long as their grids line up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    pair: Option<(Projection, Projection)>,
}

impl CoordTransform {
    pub fn identity() -> Self {
        Self { pair: None }
    }

    /// Transform from `src` coordinates to `dst` coordinates
    pub fn new(src: Option<&CRS>, dst: Option<&CRS>) -> Result<Self> {
        match (src, dst) {
            (Some(s), Some(d)) if !s.is_equivalent(d) => {
                let (sp, dp) = (s.projection()?, d.projection()?);
                if sp == dp {
                    Ok(Self::identity())
                } else {
                    Ok(Self { pair: Some((sp, dp)) })
                }
            }
            _ => Ok(Self::identity()),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.pair.is_none()
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match self.pair {
            None => (x, y),
            Some((src, dst)) => {
                let (lon, lat) = src.to_geographic(x, y);
                dst.from_geographic(lon, lat)
            }
        }
    }

    /// The transform going the other way
    pub fn inverse(&self) -> Self {
        Self {
            pair: self.pair.map(|(s, d)| (d, s)),
        }
    }

    /// Envelope of the transformed bounds, sampling each edge so the
    /// curvature of UTM grid lines is respected.
    pub fn apply_bounds(&self, bounds: (f64, f64, f64, f64)) -> (f64, f64, f64, f64) {
        if self.is_identity() {
            return bounds;
        }
        const STEPS: usize = 16;
        let (x0, y0, x1, y1) = bounds;

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for i in 0..=STEPS {
            let t = i as f64 / STEPS as f64;
            let x = x0 + t * (x1 - x0);
            let y = y0 + t * (y1 - y0);
            for (px, py) in [(x, y0), (x, y1), (x0, y), (x1, y)] {
                let (tx, ty) = self.apply(px, py);
                min_x = min_x.min(tx);
                min_y = min_y.min(ty);
                max_x = max_x.max(tx);
                max_y = max_y.max(ty);
            }
        }

        (min_x, min_y, max_x, max_y)
    }
}

// ── Core projection (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ─────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m
            + n
                * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// Convert UTM (easting, northing) in metres to WGS84 (longitude, latitude)
/// in degrees. Snyder eqs. 8-18 to 8-25.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north { northing } else { northing - FALSE_NORTHING_SOUTH };

    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0));

    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    // Footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();

    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let n1 = A / (1.0 - E2 * sin1 * sin1).sqrt();
    let r1 = A * (1.0 - E2) / (1.0 - E2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_supported_codes() {
        assert_eq!(Projection::from_epsg(4326), Some(Projection::Geographic));
        assert_eq!(Projection::from_epsg(4258), Some(Projection::Geographic));
        assert_eq!(Projection::from_epsg(32633), Some(Projection::Utm { zone: 33, north: true }));
        assert_eq!(Projection::from_epsg(32721), Some(Projection::Utm { zone: 21, north: false }));
        assert_eq!(Projection::from_epsg(25832), Some(Projection::Utm { zone: 32, north: true }));
        assert_eq!(Projection::from_epsg(3857), None);
        assert_eq!(Projection::from_epsg(32600), None);
    }

    // pyproj: Transformer.from_crs(4326, 32630).transform(-3.7037, 40.4168)
    //   → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    #[test]
    fn equator_central_meridian() {
        let (e, n) = wgs84_to_utm(15.0, 0.0, 33, true);
        assert_close(e, 500_000.0, 0.01, "easting at CM");
        assert_close(n, 0.0, 0.01, "northing at equator");
    }

    #[test]
    fn utm_roundtrip_norway() {
        for &(lon, lat) in &[(10.75, 59.91), (18.95, 69.65), (15.0, 65.0)] {
            let (e, n) = wgs84_to_utm(lon, lat, 33, true);
            let (lon2, lat2) = utm_to_wgs84(e, n, 33, true);
            assert_close(lon2, lon, 1e-6, "longitude");
            assert_close(lat2, lat, 1e-6, "latitude");
        }
    }

    #[test]
    fn utm_roundtrip_south() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        let (lon, lat) = utm_to_wgs84(e, n, 21, false);
        assert_close(lon, -58.3816, 1e-6, "longitude");
        assert_close(lat, -34.6037, 1e-6, "latitude");
    }

    #[test]
    fn transform_between_zones() {
        let t = CoordTransform::new(Some(&CRS::from_epsg(25832)), Some(&CRS::from_epsg(25833))).unwrap();
        assert!(!t.is_identity());
        let (x, y) = (600_000.0, 6_650_000.0);
        let (tx, ty) = t.apply(x, y);
        let (bx, by) = t.inverse().apply(tx, ty);
        assert_close(bx, x, 0.01, "x back");
        assert_close(by, y, 0.01, "y back");
    }

    #[test]
    fn transform_identity_cases() {
        let utm = CRS::from_epsg(25833);
        assert!(CoordTransform::new(None, Some(&utm)).unwrap().is_identity());
        assert!(CoordTransform::new(Some(&utm), Some(&utm)).unwrap().is_identity());
        // Same projection under two codes
        let wgs_utm = CRS::from_epsg(32633);
        assert!(CoordTransform::new(Some(&utm), Some(&wgs_utm)).unwrap().is_identity());
    }

    #[test]
    fn transform_unsupported_crs_fails() {
        let merc = CRS::from_epsg(3857);
        assert!(CoordTransform::new(Some(&merc), Some(&CRS::wgs84())).is_err());
    }
}
