//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Land-cover products are north-up, so `row_rotation` and `col_rotation`
/// are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform with square cells of `scale` units whose grid is
    /// snapped to multiples of `scale`, covering the given bounds.
    ///
    /// Returns the transform plus the (rows, cols) needed to cover
    /// `(min_x, min_y, max_x, max_y)`. Snapping keeps grids produced at
    /// nested scales (25 and 50, say) aligned with each other.
    pub fn snapped(bounds: (f64, f64, f64, f64), scale: f64) -> (Self, usize, usize) {
        let (min_x, min_y, max_x, max_y) = bounds;
        let x0 = (min_x / scale).floor() * scale;
        let y0 = (max_y / scale).ceil() * scale;
        let x1 = (max_x / scale).ceil() * scale;
        let y1 = (min_y / scale).floor() * scale;

        let cols = (((x1 - x0) / scale).round() as usize).max(1);
        let rows = (((y0 - y1) / scale).round() as usize).max(1);

        (Self::new(x0, y0, scale, -scale), rows, cols)
    }

    /// Convert pixel coordinates to map coordinates
    ///
    /// Returns the coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_geo_frac(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Convert pixel coordinates to map coordinates (top-left corner)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_geo_frac(col as f64, row as f64)
    }

    /// Convert fractional pixel coordinates to map coordinates
    pub fn pixel_to_geo_frac(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert map coordinates to pixel coordinates
    ///
    /// Returns fractional pixel coordinates; use `.floor()` to get integer indices
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-10 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Get the cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Planar area of one cell, in squared map units
    pub fn cell_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation).abs()
    }

    /// Check if this is a north-up image (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_height < 0.0
    }

    /// Whether two transforms describe the same grid within `tol` map units
    pub fn approx_eq(&self, other: &GeoTransform, tol: f64) -> bool {
        (self.origin_x - other.origin_x).abs() <= tol
            && (self.origin_y - other.origin_y).abs() <= tol
            && (self.pixel_width - other.pixel_width).abs() <= tol
            && (self.pixel_height - other.pixel_height).abs() <= tol
            && (self.row_rotation - other.row_rotation).abs() <= tol
            && (self.col_rotation - other.col_rotation).abs() <= tol
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, 0);
        let (x2, y2) = self.pixel_to_geo_corner(0, height);
        let (x3, y3) = self.pixel_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_snapped_grid_covers_bounds() {
        let (gt, rows, cols) = GeoTransform::snapped((12.0, 7.0, 113.0, 96.0), 25.0);
        assert_relative_eq!(gt.origin_x, 0.0);
        assert_relative_eq!(gt.origin_y, 100.0);
        assert_eq!((rows, cols), (4, 5));
        assert_relative_eq!(gt.cell_area(), 625.0);
    }

    #[test]
    fn test_nested_snapping_aligns() {
        let bounds = (3.0, 3.0, 197.0, 197.0);
        let (fine, _, _) = GeoTransform::snapped(bounds, 25.0);
        let (coarse, _, _) = GeoTransform::snapped(bounds, 50.0);
        let (col, row) = fine.geo_to_pixel(coarse.origin_x, coarse.origin_y);
        assert_relative_eq!(col.fract(), 0.0);
        assert_relative_eq!(row.fract(), 0.0);
    }
}
