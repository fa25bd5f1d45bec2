//! Grid layout: the shape, placement and CRS of a raster without its cells

use crate::crs::CRS;
use crate::raster::GeoTransform;

/// Tolerance (map units) when comparing grid origins and cell sizes
const GRID_TOLERANCE: f64 = 1e-6;

/// Shape, georeferencing and CRS of a raster.
///
/// Used as the target of resampling and rasterization, and to check that
/// rasters combined cell-by-cell actually line up.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Option<CRS>) -> Self {
        Self { rows, cols, transform, crs }
    }

    /// North-up grid at `scale` covering `bounds`, snapped to multiples of `scale`
    pub fn covering(bounds: (f64, f64, f64, f64), scale: f64, crs: Option<CRS>) -> Self {
        let (transform, rows, cols) = GeoTransform::snapped(bounds, scale);
        Self { rows, cols, transform, crs }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Whether the two grids index the same cells at the same places.
    ///
    /// CRS is compared only when both grids declare one.
    pub fn is_aligned_with(&self, other: &Grid) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        if !self.transform.approx_eq(&other.transform, GRID_TOLERANCE) {
            return false;
        }
        match (&self.crs, &other.crs) {
            (Some(a), Some(b)) => a.is_equivalent(b),
            _ => true,
        }
    }

    /// Pixel (col, row) containing the map coordinate, if inside the grid
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        if col.is_nan() || row.is_nan() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        if col < self.cols && row < self.rows {
            Some((col, row))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_at_inside_and_outside() {
        let grid = Grid::new(10, 10, GeoTransform::new(0.0, 100.0, 10.0, -10.0), None);
        assert_eq!(grid.cell_at(5.0, 95.0), Some((0, 0)));
        assert_eq!(grid.cell_at(99.0, 1.0), Some((9, 9)));
        assert_eq!(grid.cell_at(-1.0, 50.0), None);
        assert_eq!(grid.cell_at(50.0, 100.5), None);
        assert_eq!(grid.cell_at(100.0, 50.0), None);
    }

    #[test]
    fn test_alignment_checks_shape_transform_and_crs() {
        let a = Grid::new(4, 4, GeoTransform::new(0.0, 4.0, 1.0, -1.0), Some(CRS::from_epsg(25833)));
        let mut b = a.clone();
        assert!(a.is_aligned_with(&b));

        b.crs = Some(CRS::from_epsg(25832));
        assert!(!a.is_aligned_with(&b));

        b.crs = None;
        assert!(a.is_aligned_with(&b));

        b.transform.origin_x = 0.5;
        assert!(!a.is_aligned_with(&b));
    }
}
