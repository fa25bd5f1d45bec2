//! Resampling onto another grid
//!
//! Pull-based: every target cell looks up the source cells whose centres
//! fall inside its footprint (after transforming the footprint into the
//! source CRS) and reduces them. When no source centre falls inside, which
//! happens when the target is finer than the source, the source cell under
//! the target centre is used.
//!
//! Categorical rasters must use [`Reducer::Mode`]: any other reducer can
//! produce codes that do not exist.

use crate::maybe_rayon::*;
use crate::statistics::mode_of;
use ecotypes_core::crs::CoordTransform;
use ecotypes_core::raster::{GeoTransform, Raster, RasterElement};
use ecotypes_core::{Error, Grid, Result, CRS};
use tracing::debug;

/// How source cells inside a target cell are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    /// Most frequent value, ties to the smallest
    #[default]
    Mode,
    /// Arithmetic mean, rounded for integer rasters
    Mean,
    /// Source cell under the target centre
    Nearest,
}

/// Parameters for resampling
#[derive(Debug, Clone, Default)]
pub struct ResampleParams {
    pub reducer: Reducer,
}

/// Grid at `scale` in `crs` covering the raster's extent.
///
/// `crs = None` keeps the raster's CRS. Grid origins are snapped to
/// multiples of `scale`, so grids at nested scales line up.
pub fn target_grid<T: RasterElement>(raster: &Raster<T>, crs: Option<&CRS>, scale: f64) -> Result<Grid> {
    if scale.is_nan() || scale <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: scale.to_string(),
            reason: "must be positive".into(),
        });
    }
    let crs = crs.or(raster.crs());
    let bounds = CoordTransform::new(raster.crs(), crs)?.apply_bounds(raster.bounds());
    Ok(Grid::covering(bounds, scale, crs.cloned()))
}

/// Resample `raster` onto `target`
pub fn resample<T: RasterElement>(raster: &Raster<T>, target: &Grid, params: ResampleParams) -> Result<Raster<T>> {
    let to_source = CoordTransform::new(target.crs.as_ref(), raster.crs())?;
    let nodata = raster.nodata().unwrap_or_else(T::default_nodata);
    let (rows, cols) = target.shape();

    debug!(
        "Resampling {}x{} -> {}x{} ({:?})",
        raster.rows(), raster.cols(), rows, cols, params.reducer
    );

    if target.is_aligned_with(&raster.grid()) {
        let mut out = raster.clone();
        out.set_crs(target.crs.clone().or_else(|| raster.crs().cloned()));
        return Ok(out);
    }

    let sampler = Sampler {
        raster,
        to_source,
        target: &target.transform,
        nodata,
    };

    let data: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut values: Vec<T> = Vec::new();
            (0..cols)
                .map(|col| sampler.sample(row, col, params.reducer, &mut values))
                .collect::<Vec<T>>()
        })
        .collect();

    let mut out = Raster::from_vec(data, rows, cols)?;
    out.set_transform(target.transform);
    out.set_crs(target.crs.clone());
    out.set_nodata(Some(nodata));
    Ok(out)
}

struct Sampler<'a, T: RasterElement> {
    raster: &'a Raster<T>,
    to_source: CoordTransform,
    target: &'a GeoTransform,
    nodata: T,
}

impl<T: RasterElement> Sampler<'_, T> {
    /// Fractional source pixel coordinates of a target pixel position
    fn source_pixel(&self, col: f64, row: f64) -> (f64, f64) {
        let (x, y) = self.target.pixel_to_geo_frac(col, row);
        let (sx, sy) = self.to_source.apply(x, y);
        self.raster.transform().geo_to_pixel(sx, sy)
    }

    fn sample(&self, row: usize, col: usize, reducer: Reducer, values: &mut Vec<T>) -> T {
        if reducer != Reducer::Nearest {
            values.clear();
            self.collect_window(row, col, values);
            if !values.is_empty() {
                return self.reduce(reducer, values);
            }
        }
        self.nearest(row, col)
    }

    fn collect_window(&self, row: usize, col: usize, values: &mut Vec<T>) {
        let (src_rows, src_cols) = self.raster.shape();
        let (c, r) = (col as f64, row as f64);

        let mut min_c = f64::INFINITY;
        let mut max_c = f64::NEG_INFINITY;
        let mut min_r = f64::INFINITY;
        let mut max_r = f64::NEG_INFINITY;
        for (pc, pr) in [(c, r), (c + 1.0, r), (c, r + 1.0), (c + 1.0, r + 1.0)] {
            let (sc, sr) = self.source_pixel(pc, pr);
            min_c = min_c.min(sc);
            max_c = max_c.max(sc);
            min_r = min_r.min(sr);
            max_r = max_r.max(sr);
        }
        if !(min_c.is_finite() && max_c.is_finite() && min_r.is_finite() && max_r.is_finite()) {
            return;
        }

        // source centre i + 0.5 lies in [min, max)
        let span = |min: f64, max: f64, len: usize| {
            let start = (min - 0.5).ceil().max(0.0) as usize;
            let end = ((max - 0.5).ceil().max(0.0) as usize).min(len);
            start..end
        };

        for sr in span(min_r, max_r, src_rows) {
            for sc in span(min_c, max_c, src_cols) {
                let v = unsafe { self.raster.get_unchecked(sr, sc) };
                if !self.raster.is_nodata(v) {
                    values.push(v);
                }
            }
        }
    }

    fn reduce(&self, reducer: Reducer, values: &mut [T]) -> T {
        match reducer {
            Reducer::Mode | Reducer::Nearest => mode_of(values).unwrap_or(self.nodata),
            Reducer::Mean => {
                let sum: f64 = values.iter().filter_map(|v| v.to_f64()).sum();
                T::from_f64(sum / values.len() as f64).unwrap_or(self.nodata)
            }
        }
    }

    fn nearest(&self, row: usize, col: usize) -> T {
        let (sc, sr) = self.source_pixel(col as f64 + 0.5, row as f64 + 0.5);
        if !(sc >= 0.0 && sr >= 0.0) {
            return self.nodata;
        }
        self.raster
            .valid(sr.floor() as usize, sc.floor() as usize)
            .unwrap_or(self.nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const N: i32 = i32::MIN;

    fn codes(values: Vec<i32>, rows: usize, cols: usize, cell: f64) -> Raster<i32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * cell, cell, -cell));
        r.set_nodata(Some(N));
        r
    }

    fn scrambled(rows: usize, cols: usize, palette: &[i32]) -> Raster<i32> {
        let mut state: u64 = 42;
        let values = (0..rows * cols)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                palette[(state >> 33) as usize % palette.len()]
            })
            .collect();
        codes(values, rows, cols, 5.0)
    }

    #[test]
    fn test_mode_of_each_block() {
        // 10x10 at 5 m: left half mostly 101 with a 601 stripe, right half 201
        let mut values = Vec::new();
        for _row in 0..10 {
            for col in 0..10 {
                values.push(match col {
                    0 => 601,
                    1..=4 => 101,
                    _ => 201,
                });
            }
        }
        let r = codes(values, 10, 10, 5.0);
        let grid = target_grid(&r, None, 25.0).unwrap();
        assert_eq!(grid.shape(), (2, 2));

        let out = resample(&r, &grid, ResampleParams::default()).unwrap();
        assert_eq!(out.valid(0, 0), Some(101));
        assert_eq!(out.valid(0, 1), Some(201));
        assert_eq!(out.valid(1, 0), Some(101));
        assert_eq!(out.cell_size(), 25.0);
    }

    #[test]
    fn test_all_nodata_block_is_nodata() {
        // 2x4 at 5 m -> 1x2 at 10 m
        let r = codes(vec![N, N, 301, 301, N, N, 301, 301], 2, 4, 5.0);
        let grid = target_grid(&r, None, 10.0).unwrap();
        let out = resample(&r, &grid, ResampleParams::default()).unwrap();
        assert_eq!(out.valid(0, 0), None);
        assert_eq!(out.valid(0, 1), Some(301));
    }

    #[test]
    fn test_nodata_cells_do_not_vote() {
        let r = codes(vec![N, N, N, 401], 2, 2, 5.0);
        let grid = target_grid(&r, None, 10.0).unwrap();
        let out = resample(&r, &grid, ResampleParams::default()).unwrap();
        assert_eq!(out.valid(0, 0), Some(401));
    }

    #[test]
    fn test_finer_target_uses_nearest() {
        let r = codes(vec![101, 201, 301, 401], 2, 2, 10.0);
        let grid = target_grid(&r, None, 5.0).unwrap();
        assert_eq!(grid.shape(), (4, 4));

        let out = resample(&r, &grid, ResampleParams::default()).unwrap();
        assert_eq!(out.valid(0, 0), Some(101));
        assert_eq!(out.valid(1, 1), Some(101));
        assert_eq!(out.valid(0, 3), Some(201));
        assert_eq!(out.valid(3, 0), Some(301));
        assert_eq!(out.valid(3, 3), Some(401));
    }

    #[test]
    fn test_mean_rounds_for_integers() {
        let r = codes(vec![1, 2, 3, 4], 2, 2, 5.0);
        let grid = target_grid(&r, None, 10.0).unwrap();
        let out = resample(&r, &grid, ResampleParams { reducer: Reducer::Mean }).unwrap();
        assert_eq!(out.valid(0, 0), Some(3));
    }

    #[test]
    fn test_chained_mode_never_invents_codes() {
        let palette = [101, 201, 401, 601, 801];
        let r = scrambled(40, 40, &palette);

        let medium = resample(&r, &target_grid(&r, None, 25.0).unwrap(), ResampleParams::default()).unwrap();
        let coarse = resample(&medium, &target_grid(&medium, None, 50.0).unwrap(), ResampleParams::default()).unwrap();

        let medium_codes: BTreeSet<i32> = medium.data().iter().copied().filter(|&v| v != N).collect();
        let coarse_codes: BTreeSet<i32> = coarse.data().iter().copied().filter(|&v| v != N).collect();
        assert!(medium_codes.iter().all(|c| palette.contains(c)));
        assert!(coarse_codes.is_subset(&medium_codes));

        assert_eq!(medium.shape(), (8, 8));
        assert_eq!(coarse.shape(), (4, 4));
        assert_eq!(coarse.valid_count(), 16);
    }

    #[test]
    fn test_reproject_to_neighbouring_utm_zone() {
        let src_crs = CRS::from_epsg(25832);
        let dst_crs = CRS::from_epsg(25833);
        let to_utm32 = CoordTransform::new(Some(&CRS::wgs84()), Some(&src_crs)).unwrap();
        let (x, y) = to_utm32.apply(11.9, 60.0);
        let (x, y) = ((x / 5.0).floor() * 5.0, (y / 5.0).floor() * 5.0);

        let mut r: Raster<i32> = Raster::filled(40, 40, 101);
        r.set_transform(GeoTransform::new(x, y, 5.0, -5.0));
        r.set_crs(Some(src_crs));
        r.set_nodata(Some(N));

        let grid = target_grid(&r, Some(&dst_crs), 25.0).unwrap();
        let out = resample(&r, &grid, ResampleParams::default()).unwrap();

        assert_eq!(out.crs(), Some(&dst_crs));
        assert!(out.valid_count() > 0);
        assert!(out.data().iter().all(|&v| v == 101 || v == N));
    }

    #[test]
    fn test_aligned_target_is_copy() {
        let r = codes(vec![101, 201, 301, 401], 2, 2, 5.0);
        let out = resample(&r, &r.grid(), ResampleParams::default()).unwrap();
        assert_eq!(out.data(), r.data());
    }

    #[test]
    fn test_invalid_scale() {
        let r = codes(vec![101], 1, 1, 5.0);
        assert!(target_grid(&r, None, 0.0).is_err());
    }
}
