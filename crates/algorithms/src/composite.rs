//! Source compositing
//!
//! Collapses a land-cover tile collection into one raster and builds the
//! taxonomy-A validity mask.
//!
//! Overlapping tiles are merged with the mean of their codes. A whole mean
//! is kept as a code. A fractional one (tiles disagreeing, e.g. 81 and 82)
//! becomes [`MIXED_TILE_CODE`], which no rule matches, so the cell passes
//! through classification unchanged and counts in no statistics band.

use crate::config::MIXED_TILE_CODE;
use crate::maybe_rayon::*;
use ecotypes_core::raster::{GeoTransform, Raster};
use ecotypes_core::{Error, Result};
use tracing::{debug, info, warn};

/// Tolerance, in cells, for tile offsets to count as grid-aligned
const ALIGN_TOLERANCE: f64 = 1e-3;

/// Merge tiles sharing cell size and CRS into one raster covering all of them.
///
/// Cells no tile covers are no-data (`i32::MIN`).
pub fn mosaic(tiles: &[Raster<i32>]) -> Result<Raster<i32>> {
    let first = tiles.first().ok_or_else(|| Error::InvalidParameter {
        name: "tiles",
        value: "0".into(),
        reason: "at least one tile is required".into(),
    })?;
    let cell_w = first.transform().pixel_width;
    let cell_h = first.transform().pixel_height;

    let (mut min_x, mut min_y, mut max_x, mut max_y) = first.bounds();
    for tile in &tiles[1..] {
        let t = tile.transform();
        if (t.pixel_width - cell_w).abs() > 1e-9 || (t.pixel_height - cell_h).abs() > 1e-9 {
            return Err(Error::InvalidParameter {
                name: "tiles",
                value: format!("{}x{}", t.pixel_width, t.pixel_height),
                reason: format!("tiles must share cell size {}x{}", cell_w, cell_h),
            });
        }
        if let (Some(a), Some(b)) = (first.crs(), tile.crs())
            && !a.is_equivalent(b)
        {
            return Err(Error::CrsMismatch(a.to_string(), b.to_string()));
        }
        let (x0, y0, x1, y1) = tile.bounds();
        min_x = min_x.min(x0);
        min_y = min_y.min(y0);
        max_x = max_x.max(x1);
        max_y = max_y.max(y1);
    }

    let cols = ((max_x - min_x) / cell_w.abs()).round() as usize;
    let rows = ((max_y - min_y) / cell_h.abs()).round() as usize;
    let transform = GeoTransform::new(min_x, max_y, cell_w, cell_h);

    let mut sum = vec![0.0f64; rows * cols];
    let mut count = vec![0u32; rows * cols];
    let mut seen = vec![i32::MIN; rows * cols];
    let mut conflicts = 0usize;

    for tile in tiles {
        let (col_off, row_off) = tile_offset(&transform, tile.transform())?;
        let (t_rows, t_cols) = tile.shape();

        for r in 0..t_rows {
            for c in 0..t_cols {
                let Some(v) = tile.valid(r, c) else { continue };
                let idx = (row_off + r) * cols + (col_off + c);
                if count[idx] > 0 && seen[idx] != v {
                    conflicts += 1;
                }
                seen[idx] = v;
                sum[idx] += v as f64;
                count[idx] += 1;
            }
        }
    }

    if conflicts > 0 {
        debug!("{} cells covered by tiles with differing codes; mean taken", conflicts);
    }

    let data: Vec<i32> = (0..rows * cols)
        .into_par_iter()
        .map(|i| match count[i] {
            0 => i32::MIN,
            1 => seen[i],
            n => overlap_code(sum[i] / n as f64),
        })
        .collect();

    let mixed = (0..rows * cols)
        .filter(|&i| count[i] > 1 && data[i] == MIXED_TILE_CODE)
        .count();
    if mixed > 0 {
        warn!("{} overlapping cells have no whole mean code; set to {}", mixed, MIXED_TILE_CODE);
    }

    let mut out = Raster::from_vec(data, rows, cols)?;
    out.set_transform(transform);
    out.set_crs(first.crs().cloned());
    out.set_nodata(Some(i32::MIN));

    info!("Composited {} tiles into {}x{}", tiles.len(), rows, cols);
    Ok(out)
}

fn overlap_code(mean: f64) -> i32 {
    if mean.fract() == 0.0 && mean >= i32::MIN as f64 && mean <= i32::MAX as f64 {
        mean as i32
    } else {
        MIXED_TILE_CODE
    }
}

/// (col, row) of the tile's upper-left cell within the mosaic
fn tile_offset(mosaic: &GeoTransform, tile: &GeoTransform) -> Result<(usize, usize)> {
    let (c, r) = mosaic.geo_to_pixel(tile.origin_x, tile.origin_y);
    let (cr, rr) = (c.round(), r.round());
    if (c - cr).abs() > ALIGN_TOLERANCE || (r - rr).abs() > ALIGN_TOLERANCE || cr < 0.0 || rr < 0.0 {
        return Err(Error::InvalidParameter {
            name: "tiles",
            value: format!("origin ({}, {})", tile.origin_x, tile.origin_y),
            reason: "tiles are not aligned to a common grid".into(),
        });
    }
    Ok((cr as usize, rr as usize))
}

/// 1 where the raster holds a code other than `not_mapped`, else 0
pub fn validity_mask(raster: &Raster<i32>, not_mapped: i32) -> Result<Raster<u8>> {
    let data: Vec<u8> = raster
        .data()
        .iter()
        .map(|&v| u8::from(!raster.is_nodata(v) && v != not_mapped))
        .collect();
    raster.derive(data, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{taxonomy_a, taxonomy_b, Cell};
    use crate::statistics::dense_code;
    use ecotypes_core::CRS;

    const N: i32 = i32::MIN;

    fn tile(values: Vec<i32>, rows: usize, cols: usize, x0: f64, y0: f64) -> Raster<i32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(x0, y0, 5.0, -5.0));
        r.set_crs(Some(CRS::from_epsg(25833)));
        r.set_nodata(Some(N));
        r
    }

    #[test]
    fn test_side_by_side_tiles() {
        let a = tile(vec![30, 30, 30, 30], 2, 2, 0.0, 10.0);
        let b = tile(vec![70, 70, 70, 70], 2, 2, 10.0, 10.0);
        let m = mosaic(&[a, b]).unwrap();

        assert_eq!(m.shape(), (2, 4));
        assert_eq!(m.valid(0, 1), Some(30));
        assert_eq!(m.valid(1, 2), Some(70));
        assert_eq!(m.crs(), Some(&CRS::from_epsg(25833)));
    }

    #[test]
    fn test_gap_between_tiles_is_nodata() {
        let a = tile(vec![30], 1, 1, 0.0, 10.0);
        let b = tile(vec![70], 1, 1, 10.0, 5.0);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.valid(0, 0), Some(30));
        assert_eq!(m.valid(0, 1), None);
        assert_eq!(m.valid(1, 2), Some(70));
    }

    #[test]
    fn test_overlap_takes_whole_mean() {
        let a = tile(vec![30, 30], 1, 2, 0.0, 5.0);
        let b = tile(vec![50, 30], 1, 2, 0.0, 5.0);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!(m.valid(0, 0), Some(40));
        assert_eq!(m.valid(0, 1), Some(30));
    }

    #[test]
    fn test_fractional_overlap_is_left_unclassified() {
        // freshwater (81) over marine (82) must not round into marine
        let a = tile(vec![81, 81], 1, 2, 0.0, 5.0);
        let b = tile(vec![82, 81], 1, 2, 0.0, 5.0);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!(m.valid(0, 0), Some(MIXED_TILE_CODE));
        assert_eq!(m.valid(0, 1), Some(81));

        let a = taxonomy_a();
        assert!(!a.output_codes().contains(&MIXED_TILE_CODE));
        assert_eq!(a.apply(&Cell::new(MIXED_TILE_CODE)), MIXED_TILE_CODE);
        assert_eq!(taxonomy_b().apply(&Cell::new(MIXED_TILE_CODE)), MIXED_TILE_CODE);
        assert_eq!(dense_code(MIXED_TILE_CODE), None);
    }

    #[test]
    fn test_nodata_in_one_tile_does_not_dilute() {
        let a = tile(vec![N, 60], 1, 2, 0.0, 5.0);
        let b = tile(vec![81, N], 1, 2, 0.0, 5.0);
        let m = mosaic(&[a, b]).unwrap();
        assert_eq!(m.valid(0, 0), Some(81));
        assert_eq!(m.valid(0, 1), Some(60));
    }

    #[test]
    fn test_mismatched_tiles_rejected() {
        let a = tile(vec![30], 1, 1, 0.0, 5.0);
        let mut b = tile(vec![30], 1, 1, 2.0, 5.0);
        assert!(mosaic(&[a.clone(), b.clone()]).is_err());

        b.set_transform(GeoTransform::new(0.0, 5.0, 10.0, -10.0));
        assert!(mosaic(&[a.clone(), b]).is_err());

        let mut c = a.clone();
        c.set_crs(Some(CRS::from_epsg(25832)));
        assert!(matches!(mosaic(&[a, c]), Err(Error::CrsMismatch(_, _))));

        assert!(mosaic(&[]).is_err());
    }

    #[test]
    fn test_validity_mask() {
        let r = tile(vec![30, 99, N, 50], 2, 2, 0.0, 10.0);
        let valid = validity_mask(&r, 99).unwrap();
        assert_eq!(valid.data().iter().copied().collect::<Vec<_>>(), vec![1, 0, 0, 1]);
    }
}
