//! Focal (moving window) mode
//!
//! Replaces each valid cell with the most frequent value in its
//! neighborhood. Used to remove isolated single-pixel noise from categorical
//! rasters without ever producing a value that was not already there.

use crate::maybe_rayon::*;
use ecotypes_core::raster::{Neighborhood, Raster, RasterElement};
use ecotypes_core::{Error, Result};

/// Parameters for focal mode
#[derive(Debug, Clone, Default)]
pub struct FocalModeParams {
    /// Window shape; the default is a radius-1 circle (centre + 4 neighbours)
    pub neighborhood: Neighborhood,
}

/// Most frequent value; ties go to the smallest value.
///
/// Sorts `values` in place. Returns `None` for an empty slice.
pub fn mode_of<T: RasterElement>(values: &mut [T]) -> Option<T> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut best: Option<(T, usize)> = None;
    let mut i = 0;
    while i < values.len() {
        let v = values[i];
        let mut j = i + 1;
        while j < values.len() && values[j] == v {
            j += 1;
        }
        let count = j - i;
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((v, count));
        }
        i = j;
    }

    best.map(|(v, _)| v)
}

/// Focal mode filter
///
/// No-data cells stay no-data and no-data neighbours do not vote, so the
/// filter never grows a raster into masked areas.
pub fn focal_mode<T: RasterElement>(raster: &Raster<T>, params: FocalModeParams) -> Result<Raster<T>> {
    if params.neighborhood.radius() == 0 {
        return Err(Error::Algorithm("Focal radius must be > 0".into()));
    }

    let (rows, cols) = raster.shape();
    let offsets = params.neighborhood.offsets();
    let nodata = raster.nodata();

    let output_data: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = Vec::with_capacity(cols);
            let mut values: Vec<T> = Vec::with_capacity(offsets.len());

            for col in 0..cols {
                let center = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(center) {
                    row_data.push(center);
                    continue;
                }

                values.clear();
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;

                    if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                        let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                        if !raster.is_nodata(v) {
                            values.push(v);
                        }
                    }
                }

                row_data.push(mode_of(&mut values).unwrap_or(center));
            }

            row_data
        })
        .collect();

    raster.derive(output_data, nodata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotypes_core::GeoTransform;

    fn codes(values: Vec<i32>, rows: usize, cols: usize) -> Raster<i32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 5.0, 5.0, -5.0));
        r.set_nodata(Some(i32::MIN));
        r
    }

    #[test]
    fn test_mode_of_ties_go_to_smallest() {
        assert_eq!(mode_of(&mut [201, 101, 201, 101]), Some(101));
        assert_eq!(mode_of(&mut [601, 501, 601]), Some(601));
        assert_eq!(mode_of::<i32>(&mut []), None);
    }

    #[test]
    fn test_isolated_pixel_removed() {
        let mut values = vec![101; 25];
        values[12] = 601;
        let r = codes(values, 5, 5);

        let out = focal_mode(&r, FocalModeParams::default()).unwrap();
        assert_eq!(out.valid(2, 2), Some(101));
        assert!(out.data().iter().all(|&v| v == 101));
    }

    #[test]
    fn test_nodata_stays_and_does_not_vote() {
        let n = i32::MIN;
        // centre 201 has neighbours: nodata above/below, 101 left, 201 right
        let r = codes(vec![
            101, n,   101,
            101, 201, 201,
            101, n,   101,
        ], 3, 3);

        let out = focal_mode(&r, FocalModeParams::default()).unwrap();
        assert_eq!(out.valid(0, 1), None);
        assert_eq!(out.valid(2, 1), None);
        // votes: 201 (self), 101, 201 -> 201
        assert_eq!(out.valid(1, 1), Some(201));
    }

    #[test]
    fn test_output_codes_come_from_input() {
        let values: Vec<i32> = (0..100).map(|i| [101, 201, 401, 601][(i * 7 + i / 3) % 4]).collect();
        let r = codes(values, 10, 10);
        let out = focal_mode(&r, FocalModeParams { neighborhood: Neighborhood::circle(2) }).unwrap();
        assert!(out.data().iter().all(|v| [101, 201, 401, 601].contains(v)));
    }

    #[test]
    fn test_presence_band_smoothing() {
        let mut band: Raster<u8> = Raster::filled(3, 3, 0);
        band.set_nodata(Some(u8::MAX));
        band.set(1, 1, 1).unwrap();
        let out = focal_mode(&band, FocalModeParams::default()).unwrap();
        assert_eq!(out.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_zero_radius_rejected() {
        let r = codes(vec![1; 4], 2, 2);
        let params = FocalModeParams { neighborhood: Neighborhood::circle(0) };
        assert!(focal_mode(&r, params).is_err());
    }
}
