//! Dense statistics categories
//!
//! Ecosystem-type codes fold onto a dense index 1..15 (pairs such as
//! 101/102 share an index), which then expands into one 0/1 presence band
//! per index. Bands are named by the ecosystem-type code they count.

use crate::config::{BAND_NAMES, DENSE_CODES};
use crate::maybe_rayon::*;
use ecotypes_core::raster::Raster;
use ecotypes_core::Result;
use tracing::warn;

/// No-data value of dense and presence rasters
pub const DENSE_NODATA: u8 = u8::MAX;

/// Dense index of an ecosystem-type code
pub fn dense_code(code: i32) -> Option<u8> {
    DENSE_CODES.iter().find(|(c, _)| *c == code).map(|(_, d)| *d)
}

/// Fold ecosystem-type codes onto the dense index.
///
/// Codes outside the table (raw source codes no rule matched) become 0,
/// which no presence band counts; how many there were is logged.
pub fn dense_recode(raster: &Raster<i32>) -> Result<Raster<u8>> {
    let (rows, cols) = raster.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| match raster.valid(row, col) {
                    Some(code) => dense_code(code).unwrap_or(0),
                    None => DENSE_NODATA,
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    let unmapped = data.iter().filter(|&&d| d == 0).count();
    if unmapped > 0 {
        warn!("{} classified cells hold codes outside the statistics categories", unmapped);
    }

    raster.derive(data, Some(DENSE_NODATA))
}

/// One presence band
#[derive(Debug, Clone)]
pub struct PresenceBand {
    /// Ecosystem-type code the band counts
    pub name: &'static str,
    /// Dense index (1-based)
    pub index: u8,
    /// 1 where the cell belongs to the category, 0 elsewhere
    pub raster: Raster<u8>,
}

/// Expand a dense raster into one presence band per category
pub fn presence_bands(dense: &Raster<u8>) -> Result<Vec<PresenceBand>> {
    BAND_NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let index = i as u8 + 1;
            let data: Vec<u8> = dense
                .data()
                .iter()
                .map(|&d| match d {
                    DENSE_NODATA => DENSE_NODATA,
                    d => u8::from(d == index),
                })
                .collect();
            Ok(PresenceBand {
                name,
                index,
                raster: dense.derive(data, Some(DENSE_NODATA))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CATEGORY_COUNT;
    use ecotypes_core::GeoTransform;

    const N: i32 = i32::MIN;

    fn unified(values: Vec<i32>) -> Raster<i32> {
        let n = values.len();
        let mut r = Raster::from_vec(values, 1, n).unwrap();
        r.set_transform(GeoTransform::new(0.0, 5.0, 5.0, -5.0));
        r.set_nodata(Some(N));
        r
    }

    #[test]
    fn test_pairs_share_an_index() {
        assert_eq!(dense_code(101), Some(1));
        assert_eq!(dense_code(102), Some(1));
        assert_eq!(dense_code(602), Some(6));
        assert_eq!(dense_code(822), Some(15));
        assert_eq!(dense_code(40), None);
    }

    #[test]
    fn test_recode_handles_nodata_and_unmapped() {
        let dense = dense_recode(&unified(vec![201, 202, N, 40, 412])).unwrap();
        assert_eq!(dense.data().iter().copied().collect::<Vec<_>>(), vec![2, 2, DENSE_NODATA, 0, 9]);
        assert_eq!(dense.valid(0, 2), None);
    }

    #[test]
    fn test_recode_is_pure() {
        let r = unified(vec![101, 302, 841, 99, N, 832]);
        let first = presence_bands(&dense_recode(&r).unwrap()).unwrap();
        let second = presence_bands(&dense_recode(&r).unwrap()).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.raster.data(), b.raster.data());
        }
    }

    #[test]
    fn test_each_valid_cell_in_at_most_one_band() {
        let r = unified(vec![101, 201, 301, 401, 501, 601, 701, 801, 412, 811, 831, 841, 842, 832, 822, 40, N]);
        let bands = presence_bands(&dense_recode(&r).unwrap()).unwrap();
        assert_eq!(bands.len(), CATEGORY_COUNT);

        for col in 0..r.cols() {
            let hits: usize = bands.iter().map(|b| (b.raster.get(0, col).unwrap() == 1) as usize).sum();
            let expected = if col < 15 { 1 } else { 0 };
            assert_eq!(hits, expected, "column {}", col);
        }
        // band order follows the band names
        assert_eq!(bands[8].name, "412");
        assert_eq!(bands[8].raster.get(0, 8).unwrap(), 1);
        assert_eq!(bands[0].raster.valid(0, 16), None);
    }
}
