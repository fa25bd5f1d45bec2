//! Cell value trait shared by categorical, mask and area rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Land-cover and ecosystem-type codes live in `i32`, boolean masks and
/// presence bands in `u8`, and per-cell areas in `f64`.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert an f64 into this type.
    ///
    /// Integer types round to the nearest value; values that do not fit
    /// return `None`.
    fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        if Self::is_float() {
            NumCast::from(value)
        } else {
            NumCast::from(value.round())
        }
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $nodata:expr) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                $nodata
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

// u8 rasters hold 0/1 masks, so their sentinel sits at the top of the range.
impl_raster_element_int!(u8, u8::MAX);
impl_raster_element_int!(u16, u16::MAX);
impl_raster_element_int!(i16, i16::MIN);
impl_raster_element_int!(i32, i32::MIN);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_nodata_requires_declared_value() {
        assert!(!99_i32.is_nodata(None));
        assert!(99_i32.is_nodata(Some(99)));
        assert!(!101_i32.is_nodata(Some(99)));
    }

    #[test]
    fn test_float_nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(!1.5_f64.is_nodata(None));
    }

    #[test]
    fn test_from_f64_rounds_integers() {
        assert_eq!(<i32 as RasterElement>::from_f64(40.4), Some(40));
        assert_eq!(<i32 as RasterElement>::from_f64(40.5), Some(41));
        assert_eq!(<u8 as RasterElement>::from_f64(300.0), None);
        assert_eq!(<i32 as RasterElement>::from_f64(f64::NAN), None);
        assert_eq!(<f64 as RasterElement>::from_f64(0.25), Some(0.25));
    }
}
