//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Zonal statistics run on `f64` windows; this trait bounds the source cell
/// types that can be widened into them.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Value substituted for cells that cannot be decoded into this type
    fn default_nodata() -> Self;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
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
        }
    };
}

impl_raster_element_int!(i8);
impl_raster_element_int!(i16);
impl_raster_element_int!(i32);
impl_raster_element_int!(i64);
impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(u32);
impl_raster_element_int!(u64);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening() {
        assert_eq!(RasterElement::to_f64(7_u8), Some(7.0));
        assert_eq!(RasterElement::to_f64(-3_i16), Some(-3.0));
        assert!(RasterElement::to_f64(f32::NAN).unwrap().is_nan());
    }

    #[test]
    fn test_default_nodata() {
        assert_eq!(<i32 as RasterElement>::default_nodata(), i32::MIN);
        assert!(<f64 as RasterElement>::default_nodata().is_nan());
    }
}
