//! Raster data sources
//!
//! A [`RasterSource`] hands out independent, boundless [`RasterWindow`]s for
//! one band of a raster. Reads take `&self`, so a source that is `Sync` can
//! serve several worker threads at once.

use tracing::warn;

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, RasterWindow};
use crate::vector::BoundingBox;

/// Nodata used when neither the caller nor the raster metadata supplies one
pub const DEFAULT_NODATA: f64 = -999.0;

/// One band of a raster that can be read window by window
pub trait RasterSource {
    /// Affine transform of the full raster
    fn transform(&self) -> &GeoTransform;

    /// Dimensions as (rows, cols)
    fn shape(&self) -> (usize, usize);

    /// Resolved nodata value used to fill and mask windows
    fn nodata(&self) -> f64;

    /// Band number being read, counting from 1
    fn band(&self) -> usize {
        1
    }

    /// Nodata value supplied by the caller, if any
    fn nodata_override(&self) -> Option<f64> {
        None
    }

    /// Read the cells covering `bounds`; cells outside the raster hold nodata
    fn read_window(&self, bounds: &BoundingBox) -> Result<RasterWindow>;
}

impl<S: RasterSource + ?Sized> RasterSource for &S {
    fn transform(&self) -> &GeoTransform {
        (**self).transform()
    }

    fn shape(&self) -> (usize, usize) {
        (**self).shape()
    }

    fn nodata(&self) -> f64 {
        (**self).nodata()
    }

    fn band(&self) -> usize {
        (**self).band()
    }

    fn nodata_override(&self) -> Option<f64> {
        (**self).nodata_override()
    }

    fn read_window(&self, bounds: &BoundingBox) -> Result<RasterWindow> {
        (**self).read_window(bounds)
    }
}

/// Pick the nodata value: explicit override, then metadata, then the default
pub fn resolve_nodata(override_value: Option<f64>, metadata: Option<f64>) -> f64 {
    match override_value.or(metadata) {
        Some(nd) => nd,
        None => {
            warn!("Setting nodata to {DEFAULT_NODATA}; specify nodata explicitly");
            DEFAULT_NODATA
        }
    }
}

/// In-memory raster bands served as a [`RasterSource`]
#[derive(Debug, Clone)]
pub struct MemorySource<T: RasterElement> {
    bands: Vec<Raster<T>>,
    band: usize,
    nodata: f64,
    nodata_override: Option<f64>,
}

impl<T: RasterElement> MemorySource<T> {
    /// Single-band source using the raster's own nodata (or the default)
    pub fn new(raster: Raster<T>) -> Self {
        let metadata = raster.nodata().and_then(|nd| nd.to_f64());
        Self {
            nodata: resolve_nodata(None, metadata),
            bands: vec![raster],
            band: 1,
            nodata_override: None,
        }
    }

    /// Multi-band source reading `band` (1-based) with an optional nodata override.
    ///
    /// All bands must share the first band's shape.
    pub fn from_bands(bands: Vec<Raster<T>>, band: usize, nodata: Option<f64>) -> Result<Self> {
        if band == 0 || band > bands.len() {
            return Err(Error::InvalidBand { band, bands: bands.len() });
        }

        let (er, ec) = bands[0].shape();
        if let Some(bad) = bands.iter().find(|b| b.shape() != (er, ec)) {
            let (ar, ac) = bad.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        let metadata = bands[band - 1].nodata().and_then(|nd| nd.to_f64());
        Ok(Self {
            nodata: resolve_nodata(nodata, metadata),
            bands,
            band,
            nodata_override: nodata,
        })
    }

    /// Replace the nodata value used for reads
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self.nodata_override = Some(nodata);
        self
    }

    /// The band being read
    pub fn raster(&self) -> &Raster<T> {
        &self.bands[self.band - 1]
    }

    /// Every band, in band order
    pub fn bands(&self) -> &[Raster<T>] {
        &self.bands
    }
}

impl<T: RasterElement> RasterSource for MemorySource<T> {
    fn transform(&self) -> &GeoTransform {
        self.raster().transform()
    }

    fn shape(&self) -> (usize, usize) {
        self.raster().shape()
    }

    fn nodata(&self) -> f64 {
        self.nodata
    }

    fn band(&self) -> usize {
        self.band
    }

    fn nodata_override(&self) -> Option<f64> {
        self.nodata_override
    }

    fn read_window(&self, bounds: &BoundingBox) -> Result<RasterWindow> {
        let raster = self.raster();
        let window = raster.transform().window_for_bounds(bounds);
        let data = raster.read_window_f64(&window, self.nodata);

        Ok(RasterWindow {
            data,
            nodata: self.nodata,
            transform: raster.transform().window_transform(&window),
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GeoTransform, Window};
    use approx::assert_relative_eq;

    fn sample() -> Raster<i32> {
        Raster::from_vec((1..=9).collect(), 3, 3)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0))
    }

    #[test]
    fn test_default_nodata() {
        let src = MemorySource::new(sample());
        assert_eq!(src.nodata(), DEFAULT_NODATA);
        assert_eq!(src.band(), 1);
        assert_eq!(src.nodata_override(), None);
    }

    #[test]
    fn test_metadata_nodata() {
        let src = MemorySource::new(sample().with_nodata(Some(5)));
        assert_eq!(src.nodata(), 5.0);
    }

    #[test]
    fn test_override_wins() {
        let src = MemorySource::from_bands(vec![sample().with_nodata(Some(5))], 1, Some(0.0)).unwrap();
        assert_eq!(src.nodata(), 0.0);
        assert_eq!(src.nodata_override(), Some(0.0));
    }

    #[test]
    fn test_invalid_band() {
        assert!(matches!(
            MemorySource::from_bands(vec![sample()], 2, None),
            Err(Error::InvalidBand { band: 2, bands: 1 })
        ));
    }

    #[test]
    fn test_band_shape_mismatch() {
        let other = Raster::<i32>::new(2, 2);
        assert!(MemorySource::from_bands(vec![sample(), other], 1, None).is_err());
    }

    #[test]
    fn test_read_window_is_boundless() {
        let src = MemorySource::new(sample()).with_nodata(-1.0);
        let w = src.read_window(&BoundingBox::new(2.5, 2.5, 3.5, 3.5)).unwrap();

        assert_eq!(w.window, Window::new(-1, 2, 2, 2));
        assert_eq!(w.data, ndarray::array![[-1.0, -1.0], [3.0, -1.0]]);
        assert_relative_eq!(w.transform.origin_x, 2.0);
        assert_relative_eq!(w.transform.origin_y, 4.0);
        assert!(w.is_nodata(-1.0));
    }
}
