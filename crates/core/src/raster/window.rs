//! Pixel windows and the arrays read through them

use ndarray::Array2;

use crate::raster::GeoTransform;
use crate::vector::BoundingBox;

/// A rectangular block of cells addressed relative to a parent raster.
///
/// Offsets are signed: a window may start above or left of the raster
/// and extend past its far edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub row_off: isize,
    pub col_off: isize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn new(row_off: isize, col_off: isize, rows: usize, cols: usize) -> Self {
        Self { row_off, col_off, rows, cols }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }
}

/// Values read for one window of a raster band.
///
/// Every read allocates its own array; windows never share storage.
#[derive(Debug, Clone)]
pub struct RasterWindow {
    /// Cell values, row-major (row, col)
    pub data: Array2<f64>,
    /// Nodata sentinel; cells outside the source raster hold this value
    pub nodata: f64,
    /// Transform of the window's upper-left cell
    pub transform: GeoTransform,
    /// Where the window sits in the source raster
    pub window: Window,
}

impl RasterWindow {
    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// World bounds covered by the window
    pub fn bounds(&self) -> BoundingBox {
        let (rows, cols) = self.shape();
        self.transform.bounds(cols, rows)
    }

    /// Whether a value equals the nodata sentinel
    pub fn is_nodata(&self, value: f64) -> bool {
        value == self.nodata
    }
}
