//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement, Window};
use crate::vector::BoundingBox;
use ndarray::{Array2, ArrayView2, s};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid together with the
/// affine transform that places it in world coordinates and an optional
/// nodata value.
///
/// # Example
///
/// ```ignore
/// use zonestat_core::{GeoTransform, Raster};
///
/// let mut raster: Raster<f32> = Raster::new(100, 100);
/// raster.set_transform(GeoTransform::new(0.0, 100.0, 1.0, -1.0));
/// raster.set(10, 20, 42.0)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Builder-style transform setter
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder-style nodata setter
    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Geographic bounds
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Read a window as `f64`, filling cells outside the raster with `fill`.
    ///
    /// Values that cannot be represented as `f64` are also replaced by `fill`.
    pub fn read_window_f64(&self, window: &Window, fill: f64) -> Array2<f64> {
        let mut out = Array2::from_elem(window.shape(), fill);
        if window.is_empty() {
            return out;
        }

        let (rows, cols) = (self.rows() as isize, self.cols() as isize);
        let r0 = window.row_off.max(0);
        let c0 = window.col_off.max(0);
        let r1 = (window.row_off + window.rows as isize).min(rows);
        let c1 = (window.col_off + window.cols as isize).min(cols);
        if r0 >= r1 || c0 >= c1 {
            return out;
        }

        let src = self.data.slice(s![r0..r1, c0..c1]);
        let dr = (r0 - window.row_off) as usize;
        let dc = (c0 - window.col_off) as usize;
        let mut dst = out.slice_mut(s![
            dr..dr + (r1 - r0) as usize,
            dc..dc + (c1 - c0) as usize
        ]);
        dst.zip_mut_with(&src, |d, &v| *d = v.to_f64().unwrap_or(fill));

        out
    }
}
