//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

use crate::raster::Window;
use crate::vector::BoundingBox;

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images, `row_rotation` and `col_rotation` are typically 0,
/// and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// World coordinate of the upper-left corner (the translation terms)
    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    /// Convert pixel coordinates to geographic coordinates
    ///
    /// Returns the coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_geo_f64(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Convert fractional pixel coordinates to geographic coordinates
    pub fn pixel_to_geo_f64(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert geographic coordinates to pixel coordinates
    ///
    /// Returns fractional pixel coordinates; use `.floor()` to get integer indices
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        // Plain division keeps grid-aligned coordinates exact
        if self.row_rotation == 0.0 && self.col_rotation == 0.0 {
            if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
                return (f64::NAN, f64::NAN);
            }
            return (dx / self.pixel_width, dy / self.pixel_height);
        }

        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-10 {
            // Degenerate transformation
            return (f64::NAN, f64::NAN);
        }

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Integer (row, col) of the cell containing a geographic point
    pub fn index(&self, x: f64, y: f64) -> (isize, isize) {
        let (col, row) = self.geo_to_pixel(x, y);
        (row.floor() as isize, col.floor() as isize)
    }

    /// Get the cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        self.extent(0.0, 0.0, width as f64, height as f64)
    }

    /// Pixel window covering `bounds`.
    ///
    /// The start offsets are floored and the stop offsets ceiled, so every
    /// cell the bounds touch is part of the window. Offsets may be negative
    /// or run past the raster; readers treat those cells as nodata.
    pub fn window_for_bounds(&self, bounds: &BoundingBox) -> Window {
        let corners = [
            self.geo_to_pixel(bounds.min_x, bounds.max_y),
            self.geo_to_pixel(bounds.max_x, bounds.max_y),
            self.geo_to_pixel(bounds.min_x, bounds.min_y),
            self.geo_to_pixel(bounds.max_x, bounds.min_y),
        ];

        let (mut col_min, mut col_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut row_min, mut row_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for (col, row) in corners {
            col_min = col_min.min(col);
            col_max = col_max.max(col);
            row_min = row_min.min(row);
            row_max = row_max.max(row);
        }

        if !(col_min.is_finite() && col_max.is_finite() && row_min.is_finite() && row_max.is_finite()) {
            return Window::new(0, 0, 0, 0);
        }

        let row_off = row_min.floor() as isize;
        let col_off = col_min.floor() as isize;
        let row_stop = row_max.ceil() as isize;
        let col_stop = col_max.ceil() as isize;

        Window::new(
            row_off,
            col_off,
            (row_stop - row_off).max(0) as usize,
            (col_stop - col_off).max(0) as usize,
        )
    }

    /// Transform of a window whose upper-left cell is `window`'s offset
    pub fn window_transform(&self, window: &Window) -> GeoTransform {
        let (x, y) = self.pixel_to_geo_f64(window.col_off as f64, window.row_off as f64);
        GeoTransform {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }

    /// World bounds of a window
    pub fn window_bounds(&self, window: &Window) -> BoundingBox {
        let c0 = window.col_off as f64;
        let r0 = window.row_off as f64;
        self.extent(c0, r0, c0 + window.cols as f64, r0 + window.rows as f64)
    }

    fn extent(&self, c0: f64, r0: f64, c1: f64, r1: f64) -> BoundingBox {
        let (x0, y0) = self.pixel_to_geo_f64(c0, r0);
        let (x1, y1) = self.pixel_to_geo_f64(c1, r0);
        let (x2, y2) = self.pixel_to_geo_f64(c0, r1);
        let (x3, y3) = self.pixel_to_geo_f64(c1, r1);

        BoundingBox::new(
            x0.min(x1).min(x2).min(x3),
            y0.min(y1).min(y2).min(y3),
            x0.max(x1).max(x2).max(x3),
            y0.max(y1).max(y2).max(y3),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_rotated_inverse() {
        let gt = GeoTransform::from_gdal([10.0, 2.0, 0.5, 50.0, 0.25, -2.0]);
        let (x, y) = gt.pixel_to_geo_f64(3.0, 4.0);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 3.0, epsilon = 1e-10);
        assert_relative_eq!(row, 4.0, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let bb = gt.bounds(100, 100);

        assert_relative_eq!(bb.min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(bb.min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(bb.max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(bb.max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_window_for_bounds_floors_and_ceils() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let w = gt.window_for_bounds(&BoundingBox::new(1.5, 2.2, 4.1, 8.0));
        assert_eq!(w, Window::new(2, 1, 6, 4));
    }

    #[test]
    fn test_window_for_bounds_outside_raster() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        let w = gt.window_for_bounds(&BoundingBox::new(-3.0, 11.0, -1.0, 12.0));
        assert_eq!(w, Window::new(-2, -3, 1, 2));
    }

    #[test]
    fn test_window_transform_and_bounds() {
        let gt = GeoTransform::new(0.0, 10.0, 2.0, -2.0);
        let w = Window::new(1, 2, 3, 4);
        let wt = gt.window_transform(&w);
        assert_relative_eq!(wt.origin_x, 4.0);
        assert_relative_eq!(wt.origin_y, 8.0);

        let bb = gt.window_bounds(&w);
        assert_relative_eq!(bb.min_x, 4.0);
        assert_relative_eq!(bb.max_x, 12.0);
        assert_relative_eq!(bb.min_y, 2.0);
        assert_relative_eq!(bb.max_y, 8.0);
    }

    #[test]
    fn test_index() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        assert_eq!(gt.index(2.5, 7.5), (2, 2));
        assert_eq!(gt.index(-0.5, 10.5), (-1, -1));
    }
}
