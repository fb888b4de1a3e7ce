//! Grid-aligned splitting of oversized geometries
//!
//! Bounds the number of cells read per window: a geometry whose bounding
//! box spans more than `limit` cells is cut into quadrants along grid lines
//! until every piece fits. Pieces are plain boxes; the full geometry is
//! rasterized against each piece's window later.

use geo::{Geometry, Intersects, Rect};
use tracing::debug;
use zonestat_core::BoundingBox;

use crate::grid::round_to_grid;

/// Fraction of a pixel left between the two sides of a split line
const SPLIT_GAP: f64 = 1e-7;

/// Number of cells a box spans, as a real number
pub fn pixel_count(bbox: &BoundingBox, pixel_size: f64) -> f64 {
    (bbox.width() / pixel_size) * (bbox.height() / pixel_size)
}

/// Split `geom` into boxes of at most `limit` cells each.
///
/// Split lines are snapped to cell edges of the grid anchored at `origin`
/// (upper-left corner). Pieces on either side of a split line are pulled
/// apart by a tiny fraction of a pixel so that no cell is read twice.
/// Pieces that are degenerate or do not intersect the geometry are dropped.
/// A geometry that already fits yields its own bounding box.
pub fn split_geometry(
    geom: &Geometry<f64>,
    limit: usize,
    pixel_size: f64,
    origin: (f64, f64),
) -> Vec<Rect<f64>> {
    let Some(bbox) = BoundingBox::of(geom) else {
        return Vec::new();
    };

    let pixel = pixel_size.abs();
    let gap = pixel * SPLIT_GAP;
    let mut leaves = Vec::new();
    let mut stack = vec![bbox];

    while let Some(b) = stack.pop() {
        if pixel_count(&b, pixel) <= limit as f64 {
            leaves.push(b.to_rect());
            continue;
        }

        let (mx, my) = round_to_grid(b.center(), origin, pixel);
        let xs: Vec<(f64, f64)> = if b.min_x < mx && mx < b.max_x {
            vec![(b.min_x, mx - gap), (mx + gap, b.max_x)]
        } else {
            vec![(b.min_x, b.max_x)]
        };
        let ys: Vec<(f64, f64)> = if b.min_y < my && my < b.max_y {
            vec![(my + gap, b.max_y), (b.min_y, my - gap)]
        } else {
            vec![(b.min_y, b.max_y)]
        };

        if xs.len() == 1 && ys.len() == 1 {
            // no grid line falls inside the box
            leaves.push(b.to_rect());
            continue;
        }

        // pushed in reverse so pieces come out top-left first
        for &(y0, y1) in ys.iter().rev() {
            for &(x0, x1) in xs.iter().rev() {
                let piece = BoundingBox::new(x0, y0, x1, y1);
                if !piece.is_degenerate() && geom.intersects(&piece.to_rect()) {
                    stack.push(piece);
                }
            }
        }
    }

    debug!(pieces = leaves.len(), limit, "split geometry");
    leaves
}
