//! Coverage rasterization of vector geometries onto a window grid
//!
//! Geometries are moved into pixel space (column, row as fractional
//! coordinates) and burned there:
//!
//! - polygons fill every cell whose centre lies inside (even-odd rule, holes
//!   respected); with `all_touched` every cell whose interior the boundary
//!   crosses is added as well
//! - lines burn every cell they pass through
//! - points burn the cell that contains them
//!
//! Fractional coverage rasterizes at `scale`x resolution and sums the
//! sub-cells back onto the window grid.

use geo::{Coord, Geometry, LineString, MapCoords, MultiPolygon, Polygon};
use ndarray::{Array2, ArrayView2};
use num_traits::Zero;
use std::ops::Add;
use zonestat_core::{Error, GeoTransform, Result, Window};

/// Boolean coverage mask of `geom` on a window grid.
///
/// Without `all_touched` a cell is set when its centre is inside the
/// geometry; with it, any cell the geometry touches is set.
pub fn rasterize(
    geom: &Geometry<f64>,
    shape: (usize, usize),
    transform: &GeoTransform,
    all_touched: bool,
) -> Array2<bool> {
    let mut mask = Array2::from_elem(shape, false);
    let pixel_geom = to_pixel_space(geom, transform, 1.0);
    burn(&pixel_geom, &mut mask, all_touched);
    mask
}

/// Fractional coverage of each cell, in [0, 1].
///
/// The geometry is rasterized on a grid `scale` times finer along each axis,
/// then every `scale x scale` block is summed and divided by `scale²`.
pub fn rasterize_percent_cover(
    geom: &Geometry<f64>,
    shape: (usize, usize),
    transform: &GeoTransform,
    scale: usize,
    all_touched: bool,
) -> Result<Array2<f64>> {
    if scale == 0 {
        return Err(Error::InvalidParameter {
            name: "percent_cover_scale",
            value: scale.to_string(),
            reason: "must be positive".into(),
        });
    }

    let (rows, cols) = shape;
    let mut fine = Array2::from_elem((rows * scale, cols * scale), false);
    let pixel_geom = to_pixel_space(geom, transform, scale as f64);
    burn(&pixel_geom, &mut fine, all_touched);

    let counts = rebin_sum(&fine.mapv(u32::from), shape)?;
    let cells = (scale * scale) as f64;
    Ok(counts.mapv(|c| c as f64 / cells))
}

/// Sum non-overlapping blocks of `a` down to `shape`.
///
/// Each dimension of `a` must be a whole multiple of the target dimension.
pub fn rebin_sum<T>(a: &Array2<T>, shape: (usize, usize)) -> Result<Array2<T>>
where
    T: Copy + Zero + Add<Output = T>,
{
    let (rows, cols) = a.dim();
    let (out_rows, out_cols) = shape;
    if out_rows == 0 || out_cols == 0 {
        return Ok(Array2::zeros(shape));
    }
    if rows % out_rows != 0 || cols % out_cols != 0 {
        return Err(Error::SizeMismatch { er: out_rows, ec: out_cols, ar: rows, ac: cols });
    }

    let block = (rows / out_rows, cols / out_cols);
    let sums: Vec<T> = a.exact_chunks(block).into_iter().map(|c| c.sum()).collect();
    Array2::from_shape_vec(shape, sums).map_err(|e| Error::Other(e.to_string()))
}

/// Replace points with boxes 99% the size of the cell that contains them.
///
/// Accepts `Point` and `MultiPoint`; anything else is an error.
pub fn boxify_points(geom: &Geometry<f64>, transform: &GeoTransform) -> Result<Geometry<f64>> {
    let points: Vec<Coord<f64>> = match geom {
        Geometry::Point(p) => vec![p.0],
        Geometry::MultiPoint(mp) => mp.iter().map(|p| p.0).collect(),
        _ => return Err(Error::Algorithm("Points or multipoints only".into())),
    };

    let inset = 0.01 * transform.pixel_width.abs().min(transform.pixel_height.abs());
    let boxes: Vec<Polygon<f64>> = points
        .into_iter()
        .map(|c| {
            let (row, col) = transform.index(c.x, c.y);
            transform
                .window_bounds(&Window::new(row, col, 1, 1))
                .inset(inset)
                .to_polygon()
        })
        .collect();

    Ok(Geometry::MultiPolygon(MultiPolygon::new(boxes)))
}

/// Whether a geometry is a `Point` or `MultiPoint`
pub fn is_point_like(geom: &Geometry<f64>) -> bool {
    matches!(geom, Geometry::Point(_) | Geometry::MultiPoint(_))
}

fn to_pixel_space(geom: &Geometry<f64>, transform: &GeoTransform, scale: f64) -> Geometry<f64> {
    geom.map_coords(|c| {
        let (col, row) = transform.geo_to_pixel(c.x, c.y);
        Coord { x: col * scale, y: row * scale }
    })
}

fn burn(geom: &Geometry<f64>, mask: &mut Array2<bool>, all_touched: bool) {
    match geom {
        Geometry::Point(p) => burn_point(p.0, mask),
        Geometry::MultiPoint(mp) => mp.iter().for_each(|p| burn_point(p.0, mask)),
        Geometry::Line(l) => burn_segment(l.start, l.end, mask, false),
        Geometry::LineString(ls) => burn_linestring(ls, mask),
        Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| burn_linestring(ls, mask)),
        Geometry::Polygon(p) => burn_polygon(p, mask, all_touched),
        Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| burn_polygon(p, mask, all_touched)),
        Geometry::Rect(r) => burn_polygon(&r.to_polygon(), mask, all_touched),
        Geometry::Triangle(t) => burn_polygon(&t.to_polygon(), mask, all_touched),
        Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| burn(g, mask, all_touched)),
    }
}

fn burn_point(c: Coord<f64>, mask: &mut Array2<bool>) {
    let (rows, cols) = mask.dim();
    let (row, col) = (c.y.floor(), c.x.floor());
    if row >= 0.0 && col >= 0.0 && (row as usize) < rows && (col as usize) < cols {
        mask[(row as usize, col as usize)] = true;
    }
}

fn burn_linestring(ls: &LineString<f64>, mask: &mut Array2<bool>) {
    if ls.0.len() == 1 {
        burn_point(ls.0[0], mask);
    }
    for line in ls.lines() {
        burn_segment(line.start, line.end, mask, false);
    }
}

/// Fill by cell centre, then optionally add every cell the rings cross
fn burn_polygon(poly: &Polygon<f64>, mask: &mut Array2<bool>, all_touched: bool) {
    let (rows, cols) = mask.dim();
    if rows == 0 || cols == 0 {
        return;
    }

    let rings = std::iter::once(poly.exterior()).chain(poly.interiors());

    // x positions where ring edges cross each row's centre line
    let mut crossings: Vec<Vec<f64>> = vec![Vec::new(); rows];
    for ring in rings.clone() {
        for line in ring.lines() {
            let (a, b) = (line.start, line.end);
            if a.y == b.y {
                continue;
            }
            let (lo, hi) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
            // centres yc = r + 0.5 with lo <= yc < hi
            let r0 = (lo - 0.5).ceil().max(0.0);
            let r1 = ((hi - 0.5).ceil() - 1.0).min(rows as f64 - 1.0);
            if !(r0 <= r1) {
                continue;
            }
            for r in r0 as usize..=r1 as usize {
                let yc = r as f64 + 0.5;
                crossings[r].push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
    }

    for (r, xs) in crossings.iter_mut().enumerate() {
        xs.sort_by(f64::total_cmp);
        for pair in xs.chunks_exact(2) {
            // centres xc = c + 0.5 with xa <= xc < xb
            let c0 = (pair[0] - 0.5).ceil().max(0.0);
            let c1 = ((pair[1] - 0.5).ceil() - 1.0).min(cols as f64 - 1.0);
            if c0 <= c1 {
                for c in c0 as usize..=c1 as usize {
                    mask[(r, c)] = true;
                }
            }
        }
    }

    if all_touched {
        for ring in rings {
            for line in ring.lines() {
                burn_segment(line.start, line.end, mask, true);
            }
        }
    }
}

/// Cells whose span along one axis meets `[lo, hi]`, as an inclusive range.
///
/// With `open` a cell counts only if the interval reaches its interior, so
/// edges lying exactly on grid lines touch nothing. Otherwise cells are
/// half-open `[i, i + 1)`, except that a non-degenerate interval ending
/// exactly on a grid line does not claim the next cell.
fn touched_range(lo: f64, hi: f64, open: bool) -> Option<(f64, f64)> {
    if lo == hi {
        if open && lo.fract() == 0.0 {
            return None;
        }
        return Some((lo.floor(), lo.floor()));
    }
    let first = lo.floor();
    let last = if open || hi.fract() == 0.0 { hi.ceil() - 1.0 } else { hi.floor() };
    (first <= last).then_some((first, last))
}

/// Burn the cells a segment passes through
fn burn_segment(a: Coord<f64>, b: Coord<f64>, mask: &mut Array2<bool>, open: bool) {
    let (rows, cols) = mask.dim();
    if rows == 0 || cols == 0 || !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return;
    }

    let (y_lo, y_hi) = (a.y.min(b.y), a.y.max(b.y));
    let Some((r0, r1)) = touched_range(y_lo, y_hi, open) else {
        return;
    };
    let r0 = r0.max(0.0);
    let r1 = r1.min(rows as f64 - 1.0);
    if r0 > r1 {
        return;
    }

    let x_at = |y: f64| {
        if a.y == b.y {
            a.x
        } else {
            a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y)
        }
    };

    for r in r0 as usize..=r1 as usize {
        // part of the segment inside this row band
        let (xa, xb) = if a.y == b.y {
            (a.x.min(b.x), a.x.max(b.x))
        } else {
            let ya = y_lo.max(r as f64);
            let yb = y_hi.min(r as f64 + 1.0);
            let (x0, x1) = (x_at(ya), x_at(yb));
            (x0.min(x1), x0.max(x1))
        };

        if let Some((c0, c1)) = touched_range(xa, xb, open) {
            let c0 = c0.max(0.0);
            let c1 = c1.min(cols as f64 - 1.0);
            if c0 <= c1 {
                for c in c0 as usize..=c1 as usize {
                    mask[(r, c)] = true;
                }
            }
        }
    }
}

/// Number of cells set in a mask
pub fn mask_count(mask: ArrayView2<'_, bool>) -> usize {
    mask.iter().filter(|&&m| m).count()
}
