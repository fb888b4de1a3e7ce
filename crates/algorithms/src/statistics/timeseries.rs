//! Zonal series over a raster time stack
//!
//! The first time slice goes through [`zonal_stats`](super::zonal_stats)
//! with coverage weighting and `raster_out`. Every slice is then read through
//! the window each feature was reduced over and summed with that feature's
//! geometry mask and cover weights, giving one value per time step.

use ndarray::ArrayView3;
use tracing::debug;
use zonestat_core::{Error, GeoTransform, IntoFeature, MemorySource, Raster, Result};

use super::zonal::{MiniRaster, ZonalParams, collect_zonal_stats};

/// Reduction applied at every time step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeseriesMethod {
    /// Σ value · coverage
    #[default]
    Sum,
    /// Σ value · coverage / Σ coverage
    Mean,
}

/// One series per feature over a `(time, rows, cols)` stack.
///
/// A step is `None` when no cell under the geometry holds data at that
/// step; cells equal to `nodata` or NaN are skipped per step. `params`
/// applies as given except that `raster_out` and `percent_cover_weighting`
/// are switched on, so it cannot carry a `limit`. A zone function only
/// affects the first slice's statistics, not the series.
pub fn zonal_stats_timeseries<I>(
    features: I,
    stack: ArrayView3<'_, f64>,
    transform: GeoTransform,
    nodata: f64,
    method: TimeseriesMethod,
    params: &ZonalParams,
) -> Result<Vec<Vec<Option<f64>>>>
where
    I: IntoIterator,
    I::Item: IntoFeature,
{
    let (steps, rows, cols) = stack.dim();
    if steps == 0 || rows == 0 || cols == 0 {
        return Err(Error::InvalidParameter {
            name: "stack",
            value: format!("{steps}x{rows}x{cols}"),
            reason: "needs at least one time step and one cell".into(),
        });
    }

    let slices: Vec<Raster<f64>> = stack
        .outer_iter()
        .map(|slice| Raster::from_array(slice.to_owned()).with_transform(transform))
        .collect();
    let source = MemorySource::from_bands(slices, 1, Some(nodata))?;

    let params = ZonalParams {
        raster_out: true,
        percent_cover_weighting: true,
        ..params.clone()
    };
    let outputs = collect_zonal_stats(features, &source, &params)?;
    debug!(features = outputs.len(), steps, "reducing time stack");

    outputs
        .iter()
        .map(|out| match &out.mini_raster {
            Some(mini) => series(mini, source.bands(), &transform, method),
            None => Ok(vec![None; steps]),
        })
        .collect()
}

/// Reduce every slice over one feature's window
fn series(
    mini: &MiniRaster,
    slices: &[Raster<f64>],
    transform: &GeoTransform,
    method: TimeseriesMethod,
) -> Result<Vec<Option<f64>>> {
    let window = transform.window_for_bounds(&mini.sub_geom_bounds);
    let (er, ec) = mini.geom_mask.dim();

    slices
        .iter()
        .map(|slice| {
            let data = slice.read_window_f64(&window, mini.nodata);
            let (ar, ac) = data.dim();
            if (ar, ac) != (er, ec) {
                return Err(Error::SizeMismatch { er, ec, ar, ac });
            }

            let (mut total, mut weight) = (0.0, 0.0);
            for ((idx, &v), &inside) in data.indexed_iter().zip(&mini.geom_mask) {
                if !inside || v == mini.nodata || v.is_nan() {
                    continue;
                }
                let w = mini.cover_weights.as_ref().map_or(1.0, |cw| cw[idx]);
                total += v * w;
                weight += w;
            }

            Ok((weight > 0.0).then(|| match method {
                TimeseriesMethod::Sum => total,
                TimeseriesMethod::Mean => total / weight,
            }))
        })
        .collect()
}
