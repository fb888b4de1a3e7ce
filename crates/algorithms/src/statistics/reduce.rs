//! Statistics over one raster window
//!
//! A window is reduced to a [`PartialStats`]: the numeric building blocks of
//! every requested statistic plus the bookkeeping (cell count, weighted
//! count, latitude correction) needed to merge it with other windows of the
//! same feature.

use ndarray::{ArrayView2, ArrayViewMut2, Zip};
use std::collections::BTreeMap;
use std::sync::Arc;
use zonestat_core::{BoxError, Error, Result};

use super::record::{CategoryKey, StatValue};
use super::stat::Stat;

/// A caller-supplied statistic, computed from the masked window
pub type Reducer = Arc<dyn Fn(&MaskedWindow<'_>) -> std::result::Result<StatValue, BoxError> + Send + Sync>;

/// A caller-supplied transform applied in place to each window's values
/// before any statistic is computed; the mask marks the cells in the zone.
pub type ZoneFn = Arc<dyn Fn(ArrayViewMut2<'_, f64>, ArrayView2<'_, bool>) + Send + Sync>;

/// Window values with the cells that belong to the zone.
///
/// Cells outside the geometry, nodata cells and NaN cells are hidden.
#[derive(Debug, Clone, Copy)]
pub struct MaskedWindow<'a> {
    data: ArrayView2<'a, f64>,
    valid: ArrayView2<'a, bool>,
}

impl<'a> MaskedWindow<'a> {
    pub fn new(data: ArrayView2<'a, f64>, valid: ArrayView2<'a, bool>) -> Self {
        Self { data, valid }
    }

    /// All window values, hidden cells included
    pub fn data(&self) -> ArrayView2<'a, f64> {
        self.data
    }

    /// `true` for cells in the zone
    pub fn mask(&self) -> ArrayView2<'a, bool> {
        self.valid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Number of visible cells
    pub fn count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Visible values, row-major
    pub fn iter(&self) -> impl Iterator<Item = f64> + 'a {
        let valid = self.valid;
        self.data
            .into_iter()
            .zip(valid)
            .filter_map(|(&v, &keep)| keep.then_some(v))
    }

    /// Visible values collected into a vector
    pub fn compressed(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

/// Cells in the geometry that hold neither nodata nor NaN
pub fn valid_mask(
    data: ArrayView2<'_, f64>,
    nodata: f64,
    geom_mask: ArrayView2<'_, bool>,
) -> ndarray::Array2<bool> {
    Zip::from(&data)
        .and(&geom_mask)
        .map_collect(|&v, &inside| inside && v != nodata && !v.is_nan())
}

/// Occurrences of one raster value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bin {
    /// Number of cells
    pub count: u64,
    /// Sum of the cells' coverage weights (equals `count` when unweighted)
    pub weight: f64,
}

/// Everything known about one window of a feature.
///
/// Fields for statistics that were not requested stay at their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialStats {
    /// Number of included cells
    pub cells: u64,
    /// Cells covered by the geometry, nodata and NaN included
    pub zone_cells: u64,
    /// Included cells, weighted by coverage when weighting is on
    pub count: f64,
    pub sum: Option<f64>,
    pub mean: Option<f64>,
    /// Latitude-weighted count divided by `count`
    pub latitude_correction: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub majority: Option<f64>,
    pub minority: Option<f64>,
    pub unique: Option<usize>,
    /// One entry per requested percentile, in request order
    pub percentiles: Vec<Option<f64>>,
    /// Nodata cells inside the geometry
    pub nodata: f64,
    /// NaN cells inside the geometry
    pub nan: f64,
    pub histogram: BTreeMap<CategoryKey, Bin>,
    /// One entry per custom reducer, in registration order
    pub custom: Vec<StatValue>,
}

impl PartialStats {
    /// Record for a feature that contributed no cells
    pub fn empty(stats: &[Stat], reducers: usize) -> Self {
        let percentiles = stats
            .iter()
            .filter(|s| matches!(s, Stat::Percentile { .. }))
            .count();
        Self {
            percentiles: vec![None; percentiles],
            custom: vec![StatValue::Null; reducers],
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells == 0
    }
}

/// What to compute for a window
#[derive(Clone, Copy)]
pub struct ReduceOptions<'a> {
    pub stats: &'a [Stat],
    pub categorical: bool,
    pub reducers: &'a [(String, Reducer)],
}

impl ReduceOptions<'_> {
    fn wants(&self, stat: &Stat) -> bool {
        self.stats.contains(stat)
    }

    fn wants_any(&self, stats: &[Stat]) -> bool {
        stats.iter().any(|s| self.wants(s))
    }

    fn needs_histogram(&self) -> bool {
        self.categorical || self.stats.iter().any(Stat::needs_histogram)
    }
}

/// One window ready for reduction
#[derive(Debug, Clone, Copy)]
pub struct WindowInput<'a> {
    /// Window values (after any zone function)
    pub data: ArrayView2<'a, f64>,
    pub nodata: f64,
    /// Cells covered by the geometry
    pub geom_mask: ArrayView2<'a, bool>,
    /// Cells included in the statistics, see [`valid_mask`]
    pub valid: ArrayView2<'a, bool>,
    /// Fractional coverage per cell, when coverage weighting is on
    pub weights: Option<ArrayView2<'a, f64>>,
    /// Latitude scale per row, when latitude correction is on
    pub latitude_scales: Option<&'a [f64]>,
}

/// Reduce one window to its partial statistics
pub fn reduce_window(input: &WindowInput<'_>, opts: &ReduceOptions<'_>) -> Result<PartialStats> {
    let mut part = PartialStats::empty(opts.stats, opts.reducers.len());
    part.zone_cells = input.geom_mask.iter().filter(|&&inside| inside).count() as u64;

    if opts.wants_any(&[Stat::Nodata, Stat::Nan]) {
        Zip::from(&input.data).and(&input.geom_mask).for_each(|&v, &inside| {
            if inside {
                if v == input.nodata {
                    part.nodata += 1.0;
                }
                if v.is_nan() {
                    part.nan += 1.0;
                }
            }
        });
    }

    let masked = MaskedWindow::new(input.data, input.valid);
    let cells = masked.count();
    part.cells = cells as u64;

    if cells > 0 {
        fill_numeric(&mut part, input, opts, &masked);
    }

    for (i, (name, reducer)) in opts.reducers.iter().enumerate() {
        part.custom[i] = reducer(&masked).map_err(|source| Error::Reducer {
            name: name.clone(),
            source,
        })?;
    }

    Ok(part)
}

/// Weight of cell (r, c); 1 when unweighted
fn weight_at(weights: Option<ArrayView2<'_, f64>>, r: usize, c: usize) -> f64 {
    weights.map_or(1.0, |w| w[(r, c)])
}

fn fill_numeric(
    part: &mut PartialStats,
    input: &WindowInput<'_>,
    opts: &ReduceOptions<'_>,
    masked: &MaskedWindow<'_>,
) {
    let weights = input.weights;
    let included = || {
        input
            .data
            .indexed_iter()
            .filter(|&(idx, _)| input.valid[idx])
            .map(|((r, c), &v)| (r, c, v))
    };

    part.count = match weights {
        Some(_) => included().map(|(r, c, _)| weight_at(weights, r, c)).sum(),
        None => part.cells as f64,
    };

    if opts.wants(&Stat::Sum) {
        part.sum = Some(included().map(|(r, c, v)| v * weight_at(weights, r, c)).sum());
    }

    if opts.wants(&Stat::Mean) {
        match input.latitude_scales {
            Some(lat) => {
                let (num, den) = included().fold((0.0, 0.0), |(num, den), (r, c, v)| {
                    let w = lat[r] * weight_at(weights, r, c);
                    (num + v * w, den + w)
                });
                part.mean = Some(num / den);
                part.latitude_correction = Some(den / part.count);
            }
            None => {
                let num: f64 = included().map(|(r, c, v)| v * weight_at(weights, r, c)).sum();
                part.mean = Some(num / part.count);
            }
        }
    }

    if opts.wants_any(&[Stat::Min, Stat::Max, Stat::Range]) {
        let (min, max) = masked
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        part.min = Some(min);
        part.max = Some(max);
    }

    if opts.wants(&Stat::Std) {
        let n = part.cells as f64;
        let mean = masked.iter().sum::<f64>() / n;
        let var = masked.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        part.std = Some(var.sqrt());
    }

    let wants_order = opts.wants(&Stat::Median) || !part.percentiles.is_empty();
    if wants_order {
        let mut sorted = masked.compressed();
        sorted.sort_by(f64::total_cmp);
        if opts.wants(&Stat::Median) {
            part.median = Some(percentile(&sorted, 50.0));
        }
        let qs = opts.stats.iter().filter_map(|s| match s {
            Stat::Percentile { q, .. } => Some(*q),
            _ => None,
        });
        for (slot, q) in part.percentiles.iter_mut().zip(qs) {
            *slot = Some(percentile(&sorted, q));
        }
    }

    if opts.needs_histogram() {
        for (r, c, v) in included() {
            let bin = part.histogram.entry(CategoryKey::from(v)).or_default();
            bin.count += 1;
            bin.weight += weight_at(weights, r, c);
        }
        part.majority = majority(&part.histogram);
        part.minority = minority(&part.histogram);
        part.unique = Some(part.histogram.len());
    }
}

/// Linear-interpolated percentile of sorted values, `q` in [0, 100]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q / 100.0 * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (pos.ceil() as usize).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Most frequent value; the lowest value wins ties
pub fn majority(histogram: &BTreeMap<CategoryKey, Bin>) -> Option<f64> {
    let mut best: Option<(f64, u64)> = None;
    for (key, bin) in histogram {
        if best.is_none_or(|(_, n)| bin.count > n) {
            best = Some((key.0, bin.count));
        }
    }
    best.map(|(v, _)| v)
}

/// Least frequent value; the lowest value wins ties
pub fn minority(histogram: &BTreeMap<CategoryKey, Bin>) -> Option<f64> {
    let mut best: Option<(f64, u64)> = None;
    for (key, bin) in histogram {
        if best.is_none_or(|(_, n)| bin.count < n) {
            best = Some((key.0, bin.count));
        }
    }
    best.map(|(v, _)| v)
}
