//! Zonal statistics of vector features over a raster band
//!
//! For every feature the raster window under the geometry is read, a
//! coverage mask is burned onto it and the covered cells are reduced to the
//! requested statistics. Oversized geometries can be split into grid-aligned
//! pieces (see [`crate::split`]); each piece is reduced on its own window and
//! the results are merged, giving the same answer as a single read.
//!
//! Results are produced lazily by [`ZonalStatsIter`], one per input feature.

use geo::{Geometry, Polygon};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use zonestat_core::{
    Algorithm, BoundingBox, BoxError, Error, Feature, GeoTransform, IntoFeature, RasterSource,
    Result,
};

use super::aggregate::RecordSpec;
use super::record::{CategoryKey, StatRecord, StatValue};
use super::reduce::{
    MaskedWindow, PartialStats, ReduceOptions, Reducer, WindowInput, ZoneFn, reduce_window,
    valid_mask,
};
use super::stat::{Stat, check_stats, parse_stat_list};
use crate::grid::{pixel_size, row_latitude_scales, window_origin};
use crate::maybe_rayon::*;
use crate::rasterize::{boxify_points, is_point_like, rasterize, rasterize_percent_cover};
use crate::split::split_geometry;

/// Oversampling used for percent cover when no scale is given
pub const DEFAULT_PERCENT_COVER_SCALE: usize = 10;

/// Options for [`zonal_stats`]
#[derive(Clone, Default)]
pub struct ZonalParams {
    /// Statistic names; `None` selects the defaults
    pub stats: Option<Vec<String>>,
    /// Include every cell the geometry touches, not only those whose centre
    /// falls inside it
    pub all_touched: bool,
    /// Weight the mean by the true width of each row on a geographic grid
    pub latitude_correction: bool,
    /// Weight statistics by the fraction of each cell the geometry covers
    pub percent_cover_weighting: bool,
    /// Oversampling per axis used to estimate cell coverage; must exceed 1
    pub percent_cover_scale: Option<usize>,
    /// Only include cells whose coverage exceeds this fraction
    pub percent_cover_selection: Option<f64>,
    /// Split geometries spanning more than this many cells; 0 disables
    pub limit: Option<usize>,
    /// Report a histogram of cell values instead of summary statistics
    pub categorical: bool,
    /// Labels for histogram keys in categorical mode
    pub category_map: Option<BTreeMap<CategoryKey, String>>,
    /// Extra statistics computed by caller-supplied reducers
    pub add_stats: Vec<(String, Reducer)>,
    /// Applied in place to each window before any statistic
    pub zone_fn: Option<ZoneFn>,
    /// Return the masked window alongside the statistics
    pub raster_out: bool,
    /// Prepended to every output key
    pub prefix: Option<String>,
    /// Return each feature with the statistics merged into its properties
    pub geojson_out: bool,
}

impl ZonalParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request statistics from a space-delimited list such as `"min max"`
    pub fn with_stats(mut self, stats: &str) -> Self {
        self.stats = Some(parse_stat_list(stats));
        self
    }

    /// Register a custom statistic under `name`
    pub fn add_stat<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&MaskedWindow<'_>) -> std::result::Result<StatValue, BoxError> + Send + Sync + 'static,
    {
        self.add_stats.push((name.into(), Arc::new(f)));
        self
    }

    /// Set a transform run on each window's values before reduction
    pub fn with_zone_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(ArrayViewMut2<'_, f64>, ArrayView2<'_, bool>) + Send + Sync + 'static,
    {
        self.zone_fn = Some(Arc::new(f));
        self
    }

    /// Check every option and resolve defaults.
    ///
    /// Runs before any raster access. Fails on unknown statistic names,
    /// malformed percentiles, a percent cover scale of 1 or less, and on
    /// `limit` combined with statistics or outputs that need a single
    /// unsplit window.
    pub fn validate(&self) -> Result<ZonalPlan> {
        let stats = check_stats(self.stats.as_deref(), self.categorical)?;
        let limit = self.limit.filter(|&l| l > 0);

        if limit.is_some() {
            let mut offending: Vec<String> = stats
                .iter()
                .filter(|s| !s.is_mergeable())
                .map(|s| s.name().to_string())
                .collect();
            if !self.add_stats.is_empty() {
                offending.push("add_stats".into());
            }
            if self.raster_out {
                offending.push("raster_out".into());
            }
            if !offending.is_empty() {
                return Err(Error::IncompatibleOptions(format!(
                    "cannot use `limit` to split geometries together with {}",
                    offending.join(", ")
                )));
            }
        }

        if let Some(selection) = self.percent_cover_selection.filter(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "percent_cover_selection",
                value: selection.to_string(),
                reason: "must be a finite coverage fraction".into(),
            });
        }

        let cover = if self.percent_cover_weighting || self.percent_cover_selection.is_some() {
            let scale = match self.percent_cover_scale {
                None => {
                    warn!(
                        "No value for `percent_cover_scale` was given, using default of {DEFAULT_PERCENT_COVER_SCALE}"
                    );
                    DEFAULT_PERCENT_COVER_SCALE
                }
                Some(s) if s <= 1 => {
                    return Err(Error::InvalidParameter {
                        name: "percent_cover_scale",
                        value: s.to_string(),
                        reason: "must be greater than one".into(),
                    });
                }
                Some(s) => s,
            };
            if scale > 1000 {
                warn!(
                    scale,
                    "`percent_cover_scale` over 1000 is much slower with little gain in accuracy; 10 is usually enough"
                );
            }
            if !self.all_touched {
                warn!("percent cover is enabled without `all_touched`; enabling `all_touched` is recommended");
            }
            Some(CoverPlan {
                scale,
                selection: self.percent_cover_selection.unwrap_or(0.0),
                weighting: self.percent_cover_weighting,
            })
        } else {
            None
        };

        let latitude_correction = self.latitude_correction && stats.contains(&Stat::Mean);
        if self.latitude_correction && !latitude_correction {
            warn!("`latitude_correction` only applies to `mean`, which was not requested");
        }

        Ok(ZonalPlan {
            reducer_names: self.add_stats.iter().map(|(n, _)| n.clone()).collect(),
            stats,
            limit,
            cover,
            latitude_correction,
            params: self.clone(),
        })
    }
}

impl fmt::Debug for ZonalParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reducers: Vec<&str> = self.add_stats.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("ZonalParams")
            .field("stats", &self.stats)
            .field("all_touched", &self.all_touched)
            .field("latitude_correction", &self.latitude_correction)
            .field("percent_cover_weighting", &self.percent_cover_weighting)
            .field("percent_cover_scale", &self.percent_cover_scale)
            .field("percent_cover_selection", &self.percent_cover_selection)
            .field("limit", &self.limit)
            .field("categorical", &self.categorical)
            .field("category_map", &self.category_map)
            .field("add_stats", &reducers)
            .field("zone_fn", &self.zone_fn.is_some())
            .field("raster_out", &self.raster_out)
            .field("prefix", &self.prefix)
            .field("geojson_out", &self.geojson_out)
            .finish()
    }
}

/// Resolved percent cover settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverPlan {
    pub scale: usize,
    /// Cells must be covered by more than this fraction
    pub selection: f64,
    pub weighting: bool,
}

/// Validated options, ready to run
#[derive(Debug, Clone)]
pub struct ZonalPlan {
    pub stats: Vec<Stat>,
    /// Pixel limit, `None` when splitting is off
    pub limit: Option<usize>,
    pub cover: Option<CoverPlan>,
    /// Latitude correction applies (it only affects the mean)
    pub latitude_correction: bool,
    pub reducer_names: Vec<String>,
    params: ZonalParams,
}

impl ZonalPlan {
    pub fn params(&self) -> &ZonalParams {
        &self.params
    }

    fn reduce_options(&self) -> ReduceOptions<'_> {
        ReduceOptions {
            stats: &self.stats,
            categorical: self.params.categorical,
            reducers: &self.params.add_stats,
        }
    }
}

/// The masked window a feature was reduced over
#[derive(Debug, Clone)]
pub struct MiniRaster {
    /// Window values after any zone function
    pub array: Array2<f64>,
    /// `true` for cells that entered the statistics
    pub mask: Array2<bool>,
    /// `true` for cells covered by the geometry, whatever their value
    pub geom_mask: Array2<bool>,
    pub transform: GeoTransform,
    pub nodata: f64,
    /// Fractional coverage, present when percent cover was computed
    pub cover_weights: Option<Array2<f64>>,
    /// Box the window was read for
    pub sub_geom_box: Polygon<f64>,
    pub sub_geom_bounds: BoundingBox,
    pub band: usize,
    /// Nodata value given by the caller, if any
    pub nodata_override: Option<f64>,
}

impl MiniRaster {
    /// The window as seen by custom reducers
    pub fn masked(&self) -> MaskedWindow<'_> {
        MaskedWindow::new(self.array.view(), self.mask.view())
    }
}

/// Result for one feature
#[derive(Debug, Clone)]
pub struct ZonalOutput {
    pub stats: StatRecord,
    /// Present with `raster_out`
    pub mini_raster: Option<MiniRaster>,
    /// Present with `geojson_out`: the input feature with `stats` merged
    /// into its properties
    pub feature: Option<Feature>,
}

/// Lazy sequence of per-feature results.
///
/// Each call to `next` reads and reduces one feature. The first error ends
/// the sequence.
pub struct ZonalStatsIter<I, S> {
    features: I,
    source: S,
    plan: ZonalPlan,
    done: bool,
}

impl<I, S> ZonalStatsIter<I, S> {
    pub fn plan(&self) -> &ZonalPlan {
        &self.plan
    }
}

impl<I, S> Iterator for ZonalStatsIter<I, S>
where
    I: Iterator,
    I::Item: IntoFeature,
    S: RasterSource,
{
    type Item = Result<ZonalOutput>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.features.next()?;
        let result = item
            .into_feature()
            .and_then(|feature| process_feature(&self.plan, &self.source, feature));
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// Zonal statistics for each feature, computed lazily.
///
/// Options are validated up front; an invalid configuration fails here
/// before any raster read.
pub fn zonal_stats<I, S>(features: I, source: S, params: &ZonalParams) -> Result<ZonalStatsIter<I::IntoIter, S>>
where
    I: IntoIterator,
    I::Item: IntoFeature,
    S: RasterSource,
{
    let plan = params.validate()?;
    Ok(ZonalStatsIter {
        features: features.into_iter(),
        source,
        plan,
        done: false,
    })
}

/// Like [`zonal_stats`], collected into a vector
pub fn collect_zonal_stats<I, S>(features: I, source: S, params: &ZonalParams) -> Result<Vec<ZonalOutput>>
where
    I: IntoIterator,
    I::Item: IntoFeature,
    S: RasterSource,
{
    zonal_stats(features, source, params)?.collect()
}

/// Zonal statistics with features processed on worker threads.
///
/// Output order follows input order. Without the `parallel` feature this
/// runs sequentially.
pub fn zonal_stats_par<S>(features: Vec<Feature>, source: &S, params: &ZonalParams) -> Result<Vec<ZonalOutput>>
where
    S: RasterSource + Sync,
{
    let plan = params.validate()?;
    features
        .into_par_iter()
        .map(|feature| process_feature(&plan, source, feature))
        .collect()
}

/// Zonal statistics as an [`Algorithm`] bound to one raster source
#[derive(Debug, Clone)]
pub struct ZonalStatistics<S> {
    pub source: S,
}

impl<S> ZonalStatistics<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: RasterSource> Algorithm for ZonalStatistics<S> {
    type Input = Vec<Feature>;
    type Output = Vec<ZonalOutput>;
    type Params = ZonalParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ZonalStatistics"
    }

    fn description(&self) -> &'static str {
        "Summarize raster values inside each vector feature"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        collect_zonal_stats(input, &self.source, &params)
    }
}

/// Read, mask and reduce one feature
fn process_feature<S: RasterSource>(plan: &ZonalPlan, source: &S, mut feature: Feature) -> Result<ZonalOutput> {
    let params = &plan.params;
    let mut weighted = false;
    let mut mini_raster = None;

    let partial = match feature.geometry.as_ref() {
        None => PartialStats::empty(&plan.stats, params.add_stats.len()),
        Some(geom) => {
            let boxed;
            let (geom, cover) = if is_point_like(geom) {
                boxed = boxify_points(geom, source.transform())?;
                (&boxed, None)
            } else {
                (geom, plan.cover)
            };
            weighted = cover.is_some_and(|c| c.weighting);
            reduce_feature(plan, source, geom, cover, &mut mini_raster)?
        }
    };

    let record = partial.into_record(&RecordSpec {
        stats: &plan.stats,
        categorical: params.categorical,
        weighted,
        category_map: params.category_map.as_ref(),
        reducer_names: &plan.reducer_names,
    });

    let stats = match &params.prefix {
        Some(prefix) => record.with_prefix(prefix),
        None => record,
    };

    let feature = if params.geojson_out {
        for (key, value) in stats.iter() {
            feature.set_property(key, value.clone().into());
        }
        Some(feature)
    } else {
        None
    };

    Ok(ZonalOutput { stats, mini_raster, feature })
}

/// Reduce every window of a geometry and merge the parts
fn reduce_feature<S: RasterSource>(
    plan: &ZonalPlan,
    source: &S,
    geom: &Geometry<f64>,
    cover: Option<CoverPlan>,
    mini_raster: &mut Option<MiniRaster>,
) -> Result<PartialStats> {
    let params = &plan.params;
    let Some(bbox) = BoundingBox::of(geom) else {
        return Ok(PartialStats::empty(&plan.stats, params.add_stats.len()));
    };

    let pieces: Vec<BoundingBox> = match plan.limit {
        Some(limit) => {
            let transform = source.transform();
            split_geometry(geom, limit, pixel_size(transform), window_origin(transform))
                .into_iter()
                .map(BoundingBox::from)
                .collect()
        }
        None => vec![bbox],
    };

    let mut merged: Option<PartialStats> = None;
    for piece in pieces {
        let mut window = source.read_window(&piece)?;
        let shape = window.shape();
        debug!(rows = shape.0, cols = shape.1, "read window");

        let (geom_mask, cover_weights) = match cover {
            Some(c) => {
                let pct = rasterize_percent_cover(geom, shape, &window.transform, c.scale, params.all_touched)?;
                (pct.mapv(|v| v > c.selection), Some(pct))
            }
            None => (rasterize(geom, shape, &window.transform, params.all_touched), None),
        };

        let valid = valid_mask(window.data.view(), window.nodata, geom_mask.view());
        if let Some(zone_fn) = &params.zone_fn {
            zone_fn(window.data.view_mut(), valid.view());
        }

        let latitude_scales = plan
            .latitude_correction
            .then(|| row_latitude_scales(&window.transform, shape.0));
        let weights = cover_weights
            .as_ref()
            .filter(|_| cover.is_some_and(|c| c.weighting))
            .map(|w| w.view());

        let input = WindowInput {
            data: window.data.view(),
            nodata: window.nodata,
            geom_mask: geom_mask.view(),
            valid: valid.view(),
            weights,
            latitude_scales: latitude_scales.as_deref(),
        };
        let part = reduce_window(&input, &plan.reduce_options())?;

        if params.raster_out {
            *mini_raster = Some(MiniRaster {
                array: window.data,
                mask: valid,
                geom_mask,
                transform: window.transform,
                nodata: window.nodata,
                cover_weights,
                sub_geom_box: piece.to_polygon(),
                sub_geom_bounds: piece,
                band: source.band(),
                nodata_override: source.nodata_override(),
            });
        }

        merged = Some(match merged {
            Some(acc) => acc.merge(part),
            None => part,
        });
    }

    Ok(merged.unwrap_or_else(|| PartialStats::empty(&plan.stats, params.add_stats.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{LineString, Point};
    use zonestat_core::{AttributeValue, MemorySource, Raster};

    /// 10x10 raster, values 1..=100 row-major, unit cells, origin (0, 10)
    fn source() -> MemorySource<f64> {
        let data: Vec<f64> = (1..=100).map(f64::from).collect();
        let raster = Raster::from_vec(data, 10, 10)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        MemorySource::new(raster).with_nodata(-999.0)
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Feature {
        Feature::new(Geometry::Polygon(BoundingBox::new(x0, y0, x1, y1).to_polygon()))
    }

    fn run(features: Vec<Feature>, params: &ZonalParams) -> Vec<ZonalOutput> {
        collect_zonal_stats(features, &source(), params).unwrap()
    }

    fn stats(feature: Feature, params: &ZonalParams) -> StatRecord {
        run(vec![feature], params).remove(0).stats
    }

    #[test]
    fn test_default_stats() {
        // cells rows 0..2, cols 0..2: values 1, 2, 11, 12
        let r = stats(square(0.0, 8.0, 2.0, 10.0), &ZonalParams::default());
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["count", "min", "max", "mean"]);
        assert_eq!(r.get("count"), Some(&StatValue::Int(4)));
        assert_eq!(r.get_f64("min"), Some(1.0));
        assert_eq!(r.get_f64("max"), Some(12.0));
        assert_relative_eq!(r.get_f64("mean").unwrap(), 6.5);
    }

    #[test]
    fn test_outside_extent_is_null_except_tallies() {
        let params = ZonalParams::new().with_stats("*");
        let r = stats(square(20.0, 20.0, 22.0, 22.0), &params);
        assert_eq!(r.get("count"), Some(&StatValue::Int(0)));
        // boundless cells under the geometry read as nodata
        assert_eq!(r.get_f64("nodata"), Some(4.0));
        assert_eq!(r.get_f64("nan"), Some(0.0));
        for (key, value) in r.iter() {
            if !matches!(key, "count" | "nodata" | "nan") {
                assert!(value.is_null(), "{key}");
            }
        }
    }

    #[test]
    fn test_all_nodata_zone_counts_nodata() {
        let raster = Raster::filled(4, 4, -999.0).with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        let src = MemorySource::new(raster).with_nodata(-999.0);
        let params = ZonalParams::new().with_stats("count nodata");
        let out = collect_zonal_stats(vec![square(1.0, 1.0, 3.0, 3.0)], &src, &params).unwrap();
        assert_eq!(out[0].stats.get("count"), Some(&StatValue::Int(0)));
        assert_eq!(out[0].stats.get("nodata"), Some(&StatValue::Float(4.0)));
    }

    #[test]
    fn test_range_matches_min_max() {
        let params = ZonalParams::new().with_stats("min max range");
        let r = stats(square(1.0, 1.0, 7.0, 6.0), &params);
        let range = r.get_f64("range").unwrap();
        assert_relative_eq!(range, r.get_f64("max").unwrap() - r.get_f64("min").unwrap());
    }

    #[test]
    fn test_split_matches_unsplit() {
        let feature = square(0.2, 0.2, 9.8, 9.8);
        let whole = stats(feature.clone(), &ZonalParams::new().with_stats("count sum mean"));
        let split_params = ZonalParams { limit: Some(10), ..ZonalParams::new().with_stats("count sum mean") };
        let split = stats(feature, &split_params);

        assert_eq!(whole.get("count"), split.get("count"));
        assert_relative_eq!(whole.get_f64("sum").unwrap(), split.get_f64("sum").unwrap(), max_relative = 1e-9);
        assert_relative_eq!(whole.get_f64("mean").unwrap(), split.get_f64("mean").unwrap(), max_relative = 1e-9);
    }

    #[test]
    fn test_split_mean_without_count() {
        let params = ZonalParams { limit: Some(5), ..ZonalParams::new().with_stats("mean") };
        let r = stats(square(0.0, 0.0, 10.0, 10.0), &params);
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["mean"]);
        assert_relative_eq!(r.get_f64("mean").unwrap(), 50.5, max_relative = 1e-9);
    }

    #[test]
    fn test_limit_incompatible_options() {
        let params = ZonalParams { limit: Some(10), ..ZonalParams::new().with_stats("mean median") };
        assert!(matches!(params.validate(), Err(Error::IncompatibleOptions(_))));

        let params = ZonalParams { limit: Some(10), raster_out: true, ..Default::default() };
        assert!(matches!(params.validate(), Err(Error::IncompatibleOptions(_))));

        let params = ZonalParams { limit: Some(10), ..Default::default() }
            .add_stat("n", |m: &MaskedWindow<'_>| -> std::result::Result<StatValue, BoxError> {
                Ok(StatValue::Int(m.count() as i64))
            });
        assert!(matches!(params.validate(), Err(Error::IncompatibleOptions(_))));

        // a zero limit disables splitting
        let params = ZonalParams { limit: Some(0), ..ZonalParams::new().with_stats("median") };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_fails_before_reading() {
        let params = ZonalParams::new().with_stats("count percentile_101");
        assert!(zonal_stats(vec![square(0.0, 0.0, 1.0, 1.0)], &source(), &params).is_err());

        let params = ZonalParams {
            percent_cover_weighting: true,
            percent_cover_scale: Some(1),
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::InvalidParameter { .. })));

        for selection in [f64::NAN, f64::INFINITY] {
            let params = ZonalParams { percent_cover_selection: Some(selection), ..Default::default() };
            assert!(matches!(
                params.validate(),
                Err(Error::InvalidParameter { name: "percent_cover_selection", .. })
            ));
        }
    }

    #[test]
    fn test_percent_cover_defaults() {
        let plan = ZonalParams { percent_cover_selection: Some(0.5), ..Default::default() }
            .validate()
            .unwrap();
        assert_eq!(plan.cover, Some(CoverPlan { scale: 10, selection: 0.5, weighting: false }));
        assert!(ZonalParams::default().validate().unwrap().cover.is_none());
    }

    #[test]
    fn test_latitude_correction_needs_mean() {
        let params = ZonalParams { latitude_correction: true, ..ZonalParams::new().with_stats("sum") };
        assert!(!params.validate().unwrap().latitude_correction);
    }

    #[test]
    fn test_percent_cover_weighting() {
        // half of cells (0,0) and (0,1) are covered: values 1 and 2
        let params = ZonalParams {
            percent_cover_weighting: true,
            all_touched: true,
            ..ZonalParams::new().with_stats("count sum mean")
        };
        let r = stats(square(0.0, 9.5, 2.0, 10.0), &params);
        assert_relative_eq!(r.get_f64("count").unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(r.get_f64("sum").unwrap(), 1.5, epsilon = 1e-12);
        assert_relative_eq!(r.get_f64("mean").unwrap(), 1.5, epsilon = 1e-12);
        assert!(matches!(r.get("count"), Some(StatValue::Float(_))));
    }

    #[test]
    fn test_percent_cover_selection() {
        // a quarter of cell (0,0) and half of cell (0,1)
        let feature = Feature::new(Geometry::Polygon(geo::Polygon::new(
            LineString::from(vec![(0.5, 9.5), (2.0, 9.5), (2.0, 10.0), (0.5, 10.0), (0.5, 9.5)]),
            vec![],
        )));
        let params = ZonalParams {
            percent_cover_selection: Some(0.3),
            all_touched: true,
            ..ZonalParams::new().with_stats("count min")
        };
        let r = stats(feature, &params);
        assert_eq!(r.get("count"), Some(&StatValue::Int(1)));
        assert_eq!(r.get_f64("min"), Some(2.0));
    }

    #[test]
    fn test_point_is_boxified() {
        let params = ZonalParams {
            percent_cover_weighting: true,
            ..ZonalParams::new().with_stats("count mean")
        };
        let r = stats(Feature::new(Geometry::Point(Point::new(2.5, 7.5))), &params);
        assert_eq!(r.get("count"), Some(&StatValue::Int(1)));
        assert_eq!(r.get_f64("mean"), Some(23.0));
    }

    #[test]
    fn test_categorical() {
        let data = vec![1.0, 2.0, 5.0, 5.0, 2.0, 5.0, 1.0, 1.0, 5.0];
        let raster = Raster::from_vec(data, 3, 3)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        let src = MemorySource::new(raster).with_nodata(-999.0);
        let params = ZonalParams { categorical: true, ..Default::default() };

        let out = collect_zonal_stats(vec![square(0.0, 0.0, 3.0, 3.0)], &src, &params).unwrap();
        let r = &out[0].stats;
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["1.0", "2.0", "5.0"]);
        let total: f64 = r.iter().filter_map(|(_, v)| v.as_f64()).sum();
        assert_eq!(total, 9.0);

        let params = ZonalParams {
            categorical: true,
            category_map: Some(BTreeMap::from([
                (CategoryKey(1.0), "water".to_string()),
                (CategoryKey(5.0), "forest".to_string()),
            ])),
            ..Default::default()
        };
        let out = collect_zonal_stats(vec![square(0.0, 0.0, 3.0, 3.0)], &src, &params).unwrap();
        let r = &out[0].stats;
        assert_eq!(r.get("forest"), Some(&StatValue::Int(4)));
        assert_eq!(r.get("2.0"), Some(&StatValue::Int(2)));
    }

    #[test]
    fn test_nodata_and_nan_counts() {
        let data = vec![1.0, -999.0, f64::NAN, 4.0];
        let raster = Raster::from_vec(data, 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let src = MemorySource::new(raster).with_nodata(-999.0);
        let params = ZonalParams::new().with_stats("count nodata nan");
        let out = collect_zonal_stats(vec![square(0.0, 0.0, 2.0, 2.0)], &src, &params).unwrap();
        let r = &out[0].stats;
        assert_eq!(r.get("count"), Some(&StatValue::Int(2)));
        assert_eq!(r.get_f64("nodata"), Some(1.0));
        assert_eq!(r.get_f64("nan"), Some(1.0));
    }

    #[test]
    fn test_prefix_and_geojson_out() {
        let mut feature = square(0.0, 8.0, 2.0, 10.0);
        feature.set_property("name", AttributeValue::String("a".into()));
        let params = ZonalParams {
            prefix: Some("elev_".into()),
            geojson_out: true,
            ..ZonalParams::new().with_stats("count max")
        };
        let out = run(vec![feature], &params).remove(0);
        assert_eq!(out.stats.keys().collect::<Vec<_>>(), vec!["elev_count", "elev_max"]);

        let feature = out.feature.unwrap();
        assert_eq!(feature.get_property("name"), Some(&AttributeValue::String("a".into())));
        assert_eq!(feature.get_property("elev_count"), Some(&AttributeValue::Int(4)));
        assert_eq!(feature.get_property("elev_max"), Some(&AttributeValue::Float(12.0)));
    }

    #[test]
    fn test_raster_out() {
        let params = ZonalParams { raster_out: true, ..Default::default() };
        let out = run(vec![square(0.0, 8.0, 2.0, 10.0)], &params).remove(0);
        let mini = out.mini_raster.unwrap();
        assert_eq!(mini.array.dim(), (2, 2));
        assert_eq!(mini.masked().compressed(), vec![1.0, 2.0, 11.0, 12.0]);
        assert_eq!(mini.band, 1);
        assert_eq!(mini.nodata, -999.0);
        assert_eq!(mini.nodata_override, Some(-999.0));
        assert!(mini.cover_weights.is_none());
        assert!(out.feature.is_none());
    }

    #[test]
    fn test_zone_fn_runs_before_stats() {
        let params = ZonalParams::new()
            .with_stats("sum")
            .with_zone_fn(|mut data: ArrayViewMut2<'_, f64>, _mask: ArrayView2<'_, bool>| {
                data.mapv_inplace(|v| v * 2.0)
            });
        let r = stats(square(0.0, 8.0, 2.0, 10.0), &params);
        assert_eq!(r.get_f64("sum"), Some(52.0));
    }

    #[test]
    fn test_custom_reducer() {
        let params = ZonalParams::new()
            .with_stats("count")
            .add_stat("first", |m: &MaskedWindow<'_>| -> std::result::Result<StatValue, BoxError> {
                Ok(m.iter().next().into())
            });
        let r = stats(square(0.0, 8.0, 2.0, 10.0), &params);
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["count", "first"]);
        assert_eq!(r.get_f64("first"), Some(1.0));
    }

    #[test]
    fn test_reducer_failure_ends_sequence() {
        let params = ZonalParams::new().add_stat(
            "bad",
            |_: &MaskedWindow<'_>| -> std::result::Result<StatValue, BoxError> { Err("boom".into()) },
        );
        let features = vec![square(0.0, 0.0, 1.0, 1.0), square(1.0, 1.0, 2.0, 2.0)];
        let src = source();
        let mut iter = zonal_stats(features, &src, &params).unwrap();
        assert!(matches!(iter.next(), Some(Err(Error::Reducer { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_feature_without_geometry() {
        let r = stats(Feature::empty(), &ZonalParams::default());
        assert_eq!(r.get("count"), Some(&StatValue::Int(0)));
        assert!(r.get("mean").unwrap().is_null());
    }

    #[test]
    fn test_parallel_preserves_order() {
        let features: Vec<Feature> = (0..10)
            .map(|i| square(i as f64, 0.0, i as f64 + 1.0, 1.0))
            .collect();
        let params = ZonalParams::new().with_stats("max");
        let src = source();
        let out = zonal_stats_par(features, &src, &params).unwrap();
        let maxes: Vec<f64> = out.iter().map(|o| o.stats.get_f64("max").unwrap()).collect();
        assert_eq!(maxes, (91..=100).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_algorithm_trait() {
        let algo = ZonalStatistics::new(source());
        assert_eq!(algo.name(), "ZonalStatistics");
        let out = algo.execute_default(vec![square(0.0, 8.0, 2.0, 10.0)]).unwrap();
        assert_eq!(out[0].stats.get("count"), Some(&StatValue::Int(4)));
    }
}
