//! Merging window results and emitting the final record
//!
//! A split feature produces one [`PartialStats`] per window. They are folded
//! left to right with [`PartialStats::merge`] so that the merged values match
//! what a single window over the whole feature would give, up to summation
//! order. [`PartialStats::into_record`] then keeps only what was asked for.

use std::collections::BTreeMap;

use super::record::{CategoryKey, StatRecord, StatValue};
use super::reduce::PartialStats;
use super::stat::Stat;

fn add_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        (x, y) => x.or(y),
    }
}

fn combine_opt(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(f(x, y)),
        (x, y) => x.or(y),
    }
}

impl PartialStats {
    /// Fold another window of the same feature into this one.
    ///
    /// Counts, sums and nodata/NaN tallies add up; min and max combine;
    /// the mean is re-weighted by each part's (latitude-corrected) count.
    /// Statistics that cannot be recombined keep the first non-empty value.
    pub fn merge(self, other: PartialStats) -> PartialStats {
        let (mean, latitude_correction) = merge_means(&self, &other);
        let first_non_empty = !self.is_empty() || other.is_empty();
        let pick = |a: Option<f64>, b: Option<f64>| if first_non_empty { a.or(b) } else { b.or(a) };

        let mut histogram = self.histogram;
        for (key, bin) in other.histogram {
            let entry = histogram.entry(key).or_default();
            entry.count += bin.count;
            entry.weight += bin.weight;
        }

        PartialStats {
            cells: self.cells + other.cells,
            zone_cells: self.zone_cells + other.zone_cells,
            count: self.count + other.count,
            sum: add_opt(self.sum, other.sum),
            mean,
            latitude_correction,
            min: combine_opt(self.min, other.min, f64::min),
            max: combine_opt(self.max, other.max, f64::max),
            std: pick(self.std, other.std),
            median: pick(self.median, other.median),
            majority: pick(self.majority, other.majority),
            minority: pick(self.minority, other.minority),
            unique: if first_non_empty { self.unique.or(other.unique) } else { other.unique.or(self.unique) },
            percentiles: self
                .percentiles
                .iter()
                .zip(&other.percentiles)
                .map(|(&a, &b)| pick(a, b))
                .collect(),
            nodata: self.nodata + other.nodata,
            nan: self.nan + other.nan,
            histogram,
            custom: self
                .custom
                .into_iter()
                .zip(other.custom)
                .map(|(a, b)| if a.is_null() { b } else { a })
                .collect(),
        }
    }

    /// Build the user-facing record.
    ///
    /// Histogram entries come first in categorical mode, then the requested
    /// statistics in request order, then custom reducers. Over an empty
    /// selection every statistic is null except `count`, which is zero, and
    /// the nodata/NaN tallies, which stay numeric while the geometry covers
    /// at least one cell.
    pub fn into_record(self, spec: &RecordSpec<'_>) -> StatRecord {
        let mut record = StatRecord::new();

        if spec.categorical {
            for (key, bin) in &self.histogram {
                let label = spec
                    .category_map
                    .and_then(|m| m.get(key).cloned())
                    .unwrap_or_else(|| key.to_string());
                let value = if spec.weighted {
                    StatValue::Float(bin.weight)
                } else {
                    StatValue::Int(bin.count as i64)
                };
                record.insert(label, value);
            }
        }

        let empty = self.is_empty();
        let mut percentiles = self.percentiles.iter();
        for stat in spec.stats {
            let value = match stat {
                Stat::Count if spec.weighted => StatValue::Float(self.count),
                Stat::Count => StatValue::Int(self.cells as i64),
                Stat::Percentile { .. } => percentiles.next().copied().flatten().into(),
                Stat::Nodata if self.zone_cells > 0 => StatValue::Float(self.nodata),
                Stat::Nan if self.zone_cells > 0 => StatValue::Float(self.nan),
                _ if empty => StatValue::Null,
                Stat::Min => self.min.into(),
                Stat::Max => self.max.into(),
                Stat::Mean => self.mean.into(),
                Stat::Sum => self.sum.into(),
                Stat::Std => self.std.into(),
                Stat::Median => self.median.into(),
                Stat::Majority => self.majority.into(),
                Stat::Minority => self.minority.into(),
                Stat::Unique => self.unique.map_or(StatValue::Null, |u| StatValue::Int(u as i64)),
                Stat::Range => match (self.min, self.max) {
                    (Some(lo), Some(hi)) => StatValue::Float(hi - lo),
                    _ => StatValue::Null,
                },
                Stat::Nodata => StatValue::Float(self.nodata),
                Stat::Nan => StatValue::Float(self.nan),
            };
            record.insert(stat.name(), value);
        }

        for (name, value) in spec.reducer_names.iter().zip(self.custom) {
            record.insert(name.as_str(), value);
        }

        record
    }
}

/// Output shape for [`PartialStats::into_record`]
#[derive(Debug, Clone, Copy)]
pub struct RecordSpec<'a> {
    pub stats: &'a [Stat],
    pub categorical: bool,
    /// Coverage weighting was applied, so counts are real numbers
    pub weighted: bool,
    pub category_map: Option<&'a BTreeMap<CategoryKey, String>>,
    pub reducer_names: &'a [String],
}

/// Count-weighted mean of two parts, honouring latitude correction
fn merge_means(a: &PartialStats, b: &PartialStats) -> (Option<f64>, Option<f64>) {
    let usable = |p: &PartialStats| p.mean.is_some() && p.count > 0.0;
    match (usable(a), usable(b)) {
        (false, false) => (None, a.latitude_correction.or(b.latitude_correction)),
        (true, false) => (a.mean, a.latitude_correction),
        (false, true) => (b.mean, b.latitude_correction),
        (true, true) => {
            let lc_a = a.latitude_correction.unwrap_or(1.0);
            let lc_b = b.latitude_correction.unwrap_or(1.0);
            let wa = a.count * lc_a;
            let wb = b.count * lc_b;
            let mean = (a.mean.unwrap_or(0.0) * wa + b.mean.unwrap_or(0.0) * wb) / (wa + wb);
            let lc = (a.latitude_correction.is_some() || b.latitude_correction.is_some())
                .then(|| (wa + wb) / (a.count + b.count));
            (Some(mean), lc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::reduce::Bin;
    use approx::assert_relative_eq;

    fn part(values: &[f64]) -> PartialStats {
        let n = values.len();
        if n == 0 {
            return PartialStats::empty(&[], 0);
        }
        let sum: f64 = values.iter().sum();
        PartialStats {
            cells: n as u64,
            count: n as f64,
            sum: Some(sum),
            mean: Some(sum / n as f64),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            ..Default::default()
        }
    }

    fn spec(stats: &[Stat]) -> RecordSpec<'_> {
        RecordSpec { stats, categorical: false, weighted: false, category_map: None, reducer_names: &[] }
    }

    #[test]
    fn test_merge_matches_single_window() {
        let merged = part(&[1.0, 2.0]).merge(part(&[6.0])).merge(part(&[]));
        let whole = part(&[1.0, 2.0, 6.0]);
        assert_eq!(merged.cells, 3);
        assert_eq!(merged.sum, whole.sum);
        assert_relative_eq!(merged.mean.unwrap(), whole.mean.unwrap());
        assert_eq!(merged.min, Some(1.0));
        assert_eq!(merged.max, Some(6.0));
    }

    #[test]
    fn test_merge_latitude_corrected_mean() {
        // rows with latitude scales 1.0 and 0.5, values 2 and 4
        let a = PartialStats { cells: 1, count: 1.0, mean: Some(2.0), latitude_correction: Some(1.0), ..Default::default() };
        let b = PartialStats { cells: 1, count: 1.0, mean: Some(4.0), latitude_correction: Some(0.5), ..Default::default() };
        let merged = a.merge(b);
        assert_relative_eq!(merged.mean.unwrap(), 4.0 / 1.5);
        assert_relative_eq!(merged.latitude_correction.unwrap(), 0.75);
    }

    #[test]
    fn test_merge_histograms() {
        let mut a = part(&[1.0]);
        a.histogram.insert(CategoryKey(1.0), Bin { count: 1, weight: 1.0 });
        let mut b = part(&[1.0, 2.0]);
        b.histogram.insert(CategoryKey(1.0), Bin { count: 1, weight: 1.0 });
        b.histogram.insert(CategoryKey(2.0), Bin { count: 1, weight: 1.0 });
        let merged = a.merge(b);
        assert_eq!(merged.histogram[&CategoryKey(1.0)].count, 2);
        assert_eq!(merged.histogram[&CategoryKey(2.0)].count, 1);
    }

    #[test]
    fn test_range_from_merged_extremes() {
        let merged = part(&[3.0, 4.0]).merge(part(&[-1.0]));
        let record = merged.into_record(&spec(&[Stat::Range]));
        assert_eq!(record.get("range"), Some(&StatValue::Float(5.0)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_empty_record_is_null_except_count() {
        let stats = vec![Stat::Count, Stat::Mean, Stat::Min, Stat::Range, Stat::Nodata, Stat::Unique];
        let record = part(&[]).into_record(&spec(&stats));
        assert_eq!(record.get("count"), Some(&StatValue::Int(0)));
        for key in ["mean", "min", "range", "nodata", "unique"] {
            assert!(record.get(key).unwrap().is_null(), "{key}");
        }
    }

    #[test]
    fn test_empty_selection_keeps_nodata_tally() {
        let mut p = part(&[]);
        p.zone_cells = 4;
        p.nodata = 4.0;
        let record = p.into_record(&spec(&[Stat::Count, Stat::Nodata, Stat::Nan, Stat::Mean]));
        assert_eq!(record.get("count"), Some(&StatValue::Int(0)));
        assert_eq!(record.get("nodata"), Some(&StatValue::Float(4.0)));
        assert_eq!(record.get("nan"), Some(&StatValue::Float(0.0)));
        assert!(record.get("mean").unwrap().is_null());
    }

    #[test]
    fn test_mean_without_count_keeps_count_private() {
        let record = part(&[1.0, 3.0]).into_record(&spec(&[Stat::Mean]));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["mean"]);
    }

    #[test]
    fn test_categorical_record_with_map() {
        let mut p = part(&[1.0, 2.0, 2.0]);
        p.histogram.insert(CategoryKey(1.0), Bin { count: 1, weight: 0.5 });
        p.histogram.insert(CategoryKey(2.0), Bin { count: 2, weight: 1.5 });
        let map = BTreeMap::from([(CategoryKey(2.0), "grass".to_string())]);

        let mut s = spec(&[]);
        s.categorical = true;
        s.category_map = Some(&map);
        let record = p.clone().into_record(&s);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["1.0", "grass"]);
        assert_eq!(record.get("grass"), Some(&StatValue::Int(2)));

        s.weighted = true;
        let record = p.into_record(&s);
        assert_eq!(record.get("1.0"), Some(&StatValue::Float(0.5)));
    }
}
