//! Statistic names and their validation

use std::fmt;
use zonestat_core::{Error, Result};

/// Statistics computed when none are requested
pub const DEFAULT_STATS: [&str; 4] = ["count", "min", "max", "mean"];

/// Every named statistic; `percentile_<q>` is accepted in addition
pub const VALID_STATS: [&str; 13] = [
    "count", "min", "max", "mean", "sum", "std", "median", "majority", "minority", "unique",
    "range", "nodata", "nan",
];

/// One requested statistic
#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    Count,
    Min,
    Max,
    Mean,
    Sum,
    Std,
    Median,
    Majority,
    Minority,
    Unique,
    Range,
    Nodata,
    Nan,
    /// `percentile_<q>`; `name` keeps the spelling used as output key
    Percentile { q: f64, name: String },
}

impl Stat {
    /// Parse a statistic name
    pub fn parse(name: &str) -> Result<Stat> {
        let stat = match name {
            "count" => Stat::Count,
            "min" => Stat::Min,
            "max" => Stat::Max,
            "mean" => Stat::Mean,
            "sum" => Stat::Sum,
            "std" => Stat::Std,
            "median" => Stat::Median,
            "majority" => Stat::Majority,
            "minority" => Stat::Minority,
            "unique" => Stat::Unique,
            "range" => Stat::Range,
            "nodata" => Stat::Nodata,
            "nan" => Stat::Nan,
            other if other.starts_with("percentile_") => Stat::Percentile {
                q: get_percentile(other)?,
                name: other.to_string(),
            },
            other => {
                return Err(Error::InvalidStatistic {
                    name: other.to_string(),
                    valid: VALID_STATS.join(", "),
                });
            }
        };
        Ok(stat)
    }

    /// Output key of this statistic
    pub fn name(&self) -> &str {
        match self {
            Stat::Count => "count",
            Stat::Min => "min",
            Stat::Max => "max",
            Stat::Mean => "mean",
            Stat::Sum => "sum",
            Stat::Std => "std",
            Stat::Median => "median",
            Stat::Majority => "majority",
            Stat::Minority => "minority",
            Stat::Unique => "unique",
            Stat::Range => "range",
            Stat::Nodata => "nodata",
            Stat::Nan => "nan",
            Stat::Percentile { name, .. } => name,
        }
    }

    /// Whether the statistic can be recombined across split windows
    pub fn is_mergeable(&self) -> bool {
        !matches!(
            self,
            Stat::Minority
                | Stat::Majority
                | Stat::Median
                | Stat::Std
                | Stat::Unique
                | Stat::Percentile { .. }
        )
    }

    /// Whether the statistic is read from the per-value histogram
    pub fn needs_histogram(&self) -> bool {
        matches!(self, Stat::Majority | Stat::Minority | Stat::Unique)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse the `q` of a `percentile_<q>` name; `q` must lie in [0, 100]
pub fn get_percentile(stat: &str) -> Result<f64> {
    let invalid = |reason: &str| Error::InvalidPercentile {
        stat: stat.to_string(),
        reason: reason.to_string(),
    };

    let q_str = stat
        .strip_prefix("percentile_")
        .ok_or_else(|| invalid("must start with 'percentile_'"))?;
    let q: f64 = q_str
        .parse()
        .map_err(|_| invalid("percentile is not a number"))?;

    if q.is_nan() {
        return Err(invalid("percentile is not a number"));
    }
    if q > 100.0 {
        return Err(invalid("percentiles must be <= 100"));
    }
    if q < 0.0 {
        return Err(invalid("percentiles must be >= 0"));
    }
    Ok(q)
}

/// Split a space-delimited statistic list
pub fn parse_stat_list(stats: &str) -> Vec<String> {
    stats.split_whitespace().map(str::to_string).collect()
}

/// Resolve the requested statistics.
///
/// `None` (or an empty list) selects [`DEFAULT_STATS`], or nothing in
/// categorical mode. A single `*` or `ALL` selects every [`VALID_STATS`].
/// Duplicates are dropped, keeping the first occurrence.
pub fn check_stats(stats: Option<&[String]>, categorical: bool) -> Result<Vec<Stat>> {
    let names: Vec<&str> = match stats {
        None | Some([]) if categorical => Vec::new(),
        None | Some([]) => DEFAULT_STATS.to_vec(),
        Some([one]) if one == "*" || one == "ALL" => VALID_STATS.to_vec(),
        Some(list) => list.iter().map(String::as_str).collect(),
    };

    let mut resolved: Vec<Stat> = Vec::with_capacity(names.len());
    for name in names {
        let stat = Stat::parse(name)?;
        if !resolved.iter().any(|s| s.name() == stat.name()) {
            resolved.push(stat);
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_percentile() {
        assert_eq!(get_percentile("percentile_13.2").unwrap(), 13.2);
        assert_eq!(get_percentile("percentile_0").unwrap(), 0.0);
        assert_eq!(get_percentile("percentile_100").unwrap(), 100.0);
        assert!(get_percentile("percentile_101").is_err());
        assert!(get_percentile("percentile_-1").is_err());
        assert!(get_percentile("percentile_foobar").is_err());
        assert!(get_percentile("foobar").is_err());
    }

    #[test]
    fn test_default_stats() {
        let stats = check_stats(None, false).unwrap();
        let names: Vec<&str> = stats.iter().map(Stat::name).collect();
        assert_eq!(names, DEFAULT_STATS);
    }

    #[test]
    fn test_categorical_without_stats_selects_none() {
        assert!(check_stats(None, true).unwrap().is_empty());
        assert!(check_stats(Some(&[]), true).unwrap().is_empty());
    }

    #[test]
    fn test_all_stats() {
        for all in ["*", "ALL"] {
            let stats = check_stats(Some(&owned(&[all])), false).unwrap();
            assert_eq!(stats.len(), VALID_STATS.len());
        }
    }

    #[test]
    fn test_invalid_stat() {
        let err = check_stats(Some(&owned(&["count", "foo"])), false).unwrap_err();
        assert!(matches!(err, Error::InvalidStatistic { ref name, .. } if name == "foo"));
    }

    #[test]
    fn test_percentile_stat_keeps_name() {
        let stats = check_stats(Some(&parse_stat_list("min percentile_13.2")), false).unwrap();
        assert_eq!(stats[1], Stat::Percentile { q: 13.2, name: "percentile_13.2".into() });
        assert_eq!(stats[1].to_string(), "percentile_13.2");
        assert!(!stats[1].is_mergeable());
    }

    #[test]
    fn test_duplicates_dropped() {
        let stats = check_stats(Some(&parse_stat_list("mean mean count")), false).unwrap();
        assert_eq!(stats, vec![Stat::Mean, Stat::Count]);
    }
}
