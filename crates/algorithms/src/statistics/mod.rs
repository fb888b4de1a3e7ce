//! Zonal statistics of vector features over a raster
//!
//! - **stat**: statistic names and validation
//! - **record**: per-feature output records
//! - **reduce**: statistics over one raster window
//! - **aggregate**: merging split windows into one record
//! - **zonal**: the per-feature driver
//! - **timeseries**: per-step sums and means over a raster time stack

pub mod aggregate;
pub mod record;
pub mod reduce;
pub mod stat;
pub mod timeseries;
pub mod zonal;

pub use aggregate::RecordSpec;
pub use record::{CategoryKey, StatRecord, StatValue};
pub use reduce::{Bin, MaskedWindow, PartialStats, Reducer, ZoneFn, reduce_window, valid_mask};
pub use stat::{DEFAULT_STATS, Stat, VALID_STATS, check_stats, get_percentile, parse_stat_list};
pub use timeseries::{TimeseriesMethod, zonal_stats_timeseries};
pub use zonal::{
    CoverPlan, MiniRaster, ZonalOutput, ZonalParams, ZonalPlan, ZonalStatistics, ZonalStatsIter,
    collect_zonal_stats, zonal_stats, zonal_stats_par,
};
