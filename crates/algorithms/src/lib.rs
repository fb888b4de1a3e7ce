//! # Zonestat Algorithms
//!
//! Zonal statistics of vector features over raster data.
//!
//! ## Modules
//!
//! - **grid**: pixel size, grid snapping, latitude scaling
//! - **rasterize**: boolean and fractional coverage masks
//! - **split**: grid-aligned splitting of oversized geometries
//! - **statistics**: window reduction, merging, the per-feature driver and
//!   time-stack series

pub mod grid;
pub(crate) mod maybe_rayon;
pub mod rasterize;
pub mod split;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::grid::{haversine_distance, latitude_scale, pixel_size, round_to_grid};
    pub use crate::rasterize::{boxify_points, rasterize, rasterize_percent_cover, rebin_sum};
    pub use crate::split::split_geometry;
    pub use crate::statistics::{
        CategoryKey, MaskedWindow, MiniRaster, Reducer, StatRecord, StatValue, ZonalOutput,
        TimeseriesMethod, ZonalParams, ZonalStatistics, ZoneFn, collect_zonal_stats, zonal_stats,
        zonal_stats_par, zonal_stats_timeseries,
    };
    pub use zonestat_core::prelude::*;
}
