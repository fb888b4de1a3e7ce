//! # Zonestat Core
//!
//! Core types, traits and I/O for the zonestat zonal statistics engine.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `RasterSource`: Boundless windowed reads of one raster band
//! - `Feature`: Vector features with attributes
//! - I/O for GeoTIFF rasters and GeoJSON features

pub mod error;
pub mod io;
pub mod raster;
pub mod source;
pub mod vector;

pub use error::{BoxError, Error, Result};
pub use io::{GeoTiffSource, IntoFeature};
pub use raster::{GeoTransform, Raster, RasterElement, RasterWindow, Window};
pub use source::{DEFAULT_NODATA, MemorySource, RasterSource};
pub use vector::{AttributeValue, BoundingBox, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::Algorithm;
    pub use crate::error::{Error, Result};
    pub use crate::io::IntoFeature;
    pub use crate::raster::{GeoTransform, Raster, RasterElement, RasterWindow, Window};
    pub use crate::source::{MemorySource, RasterSource};
    pub use crate::vector::{AttributeValue, BoundingBox, Feature, FeatureCollection};
}

/// Core trait for algorithms in zonestat.
///
/// Algorithms transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
