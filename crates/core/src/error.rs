//! Error types for zonestat

use thiserror::Error;

/// Boxed error returned by caller-supplied reducers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for zonestat operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Band {band} does not exist (raster has {bands} band(s))")]
    InvalidBand { band: usize, bands: usize },

    #[error("Stat `{name}` not valid; must be one of {valid}")]
    InvalidStatistic { name: String, valid: String },

    #[error("Invalid percentile `{stat}`: {reason}")]
    InvalidPercentile { stat: String, reason: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {0}")]
    IncompatibleOptions(String),

    #[error("Feature read error: {0}")]
    FeatureRead(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("Reducer `{name}` failed: {source}")]
    Reducer {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for zonestat operations
pub type Result<T> = std::result::Result<T, Error>;
