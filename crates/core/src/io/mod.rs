//! I/O for reading and writing geospatial data

mod geojson;
mod geotiff;

pub use self::geojson::{
    IntoFeature, parse_geojson, read_geojson, to_geojson_feature, write_geojson_string,
};
pub use self::geotiff::{
    GeoTiffSource, open_geotiff, read_geotiff_bands, read_geotiff_from_buffer, write_geotiff,
};
