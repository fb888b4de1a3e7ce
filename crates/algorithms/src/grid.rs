//! Affine grid helpers: pixel size, origin alignment and latitude scaling

use zonestat_core::GeoTransform;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Degrees of longitude spanning very nearly 1 km at the equator
pub const EQUATOR_KM_DEGREES: f64 = 0.008993216;

/// Cell width: the x-scale term of the transform
pub fn pixel_size(transform: &GeoTransform) -> f64 {
    transform.pixel_width
}

/// World coordinate of the transform's translation terms (upper-left corner)
pub fn window_origin(transform: &GeoTransform) -> (f64, f64) {
    transform.origin()
}

/// Snap a coordinate pair to the nearest cell edges of a grid with the given
/// upper-left `origin`.
///
/// x grows east of the origin and y grows south of it, matching a north-up
/// raster.
pub fn round_to_grid(point: (f64, f64), origin: (f64, f64), pixel_size: f64) -> (f64, f64) {
    let (x, y) = point;
    let (x0, y0) = origin;
    let adj_x = ((x - x0) / pixel_size).round() * pixel_size + x0;
    let adj_y = y0 - ((y0 - y) / pixel_size).round() * pixel_size;
    (adj_x, adj_y)
}

/// Great-circle distance in kilometres between two (longitude, latitude)
/// points in degrees.
pub fn haversine_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let (lon1, lat1) = p1;
    let (lon2, lat2) = p2;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Ratio of the east-west distance between two meridians at `lat` to the
/// same distance at the equator.
///
/// Measured as the haversine distance across [`EQUATOR_KM_DEGREES`] of
/// longitude (1 km at the equator), not across one arc-second. The step is
/// kept at the kilometre so scales read as "km per equatorial km". Corrected
/// means only use ratios between rows, which are the same for any step this
/// small.
pub fn latitude_scale(lat: f64) -> f64 {
    haversine_distance((0.0, lat), (EQUATOR_KM_DEGREES, lat))
}

/// Latitude scale of every row centre of a window
pub fn row_latitude_scales(transform: &GeoTransform, rows: usize) -> Vec<f64> {
    let top = transform.origin_y;
    let step = transform.pixel_height.abs();
    (0..rows)
        .map(|i| latitude_scale(top - step * (0.5 + i as f64)))
        .collect()
}
