//! Great-circle distance on a spherical Earth

/// Average great-circle radius of the Earth in km.
pub const EARTH_RADIUS_KM: f64 = 6372.795;

/// Distance in km between two latitude/longitude points given in degrees.
///
/// Uses the atan2 form of the central angle, which stays accurate for both
/// tiny and near-antipodal separations.
pub fn great_circle_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lon1 = lon1.to_radians();
    let lat2 = lat2.to_radians();
    let lon2 = lon2.to_radians();
    let delta_lon = lon2 - lon1;

    let y = ((lat2.cos() * delta_lon.sin()).powi(2)
        + (lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos()).powi(2))
    .sqrt();
    let x = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lon.cos();

    EARTH_RADIUS_KM * y.atan2(x)
}

/// Whether an observer lies inside a satellite's ground footprint.
///
/// `footprint_km` is the footprint diameter centred on the sub-point.
pub fn is_overhead(
    sub_lat: f64,
    sub_lon: f64,
    footprint_km: f64,
    observer_lat: f64,
    observer_lon: f64,
) -> bool {
    great_circle_distance_km(observer_lat, observer_lon, sub_lat, sub_lon) <= footprint_km / 2.0
}
