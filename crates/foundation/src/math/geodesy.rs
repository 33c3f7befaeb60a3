use crate::coord::LatLng;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// IUGG mean Earth radius R1 = (2a + b) / 3, used for spherical distances.
pub const EARTH_MEAN_RADIUS_M: f64 = (2.0 * WGS84_A + WGS84_B) / 3.0;

/// Great-circle distance in meters (haversine on the mean sphere).
///
/// Inputs are degrees. The intermediate term is clamped so rounding can never
/// push `asin` outside its domain for antipodal points.
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();

    let s_lat = (dlat / 2.0).sin();
    let s_lng = (dlng / 2.0).sin();
    let h = s_lat * s_lat + lat1.cos() * lat2.cos() * s_lng * s_lng;

    2.0 * EARTH_MEAN_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}
