//! Metric helpers for lon/lat coordinates.
//!
//! Boundary thresholds are tuned in metres and kilometres, while the
//! geometry itself stays in WGS84 degrees. These helpers bridge the two.

use geo::Coord;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Haversine distance between two lon/lat coordinates, in meters.
pub fn distance_m(a: Coord, b: Coord) -> f64 {
    haversine_distance(a.y, a.x, b.y, b.x)
}

/// Haversine distance between two lon/lat coordinates, in kilometres.
pub fn distance_km(a: Coord, b: Coord) -> f64 {
    distance_m(a, b) / 1000.0
}

/// Meters per degree of latitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Meters per degree of longitude at a given latitude (WGS84 approximation).
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_412.84 * lat_rad.cos() - 93.5 * (3.0 * lat_rad).cos() + 0.118 * (5.0 * lat_rad).cos()
}

/// Convert a north/south offset in meters to degrees latitude.
pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    let meters_per_deg = meters_per_deg_lat(ref_lat_deg).max(1e-9);
    meters / meters_per_deg
}

/// Convert an east/west offset in meters to degrees longitude.
pub fn meters_to_lon(meters: f64, ref_lat_deg: f64) -> f64 {
    let meters_per_deg = meters_per_deg_lon(ref_lat_deg).max(1e-9);
    meters / meters_per_deg
}

/// Degree-equivalent of a metric distance for isotropic operations such as
/// buffering, where the latitude scale is used on both axes.
pub fn meters_to_degrees(meters: f64, ref_lat_deg: f64) -> f64 {
    meters_to_lat(meters, ref_lat_deg)
}

/// Initial bearing from point 1 to point 2 in radians (0 = north, π/2 = east).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y)
}

/// Bearing of the line through `a` and `b` folded into `[0, 180)` degrees,
/// so a segment and its reverse report the same direction.
pub fn undirected_bearing_deg(a: Coord, b: Coord) -> f64 {
    bearing(a.y, a.x, b.y, b.x).to_degrees().rem_euclid(180.0)
}

/// Smallest angle between two undirected bearings, in `[0, 90]` degrees.
pub fn undirected_angle_diff_deg(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).rem_euclid(180.0);
    diff.min(180.0 - diff)
}

pub fn midpoint(a: Coord, b: Coord) -> Coord {
    Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_distance(38.03, -84.6, 38.03, -84.6);
        assert!(dist < 0.001);
    }

    #[test]
    fn meters_to_degrees_round_trips_through_local_scale() {
        let lat = 38.0;
        let deg = meters_to_lat(100.0, lat);
        assert!((deg * meters_per_deg_lat(lat) - 100.0).abs() < 1e-9);
        assert!(meters_to_lon(100.0, lat) > deg);
    }

    #[test]
    fn undirected_bearing_ignores_direction() {
        let a = Coord { x: -84.0, y: 38.0 };
        let b = Coord { x: -83.9, y: 38.1 };
        let forward = undirected_bearing_deg(a, b);
        let reverse = undirected_bearing_deg(b, a);
        // Great-circle bearings differ slightly at each end of the line.
        assert!(undirected_angle_diff_deg(forward, reverse) < 0.1);
    }

    #[test]
    fn angle_diff_wraps_around_north() {
        assert!((undirected_angle_diff_deg(179.0, 1.0) - 2.0).abs() < 1e-9);
        assert!((undirected_angle_diff_deg(90.0, 0.0) - 90.0).abs() < 1e-9);
    }
}
