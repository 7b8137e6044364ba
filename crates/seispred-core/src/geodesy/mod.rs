//! Spherical geometry on unit vectors: angular distance, azimuth and
//! great-circle interpolation used by attribute assembly and ray-path
//! synthesis.

use crate::domain::GeoVector;
use std::f64::consts::{PI, TAU};

/// Angular separation between two positions in radians, in [0, pi].
pub fn angular_distance(from: &GeoVector, to: &GeoVector) -> f64 {
    let a = from.unit_vector();
    let b = to.unit_vector();
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    dot.clamp(-1.0, 1.0).acos()
}

/// Great-circle azimuth from `from` toward `to`, clockwise from north, in
/// [0, 2*pi). Undefined when the positions coincide or `from` sits on a
/// pole, in which case no meaningful azimuth exists.
pub fn azimuth(from: &GeoVector, to: &GeoVector) -> Option<f64> {
    let lat1 = from.lat_deg.to_radians();
    let lat2 = to.lat_deg.to_radians();
    let dlon = (to.lon_deg - from.lon_deg).to_radians();

    if lat1.cos().abs() < 1.0e-12 {
        return None;
    }

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    if y.abs() < 1.0e-15 && x.abs() < 1.0e-15 {
        return None;
    }

    Some(wrap_azimuth(y.atan2(x)))
}

/// Azimuth from the receiver back toward the source.
pub fn back_azimuth(source: &GeoVector, receiver: &GeoVector) -> Option<f64> {
    azimuth(receiver, source)
}

/// Normalize an angle into [0, 2*pi).
pub fn wrap_azimuth(angle_rad: f64) -> f64 {
    let wrapped = angle_rad.rem_euclid(TAU);
    if wrapped == TAU { 0.0 } else { wrapped }
}

/// Point a given fraction of the way along the great circle from `from` to
/// `to`. Depth is interpolated linearly. Antipodal endpoints have no unique
/// great circle; the fraction is then applied to depth only and the start
/// position is kept.
pub fn great_circle_point(from: &GeoVector, to: &GeoVector, fraction: f64) -> GeoVector {
    let fraction = fraction.clamp(0.0, 1.0);
    let depth = from.depth_km + fraction * (to.depth_km - from.depth_km);

    let omega = angular_distance(from, to);
    if omega < 1.0e-12 || (PI - omega) < 1.0e-12 {
        return GeoVector::new(from.lat_deg, from.lon_deg, depth);
    }

    let a = from.unit_vector();
    let b = to.unit_vector();
    let sin_omega = omega.sin();
    let wa = ((1.0 - fraction) * omega).sin() / sin_omega;
    let wb = (fraction * omega).sin() / sin_omega;

    let v = [
        wa * a[0] + wb * b[0],
        wa * a[1] + wb * b[1],
        wa * a[2] + wb * b[2],
    ];
    let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    let lat = (v[2] / norm).asin().to_degrees();
    let lon = v[1].atan2(v[0]).to_degrees();

    GeoVector::new(lat, lon, depth)
}

#[cfg(test)]
mod tests {
    use super::{angular_distance, azimuth, back_azimuth, great_circle_point, wrap_azimuth};
    use crate::domain::GeoVector;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    const TOLERANCE: f64 = 1.0e-9;

    #[test]
    fn angular_distance_matches_known_separations() {
        let equator_prime = GeoVector::new(0.0, 0.0, 0.0);
        let equator_90e = GeoVector::new(0.0, 90.0, 0.0);
        let north_pole = GeoVector::new(90.0, 0.0, 0.0);

        assert!((angular_distance(&equator_prime, &equator_90e) - FRAC_PI_2).abs() < TOLERANCE);
        assert!((angular_distance(&equator_prime, &north_pole) - FRAC_PI_2).abs() < TOLERANCE);
        assert!(angular_distance(&equator_prime, &equator_prime).abs() < TOLERANCE);

        let antipode = GeoVector::new(0.0, 180.0, 0.0);
        assert!((angular_distance(&equator_prime, &antipode) - PI).abs() < TOLERANCE);
    }

    #[test]
    fn azimuth_points_north_and_east_where_expected() {
        let origin = GeoVector::new(0.0, 0.0, 0.0);
        let north = GeoVector::new(10.0, 0.0, 0.0);
        let east = GeoVector::new(0.0, 10.0, 0.0);

        let to_north = azimuth(&origin, &north).expect("azimuth to north should exist");
        assert!(to_north.abs() < TOLERANCE);

        let to_east = azimuth(&origin, &east).expect("azimuth to east should exist");
        assert!((to_east - FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn azimuth_is_undefined_at_poles_and_for_coincident_points() {
        let pole = GeoVector::new(90.0, 0.0, 0.0);
        let somewhere = GeoVector::new(10.0, 20.0, 0.0);

        assert!(azimuth(&pole, &somewhere).is_none());
        assert!(azimuth(&somewhere, &somewhere).is_none());
    }

    #[test]
    fn back_azimuth_reverses_endpoints() {
        let source = GeoVector::new(5.0, 5.0, 100.0);
        let receiver = GeoVector::new(15.0, 25.0, 0.0);

        let back = back_azimuth(&source, &receiver).expect("back azimuth should exist");
        let reversed = azimuth(&receiver, &source).expect("reversed azimuth should exist");
        assert!((back - reversed).abs() < TOLERANCE);
    }

    #[test]
    fn wrap_azimuth_lands_in_zero_to_two_pi() {
        assert!((wrap_azimuth(-FRAC_PI_2) - 1.5 * PI).abs() < TOLERANCE);
        assert!((wrap_azimuth(TAU + 0.25) - 0.25).abs() < TOLERANCE);
        assert!(wrap_azimuth(0.0).abs() < TOLERANCE);
        assert!(wrap_azimuth(TAU).abs() < TOLERANCE);
    }

    #[test]
    fn great_circle_interpolation_hits_endpoints_and_midpoint() {
        let from = GeoVector::new(0.0, 0.0, 200.0);
        let to = GeoVector::new(0.0, 40.0, 0.0);

        let start = great_circle_point(&from, &to, 0.0);
        assert!((start.lon_deg - 0.0).abs() < 1.0e-6);
        assert!((start.depth_km - 200.0).abs() < TOLERANCE);

        let mid = great_circle_point(&from, &to, 0.5);
        assert!((mid.lon_deg - 20.0).abs() < 1.0e-6);
        assert!(mid.lat_deg.abs() < 1.0e-6);
        assert!((mid.depth_km - 100.0).abs() < TOLERANCE);

        let end = great_circle_point(&from, &to, 1.0);
        assert!((end.lon_deg - 40.0).abs() < 1.0e-6);
        assert!((end.depth_km - 0.0).abs() < TOLERANCE);
    }

    #[test]
    fn degenerate_interpolation_keeps_the_start_position() {
        let from = GeoVector::new(12.0, 34.0, 50.0);
        let to = GeoVector::new(12.0, 34.0, 150.0);

        let mid = great_circle_point(&from, &to, 0.5);
        assert_eq!(mid.lat_deg, 12.0);
        assert_eq!(mid.lon_deg, 34.0);
        assert!((mid.depth_km - 100.0).abs() < TOLERANCE);
    }
}
