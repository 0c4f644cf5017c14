//! Spherical geometry on the stellar surface
//!
//! Points are (latitude, longitude) pairs in radians on the unit sphere. The
//! stellar rotation axis is +z, longitude zero lies in the x-z plane, and the
//! observer sits at a fixed direction set by the inclination (angle between the
//! rotation axis and the line of sight). Rotation is applied to features, not
//! to the observer, so the sub-observer point always has longitude zero.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};
use thiserror::Error;

/// Errors from geometric parameter validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid rotation period {0} days (must be finite and positive)")]
    InvalidPeriod(f64),
}

/// A point on the stellar surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoint {
    /// Latitude in radians, north positive, in [-π/2, π/2]
    pub lat: f64,
    /// Longitude in radians, east positive
    pub lon: f64,
}

impl SurfacePoint {
    /// Create a point from latitude and longitude in radians
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Create a point from latitude and longitude in degrees
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self::new(lat.to_radians(), lon.to_radians())
    }

    /// Latitude in degrees
    pub fn lat_degrees(&self) -> f64 {
        self.lat.to_degrees()
    }

    /// Longitude in degrees
    pub fn lon_degrees(&self) -> f64 {
        self.lon.to_degrees()
    }

    /// Cartesian unit vector in the stellar frame
    pub fn to_unit_vector(&self) -> Vector3<f64> {
        let (sin_lat, cos_lat) = self.lat.sin_cos();
        let (sin_lon, cos_lon) = self.lon.sin_cos();
        Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }
}

/// Wrap a longitude into [0, 2π)
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(TAU);
    // rem_euclid of a tiny negative value can round up to exactly 2π
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Great-circle distance between two surface points in radians.
///
/// Haversine form, stable for coincident points; the `asin` argument is
/// clamped so antipodal points return π instead of NaN.
pub fn angular_separation(p1: &SurfacePoint, p2: &SurfacePoint) -> f64 {
    let half_dlat = 0.5 * (p2.lat - p1.lat);
    let half_dlon = 0.5 * (p2.lon - p1.lon);
    let h = half_dlat.sin().powi(2) + p1.lat.cos() * p2.lat.cos() * half_dlon.sin().powi(2);
    2.0 * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Cosine of the angle between a surface normal and the line of sight (μ)
pub fn cos_angle_from_disk_center(point: &SurfacePoint, sub_observer: &SurfacePoint) -> f64 {
    let mu = sub_observer.lat.sin() * point.lat.sin()
        + sub_observer.lat.cos() * point.lat.cos() * (sub_observer.lon - point.lon).cos();
    mu.clamp(-1.0, 1.0)
}

/// Foreshortening weight of a surface point, clipped to zero on the far hemisphere
pub fn visibility_weight(point: &SurfacePoint, sub_observer: &SurfacePoint) -> f64 {
    cos_angle_from_disk_center(point, sub_observer).max(0.0)
}

/// Longitude of a co-rotating point after `t` days of rotation, wrapped into [0, 2π).
///
/// # Arguments
/// * `lon0` - Longitude at epoch in the co-rotating frame (radians)
/// * `t` - Time since epoch in days
/// * `period` - Rotation period in days
/// * `phase_at_epoch` - Rotation phase at epoch (radians)
pub fn rotated_longitude(
    lon0: f64,
    t: f64,
    period: f64,
    phase_at_epoch: f64,
) -> Result<f64, GeometryError> {
    if !period.is_finite() || period <= 0.0 {
        return Err(GeometryError::InvalidPeriod(period));
    }
    Ok(advance_longitude(lon0, t, period, phase_at_epoch))
}

fn advance_longitude(lon0: f64, t: f64, period: f64, phase_at_epoch: f64) -> f64 {
    wrap_longitude(lon0 + phase_at_epoch + TAU * (t / period))
}

/// Sub-observer point for a given inclination (radians).
///
/// Inclination π/2 is equator-on, 0 looks down the north rotation pole.
pub fn sub_observer_point(inclination: f64) -> SurfacePoint {
    SurfacePoint::new(FRAC_PI_2 - inclination, 0.0)
}

/// Solid-body rotation of the feature field.
///
/// The whole field shares one transform, so feature longitudes are derived on
/// demand rather than stored per feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    period: f64,
    phase_at_epoch: f64,
    epoch: f64,
}

impl Rotation {
    /// Create a rotation with period (days), phase at epoch (radians) and epoch (days)
    pub fn new(period: f64, phase_at_epoch: f64, epoch: f64) -> Result<Self, GeometryError> {
        if !period.is_finite() || period <= 0.0 {
            return Err(GeometryError::InvalidPeriod(period));
        }
        Ok(Self {
            period,
            phase_at_epoch,
            epoch,
        })
    }

    /// Rotation period in days
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Rotation phase at epoch in radians
    pub fn phase_at_epoch(&self) -> f64 {
        self.phase_at_epoch
    }

    /// Epoch in days
    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    /// Observer-frame longitude at time `t` (days) of a point fixed at `lon0`
    pub fn longitude_at(&self, lon0: f64, t: f64) -> f64 {
        advance_longitude(lon0, t - self.epoch, self.period, self.phase_at_epoch)
    }
}

/// Orthographic view of the star from a fixed observer direction.
///
/// Holds the rotation from the stellar frame to observer coordinates where
/// z points at the observer and y points toward the projected north pole.
#[derive(Debug, Clone)]
pub struct ObserverFrame {
    sub_observer: SurfacePoint,
    rotation_matrix: Matrix3<f64>,
}

impl ObserverFrame {
    /// Build the frame looking at the given sub-observer point
    pub fn new(sub_observer: SurfacePoint) -> Self {
        let z = sub_observer.to_unit_vector();

        // Toward the projected north pole; pole-on views fall back to the y axis
        let north = Vector3::new(0.0, 0.0, 1.0);
        let east = north.cross(&z);
        let east = if east.norm() < 1e-12 {
            Vector3::new(0.0, 1.0, 0.0)
        } else {
            east.normalize()
        };
        let y = z.cross(&east).normalize();
        let x = y.cross(&z).normalize();

        Self {
            sub_observer,
            rotation_matrix: Matrix3::from_columns(&[x, y, z]),
        }
    }

    /// Build the frame for a star seen at the given inclination (radians)
    pub fn from_inclination(inclination: f64) -> Self {
        Self::new(sub_observer_point(inclination))
    }

    /// The point at disk centre
    pub fn sub_observer(&self) -> SurfacePoint {
        self.sub_observer
    }

    /// Observer coordinates of a surface point; `z` equals μ
    pub fn to_observer(&self, point: &SurfacePoint) -> Vector3<f64> {
        self.rotation_matrix.transpose() * point.to_unit_vector()
    }

    /// Project a surface point onto the unit disk, `None` when on the far hemisphere
    pub fn project(&self, point: &SurfacePoint) -> Option<(f64, f64)> {
        let v = self.to_observer(point);
        if v.z < 0.0 {
            return None;
        }
        Some((v.x, v.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    #[test]
    fn test_separation_coincident_and_antipodal() {
        let p = SurfacePoint::from_degrees(23.0, 117.0);
        assert_eq!(angular_separation(&p, &p), 0.0);

        let anti = SurfacePoint::from_degrees(-23.0, 297.0);
        assert_relative_eq!(angular_separation(&p, &anti), PI, epsilon = 1e-7);
        assert!(!angular_separation(&p, &anti).is_nan());
    }

    #[test]
    fn test_separation_quarter_turn() {
        let a = SurfacePoint::from_degrees(0.0, 0.0);
        let b = SurfacePoint::from_degrees(0.0, 90.0);
        assert_relative_eq!(angular_separation(&a, &b), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_separation_at_poles_ignores_longitude() {
        let pole_a = SurfacePoint::from_degrees(90.0, 0.0);
        let pole_b = SurfacePoint::from_degrees(90.0, 200.0);
        assert!(angular_separation(&pole_a, &pole_b) < 1e-7);

        let equator = SurfacePoint::from_degrees(0.0, 42.0);
        assert_relative_eq!(
            angular_separation(&pole_b, &equator),
            FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_separation_matches_dot_product() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let a = SurfacePoint::new(rng.gen_range(-FRAC_PI_2..FRAC_PI_2), rng.gen_range(0.0..TAU));
            let b = SurfacePoint::new(rng.gen_range(-FRAC_PI_2..FRAC_PI_2), rng.gen_range(0.0..TAU));
            let dot = a.to_unit_vector().dot(&b.to_unit_vector()).clamp(-1.0, 1.0);
            assert_relative_eq!(angular_separation(&a, &b), dot.acos(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_visibility_weight() {
        let sub = SurfacePoint::from_degrees(0.0, 0.0);
        assert_relative_eq!(visibility_weight(&sub, &sub), 1.0, epsilon = 1e-12);

        let limb = SurfacePoint::from_degrees(0.0, 90.0);
        assert!(visibility_weight(&limb, &sub) < 1e-12);

        let far = SurfacePoint::from_degrees(0.0, 180.0);
        assert_eq!(visibility_weight(&far, &sub), 0.0);

        let sixty = SurfacePoint::from_degrees(0.0, 60.0);
        assert_relative_eq!(visibility_weight(&sixty, &sub), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_visibility_at_pole_for_pole_on_view() {
        let sub = sub_observer_point(0.0);
        for lon in [0.0, 45.0, 270.0] {
            let pole = SurfacePoint::from_degrees(90.0, lon);
            assert_relative_eq!(visibility_weight(&pole, &sub), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotated_longitude() {
        let lon = rotated_longitude(0.0, 2.5, 10.0, 0.0).unwrap();
        assert_relative_eq!(lon, FRAC_PI_2, epsilon = 1e-12);

        let wrapped = rotated_longitude(1.5 * PI, 5.0, 10.0, 0.0).unwrap();
        assert_relative_eq!(wrapped, FRAC_PI_2, epsilon = 1e-12);

        let backwards = rotated_longitude(0.0, -2.5, 10.0, 0.0).unwrap();
        assert_relative_eq!(backwards, 1.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_longitude_full_period() {
        let lon0 = 1.234;
        let lon = rotated_longitude(lon0, 7.3, 7.3, 0.0).unwrap();
        assert_relative_eq!(lon, lon0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_longitude_rejects_bad_period() {
        assert_eq!(
            rotated_longitude(0.0, 1.0, 0.0, 0.0),
            Err(GeometryError::InvalidPeriod(0.0))
        );
        assert!(rotated_longitude(0.0, 1.0, -3.0, 0.0).is_err());
        assert!(rotated_longitude(0.0, 1.0, f64::NAN, 0.0).is_err());
        assert!(Rotation::new(0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_wrap_longitude_range() {
        assert_eq!(wrap_longitude(-1e-20), 0.0);
        assert_relative_eq!(wrap_longitude(-FRAC_PI_2), 1.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_longitude(5.0 * PI), PI, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_uses_epoch() {
        let rotation = Rotation::new(4.0, 0.0, 100.0).unwrap();
        assert_relative_eq!(rotation.longitude_at(0.0, 101.0), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(rotation.longitude_at(0.3, 100.0), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_observer_frame_center_and_limb() {
        let frame = ObserverFrame::from_inclination(FRAC_PI_2);
        let center = frame.to_observer(&SurfacePoint::from_degrees(0.0, 0.0));
        assert_relative_eq!(center.z, 1.0, epsilon = 1e-12);

        let north = frame.project(&SurfacePoint::from_degrees(90.0, 0.0)).unwrap();
        assert_relative_eq!(north.0, 0.0, epsilon = 1e-12);
        assert_relative_eq!(north.1, 1.0, epsilon = 1e-12);

        assert!(frame.project(&SurfacePoint::from_degrees(0.0, 180.0)).is_none());
    }

    #[test]
    fn test_observer_z_matches_mu() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let inclination = rng.gen_range(0.0..PI);
            let frame = ObserverFrame::from_inclination(inclination);
            let p = SurfacePoint::new(rng.gen_range(-FRAC_PI_2..FRAC_PI_2), rng.gen_range(0.0..TAU));
            let mu = cos_angle_from_disk_center(&p, &frame.sub_observer());
            assert_relative_eq!(frame.to_observer(&p).z, mu, epsilon = 1e-9);
        }
    }
}
