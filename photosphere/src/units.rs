//! Type-safe physical units for stellar surface modelling
//!
//! Stellar radii and feature temperatures are carried as `uom` quantities so the
//! conversions between kilometres, solar radii and angular sizes on the stellar
//! sphere happen in one place. Feature areas follow the heliophysics convention
//! of micro-solar hemispheres (MSH).

use uom::si::f64::*;
use uom::si::length::{kilometer, meter};
use uom::si::thermodynamic_temperature::kelvin;

/// Type alias for temperature with convenient methods
pub type Temperature = ThermodynamicTemperature;

/// Type alias for length measurements with convenient methods
pub type Length = uom::si::f64::Length;

/// Nominal solar radius in kilometres (IAU 2015 B3)
pub const SOLAR_RADIUS_KM: f64 = 695_700.0;

/// One micro-solar hemisphere as a fraction of the solar hemisphere
const MSH_PER_HEMISPHERE: f64 = 1e-6;

/// Extension trait for temperature conversions
pub trait TemperatureExt {
    /// Create temperature from Kelvin
    fn from_kelvin(kelvin: f64) -> Self;

    /// Get temperature in Kelvin
    fn as_kelvin(&self) -> f64;
}

/// Extension trait for the length scales used on stellar surfaces
pub trait LengthExt {
    /// Create length from kilometres (feature sizes)
    fn from_kilometers(km: f64) -> Self;

    /// Get length in kilometres
    fn as_kilometers(&self) -> f64;

    /// Create length from nominal solar radii (stellar radii)
    fn from_solar_radii(r_sun: f64) -> Self;

    /// Get length in nominal solar radii
    fn as_solar_radii(&self) -> f64;
}

impl TemperatureExt for Temperature {
    fn from_kelvin(k: f64) -> Self {
        Temperature::new::<kelvin>(k)
    }

    fn as_kelvin(&self) -> f64 {
        self.get::<kelvin>()
    }
}

impl LengthExt for Length {
    fn from_kilometers(km: f64) -> Self {
        Length::new::<kilometer>(km)
    }

    fn as_kilometers(&self) -> f64 {
        self.get::<kilometer>()
    }

    fn from_solar_radii(r_sun: f64) -> Self {
        Length::new::<meter>(r_sun * SOLAR_RADIUS_KM * 1000.0)
    }

    fn as_solar_radii(&self) -> f64 {
        self.get::<kilometer>() / SOLAR_RADIUS_KM
    }
}

/// Fraction of the stellar hemisphere covered by one MSH on a star of the given radius.
///
/// An MSH is defined against the Sun, so on a smaller star the same physical
/// area covers a larger fraction of the surface.
fn hemisphere_fraction_per_msh(star_radius: Length) -> f64 {
    let ratio = 1.0 / star_radius.as_solar_radii();
    MSH_PER_HEMISPHERE * ratio * ratio
}

/// Solid angle (steradians of stellar surface) of one MSH on a star of the given radius
pub fn msh_solid_angle(star_radius: Length) -> f64 {
    2.0 * std::f64::consts::PI * hemisphere_fraction_per_msh(star_radius)
}

/// Angular radius (radians) of a circular cap with the given area in MSH.
///
/// Uses the exact cap relation `A = 2πR²(1 − cos θ)` written as
/// `sin²(θ/2) = A / 4πR²` so tiny caps keep full precision; areas larger than
/// the whole star saturate at θ = π.
pub fn msh_to_angular_radius(area_msh: f64, star_radius: Length) -> f64 {
    let half_sin_sq = 0.5 * area_msh * hemisphere_fraction_per_msh(star_radius);
    2.0 * half_sin_sq.clamp(0.0, 1.0).sqrt().asin()
}

/// Area in MSH of a circular cap with the given angular radius (radians)
pub fn angular_radius_to_msh(theta: f64, star_radius: Length) -> f64 {
    (1.0 - theta.cos()) / hemisphere_fraction_per_msh(star_radius)
}

/// Angular radius (radians) of a feature with a physical radius measured along the surface
pub fn length_to_angular_radius(radius: Length, star_radius: Length) -> f64 {
    (radius.as_kilometers() / star_radius.as_kilometers()).min(std::f64::consts::PI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_temperature_conversions() {
        let t = Temperature::from_kelvin(3300.0);
        assert_relative_eq!(t.as_kelvin(), 3300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_length_conversions() {
        let sun = Length::from_solar_radii(1.0);
        assert_relative_eq!(sun.as_kilometers(), SOLAR_RADIUS_KM, epsilon = 1e-6);

        let dwarf = Length::from_solar_radii(0.15);
        assert_relative_eq!(dwarf.as_solar_radii(), 0.15, epsilon = 1e-12);
        assert_relative_eq!(dwarf.as_kilometers(), 104_355.0, epsilon = 1e-6);
    }

    #[test]
    fn test_msh_round_trip() {
        let star = Length::from_solar_radii(0.15);
        let theta = msh_to_angular_radius(500.0, star);
        assert!(theta > 0.0 && theta < 0.5);
        assert_relative_eq!(angular_radius_to_msh(theta, star), 500.0, max_relative = 1e-9);
    }

    #[test]
    fn test_msh_on_sun() {
        // A full hemisphere is 1e6 MSH and subtends a cap of radius π/2
        let sun = Length::from_solar_radii(1.0);
        assert_relative_eq!(
            msh_to_angular_radius(1e6, sun),
            std::f64::consts::FRAC_PI_2,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            msh_solid_angle(sun),
            2.0 * std::f64::consts::PI * 1e-6,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_oversized_area_saturates() {
        let star = Length::from_solar_radii(0.1);
        assert_relative_eq!(
            msh_to_angular_radius(1e9, star),
            std::f64::consts::PI,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_length_to_angular_radius() {
        let star = Length::from_solar_radii(0.15);
        let r = Length::from_kilometers(10_435.5);
        assert_relative_eq!(length_to_angular_radius(r, star), 0.1, epsilon = 1e-9);
    }
}
