//! Star configuration
//!
//! One JSON document describes a run: stellar parameters, viewing geometry,
//! the emitters for each feature class and how coverage is integrated.
//! Missing fields fall back to a mid-M dwarf with sunspot-like activity.

use crate::coverage::{ClassPriority, CoverageMethod};
use crate::feature::FeatureClass;
use crate::geometry::Rotation;
use crate::generator::EmitterConfig;
use crate::units::{Length, LengthExt, Temperature, TemperatureExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from invalid or unreadable configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("rotation period {0} days must be finite and positive")]
    InvalidPeriod(f64),

    #[error("inclination {0}° must lie in [0, 180]")]
    InvalidInclination(f64),

    #[error("phase at epoch {0}° must be finite")]
    InvalidPhase(f64),

    #[error("epoch {0} days must be finite")]
    InvalidEpoch(f64),

    #[error("stellar radius {0} R☉ must be finite and positive")]
    InvalidRadius(f64),

    #[error("photosphere temperature {0} K must be finite and positive")]
    InvalidTemperature(f64),

    #[error("{class} emergence rate {value} must be finite and positive")]
    InvalidRate { class: FeatureClass, value: f64 },

    #[error("distribution parameter {param} = {value} is out of range")]
    InvalidDistribution { param: &'static str, value: f64 },

    #[error("invalid growth profile: {0}")]
    InvalidProfile(String),

    #[error("invalid class priority: {0}")]
    InvalidPriority(String),

    #[error("raster resolution {0} must be at least 2")]
    InvalidResolution(usize),

    #[error("spin-up duration {0} days must be finite and non-negative")]
    InvalidSpinUp(f64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything needed to build a [`crate::Star`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarConfig {
    /// Rotation period in days
    pub rotation_period_days: f64,
    /// Angle between rotation axis and line of sight in degrees (90 = equator-on)
    pub inclination_deg: f64,
    /// Rotation phase at epoch in degrees
    pub phase_at_epoch_deg: f64,
    /// Time origin of the rotation and of the simulation, in days
    pub epoch_days: f64,
    /// Stellar radius in nominal solar radii
    pub radius_solar: f64,
    /// Quiet photosphere effective temperature in Kelvin
    pub teff_k: f64,
    /// Emergence processes; an empty list keeps the star spotless
    pub emitters: Vec<EmitterConfig>,
    /// Overlap precedence, highest first
    pub class_priority: ClassPriority,
    pub coverage_method: CoverageMethod,
    /// Seed for the feature emergence stream
    pub seed: u64,
    /// Days of activity simulated before the epoch so the map starts mature
    pub spin_up_days: f64,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            rotation_period_days: 10.0,
            inclination_deg: 90.0,
            phase_at_epoch_deg: 0.0,
            epoch_days: 0.0,
            radius_solar: 0.15,
            teff_k: 3300.0,
            emitters: vec![EmitterConfig::solar_spots(), EmitterConfig::solar_faculae()],
            class_priority: ClassPriority::default(),
            coverage_method: CoverageMethod::default(),
            seed: 0,
            spin_up_days: 0.0,
        }
    }
}

impl StarConfig {
    /// A featureless star with the default geometry
    pub fn quiet() -> Self {
        Self {
            emitters: Vec::new(),
            ..Self::default()
        }
    }

    /// Fail fast on the first invalid parameter
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rotation_period_days.is_finite() || self.rotation_period_days <= 0.0 {
            return Err(ConfigError::InvalidPeriod(self.rotation_period_days));
        }
        if !(0.0..=180.0).contains(&self.inclination_deg) {
            return Err(ConfigError::InvalidInclination(self.inclination_deg));
        }
        if !self.phase_at_epoch_deg.is_finite() {
            return Err(ConfigError::InvalidPhase(self.phase_at_epoch_deg));
        }
        if !self.epoch_days.is_finite() {
            return Err(ConfigError::InvalidEpoch(self.epoch_days));
        }
        if !self.radius_solar.is_finite() || self.radius_solar <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius_solar));
        }
        if !self.teff_k.is_finite() || self.teff_k <= 0.0 {
            return Err(ConfigError::InvalidTemperature(self.teff_k));
        }
        if !self.spin_up_days.is_finite() || self.spin_up_days < 0.0 {
            return Err(ConfigError::InvalidSpinUp(self.spin_up_days));
        }
        for emitter in &self.emitters {
            emitter.validate()?;
        }
        self.coverage_method.validate()?;
        Ok(())
    }

    pub fn stellar_radius(&self) -> Length {
        Length::from_solar_radii(self.radius_solar)
    }

    pub fn photosphere_temperature(&self) -> Temperature {
        Temperature::from_kelvin(self.teff_k)
    }

    /// Inclination in radians
    pub fn inclination(&self) -> f64 {
        self.inclination_deg.to_radians()
    }

    /// Rotation of the feature field
    pub fn rotation(&self) -> Result<Rotation, ConfigError> {
        Rotation::new(
            self.rotation_period_days,
            self.phase_at_epoch_deg.to_radians(),
            self.epoch_days,
        )
        .map_err(|_| ConfigError::InvalidPeriod(self.rotation_period_days))
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{EmergenceRate, LatitudeLaw};
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_valid() {
        let config = StarConfig::default();
        config.validate().unwrap();
        assert_eq!(config.emitters.len(), 2);
        assert!((config.stellar_radius().as_solar_radii() - 0.15).abs() < 1e-12);
        StarConfig::quiet().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = StarConfig::default();
        config.seed = 1234;
        config.inclination_deg = 60.0;
        config.emitters[0].latitude = LatitudeLaw::Isotropic;

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = StarConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: StarConfig =
            serde_json::from_str(r#"{ "rotation_period_days": 3.5, "emitters": [] }"#).unwrap();
        assert_eq!(config.rotation_period_days, 3.5);
        assert_eq!(config.teff_k, 3300.0);
        assert!(config.emitters.is_empty());
    }

    fn invalid(config: StarConfig) -> ConfigError {
        config.validate().unwrap_err()
    }

    #[test]
    fn test_validation_failures() {
        let base = StarConfig::default;
        assert!(matches!(
            invalid(StarConfig {
                rotation_period_days: 0.0,
                ..base()
            }),
            ConfigError::InvalidPeriod(_)
        ));
        assert!(matches!(
            invalid(StarConfig {
                inclination_deg: 190.0,
                ..base()
            }),
            ConfigError::InvalidInclination(_)
        ));
        assert!(matches!(
            invalid(StarConfig {
                radius_solar: -1.0,
                ..base()
            }),
            ConfigError::InvalidRadius(_)
        ));
        assert!(matches!(
            invalid(StarConfig {
                teff_k: f64::NAN,
                ..base()
            }),
            ConfigError::InvalidTemperature(_)
        ));
        assert!(matches!(
            invalid(StarConfig {
                spin_up_days: -2.0,
                ..base()
            }),
            ConfigError::InvalidSpinUp(_)
        ));
        assert!(matches!(
            invalid(StarConfig {
                coverage_method: CoverageMethod::Raster { resolution: 1 },
                ..base()
            }),
            ConfigError::InvalidResolution(1)
        ));
        assert!(matches!(
            invalid(StarConfig {
                emitters: vec![EmitterConfig {
                    rate: EmergenceRate::PerSteradian(-0.5),
                    ..EmitterConfig::solar_spots()
                }],
                ..base()
            }),
            ConfigError::InvalidRate {
                class: FeatureClass::Spot,
                ..
            }
        ));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "rotation_period_days": -4.0 }"#).unwrap();
        assert!(matches!(
            StarConfig::load_from_file(file.path()),
            Err(ConfigError::InvalidPeriod(_))
        ));

        std::fs::write(file.path(), "not json").unwrap();
        assert!(matches!(
            StarConfig::load_from_file(file.path()),
            Err(ConfigError::Json(_))
        ));

        std::fs::write(file.path(), r#"{ "class_priority": ["spot", "spot"] }"#).unwrap();
        assert!(matches!(
            StarConfig::load_from_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }
}
