//! Discrete photospheric features and their growth/decay lifecycle
//!
//! A feature is a circular cap on the stellar surface (a starspot or a
//! facula) whose angular radius is a pure function of time. It is created at
//! `creation_time` with zero radius, grows monotonically to its peak radius at
//! `peak_time`, and decays monotonically back to exactly zero at `death_time`.
//! The shape of the ramps is set by a [`GrowthProfile`].

use crate::geometry::SurfacePoint;
use crate::units::{Temperature, TemperatureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when a feature's parameters break its lifecycle contract
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("peak radius {0} rad must be finite, positive and at most π")]
    InvalidPeakRadius(f64),

    #[error("lifetime {0} days must be finite and positive")]
    InvalidLifetime(f64),

    #[error("growth fraction {0} must lie strictly between 0 and 1")]
    InvalidGrowthFraction(f64),

    #[error("creation time {0} must be finite")]
    InvalidCreationTime(f64),

    #[error("invalid growth profile: {0}")]
    InvalidProfile(String),

    #[error("spot area over umbra area {0} must be finite and at least 1")]
    InvalidAreaOverUmbra(f64),

    #[error("inconsistent lifecycle times for feature {id}: creation {creation}, peak {peak}, death {death}")]
    InconsistentTimes {
        id: FeatureId,
        creation: f64,
        peak: f64,
        death: f64,
    },
}

/// Opaque feature identifier, unique within one simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out compact, monotonically increasing feature ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Start allocating from the given id
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Take the next id
    pub fn allocate(&mut self) -> FeatureId {
        let id = FeatureId(self.next);
        self.next += 1;
        id
    }

    /// The id the next call to [`IdAllocator::allocate`] will return
    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Surface feature classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureClass {
    /// Cool, dark starspot
    Spot,
    /// Hot, bright facula
    Facula,
}

impl FeatureClass {
    /// Every feature class
    pub const ALL: [FeatureClass; 2] = [FeatureClass::Spot, FeatureClass::Facula];

    /// Lower-case class name
    pub fn name(&self) -> &'static str {
        match self {
            FeatureClass::Spot => "spot",
            FeatureClass::Facula => "facula",
        }
    }
}

impl fmt::Display for FeatureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Radiative contrast of a feature relative to the quiet photosphere.
///
/// Coverage only reads the umbra share of spots, which splits spot coverage
/// into umbra and penumbra. The temperatures are carried so the spectral
/// consumer can pick per-component templates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Contrast {
    /// Spot with a dark umbra inside a warmer penumbra
    Spot {
        /// Umbra effective temperature (K)
        umbra_teff_k: f64,
        /// Penumbra effective temperature (K)
        penumbra_teff_k: f64,
        /// Ratio of total spot area to umbra area
        area_over_umbra: f64,
    },
    /// Facula brighter than the surrounding photosphere
    Facula {
        /// Temperature excess over the photosphere (K)
        teff_offset_k: f64,
    },
}

impl Contrast {
    /// Feature class this contrast describes
    pub fn class(&self) -> FeatureClass {
        match self {
            Contrast::Spot { .. } => FeatureClass::Spot,
            Contrast::Facula { .. } => FeatureClass::Facula,
        }
    }

    /// Share of the feature's area taken by the umbra, `None` for faculae
    pub fn umbra_area_fraction(&self) -> Option<f64> {
        match *self {
            Contrast::Spot {
                area_over_umbra, ..
            } => Some(1.0 / area_over_umbra),
            Contrast::Facula { .. } => None,
        }
    }

    /// Area-weighted effective temperature of the feature on a photosphere of `photosphere` temperature
    pub fn effective_temperature(&self, photosphere: Temperature) -> Temperature {
        match *self {
            Contrast::Spot {
                umbra_teff_k,
                penumbra_teff_k,
                area_over_umbra,
            } => {
                let umbra_fraction = 1.0 / area_over_umbra;
                Temperature::from_kelvin(
                    umbra_fraction * umbra_teff_k + (1.0 - umbra_fraction) * penumbra_teff_k,
                )
            }
            Contrast::Facula { teff_offset_k } => {
                Temperature::from_kelvin(photosphere.as_kelvin() + teff_offset_k)
            }
        }
    }
}

/// Shape of the radius ramps between creation, peak and death.
///
/// Each variant maps normalised growth progress `s ∈ [0, 1]` to a radius
/// fraction rising from 0 to 1, and normalised decay progress `u ∈ [0, 1]` to
/// a fraction falling from 1 to 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthProfile {
    /// `s^growth_exponent` up, `(1 − u)^decay_exponent` down
    PowerLaw {
        growth_exponent: f64,
        decay_exponent: f64,
    },
    /// Cubic Hermite ramp `3s² − 2s³`, mirrored for decay
    Smoothstep,
}

impl Default for GrowthProfile {
    fn default() -> Self {
        Self::linear_area()
    }
}

impl GrowthProfile {
    /// Area grows and decays linearly in time (radius follows a square root)
    pub fn linear_area() -> Self {
        GrowthProfile::PowerLaw {
            growth_exponent: 0.5,
            decay_exponent: 0.5,
        }
    }

    /// Check the exponents keep the ramps monotone and anchored at zero
    pub fn validate(&self) -> Result<(), FeatureError> {
        if let GrowthProfile::PowerLaw {
            growth_exponent,
            decay_exponent,
        } = *self
        {
            for (name, p) in [("growth", growth_exponent), ("decay", decay_exponent)] {
                if !p.is_finite() || p <= 0.0 {
                    return Err(FeatureError::InvalidProfile(format!(
                        "{name} exponent {p} must be finite and positive"
                    )));
                }
            }
        }
        Ok(())
    }

    fn rising(&self, s: f64) -> f64 {
        match *self {
            GrowthProfile::PowerLaw {
                growth_exponent, ..
            } => s.powf(growth_exponent),
            GrowthProfile::Smoothstep => s * s * (3.0 - 2.0 * s),
        }
    }

    fn falling(&self, u: f64) -> f64 {
        match *self {
            GrowthProfile::PowerLaw { decay_exponent, .. } => (1.0 - u).powf(decay_exponent),
            GrowthProfile::Smoothstep => 1.0 - u * u * (3.0 - 2.0 * u),
        }
    }

    /// Time average of `(r / r_peak)²` over a lifetime.
    ///
    /// Multiplying by the peak solid angle and lifetime gives the
    /// time-integrated covered solid angle of one feature.
    pub fn mean_square_shape(&self, growth_fraction: f64) -> f64 {
        let (rise, fall) = match *self {
            GrowthProfile::PowerLaw {
                growth_exponent,
                decay_exponent,
            } => (
                1.0 / (2.0 * growth_exponent + 1.0),
                1.0 / (2.0 * decay_exponent + 1.0),
            ),
            // ∫₀¹ (3s² − 2s³)² ds, identical for the mirrored decay
            GrowthProfile::Smoothstep => (13.0 / 35.0, 13.0 / 35.0),
        };
        growth_fraction * rise + (1.0 - growth_fraction) * fall
    }
}

/// Where a feature is in its lifecycle at a given time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Creation time not yet reached
    Pending,
    /// Between creation and peak
    Growing,
    /// Between peak and death
    Decaying,
    /// At or past death time; never regrows
    Dead,
}

/// A single spot or facula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    id: FeatureId,
    location: SurfacePoint,
    peak_radius: f64,
    creation_time: f64,
    peak_time: f64,
    death_time: f64,
    profile: GrowthProfile,
    contrast: Contrast,
}

impl Feature {
    /// Create a feature; the class follows from its contrast.
    ///
    /// # Arguments
    /// * `id` - Unique identifier
    /// * `location` - Centre in the co-rotating frame
    /// * `peak_radius` - Maximum angular radius in radians
    /// * `creation_time` - Birth time in days
    /// * `lifetime` - Days from creation to death
    /// * `growth_fraction` - Fraction of the lifetime spent growing
    /// * `profile` - Ramp shape
    /// * `contrast` - Radiative contrast (and class)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: FeatureId,
        location: SurfacePoint,
        peak_radius: f64,
        creation_time: f64,
        lifetime: f64,
        growth_fraction: f64,
        profile: GrowthProfile,
        contrast: Contrast,
    ) -> Result<Self, FeatureError> {
        if !lifetime.is_finite() || lifetime <= 0.0 {
            return Err(FeatureError::InvalidLifetime(lifetime));
        }
        if !(growth_fraction > 0.0 && growth_fraction < 1.0) {
            return Err(FeatureError::InvalidGrowthFraction(growth_fraction));
        }
        let feature = Self {
            id,
            location,
            peak_radius,
            creation_time,
            peak_time: creation_time + growth_fraction * lifetime,
            death_time: creation_time + lifetime,
            profile,
            contrast,
        };
        feature.validate()?;
        Ok(feature)
    }

    /// Re-check the invariants, e.g. after deserialising a snapshot
    pub fn validate(&self) -> Result<(), FeatureError> {
        if !self.peak_radius.is_finite()
            || self.peak_radius <= 0.0
            || self.peak_radius > std::f64::consts::PI
        {
            return Err(FeatureError::InvalidPeakRadius(self.peak_radius));
        }
        if !self.creation_time.is_finite() {
            return Err(FeatureError::InvalidCreationTime(self.creation_time));
        }
        if !(self.creation_time <= self.peak_time
            && self.peak_time <= self.death_time
            && self.creation_time < self.death_time
            && self.death_time.is_finite())
        {
            return Err(FeatureError::InconsistentTimes {
                id: self.id,
                creation: self.creation_time,
                peak: self.peak_time,
                death: self.death_time,
            });
        }
        if let Contrast::Spot {
            area_over_umbra, ..
        } = self.contrast
        {
            if !area_over_umbra.is_finite() || area_over_umbra < 1.0 {
                return Err(FeatureError::InvalidAreaOverUmbra(area_over_umbra));
            }
        }
        self.profile.validate()
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn class(&self) -> FeatureClass {
        self.contrast.class()
    }

    /// Centre in the co-rotating frame
    pub fn location(&self) -> SurfacePoint {
        self.location
    }

    /// Maximum angular radius in radians
    pub fn peak_radius(&self) -> f64 {
        self.peak_radius
    }

    pub fn creation_time(&self) -> f64 {
        self.creation_time
    }

    pub fn peak_time(&self) -> f64 {
        self.peak_time
    }

    pub fn death_time(&self) -> f64 {
        self.death_time
    }

    pub fn profile(&self) -> GrowthProfile {
        self.profile
    }

    pub fn contrast(&self) -> Contrast {
        self.contrast
    }

    /// Lifecycle phase at time `t`
    pub fn phase_at(&self, t: f64) -> LifecyclePhase {
        if t < self.creation_time {
            LifecyclePhase::Pending
        } else if t >= self.death_time {
            LifecyclePhase::Dead
        } else if t <= self.peak_time {
            LifecyclePhase::Growing
        } else {
            LifecyclePhase::Decaying
        }
    }

    /// True once the radius is zero for all later times
    pub fn is_dead_at(&self, t: f64) -> bool {
        t >= self.death_time
    }

    /// Angular radius in radians at time `t`
    pub fn radius_at(&self, t: f64) -> f64 {
        if t <= self.creation_time || t >= self.death_time {
            return 0.0;
        }

        let fraction = if t <= self.peak_time {
            let span = self.peak_time - self.creation_time;
            let s = if span > 0.0 {
                (t - self.creation_time) / span
            } else {
                1.0
            };
            self.profile.rising(s.clamp(0.0, 1.0))
        } else {
            let span = self.death_time - self.peak_time;
            let u = if span > 0.0 {
                (t - self.peak_time) / span
            } else {
                1.0
            };
            self.profile.falling(u.clamp(0.0, 1.0))
        };

        (self.peak_radius * fraction).max(0.0)
    }
}
