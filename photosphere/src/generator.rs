//! Stochastic emergence of spots and faculae
//!
//! Each configured emitter is an independent Poisson process in time and
//! solid angle. Births in an interval are drawn all at once, ordered by
//! creation time, and only then given ids so the id order matches the birth
//! order.

use crate::config::ConfigError;
use crate::feature::{
    Contrast, Feature, FeatureClass, FeatureError, GrowthProfile, IdAllocator,
};
use crate::geometry::SurfacePoint;
use crate::units::{
    angular_radius_to_msh, length_to_angular_radius, msh_solid_angle, msh_to_angular_radius,
    Length, LengthExt,
};
use log::{debug, warn};
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal, Poisson};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use thiserror::Error;

/// Errors raised while drawing features
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("generation interval [{t0}, {t1}) must be finite and ordered")]
    InvalidInterval { t0: f64, t1: f64 },

    #[error("expected {0} births is not a valid Poisson mean")]
    InvalidBirthMean(f64),

    #[error("sampled feature is invalid: {0}")]
    Feature(#[from] FeatureError),
}

/// How often features of one class emerge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergenceRate {
    /// Births per day per steradian of stellar surface
    PerSteradian(f64),
    /// Long-run mean fraction of the sphere covered by this class; the birth
    /// rate is derived from the mean time-integrated feature area
    EquilibriumCoverage(f64),
}

/// Latitude distribution of new features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LatitudeLaw {
    /// Uniform over the sphere
    Isotropic,
    /// Two bands mirrored about the equator
    ActiveBands { mean_deg: f64, sigma_deg: f64 },
}

/// Peak size distribution of new features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizeDistribution {
    /// Log-normal peak area in micro-solar hemispheres
    LogNormalArea { median_msh: f64, sigma: f64 },
    /// Log-normal peak radius in kilometres
    LogNormalRadius { median_km: f64, sigma: f64 },
}

/// Lifetime distribution of new features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifetimeDistribution {
    /// Log-normal lifetime, independent of size
    LogNormal { median_days: f64, sigma: f64 },
    /// Lifetime set by a constant area decay rate after the peak
    AreaDecay { decay_rate_msh_per_day: f64 },
}

/// Radiative contrast drawn for new features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContrastModel {
    /// Spots with fixed umbra/penumbra temperatures and a normal area ratio,
    /// resampled until at least 1
    Spot {
        umbra_teff_k: f64,
        penumbra_teff_k: f64,
        area_over_umbra_mean: f64,
        area_over_umbra_sigma: f64,
    },
    /// Faculae with a fixed temperature excess
    Facula { teff_offset_k: f64 },
}

impl ContrastModel {
    pub fn class(&self) -> FeatureClass {
        match self {
            ContrastModel::Spot { .. } => FeatureClass::Spot,
            ContrastModel::Facula { .. } => FeatureClass::Facula,
        }
    }
}

/// Emergence process for one feature class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub rate: EmergenceRate,
    pub latitude: LatitudeLaw,
    pub size: SizeDistribution,
    pub lifetime: LifetimeDistribution,
    /// Fraction of the lifetime spent growing, in (0, 1)
    pub growth_fraction: f64,
    #[serde(default)]
    pub profile: GrowthProfile,
    pub contrast: ContrastModel,
}

impl EmitterConfig {
    /// Sunspot-like emitter scaled for an M dwarf: 5% equilibrium coverage,
    /// ±15° active bands, 500 MSH median area, 10.89 MSH/day decay.
    pub fn solar_spots() -> Self {
        Self {
            rate: EmergenceRate::EquilibriumCoverage(0.05),
            latitude: LatitudeLaw::ActiveBands {
                mean_deg: 15.0,
                sigma_deg: 5.0,
            },
            size: SizeDistribution::LogNormalArea {
                median_msh: 500.0,
                sigma: 0.2,
            },
            lifetime: LifetimeDistribution::AreaDecay {
                decay_rate_msh_per_day: 10.89,
            },
            growth_fraction: 0.15,
            profile: GrowthProfile::linear_area(),
            contrast: ContrastModel::Spot {
                umbra_teff_k: 2700.0,
                penumbra_teff_k: 2900.0,
                area_over_umbra_mean: 5.0,
                area_over_umbra_sigma: 1.0,
            },
        }
    }

    /// Short-lived, granulation-scale faculae spread over the whole sphere
    pub fn solar_faculae() -> Self {
        Self {
            rate: EmergenceRate::EquilibriumCoverage(0.01),
            latitude: LatitudeLaw::Isotropic,
            size: SizeDistribution::LogNormalRadius {
                median_km: 8000.0,
                sigma: 0.2,
            },
            lifetime: LifetimeDistribution::LogNormal {
                median_days: 0.5,
                sigma: 0.2,
            },
            growth_fraction: 0.5,
            profile: GrowthProfile::Smoothstep,
            contrast: ContrastModel::Facula {
                teff_offset_k: 100.0,
            },
        }
    }

    /// Class of the features this emitter produces
    pub fn class(&self) -> FeatureClass {
        self.contrast.class()
    }

    /// Check every parameter, failing on the first bad one
    pub fn validate(&self) -> Result<(), ConfigError> {
        let class = self.class();
        match self.rate {
            EmergenceRate::PerSteradian(rate) => {
                if !rate.is_finite() || rate <= 0.0 {
                    return Err(ConfigError::InvalidRate { class, value: rate });
                }
            }
            EmergenceRate::EquilibriumCoverage(fraction) => {
                if !(fraction > 0.0 && fraction < 1.0) {
                    return Err(ConfigError::InvalidRate {
                        class,
                        value: fraction,
                    });
                }
            }
        }

        if let LatitudeLaw::ActiveBands {
            mean_deg,
            sigma_deg,
        } = self.latitude
        {
            require(mean_deg.is_finite() && mean_deg.abs() <= 90.0, "latitude mean_deg", mean_deg)?;
            require(sigma_deg.is_finite() && sigma_deg >= 0.0, "latitude sigma_deg", sigma_deg)?;
        }

        let (median, sigma) = match self.size {
            SizeDistribution::LogNormalArea { median_msh, sigma } => (median_msh, sigma),
            SizeDistribution::LogNormalRadius { median_km, sigma } => (median_km, sigma),
        };
        require(median.is_finite() && median > 0.0, "size median", median)?;
        require(sigma.is_finite() && sigma >= 0.0, "size sigma", sigma)?;

        match self.lifetime {
            LifetimeDistribution::LogNormal { median_days, sigma } => {
                require(
                    median_days.is_finite() && median_days > 0.0,
                    "lifetime median_days",
                    median_days,
                )?;
                require(sigma.is_finite() && sigma >= 0.0, "lifetime sigma", sigma)?;
            }
            LifetimeDistribution::AreaDecay {
                decay_rate_msh_per_day,
            } => {
                require(
                    decay_rate_msh_per_day.is_finite() && decay_rate_msh_per_day > 0.0,
                    "lifetime decay_rate_msh_per_day",
                    decay_rate_msh_per_day,
                )?;
            }
        }

        require(
            self.growth_fraction > 0.0 && self.growth_fraction < 1.0,
            "growth_fraction",
            self.growth_fraction,
        )?;
        self.profile
            .validate()
            .map_err(|e| ConfigError::InvalidProfile(e.to_string()))?;

        match self.contrast {
            ContrastModel::Spot {
                umbra_teff_k,
                penumbra_teff_k,
                area_over_umbra_mean,
                area_over_umbra_sigma,
            } => {
                require(umbra_teff_k.is_finite() && umbra_teff_k > 0.0, "umbra_teff_k", umbra_teff_k)?;
                require(
                    penumbra_teff_k.is_finite() && penumbra_teff_k > 0.0,
                    "penumbra_teff_k",
                    penumbra_teff_k,
                )?;
                require(
                    area_over_umbra_mean.is_finite() && area_over_umbra_mean >= 1.0,
                    "area_over_umbra_mean",
                    area_over_umbra_mean,
                )?;
                require(
                    area_over_umbra_sigma.is_finite() && area_over_umbra_sigma >= 0.0,
                    "area_over_umbra_sigma",
                    area_over_umbra_sigma,
                )?;
            }
            ContrastModel::Facula { teff_offset_k } => {
                require(teff_offset_k.is_finite(), "teff_offset_k", teff_offset_k)?;
            }
        }
        Ok(())
    }
}

fn require(ok: bool, param: &'static str, value: f64) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidDistribution { param, value })
    }
}

/// Log-normal peak solid angle: (median steradians, log-space sigma).
///
/// Exact for area sizes; radius sizes use the small-cap relation Ω ≈ πθ².
fn solid_angle_lognormal(size: SizeDistribution, star_radius: Length) -> (f64, f64) {
    match size {
        SizeDistribution::LogNormalArea { median_msh, sigma } => {
            (median_msh * msh_solid_angle(star_radius), sigma)
        }
        SizeDistribution::LogNormalRadius { median_km, sigma } => {
            let theta = length_to_angular_radius(Length::from_kilometers(median_km), star_radius);
            (PI * theta * theta, 2.0 * sigma)
        }
    }
}

/// Births per day per steradian that hold the mean covered fraction at `coverage`.
///
/// At equilibrium the covered fraction of the sphere equals the birth density
/// times the expected time integral of one feature's solid angle,
/// `k · E[Ω_peak · L]` with `k` the profile's mean square shape.
fn equilibrium_rate(config: &EmitterConfig, coverage: f64, star_radius: Length) -> f64 {
    let (omega_median, s) = solid_angle_lognormal(config.size, star_radius);
    let shape = config.profile.mean_square_shape(config.growth_fraction);

    let mean_omega_lifetime = match config.lifetime {
        LifetimeDistribution::LogNormal { median_days, sigma } => {
            omega_median * (0.5 * s * s).exp() * median_days * (0.5 * sigma * sigma).exp()
        }
        LifetimeDistribution::AreaDecay {
            decay_rate_msh_per_day,
        } => {
            // L = Ω / (Ω_msh · W · (1 − g)), so E[Ω·L] needs E[Ω²]
            let mean_omega_sq = omega_median * omega_median * (2.0 * s * s).exp();
            mean_omega_sq
                / (msh_solid_angle(star_radius)
                    * decay_rate_msh_per_day
                    * (1.0 - config.growth_fraction))
        }
    };

    coverage / (shape * mean_omega_lifetime)
}

#[derive(Debug, Clone)]
enum SizeSampler {
    Area(LogNormal<f64>),
    Radius(LogNormal<f64>),
}

#[derive(Debug, Clone)]
enum LifetimeSampler {
    LogNormal(LogNormal<f64>),
    AreaDecay(f64),
}

#[derive(Debug, Clone)]
enum ContrastSampler {
    Spot {
        umbra_teff_k: f64,
        penumbra_teff_k: f64,
        area_over_umbra: Normal<f64>,
    },
    Facula(f64),
}

/// Validated emitter with its distributions built once
#[derive(Debug, Clone)]
struct Emitter {
    class: FeatureClass,
    rate_per_sr: f64,
    latitude: Option<Normal<f64>>,
    size: SizeSampler,
    lifetime: LifetimeSampler,
    growth_fraction: f64,
    profile: GrowthProfile,
    contrast: ContrastSampler,
}

impl Emitter {
    fn new(config: &EmitterConfig, star_radius: Length) -> Result<Self, ConfigError> {
        config.validate()?;

        let bad = |param: &'static str, value: f64| ConfigError::InvalidDistribution { param, value };

        let rate_per_sr = match config.rate {
            EmergenceRate::PerSteradian(rate) => rate,
            EmergenceRate::EquilibriumCoverage(fraction) => {
                equilibrium_rate(config, fraction, star_radius)
            }
        };
        if !rate_per_sr.is_finite() || rate_per_sr <= 0.0 {
            return Err(ConfigError::InvalidRate {
                class: config.class(),
                value: rate_per_sr,
            });
        }

        let latitude = match config.latitude {
            LatitudeLaw::Isotropic => None,
            LatitudeLaw::ActiveBands {
                mean_deg,
                sigma_deg,
            } => Some(Normal::new(mean_deg, sigma_deg).map_err(|_| bad("latitude sigma_deg", sigma_deg))?),
        };

        let size = match config.size {
            SizeDistribution::LogNormalArea { median_msh, sigma } => SizeSampler::Area(
                LogNormal::new(median_msh.ln(), sigma).map_err(|_| bad("size sigma", sigma))?,
            ),
            SizeDistribution::LogNormalRadius { median_km, sigma } => SizeSampler::Radius(
                LogNormal::new(median_km.ln(), sigma).map_err(|_| bad("size sigma", sigma))?,
            ),
        };

        let lifetime = match config.lifetime {
            LifetimeDistribution::LogNormal { median_days, sigma } => LifetimeSampler::LogNormal(
                LogNormal::new(median_days.ln(), sigma).map_err(|_| bad("lifetime sigma", sigma))?,
            ),
            LifetimeDistribution::AreaDecay {
                decay_rate_msh_per_day,
            } => LifetimeSampler::AreaDecay(decay_rate_msh_per_day),
        };

        let contrast = match config.contrast {
            ContrastModel::Spot {
                umbra_teff_k,
                penumbra_teff_k,
                area_over_umbra_mean,
                area_over_umbra_sigma,
            } => ContrastSampler::Spot {
                umbra_teff_k,
                penumbra_teff_k,
                area_over_umbra: Normal::new(area_over_umbra_mean, area_over_umbra_sigma)
                    .map_err(|_| bad("area_over_umbra_sigma", area_over_umbra_sigma))?,
            },
            ContrastModel::Facula { teff_offset_k } => ContrastSampler::Facula(teff_offset_k),
        };

        Ok(Self {
            class: config.class(),
            rate_per_sr,
            latitude,
            size,
            lifetime,
            growth_fraction: config.growth_fraction,
            profile: config.profile,
            contrast,
        })
    }

    fn sample_latitude<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.latitude {
            None => (2.0 * rng.gen::<f64>() - 1.0).asin(),
            Some(band) => {
                let hemisphere = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                (hemisphere * band.sample(rng).to_radians()).clamp(-FRAC_PI_2, FRAC_PI_2)
            }
        }
    }

    /// Peak angular radius and the matching area in MSH
    fn sample_size<R: Rng + ?Sized>(&self, rng: &mut R, star_radius: Length) -> (f64, f64) {
        match &self.size {
            SizeSampler::Area(dist) => {
                let area = dist.sample(rng);
                (msh_to_angular_radius(area, star_radius), area)
            }
            SizeSampler::Radius(dist) => {
                let radius_km = dist.sample(rng);
                let theta = length_to_angular_radius(Length::from_kilometers(radius_km), star_radius);
                (theta, angular_radius_to_msh(theta, star_radius))
            }
        }
    }

    fn sample_lifetime<R: Rng + ?Sized>(&self, rng: &mut R, area_msh: f64) -> f64 {
        match &self.lifetime {
            LifetimeSampler::LogNormal(dist) => dist.sample(rng),
            LifetimeSampler::AreaDecay(rate) => area_msh / rate / (1.0 - self.growth_fraction),
        }
    }

    fn sample_contrast<R: Rng + ?Sized>(&self, rng: &mut R) -> Contrast {
        match &self.contrast {
            ContrastSampler::Spot {
                umbra_teff_k,
                penumbra_teff_k,
                area_over_umbra,
            } => {
                let mut ratio = area_over_umbra.sample(rng);
                while ratio < 1.0 {
                    ratio = area_over_umbra.sample(rng);
                }
                Contrast::Spot {
                    umbra_teff_k: *umbra_teff_k,
                    penumbra_teff_k: *penumbra_teff_k,
                    area_over_umbra: ratio,
                }
            }
            ContrastSampler::Facula(offset) => Contrast::Facula {
                teff_offset_k: *offset,
            },
        }
    }
}

/// A sampled birth waiting for its id
struct Birth {
    creation_time: f64,
    location: SurfacePoint,
    peak_radius: f64,
    lifetime: f64,
    growth_fraction: f64,
    profile: GrowthProfile,
    contrast: Contrast,
}

/// Poisson emergence process over all configured classes
#[derive(Debug, Clone)]
pub struct FeatureGenerator {
    emitters: Vec<Emitter>,
    star_radius: Length,
}

impl FeatureGenerator {
    /// Build a generator for a star of the given radius; every emitter is validated
    pub fn new(emitters: &[EmitterConfig], star_radius: Length) -> Result<Self, ConfigError> {
        let radius_solar = star_radius.as_solar_radii();
        if !radius_solar.is_finite() || radius_solar <= 0.0 {
            return Err(ConfigError::InvalidRadius(radius_solar));
        }
        let emitters = emitters
            .iter()
            .map(|config| Emitter::new(config, star_radius))
            .collect::<Result<Vec<_>, _>>()?;
        for emitter in &emitters {
            debug!(
                "{} emitter: {:.4e} births/day/sr ({:.3} per day over the sphere)",
                emitter.class,
                emitter.rate_per_sr,
                emitter.rate_per_sr * 4.0 * PI
            );
        }
        Ok(Self {
            emitters,
            star_radius,
        })
    }

    /// A generator that never produces features
    pub fn quiet(star_radius: Length) -> Self {
        Self {
            emitters: Vec::new(),
            star_radius,
        }
    }

    /// Births per day per steradian for each configured class
    pub fn rates(&self) -> Vec<(FeatureClass, f64)> {
        self.emitters
            .iter()
            .map(|e| (e.class, e.rate_per_sr))
            .collect()
    }

    /// Draw every feature born in `[t0, t1)`, ordered by creation time.
    ///
    /// Identical RNG state, id allocator state and interval give identical
    /// output. An empty interval draws nothing and leaves the RNG untouched.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        t0: f64,
        t1: f64,
        rng: &mut R,
        ids: &mut IdAllocator,
    ) -> Result<Vec<Feature>, GeneratorError> {
        if !t0.is_finite() || !t1.is_finite() || t1 < t0 {
            return Err(GeneratorError::InvalidInterval { t0, t1 });
        }
        let dt = t1 - t0;
        if dt == 0.0 {
            return Ok(Vec::new());
        }

        let mut births = Vec::new();
        for emitter in &self.emitters {
            let mean = emitter.rate_per_sr * 4.0 * PI * dt;
            if mean <= 0.0 {
                continue;
            }
            let poisson = Poisson::new(mean).map_err(|_| GeneratorError::InvalidBirthMean(mean))?;
            let count = poisson.sample(rng) as u64;

            for _ in 0..count {
                let creation_time = rng.gen_range(t0..t1);
                let lat = emitter.sample_latitude(rng);
                let lon = rng.gen_range(0.0..TAU);
                let (peak_radius, area_msh) = emitter.sample_size(rng, self.star_radius);
                let lifetime = emitter.sample_lifetime(rng, area_msh);
                let contrast = emitter.sample_contrast(rng);

                if !(peak_radius > 0.0) || !(lifetime > 0.0) || !lifetime.is_finite() {
                    warn!(
                        "Discarding degenerate {} draw: radius {peak_radius:e} rad, lifetime {lifetime:e} days",
                        emitter.class
                    );
                    continue;
                }

                births.push(Birth {
                    creation_time,
                    location: SurfacePoint::new(lat, lon),
                    peak_radius,
                    lifetime,
                    growth_fraction: emitter.growth_fraction,
                    profile: emitter.profile,
                    contrast,
                });
            }
        }

        // Stable sort keeps emitter order for (measure-zero) ties
        births.sort_by(|a, b| a.creation_time.total_cmp(&b.creation_time));

        let features = births
            .into_iter()
            .map(|birth| {
                Feature::new(
                    ids.allocate(),
                    birth.location,
                    birth.peak_radius,
                    birth.creation_time,
                    birth.lifetime,
                    birth.growth_fraction,
                    birth.profile,
                    birth.contrast,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Generated {} features over [{t0:.4}, {t1:.4})",
            features.len()
        );
        Ok(features)
    }
}
