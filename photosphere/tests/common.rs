//! Common utilities for photosphere integration tests

#![allow(dead_code)]

use photosphere::generator::{
    ContrastModel, EmergenceRate, EmitterConfig, LatitudeLaw, LifetimeDistribution,
    SizeDistribution,
};
use photosphere::{
    Contrast, Feature, FeatureId, GrowthProfile, StarConfig, SurfaceMap, SurfacePoint,
    SurfaceSnapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters for a hand-placed feature
#[derive(Debug, Clone)]
pub struct FeatureParams {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub radius: f64,
    pub creation: f64,
    pub lifetime: f64,
    pub contrast: Contrast,
}

impl FeatureParams {
    /// A long-lived spot at the given position, peaking at t = 0
    pub fn spot(lat_deg: f64, lon_deg: f64, radius: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            radius,
            creation: -1e5,
            lifetime: 2e5,
            contrast: Contrast::Spot {
                umbra_teff_k: 2700.0,
                penumbra_teff_k: 2900.0,
                area_over_umbra: 5.0,
            },
        }
    }

    /// A long-lived facula at the given position, peaking at t = 0
    pub fn facula(lat_deg: f64, lon_deg: f64, radius: f64) -> Self {
        Self {
            contrast: Contrast::Facula {
                teff_offset_k: 100.0,
            },
            ..Self::spot(lat_deg, lon_deg, radius)
        }
    }

    /// Smoothstep ramps are flat at the peak, so the radius stays within
    /// 1e-7 of its peak value for tens of days around t = 0
    pub fn build(&self, id: u64) -> Feature {
        Feature::new(
            FeatureId(id),
            SurfacePoint::from_degrees(self.lat_deg, self.lon_deg),
            self.radius,
            self.creation,
            self.lifetime,
            0.5,
            GrowthProfile::Smoothstep,
            self.contrast,
        )
        .expect("hand-placed feature parameters are valid")
    }
}

/// Surface map holding exactly the given features at time `t`, with no further births
pub fn surface_with(config: &StarConfig, features: &[FeatureParams], t: f64) -> SurfaceMap {
    let snapshot = SurfaceSnapshot {
        current_time: t,
        next_id: features.len() as u64,
        seed: config.seed,
        rng_word_pos: 0,
        features: features
            .iter()
            .enumerate()
            .map(|(i, params)| params.build(i as u64))
            .collect(),
    };
    SurfaceMap::restore(config, snapshot).expect("hand-built snapshot is valid")
}

/// Featureless star with the given inclination and period
pub fn quiet_config(inclination_deg: f64, period_days: f64) -> StarConfig {
    StarConfig {
        inclination_deg,
        rotation_period_days: period_days,
        ..StarConfig::quiet()
    }
}

/// Busy isotropic spot and facula emitters for stress tests
pub fn busy_config(seed: u64) -> StarConfig {
    StarConfig {
        emitters: vec![
            EmitterConfig {
                rate: EmergenceRate::EquilibriumCoverage(0.2),
                latitude: LatitudeLaw::Isotropic,
                ..EmitterConfig::solar_spots()
            },
            EmitterConfig {
                rate: EmergenceRate::PerSteradian(20.0),
                latitude: LatitudeLaw::Isotropic,
                size: SizeDistribution::LogNormalRadius {
                    median_km: 15_000.0,
                    sigma: 0.5,
                },
                lifetime: LifetimeDistribution::LogNormal {
                    median_days: 1.0,
                    sigma: 0.3,
                },
                growth_fraction: 0.3,
                profile: GrowthProfile::Smoothstep,
                contrast: ContrastModel::Facula {
                    teff_offset_k: 150.0,
                },
            },
        ],
        seed,
        ..StarConfig::default()
    }
}

/// Random hand-placed features spread over the sphere
pub fn random_features(count: usize, seed: u64) -> Vec<FeatureParams> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let lat = (2.0 * rng.gen::<f64>() - 1.0).asin().to_degrees();
            let lon = rng.gen_range(0.0..360.0);
            let radius = rng.gen_range(0.01..0.4);
            if rng.gen_bool(0.5) {
                FeatureParams::spot(lat, lon, radius)
            } else {
                FeatureParams::facula(lat, lon, radius)
            }
        })
        .collect()
}
