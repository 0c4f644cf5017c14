//! Time-evolving surface map
//!
//! The map owns every feature that is still alive, the emergence generator
//! and its random stream, and the rotation and viewing geometry of the star.
//! Time only moves forward: [`SurfaceMap::advance_to`] draws the births in the
//! elapsed interval and prunes the features that have died.

use crate::config::{ConfigError, StarConfig};
use crate::feature::{Feature, FeatureClass, FeatureError, FeatureId, IdAllocator};
use crate::generator::{FeatureGenerator, GeneratorError};
use crate::geometry::{ObserverFrame, Rotation, SurfacePoint};
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from advancing, restoring or persisting a surface map
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("cannot move back in time from {current} to {requested}")]
    TimeReversal { requested: f64, current: f64 },

    #[error("time {0} is not finite")]
    NonFiniteTime(f64),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("feature generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("invalid feature: {0}")]
    Feature(#[from] FeatureError),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A feature as seen at one instant
#[derive(Debug, Clone, Copy)]
pub struct LiveFeature<'a> {
    pub feature: &'a Feature,
    /// Longitude in the observer-fixed frame, radians in [0, 2π)
    pub longitude: f64,
    /// Angular radius in radians, always positive
    pub radius: f64,
}

impl LiveFeature<'_> {
    /// Centre in the observer-fixed frame
    pub fn location(&self) -> SurfacePoint {
        SurfacePoint::new(self.feature.location().lat, self.longitude)
    }

    pub fn id(&self) -> FeatureId {
        self.feature.id()
    }

    pub fn class(&self) -> FeatureClass {
        self.feature.class()
    }
}

/// Everything needed to resume a surface map exactly where it stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub current_time: f64,
    pub next_id: u64,
    pub seed: u64,
    /// Position of the emergence stream, in 32-bit words
    pub rng_word_pos: u128,
    pub features: Vec<Feature>,
}

impl SurfaceSnapshot {
    pub fn save_to_file(&self, path: &Path) -> Result<(), SurfaceError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SurfaceError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Live features of one star plus the processes that evolve them
#[derive(Debug, Clone)]
pub struct SurfaceMap {
    /// Arena of live features, ascending by id
    features: Vec<Feature>,
    generator: FeatureGenerator,
    rotation: Rotation,
    frame: ObserverFrame,
    inclination: f64,
    current_time: f64,
    ids: IdAllocator,
    rng: ChaCha8Rng,
    seed: u64,
}

impl SurfaceMap {
    /// Create an empty map starting at `start_time`.
    ///
    /// # Arguments
    /// * `generator` - Emergence process for new features
    /// * `rotation` - Rotation of the feature field
    /// * `inclination` - Inclination of the rotation axis in radians
    /// * `start_time` - Initial current time in days
    /// * `seed` - Seed for the emergence random stream
    pub fn new(
        generator: FeatureGenerator,
        rotation: Rotation,
        inclination: f64,
        start_time: f64,
        seed: u64,
    ) -> Self {
        Self {
            features: Vec::new(),
            generator,
            rotation,
            frame: ObserverFrame::from_inclination(inclination),
            inclination,
            current_time: start_time,
            ids: IdAllocator::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Build the map described by `config`, running the spin-up period if one is set.
    ///
    /// The map ends positioned at the configured epoch.
    pub fn from_config(config: &StarConfig) -> Result<Self, SurfaceError> {
        config.validate()?;
        let generator = FeatureGenerator::new(&config.emitters, config.stellar_radius())?;
        let mut map = Self::new(
            generator,
            config.rotation()?,
            config.inclination(),
            config.epoch_days - config.spin_up_days,
            config.seed,
        );
        if config.spin_up_days > 0.0 {
            map.advance_to(config.epoch_days)?;
            debug!(
                "Spin-up of {} days left {} live features",
                config.spin_up_days,
                map.len()
            );
        }
        Ok(map)
    }

    /// Resume from a snapshot taken of a map built with the same `config`
    pub fn restore(config: &StarConfig, snapshot: SurfaceSnapshot) -> Result<Self, SurfaceError> {
        config.validate()?;
        if !snapshot.current_time.is_finite() {
            return Err(SurfaceError::NonFiniteTime(snapshot.current_time));
        }

        let mut previous: Option<FeatureId> = None;
        for feature in &snapshot.features {
            feature.validate()?;
            if previous.is_some_and(|id| id >= feature.id()) {
                return Err(SurfaceError::CorruptSnapshot(format!(
                    "feature {} is out of order or duplicated",
                    feature.id()
                )));
            }
            if feature.id().0 >= snapshot.next_id {
                return Err(SurfaceError::CorruptSnapshot(format!(
                    "feature {} is not below the next id {}",
                    feature.id(),
                    snapshot.next_id
                )));
            }
            if feature.is_dead_at(snapshot.current_time) {
                return Err(SurfaceError::CorruptSnapshot(format!(
                    "feature {} died at {} before the snapshot time {}",
                    feature.id(),
                    feature.death_time(),
                    snapshot.current_time
                )));
            }
            previous = Some(feature.id());
        }

        let generator = FeatureGenerator::new(&config.emitters, config.stellar_radius())?;
        let mut rng = ChaCha8Rng::seed_from_u64(snapshot.seed);
        rng.set_word_pos(snapshot.rng_word_pos);

        Ok(Self {
            features: snapshot.features,
            generator,
            rotation: config.rotation()?,
            frame: ObserverFrame::from_inclination(config.inclination()),
            inclination: config.inclination(),
            current_time: snapshot.current_time,
            ids: IdAllocator::starting_at(snapshot.next_id),
            rng,
            seed: snapshot.seed,
        })
    }

    /// Capture the full state needed by [`SurfaceMap::restore`]
    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            current_time: self.current_time,
            next_id: self.ids.peek(),
            seed: self.seed,
            rng_word_pos: self.rng.get_word_pos(),
            features: self.features.clone(),
        }
    }

    /// Move the map forward to time `t`.
    ///
    /// Features born in `[current, t)` that are still alive at `t` join the
    /// map; features whose death time is at or before `t` are removed.
    /// Advancing to the current time is a no-op.
    pub fn advance_to(&mut self, t: f64) -> Result<(), SurfaceError> {
        if !t.is_finite() {
            return Err(SurfaceError::NonFiniteTime(t));
        }
        if t < self.current_time {
            return Err(SurfaceError::TimeReversal {
                requested: t,
                current: self.current_time,
            });
        }
        if t == self.current_time {
            return Ok(());
        }

        let born = self
            .generator
            .generate(self.current_time, t, &mut self.rng, &mut self.ids)?;
        let born_count = born.len();

        let before = self.features.len();
        self.features.retain(|f| !f.is_dead_at(t));
        let pruned = before - self.features.len();

        // New ids exceed every existing one, so the arena stays sorted
        self.features
            .extend(born.into_iter().filter(|f| !f.is_dead_at(t)));

        debug!(
            "Advanced {:.4} -> {t:.4}: {born_count} born, {pruned} pruned, {} live",
            self.current_time,
            self.features.len()
        );
        self.current_time = t;
        Ok(())
    }

    /// Features with a positive radius at `t`, with their observer-frame longitudes.
    ///
    /// Only features held by the map are considered, so `t` should normally
    /// be the current time.
    pub fn live_features_at(&self, t: f64) -> Vec<LiveFeature<'_>> {
        self.features
            .iter()
            .filter_map(|feature| {
                let radius = feature.radius_at(t);
                (radius > 0.0).then(|| LiveFeature {
                    feature,
                    longitude: self.rotation.longitude_at(feature.location().lon, t),
                    radius,
                })
            })
            .collect()
    }

    /// Look up a feature by id
    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features
            .binary_search_by_key(&id, |f| f.id())
            .ok()
            .map(|index| &self.features[index])
    }

    /// Features held by the map, ascending by id
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    /// Inclination in radians
    pub fn inclination(&self) -> f64 {
        self.inclination
    }

    pub fn sub_observer(&self) -> SurfacePoint {
        self.frame.sub_observer()
    }

    /// Observer frame for the fixed inclination
    pub fn frame(&self) -> &ObserverFrame {
        &self.frame
    }

    pub fn generator(&self) -> &FeatureGenerator {
        &self.generator
    }
}
