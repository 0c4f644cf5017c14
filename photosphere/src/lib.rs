//! Photosphere feature-mosaic and coverage engine
//!
//! Simulates the visible surface of an active star as a time-evolving set of
//! spots and faculae on a rotating sphere, and reports for any observation
//! time the fraction of the visible disk covered by each surface class.
//!
//! Data flows leaf-first: [`generator`] draws features, [`surface`] keeps the
//! live ones and rotates them, [`geometry`] projects them toward the observer
//! and [`coverage`] integrates the disk. [`Star`] ties these together.

pub mod config;
pub mod coverage;
pub mod error;
pub mod feature;
pub mod generator;
pub mod geometry;
pub mod star;
pub mod surface;
pub mod units;
pub mod variability;

// Re-export commonly used types for external use
pub use crate::config::{ConfigError, StarConfig};
pub use crate::coverage::{
    ClassPriority, Coverage, CoverageAggregator, CoverageError, CoverageMethod, SurfaceClass,
    FRACTION_TOLERANCE,
};
pub use crate::error::{Error, Result};
pub use crate::feature::{Contrast, Feature, FeatureClass, FeatureId, GrowthProfile, LifecyclePhase};
pub use crate::generator::{EmitterConfig, FeatureGenerator};
pub use crate::geometry::{ObserverFrame, Rotation, SurfacePoint};
pub use crate::star::{Observation, Star};
pub use crate::surface::{LiveFeature, SurfaceError, SurfaceMap, SurfaceSnapshot};
pub use crate::variability::{KernelHyperparameters, PerturbationMode, QuietFeed, VariabilityFeed};
