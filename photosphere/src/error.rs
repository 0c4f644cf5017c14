use crate::config::ConfigError;
use crate::coverage::CoverageError;
use crate::feature::FeatureError;
use crate::generator::GeneratorError;
use crate::geometry::GeometryError;
use crate::surface::SurfaceError;
use crate::variability::VariabilityError;
use thiserror::Error;

/// Errors produced anywhere in the photosphere engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid geometric parameter.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Feature violating its lifecycle contract.
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Failure while drawing new features.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// Surface map advance, restore or persistence failure.
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Coverage conservation invariant broken.
    #[error("coverage error: {0}")]
    Coverage(#[from] CoverageError),

    /// Variability collaborator failure.
    #[error("variability error: {0}")]
    Variability(#[from] VariabilityError),
}

pub type Result<T> = std::result::Result<T, Error>;
