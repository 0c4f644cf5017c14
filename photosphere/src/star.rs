//! Star facade: one configured surface map plus its coverage aggregator

use crate::config::StarConfig;
use crate::coverage::{Coverage, CoverageAggregator};
use crate::error::Result;
use crate::surface::{SurfaceMap, SurfaceSnapshot};
use crate::variability::{
    check_time_grid, sample_feed, KernelHyperparameters, PerturbationMode, VariabilityFeed,
};
use log::debug;
use serde::Serialize;

/// Coverage at one time paired with the collaborator's perturbation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub time: f64,
    pub coverage: Coverage,
    pub perturbation: f64,
    pub mode: PerturbationMode,
}

/// A simulated star
///
/// Queries advance the surface map, so times must never decrease across
/// calls.
#[derive(Debug, Clone)]
pub struct Star {
    config: StarConfig,
    surface: SurfaceMap,
    aggregator: CoverageAggregator,
}

impl Star {
    /// Build a star from a validated configuration, positioned at its epoch
    pub fn new(config: StarConfig) -> Result<Self> {
        let surface = SurfaceMap::from_config(&config)?;
        let aggregator =
            CoverageAggregator::new(config.coverage_method, config.class_priority.clone())?;
        debug!(
            "Star ready at t={} with {} live features, {:?} coverage",
            surface.current_time(),
            surface.len(),
            config.coverage_method
        );
        Ok(Self {
            config,
            surface,
            aggregator,
        })
    }

    /// Resume a star from a surface snapshot
    pub fn restore(config: StarConfig, snapshot: SurfaceSnapshot) -> Result<Self> {
        let surface = SurfaceMap::restore(&config, snapshot)?;
        let aggregator =
            CoverageAggregator::new(config.coverage_method, config.class_priority.clone())?;
        Ok(Self {
            config,
            surface,
            aggregator,
        })
    }

    /// Coverage of the visible disk at time `t`, advancing the surface to `t` first
    pub fn coverage_at(&mut self, t: f64) -> Result<Coverage> {
        self.surface.advance_to(t)?;
        let live = self.surface.live_features_at(t);
        let coverage = self.aggregator.aggregate(&live, self.surface.frame())?;
        Ok(coverage)
    }

    /// Coverage at each of `times`, which must be non-decreasing
    pub fn coverage_series(&mut self, times: &[f64]) -> Result<Vec<Coverage>> {
        check_time_grid(times)?;
        times.iter().map(|&t| self.coverage_at(t)).collect()
    }

    /// Coverage series paired with perturbations from `feed`.
    ///
    /// The feed sees the same time grid; its values are passed through and
    /// not retained.
    pub fn observe<F: VariabilityFeed + ?Sized>(
        &mut self,
        times: &[f64],
        kernel: &KernelHyperparameters,
        feed: &F,
    ) -> Result<Vec<Observation>> {
        let perturbations = sample_feed(feed, times, kernel)?;
        let coverages = self.coverage_series(times)?;
        let mode = feed.mode();
        Ok(times
            .iter()
            .zip(coverages)
            .zip(perturbations)
            .map(|((&time, coverage), perturbation)| Observation {
                time,
                coverage,
                perturbation,
                mode,
            })
            .collect())
    }

    pub fn config(&self) -> &StarConfig {
        &self.config
    }

    pub fn surface(&self) -> &SurfaceMap {
        &self.surface
    }

    pub fn aggregator(&self) -> &CoverageAggregator {
        &self.aggregator
    }

    pub fn current_time(&self) -> f64 {
        self.surface.current_time()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.surface.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CoverageMethod, SurfaceClass, FRACTION_TOLERANCE};
    use crate::error::Error;
    use crate::surface::SurfaceError;
    use crate::variability::QuietFeed;
    use approx::assert_relative_eq;

    fn small_raster(config: StarConfig) -> StarConfig {
        StarConfig {
            coverage_method: CoverageMethod::Raster { resolution: 120 },
            ..config
        }
    }

    #[test]
    fn test_quiet_star_is_all_photosphere() {
        let mut star = Star::new(StarConfig::quiet()).unwrap();
        for t in [0.0, 1.0, 50.0, 1e4] {
            assert_eq!(star.coverage_at(t).unwrap(), Coverage::photosphere_only());
        }
    }

    #[test]
    fn test_active_star_fractions_sum_to_one() {
        let config = small_raster(StarConfig {
            spin_up_days: 60.0,
            seed: 5,
            ..StarConfig::default()
        });
        let mut star = Star::new(config).unwrap();
        let times: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let series = star.coverage_series(&times).unwrap();

        assert!(series.iter().any(|c| c.fraction(SurfaceClass::Spot) > 0.0));

        // Repeating the latest time reads the same surface state
        let last = times[times.len() - 1];
        assert_eq!(star.coverage_at(last).unwrap(), series[series.len() - 1]);
        assert_eq!(star.coverage_at(last).unwrap(), star.coverage_at(last).unwrap());

        for coverage in series {
            assert_relative_eq!(coverage.total(), 1.0, epsilon = FRACTION_TOLERANCE);
            for (_, value) in coverage.iter() {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_series_rejects_decreasing_times() {
        let mut star = Star::new(StarConfig::quiet()).unwrap();
        assert!(matches!(
            star.coverage_series(&[1.0, 0.5]),
            Err(Error::Variability(_))
        ));

        star.coverage_at(3.0).unwrap();
        assert!(matches!(
            star.coverage_at(2.0),
            Err(Error::Surface(SurfaceError::TimeReversal { .. }))
        ));
    }

    #[test]
    fn test_observe_pairs_coverage_with_feed() {
        let mut star = Star::new(small_raster(StarConfig::default())).unwrap();
        let times = [0.0, 0.5, 1.0];
        let observations = star
            .observe(&times, &KernelHyperparameters::default(), &QuietFeed)
            .unwrap();
        assert_eq!(observations.len(), 3);
        for (obs, t) in observations.iter().zip(times) {
            assert_eq!(obs.time, t);
            assert_eq!(obs.perturbation, 0.0);
            assert_eq!(obs.mode, PerturbationMode::Additive);
        }
    }

    #[test]
    fn test_restore_matches_uninterrupted_run() {
        let config = small_raster(StarConfig {
            seed: 17,
            ..StarConfig::default()
        });
        let mut uninterrupted = Star::new(config.clone()).unwrap();
        let mut first = Star::new(config.clone()).unwrap();
        first.coverage_at(2.0).unwrap();
        let mut resumed = Star::restore(config, first.snapshot()).unwrap();

        uninterrupted.coverage_at(2.0).unwrap();
        for t in [2.5, 4.0, 9.0] {
            assert_eq!(
                uninterrupted.coverage_at(t).unwrap(),
                resumed.coverage_at(t).unwrap()
            );
        }
    }
}
