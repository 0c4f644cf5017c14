//! Stochastic variability collaborator
//!
//! A Gaussian-process style generator of brightness perturbations lives
//! outside this crate. The surface engine only hands it a time grid and the
//! kernel hyperparameters, checks what comes back, and passes the values
//! through alongside the coverage series.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariabilityError {
    #[error("time grid must be non-decreasing (t[{index}] = {value} follows {previous})")]
    UnsortedTimes {
        index: usize,
        value: f64,
        previous: f64,
    },

    #[error("time grid contains non-finite value {0}")]
    NonFiniteTime(f64),

    #[error("feed returned {actual} values for {expected} times")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("feed returned non-finite perturbation at index {0}")]
    NonFinitePerturbation(usize),

    #[error("variability feed failed: {0}")]
    Feed(String),
}

/// Covariance kernel parameters forwarded to the feed unchanged
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelHyperparameters {
    /// Kernel amplitude (standard deviation of the perturbation)
    pub amplitude: f64,
    /// Correlation length in days
    pub length_scale_days: f64,
    /// Quasi-periodic component period in days, if any
    pub period_days: Option<f64>,
    /// White-noise term added to the diagonal
    pub jitter: f64,
}

impl Default for KernelHyperparameters {
    fn default() -> Self {
        Self {
            amplitude: 0.0,
            length_scale_days: 1.0,
            period_days: None,
            jitter: 0.0,
        }
    }
}

/// How a perturbation combines with the coverage-driven signal downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationMode {
    Additive,
    Multiplicative,
}

/// External source of per-time brightness perturbations
pub trait VariabilityFeed {
    fn mode(&self) -> PerturbationMode;

    /// One perturbation per entry of `times`
    fn perturbations(
        &self,
        times: &[f64],
        kernel: &KernelHyperparameters,
    ) -> Result<Vec<f64>, VariabilityError>;
}

/// Feed for a star without stochastic variability
#[derive(Debug, Clone, Copy, Default)]
pub struct QuietFeed;

impl VariabilityFeed for QuietFeed {
    fn mode(&self) -> PerturbationMode {
        PerturbationMode::Additive
    }

    fn perturbations(
        &self,
        times: &[f64],
        _kernel: &KernelHyperparameters,
    ) -> Result<Vec<f64>, VariabilityError> {
        Ok(vec![0.0; times.len()])
    }
}

/// Reject time grids that are non-finite or go backwards
pub fn check_time_grid(times: &[f64]) -> Result<(), VariabilityError> {
    for (index, &value) in times.iter().enumerate() {
        if !value.is_finite() {
            return Err(VariabilityError::NonFiniteTime(value));
        }
        if index > 0 && value < times[index - 1] {
            return Err(VariabilityError::UnsortedTimes {
                index,
                value,
                previous: times[index - 1],
            });
        }
    }
    Ok(())
}

/// Query `feed` over `times`, checking the grid going in and the values coming out
pub fn sample_feed<F: VariabilityFeed + ?Sized>(
    feed: &F,
    times: &[f64],
    kernel: &KernelHyperparameters,
) -> Result<Vec<f64>, VariabilityError> {
    check_time_grid(times)?;
    let values = feed.perturbations(times, kernel)?;
    if values.len() != times.len() {
        return Err(VariabilityError::LengthMismatch {
            expected: times.len(),
            actual: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(VariabilityError::NonFinitePerturbation(index));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Truncating;

    impl VariabilityFeed for Truncating {
        fn mode(&self) -> PerturbationMode {
            PerturbationMode::Multiplicative
        }

        fn perturbations(
            &self,
            times: &[f64],
            _kernel: &KernelHyperparameters,
        ) -> Result<Vec<f64>, VariabilityError> {
            Ok(vec![1.0; times.len().saturating_sub(1)])
        }
    }

    struct Failing;

    impl VariabilityFeed for Failing {
        fn mode(&self) -> PerturbationMode {
            PerturbationMode::Additive
        }

        fn perturbations(
            &self,
            _times: &[f64],
            _kernel: &KernelHyperparameters,
        ) -> Result<Vec<f64>, VariabilityError> {
            Err(VariabilityError::Feed("kernel matrix not positive definite".into()))
        }
    }

    #[test]
    fn test_quiet_feed_returns_zeros() {
        let times = [0.0, 0.5, 0.5, 2.0];
        let values = sample_feed(&QuietFeed, &times, &KernelHyperparameters::default()).unwrap();
        assert_eq!(values, vec![0.0; 4]);
    }

    #[test]
    fn test_unsorted_times_rejected() {
        let result = sample_feed(&QuietFeed, &[0.0, 2.0, 1.0], &KernelHyperparameters::default());
        assert_eq!(
            result,
            Err(VariabilityError::UnsortedTimes {
                index: 2,
                value: 1.0,
                previous: 2.0
            })
        );
        assert!(matches!(
            check_time_grid(&[0.0, f64::NAN]),
            Err(VariabilityError::NonFiniteTime(_))
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = sample_feed(&Truncating, &[0.0, 1.0, 2.0], &KernelHyperparameters::default());
        assert_eq!(
            result,
            Err(VariabilityError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_feed_errors_pass_through() {
        let result = sample_feed(&Failing, &[0.0], &KernelHyperparameters::default());
        assert!(matches!(result, Err(VariabilityError::Feed(_))));
    }
}
