//! Press-duration prediction.
//!
//! The control loop only needs `distance -> duration`. The stock
//! implementation is a polynomial in the scaled distance, either given
//! directly or least-squares fitted once at startup from recorded
//! `(distance, duration)` pairs.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Maps an oblique distance in pixels to a press duration in milliseconds.
pub trait DurationPredictor {
    fn predict(&self, distance: f64) -> f64;
}

impl<F> DurationPredictor for F
where
    F: Fn(f64) -> f64,
{
    fn predict(&self, distance: f64) -> f64 {
        self(distance)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PredictorError {
    #[error("need at least {needed} samples to fit degree {degree}, got {got}")]
    TooFewSamples {
        degree: usize,
        needed: usize,
        got: usize,
    },
    #[error("polynomial has no coefficients")]
    Empty,
    #[error("least-squares solve failed: {0}")]
    Solve(String),
}

/// `duration = Σ c_i (distance / scale)^i`, clamped at zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolynomialPredictor {
    /// Coefficients in ascending power order.
    pub coefficients: Vec<f64>,
    /// Distance normalization; keeps high powers well conditioned.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl PolynomialPredictor {
    pub fn new(coefficients: Vec<f64>) -> Result<Self, PredictorError> {
        Self::with_scale(coefficients, 1.0)
    }

    pub fn with_scale(coefficients: Vec<f64>, scale: f64) -> Result<Self, PredictorError> {
        if coefficients.is_empty() {
            return Err(PredictorError::Empty);
        }
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Ok(Self {
            coefficients,
            scale,
        })
    }

    /// Least-squares fit of a polynomial of `degree` to `(distance, duration)`
    /// pairs.
    pub fn fit(samples: &[(f64, f64)], degree: usize) -> Result<Self, PredictorError> {
        let needed = degree + 1;
        if samples.len() < needed {
            return Err(PredictorError::TooFewSamples {
                degree,
                needed,
                got: samples.len(),
            });
        }

        let scale = samples
            .iter()
            .map(|&(d, _)| d.abs())
            .fold(0.0f64, f64::max)
            .max(1.0);
        let vandermonde = DMatrix::from_fn(samples.len(), needed, |r, c| {
            (samples[r].0 / scale).powi(c as i32)
        });
        let durations = DVector::from_iterator(samples.len(), samples.iter().map(|&(_, t)| t));

        let svd = vandermonde.svd(true, true);
        let coefficients = svd
            .solve(&durations, 1e-12)
            .map_err(|e| PredictorError::Solve(e.to_string()))?;
        log::info!(
            "fitted degree-{degree} duration polynomial on {} samples",
            samples.len()
        );
        Self::with_scale(coefficients.iter().copied().collect(), scale)
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }
}

impl DurationPredictor for PolynomialPredictor {
    fn predict(&self, distance: f64) -> f64 {
        let x = distance / self.scale;
        // Horner
        let value = self
            .coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c);
        if value.is_finite() {
            value.max(0.0)
        } else {
            0.0
        }
    }
}

/// Round a predicted duration to whole milliseconds for input injection.
pub fn press_millis(duration: f64) -> u32 {
    if duration.is_finite() && duration > 0.0 {
        duration.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn evaluates_in_ascending_power_order() {
        let p = PolynomialPredictor::new(vec![10.0, 2.0, 0.5]).expect("poly");
        assert_eq!(p.degree(), 2);
        assert_relative_eq!(p.predict(4.0), 10.0 + 8.0 + 8.0);
    }

    #[test]
    fn negative_predictions_clamp_to_zero() {
        let p = PolynomialPredictor::new(vec![-50.0, 1.0]).expect("poly");
        assert_eq!(p.predict(10.0), 0.0);
        assert_eq!(press_millis(p.predict(80.4)), 30);
        assert_eq!(press_millis(f64::NAN), 0);
    }

    #[test]
    fn fit_recovers_exact_polynomial() {
        let truth = |d: f64| 30.0 + 1.8 * d - 0.0009 * d * d;
        let samples: Vec<(f64, f64)> = (0..40)
            .map(|i| {
                let d = 50.0 + 15.0 * f64::from(i);
                (d, truth(d))
            })
            .collect();
        let p = PolynomialPredictor::fit(&samples, 6).expect("fit");
        assert_eq!(p.degree(), 6);
        for d in [60.0, 250.0, 400.0, 610.0] {
            assert_relative_eq!(p.predict(d), truth(d), epsilon = 1e-3);
        }
    }

    #[test]
    fn fit_needs_enough_samples() {
        let err = PolynomialPredictor::fit(&[(1.0, 2.0), (2.0, 3.0)], 6).expect_err("too few");
        assert!(matches!(err, PredictorError::TooFewSamples { needed: 7, got: 2, .. }));
        assert!(matches!(PolynomialPredictor::new(vec![]), Err(PredictorError::Empty)));
    }

    #[test]
    fn closures_are_predictors() {
        let linear = |d: f64| 1.35 * d;
        assert_relative_eq!(linear.predict(100.0), 135.0);
    }
}
