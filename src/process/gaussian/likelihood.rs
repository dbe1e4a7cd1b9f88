use nalgebra::DMatrix;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::constraint::{ConstraintError, Interval};
use super::GpError;

/// Homoskedastic Gaussian observation noise.
///
/// The noise variance is stored as `log σ²` constrained to an
/// [`Interval`], so `σ² = exp(bounds.transform(raw))` is always positive and
/// bounded.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GaussianLikelihood {
    raw: f64,
    log_noise_bounds: Interval,
}

impl GaussianLikelihood {
    /// Create a new likelihood with noise variance `noise` (σ²)
    ///
    /// # Errors
    /// `ln(noise)` must be strictly inside `log_noise_bounds`.
    pub fn new(
        noise: f64,
        log_noise_bounds: Interval,
    ) -> Result<Self, ConstraintError> {
        if noise <= 0.0 || !noise.is_finite() {
            return Err(ConstraintError::OutOfBounds {
                given: noise,
                bounds: (
                    log_noise_bounds.lower().exp(),
                    log_noise_bounds.upper().exp(),
                ),
            });
        }
        let raw = log_noise_bounds.inverse_transform(noise.ln())?;
        Ok(Self {
            raw,
            log_noise_bounds,
        })
    }

    /// `log σ²`
    #[inline]
    #[must_use]
    pub fn log_noise(&self) -> f64 {
        self.log_noise_bounds.transform(self.raw)
    }

    /// Noise variance `σ²`
    #[inline]
    #[must_use]
    pub fn noise(&self) -> f64 {
        self.log_noise().exp()
    }

    /// Bounds on `log σ²`
    #[must_use]
    pub fn log_noise_bounds(&self) -> Interval {
        self.log_noise_bounds
    }

    /// Raw, unconstrained parameter
    #[inline]
    #[must_use]
    pub fn raw(&self) -> f64 {
        self.raw
    }

    /// Set the raw, unconstrained parameter
    #[inline]
    pub fn set_raw(&mut self, raw: f64) {
        self.raw = raw;
    }

    /// `dσ² / d raw`
    #[inline]
    #[must_use]
    pub fn noise_gradient_raw(&self) -> f64 {
        self.noise() * self.log_noise_bounds.derivative(self.raw)
    }

    /// Add the noise variance to the diagonal of a covariance matrix,
    /// `K + σ² I`.
    ///
    /// # Errors
    /// `cov` must be square.
    pub fn observe(&self, cov: &DMatrix<f64>) -> Result<DMatrix<f64>, GpError> {
        if !cov.is_square() {
            return Err(GpError::DimensionMismatch {
                expected: cov.nrows(),
                given: cov.ncols(),
            });
        }
        let mut noisy = cov.clone();
        let noise = self.noise();
        noisy.set_diagonal(&(cov.diagonal().add_scalar(noise)));
        Ok(noisy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Interval {
        Interval::new(-5.0, 5.0).unwrap()
    }

    #[test]
    fn noise_roundtrip() {
        let lik = GaussianLikelihood::new(0.1, bounds()).unwrap();
        assert::close(lik.noise(), 0.1, 1E-12);
        assert::close(lik.log_noise(), 0.1_f64.ln(), 1E-12);
    }

    #[test]
    fn noise_outside_bounds_is_rejected() {
        assert!(GaussianLikelihood::new(1E-3, bounds()).is_err());
        assert!(GaussianLikelihood::new(0.0, bounds()).is_err());
        assert!(GaussianLikelihood::new(-1.0, bounds()).is_err());
    }

    #[test]
    fn observe_adds_to_diagonal_only() {
        let lik = GaussianLikelihood::new(0.5, bounds()).unwrap();
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.3, 2.0]);
        let noisy = lik.observe(&cov).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[1.5, 0.3, 0.3, 2.5]);
        assert!(noisy.relative_eq(&expected, 1E-12, 1E-12));
    }

    #[test]
    fn observe_rejects_non_square() {
        let lik = GaussianLikelihood::new(0.5, bounds()).unwrap();
        let cov = DMatrix::zeros(2, 3);
        assert_eq!(
            lik.observe(&cov),
            Err(GpError::DimensionMismatch {
                expected: 2,
                given: 3
            })
        );
    }

    #[test]
    fn noise_gradient_matches_finite_difference() {
        let mut lik = GaussianLikelihood::new(0.2, bounds()).unwrap();
        let raw = lik.raw();
        let analytic = lik.noise_gradient_raw();
        let h = 1E-6;
        lik.set_raw(raw + h);
        let up = lik.noise();
        lik.set_raw(raw - h);
        let down = lik.noise();
        assert::close(analytic, (up - down) / (2.0 * h), 1E-6);
    }
}
