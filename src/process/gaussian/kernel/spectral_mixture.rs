use super::{sq_row_distance, CovGrad, CovGradError, Kernel, KernelError};
use crate::consts::{TWO_PI, TWO_PI_SQUARED};
use itertools::Itertools;
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{DMatrix, DVector, Dim, Matrix};
use std::f64;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Spectral Mixture kernel (Wilson & Adams, 2013)
///
/// A stationary kernel whose spectral density is a mixture of `Q` Gaussians.
/// For one-dimensional inputs, with `τ = x - x'`,
///
/// ```math
///     k(τ) = \sum_{q=1}^{Q} w_q \exp(-2 π^2 τ^2 v_q) \cos(2 π τ μ_q)
/// ```
///
/// Inputs with several columns use the product of the cosine terms over the
/// columns (and `τ²` the squared euclidean distance), which keeps the kernel
/// positive semi-definite.
///
/// # Parameters
/// * `weights` - Mixture weights, `w_q > 0`.
/// * `means` - Mean frequency of each component, `μ_q > 0`.
/// * `variances` - Spectral variance of each component, `v_q > 0`.
///
/// All three are exposed to optimizers on a log-scale.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct SpectralMixtureKernel {
    weights: DVector<f64>,
    means: DVector<f64>,
    variances: DVector<f64>,
}

fn check_positive(
    name: &str,
    values: &DVector<f64>,
) -> Result<(), KernelError> {
    match values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        Some(&given) => Err(KernelError::ParameterOutOfBounds {
            name: name.to_string(),
            given,
            bounds: (0.0, f64::INFINITY),
        }),
        None => Ok(()),
    }
}

impl SpectralMixtureKernel {
    /// Create a new spectral mixture kernel
    ///
    /// Mean frequencies must be strictly positive. The kernel is optimized
    /// over `ln μ`, so a zero frequency (a pure squared-exponential
    /// component) has no finite parameterization; use a small `μ` instead.
    ///
    /// # Errors
    /// The three vectors must have the same, non-zero, length and every entry
    /// must be finite and positive.
    pub fn new(
        weights: DVector<f64>,
        means: DVector<f64>,
        variances: DVector<f64>,
    ) -> Result<Self, KernelError> {
        if weights.len() != means.len() || weights.len() != variances.len() {
            return Err(KernelError::ComponentMismatch {
                n_weights: weights.len(),
                n_means: means.len(),
                n_variances: variances.len(),
            });
        }
        if weights.is_empty() {
            return Err(KernelError::NoComponents);
        }
        check_positive("weights", &weights)?;
        check_positive("means", &means)?;
        check_positive("variances", &variances)?;

        Ok(Self {
            weights,
            means,
            variances,
        })
    }

    /// Create a new `SpectralMixtureKernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(
        weights: DVector<f64>,
        means: DVector<f64>,
        variances: DVector<f64>,
    ) -> Self {
        Self {
            weights,
            means,
            variances,
        }
    }

    /// Deterministic initialization of a `q` component mixture from data.
    ///
    /// * Mean frequencies are log-spaced between `1 / span` and the Nyquist
    ///   frequency of the smallest gap between distinct inputs, `0.5 / gap`.
    /// * Spectral variances all equal `1 / (2π span)²`, i.e. a length-scale
    ///   of the order of the input span.
    /// * Weights share the sample variance of `y` equally, so the prior
    ///   variance `Σ w_q` matches the data.
    ///
    /// # Errors
    /// `q` must be positive and `x` non-empty.
    pub fn from_data(
        q: usize,
        x: &DVector<f64>,
        y: &DVector<f64>,
    ) -> Result<Self, KernelError> {
        if q == 0 {
            return Err(KernelError::NoComponents);
        }
        if x.is_empty() {
            return Err(KernelError::EmptyData);
        }

        let sorted: Vec<f64> =
            x.iter().copied().sorted_by(f64::total_cmp).collect();
        let span = sorted[sorted.len() - 1] - sorted[0];
        let gap = sorted
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .filter(|d| *d > 0.0)
            .fold(f64::INFINITY, f64::min);

        let (span, gap) = if span > 0.0 && gap.is_finite() {
            (span, gap)
        } else {
            (1.0, 1.0)
        };

        let f_span = 1.0 / span;
        let f_nyquist = 0.5 / gap;
        let lo = f_span.min(f_nyquist);
        let hi = f_span.max(f_nyquist);

        let means = if q == 1 {
            DVector::from_element(1, (lo * hi).sqrt())
        } else {
            let ratio = hi / lo;
            DVector::from_fn(q, |k, _| {
                lo * ratio.powf(k as f64 / (q - 1) as f64)
            })
        };

        let variances =
            DVector::from_element(q, 1.0 / (TWO_PI * span).powi(2));

        let y_var = if y.is_empty() {
            f64::NAN
        } else {
            let n = y.len() as f64;
            let y_mean = y.sum() / n;
            y.iter().map(|yi| (yi - y_mean).powi(2)).sum::<f64>() / n
        };
        let total = if y_var.is_finite() && y_var > 0.0 {
            y_var
        } else {
            1.0
        };
        let weights = DVector::from_element(q, total / q as f64);

        Self::new(weights, means, variances)
    }

    /// Number of mixture components, `Q`
    #[inline]
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    /// Mixture weights
    #[must_use]
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Mean frequencies
    #[must_use]
    pub fn means(&self) -> &DVector<f64> {
        &self.means
    }

    /// Spectral variances
    #[must_use]
    pub fn variances(&self) -> &DVector<f64> {
        &self.variances
    }

    /// Prior variance at any single point, `k(0) = Σ w_q`
    #[must_use]
    pub fn prior_variance(&self) -> f64 {
        self.weights.sum()
    }

    #[inline]
    fn eval<R1, C1, S1, R2, C2, S2>(
        &self,
        x1: &Matrix<f64, R1, C1, S1>,
        i: usize,
        x2: &Matrix<f64, R2, C2, S2>,
        j: usize,
    ) -> f64
    where
        R1: Dim,
        C1: Dim,
        S1: Storage<f64, R1, C1>,
        R2: Dim,
        C2: Dim,
        S2: Storage<f64, R2, C2>,
    {
        let tau2 = sq_row_distance(x1, i, x2, j);
        (0..self.n_components()).fold(0.0, |acc, q| {
            let decay = (-TWO_PI_SQUARED * tau2 * self.variances[q]).exp();
            let wave = (0..x1.ncols()).fold(1.0, |prod, d| {
                let tau = (x1[(i, d)] - x2[(j, d)]).abs();
                prod * (TWO_PI * tau * self.means[q]).cos()
            });
            self.weights[q].mul_add(decay * wave, acc)
        })
    }
}

impl Kernel for SpectralMixtureKernel {
    fn n_parameters(&self) -> usize {
        3 * self.n_components()
    }

    fn covariance<R1, R2, C1, C2, S1, S2>(
        &self,
        x1: &Matrix<f64, R1, C1, S1>,
        x2: &Matrix<f64, R2, C2, S2>,
    ) -> DMatrix<f64>
    where
        R1: Dim,
        R2: Dim,
        C1: Dim,
        C2: Dim,
        S1: Storage<f64, R1, C1>,
        S2: Storage<f64, R2, C2>,
        ShapeConstraint: SameNumberOfColumns<C1, C2>,
    {
        DMatrix::from_fn(x1.nrows(), x2.nrows(), |i, j| {
            self.eval(x1, i, x2, j)
        })
    }

    fn is_stationary(&self) -> bool {
        true
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        DVector::from_element(x.nrows(), self.prior_variance())
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.n_parameters(),
            self.weights
                .iter()
                .chain(self.means.iter())
                .chain(self.variances.iter())
                .map(|p| p.ln()),
        )
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        use std::cmp::Ordering;
        let n = self.n_parameters();
        match params.len().cmp(&n) {
            Ordering::Equal => {
                let q = self.n_components();
                let exped = |s: &[f64]| {
                    DVector::from_iterator(q, s.iter().map(|p| p.exp()))
                };
                Self::new(
                    exped(&params[..q]),
                    exped(&params[q..2 * q]),
                    exped(&params[2 * q..]),
                )
            }
            Ordering::Greater => {
                Err(KernelError::ExtraneousParameters(params.len() - n))
            }
            Ordering::Less => {
                Err(KernelError::MissingParameters(n - params.len()))
            }
        }
    }

    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let n = x.nrows();
        let q = self.n_components();
        let prior_variance = self.prior_variance();

        let mut cov = DMatrix::zeros(n, n);
        let mut grad = CovGrad::zeros(n, 3 * q);

        let dims = x.ncols();
        let mut phases = vec![0.0; dims];

        for i in 0..n {
            for j in 0..i {
                let tau2 = sq_row_distance(x, i, x, j);
                let mut cov_ij = 0.0;

                for c in 0..q {
                    let (w, mu, v) =
                        (self.weights[c], self.means[c], self.variances[c]);
                    let decay = (-TWO_PI_SQUARED * tau2 * v).exp();

                    phases.iter_mut().enumerate().for_each(|(d, p)| {
                        *p = TWO_PI * (x[(i, d)] - x[(j, d)]).abs() * mu;
                    });
                    let wave: f64 = phases.iter().map(|p| p.cos()).product();
                    // d(wave)/d ln(mu) = Σ_d -sin(p_d) p_d Π_{e≠d} cos(p_e)
                    let dwave: f64 = (0..dims)
                        .map(|d| {
                            let others: f64 = phases
                                .iter()
                                .enumerate()
                                .filter(|(e, _)| *e != d)
                                .map(|(_, p)| p.cos())
                                .product();
                            -phases[d].sin() * phases[d] * others
                        })
                        .sum();

                    let term = w * decay * wave;
                    cov_ij += term;

                    grad[(i, j, c)] = term;
                    grad[(i, j, q + c)] = w * decay * dwave;
                    grad[(i, j, 2 * q + c)] = -TWO_PI_SQUARED * tau2 * v * term;
                }

                cov[(i, j)] = cov_ij;
                cov[(j, i)] = cov_ij;
                for k in 0..3 * q {
                    grad[(j, i, k)] = grad[(i, j, k)];
                }
            }

            cov[(i, i)] = prior_variance;
            for c in 0..q {
                grad[(i, i, c)] = self.weights[c];
            }
        }

        Ok((cov, grad))
    }
}
