//! Gaussian Processes

use log::{debug, warn};
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::HALF_LN_2PI;
use crate::data::{DataError, TrainingSet};
use crate::process::RandomProcess;

pub mod kernel;
use kernel::{CovGradError, Kernel, KernelError};

mod constraint;
pub use constraint::{ConstraintError, Interval};

mod likelihood;
pub use likelihood::GaussianLikelihood;

mod mean;
pub use mean::ConstantMean;

mod prediction;
pub use prediction::Prediction;

/// Errors from fitting or querying a Gaussian process
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum GpError {
    /// A covariance matrix could not be factorized even after adding jitter
    NumericalInstability {
        /// Number of jittered attempts made after the plain factorization
        attempts: usize,
        /// The last (largest) jitter tried
        jitter: f64,
    },
    /// A vector or matrix had the wrong size
    DimensionMismatch {
        /// Expected size
        expected: usize,
        /// Size given
        given: usize,
    },
    /// A free parameter was NaN or infinite
    NonFiniteParameter {
        /// Position in the parameter vector
        index: usize,
    },
    /// The jitter policy is unusable
    InvalidJitter {
        /// Initial jitter
        initial: f64,
        /// Growth factor between attempts
        growth: f64,
    },
    /// Kernel error
    Kernel(KernelError),
    /// Covariance gradient error
    CovGrad(CovGradError),
    /// Parameter constraint error
    Constraint(ConstraintError),
    /// Training data error
    Data(DataError),
}

impl std::error::Error for GpError {}

impl fmt::Display for GpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumericalInstability { attempts, jitter } => write!(
                f,
                "Covariance is not positive definite after {attempts} \
                 jittered attempts (last jitter: {jitter:e})"
            ),
            Self::DimensionMismatch { expected, given } => write!(
                f,
                "Dimension mismatch: expected {expected}, given {given}"
            ),
            Self::NonFiniteParameter { index } => {
                write!(f, "Parameter {index} is not finite")
            }
            Self::InvalidJitter { initial, growth } => write!(
                f,
                "Jitter must start positive and grow (initial: {initial}, \
                 growth: {growth})"
            ),
            Self::Kernel(e) => write!(f, "Kernel error: {e}"),
            Self::CovGrad(e) => write!(f, "Covariance gradient error: {e}"),
            Self::Constraint(e) => write!(f, "Constraint error: {e}"),
            Self::Data(e) => write!(f, "Data error: {e}"),
        }
    }
}

impl From<KernelError> for GpError {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e)
    }
}

impl From<CovGradError> for GpError {
    fn from(e: CovGradError) -> Self {
        Self::CovGrad(e)
    }
}

impl From<ConstraintError> for GpError {
    fn from(e: ConstraintError) -> Self {
        Self::Constraint(e)
    }
}

impl From<DataError> for GpError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

/// Policy for stabilizing a Cholesky factorization by adding a growing
/// multiple of the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct JitterConfig {
    initial: f64,
    growth: f64,
    max_attempts: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            initial: 1E-8,
            growth: 10.0,
            max_attempts: 5,
        }
    }
}

impl JitterConfig {
    /// Create a new jitter policy
    ///
    /// # Errors
    /// `initial` must be positive and finite and `growth` must exceed one.
    pub fn new(
        initial: f64,
        growth: f64,
        max_attempts: usize,
    ) -> Result<Self, GpError> {
        if initial > 0.0
            && initial.is_finite()
            && growth > 1.0
            && growth.is_finite()
        {
            Ok(Self {
                initial,
                growth,
                max_attempts,
            })
        } else {
            Err(GpError::InvalidJitter { initial, growth })
        }
    }

    /// Jitter used on the first retry
    #[must_use]
    pub fn initial(&self) -> f64 {
        self.initial
    }

    /// Factor applied to the jitter between retries
    #[must_use]
    pub fn growth(&self) -> f64 {
        self.growth
    }

    /// Number of jittered retries before giving up
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

/// Cholesky factorization of `k`, adding jitter to the diagonal when the
/// plain factorization fails. Returns the factor and the jitter that was
/// added (zero if none was needed).
pub(crate) fn jittered_cholesky(
    k: DMatrix<f64>,
    config: &JitterConfig,
) -> Result<(Cholesky<f64, Dyn>, f64), GpError> {
    if k.iter().any(|v| !v.is_finite()) {
        return Err(GpError::NumericalInstability {
            attempts: 0,
            jitter: 0.0,
        });
    }

    if let Some(chol) = Cholesky::new(k.clone()) {
        return Ok((chol, 0.0));
    }

    let mut jitter = config.initial;
    let mut last = 0.0;
    for attempt in 1..=config.max_attempts {
        let mut kj = k.clone();
        for i in 0..kj.nrows() {
            kj[(i, i)] += jitter;
        }
        warn!(
            "Covariance not positive definite, retrying with jitter {jitter:e} \
             (attempt {attempt}/{})",
            config.max_attempts
        );
        if let Some(chol) = Cholesky::new(kj) {
            return Ok((chol, jitter));
        }
        last = jitter;
        jitter *= config.growth;
    }

    Err(GpError::NumericalInstability {
        attempts: config.max_attempts,
        jitter: last,
    })
}

/// Factorized covariance of the observed training targets
struct Factorization {
    chol: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    residual: DVector<f64>,
}

impl Factorization {
    /// GPML Equation 2.30 with a non-zero prior mean
    fn ln_m(&self) -> f64 {
        let n = self.residual.len() as f64;
        let log_det_half: f64 =
            self.chol.l_dirty().diagonal().map(f64::ln).sum();
        (-0.5_f64).mul_add(
            self.residual.dot(&self.alpha),
            -log_det_half - n * HALF_LN_2PI,
        )
    }
}

/// Exact Gaussian process regression with a constant prior mean and a
/// Gaussian (homoscedastic) observation likelihood.
///
/// The free parameters are laid out as
/// `[raw mean, kernel parameters (log-scale)…, raw noise]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GaussianProcess<K>
where
    K: Kernel,
{
    kernel: K,
    mean: ConstantMean,
    likelihood: GaussianLikelihood,
    train: TrainingSet,
    jitter: JitterConfig,
}

impl<K> GaussianProcess<K>
where
    K: Kernel,
{
    /// Condition a Gaussian process on the training data
    ///
    /// # Arguments
    /// * `kernel` - Kernel to use to determine covariance
    /// * `mean` - Prior mean function
    /// * `likelihood` - Observation noise model
    /// * `train` - Observed inputs and targets
    ///
    /// # Errors
    /// Fails if the observed covariance cannot be factorized.
    pub fn new(
        kernel: K,
        mean: ConstantMean,
        likelihood: GaussianLikelihood,
        train: TrainingSet,
    ) -> Result<Self, GpError> {
        let gp = Self {
            kernel,
            mean,
            likelihood,
            train,
            jitter: JitterConfig::default(),
        };
        gp.factorize()?;
        Ok(gp)
    }

    /// Use a different jitter policy
    #[must_use]
    pub fn with_jitter(self, jitter: JitterConfig) -> Self {
        Self { jitter, ..self }
    }

    /// Return the kernel being used in this GP
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Prior mean
    pub fn mean(&self) -> &ConstantMean {
        &self.mean
    }

    /// Observation likelihood
    pub fn likelihood(&self) -> &GaussianLikelihood {
        &self.likelihood
    }

    /// Training data
    pub fn train(&self) -> &TrainingSet {
        &self.train
    }

    /// Jitter policy
    pub fn jitter(&self) -> &JitterConfig {
        &self.jitter
    }

    /// Prior mean vector and covariance matrix of the latent function at `x`
    pub fn joint_distribution(
        &self,
        x: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        (self.mean.mean(x), self.kernel.covariance(x, x))
    }

    fn solve(
        &self,
        k: DMatrix<f64>,
        m: &DVector<f64>,
    ) -> Result<Factorization, GpError> {
        let k = self.likelihood.observe(&k)?;
        let (chol, jitter) = jittered_cholesky(k, &self.jitter)?;
        if jitter > 0.0 {
            debug!("Factorized observed covariance with jitter {jitter:e}");
        }
        let residual = self.train.y() - m;
        let alpha = chol.solve(&residual);
        Ok(Factorization {
            chol,
            alpha,
            residual,
        })
    }

    fn factorize(&self) -> Result<Factorization, GpError> {
        let (m, k) = self.joint_distribution(self.train.x());
        self.solve(k, &m)
    }

    /// Return the log marginal likelihood of the training targets
    ///
    /// # Errors
    /// Fails if the observed covariance cannot be factorized.
    pub fn ln_m(&self) -> Result<f64, GpError> {
        self.factorize().map(|f| f.ln_m())
    }

    /// Alias for [`GaussianProcess::ln_m`]
    ///
    /// # Errors
    /// Fails if the observed covariance cannot be factorized.
    pub fn log_marginal_likelihood(&self) -> Result<f64, GpError> {
        self.ln_m()
    }

    /// Log marginal likelihood and its gradient with respect to the free
    /// parameters at the current values.
    ///
    /// # Errors
    /// Fails if the observed covariance cannot be factorized.
    pub fn ln_m_with_gradient(&self) -> Result<(f64, DVector<f64>), GpError> {
        let x = self.train.x();
        let m = self.mean.mean(x);
        let (k, k_grad) = self.kernel.covariance_with_gradient(x)?;
        let fact = self.solve(k, &m)?;
        let ln_m = fact.ln_m();

        // GPML Equation 5.9
        let aat_kinv =
            &fact.alpha * fact.alpha.transpose() - fact.chol.inverse();
        let kernel_grad = k_grad.contract(&aat_kinv)? * 0.5;
        let noise_grad =
            0.5 * aat_kinv.trace() * self.likelihood.noise_gradient_raw();
        let mean_grad = fact.alpha.sum() * self.mean.gradient_raw();

        let n = kernel_grad.len();
        let grad = DVector::from_fn(n + 2, |i, _| {
            if i == 0 {
                mean_grad
            } else if i <= n {
                kernel_grad[i - 1]
            } else {
                noise_grad
            }
        });
        Ok((ln_m, grad))
    }

    /// Log-marginal likelihood and gradient at the given free parameters
    ///
    /// # Errors
    /// Fails on a malformed parameter vector or a failed factorization.
    pub fn ln_m_with_parameters(
        &self,
        parameters: &DVector<f64>,
    ) -> Result<(f64, DVector<f64>), GpError> {
        let mut gp = self.clone();
        gp.set_parameters(parameters)?;
        gp.ln_m_with_gradient()
    }

    /// Number of free parameters
    pub fn n_parameters(&self) -> usize {
        self.kernel.n_parameters() + 2
    }

    /// Flat vector of free parameters
    pub fn parameters(&self) -> DVector<f64> {
        let kernel = self.kernel.parameters();
        let n = kernel.len();
        DVector::from_fn(n + 2, |i, _| {
            if i == 0 {
                self.mean.raw()
            } else if i <= n {
                kernel[i - 1]
            } else {
                self.likelihood.raw()
            }
        })
    }

    /// Replace all free parameters. The process is left untouched on error.
    ///
    /// # Errors
    /// Fails if the vector has the wrong length or holds non-finite values,
    /// or if the kernel rejects its parameters.
    pub fn set_parameters(
        &mut self,
        parameters: &DVector<f64>,
    ) -> Result<(), GpError> {
        let expected = self.n_parameters();
        if parameters.len() != expected {
            return Err(GpError::DimensionMismatch {
                expected,
                given: parameters.len(),
            });
        }
        if let Some(index) = parameters.iter().position(|p| !p.is_finite()) {
            return Err(GpError::NonFiniteParameter { index });
        }

        let params = parameters.as_slice();
        let (kernel, rest) = self.kernel.consume_parameters(&params[1..])?;

        self.kernel = kernel;
        self.mean.set_raw(params[0]);
        self.likelihood.set_raw(rest[0]);
        Ok(())
    }

    /// Posterior distribution of the latent function at `xs`
    ///
    /// Builds the joint prior over the training and test inputs and
    /// conditions on the observed targets.
    ///
    /// # Errors
    /// Fails if the observed covariance cannot be factorized.
    pub fn posterior_predictive(
        &self,
        xs: &DVector<f64>,
    ) -> Result<Prediction, GpError> {
        let n = self.train.len();
        let m = xs.len();
        let x_all = DVector::from_iterator(
            n + m,
            self.train.x().iter().chain(xs.iter()).copied(),
        );
        let (mu_all, k_all) = self.joint_distribution(&x_all);

        let k_train = k_all.view((0, 0), (n, n)).into_owned();
        let k_cross = k_all.view((0, n), (n, m)).into_owned();
        let k_test = k_all.view((n, n), (m, m)).into_owned();
        let mu_train = mu_all.rows(0, n).into_owned();
        let mu_test = mu_all.rows(n, m).into_owned();

        let fact = self.solve(k_train, &mu_train)?;
        let k_trans = k_cross.transpose();
        let mean = mu_test + &k_trans * &fact.alpha;
        let v = fact.chol.solve(&k_cross);
        let cov = k_test - &k_trans * v;
        let cov = (&cov + cov.transpose()) * 0.5;

        Ok(Prediction::new(mean, cov, self.jitter))
    }

    /// Predictive distribution of new noisy observations at `xs`
    ///
    /// # Errors
    /// Fails if the observed covariance cannot be factorized.
    pub fn observed_predictive(
        &self,
        xs: &DVector<f64>,
    ) -> Result<Prediction, GpError> {
        let latent = self.posterior_predictive(xs)?;
        let cov = self.likelihood.observe(latent.cov())?;
        Ok(Prediction::new(latent.mean().clone(), cov, self.jitter))
    }
}

impl<K> RandomProcess for GaussianProcess<K>
where
    K: Kernel,
{
    type Error = GpError;

    fn n_observations(&self) -> usize {
        self.train.len()
    }

    fn ln_m(&self) -> Result<f64, GpError> {
        GaussianProcess::ln_m(self)
    }

    fn ln_m_with_parameters(
        &self,
        parameters: &DVector<f64>,
    ) -> Result<(f64, DVector<f64>), GpError> {
        GaussianProcess::ln_m_with_parameters(self, parameters)
    }

    fn parameters(&self) -> DVector<f64> {
        GaussianProcess::parameters(self)
    }

    fn set_parameters(
        &mut self,
        parameters: &DVector<f64>,
    ) -> Result<(), GpError> {
        GaussianProcess::set_parameters(self, parameters)
    }
}
