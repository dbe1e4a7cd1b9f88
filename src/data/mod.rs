//! Training data and the synthetic sine-wave generator
use std::fmt;

use nalgebra::DVector;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::TWO_PI;

/// `n` evenly spaced points over `[a, b]`, both ends included.
///
/// # Example
///
/// ```
/// # use spectral_gp::data::linspace;
/// let xs = linspace(0.0, 1.0, 5);
/// assert_eq!(xs.as_slice(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
/// ```
#[must_use]
pub fn linspace(a: f64, b: f64, n: usize) -> DVector<f64> {
    match n {
        0 => DVector::zeros(0),
        1 => DVector::from_element(1, a),
        _ => {
            let step = (b - a) / (n - 1) as f64;
            DVector::from_fn(n, |i, _| {
                if i == n - 1 {
                    b
                } else {
                    (i as f64).mul_add(step, a)
                }
            })
        }
    }
}

/// Paired inputs and noisy observations used to fit a process.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct TrainingSet {
    x: DVector<f64>,
    y: DVector<f64>,
}

impl TrainingSet {
    /// Create a new training set
    ///
    /// # Errors
    /// The inputs and outputs must be the same, non-zero, length and every
    /// value must be finite.
    pub fn new(x: DVector<f64>, y: DVector<f64>) -> Result<Self, DataError> {
        if x.len() != y.len() {
            Err(DataError::LengthMismatch {
                n_x: x.len(),
                n_y: y.len(),
            })
        } else if x.is_empty() {
            Err(DataError::Empty)
        } else if let Some(ix) = x
            .iter()
            .chain(y.iter())
            .position(|v| !v.is_finite())
        {
            Err(DataError::NonFiniteValue { index: ix % x.len() })
        } else {
            Ok(Self { x, y })
        }
    }

    /// Inputs
    #[must_use]
    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Observations
    #[must_use]
    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    /// Number of observations
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always `false`; construction rejects empty data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Generator for `y = sin(2πx) + ε` with `ε ~ N(0, noise_variance)` on an
/// evenly spaced grid.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct SineWave {
    /// Number of points
    pub n: usize,
    /// Left end of the input domain
    pub lower: f64,
    /// Right end of the input domain
    pub upper: f64,
    /// Variance of the additive observation noise
    pub noise_variance: f64,
    /// Seed used by [`SineWave::generate_seeded`]
    pub seed: u64,
}

impl Default for SineWave {
    fn default() -> Self {
        Self::reference()
    }
}

impl SineWave {
    /// Eleven points on `[0, 0.75]` with noise variance 0.04.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            n: 11,
            lower: 0.0,
            upper: 0.75,
            noise_variance: 0.04,
            seed: 0,
        }
    }

    /// Set the number of points
    #[must_use]
    pub fn with_n(self, n: usize) -> Self {
        Self { n, ..self }
    }

    /// Set the input domain
    #[must_use]
    pub fn with_domain(self, lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            ..self
        }
    }

    /// Set the noise variance
    #[must_use]
    pub fn with_noise_variance(self, noise_variance: f64) -> Self {
        Self {
            noise_variance,
            ..self
        }
    }

    /// Set the seed
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    fn validate(&self) -> Result<(), DataError> {
        if self.n == 0 {
            Err(DataError::Empty)
        } else if !self.lower.is_finite() || !self.upper.is_finite() {
            Err(DataError::InvalidDomain {
                lower: self.lower,
                upper: self.upper,
            })
        } else if self.n > 1 && self.lower >= self.upper {
            Err(DataError::InvalidDomain {
                lower: self.lower,
                upper: self.upper,
            })
        } else if !self.noise_variance.is_finite() || self.noise_variance < 0.0
        {
            Err(DataError::InvalidNoiseVariance {
                noise_variance: self.noise_variance,
            })
        } else {
            Ok(())
        }
    }

    /// Draw a training set using the provided random number generator
    ///
    /// # Errors
    /// Fails when the configuration is invalid.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<TrainingSet, DataError> {
        self.validate()?;

        let x = linspace(self.lower, self.upper, self.n);
        let signal = x.map(|xi| (TWO_PI * xi).sin());

        let y = if self.noise_variance == 0.0 {
            signal
        } else {
            let noise = Normal::new(0.0, self.noise_variance.sqrt()).map_err(
                |_| DataError::InvalidNoiseVariance {
                    noise_variance: self.noise_variance,
                },
            )?;
            signal.map(|fx| fx + noise.sample(rng))
        };

        TrainingSet::new(x, y)
    }

    /// Draw a training set reproducibly from `self.seed`
    ///
    /// # Errors
    /// Fails when the configuration is invalid.
    pub fn generate_seeded(&self) -> Result<TrainingSet, DataError> {
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
        self.generate(&mut rng)
    }
}

/// Errors from constructing or generating training data
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum DataError {
    /// No points were requested or given
    Empty,
    /// Inputs and outputs differ in length
    LengthMismatch {
        /// Number of inputs
        n_x: usize,
        /// Number of outputs
        n_y: usize,
    },
    /// An input or output is infinite or NaN
    NonFiniteValue {
        /// Index of the offending pair
        index: usize,
    },
    /// The domain is not a finite interval with `lower < upper`
    InvalidDomain {
        /// Left end
        lower: f64,
        /// Right end
        upper: f64,
    },
    /// The noise variance is negative or not finite
    InvalidNoiseVariance {
        /// Value given
        noise_variance: f64,
    },
}

impl std::error::Error for DataError {}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "training data cannot be empty"),
            Self::LengthMismatch { n_x, n_y } => write!(
                f,
                "inputs and outputs differ in length (x: {n_x}, y: {n_y})"
            ),
            Self::NonFiniteValue { index } => {
                write!(f, "non-finite value at index {index}")
            }
            Self::InvalidDomain { lower, upper } => {
                write!(f, "invalid domain: [{lower}, {upper}]")
            }
            Self::InvalidNoiseVariance { noise_variance } => write!(
                f,
                "noise variance ({noise_variance}) must be finite and non-negative"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-12;

    #[test]
    fn linspace_includes_both_ends() {
        let xs = linspace(0.0, 0.75, 11);
        assert_eq!(xs.len(), 11);
        assert_eq!(xs[0], 0.0);
        assert_eq!(xs[10], 0.75);
        assert::close(xs[1], 0.075, TOL);
        assert::close(xs[5], 0.375, TOL);
    }

    #[test]
    fn linspace_degenerate_sizes() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 3.0, 1).as_slice(), &[2.0]);
    }

    #[test]
    fn noiseless_sine_is_exact() {
        let train = SineWave::reference()
            .with_noise_variance(0.0)
            .generate_seeded()
            .unwrap();
        train.x().iter().zip(train.y().iter()).for_each(|(x, y)| {
            assert::close(*y, (TWO_PI * x).sin(), TOL);
        });
    }

    #[test]
    fn same_seed_same_data() {
        let sine = SineWave::reference().with_seed(1337);
        let a = sine.generate_seeded().unwrap();
        let b = sine.generate_seeded().unwrap();
        assert_eq!(a, b);

        let c = sine.with_seed(1338).generate_seeded().unwrap();
        assert_eq!(a.x(), c.x());
        assert_ne!(a.y(), c.y());
    }

    #[test]
    fn invalid_configurations() {
        assert_eq!(
            SineWave::reference().with_n(0).generate_seeded(),
            Err(DataError::Empty)
        );
        assert!(matches!(
            SineWave::reference()
                .with_domain(1.0, 0.0)
                .generate_seeded(),
            Err(DataError::InvalidDomain { .. })
        ));
        assert!(matches!(
            SineWave::reference()
                .with_noise_variance(-1.0)
                .generate_seeded(),
            Err(DataError::InvalidNoiseVariance { .. })
        ));
    }

    #[test]
    fn training_set_validation() {
        let x = DVector::from_column_slice(&[0.0, 1.0]);
        let y = DVector::from_column_slice(&[0.0]);
        assert_eq!(
            TrainingSet::new(x.clone(), y),
            Err(DataError::LengthMismatch { n_x: 2, n_y: 1 })
        );

        let y = DVector::from_column_slice(&[0.0, f64::NAN]);
        assert_eq!(
            TrainingSet::new(x, y),
            Err(DataError::NonFiniteValue { index: 1 })
        );

        assert_eq!(
            TrainingSet::new(DVector::zeros(0), DVector::zeros(0)),
            Err(DataError::Empty)
        );
    }
}
