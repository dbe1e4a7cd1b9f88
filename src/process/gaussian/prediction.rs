use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use super::{jittered_cholesky, GpError, JitterConfig};

/// Structure for making GP predictions
///
/// Holds the mean and covariance of the (posterior) predictive distribution
/// at a set of test inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Predictive mean
    mean: DVector<f64>,
    /// Predictive covariance
    cov: DMatrix<f64>,
    /// Jitter policy used when factorizing `cov` for draws
    jitter: JitterConfig,
}

impl Prediction {
    pub(crate) fn new(
        mean: DVector<f64>,
        cov: DMatrix<f64>,
        jitter: JitterConfig,
    ) -> Self {
        Self { mean, cov, jitter }
    }

    /// Return the mean of the posterior
    #[must_use]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Return the covariance of the posterior
    #[must_use]
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.cov
    }

    /// Number of predicted points
    #[must_use]
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// Whether there are no predicted points
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Marginal variance at each point. Round-off can leave tiny negative
    /// values on the diagonal; those are clamped to zero.
    #[must_use]
    pub fn variance(&self) -> DVector<f64> {
        self.cov.diagonal().map(|v| v.max(0.0))
    }

    /// Return the standard deviation of posterior.
    #[must_use]
    pub fn std(&self) -> DVector<f64> {
        self.variance().map(f64::sqrt)
    }

    /// `mean ± 2 std`, roughly a 95% band under the Gaussian assumption
    #[must_use]
    pub fn confidence_region(&self) -> (DVector<f64>, DVector<f64>) {
        self.confidence_region_with(2.0)
    }

    /// `mean ± z std`
    #[must_use]
    pub fn confidence_region_with(
        &self,
        z: f64,
    ) -> (DVector<f64>, DVector<f64>) {
        let half_width = self.std() * z;
        (&self.mean - &half_width, &self.mean + &half_width)
    }

    /// Draw a single function from the predictive distribution
    ///
    /// # Errors
    /// Fails if the covariance cannot be factorized, even with jitter.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<DVector<f64>, GpError> {
        self.sample(1, rng)
            .map(|mut draws| draws.pop().unwrap_or_else(|| self.mean.clone()))
    }

    /// Return a number of functions drawn from the predictive distribution
    ///
    /// # Errors
    /// Fails if the covariance cannot be factorized, even with jitter.
    pub fn sample<R: Rng>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<DVector<f64>>, GpError> {
        let (chol, _) = jittered_cholesky(self.cov.clone(), &self.jitter)?;
        let l = chol.l();
        let n = self.len();
        Ok((0..size)
            .map(|_| {
                let z: DVector<f64> =
                    DVector::from_fn(n, |_, _| rng.sample(StandardNormal));
                &self.mean + &l * z
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn fixture() -> Prediction {
        Prediction::new(
            DVector::from_column_slice(&[0.0, 1.0, -1.0]),
            DMatrix::from_row_slice(
                3,
                3,
                &[4.0, 0.5, 0.0, 0.5, 1.0, 0.0, 0.0, 0.0, -1E-14],
            ),
            JitterConfig::default(),
        )
    }

    #[test]
    fn variance_is_clamped() {
        let pred = fixture();
        assert_eq!(pred.variance().as_slice(), &[4.0, 1.0, 0.0]);
        assert_eq!(pred.std().as_slice(), &[2.0, 1.0, 0.0]);
    }

    #[test]
    fn confidence_region_is_two_std() {
        let pred = fixture();
        let (lower, upper) = pred.confidence_region();
        assert_eq!(lower.as_slice(), &[-4.0, -1.0, -1.0]);
        assert_eq!(upper.as_slice(), &[4.0, 3.0, -1.0]);
    }

    #[test]
    fn samples_have_right_shape() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0x1234);
        let pred = Prediction::new(
            DVector::from_column_slice(&[0.0, 1.0]),
            DMatrix::identity(2, 2),
            JitterConfig::default(),
        );
        let draws = pred.sample(5, &mut rng).unwrap();
        assert_eq!(draws.len(), 5);
        assert!(draws.iter().all(|d| d.len() == 2));
        assert_eq!(pred.draw(&mut rng).unwrap().len(), 2);
    }

    #[test]
    fn sample_mean_approaches_predictive_mean() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0xABCD);
        let pred = Prediction::new(
            DVector::from_column_slice(&[3.0, -2.0]),
            DMatrix::from_row_slice(2, 2, &[0.25, 0.1, 0.1, 0.25]),
            JitterConfig::default(),
        );
        let n = 20_000;
        let draws = pred.sample(n, &mut rng).unwrap();
        let mean = draws
            .iter()
            .fold(DVector::zeros(2), |acc: DVector<f64>, d| acc + d)
            / n as f64;
        assert!(mean.relative_eq(pred.mean(), 2E-2, 2E-2));
    }
}
