//! Random processes fit by maximizing the marginal likelihood

use nalgebra::DVector;

pub mod gaussian;

/// A random process with a differentiable log marginal likelihood over a flat
/// vector of free (unconstrained) parameters.
pub trait RandomProcess: Clone {
    /// Error raised while evaluating the likelihood
    type Error: std::error::Error;

    /// Number of observations the process is conditioned on
    fn n_observations(&self) -> usize;

    /// Compute the log marginal likelihood
    fn ln_m(&self) -> Result<f64, Self::Error>;

    /// Compute the log marginal likelihood with an different set of
    /// parameters and compute the gradient.
    fn ln_m_with_parameters(
        &self,
        parameters: &DVector<f64>,
    ) -> Result<(f64, DVector<f64>), Self::Error>;

    /// Get the parameters
    fn parameters(&self) -> DVector<f64>;

    /// Set with the given parameters
    fn set_parameters(
        &mut self,
        parameters: &DVector<f64>,
    ) -> Result<(), Self::Error>;
}

/// Negative log marginal likelihood of a process as an `argmin` problem
#[cfg(feature = "argmin")]
pub struct RandomProcessMleOp<P: RandomProcess> {
    process: P,
}

#[cfg(feature = "argmin")]
impl<P: RandomProcess> RandomProcessMleOp<P> {
    /// Wrap a process
    pub fn new(process: P) -> Self {
        Self { process }
    }

    /// Give back the wrapped process
    pub fn into_inner(self) -> P {
        self.process
    }
}

#[cfg(feature = "argmin")]
impl<P> argmin::core::CostFunction for RandomProcessMleOp<P>
where
    P: RandomProcess,
    P::Error: Send + Sync + 'static,
{
    type Param = DVector<f64>;
    type Output = f64;

    fn cost(
        &self,
        param: &Self::Param,
    ) -> Result<Self::Output, argmin::core::Error> {
        let (ln_m, _) = self.process.ln_m_with_parameters(param)?;
        Ok(-ln_m)
    }
}

#[cfg(feature = "argmin")]
impl<P> argmin::core::Gradient for RandomProcessMleOp<P>
where
    P: RandomProcess,
    P::Error: Send + Sync + 'static,
{
    type Param = DVector<f64>;
    type Gradient = DVector<f64>;

    fn gradient(
        &self,
        param: &Self::Param,
    ) -> Result<Self::Gradient, argmin::core::Error> {
        let (_, grad) = self.process.ln_m_with_parameters(param)?;
        Ok(-grad)
    }
}
