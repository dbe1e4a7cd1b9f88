//! First-order optimizers over flat parameter vectors

use nalgebra::DVector;
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

mod adam;
pub use adam::{Adam, AdamParams};

/// A gradient-based optimizer that minimizes an objective
pub trait Optimizer {
    /// Update `parameters` in place given the gradient of the objective
    ///
    /// # Errors
    /// Fails if the gradient does not match the parameters, or does not
    /// match the size seen on earlier steps.
    fn step(
        &mut self,
        parameters: &mut DVector<f64>,
        gradient: &DVector<f64>,
    ) -> Result<(), OptimError>;

    /// Forget all accumulated state
    fn reset(&mut self);

    /// Current learning rate
    fn learning_rate(&self) -> f64;

    /// Change the learning rate
    fn set_learning_rate(&mut self, learning_rate: f64);
}

/// Errors from an optimizer step
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum OptimError {
    /// The gradient or parameters had an unexpected length
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Length given
        given: usize,
    },
}

impl std::error::Error for OptimError {}

impl fmt::Display for OptimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, given } => write!(
                f,
                "Optimizer expected {expected} parameters, given {given}"
            ),
        }
    }
}
