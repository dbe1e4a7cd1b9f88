//! Adam optimizer (Kingma & Ba, 2015)

use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::{OptimError, Optimizer};

/// Adam hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct AdamParams {
    /// Step size
    pub learning_rate: f64,
    /// Decay of the first moment estimate
    pub beta1: f64,
    /// Decay of the second moment estimate
    pub beta2: f64,
    /// Added to the denominator for numerical stability
    pub epsilon: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1E-8,
        }
    }
}

impl AdamParams {
    /// Set the learning rate
    #[must_use]
    pub fn with_learning_rate(self, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..self
        }
    }

    /// Set the moment decay rates
    #[must_use]
    pub fn with_betas(self, beta1: f64, beta2: f64) -> Self {
        Self {
            beta1,
            beta2,
            ..self
        }
    }

    /// Set epsilon
    #[must_use]
    pub fn with_epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }
}

/// Adam optimizer with bias-corrected moment estimates
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Adam {
    params: AdamParams,
    /// First moment estimate
    m: Option<DVector<f64>>,
    /// Second moment estimate
    v: Option<DVector<f64>>,
    /// Timestep
    t: u32,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(AdamParams::default())
    }
}

impl Adam {
    /// Create a new Adam optimizer
    #[must_use]
    pub fn new(params: AdamParams) -> Self {
        Self {
            params,
            m: None,
            v: None,
            t: 0,
        }
    }

    /// Hyper-parameters
    #[must_use]
    pub fn params(&self) -> &AdamParams {
        &self.params
    }

    /// Number of steps taken since creation or the last reset
    #[must_use]
    pub fn timestep(&self) -> usize {
        self.t as usize
    }
}

impl Optimizer for Adam {
    fn step(
        &mut self,
        parameters: &mut DVector<f64>,
        gradient: &DVector<f64>,
    ) -> Result<(), OptimError> {
        let n = parameters.len();
        if gradient.len() != n {
            return Err(OptimError::DimensionMismatch {
                expected: n,
                given: gradient.len(),
            });
        }

        let AdamParams {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.params;

        let m = self.m.get_or_insert_with(|| DVector::zeros(n));
        if m.len() != n {
            return Err(OptimError::DimensionMismatch {
                expected: m.len(),
                given: n,
            });
        }
        m.zip_apply(gradient, |mi, g| {
            *mi = beta1.mul_add(*mi, (1.0 - beta1) * g);
        });

        let v = self.v.get_or_insert_with(|| DVector::zeros(n));
        v.zip_apply(gradient, |vi, g| {
            *vi = beta2.mul_add(*vi, (1.0 - beta2) * g * g);
        });

        self.t = self.t.saturating_add(1);
        let t = i32::try_from(self.t).unwrap_or(i32::MAX);
        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);

        parameters
            .iter_mut()
            .zip(m.iter().zip(v.iter()))
            .for_each(|(p, (mi, vi))| {
                let m_hat = mi / bias1;
                let v_hat = vi / bias2;
                *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            });

        Ok(())
    }

    fn reset(&mut self) {
        self.m = None;
        self.v = None;
        self.t = 0;
    }

    fn learning_rate(&self) -> f64 {
        self.params.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.params.learning_rate = learning_rate;
    }
}
