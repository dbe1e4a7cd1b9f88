use nalgebra::DVector;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use super::constraint::{ConstraintError, Interval};

/// Constant prior mean, `m(x) = c`, with `c` held inside an [`Interval`].
///
/// The optimizer sees the raw, unconstrained value; `c` is recovered via
/// [`Interval::transform`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ConstantMean {
    raw: f64,
    bounds: Interval,
}

impl ConstantMean {
    /// Create a new constant mean
    ///
    /// # Errors
    /// `constant` must be strictly inside `bounds`.
    pub fn new(
        constant: f64,
        bounds: Interval,
    ) -> Result<Self, ConstraintError> {
        let raw = bounds.inverse_transform(constant)?;
        Ok(Self { raw, bounds })
    }

    /// The constant `c`
    #[inline]
    #[must_use]
    pub fn constant(&self) -> f64 {
        self.bounds.transform(self.raw)
    }

    /// The bounds on `c`
    #[must_use]
    pub fn bounds(&self) -> Interval {
        self.bounds
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

    /// `dc / d raw`
    #[inline]
    #[must_use]
    pub fn gradient_raw(&self) -> f64 {
        self.bounds.derivative(self.raw)
    }

    /// Evaluate the mean at every input
    #[must_use]
    pub fn mean(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_element(x.len(), self.constant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_is_constant() {
        let m = ConstantMean::new(0.25, Interval::new(-1.0, 1.0).unwrap())
            .unwrap();
        let xs = DVector::from_column_slice(&[-3.0, 0.0, 12.5]);
        let ms = m.mean(&xs);
        assert_eq!(ms.len(), 3);
        ms.iter().for_each(|&c| assert::close(c, 0.25, 1E-12));
    }

    #[test]
    fn constant_outside_bounds_is_rejected() {
        let bounds = Interval::new(-1.0, 1.0).unwrap();
        assert!(matches!(
            ConstantMean::new(2.0, bounds),
            Err(ConstraintError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn raw_updates_stay_in_bounds() {
        let bounds = Interval::new(-1.0, 1.0).unwrap();
        let mut m = ConstantMean::new(0.0, bounds).unwrap();
        for raw in [-100.0, -1.0, 3.0, 100.0] {
            m.set_raw(raw);
            assert!(bounds.contains(m.constant()));
        }
    }
}
