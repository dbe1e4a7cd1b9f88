use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Open interval `(lower, upper)` reached through a sigmoid
/// reparameterization.
///
/// A raw, unconstrained value `r` maps to
///
/// ```math
///     lower + (upper - lower) / (1 + exp(-r))
/// ```
///
/// so any step an optimizer takes in raw space lands inside the bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    /// Create a new interval
    ///
    /// # Errors
    /// Both bounds must be finite and `lower < upper`.
    pub fn new(lower: f64, upper: f64) -> Result<Self, ConstraintError> {
        if lower.is_finite() && upper.is_finite() && lower < upper {
            Ok(Self { lower, upper })
        } else {
            Err(ConstraintError::ImproperBounds(lower, upper))
        }
    }

    /// Lower bound
    #[inline]
    #[must_use]
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper bound
    #[inline]
    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Whether `value` lies within the bounds (inclusive)
    #[inline]
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Map a raw value into the interval
    #[inline]
    #[must_use]
    pub fn transform(&self, raw: f64) -> f64 {
        let value = (self.upper - self.lower).mul_add(sigmoid(raw), self.lower);
        value.clamp(self.lower, self.upper)
    }

    /// Map a value strictly inside the interval back to raw space
    ///
    /// # Errors
    /// The value must be strictly inside the bounds.
    pub fn inverse_transform(
        &self,
        value: f64,
    ) -> Result<f64, ConstraintError> {
        if self.lower < value && value < self.upper {
            let p = (value - self.lower) / (self.upper - self.lower);
            Ok((p / (1.0 - p)).ln())
        } else {
            Err(ConstraintError::OutOfBounds {
                given: value,
                bounds: (self.lower, self.upper),
            })
        }
    }

    /// Derivative of [`Interval::transform`] with respect to the raw value
    #[inline]
    #[must_use]
    pub fn derivative(&self, raw: f64) -> f64 {
        let s = sigmoid(raw);
        (self.upper - self.lower) * s * (1.0 - s)
    }
}

/// Errors from constrained parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ConstraintError {
    /// Lower bounds must be lower than upper bounds, and both finite
    ImproperBounds(f64, f64),
    /// Value is not inside the bounds
    OutOfBounds {
        /// Value given
        given: f64,
        /// Lower and upper bounds on value
        bounds: (f64, f64),
    },
}

impl std::error::Error for ConstraintError {}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImproperBounds(lower, upper) => {
                write!(f, "Bounds are not in order: ({lower}, {upper})")
            }
            Self::OutOfBounds { given, bounds } => write!(
                f,
                "Value {given} is out of bounds ({}, {})",
                bounds.0, bounds.1
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOL: f64 = 1E-10;

    #[test]
    fn improper_bounds() {
        assert_eq!(
            Interval::new(1.0, -1.0),
            Err(ConstraintError::ImproperBounds(1.0, -1.0))
        );
        assert_eq!(
            Interval::new(1.0, 1.0),
            Err(ConstraintError::ImproperBounds(1.0, 1.0))
        );
        assert!(Interval::new(f64::NEG_INFINITY, 0.0).is_err());
        assert!(Interval::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn zero_raw_is_midpoint() {
        let iv = Interval::new(-5.0, 5.0).unwrap();
        assert::close(iv.transform(0.0), 0.0, TOL);
        assert::close(iv.derivative(0.0), 2.5, TOL);
    }

    #[test]
    fn extreme_raw_values_stay_inside() {
        let iv = Interval::new(-1.0, 1.0).unwrap();
        assert!(iv.contains(iv.transform(1E6)));
        assert!(iv.contains(iv.transform(-1E6)));
        assert!(iv.derivative(1E6) >= 0.0);
    }

    #[test]
    fn inverse_rejects_boundary() {
        let iv = Interval::new(-1.0, 1.0).unwrap();
        assert!(iv.inverse_transform(1.0).is_err());
        assert!(iv.inverse_transform(-1.5).is_err());
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let iv = Interval::new(-5.0, 5.0).unwrap();
        let h = 1E-6;
        for raw in [-3.0, -0.5, 0.0, 0.7, 2.0] {
            let fd = (iv.transform(raw + h) - iv.transform(raw - h)) / (2.0 * h);
            assert::close(iv.derivative(raw), fd, 1E-6);
        }
    }

    proptest! {
        #[test]
        fn transform_inverse_roundtrip(p in 0.01_f64..0.99) {
            let iv = Interval::new(-5.0, 5.0).unwrap();
            let value = -5.0 + 10.0 * p;
            let raw = iv.inverse_transform(value).unwrap();
            prop_assert!((iv.transform(raw) - value).abs() < 1E-9);
        }

        #[test]
        fn transform_always_in_bounds(raw in -50.0_f64..50.0) {
            let iv = Interval::new(-1.0, 1.0).unwrap();
            prop_assert!(iv.contains(iv.transform(raw)));
        }
    }
}
