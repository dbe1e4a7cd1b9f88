#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Gradient of a covariance matrix: one `n × n` slice per hyper-parameter.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct CovGrad {
    slices: Vec<DMatrix<f64>>,
}

impl fmt::Display for CovGrad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.slices.iter().try_for_each(|s| write!(f, "{s}"))
    }
}

impl CovGrad {
    /// Create a new cov-grad with given slices
    pub fn new(slices: &[DMatrix<f64>]) -> Result<Self, CovGradError> {
        if slices.is_empty() {
            return Err(CovGradError::Empty);
        }

        let shapes: Vec<(usize, usize)> =
            slices.iter().map(nalgebra::Matrix::shape).collect();
        if shapes.windows(2).all(|w| w[0] == w[1]) {
            Ok(Self {
                slices: slices.to_vec(),
            })
        } else {
            Err(CovGradError::ShapeMismatch(shapes))
        }
    }

    /// Create a new cov-grad with all zeros: `m` slices of size `n × n`
    #[must_use]
    pub fn zeros(n: usize, m: usize) -> Self {
        Self {
            slices: (0..m).map(|_| DMatrix::zeros(n, n)).collect(),
        }
    }

    /// Create a new `CovGrad` from a sequence of column-major slices
    pub fn from_column_slices(
        n: usize,
        m: usize,
        slice: &[f64],
    ) -> Result<Self, CovGradError> {
        if n * n * m == slice.len() {
            let slices = slice
                .chunks_exact(n * n)
                .map(|chunk| DMatrix::from_column_slice(n, n, chunk))
                .collect();
            Ok(Self { slices })
        } else {
            Err(CovGradError::ImproperSize(n * n * m, slice.len()))
        }
    }

    /// Number of hyper-parameters
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        self.slices.len()
    }

    /// Frobenius inner product of `other` with every slice,
    /// `[Σᵢⱼ otherᵢⱼ ∂Kᵢⱼ/∂θₖ]ₖ`.
    ///
    /// With `other = ααᵀ − K⁻¹` and halved, this is the gradient of the log
    /// marginal likelihood (GPML Equation 5.9).
    pub fn contract(
        &self,
        other: &DMatrix<f64>,
    ) -> Result<DVector<f64>, CovGradError> {
        match self.slices.first() {
            Some(first) if first.shape() != other.shape() => {
                Err(CovGradError::ShapeMismatch(vec![
                    first.shape(),
                    other.shape(),
                ]))
            }
            _ => Ok(DVector::from_iterator(
                self.slices.len(),
                self.slices.iter().map(|s| s.dot(other)),
            )),
        }
    }
}

impl Index<(usize, usize, usize)> for CovGrad {
    type Output = f64;

    fn index(&self, (i, j, k): (usize, usize, usize)) -> &Self::Output {
        &self.slices[k][(i, j)]
    }
}

impl IndexMut<(usize, usize, usize)> for CovGrad {
    fn index_mut(
        &mut self,
        (i, j, k): (usize, usize, usize),
    ) -> &mut Self::Output {
        &mut self.slices[k][(i, j)]
    }
}

/// Error from constructing a `CovGrad`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum CovGradError {
    /// The shapes of the slices do not match
    ShapeMismatch(Vec<(usize, usize)>),
    /// A `CovGrad` cannot be empty
    Empty,
    /// Improper number of points to construct a `CovGrad`
    ImproperSize(usize, usize),
}

impl std::error::Error for CovGradError {}

impl std::fmt::Display for CovGradError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CovGradError::ShapeMismatch(shapes) => write!(f, "Cannot create Covariance Gradient: Shape Mismatch: Shapes {shapes:?}"),
            CovGradError::Empty => write!(f, "Cannot create an empty CovGrad"),
            CovGradError::ImproperSize(expected, given) => write!(f, "Cannot create Covariance Gradient with given shapes. Given: {given}, Expected: {expected}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_slices() {
        let res = CovGrad::new(&[DMatrix::zeros(2, 2), DMatrix::zeros(3, 3)]);
        assert_eq!(
            res.unwrap_err(),
            CovGradError::ShapeMismatch(vec![(2, 2), (3, 3)])
        );
        assert_eq!(CovGrad::new(&[]).unwrap_err(), CovGradError::Empty);
    }

    #[test]
    fn contract_is_frobenius_product() {
        let grad = CovGrad::from_column_slices(
            2,
            2,
            &[1.0, 2.0, 2.0, 1.0, 0.0, 1.0, 1.0, 0.0],
        )
        .unwrap();
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 3.0]);
        let c = grad.contract(&a).unwrap();
        assert::close(c[0], 1.0 + 1.0 + 1.0 + 3.0, 1E-12);
        assert::close(c[1], 1.0, 1E-12);
    }

    #[test]
    fn contract_shape_mismatch() {
        let grad = CovGrad::zeros(2, 1);
        assert!(grad.contract(&DMatrix::zeros(3, 3)).is_err());
    }
}
