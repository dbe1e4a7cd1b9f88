use nalgebra::base::storage::Storage;
use nalgebra::{Dim, Matrix};

/// Squared euclidean distance between row `i` of `x1` and row `j` of `x2`
#[inline]
pub fn sq_row_distance<R1, C1, S1, R2, C2, S2>(
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
    (0..x1.ncols()).fold(0.0, |acc, k| {
        let diff = x1[(i, k)] - x2[(j, k)];
        diff.mul_add(diff, acc)
    })
}
