//! Small seam over the dynamic-size linear algebra and special functions
//! the rest of the crate treats as external primitives: dense linear
//! solve (general and transposed), matrix exponential, and the
//! regularized lower incomplete gamma function.
//!
//! Fixed-size (6x6 / 3x3 / 3x6) work in [`crate::kalman`] goes straight
//! through `nalgebra`'s `SMatrix` operators instead of this module; there
//! is nothing this seam would add for compile-time-sized matrices.

use nalgebra::DMatrix;

use crate::error::TrackerError;

/// Solves `a * x = b` for `x` via LU decomposition.
pub fn solve(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>, TrackerError> {
    a.clone()
        .lu()
        .solve(b)
        .ok_or_else(|| TrackerError::Numeric("singular matrix in linear solve".to_string()))
}

/// Solves `x * a = b` for `x` (the transposed system `a^T x^T = b^T`).
pub fn solve_transpose(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>, TrackerError> {
    let xt = solve(&a.transpose(), &b.transpose())?;
    Ok(xt.transpose())
}

/// Matrix exponential `exp(a)` via scaling-and-squaring with a degree-6
/// Pade approximant, the standard textbook algorithm (Higham's scaling
/// and squaring with rational approximation).
///
/// Fails only if the Pade denominator is singular (spec.md §4.1: "fails
/// only if the underlying linear solve is singular"), propagated from
/// [`pade7`].
pub fn matrix_exp(a: &DMatrix<f64>) -> Result<DMatrix<f64>, TrackerError> {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "matrix_exp requires a square matrix");

    let norm = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())) * n as f64;
    let squarings = if norm <= 0.0 {
        0
    } else {
        (norm.log2().ceil().max(0.0)) as u32
    };
    let scale = 2.0_f64.powi(squarings as i32);
    let scaled = a / scale;

    let mut result = pade7(&scaled)?;
    for _ in 0..squarings {
        result = &result * &result;
    }
    Ok(result)
}

/// Degree-7 diagonal Pade approximant of exp(a) for a matrix already
/// scaled to small norm (Higham's scaling-and-squaring construction:
/// `exp(a) ~= (V - U)^-1 (V + U)` where `U = a * odd(a^2)`, `V = even(a^2)`).
fn pade7(a: &DMatrix<f64>) -> Result<DMatrix<f64>, TrackerError> {
    const B: [f64; 8] = [
        17_297_280.0,
        8_648_640.0,
        1_995_840.0,
        277_200.0,
        25_200.0,
        1_512.0,
        56.0,
        1.0,
    ];

    let n = a.nrows();
    let identity = DMatrix::<f64>::identity(n, n);
    let a2 = a * a;
    let a4 = &a2 * &a2;
    let a6 = &a4 * &a2;

    let v = &identity * B[0] + &a2 * B[2] + &a4 * B[4] + &a6 * B[6];
    let u = a * (&identity * B[1] + &a2 * B[3] + &a4 * B[5] + &a6 * B[7]);

    let numerator = &v + &u;
    let denominator = &v - &u;

    solve(&denominator, &numerator)
}

/// Regularized lower incomplete gamma function `P(a, x)`.
pub fn incomplete_gamma_lower_regularized(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    statrs::function::gamma::gamma_lr(a, x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn solve_recovers_known_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]);
        let b = DMatrix::from_row_slice(2, 1, &[4.0, 6.0]);
        let x = solve(&a, &b).unwrap();
        assert_relative_eq!(x[(0, 0)], 2.0, epsilon = 1e-9);
        assert_relative_eq!(x[(1, 0)], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn solve_transpose_matches_manual_transposition() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(1, 2, &[3.0, 5.0]);
        let x = solve_transpose(&a, &b).unwrap();
        // x * a == b
        let check = &x * &a;
        assert_relative_eq!(check[(0, 0)], b[(0, 0)], epsilon = 1e-9);
        assert_relative_eq!(check[(0, 1)], b[(0, 1)], epsilon = 1e-9);
    }

    #[test]
    fn matrix_exp_of_zero_is_identity() {
        let z = DMatrix::<f64>::zeros(3, 3);
        let e = matrix_exp(&z).unwrap();
        assert_relative_eq!(e, DMatrix::<f64>::identity(3, 3), epsilon = 1e-9);
    }

    #[test]
    fn matrix_exp_of_diagonal_matches_scalar_exp() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -2.0]);
        let e = matrix_exp(&a).unwrap();
        assert_relative_eq!(e[(0, 0)], 1.0_f64.exp(), epsilon = 1e-6);
        assert_relative_eq!(e[(1, 1)], (-2.0_f64).exp(), epsilon = 1e-6);
        assert_relative_eq!(e[(0, 1)], 0.0, epsilon = 1e-9);
        assert_relative_eq!(e[(1, 0)], 0.0, epsilon = 1e-9);
    }
}
