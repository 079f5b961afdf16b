//! 6-D Kalman filter: prediction and measurement update over a
//! 6-dimensional state (3D position, 3D velocity) with 3D position
//! measurements. Spec.md §4.3.
//!
//! Mirrors the teacher's `ExtendedKalmanFilter<T, const S, const Z, const
//! U>` (`extended_kalman_filter.rs`) in using `nalgebra`'s const-generic
//! `SMatrix`/`SVector` directly rather than the fully generic `Dim`-based
//! path — the tracker's state (6) and measurement (3) dimensions are
//! fixed, so there is nothing the generic path would buy here.

use std::f64::consts::PI;

use nalgebra::linalg::SymmetricEigen;
use nalgebra::{Matrix3, Matrix6, SMatrix, Vector3, Vector6};

/// 6x6 state covariance.
pub type Mat6 = Matrix6<f64>;
/// 6-vector state.
pub type Vec6 = Vector6<f64>;
/// 3x6 measurement matrix.
pub type Mat3x6 = SMatrix<f64, 3, 6>;
/// 6x3 transposed measurement matrix / Kalman gain shape.
pub type Mat6x3 = SMatrix<f64, 6, 3>;

/// Result of a measurement update: the posterior mean/covariance and the
/// innovation likelihood (a 3-variate Gaussian PDF value).
#[derive(Debug, Clone, Copy)]
pub struct KalmanUpdate {
    pub mean: Vec6,
    pub cov: Mat6,
    pub likelihood: f64,
}

/// Predicts the next state: `M <- A*M`, `P <- A*P*A^T + Q`.
pub fn predict(mean: &Vec6, cov: &Mat6, a: &Mat6, q: &Mat6) -> (Vec6, Mat6) {
    let mean_pred = a * mean;
    let cov_pred = a * cov * a.transpose() + q;
    (mean_pred, cov_pred)
}

/// Outcome of a measurement update attempt.
#[derive(Debug, Clone, Copy)]
pub enum UpdateOutcome {
    Ok(KalmanUpdate),
    /// The innovation covariance stayed singular even after one
    /// eigenvalue-floor clamp of the prior covariance (spec.md §7's
    /// NumericError recovery path exhausted).
    Singular,
}

impl UpdateOutcome {
    pub fn ok(self) -> Option<KalmanUpdate> {
        match self {
            UpdateOutcome::Ok(result) => Some(result),
            UpdateOutcome::Singular => None,
        }
    }
}

/// Updates a predicted state with a 3-D measurement `y`.
///
/// The Kalman gain is obtained by solving `X * IS = P * H^T` for `X`
/// rather than explicitly inverting `IS`, per spec.md's numerical
/// robustness requirement. `IS` is symmetric by construction, so solving
/// `IS * X^T = (P H^T)^T` and transposing back is equivalent and avoids a
/// second matrix transpose-and-solve helper.
///
/// If the innovation covariance is singular, the prior covariance's
/// eigenvalues are clamped to a small positive floor and the update is
/// retried once; a second singularity is reported as
/// [`UpdateOutcome::Singular`] for the caller to act on (spec.md §7: drop
/// the particle if the condition recurs).
pub fn update(mean: &Vec6, cov: &Mat6, y: &Vector3<f64>, h: &Mat3x6, r: &Matrix3<f64>) -> UpdateOutcome {
    const EIGENVALUE_FLOOR: f64 = 1e-9;

    if let Some(result) = try_update(mean, cov, y, h, r) {
        return UpdateOutcome::Ok(result);
    }
    let clamped = clamp_eigenvalues_floor(cov, EIGENVALUE_FLOOR);
    match try_update(mean, &clamped, y, h, r) {
        Some(result) => UpdateOutcome::Ok(result),
        None => UpdateOutcome::Singular,
    }
}

fn try_update(mean: &Vec6, cov: &Mat6, y: &Vector3<f64>, h: &Mat3x6, r: &Matrix3<f64>) -> Option<KalmanUpdate> {
    const DET_FLOOR: f64 = 1e-15;

    let innovation_mean = h * mean;
    let innovation_cov = h * cov * h.transpose() + r;
    if innovation_cov.determinant().abs() < DET_FLOOR {
        return None;
    }

    let p_ht: Mat6x3 = cov * h.transpose();
    let gain_t = innovation_cov.lu().solve(&p_ht.transpose())?;
    let gain: Mat6x3 = gain_t.transpose();

    let residual = y - innovation_mean;
    let mean_out = mean + gain * residual;
    let cov_out = cov - gain * innovation_cov * gain.transpose();

    let likelihood = gaussian_pdf_3d(&residual, &innovation_cov);

    Some(KalmanUpdate {
        mean: mean_out,
        cov: cov_out,
        likelihood,
    })
}

/// Clamps `cov`'s eigenvalues to at least `floor`, preserving symmetry.
fn clamp_eigenvalues_floor(cov: &Mat6, floor: f64) -> Mat6 {
    let eig = SymmetricEigen::new(*cov);
    let clamped = eig.eigenvalues.map(|v| v.max(floor));
    eig.eigenvectors * Mat6::from_diagonal(&clamped) * eig.eigenvectors.transpose()
}

/// 3-variate Gaussian PDF value `N(residual; 0, cov)`, i.e.
/// `exp(-1/2 residual^T cov^-1 residual) / sqrt((2*pi)^3 * det(cov))`.
///
/// The determinant is clamped to a small positive floor before the square
/// root, guarding against floating-point drift producing a non-positive
/// value when `cov` nearly collapses (spec.md §4.3's edge case).
fn gaussian_pdf_3d(residual: &Vector3<f64>, cov: &Matrix3<f64>) -> f64 {
    const DET_FLOOR: f64 = 1e-300;

    let det = cov.determinant().max(DET_FLOOR);
    let quad = match cov.lu().solve(residual) {
        Some(x) => residual.dot(&x),
        None => return 0.0,
    };

    let normalizer = ((2.0 * PI).powi(3) * det).sqrt();
    (-0.5 * quad).exp() / normalizer
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_velocity_model(dt: f64) -> (Mat6, Mat6, Mat3x6, Matrix3<f64>) {
        let mut a = Mat6::identity();
        for i in 0..3 {
            a[(i, i + 3)] = dt;
        }
        let q = Mat6::identity() * 0.01;
        let mut h = Mat3x6::zeros();
        for i in 0..3 {
            h[(i, i)] = 1.0;
        }
        let r = Matrix3::identity() * 0.05;
        (a, q, h, r)
    }

    #[test]
    fn prediction_covariance_matches_linear_propagation_law() {
        let (a, q, _h, _r) = constant_velocity_model(0.1);
        let mean = Vec6::new(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        let cov = Mat6::identity() * 2.0;

        let (_mean_pred, cov_pred) = predict(&mean, &cov, &a, &q);
        let expected = a * cov * a.transpose() + q;
        assert_relative_eq!(cov_pred, expected, epsilon = 1e-9);
    }

    #[test]
    fn update_pulls_mean_toward_measurement() {
        let (a, q, h, r) = constant_velocity_model(0.1);
        let mean = Vec6::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let cov = Mat6::identity();

        let (mean_pred, cov_pred) = predict(&mean, &cov, &a, &q);
        let y = Vector3::new(1.0, 0.0, 0.0);
        let result = update(&mean_pred, &cov_pred, &y, &h, &r).ok().unwrap();

        assert!(result.mean[0] > 0.0 && result.mean[0] < 1.0);
        assert!(result.likelihood > 0.0);
    }

    #[test]
    fn update_reduces_position_variance() {
        let (a, q, h, r) = constant_velocity_model(0.1);
        let mean = Vec6::zeros();
        let cov = Mat6::identity();

        let (mean_pred, cov_pred) = predict(&mean, &cov, &a, &q);
        let y = Vector3::new(1.0, 0.0, 0.0);
        let result = update(&mean_pred, &cov_pred, &y, &h, &r).ok().unwrap();

        assert!(result.cov[(0, 0)] < cov_pred[(0, 0)]);
    }

    #[test]
    fn repeated_update_does_not_increase_covariance_trace() {
        let (a, q, h, r) = constant_velocity_model(0.1);
        let mean = Vec6::zeros();
        let cov = Mat6::identity();

        let (mean_pred, cov_pred) = predict(&mean, &cov, &a, &q);
        let y = Vector3::new(0.5, -0.2, 0.1);
        let first = update(&mean_pred, &cov_pred, &y, &h, &r).ok().unwrap();
        let second = update(&first.mean, &first.cov, &y, &h, &r).ok().unwrap();

        assert!(second.cov.trace() <= first.cov.trace() + 1e-9);
    }

    #[test]
    fn likelihood_peaks_at_zero_residual() {
        let cov = Matrix3::identity() * 0.1;
        let zero = gaussian_pdf_3d(&Vector3::zeros(), &cov);
        let nonzero = gaussian_pdf_3d(&Vector3::new(1.0, 0.0, 0.0), &cov);
        assert!(zero > nonzero);
    }
}
