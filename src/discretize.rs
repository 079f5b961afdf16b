//! Converts a continuous-time linear stochastic ODE (drift `F`, diffusion
//! `L`, spectral density `Qc`) into its exact discrete-time equivalent
//! (`A`, `Q`) over a step `dt`, via the matrix-fraction decomposition of a
//! 2N x 2N block matrix exponential. Spec.md §4.1.

use nalgebra::DMatrix;

use crate::error::TrackerError;
use crate::numeric;

/// Builds the discrete-time state transition `A` and process-noise
/// covariance `Q` for `dx/dt = F x + L w`, `w ~ N(0, Qc)`, evaluated at
/// integer multiples of `dt`.
///
/// `l` defaults to the identity (`Qc` then has the same dimension as `F`);
/// `qc` defaults to the zero matrix.
pub fn discretize(
    f: &DMatrix<f64>,
    l: Option<&DMatrix<f64>>,
    qc: Option<&DMatrix<f64>>,
    dt: f64,
) -> Result<(DMatrix<f64>, DMatrix<f64>), TrackerError> {
    let n = f.nrows();
    assert_eq!(n, f.ncols(), "F must be square");

    let l_owned;
    let l = match l {
        Some(l) => l,
        None => {
            l_owned = DMatrix::<f64>::identity(n, n);
            &l_owned
        }
    };

    let q_dim = l.ncols();
    let qc_owned;
    let qc = match qc {
        Some(qc) => qc,
        None => {
            qc_owned = DMatrix::<f64>::zeros(q_dim, q_dim);
            &qc_owned
        }
    };

    let a = numeric::matrix_exp(&(f * dt))?;

    let l_qc_lt = l * qc * l.transpose();

    let mut phi = DMatrix::<f64>::zeros(2 * n, 2 * n);
    phi.view_mut((0, 0), (n, n)).copy_from(f);
    phi.view_mut((0, n), (n, n)).copy_from(&l_qc_lt);
    phi.view_mut((n, n), (n, n)).copy_from(&(-f.transpose()));

    let b = numeric::matrix_exp(&(phi * dt))?;

    let c = b.view((0, n), (n, n)).clone_owned();
    let d = b.view((n, n), (n, n)).clone_owned();

    let q = numeric::solve_transpose(&d, &c)?;
    // Symmetrize away floating-point drift accumulated through the
    // exponential/solve chain; Q is exactly symmetric by construction.
    let q = (&q + q.transpose()) * 0.5;

    Ok((a, q))
}
