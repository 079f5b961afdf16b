//! User-facing tracker configuration and its validated, engine-internal
//! counterpart. The split mirrors the teacher's `GaussianState` (plain,
//! user-facing) vs. `GaussianStateStatic` (const-generic, engine-internal)
//! separation: `TrackerConfig` is what a host serializes/deserializes,
//! `ValidatedConfig` is what [`crate::engine`] actually consumes.

use nalgebra::{Matrix6, Vector6};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Hard cap on particle count, mirroring spec.md's `Np_max` bound.
pub const NP_MAX: usize = 100_000;

/// Raw, host-facing tracker configuration. Every field maps directly onto
/// a row of spec.md's §6 configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Particle count, valid range `[1, NP_MAX]`.
    pub np: usize,
    /// Whether observations are unit 3-vectors (direction-of-arrival
    /// style input) rather than linear position measurements. Switches
    /// the interpretation of `meas_noise_sd` (spec.md §9).
    pub are_unit_vectors: bool,
    /// Cap on simultaneous live targets per particle.
    pub max_active_targets: usize,
    /// Clutter prior, `[0, 0.99]`.
    pub noise_likelihood: f64,
    /// Measurement standard deviation (linear units unless
    /// `are_unit_vectors` is set, in which case it is in degrees).
    pub meas_noise_sd: f64,
    /// Process noise spectral density, `> 0`.
    pub noise_spec_den: f64,
    /// Whether more than one target may die in a single predict step.
    pub allow_multi_death: bool,
    /// Per-step birth prior, `[0, 0.99]`.
    pub init_birth: f64,
    /// Gamma-lifetime shape, `>= 1`.
    pub alpha_death: f64,
    /// Gamma-lifetime scale, `>= 1`.
    pub beta_death: f64,
    /// Step size in seconds, `> 0`.
    pub dt: f64,
    /// One-pole weight-smoothing coefficient, `[0, 0.999]`.
    pub w_avg_coeff: f64,
    /// Whether nearby targets force each other's death.
    pub force_kill_targets: bool,
    /// Angular (or Euclidean, depending on front end) proximity
    /// threshold for `force_kill_targets`, `> 0`.
    pub force_kill_distance: f64,
    /// Birth-prior mean, `(x, y, z, vx, vy, vz)`.
    pub m0: [f64; 6],
    /// Birth-prior covariance, row-major, must be symmetric positive
    /// definite.
    pub p0: [[f64; 6]; 6],
    /// Clutter density, `> 0`.
    pub cd: f64,
    /// RNG seed, for reproducible runs.
    pub seed: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let mut p0 = [[0.0; 6]; 6];
        for (i, row) in p0.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        TrackerConfig {
            np: 200,
            are_unit_vectors: false,
            max_active_targets: 10,
            noise_likelihood: 0.1,
            meas_noise_sd: 0.1,
            noise_spec_den: 0.1,
            allow_multi_death: false,
            init_birth: 0.1,
            alpha_death: 2.0,
            beta_death: 2.0,
            dt: 0.1,
            w_avg_coeff: 0.0,
            force_kill_targets: false,
            force_kill_distance: 0.05,
            m0: [0.0; 6],
            p0,
            cd: 1.0,
            seed: 0,
        }
    }
}

/// Engine-internal, already-clamped configuration plus the global model
/// matrices (`A`, `Q`, `H`, `R`) built from it at `create` time.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub np: usize,
    pub max_active_targets: usize,
    pub noise_likelihood: f64,
    pub allow_multi_death: bool,
    pub init_birth: f64,
    pub alpha_death: f64,
    pub beta_death: f64,
    pub dt: f64,
    pub w_avg_coeff: f64,
    pub force_kill_targets: bool,
    pub force_kill_distance: f64,
    pub m0: Vector6<f64>,
    pub p0: Matrix6<f64>,
    pub cd: f64,
    pub seed: u64,
    /// State-transition matrix, built by the discretiser.
    pub a: Matrix6<f64>,
    /// Process-noise covariance, built by the discretiser.
    pub q: Matrix6<f64>,
    /// Measurement matrix (position-observes-state).
    pub h: nalgebra::SMatrix<f64, 3, 6>,
    /// Measurement-noise covariance.
    pub r: nalgebra::Matrix3<f64>,
}

impl TrackerConfig {
    /// Validates and clamps every field per spec.md §6/§4.10, returning
    /// `Err` only for conditions that cannot be clamped away (non-finite
    /// values, a non-positive `dt`, etc).
    pub fn validate_and_clamp(&self) -> Result<TrackerConfig, TrackerError> {
        let mut cfg = self.clone();

        if cfg.np == 0 {
            return Err(TrackerError::Configuration(
                "np must be at least 1".to_string(),
            ));
        }
        cfg.np = cfg.np.min(NP_MAX);

        if cfg.max_active_targets == 0 {
            return Err(TrackerError::Configuration(
                "max_active_targets must be at least 1".to_string(),
            ));
        }

        if !(cfg.dt > 0.0) {
            return Err(TrackerError::Configuration(
                "dt must be strictly positive".to_string(),
            ));
        }

        if !(cfg.meas_noise_sd > 0.0) {
            return Err(TrackerError::Configuration(
                "meas_noise_sd must be strictly positive".to_string(),
            ));
        }

        if !(cfg.noise_spec_den > 0.0) {
            return Err(TrackerError::Configuration(
                "noise_spec_den must be strictly positive".to_string(),
            ));
        }

        if !(cfg.cd > 0.0) {
            return Err(TrackerError::Configuration(
                "cd must be strictly positive".to_string(),
            ));
        }

        if !(cfg.force_kill_distance > 0.0) {
            return Err(TrackerError::Configuration(
                "force_kill_distance must be strictly positive".to_string(),
            ));
        }

        cfg.alpha_death = cfg.alpha_death.max(1.0);
        cfg.beta_death = cfg.beta_death.max(1.0);
        cfg.noise_likelihood = cfg.noise_likelihood.clamp(0.0, 0.99);
        cfg.init_birth = cfg.init_birth.clamp(0.0, 0.99);
        cfg.w_avg_coeff = cfg.w_avg_coeff.clamp(0.0, 0.999);

        let p0 = Matrix6::from_row_slice(&cfg.p0.concat());
        if !p0.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::Configuration(
                "p0 contains non-finite entries".to_string(),
            ));
        }
        if (p0 - p0.transpose()).abs().max() > 1e-9 {
            return Err(TrackerError::Configuration(
                "p0 must be symmetric".to_string(),
            ));
        }
        if p0.cholesky().is_none() {
            return Err(TrackerError::Configuration(
                "p0 must be symmetric positive-definite".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Effective position-measurement noise variance (diagonal, isotropic)
    /// after applying the `are_unit_vectors` interpretation switch (spec.md
    /// §9's Open Question on `meas_noise_sd`).
    pub fn meas_noise_variance(&self) -> f64 {
        if self.are_unit_vectors {
            let sd_rad = self.meas_noise_sd.to_radians();
            1.0 - sd_rad.cos()
        } else {
            self.meas_noise_sd * self.meas_noise_sd
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = TrackerConfig::default();
        assert!(cfg.validate_and_clamp().is_ok());
    }

    #[test]
    fn zero_particles_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.np = 0;
        assert!(cfg.validate_and_clamp().is_err());
    }

    #[test]
    fn non_positive_dt_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.dt = 0.0;
        assert!(cfg.validate_and_clamp().is_err());
    }

    #[test]
    fn out_of_range_probabilities_are_clamped_not_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.noise_likelihood = 5.0;
        cfg.init_birth = -1.0;
        let validated = cfg.validate_and_clamp().unwrap();
        assert!(validated.noise_likelihood <= 0.99);
        assert!(validated.init_birth >= 0.0);
    }

    #[test]
    fn indefinite_p0_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.p0[0][0] = -1.0;
        assert!(cfg.validate_and_clamp().is_err());
    }

    #[test]
    fn angular_interpretation_differs_from_linear() {
        let mut linear = TrackerConfig::default();
        linear.meas_noise_sd = 1.0;
        let mut angular = linear.clone();
        angular.are_unit_vectors = true;
        assert_ne!(linear.meas_noise_variance(), angular.meas_noise_variance());
    }
}
