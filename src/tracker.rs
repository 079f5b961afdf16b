//! Public handle-oriented API: `create`/`reset`/`step`/`destroy`.
//! Spec.md §4.10 and §6.

use nalgebra::Vector3;

use crate::config::TrackerConfig;
use crate::engine::{self, Engine};
use crate::error::TrackerError;
use crate::output::{self, StepOutput};

/// A single multi-target tracker instance. Not `Sync`: spec.md §5
/// restricts a handle to use from one thread at a time, mirroring the
/// owned-arena, single-thread-per-instance model.
pub struct Tracker {
    engine: Engine,
}

impl Tracker {
    /// Spec.md §4.10 `create`: validate and clamp `config`, build the
    /// discrete model matrices, and allocate the particle set.
    pub fn create(config: TrackerConfig) -> Result<Tracker, TrackerError> {
        let clamped = config.validate_and_clamp()?;
        let validated = engine::build_validated_config(&clamped)?;
        Ok(Tracker {
            engine: Engine::new(validated),
        })
    }

    /// Spec.md §4.10 `reset`: zero `incrementTime`, empty every
    /// particle's target list.
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Spec.md §4.10 `step`: process a batch of observations in array
    /// order, advancing `incrementTime` bookkeeping across silent steps,
    /// and emit the dominant particle's target list.
    pub fn step(&mut self, observations: &[Vector3<f64>]) -> StepOutput {
        self.engine.begin_step();
        for y in observations {
            self.engine.process_observation(y);
        }
        output::extract(self.engine.dominant_particle())
    }
}

// Spec.md §4.10 `destroy`: dropping the handle releases the particle
// arena; nothing beyond ordinary `Vec` deallocation is required.
impl Drop for Tracker {
    fn drop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_invalid_configuration() {
        let mut cfg = TrackerConfig::default();
        cfg.dt = 0.0;
        assert!(Tracker::create(cfg).is_err());
    }

    #[test]
    fn step_with_no_observations_emits_empty_output() {
        let mut tracker = Tracker::create(TrackerConfig::default()).unwrap();
        let output = tracker.step(&[]);
        assert!(output.targets.is_empty());
    }

    #[test]
    fn reset_clears_previously_tracked_targets() {
        let mut cfg = TrackerConfig::default();
        cfg.np = 30;
        cfg.meas_noise_sd = 0.05;
        let mut tracker = Tracker::create(cfg).unwrap();

        for _ in 0..60 {
            tracker.step(&[Vector3::new(1.0, 0.0, 0.0)]);
        }
        tracker.reset();

        let output = tracker.step(&[]);
        assert!(output.targets.is_empty());
    }

    #[test]
    fn single_stationary_target_is_tracked_near_truth() {
        let mut cfg = TrackerConfig::default();
        cfg.np = 50;
        cfg.dt = 0.1;
        cfg.meas_noise_sd = 0.05;
        cfg.noise_likelihood = 0.1;
        cfg.init_birth = 0.1;
        cfg.alpha_death = 2.0;
        cfg.beta_death = 2.0;
        cfg.force_kill_distance = 1_000.0;
        let mut tracker = Tracker::create(cfg).unwrap();

        let mut output = StepOutput::default();
        for _ in 0..120 {
            output = tracker.step(&[Vector3::new(1.0, 0.0, 0.0)]);
        }

        assert_eq!(output.targets.len(), 1);
        assert!((output.targets[0].position.x - 1.0).abs() < 0.3);
        assert!(output.targets[0].position.y.abs() < 0.3);
        assert!(output.targets[0].position.z.abs() < 0.3);
    }
}
