//! One `step`'s emitted result: the dominant particle's live targets,
//! each as a stable ID, position mean, and per-axis variance. Spec.md
//! §4.9.

use nalgebra::Vector3;

use crate::particle::Particle;

/// One tracked target as emitted to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedTarget {
    pub id: u32,
    pub position: Vector3<f64>,
    pub variance: Vector3<f64>,
}

/// The full result of one `step` call.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub targets: Vec<TrackedTarget>,
}

/// Extracts the output from the dominant particle: verbatim if it has
/// live targets, empty otherwise.
pub fn extract(dominant: &Particle) -> StepOutput {
    let targets = dominant
        .targets
        .iter()
        .map(|t| TrackedTarget {
            id: t.id,
            position: Vector3::new(t.mean[0], t.mean[1], t.mean[2]),
            variance: Vector3::new(t.cov[(0, 0)], t.cov[(1, 1)], t.cov[(2, 2)]),
        })
        .collect();
    StepOutput { targets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kalman::{Mat6, Vec6};
    use crate::particle::TargetRecord;

    #[test]
    fn empty_particle_emits_empty_output() {
        let particle = Particle::new(1.0, 0.1);
        let output = extract(&particle);
        assert!(output.targets.is_empty());
    }

    #[test]
    fn live_targets_emit_id_position_and_diagonal_variance() {
        let mut particle = Particle::new(1.0, 0.1);
        particle.targets.push(TargetRecord {
            mean: Vec6::new(1.0, 2.0, 3.0, 0.0, 0.0, 0.0),
            cov: Mat6::identity() * 0.5,
            age: 4,
            id: 7,
        });
        let output = extract(&particle);
        assert_eq!(output.targets.len(), 1);
        assert_eq!(output.targets[0].id, 7);
        assert_eq!(output.targets[0].position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(output.targets[0].variance, Vector3::new(0.5, 0.5, 0.5));
    }
}
