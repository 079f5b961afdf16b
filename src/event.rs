//! Enumerates the data-association hypotheses available to one particle
//! at one update step: clutter, associate-to-existing-target-k, or birth
//! of a new target. Spec.md §4.6, steps 1-3 (slot construction and prior
//! normalisation; the categorical draw itself lives in
//! [`crate::engine`], since it owns the RNG).

use nalgebra::Vector3;

use crate::config::ValidatedConfig;
use crate::kalman;
use crate::particle::{EventKind, Particle, TargetRecord};

/// One data-association hypothesis: its prior probability, its
/// measurement likelihood under that hypothesis, and the particle state
/// that results if it is chosen.
pub struct EventSlot {
    pub kind: EventKind,
    pub prior: f64,
    pub likelihood: f64,
    pub post_state: Particle,
}

/// Result of building a particle's event table.
pub enum EventOutcome {
    Slots(Vec<EventSlot>),
    /// A target's innovation covariance stayed singular even after
    /// [`kalman::update`]'s own eigenvalue-clamp retry; spec.md §7 treats
    /// this as a recurrence and has the caller drop the whole particle.
    Drop,
}

/// Builds the (at most `max_active_targets + 2`)-slot event table for one
/// particle and one incoming measurement `y`.
///
/// `tinc` is the number of `dt` units elapsed since the particle was last
/// updated; every slot's post-state advances existing targets' ages by
/// `tinc` (spec.md §4.5 step 4 notes this increment is actually applied
/// here, once the chosen branch is known, rather than during predict).
pub fn enumerate_events(
    particle: &Particle,
    y: &Vector3<f64>,
    cfg: &ValidatedConfig,
    tinc: u32,
) -> EventOutcome {
    let n_targets = particle.targets.len();
    let tp0 = (1.0 - cfg.noise_likelihood) / (n_targets.max(1) as f64);

    let mut slots = Vec::with_capacity(n_targets + 2);

    // Clutter.
    {
        let mut post_state = Particle::new(particle.prior_weight, particle.dt);
        post_state.copy_from(particle);
        age_targets(&mut post_state, tinc);
        slots.push(EventSlot {
            kind: EventKind::Clutter,
            prior: (1.0 - cfg.init_birth) * cfg.noise_likelihood,
            likelihood: cfg.cd,
            post_state,
        });
    }

    // Associate to each existing target.
    for (j, target) in particle.targets.iter().enumerate() {
        let result = match kalman::update(&target.mean, &target.cov, y, &cfg.h, &cfg.r) {
            kalman::UpdateOutcome::Ok(result) => result,
            kalman::UpdateOutcome::Singular => return EventOutcome::Drop,
        };

        let mut post_state = Particle::new(particle.prior_weight, particle.dt);
        post_state.copy_from(particle);
        age_targets(&mut post_state, tinc);
        post_state.targets[j].mean = result.mean;
        post_state.targets[j].cov = result.cov;

        slots.push(EventSlot {
            kind: EventKind::Target(target.id),
            prior: (1.0 - cfg.init_birth) * tp0,
            likelihood: result.likelihood,
            post_state,
        });
    }

    // Birth of a new target, only offered below the cap (spec.md §7's
    // Saturation policy: simply don't offer the event).
    if n_targets < cfg.max_active_targets {
        let result = match kalman::update(&cfg.m0, &cfg.p0, y, &cfg.h, &cfg.r) {
            kalman::UpdateOutcome::Ok(result) => result,
            kalman::UpdateOutcome::Singular => return EventOutcome::Drop,
        };
        let new_id = particle.next_free_id();

        let mut post_state = Particle::new(particle.prior_weight, particle.dt);
        post_state.copy_from(particle);
        age_targets(&mut post_state, tinc);
        post_state.targets.push(TargetRecord {
            mean: result.mean,
            cov: result.cov,
            age: 0,
            id: new_id,
        });

        slots.push(EventSlot {
            kind: EventKind::Birth(new_id),
            prior: cfg.init_birth,
            likelihood: result.likelihood,
            post_state,
        });
    }

    normalize_priors(&mut slots);
    EventOutcome::Slots(slots)
}

fn age_targets(particle: &mut Particle, tinc: u32) {
    for target in &mut particle.targets {
        target.age += tinc;
    }
}

fn normalize_priors(slots: &mut [EventSlot]) {
    let total: f64 = slots.iter().map(|s| s.prior).sum();
    if total > 0.0 {
        for slot in slots {
            slot.prior /= total;
        }
    } else {
        let n = slots.len().max(1) as f64;
        for slot in slots {
            slot.prior = 1.0 / n;
        }
    }
}
