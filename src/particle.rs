//! One hypothesis over the joint target state: a weight, a variable
//! -length list of live targets, and bookkeeping for the last event
//! applied. Spec.md §4.4.
//!
//! Mirrors the teacher's particle-ownership model (`GeneralParticleFilter
//! ::particules: Vec<_>`, `FastSlam1::particules: Vec<FastParticle<_>>`):
//! each particle exclusively owns its target list; resampling
//! deep-copies rather than sharing.

use crate::kalman::{Mat6, Vec6};

/// A live target's state within one particle: mean, covariance, age in
/// `dt` steps since birth, and a stable integer ID.
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub mean: Vec6,
    pub cov: Mat6,
    pub age: u32,
    pub id: u32,
}

/// Which data-association event a particle last evolved through,
/// retained for diagnostics/output bookkeeping (spec.md's "event slot"
/// tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Clutter,
    Target(u32),
    Birth(u32),
}

/// One weighted hypothesis over the joint target state.
#[derive(Debug, Clone)]
pub struct Particle {
    pub weight: f64,
    pub prev_weight: f64,
    pub prior_weight: f64,
    pub dt: f64,
    pub targets: Vec<TargetRecord>,
    pub last_event: Option<EventKind>,
}

impl Particle {
    /// Creates an empty particle at the prior weight `w0`.
    pub fn new(w0: f64, dt: f64) -> Particle {
        Particle {
            weight: w0,
            prev_weight: w0,
            prior_weight: w0,
            dt,
            targets: Vec::new(),
            last_event: None,
        }
    }

    /// Empties the target list and restores the particle's prior weight.
    pub fn reset(&mut self) {
        self.targets.clear();
        self.weight = self.prior_weight;
        self.prev_weight = self.prior_weight;
        self.last_event = None;
    }

    /// Deep-copies `src`'s target list and metadata into `self`, used by
    /// resampling and event-branch bookkeeping. Does not copy `src`'s
    /// weight — resampling always resets the destination's weight to the
    /// prior separately.
    pub fn copy_from(&mut self, src: &Particle) {
        self.targets.clear();
        self.targets.extend(src.targets.iter().cloned());
        self.dt = src.dt;
        self.last_event = src.last_event;
    }

    /// The smallest non-negative integer ID not currently in use among
    /// this particle's live targets, scoped entirely to this particle
    /// (spec.md Design Notes: IDs are integers, not pointers, and are
    /// scoped to the particle).
    pub fn next_free_id(&self) -> u32 {
        let mut used: Vec<u32> = self.targets.iter().map(|t| t.id).collect();
        used.sort_unstable();
        let mut candidate = 0u32;
        for id in used {
            if id == candidate {
                candidate += 1;
            } else if id > candidate {
                break;
            }
        }
        candidate
    }
}
