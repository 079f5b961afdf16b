//! Runs prediction and update across the whole particle set, owns
//! resampling and weight smoothing, and exposes the dominant hypothesis.
//! Spec.md §4.5-§4.9; component 7 of §2.
//!
//! The predict/update inner loops are independent per particle, so under
//! the `parallel` feature they run via `rayon`'s `par_iter_mut` instead of
//! a sequential loop. Reproducibility (spec.md §9's "single seeded RNG
//! instance") is kept either way: sequentially there is exactly one RNG
//! stream; under `parallel` each particle gets its own stream derived
//! deterministically from the tracker's seed, the step counter, and the
//! particle's index, so a run is reproducible independent of whatever
//! order rayon's work-stealing happens to visit particles in.

use nalgebra::{Matrix3, Matrix6, SMatrix, Vector3, Vector6};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{TrackerConfig, ValidatedConfig};
use crate::discretize;
use crate::error::TrackerError;
use crate::event::{self, EventSlot};
use crate::gamma;
use crate::kalman;
use crate::particle::Particle;

/// Weight floor substituted for a degenerate (all-zero) importance total,
/// so a particle's weight never collapses to exactly zero (spec.md §7's
/// DegenerateImportanceDistribution policy still needs *some* weight to
/// renormalise against).
const WEIGHT_FLOOR: f64 = 1e-300;

/// Builds the engine-internal [`ValidatedConfig`] from an already
/// `validate_and_clamp`-ed [`TrackerConfig`]: the measurement-noise
/// covariance `R`, the constant-velocity drift/diffusion pair, and their
/// discretisation into `A`/`Q` (spec.md §4.10's `create`).
pub fn build_validated_config(cfg: &TrackerConfig) -> Result<ValidatedConfig, TrackerError> {
    let r = Matrix3::identity() * cfg.meas_noise_variance();

    let mut f = DMatrix::<f64>::zeros(6, 6);
    for i in 0..3 {
        f[(i, i + 3)] = 1.0;
    }
    let mut qc = DMatrix::<f64>::zeros(6, 6);
    for i in 3..6 {
        qc[(i, i)] = cfg.noise_spec_den;
    }

    let (a_dyn, q_dyn) = discretize::discretize(&f, None, Some(&qc), cfg.dt)?;

    let mut a = Matrix6::zeros();
    let mut q = Matrix6::zeros();
    for i in 0..6 {
        for j in 0..6 {
            a[(i, j)] = a_dyn[(i, j)];
            q[(i, j)] = q_dyn[(i, j)];
        }
    }

    let mut h = SMatrix::<f64, 3, 6>::zeros();
    for i in 0..3 {
        h[(i, i)] = 1.0;
    }

    let m0 = Vector6::from_row_slice(&cfg.m0);
    let p0 = Matrix6::from_row_slice(&cfg.p0.concat());

    Ok(ValidatedConfig {
        np: cfg.np,
        max_active_targets: cfg.max_active_targets,
        noise_likelihood: cfg.noise_likelihood,
        allow_multi_death: cfg.allow_multi_death,
        init_birth: cfg.init_birth,
        alpha_death: cfg.alpha_death,
        beta_death: cfg.beta_death,
        dt: cfg.dt,
        w_avg_coeff: cfg.w_avg_coeff,
        force_kill_targets: cfg.force_kill_targets,
        force_kill_distance: cfg.force_kill_distance,
        m0,
        p0,
        cd: cfg.cd,
        seed: cfg.seed,
        a,
        q,
        h,
        r,
    })
}

/// Owns the live particle set, the resampling scratch set, and the
/// tracker's single seeded RNG.
pub struct Engine {
    pub cfg: ValidatedConfig,
    particles: Vec<Particle>,
    scratch: Vec<Particle>,
    rng: StdRng,
    increment_time: u32,
    step_counter: u64,
}

impl Engine {
    pub fn new(cfg: ValidatedConfig) -> Engine {
        let w0 = 1.0 / cfg.np as f64;
        let particles = (0..cfg.np).map(|_| Particle::new(w0, cfg.dt)).collect();
        let scratch = (0..cfg.np).map(|_| Particle::new(w0, cfg.dt)).collect();
        let rng = StdRng::seed_from_u64(cfg.seed);
        Engine {
            cfg,
            particles,
            scratch,
            rng,
            increment_time: 0,
            step_counter: 0,
        }
    }

    /// Spec.md §4.10's `reset`: zero `incrementTime`, empty every
    /// particle's target list.
    pub fn reset(&mut self) {
        self.increment_time = 0;
        for particle in &mut self.particles {
            particle.reset();
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Marks the start of a new `step` call: `incrementTime += 1`.
    pub fn begin_step(&mut self) {
        self.increment_time += 1;
        self.step_counter = self.step_counter.wrapping_add(1);
    }

    pub fn increment_time(&self) -> u32 {
        self.increment_time
    }

    /// Runs predict + update for one observation, then renormalises,
    /// resamples if N_eff has fallen, and smooths weights if configured
    /// (spec.md §4.10's per-observation body).
    pub fn process_observation(&mut self, y: &Vector3<f64>) {
        let tinc = self.increment_time;
        self.predict_all(tinc);
        self.update_all(y, tinc);
        renormalize(&mut self.particles);
        self.increment_time = 0;

        let neff = effective_sample_size(&self.particles);
        if neff < self.cfg.np as f64 / 4.0 {
            log::debug!("resampling: N_eff={neff:.1} below Np/4={:.1}", self.cfg.np as f64 / 4.0);
            self.resample();
        }
        if self.cfg.w_avg_coeff > 0.0 {
            smooth_weights(&mut self.particles, self.cfg.w_avg_coeff);
        }
    }

    /// Spec.md §4.9: the particle with the largest current weight.
    pub fn dominant_particle(&self) -> &Particle {
        let mut best = &self.particles[0];
        for particle in &self.particles[1..] {
            if particle.weight > best.weight {
                best = particle;
            }
        }
        best
    }

    #[cfg(not(feature = "parallel"))]
    fn predict_all(&mut self, tinc: u32) {
        for particle in &mut self.particles {
            predict_particle(particle, tinc, &self.cfg, &mut self.rng);
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn update_all(&mut self, y: &Vector3<f64>, tinc: u32) {
        for particle in &mut self.particles {
            update_particle(particle, y, &self.cfg, tinc, &mut self.rng);
        }
    }

    #[cfg(feature = "parallel")]
    fn predict_all(&mut self, tinc: u32) {
        let cfg = &self.cfg;
        let seed = cfg.seed;
        let step = self.step_counter;
        self.particles.par_iter_mut().enumerate().for_each(|(idx, particle)| {
            let mut rng = StdRng::seed_from_u64(derive_seed(seed, step, idx, 1));
            predict_particle(particle, tinc, cfg, &mut rng);
        });
    }

    #[cfg(feature = "parallel")]
    fn update_all(&mut self, y: &Vector3<f64>, tinc: u32) {
        let cfg = &self.cfg;
        let seed = cfg.seed;
        let step = self.step_counter;
        self.particles.par_iter_mut().enumerate().for_each(|(idx, particle)| {
            let mut rng = StdRng::seed_from_u64(derive_seed(seed, step, idx, 2));
            update_particle(particle, y, cfg, tinc, &mut rng);
        });
    }

    /// Stratified resampling (spec.md §4.7) into the scratch buffer,
    /// followed by a buffer swap rather than a copy, so the source and
    /// destination particle sets never alias.
    fn resample(&mut self) {
        let indices = stratified_indices(&self.particles, &mut self.rng);
        let w0 = 1.0 / self.particles.len() as f64;
        for (dst, &src) in self.scratch.iter_mut().zip(indices.iter()) {
            dst.copy_from(&self.particles[src]);
            dst.weight = w0;
            dst.prev_weight = w0;
            dst.prior_weight = w0;
        }
        std::mem::swap(&mut self.particles, &mut self.scratch);
    }
}

#[cfg(feature = "parallel")]
fn derive_seed(base: u64, step: u64, index: usize, phase: u64) -> u64 {
    base ^ step
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((index as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93))
        .wrapping_add(phase)
}

/// Spec.md §4.5: per-particle death sampling (with `FORCE_KILL_TARGETS`
/// and `ALLOW_MULTI_DEATH`), Kalman predict of survivors, and removal of
/// the dead preserving order.
fn predict_particle(particle: &mut Particle, tinc: u32, cfg: &ValidatedConfig, rng: &mut StdRng) {
    let n = particle.targets.len();
    let mut dead = vec![false; n];
    let mut any_dead = false;

    for j in 0..n {
        if any_dead && !cfg.allow_multi_death {
            break;
        }

        let age = particle.targets[j].age;
        let dt0 = age as f64 * cfg.dt;
        let dt1 = (age + tinc) as f64 * cfg.dt;
        let f0 = gamma::gamma_cdf(dt0, cfg.alpha_death, cfg.beta_death, 0.0);
        let f1 = gamma::gamma_cdf(dt1, cfg.alpha_death, cfg.beta_death, 0.0);
        let mut p_death = if age == 0 {
            f1
        } else {
            1.0 - (1.0 - f1) / (1.0 - f0).max(1e-12)
        };

        if cfg.force_kill_targets {
            let pos_j = target_position(particle, j);
            for k in 0..n {
                if k == j || dead[k] || particle.targets[k].age < age {
                    continue;
                }
                let pos_k = target_position(particle, k);
                let separation = pos_j.cross(&pos_k).norm().atan2(pos_j.dot(&pos_k));
                if separation < cfg.force_kill_distance {
                    p_death = 1.0;
                    break;
                }
            }
        }

        let u: f64 = rng.gen_range(0.0..1.0);
        if u < p_death {
            dead[j] = true;
            any_dead = true;
        }
    }

    for (j, target) in particle.targets.iter_mut().enumerate() {
        if !dead[j] {
            let (mean, cov) = kalman::predict(&target.mean, &target.cov, &cfg.a, &cfg.q);
            target.mean = mean;
            target.cov = cov;
        }
    }

    let mut idx = 0;
    particle.targets.retain(|_| {
        let keep = !dead[idx];
        idx += 1;
        keep
    });
}

fn target_position(particle: &Particle, index: usize) -> Vector3<f64> {
    let mean = &particle.targets[index].mean;
    Vector3::new(mean[0], mean[1], mean[2])
}

/// Spec.md §4.6 steps 4-6 for one particle: draw one event from the
/// importance distribution (falling back to the prior, then to clutter,
/// per spec.md §7's DegenerateImportanceDistribution policy), replace the
/// particle's state with the chosen slot, and reweight.
fn update_particle(particle: &mut Particle, y: &Vector3<f64>, cfg: &ValidatedConfig, tinc: u32, rng: &mut StdRng) {
    let slots = match event::enumerate_events(particle, y, cfg, tinc) {
        event::EventOutcome::Slots(slots) => slots,
        event::EventOutcome::Drop => {
            log::warn!("kalman update stayed singular after eigenvalue clamp; dropping particle");
            particle.reset();
            return;
        }
    };

    let imp_total: f64 = slots.iter().map(|s| s.prior * s.likelihood).sum();
    let chosen = select_event(&slots, imp_total, rng);

    // W <- W * (likelihood_e * prior_e / imp_e), with imp_e the
    // *normalised* importance weight of the chosen slot; algebraically
    // this collapses to W * imp_total regardless of which slot is chosen,
    // which is exactly the marginal-likelihood weight update an RBPF
    // performs by summing over association hypotheses.
    let weight_factor = imp_total.max(WEIGHT_FLOOR);
    let new_weight = particle.weight * weight_factor;
    let prev_weight = particle.prev_weight;
    let prior_weight = particle.prior_weight;

    let mut post_state = slots.into_iter().nth(chosen).unwrap().post_state;
    post_state.weight = new_weight;
    post_state.prev_weight = prev_weight;
    post_state.prior_weight = prior_weight;
    *particle = post_state;
}

fn select_event(slots: &[EventSlot], imp_total: f64, rng: &mut StdRng) -> usize {
    if imp_total > 0.0 {
        let importance: Vec<f64> = slots.iter().map(|s| s.prior * s.likelihood).collect();
        return draw_categorical(&importance, imp_total, rng);
    }

    let prior_total: f64 = slots.iter().map(|s| s.prior).sum();
    if prior_total > 0.0 {
        let priors: Vec<f64> = slots.iter().map(|s| s.prior).collect();
        return draw_categorical(&priors, prior_total, rng);
    }

    0 // Clutter is always slot 0.
}

fn draw_categorical(weights: &[f64], total: f64, rng: &mut StdRng) -> usize {
    let u = rng.gen_range(0.0..total);
    let mut cum = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cum += w;
        if u < cum {
            return i;
        }
    }
    weights.len() - 1
}

fn renormalize(particles: &mut [Particle]) {
    let total: f64 = particles.iter().map(|p| p.weight).sum();
    if total > 0.0 {
        for p in particles.iter_mut() {
            p.weight /= total;
        }
    } else {
        let w = 1.0 / particles.len() as f64;
        for p in particles.iter_mut() {
            p.weight = w;
        }
    }
}

fn effective_sample_size(particles: &[Particle]) -> f64 {
    let sum_sq: f64 = particles.iter().map(|p| p.weight * p.weight).sum();
    if sum_sq > 0.0 {
        1.0 / sum_sq
    } else {
        0.0
    }
}

fn smooth_weights(particles: &mut [Particle], coeff: f64) {
    for p in particles.iter_mut() {
        let smoothed = p.weight * (1.0 - coeff) + p.prev_weight * coeff;
        p.weight = smoothed;
        p.prev_weight = smoothed;
    }
}

fn stratified_indices(particles: &[Particle], rng: &mut StdRng) -> Vec<usize> {
    let np = particles.len();
    let mut cum = Vec::with_capacity(np);
    let mut running = 0.0;
    for p in particles {
        running += p.weight;
        cum.push(running);
    }

    let mut indices = Vec::with_capacity(np);
    for j in 0..np {
        let lo = j as f64 / np as f64;
        let hi = (j + 1) as f64 / np as f64;
        let u = rng.gen_range(lo..hi);
        let mut i = 0;
        while i < np - 1 && cum[i] <= u {
            i += 1;
        }
        indices.push(i);
    }
    indices
}
