//! Rao-Blackwellised particle filter for real-time 3D multi-target
//! tracking: a particle set carries the discrete data-association
//! hypothesis (clutter / existing target / birth) while each target's
//! continuous 6-D state (position, velocity) is integrated analytically
//! by a per-target Kalman filter.
//!
//! The public surface is [`Tracker`]: `create` it from a [`TrackerConfig`],
//! feed it observations through [`Tracker::step`], and read back a
//! [`StepOutput`] of stable-ID'd targets.

pub mod config;
pub mod discretize;
pub mod engine;
pub mod error;
pub mod event;
pub mod gamma;
pub mod kalman;
pub mod numeric;
pub mod output;
pub mod particle;
pub mod tracker;

pub use config::{TrackerConfig, ValidatedConfig, NP_MAX};
pub use error::TrackerError;
pub use output::{StepOutput, TrackedTarget};
pub use tracker::Tracker;
