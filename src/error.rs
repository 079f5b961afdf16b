//! Error kinds surfaced by the tracker's external interface.
//!
//! Only failures that a caller can actually act on are represented here.
//! Recoverable in-`step` conditions (numeric fallback, particle drop,
//! degenerate importance distribution) are handled internally by
//! [`crate::engine`] and only observable as a `log::warn!` line, per the
//! policy spelled out for each error kind.

use thiserror::Error;

/// Errors that can be returned from [`crate::Tracker::create`].
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration field out of its documented valid range, or
    /// otherwise not finite.
    #[error("invalid tracker configuration: {0}")]
    Configuration(String),

    /// A linear solve, determinant, or matrix exponential produced a
    /// non-finite or singular result while building the discrete model
    /// (`A`, `Q`) from the user's configuration. Only fatal during
    /// `create` — the equivalent condition inside `step` is recovered
    /// from locally, never surfaced as this variant.
    #[error("numeric failure while building the tracker model: {0}")]
    Numeric(String),
}
