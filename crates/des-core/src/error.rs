//! Kernel error type.
//!
//! Three families of failure exist, and all of them abort the call chain
//! that triggered them:
//!
//! - protocol violations (wiring bugs: wrong kind, bounds outside the
//!   offered amount, entity requests against bulk providers),
//! - cyclic calls (same-instant re-entry into a component that is still
//!   offering, transacting or partnering),
//! - configuration errors (illegal parameters, raised eagerly by
//!   constructors and setters).
//!
//! An offer that is simply refused is *not* an error; it is `Ok(false)`.

use thiserror::Error;

use crate::KindId;

/// The error type shared by every `des-*` crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    // ── Protocol violations ───────────────────────────────────────────────
    #[error("resource kind mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: KindId, got: KindId },

    #[error("invalid offer bounds: at_least {at_least}, at_most {at_most}, amount {amount}")]
    InvalidBounds { at_least: f64, at_most: f64, amount: f64 },

    #[error("invalid amount {0}")]
    InvalidAmount(f64),

    #[error("amount {0} is not an integer")]
    NonIntegerAmount(f64),

    #[error("{0} does not provide entities")]
    NotEntityProvider(String),

    #[error("entity index {index} out of range (len {len})")]
    InvalidEntityIndex { index: usize, len: usize },

    #[error("protocol violation: {0}")]
    Protocol(String),

    // ── Cyclic calls ──────────────────────────────────────────────────────
    #[error("cyclic offer detected at {0}")]
    CyclicOffer(String),

    #[error("cyclic transaction detected at {0}")]
    CyclicTransaction(String),

    #[error("cyclic partnering detected at {0}")]
    CyclicPartnering(String),

    // ── Configuration ─────────────────────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// `true` for the three cyclic-call variants.
    pub fn is_cyclic(&self) -> bool {
        matches!(
            self,
            FlowError::CyclicOffer(_)
                | FlowError::CyclicTransaction(_)
                | FlowError::CyclicPartnering(_)
        )
    }

    /// `true` for configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(self, FlowError::Config(_))
    }
}

/// Shorthand result type for all `des-*` crates.
pub type FlowResult<T> = Result<T, FlowError>;
