//! Deterministic per-component and model-level RNG wrappers.
//!
//! # Determinism strategy
//!
//! Each component gets its own independent `SmallRng` seeded by:
//!
//!   seed = global_seed XOR (component_id * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive component IDs uniformly across the seed space.
//! Adding a component to a model therefore never perturbs the random streams
//! of the components built before it, and offer-policy decisions stay
//! reproducible for a given seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::ComponentId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

// ── ComponentRng ──────────────────────────────────────────────────────────────

/// Per-component deterministic RNG.
pub struct ComponentRng(SmallRng);

impl ComponentRng {
    /// Seed deterministically from the run's global seed and a component ID.
    pub fn new(global_seed: u64, component: ComponentId) -> Self {
        let seed = global_seed ^ (component.0 as u64).wrapping_mul(MIXING_CONSTANT);
        ComponentRng(SmallRng::seed_from_u64(seed))
    }

    /// Expose the inner `SmallRng` for use with `rand` distribution types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Uniform real in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.0.r#gen()
    }

    /// Uniform integer in `[0, n)`.  `n` must be positive.
    #[inline]
    pub fn below(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n)
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }
}

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Model-level RNG for global decisions made outside any one component.
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }
}
