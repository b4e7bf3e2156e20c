//! Object-safe sampling distributions.
//!
//! `rand::distributions::Distribution` is generic over the RNG and cannot be
//! boxed, so components hold a `Box<dyn Sampler>` (real-valued: delays,
//! rates, production amounts) or a `Box<dyn DiscreteSampler>` (receiver
//! indices).  Every `Distribution<f64>` is a `Sampler`, so `rand_distr`
//! types such as `Exp` or `Normal` plug in directly.

use rand::distributions::{Distribution, WeightedIndex};

use crate::{ComponentRng, FlowError, FlowResult};

/// A real-valued distribution sampled with a component's RNG.
pub trait Sampler {
    fn sample_value(&self, rng: &mut ComponentRng) -> f64;
}

impl<D: Distribution<f64>> Sampler for D {
    #[inline]
    fn sample_value(&self, rng: &mut ComponentRng) -> f64 {
        self.sample(rng.inner())
    }
}

/// A degenerate distribution that always yields the same value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fixed(pub f64);

impl Distribution<f64> for Fixed {
    fn sample<R: rand::Rng + ?Sized>(&self, _rng: &mut R) -> f64 {
        self.0
    }
}

// ── Discrete ──────────────────────────────────────────────────────────────────

/// An integer-valued distribution, used to pick receiver indices.
///
/// Values may fall outside any particular index range; callers validate.
pub trait DiscreteSampler {
    fn sample_index(&self, rng: &mut ComponentRng) -> i64;
}

/// Index `i` with probability proportional to `weights[i]`.
pub struct Empirical(WeightedIndex<f64>);

impl Empirical {
    pub fn new(weights: &[f64]) -> FlowResult<Self> {
        WeightedIndex::new(weights)
            .map(Empirical)
            .map_err(|e| FlowError::Config(format!("invalid empirical weights: {e}")))
    }
}

impl DiscreteSampler for Empirical {
    fn sample_index(&self, rng: &mut ComponentRng) -> i64 {
        self.0.sample(rng.inner()) as i64
    }
}

/// Always the same index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedIndex(pub i64);

impl DiscreteSampler for FixedIndex {
    fn sample_index(&self, _rng: &mut ComponentRng) -> i64 {
        self.0
    }
}

/// Adapt a closure into a discrete distribution.
pub struct FromFn<F>(pub F);

impl<F> DiscreteSampler for FromFn<F>
where
    F: Fn(&mut ComponentRng) -> i64,
{
    fn sample_index(&self, rng: &mut ComponentRng) -> i64 {
        (self.0)(rng)
    }
}
