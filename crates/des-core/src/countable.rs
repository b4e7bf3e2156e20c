//! Bulk resources: countable, uncountable and money amounts.
//!
//! Amounts are stored as `f64` so one type serves integral and real-valued
//! kinds alike.  Integral kinds hold mathematical integers up to
//! [`MAXIMUM_INTEGER`] (2^53, the largest run of exactly representable
//! integers in a 64-bit float).  Every mutator either leaves the resource in
//! a valid state or leaves it untouched.

use std::cmp::Ordering;
use std::fmt;

use crate::{FlowError, FlowResult, Measure, ResourceKind};

/// Largest amount an integral resource may hold.
pub const MAXIMUM_INTEGER: f64 = 9_007_199_254_740_992.0;

/// `true` if `x` is a legal amount for a kind with the given integrality.
#[inline]
pub fn is_valid_amount(x: f64, integral: bool) -> bool {
    if x.is_nan() || x < 0.0 {
        return false;
    }
    if integral {
        x <= MAXIMUM_INTEGER && x.fract() == 0.0
    } else {
        true
    }
}

fn validate(x: f64, integral: bool) -> FlowResult<()> {
    if x.is_nan() || x < 0.0 || (integral && x > MAXIMUM_INTEGER) {
        Err(FlowError::InvalidAmount(x))
    } else if integral && x.fract() != 0.0 {
        Err(FlowError::NonIntegerAmount(x))
    } else {
        Ok(())
    }
}

// ── CountableResource ─────────────────────────────────────────────────────────

/// A typed, non-negative amount of some bulk kind.
///
/// `Clone` is a duplicate: same kind, independent amount.
#[derive(Clone, Debug)]
pub struct CountableResource {
    kind:   ResourceKind,
    amount: f64,
}

impl CountableResource {
    /// Fails if `kind` is an entity kind or `amount` is illegal for it.
    pub fn new(kind: ResourceKind, amount: f64) -> FlowResult<Self> {
        if kind.is_entity() {
            return Err(FlowError::Protocol(format!(
                "{kind} is an entity kind and cannot hold a bulk amount"
            )));
        }
        validate(amount, kind.is_integral())?;
        Ok(Self { kind, amount })
    }

    #[inline]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    #[inline]
    pub fn amount(&self) -> f64 {
        self.amount
    }

    #[inline]
    pub fn is_integral(&self) -> bool {
        self.kind.is_integral()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.amount == 0.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_same_type(&self, other: &CountableResource) -> bool {
        self.kind == other.kind
    }

    /// A same-kind duplicate with an independent amount.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// A same-kind resource holding zero.
    pub fn empty_like(&self) -> Self {
        Self { kind: self.kind.clone(), amount: 0.0 }
    }

    // ── Mutators ──────────────────────────────────────────────────────────

    pub fn set_amount(&mut self, amount: f64) -> FlowResult<()> {
        validate(amount, self.is_integral())?;
        self.amount = amount;
        Ok(())
    }

    /// Add `x`.  Returns `false` and changes nothing if `x` or the result is
    /// illegal for this kind.
    pub fn increase(&mut self, x: f64) -> bool {
        let integral = self.is_integral();
        let result = self.amount + x;
        if !is_valid_amount(x, integral) || !is_valid_amount(result, integral) {
            return false;
        }
        self.amount = result;
        true
    }

    /// Subtract `x`.  Returns `false` and changes nothing if `x` or the
    /// result is illegal for this kind.
    pub fn decrease(&mut self, x: f64) -> bool {
        let integral = self.is_integral();
        let result = self.amount - x;
        if !is_valid_amount(x, integral) || !is_valid_amount(result, integral) {
            return false;
        }
        self.amount = result;
        true
    }

    pub fn increment(&mut self) -> bool {
        self.increase(1.0)
    }

    pub fn decrement(&mut self) -> bool {
        self.decrease(1.0)
    }

    /// Split off `min(amount, at_most)` into a new resource of the same kind.
    ///
    /// Returns `Ok(None)` (and changes nothing) if the amount is below
    /// `at_least`.  Bounds must satisfy `0 <= at_least <= at_most`.
    pub fn reduce(&mut self, at_least: f64, at_most: f64) -> FlowResult<Option<Self>> {
        if at_least.is_nan() || at_most.is_nan() || at_least < 0.0 || at_most < at_least {
            return Err(FlowError::InvalidBounds { at_least, at_most, amount: self.amount });
        }
        if self.amount < at_least {
            return Ok(None);
        }
        let mut take = self.amount.min(at_most);
        if self.is_integral() {
            take = take.floor();
            if take < at_least {
                return Ok(None);
            }
        }
        self.amount -= take;
        Ok(Some(Self { kind: self.kind.clone(), amount: take }))
    }

    /// Split off exactly `x`, or nothing.
    pub fn reduce_exactly(&mut self, x: f64) -> FlowResult<Option<Self>> {
        self.reduce(x, x)
    }

    /// Merge `other` into `self`, leaving `other` at zero.
    pub fn add(&mut self, other: &mut CountableResource) -> FlowResult<()> {
        self.kind.check_same(&other.kind)?;
        let result = self.amount + other.amount;
        validate(result, self.is_integral())?;
        self.amount = result;
        other.amount = 0.0;
        Ok(())
    }

    /// Move at most `max` from `other` into `self`.  Returns what was moved.
    pub fn add_at_most(&mut self, other: &mut CountableResource, max: f64) -> FlowResult<f64> {
        self.kind.check_same(&other.kind)?;
        if max.is_nan() || max < 0.0 {
            return Err(FlowError::InvalidAmount(max));
        }
        let mut moved = other.amount.min(max);
        if self.is_integral() {
            moved = moved.floor();
        }
        validate(self.amount + moved, self.is_integral())?;
        self.amount += moved;
        other.amount -= moved;
        Ok(moved)
    }

    /// Clamp the amount into `[min, max]`.  Both bounds must be legal
    /// amounts for this kind (`max` may also be infinite) and `min <= max`;
    /// otherwise nothing changes.
    pub fn bound(&mut self, min: f64, max: f64) -> FlowResult<()> {
        validate(min, self.is_integral())?;
        self.check_upper(max)?;
        if min > max {
            return Err(FlowError::InvalidBounds { at_least: min, at_most: max, amount: self.amount });
        }
        self.amount = self.amount.clamp(min, max);
        Ok(())
    }

    pub fn bound_max(&mut self, max: f64) -> FlowResult<()> {
        self.check_upper(max)?;
        self.amount = self.amount.min(max);
        Ok(())
    }

    fn check_upper(&self, max: f64) -> FlowResult<()> {
        if max == f64::INFINITY {
            Ok(())
        } else {
            validate(max, self.is_integral())
        }
    }

    pub fn clear(&mut self) {
        self.amount = 0.0;
    }

    /// Amount ordering against a same-kind resource.
    pub fn compare(&self, other: &CountableResource) -> FlowResult<Ordering> {
        self.kind.check_same(&other.kind)?;
        Ok(self.amount.total_cmp(&other.amount))
    }

    // ── Uncountable operations ────────────────────────────────────────────

    fn require_uncountable(&self, op: &str) -> FlowResult<()> {
        if self.is_integral() {
            Err(FlowError::Protocol(format!("{op} requires an uncountable kind, not {}", self.kind)))
        } else {
            Ok(())
        }
    }

    /// Split into `n` equal pieces: `self` keeps one, the other `n - 1` are
    /// returned.
    pub fn divide(&mut self, n: usize) -> FlowResult<Vec<Self>> {
        self.require_uncountable("divide")?;
        if n == 0 {
            return Err(FlowError::InvalidAmount(0.0));
        }
        let piece = self.amount / n as f64;
        let pieces = (1..n)
            .map(|_| Self { kind: self.kind.clone(), amount: piece })
            .collect();
        self.amount -= piece * (n - 1) as f64;
        Ok(pieces)
    }

    /// Split in half, returning the other half.
    pub fn halve(&mut self) -> FlowResult<Self> {
        self.require_uncountable("halve")?;
        let half = self.amount / 2.0;
        self.amount -= half;
        Ok(Self { kind: self.kind.clone(), amount: half })
    }

    /// Multiply the amount by `factor`.
    pub fn scale(&mut self, factor: f64) -> FlowResult<()> {
        self.require_uncountable("scale")?;
        let result = self.amount * factor;
        if factor.is_nan() || factor < 0.0 || result.is_nan() {
            return Err(FlowError::InvalidAmount(factor));
        }
        self.amount = result;
        Ok(())
    }
}

impl fmt::Display for CountableResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.measure() {
            Measure::Money { minor_units } => {
                write!(f, "{} {}", self.kind, crate::money::format_minor(self.amount, minor_units))
            }
            _ => write!(f, "{} {}", self.kind, self.amount),
        }
    }
}
