//! `Source`: produces resources on a schedule and offers them downstream.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use des_core::{Entity, FlowError, FlowResult, ResourceKind, Sampler};
use des_schedule::{Schedule, Steppable};

use crate::provider::delegate_receivers;
use crate::{Model, Named, Provider, ProviderCore, Receiver};

/// Draws before a production distribution is given up on.
pub const REJECTION_TRIES: usize = 20;

/// A provider that manufactures its own stock.
///
/// The first step only decides when the first production happens.  Every
/// later step due at or after that time produces, reschedules (when
/// `auto_schedules` is set) and offers.  Stock never grows past
/// `capacity`.
pub struct Source {
    core:                    ProviderCore,
    me:                      Weak<Source>,
    schedule:                Rc<dyn Schedule>,
    rate:                    Cell<f64>,
    random_offset:           Cell<bool>,
    rate_distribution:       RefCell<Option<Box<dyn Sampler>>>,
    production:              Cell<f64>,
    production_distribution: RefCell<Option<Box<dyn Sampler>>>,
    capacity:                Cell<f64>,
    auto_schedules:          Cell<bool>,
    ordering:                Cell<i32>,
    next_time:               Cell<f64>,
    started:                 Cell<bool>,
    total_produced:          Cell<f64>,
}

fn non_negative(what: &str, x: f64) -> FlowResult<f64> {
    if x >= 0.0 {
        Ok(x)
    } else {
        Err(FlowError::Config(format!("{what} may not be negative or NaN, was {x}")))
    }
}

/// The smallest representable time strictly after `t`.
fn next_after(t: f64) -> f64 {
    if t.is_nan() || t == f64::INFINITY {
        t
    } else if t == 0.0 {
        f64::from_bits(1)
    } else if t > 0.0 {
        f64::from_bits(t.to_bits() + 1)
    } else {
        f64::from_bits(t.to_bits() - 1)
    }
}

impl Source {
    pub fn new(model: &Model, name: &str, kind: ResourceKind) -> FlowResult<Rc<Self>> {
        let core = ProviderCore::new(model, name, kind)?;
        let start = model.time();
        Ok(Rc::new_cyclic(|me| Source {
            core,
            me: me.clone(),
            schedule: model.schedule(),
            rate: Cell::new(1.0),
            random_offset: Cell::new(true),
            rate_distribution: RefCell::new(None),
            production: Cell::new(1.0),
            production_distribution: RefCell::new(None),
            capacity: Cell::new(f64::INFINITY),
            auto_schedules: Cell::new(true),
            ordering: Cell::new(0),
            next_time: Cell::new(start),
            started: Cell::new(false),
            total_produced: Cell::new(0.0),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    // ── Parameters ────────────────────────────────────────────────────────

    /// Fixed interval between productions.  With `random_offset` the first
    /// production lands uniformly within the first interval.
    pub fn set_rate(&self, rate: f64, random_offset: bool) -> FlowResult<()> {
        self.rate.set(non_negative("rate", rate)?);
        self.random_offset.set(random_offset);
        Ok(())
    }

    pub fn rate(&self) -> f64 {
        self.rate.get()
    }

    /// Draw each interval from `dist` instead of the fixed rate.
    pub fn set_rate_distribution(&self, dist: Option<Box<dyn Sampler>>) {
        *self.rate_distribution.borrow_mut() = dist;
    }

    /// Amount made per production.  Must be finite.
    pub fn set_production(&self, amount: f64) -> FlowResult<()> {
        let amount = non_negative("production", amount)?;
        if amount.is_infinite() {
            return Err(FlowError::Config("production must be finite".into()));
        }
        self.production.set(amount);
        Ok(())
    }

    pub fn production(&self) -> f64 {
        self.production.get()
    }

    /// Draw each production amount from `dist`.  Negative and non-finite
    /// draws are rejected and redrawn.
    pub fn set_production_distribution(&self, dist: Option<Box<dyn Sampler>>) {
        *self.production_distribution.borrow_mut() = dist;
    }

    pub fn set_capacity(&self, capacity: f64) -> FlowResult<()> {
        self.capacity.set(non_negative("capacity", capacity)?);
        Ok(())
    }

    pub fn capacity(&self) -> f64 {
        self.capacity.get()
    }

    pub fn set_auto_schedules(&self, val: bool) {
        self.auto_schedules.set(val);
    }

    pub fn set_reschedule_ordering(&self, ordering: i32) {
        self.ordering.set(ordering);
    }

    pub fn next_production_time(&self) -> f64 {
        self.next_time.get()
    }

    pub fn total_produced(&self) -> f64 {
        self.total_produced.get()
    }

    /// Schedule the first step at `time`.
    pub fn start_at(&self, time: f64) -> FlowResult<()> {
        let me = self.me.upgrade().ok_or_else(|| FlowError::Config("source dropped".into()))?;
        self.next_time.set(time);
        self.schedule.schedule_once(time, self.ordering.get(), me)
    }

    // ── Production ────────────────────────────────────────────────────────

    fn draw_next_time(&self, first: bool) -> f64 {
        let now = self.schedule.time();
        let base = self.next_time.get();
        let dist = self.rate_distribution.borrow();
        let next = match &*dist {
            Some(d) => base + self.core.with_rng(|rng| d.sample_value(rng)).abs(),
            None if first => {
                let offset = if self.random_offset.get() {
                    self.core.with_rng(|rng| rng.next_f64())
                } else {
                    1.0
                };
                base + offset * self.rate.get()
            }
            None => base + self.rate.get(),
        };
        if next <= now { next_after(now) } else { next }
    }

    fn produce_amount(&self) -> f64 {
        let dist = self.production_distribution.borrow();
        let Some(d) = &*dist else {
            return self.production.get();
        };
        for _ in 0..REJECTION_TRIES {
            let amount = self.core.with_rng(|rng| d.sample_value(rng));
            if amount >= 0.0 && amount.is_finite() {
                return amount;
            }
        }
        self.core.warn_once(&format!(
            "no finite non-negative production after {REJECTION_TRIES} draws, producing 0"
        ));
        0.0
    }

    fn reschedule(&self, first: bool) -> FlowResult<()> {
        let next = self.draw_next_time(first);
        self.next_time.set(next);
        if let Some(me) = self.me.upgrade() {
            self.schedule.schedule_once(next, self.ordering.get(), me)?;
        }
        Ok(())
    }

    /// Advance the production clock and add new stock if due.
    pub fn update(&self) -> FlowResult<()> {
        if self.auto_schedules.get() {
            if !self.started.replace(true) {
                return self.reschedule(true);
            }
            if self.schedule.time() < self.next_time.get() {
                return Ok(());
            }
            self.reschedule(false)?;
        }
        self.produce()
    }

    fn produce(&self) -> FlowResult<()> {
        let capacity = self.capacity.get();
        let on_hand = self.core.available();
        if on_hand >= capacity {
            return Ok(());
        }
        let amount = self.produce_amount();
        let kind = self.core.typical().clone();
        let made = if kind.is_entity() {
            let n = (amount.round() as u64).min((capacity - on_hand).floor() as u64);
            for _ in 0..n {
                self.core.push_entity(Entity::new(kind.clone())?)?;
            }
            n as f64
        } else {
            let amount = if kind.is_integral() {
                amount.round().min((capacity - on_hand).floor())
            } else {
                amount.min(capacity - on_hand)
            };
            let mut lot = kind.amount(amount)?;
            self.core.add_amount(&mut lot)?;
            amount
        };
        if made > 0.0 {
            log::trace!("{} produced {made}", self.core.name());
        }
        self.total_produced.set(self.total_produced.get() + made);
        Ok(())
    }
}

impl Named for Source {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Provider for Source {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for Source {
    fn step(&self) -> FlowResult<()> {
        self.update()?;
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
