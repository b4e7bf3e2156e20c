use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use des_core::{FlowError, FlowResult, Resource, ResourceKind, Sampler, Tick};
use des_schedule::Steppable;

use super::{DelayCore, check_accept};
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

/// Draws before a delay distribution is given up on.
pub const MAX_DELAY_TRIES: usize = 10_000;

/// A delay over integer ticks with O(1) insert and removal.
///
/// Pending items live in a ring of `max_delay_steps + 1` buckets, each
/// covering `delay_interval` ticks (1 by default).  An item delayed `d` ticks
/// waits `s = ceil(d / interval)` steps in bucket `(pos + s) mod (max + 1)`;
/// each elapsed interval moves `pos` on by one and empties the bucket it
/// lands on.  The longest delay is therefore `max_delay_steps * interval`.
///
/// Stepping must happen once per interval, which
/// [`auto_schedule_at`](Self::auto_schedule_at) arranges.
pub struct BoundedDelay {
    core:         ProviderCore,
    delay:        DelayCore,
    me:           Weak<BoundedDelay>,
    max_steps:    u64,
    delay_steps:  Cell<u64>,
    interval:     Cell<u64>,
    distribution: RefCell<Option<Box<dyn Sampler>>>,
    buckets:      RefCell<Vec<Vec<Resource>>>,
    pos:          Cell<usize>,
    last_tick:    Cell<Option<Tick>>,
    size:         Cell<usize>,
}

impl BoundedDelay {
    /// A bounded delay with a fixed delay of `delay_steps` ticks.
    pub fn new(
        model: &Model,
        name: &str,
        kind: ResourceKind,
        max_delay_steps: u64,
        delay_steps: f64,
    ) -> FlowResult<Rc<Self>> {
        if max_delay_steps == 0 {
            return Err(FlowError::Config("max delay steps must be positive".into()));
        }
        let delay_steps = check_fixed(delay_steps, max_delay_steps)?;
        let core = ProviderCore::new(model, name, kind)?;
        let slots = usize::try_from(max_delay_steps + 1)
            .map_err(|_| FlowError::Config(format!("max delay steps {max_delay_steps} too large")))?;
        Ok(Rc::new_cyclic(|me| BoundedDelay {
            core,
            delay: DelayCore::new(model.schedule()),
            me: me.clone(),
            max_steps: max_delay_steps,
            delay_steps: Cell::new(delay_steps),
            interval: Cell::new(1),
            distribution: RefCell::new(None),
            buckets: RefCell::new((0..slots).map(|_| Vec::new()).collect()),
            pos: Cell::new(0),
            last_tick: Cell::new(None),
            size: Cell::new(0),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn delay(&self) -> &DelayCore {
        &self.delay
    }

    pub fn max_delay_steps(&self) -> u64 {
        self.max_steps
    }

    /// The fixed delay, in ticks.
    pub fn delay_steps(&self) -> u64 {
        self.delay_steps.get()
    }

    pub fn set_delay_time(&self, delay_steps: f64) -> FlowResult<()> {
        self.delay_steps.set(check_fixed(delay_steps, self.longest())?);
        Ok(())
    }

    pub fn delay_interval(&self) -> u64 {
        self.interval.get()
    }

    /// Make each bucket cover `interval` ticks.  Everything pending is
    /// dropped, and the fixed delay must still fit the widened or narrowed
    /// ring.  A running [`auto_schedule_at`](Self::auto_schedule_at) keeps
    /// its old period; schedule again after changing this.
    pub fn set_delay_interval(&self, interval: u64) -> FlowResult<()> {
        if interval < 1 {
            return Err(FlowError::Config(format!(
                "{}: delay interval must be at least 1, was {interval}",
                self.core.name()
            )));
        }
        let longest = self.max_steps.saturating_mul(interval);
        check_fixed(self.delay_steps.get() as f64, longest)?;
        self.interval.set(interval);
        self.clear();
        Ok(())
    }

    fn longest(&self) -> u64 {
        self.max_steps.saturating_mul(self.interval.get())
    }

    /// Sample delays from `dist`.  Each draw is rounded up from its absolute
    /// value and must land in `1..=max_delay_steps * delay_interval`.
    pub fn set_delay_distribution(&self, dist: Option<Box<dyn Sampler>>) {
        *self.distribution.borrow_mut() = dist;
    }

    /// Ring buffers are never cumulative.
    pub fn set_cumulative(&self, val: bool) -> FlowResult<()> {
        if val {
            return Err(FlowError::Config(
                "a bounded delay cannot be cumulative, use Delay instead".into(),
            ));
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Step this delay every `delay_interval` ticks from `time` on, ahead of
    /// anything else scheduled at the same tick.
    pub fn auto_schedule_at(&self, time: f64) -> FlowResult<()> {
        if !(time >= 0.0) {
            return Err(FlowError::Config(format!("cannot auto-schedule at {time}")));
        }
        let me = self.me.upgrade().ok_or_else(|| FlowError::Config("delay dropped".into()))?;
        self.delay.set_auto_schedules(true);
        self.delay.schedule().schedule_repeating(time, self.interval.get() as f64, i32::MIN, me)
    }

    pub fn clear(&self) {
        self.delay.discard_stock(&self.core);
        let amount: f64 = self
            .buckets
            .borrow_mut()
            .iter_mut()
            .flat_map(|b| b.drain(..))
            .map(|r| r.amount())
            .sum();
        self.delay.discard_pending(amount);
        self.size.set(0);
    }

    fn next_delay(&self) -> FlowResult<u64> {
        let dist = self.distribution.borrow();
        let Some(dist) = &*dist else {
            return Ok(self.delay_steps.get());
        };
        let longest = self.longest();
        for _ in 0..MAX_DELAY_TRIES {
            let d = self.core.with_rng(|rng| dist.sample_value(rng)).abs().ceil();
            if d >= 1.0 && d <= longest as f64 {
                return Ok(d as u64);
            }
        }
        Err(FlowError::Config(format!(
            "{} drew no delay in 1..={longest} after {MAX_DELAY_TRIES} tries",
            self.core.name()
        )))
    }

    /// Bring the ring up to the current interval, ripening whatever falls
    /// due.
    fn advance(&self) -> FlowResult<()> {
        let now = self.delay.now();
        let tick = Tick::from_time(now)
            .ok_or_else(|| FlowError::Config(format!("bounded delay stepped at {now}")))?;
        let Some(last) = self.last_tick.get() else {
            self.last_tick.set(Some(tick));
            return Ok(());
        };
        let interval = self.interval.get();
        let elapsed = tick.since(last) / interval;
        if elapsed == 0 {
            return Ok(());
        }
        self.last_tick.set(Some(last + elapsed * interval));
        self.delay.drop_stale(&self.core);

        let slots = self.max_steps + 1;
        let pos = self.pos.get() as u64;
        for i in 1..=elapsed.min(slots) {
            let idx = ((pos + i) % slots) as usize;
            let ripe = std::mem::take(&mut self.buckets.borrow_mut()[idx]);
            self.size.set(self.size.get() - ripe.len());
            for res in ripe {
                self.delay.ripen(&self.core, res)?;
            }
        }
        self.pos.set(((pos + elapsed % slots) % slots) as usize);
        Ok(())
    }

    pub fn update(&self) -> FlowResult<()> {
        self.advance()
    }
}

fn check_fixed(delay_steps: f64, max: u64) -> FlowResult<u64> {
    if !(delay_steps >= 0.0) || delay_steps.fract() != 0.0 || delay_steps > max as f64 {
        return Err(FlowError::Config(format!(
            "bounded delay times must be integers in 0..={max}, was {delay_steps}"
        )));
    }
    Ok(delay_steps as u64)
}

impl Named for BoundedDelay {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for BoundedDelay {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.core.typical().clone())
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if !check_accept(&self.core, &self.delay, &offer, at_least, at_most)? {
            return Ok(false);
        }
        self.advance()?;
        let d = self.next_delay()?;
        let Some(res) = self.delay.admit(&mut offer, at_least, at_most, self.core.available())? else {
            return Ok(false);
        };
        if d == 0 {
            self.delay.ripen(&self.core, res)?;
            return Ok(true);
        }
        let steps = d.div_ceil(self.interval.get());
        let slots = self.max_steps + 1;
        let idx = ((self.pos.get() as u64 + steps) % slots) as usize;
        self.buckets.borrow_mut()[idx].push(res);
        self.size.set(self.size.get() + 1);
        Ok(true)
    }
}

impl Provider for BoundedDelay {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for BoundedDelay {
    fn step(&self) -> FlowResult<()> {
        self.advance()?;
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
