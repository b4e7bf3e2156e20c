use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};
use std::rc::{Rc, Weak};

use des_core::{FlowError, FlowResult, Resource, ResourceKind, Sampler};
use des_schedule::Steppable;
use ordered_float::OrderedFloat;

use super::{DelayCore, check_accept, invalid_delay};
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

/// One item in transit.  Ordered so the `BinaryHeap` pops the earliest ripe
/// time first, and among equal times the earliest arrival.
struct Pending {
    ripe:     OrderedFloat<f64>,
    seq:      u64,
    resource: Resource,
}

impl Pending {
    fn key(&self) -> (OrderedFloat<f64>, u64) {
        (self.ripe, self.seq)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// A delay whose per-item delay is fixed or drawn from a distribution.
///
/// In cumulative mode each new item ripens `delay` after the previously
/// accepted item rather than after now, as long as something is in transit.
pub struct Delay {
    core:         ProviderCore,
    delay:        DelayCore,
    me:           Weak<Delay>,
    delay_time:   Cell<f64>,
    distribution: RefCell<Option<Box<dyn Sampler>>>,
    cumulative:   Cell<bool>,
    last_ripe:    Cell<f64>,
    heap:         RefCell<BinaryHeap<Pending>>,
    seq:          Cell<u64>,
    scheduled:    RefCell<BTreeSet<OrderedFloat<f64>>>,
}

impl Delay {
    pub fn new(model: &Model, name: &str, kind: ResourceKind, delay_time: f64) -> FlowResult<Rc<Self>> {
        if !(delay_time >= 0.0) {
            return Err(invalid_delay(delay_time));
        }
        let core = ProviderCore::new(model, name, kind)?;
        Ok(Rc::new_cyclic(|me| Delay {
            core,
            delay: DelayCore::new(model.schedule()),
            me: me.clone(),
            delay_time: Cell::new(delay_time),
            distribution: RefCell::new(None),
            cumulative: Cell::new(false),
            last_ripe: Cell::new(f64::NEG_INFINITY),
            heap: RefCell::new(BinaryHeap::new()),
            seq: Cell::new(0),
            scheduled: RefCell::new(BTreeSet::new()),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn delay(&self) -> &DelayCore {
        &self.delay
    }

    pub fn delay_time(&self) -> f64 {
        self.delay_time.get()
    }

    pub fn set_delay_time(&self, delay_time: f64) -> FlowResult<()> {
        if !(delay_time >= 0.0) {
            return Err(invalid_delay(delay_time));
        }
        self.delay_time.set(delay_time);
        Ok(())
    }

    /// Sample each delay from `dist` (absolute value) instead of the fixed
    /// time.
    pub fn set_delay_distribution(&self, dist: Option<Box<dyn Sampler>>) {
        *self.distribution.borrow_mut() = dist;
    }

    pub fn is_cumulative(&self) -> bool {
        self.cumulative.get()
    }

    pub fn set_cumulative(&self, val: bool) {
        self.cumulative.set(val);
    }

    pub fn size(&self) -> usize {
        self.heap.borrow().len()
    }

    /// Ripe times and duplicates of the items in transit, earliest first.
    pub fn delayed(&self) -> Vec<(f64, Resource)> {
        let heap = self.heap.borrow();
        let mut items: Vec<&Pending> = heap.iter().collect();
        items.sort_by(|a, b| b.cmp(a));
        items.into_iter().map(|p| (p.ripe.0, p.resource.duplicate())).collect()
    }

    pub fn clear(&self) {
        self.delay.discard_stock(&self.core);
        let amount: f64 = self.heap.borrow_mut().drain().map(|p| p.resource.amount()).sum();
        self.delay.discard_pending(amount);
        self.scheduled.borrow_mut().clear();
    }

    fn next_delay(&self) -> FlowResult<f64> {
        match &*self.distribution.borrow() {
            Some(dist) => {
                let d = self.core.with_rng(|rng| dist.sample_value(rng)).abs();
                if d.is_nan() {
                    return Err(FlowError::Config(format!(
                        "{} drew a NaN delay from its distribution",
                        self.core.name()
                    )));
                }
                Ok(d)
            }
            None => Ok(self.delay_time.get()),
        }
    }

    pub fn update(&self) -> FlowResult<()> {
        self.delay.drop_stale(&self.core);
        let now = OrderedFloat(self.delay.now());
        loop {
            let ripe = {
                let mut heap = self.heap.borrow_mut();
                match heap.peek() {
                    Some(p) if p.ripe <= now => heap.pop(),
                    _ => None,
                }
            };
            match ripe {
                Some(p) => self.delay.ripen(&self.core, p.resource)?,
                None => return Ok(()),
            }
        }
    }
}

impl Named for Delay {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for Delay {
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
        let d = self.next_delay()?;
        let Some(resource) = self.delay.admit(&mut offer, at_least, at_most, self.core.available())? else {
            return Ok(false);
        };
        let base = if self.cumulative.get() && !self.heap.borrow().is_empty() {
            self.last_ripe.get()
        } else {
            self.delay.now()
        };
        let ripe = base + d;
        self.last_ripe.set(ripe);
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.heap.borrow_mut().push(Pending { ripe: OrderedFloat(ripe), seq, resource });

        if self.delay.auto_schedules() && self.scheduled.borrow_mut().insert(OrderedFloat(ripe)) {
            if let Some(me) = self.me.upgrade() {
                self.delay.schedule().schedule_once(ripe, self.delay.reschedule_ordering(), me)?;
            }
        }
        Ok(true)
    }
}

impl Provider for Delay {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for Delay {
    fn step(&self) -> FlowResult<()> {
        // Wake-up times that have passed no longer need deduplicating.
        let now = OrderedFloat(self.delay.now());
        self.scheduled.borrow_mut().retain(|t| *t > now);
        self.update()?;
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
