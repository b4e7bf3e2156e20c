use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use des_core::{FlowResult, Resource, ResourceKind};
use des_schedule::Steppable;

use super::{DelayCore, check_accept, invalid_delay};
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

/// Holds every accepted resource for the same fixed time.
///
/// Because the delay is constant, items ripen in arrival order and a plain
/// FIFO list is enough.
pub struct SimpleDelay {
    core:           ProviderCore,
    delay:          DelayCore,
    me:             Weak<SimpleDelay>,
    delay_time:     Cell<f64>,
    pending:        RefCell<VecDeque<(f64, Resource)>>,
    last_scheduled: Cell<f64>,
}

impl SimpleDelay {
    pub fn new(model: &Model, name: &str, kind: ResourceKind, delay_time: f64) -> FlowResult<Rc<Self>> {
        if !(delay_time >= 0.0) {
            return Err(invalid_delay(delay_time));
        }
        let core = ProviderCore::new(model, name, kind)?;
        Ok(Rc::new_cyclic(|me| SimpleDelay {
            core,
            delay: DelayCore::new(model.schedule()),
            me: me.clone(),
            delay_time: Cell::new(delay_time),
            pending: RefCell::new(VecDeque::new()),
            last_scheduled: Cell::new(f64::NEG_INFINITY),
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

    /// Change the delay.  Everything in transit is discarded.
    pub fn set_delay_time(&self, delay_time: f64) -> FlowResult<()> {
        if !(delay_time >= 0.0) {
            return Err(invalid_delay(delay_time));
        }
        self.delay_time.set(delay_time);
        self.clear_pending();
        Ok(())
    }

    /// Number of items in transit.
    pub fn size(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Ripe times and duplicates of the items in transit.
    pub fn delayed(&self) -> Vec<(f64, Resource)> {
        self.pending.borrow().iter().map(|(t, r)| (*t, r.duplicate())).collect()
    }

    fn clear_pending(&self) {
        let amount: f64 = self.pending.borrow_mut().drain(..).map(|(_, r)| r.amount()).sum();
        self.delay.discard_pending(amount);
        self.last_scheduled.set(f64::NEG_INFINITY);
    }

    /// Throw away both the stock and everything in transit.
    pub fn clear(&self) {
        self.delay.discard_stock(&self.core);
        self.clear_pending();
    }

    /// Drop stale stock, then move ripe items into stock.
    pub fn update(&self) -> FlowResult<()> {
        self.delay.drop_stale(&self.core);
        let now = self.delay.now();
        loop {
            let ripe = {
                let mut pending = self.pending.borrow_mut();
                match pending.front() {
                    Some((t, _)) if *t <= now => pending.pop_front(),
                    _ => None,
                }
            };
            match ripe {
                Some((_, res)) => self.delay.ripen(&self.core, res)?,
                None => return Ok(()),
            }
        }
    }
}

impl Named for SimpleDelay {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for SimpleDelay {
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
        let Some(res) = self.delay.admit(&mut offer, at_least, at_most, self.core.available())? else {
            return Ok(false);
        };
        let ripe = self.delay.now() + self.delay_time.get();
        self.pending.borrow_mut().push_back((ripe, res));
        if self.delay.auto_schedules() && ripe > self.last_scheduled.get() {
            if let Some(me) = self.me.upgrade() {
                self.delay.schedule().schedule_once(ripe, self.delay.reschedule_ordering(), me)?;
                self.last_scheduled.set(ripe);
            }
        }
        Ok(true)
    }
}

impl Provider for SimpleDelay {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for SimpleDelay {
    fn step(&self) -> FlowResult<()> {
        self.update()?;
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
