//! Delay mechanisms: hold each accepted resource for some time, then make it
//! available downstream.
//!
//! | Type             | Pending store                   | Delay per item                  |
//! |------------------|---------------------------------|---------------------------------|
//! | [`SimpleDelay`]  | FIFO list                       | one fixed delay                 |
//! | [`Delay`]        | min-heap on (ripe time, seq)    | fixed or sampled, cumulative    |
//! | [`BoundedDelay`] | calendar queue of `max+1` slots | integer ticks in `0..=max`      |
//!
//! All three share [`DelayCore`]: capacity, running totals and the
//! drop-before-update rule.

pub mod bounded;
pub mod heap;
pub mod simple;

pub use bounded::{BoundedDelay, MAX_DELAY_TRIES};
pub use heap::Delay;
pub use simple::SimpleDelay;

use std::cell::Cell;
use std::rc::Rc;

use des_core::{FlowError, FlowResult, Resource};
use des_schedule::Schedule;

use crate::{Offer, ProviderCore};

/// Bookkeeping shared by every delay.
pub struct DelayCore {
    schedule:            Rc<dyn Schedule>,
    capacity:            Cell<f64>,
    total_delayed:       Cell<f64>,
    total_received:      Cell<f64>,
    total_dropped:       Cell<f64>,
    drops_before_update: Cell<bool>,
    includes_available:  Cell<bool>,
    auto_schedules:      Cell<bool>,
    ordering:            Cell<i32>,
    refuses_offers:      Cell<bool>,
}

impl DelayCore {
    pub(crate) fn new(schedule: Rc<dyn Schedule>) -> Self {
        Self {
            schedule,
            capacity: Cell::new(f64::INFINITY),
            total_delayed: Cell::new(0.0),
            total_received: Cell::new(0.0),
            total_dropped: Cell::new(0.0),
            drops_before_update: Cell::new(true),
            includes_available: Cell::new(false),
            auto_schedules: Cell::new(true),
            ordering: Cell::new(0),
            refuses_offers: Cell::new(false),
        }
    }

    pub fn schedule(&self) -> &Rc<dyn Schedule> {
        &self.schedule
    }

    pub fn now(&self) -> f64 {
        self.schedule.time()
    }

    pub fn capacity(&self) -> f64 {
        self.capacity.get()
    }

    pub fn set_capacity(&self, capacity: f64) -> FlowResult<()> {
        if !(capacity >= 0.0) {
            return Err(FlowError::Config(format!(
                "delay capacity may not be negative or NaN, was {capacity}"
            )));
        }
        self.capacity.set(capacity);
        Ok(())
    }

    /// Amount currently in transit.
    pub fn total_delayed(&self) -> f64 {
        self.total_delayed.get()
    }

    pub fn total_received(&self) -> f64 {
        self.total_received.get()
    }

    pub fn total_dropped(&self) -> f64 {
        self.total_dropped.get()
    }

    /// Whether ripe stock nobody took is discarded on the next update.
    pub fn drops_resources_before_update(&self) -> bool {
        self.drops_before_update.get()
    }

    pub fn set_drops_resources_before_update(&self, val: bool) {
        self.drops_before_update.set(val);
    }

    /// Whether ripe stock counts against capacity.
    pub fn includes_available_in_total(&self) -> bool {
        self.includes_available.get()
    }

    pub fn set_includes_available_in_total(&self, val: bool) {
        self.includes_available.set(val);
    }

    pub fn auto_schedules(&self) -> bool {
        self.auto_schedules.get()
    }

    pub fn set_auto_schedules(&self, val: bool) {
        self.auto_schedules.set(val);
    }

    pub fn reschedule_ordering(&self) -> i32 {
        self.ordering.get()
    }

    pub fn set_reschedule_ordering(&self, ordering: i32) {
        self.ordering.set(ordering);
    }

    pub fn refuses_offers(&self) -> bool {
        self.refuses_offers.get()
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses_offers.set(val);
    }

    // ── Flow ──────────────────────────────────────────────────────────────

    fn headroom(&self, available: f64) -> f64 {
        let held = if self.includes_available.get() { available } else { 0.0 };
        self.capacity.get() - self.total_delayed.get() - held
    }

    /// Take as much of `offer` as capacity allows, or nothing if that is
    /// below `at_least`.
    pub(crate) fn admit(
        &self,
        offer: &mut Offer<'_>,
        at_least: f64,
        at_most: f64,
        available: f64,
    ) -> FlowResult<Option<Resource>> {
        let headroom = self.headroom(available);
        let taken = match offer {
            Offer::Amount(r) => {
                let mut x = headroom.min(at_most).min(r.amount());
                if r.is_integral() {
                    x = x.floor();
                }
                if x < at_least || x <= 0.0 {
                    return Ok(None);
                }
                r.reduce_exactly(x)?.map(Resource::Countable)
            }
            Offer::Entity(slot) => {
                if headroom < 1.0 {
                    return Ok(None);
                }
                slot.take().map(Resource::Entity)
            }
        };
        if let Some(res) = &taken {
            let amount = res.amount();
            self.total_delayed.set(self.total_delayed.get() + amount);
            self.total_received.set(self.total_received.get() + amount);
        }
        Ok(taken)
    }

    /// Move a ripe resource into the provider's stock.
    pub(crate) fn ripen(&self, core: &ProviderCore, resource: Resource) -> FlowResult<()> {
        self.total_delayed.set(self.total_delayed.get() - resource.amount());
        core.put(resource)
    }

    /// Discard ripe stock if configured to.
    pub(crate) fn drop_stale(&self, core: &ProviderCore) {
        if self.drops_before_update.get() {
            self.discard_stock(core);
        }
    }

    pub(crate) fn discard_stock(&self, core: &ProviderCore) {
        let dropped = core.clear();
        if dropped > 0.0 {
            log::debug!("{} dropped {dropped} unclaimed", core.name());
            self.total_dropped.set(self.total_dropped.get() + dropped);
        }
    }

    /// Account for in-transit resources thrown away.
    pub(crate) fn discard_pending(&self, amount: f64) {
        if amount > 0.0 {
            self.total_delayed.set(self.total_delayed.get() - amount);
            self.total_dropped.set(self.total_dropped.get() + amount);
        }
    }
}

/// Receiver-side prologue shared by the delays.  `Ok(false)` means refuse.
pub(crate) fn check_accept(
    core: &ProviderCore,
    delay: &DelayCore,
    offer: &Offer<'_>,
    at_least: f64,
    at_most: f64,
) -> FlowResult<bool> {
    if delay.refuses_offers() {
        return Ok(false);
    }
    core.check_incoming(offer, at_least, at_most)?;
    Ok(true)
}

/// A configuration error for a bad delay time.
pub(crate) fn invalid_delay(delay: f64) -> FlowError {
    FlowError::Config(format!("delay times may not be negative or NaN, was {delay}"))
}
