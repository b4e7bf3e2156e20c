//! `Queue`: capacity-bounded buffering between a provider and its
//! receivers.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use des_core::{FlowError, FlowResult, ResourceKind};
use des_schedule::Steppable;

use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver, Reentry};

/// Shared capacity check for the queue variants.
pub(crate) fn check_capacity(capacity: f64) -> FlowResult<f64> {
    if capacity >= 0.0 {
        Ok(capacity)
    } else {
        Err(FlowError::Config(format!("queue capacity may not be negative or NaN, was {capacity}")))
    }
}

/// Stores what it accepts, up to `capacity`, and offers it on.
///
/// With `offers_immediately` every acceptance is followed by an offer round.
/// When asked to offer or provide while empty, the queue first pulls from
/// the upstream providers registered with [`add_provider`](Self::add_provider).
pub struct Queue {
    core:               ProviderCore,
    capacity:           Cell<f64>,
    offers_immediately: Cell<bool>,
    providers:          RefCell<Vec<Weak<dyn Provider>>>,
    pulling:            Reentry,
    refuses:            Cell<bool>,
}

impl Queue {
    pub fn new(model: &Model, name: &str, kind: ResourceKind) -> FlowResult<Rc<Self>> {
        Ok(Rc::new(Queue {
            core: ProviderCore::new(model, name, kind)?,
            capacity: Cell::new(f64::INFINITY),
            offers_immediately: Cell::new(true),
            providers: RefCell::new(Vec::new()),
            pulling: Reentry::new(),
            refuses: Cell::new(false),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn capacity(&self) -> f64 {
        self.capacity.get()
    }

    pub fn set_capacity(&self, capacity: f64) -> FlowResult<()> {
        self.capacity.set(check_capacity(capacity)?);
        Ok(())
    }

    pub fn offers_immediately(&self) -> bool {
        self.offers_immediately.get()
    }

    pub fn set_offers_immediately(&self, val: bool) {
        self.offers_immediately.set(val);
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses.set(val);
    }

    pub fn add_provider<P: Provider + 'static>(&self, provider: &Rc<P>) {
        let weak: Weak<dyn Provider> = Rc::downgrade(provider) as Weak<dyn Provider>;
        self.providers.borrow_mut().push(weak);
    }

    fn headroom(&self) -> f64 {
        self.capacity.get() - self.core.available()
    }

    /// Ask upstream for stock, stopping at the first provider that offers.
    fn pull_if_empty(&self) -> FlowResult<()> {
        if self.core.available() > 0.0 || self.pulling.is_active() {
            return Ok(());
        }
        let providers: Vec<Rc<dyn Provider>> =
            self.providers.borrow().iter().filter_map(Weak::upgrade).collect();
        if providers.is_empty() {
            return Ok(());
        }
        let _token = self.pulling.enter(|| FlowError::CyclicOffer(self.core.name()))?;
        for p in providers {
            let room = self.headroom();
            if room <= 0.0 || p.provide(self, room)? {
                break;
            }
        }
        Ok(())
    }

    /// Offer the stock to the receivers, pulling from upstream first if empty.
    pub fn offer_receivers(&self) -> FlowResult<bool> {
        self.pull_if_empty()?;
        self.core.offer_receivers(self)
    }
}

impl Named for Queue {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for Queue {
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
        if self.refuses.get() {
            return Ok(false);
        }
        self.core.check_incoming(&offer, at_least, at_most)?;
        let room = self.headroom();
        match &mut offer {
            Offer::Amount(r) => {
                let mut x = room.min(at_most);
                if r.is_integral() {
                    x = x.floor();
                }
                if x < at_least || x <= 0.0 {
                    return Ok(false);
                }
                let Some(mut lot) = r.reduce_exactly(x)? else {
                    return Ok(false);
                };
                self.core.add_amount(&mut lot)?;
            }
            Offer::Entity(slot) => {
                if room < 1.0 {
                    return Ok(false);
                }
                if let Some(e) = slot.take() {
                    self.core.push_entity(e)?;
                }
            }
        }
        if self.offers_immediately.get() && !self.pulling.is_active() {
            self.core.offer_receivers(self)?;
        }
        Ok(true)
    }
}

impl Provider for Queue {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.pull_if_empty()?;
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for Queue {
    fn step(&self) -> FlowResult<()> {
        self.offer_receivers()?;
        Ok(())
    }
}
