//! `RandomQueue`: entities offered in uniformly random order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use des_core::{Entity, FlowError, FlowResult, ResourceKind};
use des_schedule::Steppable;

use crate::provider::delegate_receivers;
use crate::queue::check_capacity;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

/// Each offer draws an entity uniformly with the queue's own RNG stream.
pub struct RandomQueue {
    core:               ProviderCore,
    entities:           RefCell<Vec<Entity>>,
    capacity:           Cell<f64>,
    offers_immediately: Cell<bool>,
    refuses:            Cell<bool>,
}

impl RandomQueue {
    pub fn new(model: &Model, name: &str, kind: ResourceKind) -> FlowResult<Rc<Self>> {
        if !kind.is_entity() {
            return Err(FlowError::Config(format!("random queues hold entities, not {kind}")));
        }
        Ok(Rc::new(RandomQueue {
            core: ProviderCore::new(model, name, kind)?,
            entities: RefCell::new(Vec::new()),
            capacity: Cell::new(f64::INFINITY),
            offers_immediately: Cell::new(true),
            refuses: Cell::new(false),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn set_capacity(&self, capacity: f64) -> FlowResult<()> {
        self.capacity.set(check_capacity(capacity)?);
        Ok(())
    }

    pub fn set_offers_immediately(&self, val: bool) {
        self.offers_immediately.set(val);
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses.set(val);
    }

    pub fn len(&self) -> usize {
        self.entities.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.borrow().is_empty()
    }

    /// Offer a random entity, via `offer`, and put it back where it was if
    /// not taken.
    fn offer_random(
        &self,
        offer: impl FnOnce(&mut Option<Entity>) -> FlowResult<bool>,
    ) -> FlowResult<bool> {
        let len = self.len();
        if len == 0 {
            return Ok(false);
        }
        let idx = self.core.with_rng(|rng| rng.below(len));
        let entity = self.entities.borrow_mut().swap_remove(idx);
        let mut slot = Some(entity);
        let result = offer(&mut slot);
        if let Some(entity) = slot {
            let mut entities = self.entities.borrow_mut();
            entities.push(entity);
            let last = entities.len() - 1;
            if idx < last {
                entities.swap(idx, last);
            }
        }
        result
    }

    pub fn offer_receivers(&self) -> FlowResult<bool> {
        if !self.core.makes_offers() {
            return Ok(false);
        }
        let mut any = false;
        while !self.is_empty() {
            let accepted = self
                .offer_random(|slot| self.core.offer_through(self, Offer::Entity(slot), 1.0, 1.0))?;
            any |= accepted;
            if !accepted || !self.core.offers_all_entities() {
                break;
            }
        }
        Ok(any)
    }
}

impl Named for RandomQueue {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for RandomQueue {
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
        if self.len() as f64 >= self.capacity.get() {
            return Ok(false);
        }
        let Some(entity) = offer.take_entity() else {
            return Ok(false);
        };
        self.entities.borrow_mut().push(entity);
        if self.offers_immediately.get() {
            self.offer_receivers()?;
        }
        Ok(true)
    }
}

impl Provider for RandomQueue {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        if at_most.is_nan() || at_most < 0.0 {
            return Err(FlowError::InvalidAmount(at_most));
        }
        if at_most < 1.0 {
            return Ok(false);
        }
        self.offer_random(|slot| {
            self.core.offer_through_to(self, receiver, Offer::Entity(slot), 1.0, 1.0)
        })
    }

    fn available(&self) -> f64 {
        self.len() as f64
    }
}

impl Steppable for RandomQueue {
    fn step(&self) -> FlowResult<()> {
        self.offer_receivers()?;
        Ok(())
    }
}
