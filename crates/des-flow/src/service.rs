//! `Service`: a lock, a fixed delay and an unlock wired on one pool.

use std::rc::Rc;

use des_core::{FlowResult, ResourceKind};

use crate::{
    Lock, Model, Named, Offer, Pool, Provider, Receiver, SimpleDelay, Unlock,
};

/// Admits an item only while the pool has capacity, holds it for
/// `delay_time`, then frees the capacity as the item leaves.  Everything
/// ripe is offered on at once.
///
/// Offers go in through the lock side and come out of the unlock side.
/// Nothing is partnered by default: freed capacity is picked up the next
/// time upstream offers.
pub struct Service {
    name:   String,
    lock:   Rc<Lock>,
    delay:  Rc<SimpleDelay>,
    unlock: Rc<Unlock>,
}

impl Service {
    pub fn new(
        model: &Model,
        name: &str,
        kind: ResourceKind,
        pool: Rc<Pool>,
        amount: f64,
        delay_time: f64,
    ) -> FlowResult<Rc<Self>> {
        let lock = Lock::new(model, &format!("{name}/lock"), kind.clone(), pool, amount)?;
        let delay = SimpleDelay::new(model, &format!("{name}/delay"), kind, delay_time)?;
        let unlock = Unlock::from_lock(model, &format!("{name}/unlock"), &lock)?;
        delay.provider().set_offers_all_entities(true);
        lock.add_receiver(delay.clone())?;
        delay.add_receiver(unlock.clone())?;
        Ok(Rc::new(Service { name: name.to_owned(), lock, delay, unlock }))
    }

    pub fn lock(&self) -> &Rc<Lock> {
        &self.lock
    }

    pub fn delay(&self) -> &Rc<SimpleDelay> {
        &self.delay
    }

    pub fn unlock(&self) -> &Rc<Unlock> {
        &self.unlock
    }
}

impl Named for Service {
    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Receiver for Service {
    fn typical_received(&self) -> Option<ResourceKind> {
        self.lock.typical_received()
    }

    fn accept(
        &self,
        provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        self.lock.accept(provider, offer, at_least, at_most)
    }
}

impl Provider for Service {
    fn typical_provided(&self) -> Option<ResourceKind> {
        self.unlock.typical_provided()
    }

    fn add_receiver(&self, receiver: Rc<dyn Receiver>) -> FlowResult<bool> {
        self.unlock.add_receiver(receiver)
    }

    fn remove_receiver(&self, receiver: &dyn Receiver) -> bool {
        self.unlock.remove_receiver(receiver)
    }

    fn provide(&self, _receiver: &dyn Receiver, _at_most: f64) -> FlowResult<bool> {
        Ok(false)
    }

    fn available(&self) -> f64 {
        0.0
    }
}
