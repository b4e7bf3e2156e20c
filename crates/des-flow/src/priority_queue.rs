//! `PriorityQueue`: entities offered lowest key first.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use des_core::{Entity, FlowError, FlowResult, ResourceKind};
use des_schedule::Steppable;
use ordered_float::OrderedFloat;

use crate::provider::delegate_receivers;
use crate::queue::check_capacity;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

/// Computes the priority of an entity.  Lower goes first.
pub type KeyFn = Box<dyn Fn(&Entity) -> f64>;

struct Keyed {
    key:    OrderedFloat<f64>,
    seq:    u64,
    entity: Entity,
}

impl Keyed {
    fn order(&self) -> (OrderedFloat<f64>, u64) {
        (self.key, self.seq)
    }
}

impl PartialEq for Keyed {
    fn eq(&self, other: &Self) -> bool {
        self.order() == other.order()
    }
}

impl Eq for Keyed {}

impl PartialOrd for Keyed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Keyed {
    // Reversed: `BinaryHeap` is a max-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other.order().cmp(&self.order())
    }
}

/// An entity queue ordered by key, FIFO among equal keys.  The default key
/// is the entity's `info`, or 0.
pub struct PriorityQueue {
    core:               ProviderCore,
    heap:               RefCell<BinaryHeap<Keyed>>,
    key_fn:             KeyFn,
    seq:                Cell<u64>,
    capacity:           Cell<f64>,
    offers_immediately: Cell<bool>,
    refuses:            Cell<bool>,
}

impl PriorityQueue {
    pub fn new(model: &Model, name: &str, kind: ResourceKind) -> FlowResult<Rc<Self>> {
        Self::with_key(model, name, kind, Box::new(|e: &Entity| e.info().unwrap_or(0.0)))
    }

    pub fn with_key(model: &Model, name: &str, kind: ResourceKind, key_fn: KeyFn) -> FlowResult<Rc<Self>> {
        if !kind.is_entity() {
            return Err(FlowError::Config(format!("priority queues hold entities, not {kind}")));
        }
        Ok(Rc::new(PriorityQueue {
            core: ProviderCore::new(model, name, kind)?,
            heap: RefCell::new(BinaryHeap::new()),
            key_fn,
            seq: Cell::new(0),
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
        self.heap.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.borrow().is_empty()
    }

    /// Key of the entity that would be offered next.
    pub fn peek_key(&self) -> Option<f64> {
        self.heap.borrow().peek().map(|k| k.key.0)
    }

    fn push(&self, entity: Entity) {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        let key = OrderedFloat((self.key_fn)(&entity));
        self.heap.borrow_mut().push(Keyed { key, seq, entity });
    }

    /// Offer the head entity, via `offer`, and put it back if not taken.
    fn offer_head(
        &self,
        offer: impl FnOnce(&mut Option<Entity>) -> FlowResult<bool>,
    ) -> FlowResult<bool> {
        let Some(Keyed { key, seq, entity }) = self.heap.borrow_mut().pop() else {
            return Ok(false);
        };
        let mut slot = Some(entity);
        let result = offer(&mut slot);
        if let Some(entity) = slot {
            self.heap.borrow_mut().push(Keyed { key, seq, entity });
        }
        result
    }

    pub fn offer_receivers(&self) -> FlowResult<bool> {
        if !self.core.makes_offers() {
            return Ok(false);
        }
        let mut any = false;
        while !self.is_empty() {
            let accepted =
                self.offer_head(|slot| self.core.offer_through(self, Offer::Entity(slot), 1.0, 1.0))?;
            any |= accepted;
            if !accepted || !self.core.offers_all_entities() {
                break;
            }
        }
        Ok(any)
    }
}

impl Named for PriorityQueue {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for PriorityQueue {
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
        self.push(entity);
        if self.offers_immediately.get() {
            self.offer_receivers()?;
        }
        Ok(true)
    }
}

impl Provider for PriorityQueue {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        if at_most.is_nan() || at_most < 0.0 {
            return Err(FlowError::InvalidAmount(at_most));
        }
        if at_most < 1.0 {
            return Ok(false);
        }
        self.offer_head(|slot| {
            self.core.offer_through_to(self, receiver, Offer::Entity(slot), 1.0, 1.0)
        })
    }

    fn available(&self) -> f64 {
        self.len() as f64
    }
}

impl Steppable for PriorityQueue {
    fn step(&self) -> FlowResult<()> {
        self.offer_receivers()?;
        Ok(())
    }
}
