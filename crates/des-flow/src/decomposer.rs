//! `Decomposer`: splits a composite entity back into its constituents.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use des_core::{ComponentId, Entity, FlowError, FlowResult, Resource, ResourceKind};
use rustc_hash::FxHashMap;

use crate::protocol::{check_offer, same_receiver, verify_taken};
use crate::{Model, Named, Offer, Provider, Receiver, Reentry};

/// Receives composites and offers each constituent, take-it-or-leave-it, to
/// the one receiver registered for its kind.
///
/// Constituents without a route, or refused by their route, are dropped.
/// If nothing at all is taken the composite is put back together and left
/// with whoever offered it.
pub struct Decomposer {
    id:            ComponentId,
    name:          String,
    composite:     ResourceKind,
    routes:        RefCell<FxHashMap<ResourceKind, Rc<dyn Receiver>>>,
    guard:         Reentry,
    refuses:       Cell<bool>,
    total_dropped: Cell<f64>,
}

impl Decomposer {
    pub fn new(model: &Model, name: &str, composite: ResourceKind) -> FlowResult<Rc<Self>> {
        if !composite.is_entity() {
            return Err(FlowError::Config(format!("decomposer input {composite} is not an entity kind")));
        }
        let (id, _) = model.register_component();
        Ok(Rc::new(Decomposer {
            id,
            name: name.to_owned(),
            composite,
            routes: RefCell::new(FxHashMap::default()),
            guard: Reentry::new(),
            refuses: Cell::new(false),
            total_dropped: Cell::new(0.0),
        }))
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses.set(val);
    }

    /// Amount of constituents thrown away so far.
    pub fn total_dropped(&self) -> f64 {
        self.total_dropped.get()
    }

    pub fn route(&self, kind: &ResourceKind) -> Option<Rc<dyn Receiver>> {
        self.routes.borrow().get(kind).cloned()
    }

    /// Offer one constituent to its route.  Returns whether it was taken;
    /// a refused constituent, or whatever is left of it after an error,
    /// stays in place.
    fn pass_on(&self, constituent: &mut Option<Resource>) -> FlowResult<bool> {
        let Some(route) = constituent.as_ref().and_then(|r| self.route(r.kind())) else {
            return Ok(false);
        };
        match constituent.take() {
            Some(Resource::Countable(mut c)) => {
                let amount = c.amount();
                let result = if amount > 0.0 {
                    route.accept(self, Offer::Amount(&mut c), amount, amount)
                } else {
                    Ok(false)
                };
                let taken = amount - c.amount();
                let outcome = result.and_then(|accepted| {
                    verify_taken(&*route, accepted, taken, amount, amount).map(|()| accepted)
                });
                if !matches!(outcome, Ok(true)) {
                    *constituent = Some(Resource::Countable(c));
                }
                outcome
            }
            Some(Resource::Entity(e)) => {
                let mut slot = Some(e);
                let result = route.accept(self, Offer::Entity(&mut slot), 1.0, 1.0);
                let taken = if slot.is_none() { 1.0 } else { 0.0 };
                *constituent = slot.map(Resource::Entity);
                result.and_then(|accepted| {
                    verify_taken(&*route, accepted, taken, 1.0, 1.0).map(|()| accepted)
                })
            }
            None => Ok(false),
        }
    }
}

impl Named for Decomposer {
    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Receiver for Decomposer {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.composite.clone())
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if self.refuses.get() {
            return Ok(false);
        }
        check_offer(&self.composite, &offer, at_least, at_most)?;
        if self.guard.is_active() {
            return Err(FlowError::CyclicOffer(self.name.clone()));
        }
        let Offer::Entity(slot) = offer else {
            return Err(FlowError::Protocol(format!("{} only takes entities", self.name)));
        };
        let storage = match slot.as_mut().map(Entity::take_storage) {
            Some(Some(storage)) => storage,
            _ => {
                return Err(FlowError::Protocol(format!(
                    "{} was offered an entity that is not composite",
                    self.name
                )));
            }
        };

        let _token = self.guard.enter(|| FlowError::CyclicOffer(self.name.clone()))?;
        let mut parts: Vec<Option<Resource>> = storage.into_iter().map(Some).collect();
        let mut any = false;
        let mut failed = None;
        for part in parts.iter_mut() {
            match self.pass_on(part) {
                Ok(taken) => any |= taken,
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failed {
            // What was not handed over goes back into the composite.
            if let Some(entity) = slot.as_mut() {
                entity.set_storage(Some(parts.into_iter().flatten().collect()));
            }
            return Err(e);
        }

        if !any {
            if let Some(entity) = slot.as_mut() {
                entity.set_storage(Some(parts.into_iter().flatten().collect()));
            }
            return Ok(false);
        }
        let dropped: f64 = parts.iter().flatten().map(Resource::amount).sum();
        if dropped > 0.0 {
            log::debug!("{} dropped {dropped} unrouted or refused", self.name);
            self.total_dropped.set(self.total_dropped.get() + dropped);
        }
        slot.take();
        Ok(true)
    }
}

impl Provider for Decomposer {
    /// Several kinds are provided.
    fn typical_provided(&self) -> Option<ResourceKind> {
        None
    }

    /// Route constituents of the receiver's kind to it.  Each kind has at
    /// most one route.
    fn add_receiver(&self, receiver: Rc<dyn Receiver>) -> FlowResult<bool> {
        let Some(kind) = receiver.typical_received() else {
            return Err(FlowError::Config(format!(
                "{} needs receivers of a single kind",
                self.name
            )));
        };
        let mut routes = self.routes.borrow_mut();
        if let Some(existing) = routes.get(&kind) {
            if same_receiver(&**existing, &*receiver) {
                return Ok(false);
            }
            return Err(FlowError::Config(format!("{} already routes {kind}", self.name)));
        }
        routes.insert(kind, receiver);
        Ok(true)
    }

    fn remove_receiver(&self, receiver: &dyn Receiver) -> bool {
        let mut routes = self.routes.borrow_mut();
        let before = routes.len();
        routes.retain(|_, r| !same_receiver(&**r, receiver));
        routes.len() != before
    }

    fn provide(&self, _receiver: &dyn Receiver, _at_most: f64) -> FlowResult<bool> {
        Ok(false)
    }

    fn available(&self) -> f64 {
        0.0
    }
}
