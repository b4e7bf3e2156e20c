//! Unit tests for des-flow.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use des_core::{Entity, FlowResult, ModelConfig, Resource, ResourceKind};

use crate::protocol::check_offer;
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

mod aggregation;
mod cycles;
mod locks;

// ── Helpers ───────────────────────────────────────────────────────────────────

type Log = Rc<RefCell<Vec<String>>>;

fn model() -> Model {
    model_with_seed(42)
}

fn model_with_seed(seed: u64) -> Model {
    Model::new(ModelConfig::default().with_seed(seed)).expect("valid config")
}

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn entity(kind: &ResourceKind, info: f64) -> Entity {
    kind.entity().expect("entity kind").with_info(info)
}

/// A provider with a plain stock, filled by the test.
struct Depot {
    core: ProviderCore,
}

impl Depot {
    fn new(model: &Model, name: &str, kind: &ResourceKind) -> Rc<Self> {
        Rc::new(Depot { core: ProviderCore::new(model, name, kind.clone()).expect("depot") })
    }

    fn with_amount(model: &Model, name: &str, kind: &ResourceKind, amount: f64) -> Rc<Self> {
        let d = Self::new(model, name, kind);
        d.core.put(Resource::Countable(kind.amount(amount).expect("amount"))).expect("put");
        d
    }

    fn with_entities(model: &Model, name: &str, kind: &ResourceKind, infos: &[f64]) -> Rc<Self> {
        let d = Self::new(model, name, kind);
        for &i in infos {
            d.core.push_entity(entity(kind, i)).expect("push");
        }
        d
    }

    fn offer(&self) -> FlowResult<bool> {
        self.core.offer_receivers(self)
    }
}

impl Named for Depot {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Provider for Depot {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

/// A receiver that logs every offer it sees and takes up to `limit` per
/// offer, or refuses everything.
struct Taker {
    name:     String,
    kind:     ResourceKind,
    refuse:   Cell<bool>,
    limit:    Cell<f64>,
    total:    Cell<f64>,
    entities: RefCell<Vec<Entity>>,
    log:      Log,
}

impl Taker {
    fn new(name: &str, kind: &ResourceKind, log: &Log) -> Rc<Self> {
        Rc::new(Taker {
            name: name.to_owned(),
            kind: kind.clone(),
            refuse: Cell::new(false),
            limit: Cell::new(f64::INFINITY),
            total: Cell::new(0.0),
            entities: RefCell::new(Vec::new()),
            log: Rc::clone(log),
        })
    }

    fn refusing(name: &str, kind: &ResourceKind, log: &Log) -> Rc<Self> {
        let t = Self::new(name, kind, log);
        t.refuse.set(true);
        t
    }

    fn infos(&self) -> Vec<f64> {
        self.entities.borrow().iter().map(|e| e.info().unwrap_or(f64::NAN)).collect()
    }
}

impl Named for Taker {
    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Receiver for Taker {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.kind.clone())
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        check_offer(&self.kind, &offer, at_least, at_most)?;
        self.log.borrow_mut().push(self.name.clone());
        if self.refuse.get() {
            return Ok(false);
        }
        match &mut offer {
            Offer::Amount(r) => {
                let x = at_most.min(self.limit.get());
                if x < at_least {
                    return Ok(false);
                }
                let lot = r.reduce_exactly(x)?.expect("within bounds");
                self.total.set(self.total.get() + lot.amount());
            }
            Offer::Entity(slot) => {
                let e = slot.take().expect("entity on offer");
                self.total.set(self.total.get() + 1.0);
                self.entities.borrow_mut().push(e);
            }
        }
        Ok(true)
    }
}
