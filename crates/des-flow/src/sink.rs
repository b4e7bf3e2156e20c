//! `Sink`: accepts and destroys everything offered to it.

use std::cell::Cell;
use std::rc::Rc;

use des_core::{ComponentId, FlowResult, ResourceKind};

use crate::protocol::check_offer;
use crate::{Model, Named, Offer, Provider, Receiver};

/// The end of a flow.  Takes as much as it is allowed to and counts it.
pub struct Sink {
    id:             ComponentId,
    name:           String,
    typical:        ResourceKind,
    total_received: Cell<f64>,
    refuses_offers: Cell<bool>,
}

impl Sink {
    pub fn new(model: &Model, name: &str, kind: ResourceKind) -> Rc<Self> {
        let (id, _) = model.register_component();
        Rc::new(Sink {
            id,
            name: name.to_owned(),
            typical: kind,
            total_received: Cell::new(0.0),
            refuses_offers: Cell::new(false),
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Everything consumed so far.
    pub fn total_received(&self) -> f64 {
        self.total_received.get()
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses_offers.set(val);
    }

    pub fn refuses_offers(&self) -> bool {
        self.refuses_offers.get()
    }
}

impl Named for Sink {
    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Receiver for Sink {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.typical.clone())
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if self.refuses_offers.get() {
            return Ok(false);
        }
        check_offer(&self.typical, &offer, at_least, at_most)?;
        let taken = match &mut offer {
            Offer::Amount(r) => r.reduce(at_least, at_most)?.map_or(0.0, |lot| lot.amount()),
            Offer::Entity(slot) => slot.take().map_or(0.0, |_| 1.0),
        };
        if taken <= 0.0 && at_most > 0.0 {
            return Ok(false);
        }
        self.total_received.set(self.total_received.get() + taken);
        Ok(true)
    }
}
