//! `Composer`: gathers constituents into one composite entity.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use des_core::{CountableResource, Entity, FlowError, FlowResult, Resource, ResourceKind};
use des_schedule::Steppable;
use rustc_hash::FxHashMap;

use crate::protocol::check_bounds;
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver};

/// How much of one constituent kind a composite needs and may hold.
#[derive(Clone, Debug)]
pub struct Requirement {
    pub kind:    ResourceKind,
    pub minimum: f64,
    pub maximum: f64,
}

impl Requirement {
    pub fn new(kind: ResourceKind, minimum: f64, maximum: f64) -> Self {
        Self { kind, minimum, maximum }
    }

    fn validate(&self) -> FlowResult<()> {
        let (min, max) = (self.minimum, self.maximum);
        if min.is_nan() || max.is_nan() || min < 0.0 || max < min {
            return Err(FlowError::Config(format!(
                "{} has minimum {min} and maximum {max}",
                self.kind
            )));
        }
        if self.kind.is_entity() && (max.fract() != 0.0 || min.fract() != 0.0 || min < 1.0) {
            return Err(FlowError::Config(format!(
                "entity {} needs whole-number bounds of at least 1, got {min}..={max}",
                self.kind
            )));
        }
        Ok(())
    }
}

/// What has been gathered so far for one requirement.
enum Gathered {
    Amount(CountableResource),
    Entities(Vec<Entity>),
}

impl Gathered {
    fn total(&self) -> f64 {
        match self {
            Gathered::Amount(r) => r.amount(),
            Gathered::Entities(v) => v.len() as f64,
        }
    }
}

/// Accepts constituents up to each requirement's maximum.  As soon as every
/// minimum is met it builds a composite entity holding everything gathered,
/// resets and, if `offers_immediately`, offers the composite downstream.
pub struct Composer {
    core:               ProviderCore,
    requirements:       Vec<Requirement>,
    index:              FxHashMap<ResourceKind, usize>,
    gathered:           RefCell<Vec<Gathered>>,
    offers_immediately: Cell<bool>,
}

impl Composer {
    pub fn new(
        model: &Model,
        name: &str,
        output: ResourceKind,
        requirements: Vec<Requirement>,
    ) -> FlowResult<Rc<Self>> {
        if !output.is_entity() {
            return Err(FlowError::Config(format!("composer output {output} is not an entity kind")));
        }
        let mut index = FxHashMap::default();
        let mut gathered = Vec::with_capacity(requirements.len());
        for (i, req) in requirements.iter().enumerate() {
            req.validate()?;
            if index.insert(req.kind.clone(), i).is_some() {
                return Err(FlowError::Config(format!("{} is required twice", req.kind)));
            }
            gathered.push(if req.kind.is_entity() {
                Gathered::Entities(Vec::new())
            } else {
                Gathered::Amount(req.kind.zero()?)
            });
        }
        Ok(Rc::new(Composer {
            core: ProviderCore::new(model, name, output)?,
            requirements,
            index,
            gathered: RefCell::new(gathered),
            offers_immediately: Cell::new(true),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn offers_immediately(&self) -> bool {
        self.offers_immediately.get()
    }

    pub fn set_offers_immediately(&self, val: bool) {
        self.offers_immediately.set(val);
    }

    /// Amount (or entity count) gathered so far of `kind`.
    pub fn total(&self, kind: &ResourceKind) -> Option<f64> {
        let i = *self.index.get(kind)?;
        Some(self.gathered.borrow()[i].total())
    }

    fn slot(&self, kind: &ResourceKind) -> FlowResult<usize> {
        self.index.get(kind).copied().ok_or_else(|| {
            FlowError::Protocol(format!("{} does not compose {kind}", self.core.name()))
        })
    }

    /// Build a composite if every minimum is met.  Returns whether one was
    /// built.
    pub fn deploy(&self) -> FlowResult<bool> {
        let storage = {
            let mut gathered = self.gathered.borrow_mut();
            let ready = gathered
                .iter()
                .zip(&self.requirements)
                .all(|(g, req)| g.total() >= req.minimum);
            if !ready {
                return Ok(false);
            }
            let mut storage = Vec::new();
            for g in gathered.iter_mut() {
                match g {
                    Gathered::Amount(r) => {
                        storage.push(Resource::Countable(r.duplicate()));
                        r.clear();
                    }
                    Gathered::Entities(v) => storage.extend(v.drain(..).map(Resource::Entity)),
                }
            }
            storage
        };
        let composite = Entity::composite(self.core.typical().clone(), storage)?;
        log::trace!("{} composed {}", self.core.name(), composite.kind());
        self.core.push_entity(composite)?;
        Ok(true)
    }

    /// Claw back up to `amount` of `kind` gathered so far.  With `exactly`,
    /// nothing is returned unless the full amount is there.  Entities come
    /// back most recent first.
    pub fn rescind(&self, kind: &ResourceKind, amount: f64, exactly: bool) -> FlowResult<Vec<Resource>> {
        if !(amount >= 0.0) {
            return Err(FlowError::InvalidAmount(amount));
        }
        let i = self.slot(kind)?;
        let mut gathered = self.gathered.borrow_mut();
        match &mut gathered[i] {
            Gathered::Amount(r) => {
                if exactly && r.amount() < amount {
                    return Ok(Vec::new());
                }
                Ok(r.reduce(0.0, amount)?
                    .filter(CountableResource::is_positive)
                    .map(Resource::Countable)
                    .into_iter()
                    .collect())
            }
            Gathered::Entities(v) => {
                let n = amount.floor() as usize;
                if exactly && v.len() < n {
                    return Ok(Vec::new());
                }
                let keep = v.len().saturating_sub(n);
                Ok(v.drain(keep..).rev().map(Resource::Entity).collect())
            }
        }
    }

    /// Throw away the composites on hand and everything gathered.
    pub fn clear(&self) {
        self.core.clear();
        for g in self.gathered.borrow_mut().iter_mut() {
            match g {
                Gathered::Amount(r) => r.clear(),
                Gathered::Entities(v) => v.clear(),
            }
        }
    }
}

impl Named for Composer {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for Composer {
    /// Several kinds are accepted.
    fn typical_received(&self) -> Option<ResourceKind> {
        None
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        let Some(kind) = offer.kind().cloned() else {
            return Err(FlowError::Protocol("entity offer with an empty slot".into()));
        };
        check_bounds(at_least, at_most, offer.amount())?;
        if self.core.is_offering() {
            return Err(FlowError::CyclicOffer(self.core.name()));
        }
        let i = self.slot(&kind)?;
        let max = self.requirements[i].maximum;
        {
            let mut gathered = self.gathered.borrow_mut();
            match (&mut gathered[i], &mut offer) {
                (Gathered::Entities(v), Offer::Entity(slot)) => {
                    if (v.len() as f64) >= max {
                        return Ok(false);
                    }
                    if let Some(e) = slot.take() {
                        v.push(e);
                    }
                }
                (Gathered::Amount(total), Offer::Amount(r)) => {
                    let space = max - total.amount();
                    if space < at_least || space <= 0.0 {
                        return Ok(false);
                    }
                    match r.reduce(at_least, space.min(at_most))? {
                        Some(mut lot) if lot.is_positive() || at_least == 0.0 => total.add(&mut lot)?,
                        Some(mut lot) => {
                            r.add(&mut lot)?;
                            return Ok(false);
                        }
                        None => return Ok(false),
                    }
                }
                _ => return Err(FlowError::Protocol(format!("{kind} offered in the wrong form"))),
            }
        }
        if self.offers_immediately.get() && self.deploy()? {
            self.core.offer_receivers(self)?;
        }
        Ok(true)
    }
}

impl Provider for Composer {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for Composer {
    fn step(&self) -> FlowResult<()> {
        self.deploy()?;
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
