//! `Middleman`: trades one kind for another in a single synchronous call.

use std::cell::RefCell;
use std::rc::Rc;

use des_core::{CountableResource, Entity, FlowError, FlowResult, Resource, ResourceKind};
use des_schedule::Steppable;

use crate::protocol::check_bounds;
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver, Transactor};

// ── Exchange ──────────────────────────────────────────────────────────────────

/// The price of a trade: how much output a given input buys, and back.
pub trait Exchange {
    fn output_for(&self, input: f64) -> f64;
    fn input_for(&self, output: f64) -> f64;
}

/// Output proportional to input: `ratio_in` of input buys `ratio_out` of
/// output.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Proportional {
    ratio_in:  f64,
    ratio_out: f64,
}

impl Proportional {
    pub fn new(ratio_in: f64, ratio_out: f64) -> FlowResult<Self> {
        let ok = |x: f64| x.is_finite() && x > 0.0;
        if !ok(ratio_in) || !ok(ratio_out) {
            return Err(FlowError::Config(format!(
                "exchange ratio {ratio_in}:{ratio_out} must be positive and finite"
            )));
        }
        Ok(Self { ratio_in, ratio_out })
    }

    /// One for one.
    pub fn even() -> Self {
        Self { ratio_in: 1.0, ratio_out: 1.0 }
    }
}

impl Exchange for Proportional {
    fn output_for(&self, input: f64) -> f64 {
        input * self.ratio_out / self.ratio_in
    }

    fn input_for(&self, output: f64) -> f64 {
        output * self.ratio_in / self.ratio_out
    }
}

// ── Middleman ─────────────────────────────────────────────────────────────────

/// Input retained from trades and offers.
enum Holdings {
    Amount(CountableResource),
    Entities(Vec<Entity>),
}

/// A receiver of its input kind, a provider of its output kind, and a
/// [`Transactor`] that swaps one for the other at the [`Exchange`] price.
///
/// Everything received, by offer or by trade, is kept as holdings.  Output
/// comes out of the provider stock, which the model fills with
/// [`add_output`](Self::add_output).
pub struct Middleman {
    core:     ProviderCore,
    input:    ResourceKind,
    holdings: RefCell<Holdings>,
    exchange: Box<dyn Exchange>,
}

impl Middleman {
    pub fn new(
        model: &Model,
        name: &str,
        input: ResourceKind,
        output: ResourceKind,
        exchange: Box<dyn Exchange>,
    ) -> FlowResult<Rc<Self>> {
        let holdings = if input.is_entity() {
            Holdings::Entities(Vec::new())
        } else {
            Holdings::Amount(input.zero()?)
        };
        Ok(Rc::new(Middleman {
            core: ProviderCore::new(model, name, output)?,
            input,
            holdings: RefCell::new(holdings),
            exchange,
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn input_kind(&self) -> &ResourceKind {
        &self.input
    }

    /// Stock up on output.
    pub fn add_output(&self, resource: Resource) -> FlowResult<()> {
        self.core.put(resource)
    }

    /// Amount (or entity count) of input held.
    pub fn holdings(&self) -> f64 {
        match &*self.holdings.borrow() {
            Holdings::Amount(r) => r.amount(),
            Holdings::Entities(v) => v.len() as f64,
        }
    }

    /// Hand over everything held.
    pub fn take_holdings(&self) -> Vec<Resource> {
        match &mut *self.holdings.borrow_mut() {
            Holdings::Amount(r) if r.is_positive() => {
                let all = r.duplicate();
                r.clear();
                vec![Resource::Countable(all)]
            }
            Holdings::Amount(_) => Vec::new(),
            Holdings::Entities(v) => v.drain(..).map(Resource::Entity).collect(),
        }
    }

    fn hold(&self, resource: Resource) -> FlowResult<()> {
        match (&mut *self.holdings.borrow_mut(), resource) {
            (Holdings::Amount(h), Resource::Countable(mut c)) => h.add(&mut c),
            (Holdings::Entities(v), Resource::Entity(e)) => {
                v.push(e);
                Ok(())
            }
            (_, other) => Err(FlowError::TypeMismatch {
                expected: self.input.id(),
                got:      other.kind().id(),
            }),
        }
    }

    /// Take `x` of the provided offer.
    fn take_input(offer: &mut Offer<'_>, x: f64) -> FlowResult<Option<Resource>> {
        Ok(match offer {
            Offer::Amount(r) => r.reduce_exactly(x)?.map(Resource::Countable),
            Offer::Entity(slot) => slot.take().map(Resource::Entity),
        })
    }

    fn quote(
        &self,
        offered: f64,
        at_least: f64,
        at_most: f64,
        at_least_requested: f64,
    ) -> Option<(f64, f64)> {
        let output = self.core.typical();
        let stock = self.core.available();
        if output.is_entity() {
            if stock < 1.0 || at_least_requested > 1.0 {
                return None;
            }
            let mut need = self.exchange.input_for(1.0);
            if self.input.is_integral() {
                need = need.ceil();
            }
            let fits = need >= at_least && need <= at_most && need <= offered && need > 0.0;
            return fits.then_some((need, 1.0));
        }
        let mut x = at_most.min(self.exchange.input_for(stock));
        if self.input.is_integral() {
            x = x.floor();
        }
        if x < at_least || x <= 0.0 {
            return None;
        }
        let mut out = self.exchange.output_for(x).min(stock);
        if output.is_integral() {
            out = out.floor();
        }
        if out < at_least_requested || out <= 0.0 {
            return None;
        }
        Some((x, out))
    }
}

impl Named for Middleman {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Transactor for Middleman {
    fn transact(
        &self,
        mut provided: Offer<'_>,
        at_least: f64,
        at_most: f64,
        requested: &ResourceKind,
        at_least_requested: f64,
    ) -> FlowResult<Option<Resource>> {
        let _token = self
            .core
            .guard()
            .enter(|| FlowError::CyclicTransaction(self.core.name()))?;
        let Some(kind) = provided.kind() else {
            return Err(FlowError::Protocol("transaction with an empty entity slot".into()));
        };
        self.input.check_same(kind)?;
        self.core.typical().check_same(requested)?;
        check_bounds(at_least, at_most, provided.amount())?;

        let Some((x, out)) = self.quote(provided.amount(), at_least, at_most, at_least_requested) else {
            return Ok(None);
        };
        let returned = if requested.is_entity() {
            self.core.take_entity().map(Resource::Entity)
        } else {
            self.core.take_amount(out)?.map(Resource::Countable)
        };
        let Some(returned) = returned else {
            return Ok(None);
        };
        match Self::take_input(&mut provided, x)? {
            Some(input) => self.hold(input)?,
            None => {
                self.core.put(returned)?;
                return Ok(None);
            }
        }
        log::trace!("{} traded {x} {} for {out} {}", self.core.name(), self.input, requested);
        Ok(Some(returned))
    }
}

impl Receiver for Middleman {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.input.clone())
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        crate::protocol::check_offer(&self.input, &offer, at_least, at_most)?;
        if self.core.is_offering() {
            return Err(FlowError::CyclicOffer(self.core.name()));
        }
        match Self::take_input(&mut offer, at_most)? {
            Some(input) => {
                self.hold(input)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Provider for Middleman {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for Middleman {
    fn step(&self) -> FlowResult<()> {
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
