//! `Extractor`: pulls stock out of upstream providers on a fixed schedule.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use des_core::{DiscreteSampler, FlowError, FlowResult, ResourceKind};
use des_schedule::{Schedule, Steppable};

use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver, Reentry};

/// Which upstream providers an extractor asks, and in what order.
#[derive(Default)]
pub enum RequestPolicy {
    #[default]
    Forward,
    Backward,
    Shuffle,
    /// Exactly one provider; `None` picks uniformly.  A distribution value
    /// outside the provider range is warned about once and asks nobody.
    Random(Option<Box<dyn DiscreteSampler>>),
    Select(Box<dyn ProviderSelector>),
}

impl RequestPolicy {
    pub fn random_by(distribution: impl DiscreteSampler + 'static) -> Self {
        RequestPolicy::Random(Some(Box::new(distribution)))
    }

    pub fn select(selector: impl ProviderSelector + 'static) -> Self {
        RequestPolicy::Select(Box::new(selector))
    }
}

impl fmt::Debug for RequestPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestPolicy::Forward => f.write_str("Forward"),
            RequestPolicy::Backward => f.write_str("Backward"),
            RequestPolicy::Shuffle => f.write_str("Shuffle"),
            RequestPolicy::Random(None) => f.write_str("Random(uniform)"),
            RequestPolicy::Random(Some(_)) => f.write_str("Random(distribution)"),
            RequestPolicy::Select(_) => f.write_str("Select"),
        }
    }
}

/// Hook for [`RequestPolicy::Select`].
pub trait ProviderSelector {
    /// The index of the one provider to ask, or `None` to ask nobody.
    fn select(&mut self, providers: &[Rc<dyn Provider>]) -> Option<usize>;
}

/// When a round over several providers stops early.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum RequestTermination {
    /// Ask every provider until the request is filled.
    #[default]
    Exhaust,
    /// Stop at the first provider that offers nothing.
    Fail,
    /// Stop at the first provider that offers something.
    Succeed,
}

/// A provider whose stock comes from pulling on other providers.
///
/// Every step asks the registered upstream providers, per the request
/// policy, to `provide` up to `production`, then offers whatever arrived to
/// its own receivers.  Unsold stock is kept for the next round.  It is a
/// [`Receiver`] only so upstream can hand over during a request; offers
/// pushed at it any other time are refused, so do not register it as a
/// receiver of anything.
pub struct Extractor {
    core:            ProviderCore,
    me:              Weak<Extractor>,
    schedule:        Rc<dyn Schedule>,
    providers:       RefCell<Vec<Weak<dyn Provider>>>,
    policy:          RefCell<RequestPolicy>,
    termination:     Cell<RequestTermination>,
    rate:            Cell<f64>,
    production:      Cell<f64>,
    ordering:        Cell<i32>,
    wanted:          Cell<f64>,
    requesting:      Reentry,
    total_extracted: Cell<f64>,
}

impl Extractor {
    pub fn new(model: &Model, name: &str, kind: ResourceKind) -> FlowResult<Rc<Self>> {
        let core = ProviderCore::new(model, name, kind)?;
        Ok(Rc::new_cyclic(|me| Extractor {
            core,
            me: me.clone(),
            schedule: model.schedule(),
            providers: RefCell::new(Vec::new()),
            policy: RefCell::new(RequestPolicy::Forward),
            termination: Cell::new(RequestTermination::Exhaust),
            rate: Cell::new(1.0),
            production: Cell::new(1.0),
            ordering: Cell::new(0),
            wanted: Cell::new(0.0),
            requesting: Reentry::new(),
            total_extracted: Cell::new(0.0),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    // ── Upstream ──────────────────────────────────────────────────────────

    /// Register an upstream provider.  `Ok(false)` if it already was; a
    /// kind mismatch is an error.
    pub fn add_provider<P: Provider + 'static>(&self, provider: &Rc<P>) -> FlowResult<bool> {
        if let Some(kind) = provider.typical_provided() {
            self.core.typical().check_same(&kind)?;
        }
        let weak = Rc::downgrade(provider) as Weak<dyn Provider>;
        let mut providers = self.providers.borrow_mut();
        if providers.iter().any(|p| Weak::ptr_eq(p, &weak)) {
            return Ok(false);
        }
        providers.push(weak);
        Ok(true)
    }

    pub fn remove_provider(&self, provider: &dyn Provider) -> bool {
        let mut providers = self.providers.borrow_mut();
        let before = providers.len();
        providers.retain(|p| !std::ptr::addr_eq(p.as_ptr(), provider as *const dyn Provider));
        providers.len() != before
    }

    pub fn providers(&self) -> Vec<Rc<dyn Provider>> {
        self.providers.borrow().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn set_request_policy(&self, policy: RequestPolicy) -> FlowResult<()> {
        *self
            .policy
            .try_borrow_mut()
            .map_err(|_| FlowError::CyclicOffer(self.core.name()))? = policy;
        Ok(())
    }

    pub fn set_request_termination(&self, termination: RequestTermination) {
        self.termination.set(termination);
    }

    pub fn request_termination(&self) -> RequestTermination {
        self.termination.get()
    }

    // ── Timing ────────────────────────────────────────────────────────────

    /// Interval between steps once started.
    pub fn set_rate(&self, rate: f64) -> FlowResult<()> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(FlowError::Config(format!("extraction rate must be positive, was {rate}")));
        }
        self.rate.set(rate);
        Ok(())
    }

    pub fn rate(&self) -> f64 {
        self.rate.get()
    }

    /// Most asked for per step.  Infinite takes whatever upstream offers.
    pub fn set_production(&self, amount: f64) -> FlowResult<()> {
        if !(amount > 0.0) {
            return Err(FlowError::Config(format!("extraction amount must be positive, was {amount}")));
        }
        self.production.set(amount);
        Ok(())
    }

    pub fn production(&self) -> f64 {
        self.production.get()
    }

    pub fn set_reschedule_ordering(&self, ordering: i32) {
        self.ordering.set(ordering);
    }

    pub fn total_extracted(&self) -> f64 {
        self.total_extracted.get()
    }

    /// Step every `rate` from `time` on.
    pub fn start_at(&self, time: f64) -> FlowResult<()> {
        let me = self.me.upgrade().ok_or_else(|| FlowError::Config("extractor dropped".into()))?;
        self.schedule.schedule_repeating(time, self.rate.get(), self.ordering.get(), me)
    }

    // ── Requests ──────────────────────────────────────────────────────────

    fn request_order(&self, providers: &[Rc<dyn Provider>]) -> FlowResult<Vec<usize>> {
        let n = providers.len();
        let mut policy = self
            .policy
            .try_borrow_mut()
            .map_err(|_| FlowError::CyclicOffer(self.core.name()))?;
        let order: Vec<usize> = match &mut *policy {
            RequestPolicy::Forward => (0..n).collect(),
            RequestPolicy::Backward => (0..n).rev().collect(),
            RequestPolicy::Shuffle => {
                let mut order: Vec<usize> = (0..n).collect();
                self.core.with_rng(|rng| {
                    for i in 0..n {
                        let j = i + rng.below(n - i);
                        order.swap(i, j);
                    }
                });
                order
            }
            RequestPolicy::Random(None) => vec![self.core.with_rng(|rng| rng.below(n))],
            RequestPolicy::Random(Some(dist)) => {
                let v = self.core.with_rng(|rng| dist.sample_index(rng));
                match usize::try_from(v) {
                    Ok(i) if i < n => vec![i],
                    _ => {
                        self.core.warn_once(&format!(
                            "request distribution returned {v}, outside the {n} providers"
                        ));
                        Vec::new()
                    }
                }
            }
            RequestPolicy::Select(selector) => match selector.select(providers) {
                Some(i) if i < n => vec![i],
                Some(i) => {
                    self.core.warn_once(&format!("selector chose provider {i}, outside the {n} providers"));
                    Vec::new()
                }
                None => Vec::new(),
            },
        };
        Ok(order)
    }

    /// Ask upstream for up to `amount`.  `true` if anyone handed something
    /// over.  A request made while one is already running asks nobody.
    pub fn request(&self, amount: f64) -> FlowResult<bool> {
        if amount.is_nan() || amount <= 0.0 {
            return Err(FlowError::InvalidAmount(amount));
        }
        if self.requesting.is_active() {
            return Ok(false);
        }
        let providers = self.providers();
        if providers.is_empty() {
            return Ok(false);
        }
        let order = self.request_order(&providers)?;
        let _token = self.requesting.enter(|| FlowError::CyclicOffer(self.core.name()))?;
        self.wanted.set(amount);
        let mut any = false;
        for i in order {
            if self.wanted.get() <= 0.0 {
                break;
            }
            let got = providers[i].provide(self, self.wanted.get())?;
            any |= got;
            match self.termination.get() {
                RequestTermination::Succeed if got => break,
                RequestTermination::Fail if !got => break,
                _ => {}
            }
        }
        self.wanted.set(0.0);
        Ok(any)
    }

    fn record(&self, x: f64) {
        self.wanted.set(self.wanted.get() - x);
        self.total_extracted.set(self.total_extracted.get() + x);
    }
}

impl Named for Extractor {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for Extractor {
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
        if !self.requesting.is_active() {
            return Ok(false);
        }
        self.core.check_incoming(&offer, at_least, at_most)?;
        let wanted = self.wanted.get();
        if at_least > wanted {
            return Ok(false);
        }
        match &mut offer {
            Offer::Amount(r) => {
                let mut x = at_most.min(wanted);
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
                self.record(x);
            }
            Offer::Entity(slot) => {
                if wanted < 1.0 {
                    return Ok(false);
                }
                let Some(e) = slot.take() else {
                    return Ok(false);
                };
                self.core.push_entity(e)?;
                self.record(1.0);
            }
        }
        Ok(true)
    }
}

impl Provider for Extractor {
    delegate_receivers!(core);

    /// Tops the stock up from upstream when it holds less than `at_most`,
    /// then offers to `receiver`.
    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        let short = at_most - self.core.available();
        if short > 0.0 {
            self.request(short)?;
        }
        self.core.provide(self, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

impl Steppable for Extractor {
    fn step(&self) -> FlowResult<()> {
        self.request(self.production.get())?;
        self.core.offer_receivers(self)?;
        Ok(())
    }
}
