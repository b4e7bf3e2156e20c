//! `Lock` and `Unlock`: pass-through filters that seize and release a
//! [`Pool`].
//!
//! ```text
//! upstream ──▶ Lock ──▶ … work … ──▶ Unlock ──▶ downstream
//!               │ try_take(n)          │ give(n)
//!               └──────── Pool ◀───────┘
//! ```
//!
//! Both sides change the pool before passing the offer on and undo the
//! change if the offer is refused or fails.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use des_core::{FlowError, FlowResult, ResourceKind};

use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Pool, Provider, ProviderCore, Receiver, Reentry};

fn check_amount(amount: f64, pool: &Pool) -> FlowResult<()> {
    if !(amount >= 0.0) || (pool.kind().is_integral() && amount.fract() != 0.0) {
        return Err(FlowError::Config(format!(
            "lock amount {amount} is not a valid amount of {}",
            pool.kind()
        )));
    }
    Ok(())
}

// ── Lock ──────────────────────────────────────────────────────────────────────

/// Seizes `amount` from the pool for every offer it passes on.
pub struct Lock {
    core:      ProviderCore,
    pool:      Rc<Pool>,
    amount:    f64,
    providers: RefCell<Vec<Weak<dyn Provider>>>,
    refuses:   Cell<bool>,
}

impl Lock {
    pub fn new(
        model: &Model,
        name: &str,
        kind: ResourceKind,
        pool: Rc<Pool>,
        amount: f64,
    ) -> FlowResult<Rc<Self>> {
        check_amount(amount, &pool)?;
        Ok(Rc::new(Lock {
            core: ProviderCore::new(model, name, kind)?,
            pool,
            amount,
            providers: RefCell::new(Vec::new()),
            refuses: Cell::new(false),
        }))
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn pool(&self) -> &Rc<Pool> {
        &self.pool
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses.set(val);
    }

    /// Remember an upstream provider so a partnered [`Unlock`] can ask it
    /// for more once the pool frees up.
    pub fn add_provider<P: Provider + 'static>(&self, provider: &Rc<P>) {
        let weak: Weak<dyn Provider> = Rc::downgrade(provider) as Weak<dyn Provider>;
        self.providers.borrow_mut().push(weak);
    }

    /// Ask every upstream provider to offer to this lock.  Returns `true` if
    /// any offer went through.
    pub fn request_upstream(&self) -> FlowResult<bool> {
        let providers: Vec<Rc<dyn Provider>> =
            self.providers.borrow().iter().filter_map(Weak::upgrade).collect();
        let mut any = false;
        for p in providers {
            any |= p.provide(self, f64::INFINITY)?;
        }
        Ok(any)
    }
}

impl Named for Lock {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for Lock {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.core.typical().clone())
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
        self.core.check_incoming(&offer, at_least, at_most)?;
        if !self.pool.try_take(self.amount) {
            return Ok(false);
        }
        let result = self.core.offer_through(self, offer, at_least, at_most);
        if !matches!(result, Ok(true)) {
            log::debug!("{} returns {} to {}", self.core.name(), self.amount, self.pool.name());
            self.pool.give(self.amount);
        }
        result
    }
}

impl Provider for Lock {
    delegate_receivers!(core);

    /// A lock holds nothing of its own.
    fn provide(&self, _receiver: &dyn Receiver, _at_most: f64) -> FlowResult<bool> {
        Ok(false)
    }

    fn available(&self) -> f64 {
        0.0
    }
}

// ── Unlock ────────────────────────────────────────────────────────────────────

/// Releases `amount` to the pool for every offer it passes on.
///
/// With a partner lock, each successful pass asks the partner's upstream
/// providers to offer again, since the pool now has room.
pub struct Unlock {
    core:       ProviderCore,
    pool:       Rc<Pool>,
    amount:     f64,
    partner:    RefCell<Option<Weak<Lock>>>,
    partnering: Reentry,
    refuses:    Cell<bool>,
}

impl Unlock {
    pub fn new(
        model: &Model,
        name: &str,
        kind: ResourceKind,
        pool: Rc<Pool>,
        amount: f64,
    ) -> FlowResult<Rc<Self>> {
        check_amount(amount, &pool)?;
        Ok(Rc::new(Unlock {
            core: ProviderCore::new(model, name, kind)?,
            pool,
            amount,
            partner: RefCell::new(None),
            partnering: Reentry::new(),
            refuses: Cell::new(false),
        }))
    }

    /// An unlock over the same pool, amount and kind as `lock`.
    pub fn from_lock(model: &Model, name: &str, lock: &Lock) -> FlowResult<Rc<Self>> {
        Self::new(model, name, lock.core.typical().clone(), lock.pool.clone(), lock.amount)
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }

    pub fn pool(&self) -> &Rc<Pool> {
        &self.pool
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn set_partner(&self, partner: Option<&Rc<Lock>>) {
        *self.partner.borrow_mut() = partner.map(Rc::downgrade);
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses.set(val);
    }

    fn cyclic(&self) -> FlowError {
        FlowError::CyclicPartnering(self.core.name())
    }
}

impl Named for Unlock {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Receiver for Unlock {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.core.typical().clone())
    }

    fn accept(
        &self,
        _provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if self.partnering.is_active() {
            return Err(self.cyclic());
        }
        if self.refuses.get() {
            return Ok(false);
        }
        self.core.check_incoming(&offer, at_least, at_most)?;

        let released = self.pool.give(self.amount);
        let result = self.core.offer_through(self, offer, at_least, at_most);
        if !matches!(result, Ok(true)) {
            if !self.pool.try_take(released) {
                log::warn!("{} could not take back {released} from {}", self.core.name(), self.pool.name());
            }
            return result;
        }

        let partner = self.partner.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(lock) = partner {
            let _token = self.partnering.enter(|| self.cyclic())?;
            lock.request_upstream()?;
        }
        Ok(true)
    }
}

impl Provider for Unlock {
    delegate_receivers!(core);

    fn provide(&self, _receiver: &dyn Receiver, _at_most: f64) -> FlowResult<bool> {
        Ok(false)
    }

    fn available(&self) -> f64 {
        0.0
    }
}
