//! `ProviderCore`: the offer machinery every provider embeds.
//!
//! # Offering without aliasing
//!
//! ```text
//! bulk stock   → split a lot off the stock → accept(lot) → merge the rest back
//! entity stock → move the entity into a slot → accept(slot) → reinsert if still there
//! pass-through → lend the caller's offer to the receiver unchanged
//! ```
//!
//! No `RefCell` borrow is held across a call to `accept`, so receivers may
//! call back into any other component.  Calling back into *this* provider
//! while it is offering trips the [`Reentry`] guard.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use des_core::{
    ComponentId, ComponentRng, CountableResource, Entity, FlowError, FlowResult, Resource,
    ResourceKind,
};

use crate::policy::PolicyMode;
use crate::protocol::{check_offer, same_receiver, verify_taken};
use crate::{Model, Offer, OfferOrder, OfferPolicy, Provider, Receiver, Reentry, ReentryToken};

// ── Stock ─────────────────────────────────────────────────────────────────────

/// What a provider has on hand.
#[derive(Debug)]
pub enum Stock {
    Amount(CountableResource),
    Entities(VecDeque<Entity>),
}

impl Stock {
    fn new(kind: &ResourceKind) -> FlowResult<Self> {
        if kind.is_entity() {
            Ok(Stock::Entities(VecDeque::new()))
        } else {
            Ok(Stock::Amount(kind.zero()?))
        }
    }

    pub fn available(&self) -> f64 {
        match self {
            Stock::Amount(r) => r.amount(),
            Stock::Entities(q) => q.len() as f64,
        }
    }
}

// ── Offer sources ─────────────────────────────────────────────────────────────

/// Result of offering to one receiver.
enum Attempt {
    Refused,
    Accepted { taken: f64, more: bool },
}

/// Where the resource of one offer round comes from.
trait OfferSource {
    fn snapshot(&self, core: &ProviderCore) -> Option<Resource>;

    fn attempt(
        &mut self,
        core: &ProviderCore,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
    ) -> FlowResult<Attempt>;
}

/// A lot split off the provider's own bulk stock.
struct OwnLot {
    cap: f64,
}

impl OfferSource for OwnLot {
    fn snapshot(&self, core: &ProviderCore) -> Option<Resource> {
        match &*core.stock.borrow() {
            Stock::Amount(r) => {
                let mut snap = r.clone();
                let cap = if snap.is_integral() { self.cap.floor() } else { self.cap };
                snap.bound_max(cap).ok()?;
                Some(Resource::Countable(snap))
            }
            Stock::Entities(_) => None,
        }
    }

    fn attempt(
        &mut self,
        core: &ProviderCore,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
    ) -> FlowResult<Attempt> {
        let mut lot = {
            let mut stock = core.stock.borrow_mut();
            let Stock::Amount(s) = &mut *stock else {
                return Ok(Attempt::Refused);
            };
            let amount = s.amount().min(self.cap);
            if !(amount > 0.0) {
                return Ok(Attempt::Refused);
            }
            match s.reduce(0.0, amount)? {
                Some(lot) if lot.is_positive() => lot,
                Some(mut empty) => {
                    s.add(&mut empty)?;
                    return Ok(Attempt::Refused);
                }
                None => return Ok(Attempt::Refused),
            }
        };
        let before = lot.amount();
        let tioli = core.take_it_or_leave_it.get();
        let (least, most) = if tioli { (before, before) } else { (0.0, before) };
        log::trace!("{} offers {before} to {}", core.name(), receiver.name());
        let result = receiver.accept(owner, Offer::Amount(&mut lot), least, most);
        let taken = before - lot.amount();
        core.merge_back(&mut lot)?;
        let accepted = result?;
        verify_taken(receiver, accepted, taken, least, most)?;
        if accepted {
            self.cap -= taken;
            let more = !tioli && self.cap > 0.0 && core.available() > 0.0;
            Ok(Attempt::Accepted { taken, more })
        } else {
            Ok(Attempt::Refused)
        }
    }
}

/// One entity from the provider's own entity stock.
struct OwnEntity {
    index: Option<usize>,
}

impl OwnEntity {
    fn position(&self, core: &ProviderCore, len: usize) -> usize {
        match (self.index, core.offer_order.get()) {
            (Some(i), _) => i,
            (None, OfferOrder::Fifo) => 0,
            (None, OfferOrder::Lifo) => len.saturating_sub(1),
        }
    }
}

impl OfferSource for OwnEntity {
    fn snapshot(&self, core: &ProviderCore) -> Option<Resource> {
        match &*core.stock.borrow() {
            Stock::Entities(q) => {
                q.get(self.position(core, q.len())).map(|e| Resource::Entity(e.clone()))
            }
            Stock::Amount(_) => None,
        }
    }

    fn attempt(
        &mut self,
        core: &ProviderCore,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
    ) -> FlowResult<Attempt> {
        let (entity, pos) = {
            let mut stock = core.stock.borrow_mut();
            let Stock::Entities(q) = &mut *stock else {
                return Ok(Attempt::Refused);
            };
            let pos = self.position(core, q.len());
            match q.remove(pos) {
                Some(e) => (e, pos),
                None => return Ok(Attempt::Refused),
            }
        };
        let mut slot = Some(entity);
        log::trace!("{} offers an entity to {}", core.name(), receiver.name());
        let result = receiver.accept(owner, Offer::Entity(&mut slot), 1.0, 1.0);
        let taken = if slot.is_some() { 0.0 } else { 1.0 };
        if let Some(e) = slot.take() {
            if let Stock::Entities(q) = &mut *core.stock.borrow_mut() {
                let at = pos.min(q.len());
                q.insert(at, e);
            }
        }
        let accepted = result?;
        verify_taken(receiver, accepted, taken, 1.0, 1.0)?;
        Ok(if accepted { Attempt::Accepted { taken, more: false } } else { Attempt::Refused })
    }
}

/// Somebody else's offer, passed through unchanged.
struct Through<'o, 'a> {
    offer:    &'o mut Offer<'a>,
    at_least: f64,
    at_most:  f64,
}

impl OfferSource for Through<'_, '_> {
    fn snapshot(&self, _core: &ProviderCore) -> Option<Resource> {
        self.offer.snapshot()
    }

    fn attempt(
        &mut self,
        core: &ProviderCore,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
    ) -> FlowResult<Attempt> {
        let before = self.offer.amount();
        if !(before > 0.0) {
            return Ok(Attempt::Refused);
        }
        let most = self.at_most.min(before);
        let least = self.at_least.min(most);
        log::trace!("{} passes {before} through to {}", core.name(), receiver.name());
        let accepted = receiver.accept(owner, self.offer.reborrow(), least, most)?;
        let taken = before - self.offer.amount();
        verify_taken(receiver, accepted, taken, least, most)?;
        Ok(if accepted { Attempt::Accepted { taken, more: false } } else { Attempt::Refused })
    }
}

// ── ProviderCore ──────────────────────────────────────────────────────────────

/// Receiver registry, offer policy, stock and re-entrancy guard of one
/// provider.
///
/// Methods that make offers take `owner`, the component embedding this core,
/// because receivers are told which provider is offering.
pub struct ProviderCore {
    id:                  ComponentId,
    name:                RefCell<String>,
    typical:             ResourceKind,
    receivers:           RefCell<Vec<Rc<dyn Receiver>>>,
    policy:              RefCell<OfferPolicy>,
    take_it_or_leave_it: Cell<bool>,
    offer_order:         Cell<OfferOrder>,
    offers_all_entities: Cell<bool>,
    makes_offers:        Cell<bool>,
    round_robin:         Cell<usize>,
    guard:               Rc<Reentry>,
    stock:               RefCell<Stock>,
    rng:                 RefCell<ComponentRng>,
    warned:              Cell<bool>,
}

impl ProviderCore {
    pub fn new(model: &Model, name: &str, typical: ResourceKind) -> FlowResult<Self> {
        let (id, rng) = model.register_component();
        Ok(Self {
            id,
            name: RefCell::new(name.to_owned()),
            stock: RefCell::new(Stock::new(&typical)?),
            typical,
            receivers: RefCell::new(Vec::new()),
            policy: RefCell::new(OfferPolicy::Forward),
            take_it_or_leave_it: Cell::new(false),
            offer_order: Cell::new(OfferOrder::Fifo),
            offers_all_entities: Cell::new(false),
            makes_offers: Cell::new(true),
            round_robin: Cell::new(0),
            guard: Rc::new(Reentry::new()),
            rng: RefCell::new(rng),
            warned: Cell::new(false),
        })
    }

    /// Share `guard` with other cores (the ports of one multi-port object).
    pub fn with_guard(mut self, guard: Rc<Reentry>) -> Self {
        self.guard = guard;
        self
    }

    // ── Identity and settings ─────────────────────────────────────────────

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_owned();
    }

    pub fn typical(&self) -> &ResourceKind {
        &self.typical
    }

    pub fn set_offer_policy(&self, policy: OfferPolicy) -> FlowResult<()> {
        let mut slot = self
            .policy
            .try_borrow_mut()
            .map_err(|_| FlowError::CyclicOffer(self.name()))?;
        *slot = policy;
        self.round_robin.set(0);
        Ok(())
    }

    pub fn offer_policy_name(&self) -> String {
        format!("{:?}", self.policy.borrow())
    }

    pub fn take_it_or_leave_it(&self) -> bool {
        self.take_it_or_leave_it.get()
    }

    pub fn set_take_it_or_leave_it(&self, val: bool) {
        self.take_it_or_leave_it.set(val);
    }

    pub fn offer_order(&self) -> OfferOrder {
        self.offer_order.get()
    }

    pub fn set_offer_order(&self, order: OfferOrder) {
        self.offer_order.set(order);
    }

    pub fn offers_all_entities(&self) -> bool {
        self.offers_all_entities.get()
    }

    pub fn set_offers_all_entities(&self, val: bool) {
        self.offers_all_entities.set(val);
    }

    pub fn makes_offers(&self) -> bool {
        self.makes_offers.get()
    }

    pub fn set_makes_offers(&self, val: bool) {
        self.makes_offers.set(val);
    }

    pub fn guard(&self) -> &Rc<Reentry> {
        &self.guard
    }

    pub fn is_offering(&self) -> bool {
        self.guard.is_active()
    }

    /// Run `f` with this provider's RNG stream.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut ComponentRng) -> R) -> R {
        f(&mut self.rng.borrow_mut())
    }

    /// Log `message` at warn level the first time only.
    pub fn warn_once(&self, message: &str) {
        if !self.warned.replace(true) {
            log::warn!("{}: {message}", self.name());
        }
    }

    // ── Receivers ─────────────────────────────────────────────────────────

    pub fn add_receiver(&self, receiver: Rc<dyn Receiver>) -> FlowResult<bool> {
        if let Some(kind) = receiver.typical_received() {
            self.typical.check_same(&kind)?;
        }
        let mut receivers = self.receivers.borrow_mut();
        if receivers.iter().any(|r| same_receiver(&**r, &*receiver)) {
            return Ok(false);
        }
        receivers.push(receiver);
        Ok(true)
    }

    pub fn remove_receiver(&self, receiver: &dyn Receiver) -> bool {
        let mut receivers = self.receivers.borrow_mut();
        let before = receivers.len();
        receivers.retain(|r| !same_receiver(&**r, receiver));
        receivers.len() != before
    }

    pub fn receivers(&self) -> Vec<Rc<dyn Receiver>> {
        self.receivers.borrow().clone()
    }

    pub fn receiver_count(&self) -> usize {
        self.receivers.borrow().len()
    }

    // ── Stock ─────────────────────────────────────────────────────────────

    pub fn available(&self) -> f64 {
        self.stock.borrow().available()
    }

    pub fn provides_entities(&self) -> bool {
        self.typical.is_entity()
    }

    /// Merge `resource` into the bulk stock, leaving it at zero.
    pub fn add_amount(&self, resource: &mut CountableResource) -> FlowResult<()> {
        match &mut *self.stock.borrow_mut() {
            Stock::Amount(s) => s.add(resource),
            Stock::Entities(_) => Err(FlowError::TypeMismatch {
                expected: self.typical.id(),
                got:      resource.kind().id(),
            }),
        }
    }

    /// Append an entity to the entity stock.
    pub fn push_entity(&self, entity: Entity) -> FlowResult<()> {
        self.typical.check_same(entity.kind())?;
        match &mut *self.stock.borrow_mut() {
            Stock::Entities(q) => {
                q.push_back(entity);
                Ok(())
            }
            Stock::Amount(_) => Err(FlowError::NotEntityProvider(self.name())),
        }
    }

    /// Put any resource into stock.
    pub fn put(&self, resource: Resource) -> FlowResult<()> {
        match resource {
            Resource::Countable(mut c) => self.add_amount(&mut c),
            Resource::Entity(e) => self.push_entity(e),
        }
    }

    /// Empty the stock.  Returns how much was dropped.
    pub fn clear(&self) -> f64 {
        let mut stock = self.stock.borrow_mut();
        let dropped = stock.available();
        match &mut *stock {
            Stock::Amount(s) => s.clear(),
            Stock::Entities(q) => q.clear(),
        }
        dropped
    }

    /// Duplicates of the entities on hand, in stock order.
    pub fn entities(&self) -> Vec<Entity> {
        match &*self.stock.borrow() {
            Stock::Entities(q) => q.iter().cloned().collect(),
            Stock::Amount(_) => Vec::new(),
        }
    }

    /// Remove exactly `x` from the bulk stock, or nothing.
    pub fn take_amount(&self, x: f64) -> FlowResult<Option<CountableResource>> {
        match &mut *self.stock.borrow_mut() {
            Stock::Amount(s) => s.reduce_exactly(x),
            Stock::Entities(_) => Ok(None),
        }
    }

    /// Remove the entity that would be offered next.
    pub fn take_entity(&self) -> Option<Entity> {
        match &mut *self.stock.borrow_mut() {
            Stock::Entities(q) => match self.offer_order.get() {
                OfferOrder::Fifo => q.pop_front(),
                OfferOrder::Lifo => q.pop_back(),
            },
            Stock::Amount(_) => None,
        }
    }

    fn merge_back(&self, lot: &mut CountableResource) -> FlowResult<()> {
        match &mut *self.stock.borrow_mut() {
            Stock::Amount(s) => s.add(lot),
            Stock::Entities(_) => Ok(()),
        }
    }

    // ── Offering ──────────────────────────────────────────────────────────

    fn enter(&self, owner: &dyn Provider) -> FlowResult<ReentryToken<'_>> {
        self.guard.enter(|| FlowError::CyclicOffer(owner.name()))
    }

    /// Fail if an incoming offer breaks the contract, or arrives while this
    /// component is itself offering.
    pub fn check_incoming(&self, offer: &Offer<'_>, at_least: f64, at_most: f64) -> FlowResult<()> {
        check_offer(&self.typical, offer, at_least, at_most)?;
        if self.is_offering() {
            return Err(FlowError::CyclicOffer(self.name()));
        }
        Ok(())
    }

    /// Offer the stock to the registered receivers per the offer policy.
    /// Returns `true` if any offer was accepted.
    pub fn offer_receivers(&self, owner: &dyn Provider) -> FlowResult<bool> {
        if !self.makes_offers.get() {
            return Ok(false);
        }
        let _token = self.enter(owner)?;
        if self.provides_entities() {
            let mut any = false;
            loop {
                if self.available() <= 0.0 {
                    break;
                }
                let accepted = self.dispatch(owner, &mut OwnEntity { index: None })?;
                any |= accepted;
                if !accepted || !self.offers_all_entities.get() {
                    break;
                }
            }
            Ok(any)
        } else {
            if self.available() <= 0.0 {
                return Ok(false);
            }
            self.dispatch(owner, &mut OwnLot { cap: f64::INFINITY })
        }
    }

    /// Pass an offer this component did not originate on to its receivers.
    /// Stops at the first acceptance.
    pub fn offer_through(
        &self,
        owner: &dyn Provider,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if !self.makes_offers.get() {
            return Ok(false);
        }
        if let Some(kind) = offer.kind() {
            self.typical.check_same(kind)?;
        }
        let _token = self.enter(owner)?;
        self.dispatch(owner, &mut Through { offer: &mut offer, at_least, at_most })
    }

    /// Pass an offer on to one specific receiver, ignoring the policy.
    pub fn offer_through_to(
        &self,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
        mut offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if let Some(kind) = offer.kind() {
            self.typical.check_same(kind)?;
        }
        let _token = self.enter(owner)?;
        let mut src = Through { offer: &mut offer, at_least, at_most };
        Ok(matches!(src.attempt(self, owner, receiver)?, Attempt::Accepted { .. }))
    }

    /// Offer up to `at_most` of the stock to `receiver` (a pull).
    pub fn provide(
        &self,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
        at_most: f64,
    ) -> FlowResult<bool> {
        if at_most.is_nan() || at_most < 0.0 {
            return Err(FlowError::InvalidAmount(at_most));
        }
        let _token = self.enter(owner)?;
        let attempt = if self.provides_entities() {
            if at_most < 1.0 {
                return Ok(false);
            }
            OwnEntity { index: None }.attempt(self, owner, receiver)?
        } else {
            OwnLot { cap: at_most }.attempt(self, owner, receiver)?
        };
        Ok(matches!(attempt, Attempt::Accepted { .. }))
    }

    /// Offer the entity at `index` of the stock to `receiver`.
    pub fn request_entity(
        &self,
        owner: &dyn Provider,
        receiver: &dyn Receiver,
        index: usize,
    ) -> FlowResult<bool> {
        let len = match &*self.stock.borrow() {
            Stock::Entities(q) => q.len(),
            Stock::Amount(_) => return Err(FlowError::NotEntityProvider(self.name())),
        };
        if index >= len {
            return Err(FlowError::InvalidEntityIndex { index, len });
        }
        let _token = self.enter(owner)?;
        let attempt = OwnEntity { index: Some(index) }.attempt(self, owner, receiver)?;
        Ok(matches!(attempt, Attempt::Accepted { .. }))
    }

    // ── Policy dispatch ───────────────────────────────────────────────────

    fn dispatch(&self, owner: &dyn Provider, src: &mut dyn OfferSource) -> FlowResult<bool> {
        let receivers = self.receivers();
        let n = receivers.len();
        let mode = self.policy.borrow().mode();
        if n == 0 {
            if mode == PolicyMode::Select {
                self.warn_once("select policy has no receivers to choose from");
            }
            return Ok(false);
        }

        let mut any = false;
        // Offer to one receiver; `true` means stop.
        let mut try_one = |r: &Rc<dyn Receiver>, any: &mut bool| -> FlowResult<bool> {
            match src.attempt(self, owner, &**r)? {
                Attempt::Refused => Ok(false),
                Attempt::Accepted { more, .. } => {
                    *any = true;
                    Ok(!more)
                }
            }
        };

        match mode {
            PolicyMode::Forward => {
                for r in &receivers {
                    if try_one(r, &mut any)? {
                        break;
                    }
                }
            }
            PolicyMode::Backward => {
                for r in receivers.iter().rev() {
                    if try_one(r, &mut any)? {
                        break;
                    }
                }
            }
            PolicyMode::RoundRobin => {
                let mut pos = self.round_robin.get();
                if pos >= n {
                    pos = 0;
                }
                for _ in 0..n {
                    let r = &receivers[pos];
                    pos = (pos + 1) % n;
                    self.round_robin.set(pos);
                    if try_one(r, &mut any)? {
                        break;
                    }
                }
            }
            PolicyMode::Shuffle => {
                // Partial Fisher–Yates: draw one position at a time.
                let mut order: Vec<usize> = (0..n).collect();
                let mut remaining = n;
                while remaining > 0 {
                    let j = self.rng.borrow_mut().below(remaining);
                    remaining -= 1;
                    order.swap(j, remaining);
                    if try_one(&receivers[order[remaining]], &mut any)? {
                        break;
                    }
                }
            }
            PolicyMode::Random => {
                let pick = {
                    let policy = self.policy.borrow();
                    let mut rng = self.rng.borrow_mut();
                    match &*policy {
                        OfferPolicy::Random(Some(dist)) => {
                            let v = dist.sample_index(&mut rng);
                            usize::try_from(v).ok().filter(|&i| i < n).ok_or(v)
                        }
                        _ => Ok(rng.below(n)),
                    }
                };
                match pick {
                    Ok(i) => {
                        try_one(&receivers[i], &mut any)?;
                    }
                    Err(v) => {
                        self.warn_once(&format!(
                            "offer distribution returned {v}, outside the {n} registered receivers"
                        ));
                    }
                }
            }
            PolicyMode::Select => {
                let Some(before) = src.snapshot(self) else {
                    return Ok(false);
                };
                let pick = {
                    let mut policy = self
                        .policy
                        .try_borrow_mut()
                        .map_err(|_| FlowError::CyclicOffer(self.name()))?;
                    match &mut *policy {
                        OfferPolicy::Select(selector) => selector.select(&receivers, &before),
                        _ => None,
                    }
                };
                match pick {
                    Some(i) if i < n => {
                        if let Attempt::Accepted { taken, .. } =
                            src.attempt(self, owner, &*receivers[i])?
                        {
                            any = true;
                            let after = match &before {
                                Resource::Countable(c) => {
                                    let mut rest = c.clone();
                                    if !rest.decrease(taken) {
                                        return Err(FlowError::Protocol(format!(
                                            "{} took {taken} of {}, which cannot be",
                                            receivers[i].name(),
                                            c.amount()
                                        )));
                                    }
                                    Some(Resource::Countable(rest))
                                }
                                Resource::Entity(_) => None,
                            };
                            let mut policy = self
                                .policy
                                .try_borrow_mut()
                                .map_err(|_| FlowError::CyclicOffer(self.name()))?;
                            if let OfferPolicy::Select(selector) = &mut *policy {
                                selector.accepted(&receivers[i], &before, after.as_ref());
                            }
                        }
                    }
                    Some(i) => {
                        self.warn_once(&format!(
                            "selector chose receiver {i}, outside the {n} registered receivers"
                        ));
                    }
                    None => {}
                }
            }
        }
        Ok(any)
    }
}

/// Expands to the receiver-registry methods of a `Provider` impl that
/// delegate to a `ProviderCore` field.
macro_rules! delegate_receivers {
    ($field:ident) => {
        fn typical_provided(&self) -> Option<des_core::ResourceKind> {
            Some(self.$field.typical().clone())
        }

        fn add_receiver(
            &self,
            receiver: std::rc::Rc<dyn $crate::Receiver>,
        ) -> des_core::FlowResult<bool> {
            self.$field.add_receiver(receiver)
        }

        fn remove_receiver(&self, receiver: &dyn $crate::Receiver) -> bool {
            self.$field.remove_receiver(receiver)
        }
    };
}

pub(crate) use delegate_receivers;
