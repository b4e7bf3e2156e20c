//! `Multi`: one object with several receiver ports and provider ports.
//!
//! ```text
//!              ┌──────────── Multi ────────────┐
//! upstream ──▶ │ receiver port 0 ─┐            │
//! upstream ──▶ │ receiver port 1 ─┼─ handler ──┼─▶ provider port 0 ──▶ …
//!              │                  └────────────┼─▶ provider port 1 ──▶ …
//!              └───────────────────────────────┘
//! ```
//!
//! Ports are thin stubs: every call lands in the [`MultiHandler`] with the
//! port index.  All ports share one re-entrancy guard, so a same-instant
//! cycle through *any* two ports is caught.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use des_core::{ComponentId, FlowError, FlowResult, Resource, ResourceKind};
use des_schedule::Steppable;

use crate::protocol::check_offer;
use crate::provider::delegate_receivers;
use crate::{Model, Named, Offer, Provider, ProviderCore, Receiver, Reentry, Transactor};

/// The behaviour behind a [`Multi`].  Every method defaults to refusing.
pub trait MultiHandler {
    /// An offer arrived on receiver port `port`.
    fn accept(
        &self,
        _multi: &Multi,
        _port: usize,
        _provider: &dyn Provider,
        _offer: Offer<'_>,
        _at_least: f64,
        _at_most: f64,
    ) -> FlowResult<bool> {
        Ok(false)
    }

    /// `receiver` asked provider port `port` for up to `at_most`.
    fn provide(
        &self,
        _multi: &Multi,
        _port: usize,
        _receiver: &dyn Receiver,
        _at_most: f64,
    ) -> FlowResult<bool> {
        Ok(false)
    }

    /// A trade through a [`Broker`] over (`provider_port`, `receiver_port`).
    #[allow(clippy::too_many_arguments)]
    fn transact(
        &self,
        _multi: &Multi,
        _provider_port: usize,
        _receiver_port: usize,
        _provided: Offer<'_>,
        _at_least: f64,
        _at_most: f64,
        _at_least_requested: f64,
    ) -> FlowResult<Option<Resource>> {
        Ok(None)
    }

    fn step(&self, _multi: &Multi) -> FlowResult<()> {
        Ok(())
    }
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Receiver port `port` of a [`Multi`].
pub struct MultiReceiver {
    multi:   Weak<Multi>,
    port:    usize,
    id:      ComponentId,
    typical: ResourceKind,
    refuses: Cell<bool>,
}

impl MultiReceiver {
    pub fn port(&self) -> usize {
        self.port
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn set_refuses_offers(&self, val: bool) {
        self.refuses.set(val);
    }
}

impl Named for MultiReceiver {
    fn name(&self) -> String {
        match self.multi.upgrade() {
            Some(m) => format!("{}/in{}", m.name, self.port),
            None => format!("in{}", self.port),
        }
    }
}

impl Receiver for MultiReceiver {
    fn typical_received(&self) -> Option<ResourceKind> {
        Some(self.typical.clone())
    }

    fn accept(
        &self,
        provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        if self.refuses.get() {
            return Ok(false);
        }
        check_offer(&self.typical, &offer, at_least, at_most)?;
        let Some(multi) = self.multi.upgrade() else {
            return Ok(false);
        };
        if multi.guard.is_active() {
            return Err(FlowError::CyclicOffer(self.name()));
        }
        multi.handler.accept(&multi, self.port, provider, offer, at_least, at_most)
    }
}

/// Provider port `port` of a [`Multi`].
pub struct MultiProvider {
    multi: Weak<Multi>,
    port:  usize,
    core:  ProviderCore,
}

impl MultiProvider {
    pub fn port(&self) -> usize {
        self.port
    }

    pub fn provider(&self) -> &ProviderCore {
        &self.core
    }
}

impl Named for MultiProvider {
    fn name(&self) -> String {
        self.core.name()
    }
}

impl Provider for MultiProvider {
    delegate_receivers!(core);

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        if at_most.is_nan() || at_most < 0.0 {
            return Err(FlowError::InvalidAmount(at_most));
        }
        let Some(multi) = self.multi.upgrade() else {
            return Ok(false);
        };
        multi.handler.provide(&multi, self.port, receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.core.available()
    }
}

// ── Multi ─────────────────────────────────────────────────────────────────────

pub struct Multi {
    name:      String,
    guard:     Rc<Reentry>,
    receivers: Vec<Rc<MultiReceiver>>,
    providers: Vec<Rc<MultiProvider>>,
    handler:   Box<dyn MultiHandler>,
}

impl Multi {
    pub fn new(
        model: &Model,
        name: &str,
        receiver_kinds: &[ResourceKind],
        provider_kinds: &[ResourceKind],
        handler: Box<dyn MultiHandler>,
    ) -> FlowResult<Rc<Self>> {
        let guard = Rc::new(Reentry::new());
        let cores = provider_kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                ProviderCore::new(model, &format!("{name}/out{i}"), kind.clone())
                    .map(|core| core.with_guard(guard.clone()))
            })
            .collect::<FlowResult<Vec<_>>>()?;
        let receiver_ids: Vec<ComponentId> =
            receiver_kinds.iter().map(|_| model.register_component().0).collect();

        Ok(Rc::new_cyclic(|me| Multi {
            name: name.to_owned(),
            guard,
            receivers: receiver_kinds
                .iter()
                .zip(receiver_ids)
                .enumerate()
                .map(|(port, (kind, id))| {
                    Rc::new(MultiReceiver {
                        multi: me.clone(),
                        port,
                        id,
                        typical: kind.clone(),
                        refuses: Cell::new(false),
                    })
                })
                .collect(),
            providers: cores
                .into_iter()
                .enumerate()
                .map(|(port, core)| Rc::new(MultiProvider { multi: me.clone(), port, core }))
                .collect(),
            handler,
        }))
    }

    pub fn receiver(&self, port: usize) -> Option<Rc<MultiReceiver>> {
        self.receivers.get(port).cloned()
    }

    pub fn provider(&self, port: usize) -> Option<Rc<MultiProvider>> {
        self.providers.get(port).cloned()
    }

    pub fn receiver_ports(&self) -> usize {
        self.receivers.len()
    }

    pub fn provider_ports(&self) -> usize {
        self.providers.len()
    }

    /// Whether any port is mid-offer or mid-trade.
    pub fn is_busy(&self) -> bool {
        self.guard.is_active()
    }

    fn provider_port(&self, port: usize) -> FlowResult<&Rc<MultiProvider>> {
        self.providers
            .get(port)
            .ok_or_else(|| FlowError::Protocol(format!("{} has no provider port {port}", self.name)))
    }

    fn receiver_port(&self, port: usize) -> FlowResult<&Rc<MultiReceiver>> {
        self.receivers
            .get(port)
            .ok_or_else(|| FlowError::Protocol(format!("{} has no receiver port {port}", self.name)))
    }

    /// Offer `offer` to the receivers of provider port `port`, per its
    /// policy.
    pub fn offer_receivers(
        &self,
        port: usize,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        let p = self.provider_port(port)?;
        p.core.offer_through(&**p, offer, at_least, at_most)
    }

    /// Offer `offer` from provider port `port` to one given receiver.
    pub fn offer_to(
        &self,
        port: usize,
        receiver: &dyn Receiver,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        let p = self.provider_port(port)?;
        p.core.offer_through_to(&**p, receiver, offer, at_least, at_most)
    }

    /// Ask `provider` to offer up to `at_most` to receiver port `port`.
    pub fn request(&self, port: usize, provider: &dyn Provider, at_most: f64) -> FlowResult<bool> {
        let r = self.receiver_port(port)?;
        provider.provide(&**r, at_most)
    }

    /// A trading view over one provider port and one receiver port.
    pub fn broker(self: &Rc<Self>, provider_port: usize, receiver_port: usize) -> FlowResult<Rc<Broker>> {
        self.provider_port(provider_port)?;
        self.receiver_port(receiver_port)?;
        Ok(Rc::new(Broker {
            multi: Rc::downgrade(self),
            provider_port,
            receiver_port,
        }))
    }
}

impl Named for Multi {
    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Steppable for Multi {
    fn step(&self) -> FlowResult<()> {
        self.handler.step(self)
    }
}

// ── Broker ────────────────────────────────────────────────────────────────────

/// A [`Multi`] seen as a middleman: receives on one port, provides on
/// another, and trades between them through the handler.
pub struct Broker {
    multi:         Weak<Multi>,
    provider_port: usize,
    receiver_port: usize,
}

impl Broker {
    fn multi(&self) -> FlowResult<Rc<Multi>> {
        self.multi.upgrade().ok_or_else(|| FlowError::Protocol("broker outlived its multi".into()))
    }

    fn ports(&self) -> FlowResult<(Rc<MultiProvider>, Rc<MultiReceiver>)> {
        let multi = self.multi()?;
        Ok((
            multi.provider_port(self.provider_port)?.clone(),
            multi.receiver_port(self.receiver_port)?.clone(),
        ))
    }
}

impl Named for Broker {
    fn name(&self) -> String {
        match self.multi.upgrade() {
            Some(m) => format!("{}/broker({},{})", m.name, self.provider_port, self.receiver_port),
            None => "broker".to_owned(),
        }
    }
}

impl Transactor for Broker {
    fn transact(
        &self,
        provided: Offer<'_>,
        at_least: f64,
        at_most: f64,
        requested: &ResourceKind,
        at_least_requested: f64,
    ) -> FlowResult<Option<Resource>> {
        let multi = self.multi()?;
        let (p, r) = self.ports()?;
        check_offer(&r.typical, &provided, at_least, at_most)?;
        p.core.typical().check_same(requested)?;
        let _token = multi.guard.enter(|| FlowError::CyclicTransaction(self.name()))?;
        multi.handler.transact(
            &multi,
            self.provider_port,
            self.receiver_port,
            provided,
            at_least,
            at_most,
            at_least_requested,
        )
    }
}

impl Receiver for Broker {
    fn typical_received(&self) -> Option<ResourceKind> {
        self.ports().ok().map(|(_, r)| r.typical.clone())
    }

    fn accept(
        &self,
        provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool> {
        let (_, r) = self.ports()?;
        r.accept(provider, offer, at_least, at_most)
    }
}

impl Provider for Broker {
    fn typical_provided(&self) -> Option<ResourceKind> {
        self.ports().ok().map(|(p, _)| p.core.typical().clone())
    }

    fn add_receiver(&self, receiver: Rc<dyn Receiver>) -> FlowResult<bool> {
        self.ports()?.0.add_receiver(receiver)
    }

    fn remove_receiver(&self, receiver: &dyn Receiver) -> bool {
        self.ports().is_ok_and(|(p, _)| p.remove_receiver(receiver))
    }

    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool> {
        self.ports()?.0.provide(receiver, at_most)
    }

    fn available(&self) -> f64 {
        self.ports().map_or(0.0, |(p, _)| p.available())
    }
}
