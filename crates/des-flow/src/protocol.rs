//! The offer/accept protocol.
//!
//! A [`Provider`] offers a resource to a [`Receiver`] by calling
//! [`Receiver::accept`] with bounds `0 <= at_least <= at_most <= amount`.
//! For bulk resources the receiver either takes an amount within the bounds
//! (by decreasing the offered resource) and returns `true`, or takes nothing
//! and returns `false`.  For entities the bounds are `(1, 1)` and the receiver
//! takes the entity out of the offered slot or leaves it there.
//!
//! Every offer happens at one simulated instant, so the call graph can
//! recurse.  Components guard their outward calls with a
//! [`Reentry`][crate::Reentry] flag and fail with a cyclic-call error when
//! re-entered.

use std::rc::Rc;

use des_core::{CountableResource, Entity, FlowError, FlowResult, Resource, ResourceKind};

/// Anything with a display name.
pub trait Named {
    fn name(&self) -> String;
}

// ── Offer ─────────────────────────────────────────────────────────────────────

/// A resource on the table.
///
/// A bulk offer lends the resource mutably: the receiver takes amount by
/// splitting it off.  An entity offer lends the slot holding it: the
/// receiver takes the entity with `Option::take`.
#[derive(Debug)]
pub enum Offer<'a> {
    Amount(&'a mut CountableResource),
    Entity(&'a mut Option<Entity>),
}

impl Offer<'_> {
    /// A shorter-lived offer over the same resource.
    pub fn reborrow(&mut self) -> Offer<'_> {
        match self {
            Offer::Amount(r) => Offer::Amount(&mut **r),
            Offer::Entity(slot) => Offer::Entity(&mut **slot),
        }
    }

    /// `None` only for an empty entity slot.
    pub fn kind(&self) -> Option<&ResourceKind> {
        match self {
            Offer::Amount(r) => Some(r.kind()),
            Offer::Entity(slot) => slot.as_ref().map(Entity::kind),
        }
    }

    /// The amount still on the table: 1 or 0 for entities.
    pub fn amount(&self) -> f64 {
        match self {
            Offer::Amount(r) => r.amount(),
            Offer::Entity(slot) => {
                if slot.is_some() {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Offer::Entity(_))
    }

    /// A duplicate of what is on the table.
    pub fn snapshot(&self) -> Option<Resource> {
        match self {
            Offer::Amount(r) => Some(Resource::Countable((**r).clone())),
            Offer::Entity(slot) => slot.as_ref().map(|e| Resource::Entity(e.clone())),
        }
    }

    /// Take the offered entity.  `None` for bulk offers or an empty slot.
    pub fn take_entity(&mut self) -> Option<Entity> {
        match self {
            Offer::Entity(slot) => slot.take(),
            Offer::Amount(_) => None,
        }
    }

    /// Take exactly `x` of a bulk offer.
    pub fn take_amount(&mut self, x: f64) -> FlowResult<Option<CountableResource>> {
        match self {
            Offer::Amount(r) => r.reduce_exactly(x),
            Offer::Entity(_) => Ok(None),
        }
    }
}

// ── Roles ─────────────────────────────────────────────────────────────────────

/// The accepting side of the protocol.
pub trait Receiver: Named {
    /// The kind this receiver accepts, or `None` if it accepts several.
    fn typical_received(&self) -> Option<ResourceKind>;

    /// Consider an offer.  See the module docs for the contract.
    fn accept(
        &self,
        provider: &dyn Provider,
        offer: Offer<'_>,
        at_least: f64,
        at_most: f64,
    ) -> FlowResult<bool>;
}

/// The offering side of the protocol.
pub trait Provider: Named {
    /// The kind this provider offers, or `None` if it offers several.
    fn typical_provided(&self) -> Option<ResourceKind>;

    /// Register a receiver.  `Ok(false)` if it was already registered; a
    /// type mismatch between the two typical kinds is an error.
    fn add_receiver(&self, receiver: Rc<dyn Receiver>) -> FlowResult<bool>;

    fn remove_receiver(&self, receiver: &dyn Receiver) -> bool;

    /// Offer up to `at_most` to `receiver`, which need not be registered.
    /// This is how receivers pull.
    fn provide(&self, receiver: &dyn Receiver, at_most: f64) -> FlowResult<bool>;

    /// What is currently on hand to offer.
    fn available(&self) -> f64;
}

/// A synchronous barter: take some of `provided`, hand back a resource of
/// `requested` kind, or refuse with `Ok(None)`.
pub trait Transactor: Named {
    fn transact(
        &self,
        provided: Offer<'_>,
        at_least: f64,
        at_most: f64,
        requested: &ResourceKind,
        at_least_requested: f64,
    ) -> FlowResult<Option<Resource>>;
}

// ── Contract checks ───────────────────────────────────────────────────────────

/// Receiver-side validation of an incoming offer.
pub fn check_offer(
    expected: &ResourceKind,
    offer: &Offer<'_>,
    at_least: f64,
    at_most: f64,
) -> FlowResult<()> {
    let amount = match offer {
        Offer::Amount(r) => {
            expected.check_same(r.kind())?;
            r.amount()
        }
        Offer::Entity(slot) => {
            let Some(entity) = slot.as_ref() else {
                return Err(FlowError::Protocol("entity offer with an empty slot".into()));
            };
            expected.check_same(entity.kind())?;
            1.0
        }
    };
    check_bounds(at_least, at_most, amount)
}

/// `0 <= at_least <= at_most <= amount`, with NaN rejected.
pub fn check_bounds(at_least: f64, at_most: f64, amount: f64) -> FlowResult<()> {
    if at_least >= 0.0 && at_least <= at_most && at_most <= amount {
        Ok(())
    } else {
        Err(FlowError::InvalidBounds { at_least, at_most, amount })
    }
}

/// Provider-side check that a receiver honoured the contract.
pub(crate) fn verify_taken(
    receiver: &dyn Receiver,
    accepted: bool,
    taken: f64,
    at_least: f64,
    at_most: f64,
) -> FlowResult<()> {
    let tol = 1e-9 * at_most.abs().max(1.0);
    if accepted && (taken < at_least - tol || taken > at_most + tol) {
        return Err(FlowError::Protocol(format!(
            "{} accepted {taken}, outside [{at_least}, {at_most}]",
            receiver.name()
        )));
    }
    if !accepted && taken.abs() > tol {
        return Err(FlowError::Protocol(format!(
            "{} refused an offer but took {taken}",
            receiver.name()
        )));
    }
    Ok(())
}

/// Identity comparison of two receivers.
pub fn same_receiver(a: &dyn Receiver, b: &dyn Receiver) -> bool {
    std::ptr::addr_eq(a as *const dyn Receiver, b as *const dyn Receiver)
}
