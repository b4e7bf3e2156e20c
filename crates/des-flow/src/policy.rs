//! How a provider chooses among its receivers.

use std::fmt;
use std::rc::Rc;

use des_core::{DiscreteSampler, Resource};

use crate::Receiver;

/// The offer policy of a provider.
///
/// | Policy       | Receivers tried                                        |
/// |--------------|--------------------------------------------------------|
/// | `Forward`    | registration order                                     |
/// | `Backward`   | reverse registration order                             |
/// | `RoundRobin` | from the last-served position, wrapping once           |
/// | `Shuffle`    | all, in a fresh random order                           |
/// | `Random`     | exactly one, uniform or drawn from a distribution      |
/// | `Select`     | exactly one, chosen by an [`OfferSelector`]            |
///
/// The first four stop at the first acceptance unless the offer is bulk,
/// not take-it-or-leave-it, and some stock remains.
#[derive(Default)]
pub enum OfferPolicy {
    #[default]
    Forward,
    Backward,
    RoundRobin,
    Shuffle,
    /// `None` picks uniformly.  A distribution value outside the receiver
    /// range is warned about once and treated as no offer.
    Random(Option<Box<dyn DiscreteSampler>>),
    Select(Box<dyn OfferSelector>),
}

impl OfferPolicy {
    pub fn random() -> Self {
        OfferPolicy::Random(None)
    }

    pub fn random_by(distribution: impl DiscreteSampler + 'static) -> Self {
        OfferPolicy::Random(Some(Box::new(distribution)))
    }

    pub fn select(selector: impl OfferSelector + 'static) -> Self {
        OfferPolicy::Select(Box::new(selector))
    }

    pub(crate) fn mode(&self) -> PolicyMode {
        match self {
            OfferPolicy::Forward => PolicyMode::Forward,
            OfferPolicy::Backward => PolicyMode::Backward,
            OfferPolicy::RoundRobin => PolicyMode::RoundRobin,
            OfferPolicy::Shuffle => PolicyMode::Shuffle,
            OfferPolicy::Random(_) => PolicyMode::Random,
            OfferPolicy::Select(_) => PolicyMode::Select,
        }
    }
}

impl fmt::Debug for OfferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferPolicy::Forward => f.write_str("Forward"),
            OfferPolicy::Backward => f.write_str("Backward"),
            OfferPolicy::RoundRobin => f.write_str("RoundRobin"),
            OfferPolicy::Shuffle => f.write_str("Shuffle"),
            OfferPolicy::Random(None) => f.write_str("Random(uniform)"),
            OfferPolicy::Random(Some(_)) => f.write_str("Random(distribution)"),
            OfferPolicy::Select(_) => f.write_str("Select"),
        }
    }
}

/// Borrow-free copy of the policy discriminant.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum PolicyMode {
    Forward,
    Backward,
    RoundRobin,
    Shuffle,
    Random,
    Select,
}

/// Which end of an entity list is offered first.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum OfferOrder {
    #[default]
    Fifo,
    Lifo,
}

/// Hooks for [`OfferPolicy::Select`].
pub trait OfferSelector {
    /// Pick the index of the one receiver to offer `offered` to, or `None`
    /// to make no offer.
    fn select(&mut self, receivers: &[Rc<dyn Receiver>], offered: &Resource) -> Option<usize>;

    /// Called after `receiver` accepted.  `after` is what remained on the
    /// table, `None` when an entity was taken.
    fn accepted(
        &mut self,
        _receiver: &Rc<dyn Receiver>,
        _before: &Resource,
        _after: Option<&Resource>,
    ) {
    }
}
