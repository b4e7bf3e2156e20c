//! `des-flow`: resource-flow components for discrete-event models.
//!
//! # Crate layout
//!
//! | Module             | Contents                                                    |
//! |--------------------|-------------------------------------------------------------|
//! | [`protocol`]       | `Offer`, `Provider`, `Receiver`, `Transactor`, contract checks |
//! | [`guard`]          | `Reentry`, the same-instant cycle guard                     |
//! | [`policy`]         | `OfferPolicy`, `OfferOrder`, `OfferSelector`                |
//! | [`provider`]       | `ProviderCore`, the offer machinery every provider embeds   |
//! | [`model`]          | `Model`: scheduler, kind registry, per-component RNG        |
//! | [`source`]         | `Source`                                                    |
//! | [`sink`]           | `Sink`                                                      |
//! | [`delay`]          | `SimpleDelay`, `Delay`, `BoundedDelay`                      |
//! | [`pool`]           | `Pool`                                                      |
//! | [`lock`]           | `Lock`, `Unlock`                                            |
//! | [`service`]        | `Service` (lock → delay → unlock)                           |
//! | [`composer`]       | `Composer`, `Requirement`                                   |
//! | [`decomposer`]     | `Decomposer`                                                |
//! | [`extractor`]      | `Extractor`, `RequestPolicy`, `RequestTermination`          |
//! | [`queue`]          | `Queue`                                                     |
//! | [`priority_queue`] | `PriorityQueue`                                             |
//! | [`random_queue`]   | `RandomQueue`                                               |
//! | [`middleman`]      | `Middleman`, `Exchange`, `Proportional`                     |
//! | [`multi`]          | `Multi`, `MultiHandler`, ports, `Broker`                    |
//!
//! # Wiring
//!
//! Components are built against a [`Model`] and shared as `Rc`.  Connect a
//! provider to a receiver with `provider.add_receiver(receiver.clone())`;
//! components that act over time are scheduled as `Rc<dyn Steppable>`.
//!
//! ```rust,ignore
//! let model = Model::new(ModelConfig::default().with_seed(1))?;
//! let beans = model.kinds().countable("beans")?;
//! let source = Source::new(&model, "farm", beans.clone())?;
//! let delay = SimpleDelay::new(&model, "truck", beans.clone(), 2.0)?;
//! let sink = Sink::new(&model, "market", beans);
//! source.add_receiver(delay.clone())?;
//! delay.add_receiver(sink.clone())?;
//! source.start_at(0.0)?;
//! model.run_until(10.0)?;
//! ```

pub mod composer;
pub mod decomposer;
pub mod delay;
pub mod extractor;
pub mod guard;
pub mod lock;
pub mod middleman;
pub mod model;
pub mod multi;
pub mod policy;
pub mod pool;
pub mod priority_queue;
pub mod protocol;
pub mod provider;
pub mod queue;
pub mod random_queue;
pub mod service;
pub mod sink;
pub mod source;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use composer::{Composer, Requirement};
pub use decomposer::Decomposer;
pub use delay::{BoundedDelay, Delay, DelayCore, MAX_DELAY_TRIES, SimpleDelay};
pub use extractor::{Extractor, ProviderSelector, RequestPolicy, RequestTermination};
pub use guard::{Reentry, ReentryToken};
pub use lock::{Lock, Unlock};
pub use middleman::{Exchange, Middleman, Proportional};
pub use model::Model;
pub use multi::{Broker, Multi, MultiHandler, MultiProvider, MultiReceiver};
pub use policy::{OfferOrder, OfferPolicy, OfferSelector};
pub use pool::Pool;
pub use priority_queue::{KeyFn, PriorityQueue};
pub use protocol::{Named, Offer, Provider, Receiver, Transactor, check_bounds, check_offer};
pub use provider::{ProviderCore, Stock};
pub use queue::Queue;
pub use random_queue::RandomQueue;
pub use service::Service;
pub use sink::Sink;
pub use source::{REJECTION_TRIES, Source};

pub use des_core::{
    CountableResource, Entity, FlowError, FlowResult, KindRegistry, ModelConfig, Resource,
    ResourceKind,
};
pub use des_schedule::{Schedule, Steppable};
