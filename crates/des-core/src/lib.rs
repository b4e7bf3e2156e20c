//! `des-core`: foundational types for the `rust_des` resource-flow kernel.
//!
//! This crate is a dependency of every other `des-*` crate.  It has no
//! `des-*` dependencies of its own.
//!
//! # What lives here
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`ids`]         | `KindId`, `ComponentId`                                   |
//! | [`kind`]        | `ResourceKind`, `Measure`, `KindRegistry`                 |
//! | [`countable`]   | `CountableResource` (countable, uncountable, money)       |
//! | [`money`]       | `Money` display wrapper                                   |
//! | [`entity`]      | `Entity`, composite storage                               |
//! | [`resource`]    | `Resource` enum                                           |
//! | [`rng`]         | `ComponentRng` (per-component), `SimRng` (model)          |
//! | [`sampling`]    | `Sampler`, `DiscreteSampler`, `Fixed`, `Empirical`        |
//! | [`time`]        | `Tick`, `EPOCH`, `AFTER_SIMULATION`                       |
//! | [`config`]      | `ModelConfig`                                             |
//! | [`error`]       | `FlowError`, `FlowResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                         |
//! |---------|----------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, `Measure`, `Tick` and   |
//! |         | `ModelConfig`.                                                 |

pub mod config;
pub mod countable;
pub mod entity;
pub mod error;
pub mod ids;
pub mod kind;
pub mod money;
pub mod resource;
pub mod rng;
pub mod sampling;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::ModelConfig;
pub use countable::{CountableResource, MAXIMUM_INTEGER, is_valid_amount};
pub use entity::Entity;
pub use error::{FlowError, FlowResult};
pub use ids::{ComponentId, KindId};
pub use kind::{KindRegistry, Measure, ResourceKind};
pub use money::Money;
pub use resource::Resource;
pub use rng::{ComponentRng, SimRng};
pub use sampling::{DiscreteSampler, Empirical, Fixed, FixedIndex, FromFn, Sampler};
pub use time::{AFTER_SIMULATION, EPOCH, Tick};
