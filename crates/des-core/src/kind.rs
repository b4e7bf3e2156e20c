//! Resource kinds and the registry that mints them.
//!
//! A kind is created exactly once per model; every instance of that kind is
//! either produced by the kind itself (`kind.amount(3.0)`, `kind.entity()`)
//! or duplicated from an existing instance.  Two resources are the same type
//! iff their kinds are the same object.  Names are informational only and may
//! repeat.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::{CountableResource, Entity, FlowError, FlowResult, KindId};

// ── Measure ───────────────────────────────────────────────────────────────────

/// How instances of a kind are measured.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Measure {
    /// Non-negative integer amounts.
    Countable,
    /// Non-negative real amounts, divisible without bound.
    Uncountable,
    /// Integer amounts of a currency's minor unit (e.g. cents).
    /// `minor_units` is the number of minor units per major unit.
    Money { minor_units: u32 },
    /// Atomic tokens of amount exactly 1.
    Entity,
}

impl Measure {
    /// Amounts must be integers.
    #[inline]
    pub fn is_integral(self) -> bool {
        !matches!(self, Measure::Uncountable)
    }

    #[inline]
    pub fn is_entity(self) -> bool {
        matches!(self, Measure::Entity)
    }
}

// ── ResourceKind ──────────────────────────────────────────────────────────────

#[derive(Debug)]
struct KindInfo {
    id:      KindId,
    name:    String,
    measure: Measure,
}

/// A cheaply clonable handle to one resource kind.
#[derive(Clone)]
pub struct ResourceKind(Arc<KindInfo>);

impl ResourceKind {
    #[inline]
    pub fn id(&self) -> KindId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn measure(&self) -> Measure {
        self.0.measure
    }

    #[inline]
    pub fn is_entity(&self) -> bool {
        self.0.measure.is_entity()
    }

    #[inline]
    pub fn is_integral(&self) -> bool {
        self.0.measure.is_integral()
    }

    /// A new instance of this (bulk) kind holding `amount`.
    pub fn amount(&self, amount: f64) -> FlowResult<CountableResource> {
        CountableResource::new(self.clone(), amount)
    }

    /// A zeroed instance of this (bulk) kind, as used for typical-resource
    /// type checks.
    pub fn zero(&self) -> FlowResult<CountableResource> {
        CountableResource::new(self.clone(), 0.0)
    }

    /// A new, non-composite entity of this kind.
    pub fn entity(&self) -> FlowResult<Entity> {
        Entity::new(self.clone())
    }

    /// Fails with a type-mismatch error unless `other` is this kind.
    pub fn check_same(&self, other: &ResourceKind) -> FlowResult<()> {
        if self == other {
            Ok(())
        } else {
            Err(FlowError::TypeMismatch { expected: self.id(), got: other.id() })
        }
    }
}

impl PartialEq for ResourceKind {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ResourceKind {}

impl Hash for ResourceKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.name, self.0.id.0)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

// ── KindRegistry ──────────────────────────────────────────────────────────────

/// Mints resource kinds with unique ids.
///
/// A model builds its kinds up front and may then [`seal`](Self::seal) the
/// registry, after which the set of known kinds is immutable.  The counter is
/// atomic so kinds can be minted from several threads during model
/// construction; the kinds themselves are `Send + Sync`.
#[derive(Default)]
pub struct KindRegistry {
    next:   AtomicU32,
    sealed: AtomicBool,
    kinds:  Mutex<Vec<ResourceKind>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn countable(&self, name: &str) -> FlowResult<ResourceKind> {
        self.register(name, Measure::Countable)
    }

    pub fn uncountable(&self, name: &str) -> FlowResult<ResourceKind> {
        self.register(name, Measure::Uncountable)
    }

    /// A currency kind.  `minor_units` must be positive (100 for cents).
    pub fn money(&self, name: &str, minor_units: u32) -> FlowResult<ResourceKind> {
        if minor_units == 0 {
            return Err(FlowError::Config(format!(
                "money kind {name} needs a positive number of minor units"
            )));
        }
        self.register(name, Measure::Money { minor_units })
    }

    pub fn entity(&self, name: &str) -> FlowResult<ResourceKind> {
        self.register(name, Measure::Entity)
    }

    /// Freeze the set of known kinds.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Look a kind up by id.
    pub fn get(&self, id: KindId) -> Option<ResourceKind> {
        let kinds = self.kinds.lock().ok()?;
        kinds.get(id.index()).cloned()
    }

    /// Number of kinds minted so far.
    pub fn len(&self) -> usize {
        self.next.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, name: &str, measure: Measure) -> FlowResult<ResourceKind> {
        if self.is_sealed() {
            return Err(FlowError::Config(format!(
                "kind registry is sealed; cannot create kind {name}"
            )));
        }
        let mut kinds = self
            .kinds
            .lock()
            .map_err(|_| FlowError::Config("kind registry lock poisoned".into()))?;
        let id = KindId(self.next.fetch_add(1, Ordering::AcqRel));
        let kind = ResourceKind(Arc::new(KindInfo { id, name: name.to_owned(), measure }));
        kinds.push(kind.clone());
        log::debug!("registered resource kind {kind:?} ({measure:?})");
        Ok(kind)
    }
}
