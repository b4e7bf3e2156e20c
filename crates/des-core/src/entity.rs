//! Atomic entity tokens, optionally composite.

use crate::{FlowError, FlowResult, Resource, ResourceKind};

/// An indivisible token of amount exactly 1.
///
/// A composite entity carries an ordered list of constituent resources in
/// its storage.  `info` is a free numeric slot for the model (priority,
/// age, ...).  Equality is by kind only; `Clone` is a deep duplicate.
#[derive(Clone, Debug)]
pub struct Entity {
    kind:    ResourceKind,
    storage: Option<Vec<Resource>>,
    info:    Option<f64>,
}

impl Entity {
    pub fn new(kind: ResourceKind) -> FlowResult<Self> {
        if !kind.is_entity() {
            return Err(FlowError::Protocol(format!("{kind} is not an entity kind")));
        }
        Ok(Self { kind, storage: None, info: None })
    }

    /// A composite entity holding `storage`.
    pub fn composite(kind: ResourceKind, storage: Vec<Resource>) -> FlowResult<Self> {
        let mut entity = Self::new(kind)?;
        entity.storage = Some(storage);
        Ok(entity)
    }

    #[inline]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    #[inline]
    pub fn amount(&self) -> f64 {
        1.0
    }

    pub fn is_composite(&self) -> bool {
        self.storage.is_some()
    }

    pub fn storage(&self) -> Option<&[Resource]> {
        self.storage.as_deref()
    }

    pub fn set_storage(&mut self, storage: Option<Vec<Resource>>) {
        self.storage = storage;
    }

    /// Remove and return the constituents, leaving the entity non-composite.
    pub fn take_storage(&mut self) -> Option<Vec<Resource>> {
        self.storage.take()
    }

    pub fn info(&self) -> Option<f64> {
        self.info
    }

    pub fn set_info(&mut self, info: Option<f64>) {
        self.info = info;
    }

    pub fn with_info(mut self, info: f64) -> Self {
        self.info = Some(info);
        self
    }

    pub fn duplicate(&self) -> Self {
        self.clone()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}
