//! The closed set of resource shapes.

use std::fmt;

use crate::{CountableResource, Entity, ResourceKind};

/// Any resource: a bulk amount or an entity.
#[derive(Clone, Debug)]
pub enum Resource {
    Countable(CountableResource),
    Entity(Entity),
}

impl Resource {
    pub fn kind(&self) -> &ResourceKind {
        match self {
            Resource::Countable(c) => c.kind(),
            Resource::Entity(e) => e.kind(),
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Resource::Countable(c) => c.amount(),
            Resource::Entity(e) => e.amount(),
        }
    }

    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Resource::Entity(_))
    }

    pub fn as_countable(&self) -> Option<&CountableResource> {
        match self {
            Resource::Countable(c) => Some(c),
            Resource::Entity(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Resource::Entity(e) => Some(e),
            Resource::Countable(_) => None,
        }
    }

    pub fn into_countable(self) -> Option<CountableResource> {
        match self {
            Resource::Countable(c) => Some(c),
            Resource::Entity(_) => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Resource::Entity(e) => Some(e),
            Resource::Countable(_) => None,
        }
    }
}

impl From<CountableResource> for Resource {
    fn from(c: CountableResource) -> Self {
        Resource::Countable(c)
    }
}

impl From<Entity> for Resource {
    fn from(e: Entity) -> Self {
        Resource::Entity(e)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Countable(c) => fmt::Display::fmt(c, f),
            Resource::Entity(e) => write!(f, "{} entity", e.kind()),
        }
    }
}
