//! Money: integral amounts of a currency's minor unit, displayed as
//! `major.minor`.

use std::fmt;
use std::ops::Deref;

use crate::{CountableResource, FlowError, FlowResult, Measure, ResourceKind};

/// Render an integral number of minor units as `major.minor`.
pub fn format_minor(amount: f64, minor_units: u32) -> String {
    if minor_units <= 1 {
        return format!("{amount}");
    }
    let units = minor_units as u64;
    let total = amount as u64;
    let width = (units - 1).to_string().len();
    format!("{}.{:0width$}", total / units, total % units, width = width)
}

/// A [`CountableResource`] of a money kind.
#[derive(Clone, Debug)]
pub struct Money(CountableResource);

impl Money {
    /// `minor` is the amount in minor units (cents for a 100-unit currency).
    pub fn new(kind: ResourceKind, minor: f64) -> FlowResult<Self> {
        if !matches!(kind.measure(), Measure::Money { .. }) {
            return Err(FlowError::Config(format!("{kind} is not a money kind")));
        }
        Ok(Money(CountableResource::new(kind, minor)?))
    }

    /// Wrap an existing resource, which must be of a money kind.
    pub fn from_resource(resource: CountableResource) -> FlowResult<Self> {
        if !matches!(resource.kind().measure(), Measure::Money { .. }) {
            return Err(FlowError::Config(format!("{} is not a money kind", resource.kind())));
        }
        Ok(Money(resource))
    }

    pub fn minor_units(&self) -> u32 {
        match self.0.kind().measure() {
            Measure::Money { minor_units } => minor_units,
            _ => 1,
        }
    }

    /// Whole major units.
    pub fn major(&self) -> u64 {
        self.0.amount() as u64 / self.minor_units().max(1) as u64
    }

    /// Remaining minor units after [`major`](Self::major).
    pub fn minor(&self) -> u64 {
        self.0.amount() as u64 % self.minor_units().max(1) as u64
    }

    pub fn as_resource_mut(&mut self) -> &mut CountableResource {
        &mut self.0
    }

    pub fn into_resource(self) -> CountableResource {
        self.0
    }
}

impl Deref for Money {
    type Target = CountableResource;
    fn deref(&self) -> &CountableResource {
        &self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
