//! `Pool`: a bounded counter of some resource that locks draw from.

use std::cell::{Cell, RefCell};

use des_core::{CountableResource, FlowError, FlowResult, ResourceKind};

/// A shared supply of a countable resource with an upper bound.
///
/// Locks take from it and unlocks give back; neither moves a real resource
/// through the flow.
pub struct Pool {
    name:     String,
    resource: RefCell<CountableResource>,
    maximum:  Cell<f64>,
    initial:  f64,
}

impl Pool {
    /// `maximum` must be a legal amount of the pool's kind (whole for
    /// countable kinds) or infinite.
    pub fn new(name: &str, resource: CountableResource, maximum: f64) -> FlowResult<Self> {
        resource.clone().bound_max(maximum).map_err(|e| bad_maximum(maximum, e))?;
        if maximum < resource.amount() {
            return Err(FlowError::Config(format!(
                "pool maximum {maximum} is below its initial amount {}",
                resource.amount()
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            initial: resource.amount(),
            resource: RefCell::new(resource),
            maximum: Cell::new(maximum),
        })
    }

    /// A pool with no upper bound.
    pub fn unbounded(name: &str, resource: CountableResource) -> FlowResult<Self> {
        Self::new(name, resource, f64::INFINITY)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.borrow().kind().clone()
    }

    pub fn amount(&self) -> f64 {
        self.resource.borrow().amount()
    }

    pub fn maximum(&self) -> f64 {
        self.maximum.get()
    }

    pub fn set_maximum(&self, maximum: f64) -> FlowResult<()> {
        self.resource.borrow_mut().bound_max(maximum).map_err(|e| bad_maximum(maximum, e))?;
        self.maximum.set(maximum);
        Ok(())
    }

    /// Take exactly `n`, or nothing if the pool holds less.
    pub fn try_take(&self, n: f64) -> bool {
        let mut res = self.resource.borrow_mut();
        if res.amount() < n {
            return false;
        }
        res.decrease(n)
    }

    /// Return up to `n`, capped by the maximum.  Returns the amount added.
    pub fn give(&self, n: f64) -> f64 {
        let mut res = self.resource.borrow_mut();
        let room = (self.maximum.get() - res.amount()).max(0.0);
        let added = n.min(room);
        if added > 0.0 && res.increase(added) { added } else { 0.0 }
    }

    /// Restore the amount the pool was built with.
    pub fn reset(&self) {
        // `initial` passed validation in `new`.
        let _ = self.resource.borrow_mut().set_amount(self.initial);
    }
}

fn bad_maximum(maximum: f64, cause: FlowError) -> FlowError {
    FlowError::Config(format!("pool maximum may not be {maximum}: {cause}"))
}
