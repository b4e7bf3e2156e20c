//! Re-entrancy guard for same-instant call chains.

use std::cell::Cell;

use des_core::{FlowError, FlowResult};

/// A flag that is set for the duration of an outward call.
///
/// Entering an already active guard fails with the error the caller
/// supplies.  The flag is cleared when the token drops, including on early
/// return through `?`.
#[derive(Default, Debug)]
pub struct Reentry {
    active: Cell<bool>,
}

/// Clears its [`Reentry`] on drop.
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct ReentryToken<'a> {
    guard: &'a Reentry,
}

impl Reentry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn enter(&self, on_cycle: impl FnOnce() -> FlowError) -> FlowResult<ReentryToken<'_>> {
        if self.active.replace(true) {
            return Err(on_cycle());
        }
        Ok(ReentryToken { guard: self })
    }
}

impl Drop for ReentryToken<'_> {
    fn drop(&mut self) {
        self.guard.active.set(false);
    }
}
