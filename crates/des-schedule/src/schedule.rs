//! The scheduler contract the flow kernel depends on.

use std::rc::Rc;

use des_core::FlowResult;

/// Something the scheduler can invoke at a simulated time.
///
/// Components are shared (`Rc`) and mutate through interior mutability, so
/// `step` takes `&self`.
pub trait Steppable {
    fn step(&self) -> FlowResult<()>;
}

/// A monotonically advancing clock plus one-shot and repeating scheduling.
///
/// Among events at the same time, lower `ordering` runs first.
pub trait Schedule {
    /// The current simulated time.
    fn time(&self) -> f64;

    /// Invoke `target` once at `time`.  Scheduling in the past, or at a NaN
    /// time, is a configuration error.
    fn schedule_once(&self, time: f64, ordering: i32, target: Rc<dyn Steppable>) -> FlowResult<()>;

    /// Invoke `target` at `start` and every `interval` after that.
    fn schedule_repeating(
        &self,
        start: f64,
        interval: f64,
        ordering: i32,
        target: Rc<dyn Steppable>,
    ) -> FlowResult<()>;
}
