//! Scheduler observer trait for progress reporting.

/// Callbacks invoked by [`Scheduler::run_until`][crate::Scheduler::run_until].
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
pub trait RunObserver {
    /// Called after each event has run.
    fn on_event(&mut self, _time: f64, _ordering: i32) {}

    /// Called once when the run stops, with the clock and the number of
    /// events executed during this run.
    fn on_run_end(&mut self, _final_time: f64, _events: u64) {}
}

/// A [`RunObserver`] that does nothing.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
