//! Reference single-threaded scheduler.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use des_core::{FlowError, FlowResult, ModelConfig};

use crate::{Event, EventQueue, RunObserver, Schedule, Steppable};

/// Runs [`Steppable`]s in `(time, ordering, insertion)` order.
///
/// The queue is never borrowed while a target runs, so targets may schedule
/// further events (including at the current time) from inside `step`.
pub struct Scheduler {
    time:     Cell<f64>,
    end_time: f64,
    queue:    RefCell<EventQueue>,
    executed: Cell<u64>,
}

impl Scheduler {
    /// A scheduler whose clock starts at `start_time`.
    pub fn new(start_time: f64) -> Self {
        Self {
            time:     Cell::new(start_time),
            end_time: des_core::AFTER_SIMULATION,
            queue:    RefCell::new(EventQueue::new()),
            executed: Cell::new(0),
        }
    }

    /// A scheduler bounded by the config's start and end times.
    pub fn from_config(config: &ModelConfig) -> FlowResult<Self> {
        config.validate()?;
        let mut s = Self::new(config.start_time);
        s.end_time = config.end_time;
        Ok(s)
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Events executed so far.
    pub fn executed(&self) -> u64 {
        self.executed.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn next_time(&self) -> Option<f64> {
        self.queue.borrow().next_time()
    }

    /// Run the earliest event.  Returns `Ok(false)` if nothing is due before
    /// the end time.
    pub fn step(&self) -> FlowResult<bool> {
        Ok(self.step_event()?.is_some())
    }

    /// Run every event due strictly before `end`, then advance the clock to
    /// `end` if it is finite.  Returns the number of events run.
    pub fn run_until<O: RunObserver>(&self, end: f64, observer: &mut O) -> FlowResult<u64> {
        let mut count = 0;
        while self.next_time().is_some_and(|t| t < end) {
            let Some((time, ordering)) = self.step_event()? else {
                break;
            };
            count += 1;
            observer.on_event(time, ordering);
        }
        let last = self.time.get();
        if end.is_finite() && end > last && end <= self.end_time {
            self.time.set(end);
        }
        observer.on_run_end(self.time.get(), count);
        Ok(count)
    }

    fn step_event(&self) -> FlowResult<Option<(f64, i32)>> {
        let popped = {
            let mut queue = self.queue.borrow_mut();
            match queue.next_time() {
                Some(t) if t < self.end_time => queue.pop(),
                _ => None,
            }
        };
        let Some((time, ordering, event)) = popped else {
            return Ok(None);
        };
        self.time.set(time);
        log::trace!("t={time} ordering={ordering}: stepping");
        event.target.step()?;
        self.executed.set(self.executed.get() + 1);
        if let Some(dt) = event.interval {
            self.queue.borrow_mut().push(time + dt, ordering, event);
        }
        Ok(Some((time, ordering)))
    }

    fn check_time(&self, time: f64) -> FlowResult<()> {
        if time.is_nan() || time < self.time.get() {
            return Err(FlowError::Config(format!(
                "cannot schedule at {time}; clock is at {}",
                self.time.get()
            )));
        }
        Ok(())
    }
}

impl Schedule for Scheduler {
    fn time(&self) -> f64 {
        self.time.get()
    }

    fn schedule_once(&self, time: f64, ordering: i32, target: Rc<dyn Steppable>) -> FlowResult<()> {
        self.check_time(time)?;
        self.queue.borrow_mut().push(time, ordering, Event { target, interval: None });
        Ok(())
    }

    fn schedule_repeating(
        &self,
        start: f64,
        interval: f64,
        ordering: i32,
        target: Rc<dyn Steppable>,
    ) -> FlowResult<()> {
        self.check_time(start)?;
        if !(interval > 0.0) || !interval.is_finite() {
            return Err(FlowError::Config(format!("repeat interval {interval} must be positive")));
        }
        self.queue.borrow_mut().push(start, ordering, Event { target, interval: Some(interval) });
        Ok(())
    }
}
