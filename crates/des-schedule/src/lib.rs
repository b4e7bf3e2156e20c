//! `des-schedule`: the scheduler collaborator of the flow kernel.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`schedule`]    | `Steppable`, `Schedule` (what components depend on)       |
//! | [`event_queue`] | `EventQueue` (`BTreeMap<(time, ordering), VecDeque<Event>>`) |
//! | [`scheduler`]   | `Scheduler`, the reference implementation                 |
//! | [`observer`]    | `RunObserver`, `NoopObserver`                             |
//!
//! # Time model (summary)
//!
//! ```text
//! clock          = time of the event currently running
//! tie-break      = lower ordering first, then insertion order
//! repeating      = re-queued at time + interval after each run
//! ```
//!
//! Flow components only ever see `Rc<dyn Schedule>`, so a model can swap in
//! any scheduler that honours the same contract.

pub mod event_queue;
pub mod observer;
pub mod schedule;
pub mod scheduler;


pub use event_queue::{Event, EventQueue};
pub use observer::{NoopObserver, RunObserver};
pub use schedule::{Schedule, Steppable};
pub use scheduler::Scheduler;
