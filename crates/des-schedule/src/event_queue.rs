//! `EventQueue`: time-ordered pending invocations.
//!
//! # Performance note
//!
//! `BTreeMap` gives O(log K) insert and pop where K = number of distinct
//! `(time, ordering)` keys currently enqueued.  Events sharing a key are kept
//! in a `VecDeque` and run in insertion order, which makes ties
//! deterministic.

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use ordered_float::OrderedFloat;

use crate::Steppable;

/// One pending invocation.
pub struct Event {
    pub target:   Rc<dyn Steppable>,
    /// `Some(dt)` for repeating events.
    pub interval: Option<f64>,
}

type Key = (OrderedFloat<f64>, i32);

/// A priority queue mapping `(time, ordering)` → events due then.
#[derive(Default)]
pub struct EventQueue {
    inner: BTreeMap<Key, VecDeque<Event>>,
    /// Cached total event count for O(1) `len()`.
    total: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f64, ordering: i32, event: Event) {
        self.inner.entry((OrderedFloat(time), ordering)).or_default().push_back(event);
        self.total += 1;
    }

    /// Remove and return the earliest event with its time and ordering.
    pub fn pop(&mut self) -> Option<(f64, i32, Event)> {
        let mut entry = self.inner.first_entry()?;
        let (time, ordering) = *entry.key();
        let event = entry.get_mut().pop_front()?;
        if entry.get().is_empty() {
            entry.remove();
        }
        self.total -= 1;
        Some((time.0, ordering, event))
    }

    /// The earliest time with at least one queued event.
    pub fn next_time(&self) -> Option<f64> {
        self.inner.keys().next().map(|(t, _)| t.0)
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct `(time, ordering)` keys.
    pub fn key_count(&self) -> usize {
        self.inner.len()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.total = 0;
    }
}
