// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::{
    scheduler::{
        Yielder,
        YielderHandle,
    },
    Fail,
    SharedObject,
};
use ::core::cmp::{
    Ordering,
    Reverse,
};
use ::std::{
    collections::BinaryHeap,
    ops::{
        Deref,
        DerefMut,
    },
};

//==============================================================================
// Structures
//==============================================================================

struct TimerQueueEntry {
    expiry: f64,
    /// Insertion order. Entries that expire at the same virtual time fire in the order they were scheduled.
    sequence: u64,
    yielder: YielderHandle,
}

/// Virtual clock that holds one or more events for future wake up.
pub struct Timer {
    now: f64,
    next_sequence: u64,
    // Use a reverse to get a min heap.
    heap: BinaryHeap<Reverse<TimerQueueEntry>>,
}

#[derive(Clone)]
pub struct SharedTimer(SharedObject<Timer>);

//==============================================================================
// Associate Functions
//==============================================================================

impl SharedTimer {
    pub fn new(now: f64) -> Self {
        Self(SharedObject::<Timer>::new(Timer {
            now,
            next_sequence: 0,
            heap: BinaryHeap::new(),
        }))
    }

    /// Fires every event due by `now`, in `(expiry, insertion)` order, then moves the clock to `now`.
    pub fn advance_clock(&mut self, now: f64) -> Result<(), Fail> {
        if now < self.now {
            let cause: String = format!("virtual time cannot go backwards (now={:?}, target={:?})", self.now, now);
            error!("advance_clock(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        while self.fire_next(now) {}
        self.now = now;
        Ok(())
    }

    /// Fires the earliest event if it is due by `until`. The clock jumps to that event's expiry. Returns whether an
    /// event fired.
    pub fn fire_next(&mut self, until: f64) -> bool {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.expiry <= until => (),
            _ => return false,
        }
        let mut entry: TimerQueueEntry = match self.heap.pop() {
            Some(Reverse(entry)) => entry,
            None => return false,
        };
        self.now = entry.expiry;
        entry.yielder.wake_with(Ok(()));
        true
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Expiry of the earliest pending event, if any.
    pub fn next_expiry(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(entry)| entry.expiry)
    }

    /// Suspends the calling process for `timeout` units of virtual time.
    pub async fn wait(self, timeout: f64, yielder: &Yielder) -> Result<(), Fail> {
        let now: f64 = self.now;
        self.wait_until(now + timeout.max(0.0), yielder).await
    }

    /// Suspends the calling process until the clock reaches `expiry`. Expiries in the past fire at the current time.
    pub async fn wait_until(mut self, expiry: f64, yielder: &Yielder) -> Result<(), Fail> {
        let entry = TimerQueueEntry {
            expiry: expiry.max(self.now),
            sequence: self.next_sequence,
            yielder: yielder.get_handle(),
        };
        self.next_sequence += 1;
        self.heap.push(Reverse(entry));
        yielder.yield_until_wake().await
    }

    /// Drops every pending event.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl Default for SharedTimer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Deref for SharedTimer {
    type Target = Timer;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedTimer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

impl PartialEq for TimerQueueEntry {
    fn eq(&self, other: &TimerQueueEntry) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimerQueueEntry {}

impl PartialOrd for TimerQueueEntry {
    fn partial_cmp(&self, other: &TimerQueueEntry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerQueueEntry {
    fn cmp(&self, other: &TimerQueueEntry) -> Ordering {
        self.expiry
            .total_cmp(&other.expiry)
            .then(self.sequence.cmp(&other.sequence))
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
