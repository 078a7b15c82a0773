// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write-once result cell for one requested key.
//!
//! A `Slot` is created per key per resolve batch and resolved at most once,
//! by whichever producer gets there first: the synchronous fetch pass or an
//! asynchronous registry notification. Resolution is monotonic — once filled
//! or deleted, every later write is a silent no-op.
//!
//! # Thread Safety
//!
//! Safe under concurrent access from the resolving thread and any number of
//! notifier threads. Waiters block on a condvar (no busy-polling) and re-check
//! state after every wakeup, so a value landing exactly at the deadline counts
//! as resolved rather than timed out.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Instant;

/// Internal tri-state of a slot.
enum State<V> {
    Pending,
    Filled(V),
    Deleted,
}

/// Outcome of a bounded wait on a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<V> {
    /// The slot resolved to a value before (or exactly at) the deadline.
    Filled(V),
    /// The slot was deleted — the key can never be satisfied.
    Deleted,
    /// The deadline elapsed with the slot still pending.
    TimedOut,
}

/// Write-once result cell shared between the resolving thread and notifiers.
pub struct Slot<V> {
    state: Mutex<State<V>>,
    resolved: Condvar,
}

impl<V: Clone> Slot<V> {
    /// Create a new pending slot.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            resolved: Condvar::new(),
        }
    }

    /// Create a shared pending slot wrapped in Arc.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Resolve the slot to `value`.
    ///
    /// Returns `true` if this call performed the transition. Once resolved
    /// (filled or deleted), every later `fill` or `delete` is a silent no-op —
    /// never an error, never a value change.
    pub fn fill(&self, value: V) -> bool {
        let mut state = self.state.lock();
        match *state {
            State::Pending => {
                *state = State::Filled(value);
                self.resolved.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Resolve the slot as permanently unsatisfiable.
    ///
    /// Same idempotence and return convention as [`fill`](Self::fill).
    pub fn delete(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            State::Pending => {
                *state = State::Deleted;
                self.resolved.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Non-blocking probe: the filled value, if any.
    pub fn try_get(&self) -> Option<V> {
        match &*self.state.lock() {
            State::Filled(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Non-blocking probe: has the slot been filled or deleted?
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.state.lock(), State::Pending)
    }

    /// Block until the slot resolves or `deadline` passes, whichever first.
    ///
    /// State is re-checked before every timeout decision, so a resolution
    /// racing the deadline is reported as resolved, not timed out.
    pub fn wait_until(&self, deadline: Instant) -> WaitOutcome<V> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                State::Filled(v) => return WaitOutcome::Filled(v.clone()),
                State::Deleted => return WaitOutcome::Deleted,
                State::Pending => {}
            }
            if Instant::now() >= deadline {
                return WaitOutcome::TimedOut;
            }
            self.resolved.wait_until(&mut state, deadline);
        }
    }
}

impl<V: Clone> Default for Slot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.lock() {
            State::Pending => "Pending",
            State::Filled(_) => "Filled",
            State::Deleted => "Deleted",
        };
        f.debug_struct("Slot").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fill_is_write_once() {
        let slot = Slot::new();
        assert!(slot.fill(1));
        assert!(!slot.fill(2));
        assert!(!slot.delete());
        assert_eq!(slot.try_get(), Some(1));
    }

    #[test]
    fn test_delete_is_write_once() {
        let slot: Slot<u32> = Slot::new();
        assert!(slot.delete());
        assert!(!slot.fill(7));
        assert_eq!(slot.try_get(), None);
        assert!(slot.is_resolved());
    }

    #[test]
    fn test_wait_returns_immediately_when_resolved() {
        let slot = Slot::new();
        slot.fill("x");

        let start = Instant::now();
        let outcome = slot.wait_until(Instant::now() + Duration::from_millis(500));
        assert_eq!(outcome, WaitOutcome::Filled("x"));
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn test_wait_times_out_when_pending() {
        let slot: Slot<u32> = Slot::new();

        let start = Instant::now();
        let outcome = slot.wait_until(Instant::now() + Duration::from_millis(30));
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(29));
    }

    #[test]
    fn test_fill_landing_after_deadline_reported_filled() {
        // Resolution racing the deadline favors success: state is inspected
        // before the clock, so a value that landed after the deadline instant
        // but before the wait looks at the slot is Filled, not TimedOut.
        let slot = Slot::new();
        let expired = Instant::now() - Duration::from_millis(10);
        slot.fill(5);
        assert_eq!(slot.wait_until(expired), WaitOutcome::Filled(5));
    }

    #[test]
    fn test_delete_landing_after_deadline_reported_deleted() {
        let slot: Slot<u32> = Slot::new();
        let expired = Instant::now() - Duration::from_millis(10);
        slot.delete();
        assert_eq!(slot.wait_until(expired), WaitOutcome::Deleted);
    }

    #[test]
    fn test_fill_wakes_waiter_early() {
        let slot = Slot::shared();
        let s = Arc::clone(&slot);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            s.fill(42);
        });

        let start = Instant::now();
        let outcome = slot.wait_until(Instant::now() + Duration::from_millis(500));
        let elapsed = start.elapsed();

        assert_eq!(outcome, WaitOutcome::Filled(42));
        assert!(elapsed < Duration::from_millis(200), "woke at {elapsed:?}");
        handle.join().unwrap();
    }

    #[test]
    fn test_racing_fills_one_value_observed() {
        for _ in 0..100 {
            let slot = Slot::shared();
            let a = Arc::clone(&slot);
            let b = Arc::clone(&slot);

            let t1 = thread::spawn(move || a.fill("first"));
            let t2 = thread::spawn(move || b.fill("second"));

            let won1 = t1.join().unwrap();
            let won2 = t2.join().unwrap();

            // Exactly one writer wins, and every reader sees the winner's value.
            assert!(won1 ^ won2);
            let value = slot.try_get().unwrap();
            if won1 {
                assert_eq!(value, "first");
            } else {
                assert_eq!(value, "second");
            }
        }
    }

    #[test]
    fn test_racing_fill_and_delete() {
        for _ in 0..100 {
            let slot = Slot::shared();
            let a = Arc::clone(&slot);
            let b = Arc::clone(&slot);

            let t1 = thread::spawn(move || a.fill(1));
            let t2 = thread::spawn(move || b.delete());

            let filled = t1.join().unwrap();
            let deleted = t2.join().unwrap();

            assert!(filled ^ deleted);
            assert_eq!(slot.try_get().is_some(), filled);
        }
    }
}
