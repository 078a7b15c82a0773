// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fetch-then-listen-then-bounded-wait resolution for a batch of keys.
//!
//! # Algorithm
//!
//! 1. For each key in input order: [`Retriever::fetch`]. `Ready` fills the
//!    key's slot immediately, `Invalid` deletes it immediately, `Pending`
//!    registers a [`Listener`] and leaves it pending.
//! 2. The calling thread blocks until every slot is resolved or the shared
//!    deadline elapses. Resolution of the last pending slot wakes the wait
//!    immediately rather than only at the deadline.
//! 3. The output is built in input order from filled slots only — deleted and
//!    still-pending keys are omitted, never replaced with placeholders.
//! 4. Keys still pending at the deadline are reported once through the
//!    `on_timeout` callback and a warn line. Advisory only: `resolve` never
//!    fails, it always returns a best-effort partial sequence.
//!
//! Per-key failures never abort the batch. Whether an omitted key is itself
//! fatal is the consumer's call, not the engine's.

use crate::compat::Mismatch;
use crate::registry::FilterError;
use crate::slot::{Slot, WaitOutcome};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Terminal reason a fetch can never succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Candidate found but fails the consumer's contract check. Never retried.
    Incompatible(Mismatch),
    /// The lookup query itself is invalid. Terminal for this key only.
    MalformedQuery(FilterError),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Incompatible(m) => write!(f, "incompatible candidate: {m}"),
            Rejection::MalformedQuery(e) => write!(f, "malformed lookup query: {e}"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Result of one synchronous fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<V> {
    /// The dependency is available now.
    Ready(V),
    /// Not available yet, but may legitimately appear later — listen for it.
    Pending,
    /// Can never satisfy this request; the slot is deleted without waiting.
    Invalid(Rejection),
}

/// Synchronous best-effort fetch strategy, tried first for every key.
pub trait Retriever<K, V> {
    fn fetch(&self, key: &K) -> Fetch<V>;
}

/// Asynchronous registration strategy used when fetch reports `Pending`.
///
/// Invoked exactly once per pending key. The implementation must ensure some
/// external notifier eventually calls `slot.fill` or `slot.delete`, then
/// deregisters itself — including for notifications arriving after the batch
/// has already returned.
pub trait Listener<K, V> {
    fn listen(&self, key: &K, slot: &Arc<Slot<V>>);
}

/// Resolve `keys` against `retriever`/`listener` under one shared deadline.
///
/// Returns the filled values in input order. An empty batch returns an empty
/// sequence with no wait and no diagnostics. `on_timeout` receives the
/// unmatched key set exactly once, and only if at least one key timed out.
pub fn resolve<K, V, R, L, F>(
    keys: &[K],
    timeout: Duration,
    retriever: &R,
    listener: &L,
    on_timeout: F,
) -> Vec<V>
where
    K: fmt::Display,
    V: Clone,
    R: Retriever<K, V>,
    L: Listener<K, V>,
    F: FnOnce(&[&K]),
{
    if keys.is_empty() {
        return Vec::new();
    }

    let deadline = Instant::now() + timeout;

    // Synchronous pass, input order.
    let mut slots: Vec<Arc<Slot<V>>> = Vec::with_capacity(keys.len());
    for key in keys {
        let slot = Slot::shared();
        match retriever.fetch(key) {
            Fetch::Ready(value) => {
                log::debug!("[resolve] '{}' ready synchronously", key);
                slot.fill(value);
            }
            Fetch::Pending => {
                log::debug!("[resolve] '{}' pending, registering listener", key);
                listener.listen(key, &slot);
            }
            Fetch::Invalid(why) => {
                match &why {
                    Rejection::Incompatible(m) => {
                        log::warn!("[resolve] '{}' rejected: {}", key, m);
                    }
                    Rejection::MalformedQuery(e) => {
                        log::error!("[resolve] '{}' rejected: malformed query: {}", key, e);
                    }
                }
                slot.delete();
            }
        }
        slots.push(slot);
    }

    // Bounded wait, shared deadline. Resolved slots return without blocking,
    // so total wall time is bounded by the deadline regardless of batch size.
    let mut resolved = Vec::with_capacity(keys.len());
    let mut unmatched: Vec<&K> = Vec::new();
    for (key, slot) in keys.iter().zip(&slots) {
        match slot.wait_until(deadline) {
            WaitOutcome::Filled(value) => resolved.push(value),
            WaitOutcome::Deleted => {}
            WaitOutcome::TimedOut => unmatched.push(key),
        }
    }

    if !unmatched.is_empty() {
        let names: Vec<String> = unmatched.iter().map(|k| k.to_string()).collect();
        log::warn!(
            "[resolve] timeout after {:?}, {} unmatched: [{}]",
            timeout,
            unmatched.len(),
            names.join(", ")
        );
        on_timeout(&unmatched);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::{Mismatch, Scope};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Scripted retriever: each key maps to a fixed fetch outcome.
    struct Script(fn(&str) -> Fetch<u32>);

    impl Retriever<String, u32> for Script {
        fn fetch(&self, key: &String) -> Fetch<u32> {
            (self.0)(key.as_str())
        }
    }

    /// Listener that fills selected slots from a spawned thread after a delay.
    struct DelayedFill {
        delay: Duration,
        value: u32,
        only: &'static str,
    }

    impl Listener<String, u32> for DelayedFill {
        fn listen(&self, key: &String, slot: &Arc<Slot<u32>>) {
            if key != self.only {
                return;
            }
            let slot = Arc::clone(slot);
            let delay = self.delay;
            let value = self.value;
            thread::spawn(move || {
                thread::sleep(delay);
                slot.fill(value);
            });
        }
    }

    /// Listener that never resolves anything.
    struct Deaf;

    impl Listener<String, u32> for Deaf {
        fn listen(&self, _key: &String, _slot: &Arc<Slot<u32>>) {}
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_all_synchronous_returns_immediately_in_order() {
        let retriever = Script(|key| match key {
            "a" => Fetch::Ready(1),
            "b" => Fetch::Ready(2),
            _ => Fetch::Ready(3),
        });

        let start = Instant::now();
        let out = resolve(
            &keys(&["a", "b", "c"]),
            Duration::from_secs(5),
            &retriever,
            &Deaf,
            |_| panic!("no timeout expected"),
        );

        assert_eq!(out, vec![1, 2, 3]);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_empty_batch_no_wait_no_diagnostics() {
        let retriever = Script(|_| Fetch::Pending);
        let out: Vec<u32> = resolve(
            &Vec::<String>::new(),
            Duration::from_secs(5),
            &retriever,
            &Deaf,
            |_| panic!("no timeout expected"),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_pending_never_resolved_times_out_and_reports_once() {
        let retriever = Script(|_| Fetch::Pending);
        let calls = AtomicUsize::new(0);

        let start = Instant::now();
        let out = resolve(
            &keys(&["ghost"]),
            Duration::from_millis(80),
            &retriever,
            &Deaf,
            |unmatched| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(unmatched.len(), 1);
                assert_eq!(unmatched[0], "ghost");
            },
        );
        let elapsed = start.elapsed();

        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(79), "returned at {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_key_omitted_without_waiting() {
        let retriever = Script(|key| match key {
            "bad" => Fetch::Invalid(Rejection::Incompatible(Mismatch::Scope {
                required: Scope::Shared,
                offered: Scope::Private,
            })),
            _ => Fetch::Ready(9),
        });

        let out = resolve(
            &keys(&["ok", "bad"]),
            Duration::from_secs(5),
            &retriever,
            &Deaf,
            |_| panic!("no timeout expected"),
        );
        assert_eq!(out, vec![9]);
    }

    #[test]
    fn test_async_fill_wakes_before_deadline() {
        let retriever = Script(|_| Fetch::Pending);
        let listener = DelayedFill {
            delay: Duration::from_millis(30),
            value: 11,
            only: "late",
        };

        let start = Instant::now();
        let out = resolve(
            &keys(&["late"]),
            Duration::from_secs(5),
            &retriever,
            &listener,
            |_| panic!("no timeout expected"),
        );
        let elapsed = start.elapsed();

        assert_eq!(out, vec![11]);
        assert!(elapsed < Duration::from_millis(500), "woke at {elapsed:?}");
    }

    #[test]
    fn test_mixed_batch_bounded_by_unresolved_key() {
        // a: sync. b: filled at ~40ms. c: never. Result [1, 5] at ~deadline.
        let retriever = Script(|key| match key {
            "a" => Fetch::Ready(1),
            _ => Fetch::Pending,
        });
        let listener = DelayedFill {
            delay: Duration::from_millis(40),
            value: 5,
            only: "b",
        };
        let calls = AtomicUsize::new(0);

        let start = Instant::now();
        let out = resolve(
            &keys(&["a", "b", "c"]),
            Duration::from_millis(200),
            &retriever,
            &listener,
            |unmatched| {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(unmatched.len(), 1);
                assert_eq!(unmatched[0], "c");
            },
        );
        let elapsed = start.elapsed();

        assert_eq!(out, vec![1, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(elapsed >= Duration::from_millis(199), "returned at {elapsed:?}");
    }
}
