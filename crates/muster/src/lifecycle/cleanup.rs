// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sweep queue for registrations whose owners have died.

use super::{Liveness, Subscription};
use crate::config::SWEEP_WARN_THRESHOLD;
use parking_lot::Mutex;
use std::sync::Arc;

struct Tracked {
    owner: Box<dyn Liveness>,
    subscription: Arc<Subscription>,
}

/// Queue of outstanding registrations, swept on every registration attempt.
///
/// Explicitly owned and injected — constructed once per runtime instance and
/// passed into the adapters, never a hidden singleton. A stale registration
/// (owner dead, never fired) survives only until the next unrelated
/// registration attempt, when [`sweep`](Self::sweep) cancels it.
pub struct CleanupQueue {
    entries: Mutex<Vec<Tracked>>,
}

impl CleanupQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Create a shared queue wrapped in Arc.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Track a new registration, sweeping stale ones first.
    pub fn track(&self, owner: impl Liveness + 'static, subscription: Arc<Subscription>) {
        self.sweep();

        let mut entries = self.entries.lock();
        entries.push(Tracked {
            owner: Box::new(owner),
            subscription,
        });

        if entries.len() > SWEEP_WARN_THRESHOLD {
            log::warn!(
                "[cleanup] {} registrations outstanding (threshold {})",
                entries.len(),
                SWEEP_WARN_THRESHOLD
            );
        }
    }

    /// Drop entries that already fired; cancel entries whose owner is dead.
    ///
    /// Returns the number of stale registrations cancelled. The cancel goes
    /// through the entry's [`Subscription`] guard, so a racing normal
    /// completion still deregisters exactly once.
    pub fn sweep(&self) -> usize {
        let mut cancelled = 0usize;
        let mut entries = self.entries.lock();
        entries.retain(|entry| {
            if entry.subscription.is_spent() {
                return false;
            }
            if entry.owner.is_alive() {
                return true;
            }
            if entry.subscription.cancel() {
                cancelled += 1;
            }
            false
        });
        drop(entries);

        if cancelled > 0 {
            log::debug!("[cleanup] swept {} stale registrations", cancelled);
        }
        cancelled
    }

    /// Number of tracked registrations (including ones not yet swept).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for CleanupQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::WeakHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_subscription(counter: &Arc<AtomicUsize>) -> Arc<Subscription> {
        let c = Arc::clone(counter);
        Arc::new(Subscription::armed(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_live_owner_is_retained() {
        let queue = CleanupQueue::new();
        let owner = Arc::new(());
        let deregs = Arc::new(AtomicUsize::new(0));

        queue.track(WeakHandle::new(&owner), counting_subscription(&deregs));
        assert_eq!(queue.sweep(), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(deregs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dead_owner_cancelled_on_next_track() {
        let queue = CleanupQueue::new();
        let deregs = Arc::new(AtomicUsize::new(0));

        let owner = Arc::new(());
        queue.track(WeakHandle::new(&owner), counting_subscription(&deregs));
        drop(owner);

        // Unrelated registration attempt drains the stale entry.
        let other = Arc::new(());
        queue.track(WeakHandle::new(&other), counting_subscription(&deregs));

        assert_eq!(deregs.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_fired_subscription_pruned_without_cancel() {
        let queue = CleanupQueue::new();
        let owner = Arc::new(());
        let deregs = Arc::new(AtomicUsize::new(0));

        let sub = counting_subscription(&deregs);
        queue.track(WeakHandle::new(&owner), Arc::clone(&sub));

        // Normal completion path deregisters first.
        assert!(sub.cancel());
        assert_eq!(queue.sweep(), 0);
        assert!(queue.is_empty());
        assert_eq!(deregs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sweep_race_with_fire_deregisters_once() {
        for _ in 0..100 {
            let queue = Arc::new(CleanupQueue::new());
            let deregs = Arc::new(AtomicUsize::new(0));

            let owner = Arc::new(());
            let sub = counting_subscription(&deregs);
            queue.track(WeakHandle::new(&owner), Arc::clone(&sub));
            drop(owner);

            let q = Arc::clone(&queue);
            let s = Arc::clone(&sub);
            let sweeper = std::thread::spawn(move || q.sweep());
            let firer = std::thread::spawn(move || s.cancel());

            sweeper.join().unwrap();
            firer.join().unwrap();
            assert_eq!(deregs.load(Ordering::SeqCst), 1);
        }
    }
}
