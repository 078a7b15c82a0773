// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compatibility-checked lookup adapter.

use crate::compat::{self, Requirement};
use crate::engine::{Fetch, Listener, Rejection, Retriever};
use crate::lifecycle::{CleanupQueue, Subscription, WeakHandle};
use crate::registry::{Candidate, CandidateEvent, Filter, LookupById, WatchCallback, WatchRegistry};
use crate::slot::Slot;
use std::sync::Arc;

/// Fetch-by-id plus a contract check between consumer and candidate.
///
/// Absence is transient and retried via the listener. Presence with a
/// mismatched contract is terminal: the slot is deleted without waiting and
/// the key is never retried, on the synchronous path and the asynchronous
/// path alike.
pub struct CheckedLookup<O: ?Sized + Send + Sync + 'static> {
    lookup: Arc<dyn LookupById>,
    watch: Arc<dyn WatchRegistry>,
    cleanup: Arc<CleanupQueue>,
    owner: WeakHandle<O>,
    requirement: Requirement,
}

impl<O: ?Sized + Send + Sync + 'static> CheckedLookup<O> {
    pub fn new(
        lookup: Arc<dyn LookupById>,
        watch: Arc<dyn WatchRegistry>,
        cleanup: Arc<CleanupQueue>,
        owner: WeakHandle<O>,
        requirement: Requirement,
    ) -> Self {
        Self {
            lookup,
            watch,
            cleanup,
            owner,
            requirement,
        }
    }
}

impl<O: ?Sized + Send + Sync + 'static> Retriever<String, Arc<Candidate>> for CheckedLookup<O> {
    fn fetch(&self, key: &String) -> Fetch<Arc<Candidate>> {
        match self.lookup.lookup(key) {
            Some(candidate) => match compat::check(&self.requirement, candidate.contract()) {
                Ok(()) => Fetch::Ready(candidate),
                Err(mismatch) => Fetch::Invalid(Rejection::Incompatible(mismatch)),
            },
            None => Fetch::Pending,
        }
    }
}

impl<O: ?Sized + Send + Sync + 'static> Listener<String, Arc<Candidate>> for CheckedLookup<O> {
    fn listen(&self, key: &String, slot: &Arc<Slot<Arc<Candidate>>>) {
        let subscription = Arc::new(Subscription::unarmed());

        let callback: WatchCallback = {
            let subscription = Arc::clone(&subscription);
            let slot = Arc::clone(slot);
            let owner = self.owner.clone();
            let requirement = self.requirement.clone();
            let key = key.clone();
            Box::new(move |event| match event {
                CandidateEvent::Announced(candidate) => {
                    if !owner.is_alive() {
                        log::debug!("[resolve] owner gone, dropping watch for '{}'", key);
                        subscription.cancel();
                        return;
                    }
                    // The same validity gate as fetch, re-applied to the
                    // delivered candidate. A mismatch is terminal here too.
                    match compat::check(&requirement, candidate.contract()) {
                        Ok(()) => {
                            if slot.fill(Arc::clone(candidate)) {
                                log::debug!("[resolve] '{}' arrived asynchronously", key);
                            }
                        }
                        Err(mismatch) => {
                            log::warn!("[resolve] '{}' async candidate rejected: {}", key, mismatch);
                            slot.delete();
                        }
                    }
                    subscription.cancel();
                }
                CandidateEvent::Revoked(_) => {}
                CandidateEvent::Closed => {
                    slot.delete();
                    subscription.cancel();
                }
            })
        };

        let handle = self.watch.watch(Filter::for_id(key), callback);
        let watch = Arc::clone(&self.watch);
        subscription.arm(move || {
            watch.unwatch(handle);
        });
        self.cleanup.track(self.owner.clone(), subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::{Contract, Scope};
    use crate::engine::resolve;
    use crate::registry::{CandidateKind, CandidateRegistry};
    use std::thread;
    use std::time::Duration;

    fn offer(id: &str, api_level: u32) -> Candidate {
        Candidate::new(
            id,
            CandidateKind::Library,
            Contract::new(Scope::Shared, api_level),
        )
    }

    fn adapter(registry: &Arc<CandidateRegistry>, owner: &Arc<()>) -> CheckedLookup<()> {
        CheckedLookup::new(
            Arc::clone(registry) as Arc<dyn LookupById>,
            Arc::clone(registry) as Arc<dyn WatchRegistry>,
            CleanupQueue::shared(),
            WeakHandle::new(owner),
            Requirement::new(Scope::Shared, 3),
        )
    }

    #[test]
    fn test_compatible_candidate_resolves_synchronously() {
        let registry = CandidateRegistry::shared();
        registry.announce(offer("lib", 4));
        let owner = Arc::new(());
        let adapter = adapter(&registry, &owner);

        let out = resolve(
            &["lib".to_string()],
            Duration::from_secs(2),
            &adapter,
            &adapter,
            |_| panic!("no timeout expected"),
        );
        assert_eq!(out.len(), 1);
        registry.close();
    }

    #[test]
    fn test_mismatch_is_terminal_without_waiting() {
        let registry = CandidateRegistry::shared();
        registry.announce(offer("old", 1));
        let owner = Arc::new(());
        let adapter = adapter(&registry, &owner);

        let start = std::time::Instant::now();
        let out = resolve(
            &["old".to_string()],
            Duration::from_secs(5),
            &adapter,
            &adapter,
            |_| panic!("terminal rejection, not timeout"),
        );

        assert!(out.is_empty());
        assert!(start.elapsed() < Duration::from_millis(500));
        registry.close();
    }

    #[test]
    fn test_async_mismatch_deletes_instead_of_filling() {
        let registry = CandidateRegistry::shared();
        let owner = Arc::new(());
        let adapter = adapter(&registry, &owner);

        let r = Arc::clone(&registry);
        let announcer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            r.announce(offer("late-old", 1));
        });

        let start = std::time::Instant::now();
        let out = resolve(
            &["late-old".to_string()],
            Duration::from_secs(5),
            &adapter,
            &adapter,
            |_| panic!("terminal rejection, not timeout"),
        );

        assert!(out.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
        announcer.join().unwrap();
        registry.close();
    }

    #[test]
    fn test_async_compatible_candidate_fills() {
        let registry = CandidateRegistry::shared();
        let owner = Arc::new(());
        let adapter = adapter(&registry, &owner);

        let r = Arc::clone(&registry);
        let announcer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            r.announce(offer("late-new", 7));
        });

        let out = resolve(
            &["late-new".to_string()],
            Duration::from_secs(5),
            &adapter,
            &adapter,
            |_| panic!("no timeout expected"),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].contract().api_level, 7);
        announcer.join().unwrap();
        registry.close();
    }
}
