// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simple registry lookup adapter.

use crate::engine::{Fetch, Listener, Retriever};
use crate::lifecycle::{CleanupQueue, Subscription, WeakHandle};
use crate::registry::{Candidate, CandidateEvent, Filter, LookupById, WatchCallback, WatchRegistry};
use crate::slot::Slot;
use std::sync::Arc;

/// Fetch-by-id with a `(id=<key>)` watch fallback.
///
/// Absence is transient: the listener re-attempts the identical lookup on
/// every matching announcement, so the ranking tie-break applies to late
/// arrivals exactly as it does to the synchronous path.
pub struct DirectLookup<O: ?Sized + Send + Sync + 'static> {
    lookup: Arc<dyn LookupById>,
    watch: Arc<dyn WatchRegistry>,
    cleanup: Arc<CleanupQueue>,
    owner: WeakHandle<O>,
}

impl<O: ?Sized + Send + Sync + 'static> DirectLookup<O> {
    pub fn new(
        lookup: Arc<dyn LookupById>,
        watch: Arc<dyn WatchRegistry>,
        cleanup: Arc<CleanupQueue>,
        owner: WeakHandle<O>,
    ) -> Self {
        Self {
            lookup,
            watch,
            cleanup,
            owner,
        }
    }
}

impl<O: ?Sized + Send + Sync + 'static> Retriever<String, Arc<Candidate>> for DirectLookup<O> {
    fn fetch(&self, key: &String) -> Fetch<Arc<Candidate>> {
        match self.lookup.lookup(key) {
            Some(candidate) => Fetch::Ready(candidate),
            None => Fetch::Pending,
        }
    }
}

impl<O: ?Sized + Send + Sync + 'static> Listener<String, Arc<Candidate>> for DirectLookup<O> {
    fn listen(&self, key: &String, slot: &Arc<Slot<Arc<Candidate>>>) {
        let subscription = Arc::new(Subscription::unarmed());

        let callback: WatchCallback = {
            let subscription = Arc::clone(&subscription);
            let slot = Arc::clone(slot);
            let owner = self.owner.clone();
            let lookup = Arc::clone(&self.lookup);
            let key = key.clone();
            Box::new(move |event| match event {
                CandidateEvent::Announced(_) => {
                    if !owner.is_alive() {
                        log::debug!("[resolve] owner gone, dropping watch for '{}'", key);
                        subscription.cancel();
                        return;
                    }
                    // Re-attempt the identical lookup rather than trusting
                    // the event payload: ranking may prefer another candidate.
                    if let Some(candidate) = lookup.lookup(&key) {
                        if slot.fill(candidate) {
                            log::debug!("[resolve] '{}' arrived asynchronously", key);
                        }
                        subscription.cancel();
                    }
                }
                CandidateEvent::Revoked(_) => {}
                CandidateEvent::Closed => {
                    // Nothing can arrive from a closed registry.
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
