// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-candidate tracking adapter.

use crate::compat::{self, Requirement};
use crate::engine::{Fetch, Listener, Rejection, Retriever};
use crate::lifecycle::{CleanupQueue, Subscription, WeakHandle};
use crate::registry::{Candidate, CandidateEvent, Filter, FilterError, WatchCallback, WatchRegistry};
use crate::slot::Slot;
use std::sync::Arc;

/// Tracks a filtered stream of provider candidates for one id.
///
/// Several providers may satisfy one id over time. The tracker evaluates
/// each arriving candidate against the consumer's requirement until one
/// passes (fill) or the source closes (delete). Unlike [`CheckedLookup`]
/// (../checked.rs), a mismatched arrival is not terminal — the next provider
/// may fit. Tracking stops immediately once the slot resolves so a second
/// compatible provider is never delivered.
///
/// An optional candidate filter narrows the stream; a malformed filter is
/// terminal for that key at fetch time, and no subscription is created.
///
/// [`CheckedLookup`]: super::CheckedLookup
pub struct ProviderTracker<O: ?Sized + Send + Sync + 'static> {
    watch: Arc<dyn WatchRegistry>,
    cleanup: Arc<CleanupQueue>,
    owner: WeakHandle<O>,
    requirement: Requirement,
    /// Extra filter expression and-ed with `(id=<key>)`, parsed per key.
    extra_filter: Option<String>,
}

impl<O: ?Sized + Send + Sync + 'static> ProviderTracker<O> {
    pub fn new(
        watch: Arc<dyn WatchRegistry>,
        cleanup: Arc<CleanupQueue>,
        owner: WeakHandle<O>,
        requirement: Requirement,
    ) -> Self {
        Self {
            watch,
            cleanup,
            owner,
            requirement,
            extra_filter: None,
        }
    }

    /// Narrow the tracked stream with an extra filter expression.
    #[must_use]
    pub fn with_filter(mut self, expression: impl Into<String>) -> Self {
        self.extra_filter = Some(expression.into());
        self
    }

    fn build_filter(&self, key: &str) -> Result<Filter, FilterError> {
        let base = Filter::for_id(key);
        match &self.extra_filter {
            Some(expression) => Ok(base.and(Filter::parse(expression)?)),
            None => Ok(base),
        }
    }
}

impl<O: ?Sized + Send + Sync + 'static> Retriever<String, Arc<Candidate>> for ProviderTracker<O> {
    fn fetch(&self, key: &String) -> Fetch<Arc<Candidate>> {
        // Validate the filter up front so a malformed query is terminal for
        // this key before any subscription exists. Candidates themselves are
        // only delivered through the watch (the registration replays
        // already-present matches, so nothing is lost by reporting Pending).
        match self.build_filter(key) {
            Ok(_) => Fetch::Pending,
            Err(error) => Fetch::Invalid(Rejection::MalformedQuery(error)),
        }
    }
}

impl<O: ?Sized + Send + Sync + 'static> Listener<String, Arc<Candidate>> for ProviderTracker<O> {
    fn listen(&self, key: &String, slot: &Arc<Slot<Arc<Candidate>>>) {
        let filter = match self.build_filter(key) {
            Ok(filter) => filter,
            Err(error) => {
                // fetch validated the filter; reaching this means the
                // expression changed under us. Terminal either way.
                log::error!("[track] '{}' filter no longer parses: {}", key, error);
                slot.delete();
                return;
            }
        };

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
                        log::debug!("[track] owner gone, dropping watch for '{}'", key);
                        subscription.cancel();
                        return;
                    }
                    if slot.is_resolved() {
                        return;
                    }
                    match compat::check(&requirement, candidate.contract()) {
                        Ok(()) => {
                            if slot.fill(Arc::clone(candidate)) {
                                log::debug!(
                                    "[track] '{}' satisfied by seq={}",
                                    key,
                                    candidate.seq()
                                );
                            }
                            subscription.cancel();
                        }
                        Err(mismatch) => {
                            // Not terminal: the next provider may fit.
                            log::debug!(
                                "[track] '{}' candidate seq={} unsuitable ({}), still tracking",
                                key,
                                candidate.seq(),
                                mismatch
                            );
                        }
                    }
                }
                CandidateEvent::Revoked(_) => {}
                CandidateEvent::Closed => {
                    slot.delete();
                    subscription.cancel();
                }
            })
        };

        let handle = self.watch.watch(filter, callback);
        let watch = Arc::clone(&self.watch);
        subscription.arm(move || {
            watch.unwatch(handle);
        });
        self.cleanup.track(self.owner.clone(), subscription);
    }
}
