// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory candidate registry with filtered push notification.
//!
//! Reference implementation of the two capabilities the adapters consume:
//! synchronous lookup by id ([`LookupById`]) and filtered change subscription
//! ([`WatchRegistry`]). Candidates are announced and revoked at arbitrary
//! times by arbitrary threads; watch callbacks are delivered by a dedicated
//! dispatcher thread, so push notifications genuinely arrive from a foreign
//! thread.
//!
//! # Delivery Guarantees
//!
//! - A watcher registered with [`WatchRegistry::watch`] is replayed every
//!   already-present matching candidate synchronously before `watch` returns,
//!   so registration never misses an announcement.
//! - The replay may race the dispatcher and deliver the same candidate twice.
//!   Consumers absorb duplicates through slot write-once semantics.
//! - An unwatched watcher may still observe one in-flight event that was
//!   snapshotted before removal. Same absorption rule applies.
//! - [`CandidateRegistry::close`] delivers `Closed` to every watcher exactly
//!   once, then stops the dispatcher.
//!
//! # Thread Safety
//!
//! Storage is sharded (`DashMap`), read-mostly, accessed without batch-level
//! locking. The watcher table lock is never held while a callback runs.

mod filter;

pub use filter::{Filter, FilterError};

use crate::compat::Contract;
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// What role a candidate can fill in a delegate chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A shared or common library.
    Library,
    /// A class provider.
    Provider,
}

impl CandidateKind {
    /// The value the filter attribute `kind` matches against.
    pub fn label(self) -> &'static str {
        match self {
            CandidateKind::Library => "library",
            CandidateKind::Provider => "provider",
        }
    }
}

/// One concrete value that might satisfy a requested id.
#[derive(Debug, Clone)]
pub struct Candidate {
    id: Arc<str>,
    kind: CandidateKind,
    ranking: i32,
    /// Announcement order, assigned by the registry. Breaks ranking ties
    /// (earliest wins) so repeated lookups stay stable while candidates churn.
    seq: u64,
    contract: Contract,
    attributes: HashMap<String, String>,
}

impl Candidate {
    /// New candidate with ranking 0 and no extra attributes.
    pub fn new(id: impl Into<Arc<str>>, kind: CandidateKind, contract: Contract) -> Self {
        Self {
            id: id.into(),
            kind,
            ranking: 0,
            seq: 0,
            contract,
            attributes: HashMap::new(),
        }
    }

    /// Set the ranking (builder style). Highest ranking wins a lookup.
    #[must_use]
    pub fn with_ranking(mut self, ranking: i32) -> Self {
        self.ranking = ranking;
        self
    }

    /// Add a filterable attribute (builder style).
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    pub fn ranking(&self) -> i32 {
        self.ranking
    }

    /// Announcement sequence number (0 until announced).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Attribute view used by filter evaluation: `id` and `kind` are
    /// built-in, everything else reads the attribute map.
    pub fn attr(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "kind" => Some(self.kind.label()),
            other => self.attributes.get(other).map(String::as_str),
        }
    }
}

/// One "candidate changed" notification.
#[derive(Debug, Clone)]
pub enum CandidateEvent {
    /// A candidate became available.
    Announced(Arc<Candidate>),
    /// A candidate was withdrawn. Transient — it may be re-announced.
    Revoked(Arc<Candidate>),
    /// The registry shut down; nothing further will ever arrive.
    Closed,
}

/// Opaque handle identifying one watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

impl WatchHandle {
    /// Build a handle from its raw id (for alternative registry backends).
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Callback invoked by the dispatcher for each matching event.
pub type WatchCallback = Box<dyn Fn(&CandidateEvent) + Send + Sync>;

/// Synchronous lookup capability.
pub trait LookupById: Send + Sync {
    /// Best candidate for `id`: highest ranking, ties broken by earliest
    /// announcement.
    fn lookup(&self, id: &str) -> Option<Arc<Candidate>>;

    /// All candidates for `id`, best first.
    fn lookup_all(&self, id: &str) -> Vec<Arc<Candidate>>;
}

/// Filtered change-subscription capability.
pub trait WatchRegistry: Send + Sync {
    /// Register `callback` for events matching `filter`.
    ///
    /// Already-present matching candidates are replayed synchronously as
    /// `Announced` before this returns.
    fn watch(&self, filter: Filter, callback: WatchCallback) -> WatchHandle;

    /// Remove a registration. Returns whether the handle was still active.
    fn unwatch(&self, handle: WatchHandle) -> bool;
}

struct Watcher {
    id: u64,
    filter: Filter,
    callback: WatchCallback,
}

type WatcherTable = Arc<Mutex<Vec<Arc<Watcher>>>>;

/// Shared, read-mostly candidate store with an event dispatcher thread.
pub struct CandidateRegistry {
    entries: DashMap<Arc<str>, Vec<Arc<Candidate>>>,
    watchers: WatcherTable,
    next_seq: AtomicU64,
    next_watch_id: AtomicU64,
    tx: Sender<CandidateEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl CandidateRegistry {
    /// Create a registry and start its dispatcher thread.
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(crate::config::EVENT_CHANNEL_BOUND);
        let watchers: WatcherTable = Arc::new(Mutex::new(Vec::new()));

        let pump_watchers = Arc::clone(&watchers);
        #[allow(clippy::expect_used)] // thread spawn only fails on resource exhaustion at startup
        let pump = std::thread::Builder::new()
            .name("muster-registry".to_string())
            .spawn(move || dispatch_loop(&rx, &pump_watchers))
            .expect("registry dispatcher thread spawn");

        Self {
            entries: DashMap::new(),
            watchers,
            next_seq: AtomicU64::new(0),
            next_watch_id: AtomicU64::new(0),
            tx,
            pump: Mutex::new(Some(pump)),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a shared registry wrapped in Arc.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make `candidate` available, assigning its announcement sequence.
    ///
    /// Returns the stored candidate. After [`close`](Self::close) the
    /// announcement is ignored and the candidate comes back unsequenced
    /// (`seq` stays 0), since no sequence was issued for it.
    pub fn announce(&self, mut candidate: Candidate) -> Arc<Candidate> {
        if self.closed.load(Ordering::Acquire) {
            log::warn!("[registry] announce '{}' after close, ignored", candidate.id());
            return Arc::new(candidate);
        }

        candidate.seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let candidate = Arc::new(candidate);

        self.entries
            .entry(Arc::clone(&candidate.id))
            .or_default()
            .push(Arc::clone(&candidate));

        log::debug!(
            "[registry] announced '{}' kind={} ranking={} seq={}",
            candidate.id(),
            candidate.kind().label(),
            candidate.ranking(),
            candidate.seq()
        );

        if self
            .tx
            .send(CandidateEvent::Announced(Arc::clone(&candidate)))
            .is_err()
        {
            log::debug!("[registry] dispatcher gone, announce event dropped");
        }
        candidate
    }

    /// Withdraw the candidate with the given announcement sequence.
    pub fn revoke(&self, id: &str, seq: u64) -> Option<Arc<Candidate>> {
        let removed = {
            let mut entry = self.entries.get_mut(id)?;
            let index = entry.iter().position(|c| c.seq == seq)?;
            let removed = entry.remove(index);
            if entry.is_empty() {
                drop(entry);
                self.entries.remove_if(id, |_, v| v.is_empty());
            }
            removed
        };

        log::debug!("[registry] revoked '{}' seq={}", removed.id(), removed.seq());
        if self
            .tx
            .send(CandidateEvent::Revoked(Arc::clone(&removed)))
            .is_err()
        {
            log::debug!("[registry] dispatcher gone, revoke event dropped");
        }
        Some(removed)
    }

    /// Shut down: deliver `Closed` to every watcher, stop the dispatcher.
    ///
    /// Idempotent. Later announces are ignored; later watches observe
    /// `Closed` immediately.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("[registry] closing");
        if self.tx.send(CandidateEvent::Closed).is_err() {
            log::debug!("[registry] dispatcher already gone at close");
        }
        if let Some(pump) = self.pump.lock().take() {
            // The last registry handle can be released by the dispatcher
            // itself: a late notification unwatches, the event snapshot
            // drops, and this close runs on the pump thread. Joining the
            // current thread would deadlock; detach instead and let the
            // pump drain its queued Closed on the way out.
            if pump.thread().id() == std::thread::current().id() {
                log::debug!("[registry] close on dispatcher thread, detaching pump");
            } else if pump.join().is_err() {
                log::error!("[registry] dispatcher thread panicked");
            }
        }
    }

    /// Has [`close`](Self::close) been called?
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Total candidates currently stored (tests and diagnostics).
    pub fn candidate_count(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }
}

impl Default for CandidateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CandidateRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

impl LookupById for CandidateRegistry {
    fn lookup(&self, id: &str) -> Option<Arc<Candidate>> {
        self.entries.get(id).and_then(|entry| {
            entry
                .iter()
                .max_by_key(|c| (c.ranking, Reverse(c.seq)))
                .cloned()
        })
    }

    fn lookup_all(&self, id: &str) -> Vec<Arc<Candidate>> {
        let mut all: Vec<Arc<Candidate>> = self
            .entries
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        all.sort_by_key(|c| (Reverse(c.ranking), c.seq));
        all
    }
}

impl WatchRegistry for CandidateRegistry {
    fn watch(&self, filter: Filter, callback: WatchCallback) -> WatchHandle {
        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed) + 1;
        let watcher = Arc::new(Watcher {
            id,
            filter,
            callback,
        });
        self.watchers.lock().push(Arc::clone(&watcher));
        log::debug!("[registry] watch {} registered: {}", id, watcher.filter);

        // Replay existing matches after registration so nothing announced
        // between the snapshot and the table insert can be missed. The
        // watcher table lock is not held here.
        for entry in self.entries.iter() {
            for candidate in entry.value() {
                if watcher.filter.matches(candidate) {
                    (watcher.callback)(&CandidateEvent::Announced(Arc::clone(candidate)));
                }
            }
        }

        if self.closed.load(Ordering::Acquire) {
            (watcher.callback)(&CandidateEvent::Closed);
        }

        WatchHandle(id)
    }

    fn unwatch(&self, handle: WatchHandle) -> bool {
        let mut watchers = self.watchers.lock();
        let before = watchers.len();
        watchers.retain(|w| w.id != handle.0);
        let removed = watchers.len() != before;
        drop(watchers);
        if removed {
            log::debug!("[registry] watch {} deregistered", handle.0);
        }
        removed
    }
}

/// Dispatcher thread body: deliver each queued event to the matching
/// watchers, snapshotting the table so callbacks can unwatch freely.
fn dispatch_loop(rx: &Receiver<CandidateEvent>, watchers: &WatcherTable) {
    while let Ok(event) = rx.recv() {
        let snapshot: Vec<Arc<Watcher>> = watchers.lock().clone();
        match &event {
            CandidateEvent::Closed => {
                for watcher in &snapshot {
                    (watcher.callback)(&event);
                }
                watchers.lock().clear();
                log::debug!("[registry] dispatcher stopped ({} watchers notified)", snapshot.len());
                return;
            }
            CandidateEvent::Announced(c) | CandidateEvent::Revoked(c) => {
                for watcher in &snapshot {
                    if watcher.filter.matches(c) {
                        (watcher.callback)(&event);
                    }
                }
            }
        }
    }
}
