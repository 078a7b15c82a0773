// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resolution latency benchmarks.
//!
//! Measures the synchronous fast path (every key ready at fetch time — the
//! common case once a host is warm) and the raw slot fill/observe cycle.

#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use muster::{
    resolve, Candidate, CandidateKind, CandidateRegistry, CleanupQueue, Contract, DirectLookup,
    LookupById, Scope, Slot, WatchRegistry, WeakHandle,
};
use std::sync::Arc;
use std::time::Duration;

fn bench_synchronous_batch(c: &mut Criterion) {
    let registry = CandidateRegistry::shared();
    for i in 0..32 {
        registry.announce(Candidate::new(
            format!("lib-{i}"),
            CandidateKind::Library,
            Contract::new(Scope::Shared, 1),
        ));
    }
    let owner = Arc::new(());
    let adapter = DirectLookup::new(
        Arc::clone(&registry) as Arc<dyn LookupById>,
        Arc::clone(&registry) as Arc<dyn WatchRegistry>,
        CleanupQueue::shared(),
        WeakHandle::new(&owner),
    );
    let keys: Vec<String> = (0..32).map(|i| format!("lib-{i}")).collect();

    c.bench_function("resolve_32_keys_all_ready", |b| {
        b.iter(|| {
            let out = resolve(
                black_box(&keys),
                Duration::from_secs(1),
                &adapter,
                &adapter,
                |_| {},
            );
            assert_eq!(out.len(), 32);
            out
        });
    });

    registry.close();
}

fn bench_slot_fill_observe(c: &mut Criterion) {
    c.bench_function("slot_fill_and_observe", |b| {
        b.iter(|| {
            let slot = Slot::new();
            slot.fill(black_box(42u64));
            slot.try_get().unwrap()
        });
    });
}

criterion_group!(benches, bench_synchronous_batch, bench_slot_fill_observe);
criterion_main!(benches);
