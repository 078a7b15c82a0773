// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete Retriever + Listener pairs over the candidate registry.
//!
//! Each adapter implements both [`Retriever`](crate::engine::Retriever) and
//! [`Listener`](crate::engine::Listener) for `String` keys resolving to
//! `Arc<Candidate>`, and shares the same lifecycle discipline:
//!
//! - the listener holds only a [`WeakHandle`](crate::lifecycle::WeakHandle)
//!   to its owner and checks liveness before acting on a notification;
//! - every registration is guarded by a
//!   [`Subscription`](crate::lifecycle::Subscription) and tracked in the
//!   injected [`CleanupQueue`](crate::lifecycle::CleanupQueue);
//! - a notification arriving after the batch has returned still deregisters
//!   correctly — it just can no longer affect the delivered result.
//!
//! Failure semantics, all adapters: transient absence retries via listener
//! until the batch deadline; structural incompatibility is terminal, never
//! retried; a malformed lookup filter is terminal for that single key only
//! and never aborts the rest of the batch.

mod checked;
mod direct;
mod tracking;

pub use checked::CheckedLookup;
pub use direct::DirectLookup;
pub use tracking::ProviderTracker;
