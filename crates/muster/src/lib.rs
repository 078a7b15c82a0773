// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Muster — bounded-wait dependency resolution
//!
//! A module host assembling a loader's delegate chain needs resources —
//! shared libraries, common libraries, class providers — that may not exist
//! in the runtime registry yet at the moment they are requested. Muster turns
//! an ordered list of requested ids into an ordered list of resolved
//! candidates under one shared deadline: fetch synchronously, fall back to a
//! push subscription, block until everything resolves or the deadline passes,
//! and never leak a subscription past the life of its owner.
//!
//! ## Quick Start
//!
//! ```rust
//! use muster::{
//!     Candidate, CandidateKind, CandidateRegistry, ChainAssembler, ChainRequest,
//!     CleanupQueue, Contract, Requirement, Scope,
//! };
//!
//! let registry = CandidateRegistry::shared();
//! registry.announce(Candidate::new(
//!     "commons-io",
//!     CandidateKind::Library,
//!     Contract::new(Scope::Shared, 3),
//! ));
//!
//! let assembler = ChainAssembler::new(registry.clone(), CleanupQueue::shared());
//! let mut request = ChainRequest::new(Requirement::new(Scope::Shared, 1));
//! request.shared_libs.push("commons-io".to_string());
//!
//! let chain = assembler.assemble(&request);
//! assert_eq!(chain.ids(), vec!["commons-io"]);
//! registry.close();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Chain Assembly                              |
//! |   ChainRequest -> DirectLookup / CheckedLookup / ProviderTracker   |
//! +--------------------------------------------------------------------+
//! |                       Resolution Engine                            |
//! |   resolve(): fetch pass -> listener registration -> bounded wait   |
//! +--------------------------------------------------------------------+
//! |          Slots            |        Listener Lifecycle              |
//! |   write-once cells with   |   WeakHandle + Subscription +          |
//! |   condvar bounded wait    |   CleanupQueue sweep                   |
//! +--------------------------------------------------------------------+
//! |                      Candidate Registry                            |
//! |   DashMap storage | filter watches | dispatcher thread | ranking   |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Failure Model
//!
//! Transient absence retries via subscription until the batch deadline.
//! Structural incompatibility and malformed filters are terminal for that
//! key only. Timeouts are advisory — `resolve` always returns a best-effort
//! partial sequence, and deciding whether an absent link is fatal belongs to
//! the consumer.

pub mod adapters;
pub mod assembly;
pub mod compat;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod registry;
pub mod slot;

pub use adapters::{CheckedLookup, DirectLookup, ProviderTracker};
pub use assembly::{ChainAssembler, ChainLink, ChainRequest, DelegateChain, LinkRole};
pub use compat::{Contract, Mismatch, Requirement, Scope};
pub use config::RuntimeOptions;
pub use engine::{resolve, Fetch, Listener, Rejection, Retriever};
pub use lifecycle::{CleanupQueue, Liveness, Subscription, WeakHandle};
pub use registry::{
    Candidate, CandidateEvent, CandidateKind, CandidateRegistry, Filter, FilterError, LookupById,
    WatchCallback, WatchHandle, WatchRegistry,
};
pub use slot::{Slot, WaitOutcome};
