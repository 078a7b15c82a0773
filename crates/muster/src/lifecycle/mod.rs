// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collection-safe listener lifecycle.
//!
//! A push listener is registered against a long-lived registry but is
//! logically tied to an owner (a loader, an assembler) that may become
//! unreachable before its dependency ever arrives. A strong reference chain
//! from the registry back to the owner would pin the owner forever.
//!
//! This module keeps the chain weak:
//!
//! - [`WeakHandle`] — explicit non-owning owner handle with a liveness check.
//! - [`Subscription`] — single-shot cancel guard; whichever of {normal fire,
//!   dead-owner sweep, registry close} acts first performs the underlying
//!   deregistration, exactly once.
//! - [`CleanupQueue`] — explicitly-owned queue of outstanding registrations,
//!   swept on every new registration attempt.
//!
//! Net effect: a subscription is retained no longer than "until it fires" or
//! "until the next registration attempt after its owner dies".

mod cleanup;
mod subscription;
mod weak_handle;

pub use cleanup::CleanupQueue;
pub use subscription::Subscription;
pub use weak_handle::WeakHandle;

/// Type-erased owner liveness check.
///
/// Lets one [`CleanupQueue`] track owners of different concrete types.
pub trait Liveness: Send + Sync {
    /// Is the owner still reachable?
    fn is_alive(&self) -> bool;
}
