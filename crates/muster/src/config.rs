// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide constants and runtime-tunable options.
//!
//! Constants are the single source of truth — never hardcode these values
//! elsewhere. Runtime-tunable values live in [`RuntimeOptions`], owned by
//! whoever constructs them and read lock-free through `ArcSwap`.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Default bounded wait for one resolve batch.
///
/// Long enough for a provider announced during startup to arrive, short
/// enough that a genuinely absent dependency does not stall assembly.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound of the registry event channel feeding the dispatcher thread.
///
/// Announce/revoke bursts beyond this apply backpressure to the announcer
/// rather than growing unbounded.
pub const EVENT_CHANNEL_BOUND: usize = 256;

/// Outstanding-registration count above which the cleanup queue warns.
pub const SWEEP_WARN_THRESHOLD: usize = 64;

/// Runtime-tunable options read by the assembly layer.
///
/// Reads are lock-free (`ArcSwap`); writes are rare (operator reconfig).
pub struct RuntimeOptions {
    default_timeout: ArcSwap<Duration>,
}

impl RuntimeOptions {
    /// Options with crate defaults.
    pub fn new() -> Self {
        Self {
            default_timeout: ArcSwap::from_pointee(DEFAULT_RESOLVE_TIMEOUT),
        }
    }

    /// Current per-batch resolve timeout.
    pub fn default_timeout(&self) -> Duration {
        **self.default_timeout.load()
    }

    /// Replace the per-batch resolve timeout.
    pub fn set_default_timeout(&self, timeout: Duration) {
        self.default_timeout.store(Arc::new(timeout));
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self::new()
    }
}
