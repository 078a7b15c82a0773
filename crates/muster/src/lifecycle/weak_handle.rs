// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Explicit non-owning owner handle.

use super::Liveness;
use std::sync::{Arc, Weak};

/// Non-owning handle to an owner, checked for liveness before acting.
///
/// A notification callback holds one of these instead of an `Arc` so the
/// registry never keeps a collectible owner alive. `get()` upgrades for the
/// duration of one action; `is_alive()` is the cheap probe the cleanup sweep
/// uses.
pub struct WeakHandle<T: ?Sized> {
    inner: Weak<T>,
}

impl<T: ?Sized> WeakHandle<T> {
    /// Create a handle to `owner` without extending its lifetime.
    pub fn new(owner: &Arc<T>) -> Self {
        Self {
            inner: Arc::downgrade(owner),
        }
    }

    /// Upgrade to a strong reference, if the owner is still reachable.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.upgrade()
    }

    /// Is the owner still reachable?
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync> Liveness for WeakHandle<T> {
    fn is_alive(&self) -> bool {
        WeakHandle::is_alive(self)
    }
}
