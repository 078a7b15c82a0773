// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-shot cancel guard around one registry deregistration.

use parking_lot::Mutex;

enum State {
    /// Created, deregister action not attached yet (the watch handle does not
    /// exist until registration returns, but the callback may fire during the
    /// registration's synchronous replay).
    Unarmed,
    /// Deregister action attached, not yet run.
    Armed(Box<dyn FnOnce() + Send>),
    /// Deregister action has run (or cancellation preceded arming).
    Spent,
}

/// Guard ensuring the underlying deregistration runs exactly once.
///
/// Three paths race to deregister a watch: the callback completing normally,
/// the cleanup sweep finding the owner dead, and registry close. Whichever
/// calls [`cancel`](Self::cancel) first takes the action out of the guard and
/// runs it; everyone else sees an empty guard.
///
/// Creation is two-phase because the deregister action needs the watch handle,
/// which only exists after registration — and registration itself may invoke
/// the callback (synchronous replay of already-present candidates). A guard
/// cancelled while still unarmed runs the action immediately when it arrives.
pub struct Subscription {
    state: Mutex<State>,
}

impl Subscription {
    /// Create an unarmed guard. Attach the deregister action with
    /// [`arm`](Self::arm) once registration has returned a handle.
    pub fn unarmed() -> Self {
        Self {
            state: Mutex::new(State::Unarmed),
        }
    }

    /// Create a guard already carrying its deregister action.
    pub fn armed(deregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            state: Mutex::new(State::Armed(Box::new(deregister))),
        }
    }

    /// Attach the deregister action.
    ///
    /// If the guard was already cancelled while unarmed, the action runs
    /// immediately — the registration it refers to is already stale.
    pub fn arm(&self, deregister: impl FnOnce() + Send + 'static) {
        let run_now = {
            let mut state = self.state.lock();
            match *state {
                State::Unarmed => {
                    *state = State::Armed(Box::new(deregister));
                    return;
                }
                State::Spent => true,
                // Double-arm indicates a caller bug; keep the first action.
                State::Armed(_) => false,
            }
        };
        if run_now {
            deregister();
        }
    }

    /// Run the deregister action if nobody has yet.
    ///
    /// Returns `true` if this call performed the deregistration.
    pub fn cancel(&self) -> bool {
        let action = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Spent) {
                State::Armed(f) => Some(f),
                State::Unarmed | State::Spent => None,
            }
        };
        match action {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    /// Has the guard already been consumed?
    pub fn is_spent(&self) -> bool {
        matches!(*self.state.lock(), State::Spent)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.state.lock() {
            State::Unarmed => "Unarmed",
            State::Armed(_) => "Armed",
            State::Spent => "Spent",
        };
        f.debug_struct("Subscription").field("state", &state).finish()
    }
}
