//! Bounded Send-Permit Pool
//!
//! A small mutex + condvar pool bounding the number of backpressure-subject
//! writes outstanding on one session. Producers block in [`PermitPool::acquire`]
//! when the pool is exhausted; the owning worker calls
//! [`PermitPool::release`] as it dequeues writes for transmission.
//!
//! Closing the pool invalidates it: every current waiter is woken and every
//! future `acquire` returns immediately without consuming anything.
//! Backpressure has no meaning on a dead session, so close is the bulk
//! release path for all permits still held by queued writes.

use std::sync::{Condvar, Mutex};

#[derive(Debug)]
struct State {
    /// Permits currently available for acquisition.
    available: usize,
    /// Set once by `close`; never cleared.
    closed: bool,
}

/// A bounded pool of send permits with an invalidate-all close.
///
/// Acquisition blocks uninterruptibly; there is no timeout. The stall is
/// bounded in practice by the connection-level timeout and the
/// recovery-overflow close path, both of which end in [`PermitPool::close`].
#[derive(Debug)]
pub struct PermitPool {
    state: Mutex<State>,
    cond: Condvar,
    limit: usize,
}

impl PermitPool {
    /// Creates a pool holding `limit` permits.
    pub fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(State {
                available: limit,
                closed: false,
            }),
            cond: Condvar::new(),
            limit,
        }
    }

    /// Acquires one permit, blocking until one is available.
    ///
    /// Returns immediately without consuming a permit if the pool has been
    /// closed (before or during the wait).
    pub fn acquire(&self) {
        let mut state = self.state.lock().unwrap();
        while state.available == 0 && !state.closed {
            state = self.cond.wait(state).unwrap();
        }
        if !state.closed {
            state.available -= 1;
        }
    }

    /// Returns one permit to the pool and wakes a single waiter.
    ///
    /// No-op on a closed pool. The count is clamped at the configured limit
    /// so a stray double-release cannot widen the bound.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        if state.available < self.limit {
            state.available += 1;
        }
        drop(state);
        self.cond.notify_one();
    }

    /// Invalidates the pool, waking all current waiters and letting all
    /// future acquirers through. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.cond.notify_all();
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        self.state.lock().unwrap().available
    }

    /// Returns `true` once the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// The configured pool size.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
