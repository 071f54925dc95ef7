//! Worker Operations and the Worker Contract
//!
//! Sessions talk to their owning worker through [`WorkerOp`] values: small
//! session-directed state changes queued onto the worker's run loop. Each
//! operation carries the id of the session it belongs to so a worker can
//! hand back the operations of exactly one session during migration.

use std::fmt;
use std::sync::Arc;

/// Unique identifier of a session, assigned at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A state change the reactor should apply to a session on its next loop
/// iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// Register write-interest for the session's socket.
    RegisterWrite,
    /// Stop reading from the session's socket.
    PauseReads,
    /// Resume reading from the session's socket.
    ResumeReads,
    /// Close the session from the reactor side.
    Close,
}

/// A session-directed operation queued on a worker's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOp {
    /// The session this operation belongs to.
    pub session_id: SessionId,
    /// The state change to apply.
    pub op: SessionOp,
}

impl WorkerOp {
    /// Creates an operation directed at `session_id`.
    pub fn new(session_id: SessionId, op: SessionOp) -> Self {
        Self { session_id, op }
    }
}

/// The contract a reactor worker exposes to its sessions.
///
/// Implementations must be non-blocking and must not call back into the
/// session from `offer`, `offer_batch`, or `extract_session_ops`: sessions
/// invoke these while holding their own affinity lock to keep delivery
/// ordered across migrations.
pub trait Worker: Send + Sync {
    /// Human-readable worker name, used in logs.
    fn name(&self) -> &str;

    /// Enqueues one operation on the worker's run loop.
    fn offer(&self, op: WorkerOp);

    /// Enqueues a batch of operations, preserving their order.
    fn offer_batch(&self, ops: Vec<WorkerOp>);

    /// Removes and returns every queued-but-not-yet-run operation belonging
    /// to `session_id`, preserving their relative order.
    ///
    /// Called during migration so operations queued against the old owner
    /// are not executed in a soon-to-be-wrong context.
    fn extract_session_ops(&self, session_id: SessionId) -> Vec<WorkerOp>;
}

/// Compares two worker handles for identity (same allocation).
pub fn same_worker(a: &Arc<dyn Worker>, b: &Arc<dyn Worker>) -> bool {
    // Compare data pointers only; two Arcs to the same allocation may carry
    // differently-sourced vtable pointers.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
