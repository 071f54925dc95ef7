//! Reactor Worker Module
//!
//! A worker is a reactor thread that owns a disjoint subset of sessions,
//! drains their write queues when the underlying sockets are writable, and
//! runs session-directed state changes from its own run queue.
//!
//! The event loop itself (readiness polling, socket syscalls) lives outside
//! this crate; sessions only need the narrow [`Worker`] contract to forward
//! operations and to reclaim already-queued operations during migration.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐   offer / offer_batch   ┌──────────────────────┐
//!  │   Session    │────────────────────────>│       Worker         │
//!  │  (affinity)  │                         │  ┌────────────────┐  │
//!  │              │<────────────────────────│  │   run queue    │  │
//!  └──────────────┘  extract_session_ops    │  └────────────────┘  │
//!                    (migration reclaim)    └──────────────────────┘
//! ```
//!
//! [`RunQueueWorker`] is the in-crate implementation used by the demo binary
//! and the test suite.

pub mod ops;
pub mod run_queue;

// Re-export commonly used types
pub use ops::{same_worker, SessionId, SessionOp, Worker, WorkerOp};
pub use run_queue::RunQueueWorker;
