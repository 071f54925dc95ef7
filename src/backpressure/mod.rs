//! Backpressure Control Module
//!
//! Flow control for session write queues. Two pieces work together:
//!
//! - [`MessageScope`]: a process-wide, per-thread classification marking the
//!   current thread as "processing an inbound message". Reactor workers enter
//!   a scope while dispatching a received message to application handlers.
//! - [`PermitPool`]: a bounded pool of send permits. Ordinary producer threads
//!   must acquire a permit before enqueuing a write; message-processing
//!   threads are exempt.
//!
//! ## Why the Exemption?
//!
//! ```text
//!  producer thread                 worker thread (in MessageScope)
//!  ───────────────                 ──────────────────────────────
//!  send() ── acquire permit        handler produces a reply
//!       │   (blocks when full)          │
//!       ▼                               ▼
//!  ┌─────────────────────────────────────────┐
//!  │              write queue                │──> poll_outbound()
//!  └─────────────────────────────────────────┘    releases a permit
//! ```
//!
//! The thread draining the queue is the same thread that relieves
//! backpressure. If a handler producing a reply had to acquire a permit from
//! the pool it is itself responsible for draining, a full pool would deadlock
//! against itself. Message-processing threads therefore bypass the pool; the
//! total number of in-flight writes may exceed the pool bound by whatever
//! those threads contribute.

pub mod context;
pub mod permits;

// Re-export commonly used types
pub use context::{in_message_scope, MessageScope};
pub use permits::PermitPool;
