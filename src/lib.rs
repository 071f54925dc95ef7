//! # WireFlow - Session Layer for Selector-Driven Transports
//!
//! WireFlow is the per-connection session core of a non-blocking, reactor
//! style network transport. It binds a logical connection to a reactor
//! worker thread, manages the outbound write queue with flow control, and
//! supports rebinding a live connection to a different worker without losing
//! in-flight writes.
//!
//! ## Features
//!
//! - **Flow Control**: a bounded permit pool blocks ordinary producers when
//!   too many writes are outstanding; message-processing threads are exempt
//!   so the drain path can never deadlock against itself
//! - **Priority Writes**: control traffic (handshakes) jumps the queue
//! - **Worker Migration**: cooperative ownership transfer between reactor
//!   workers that neither loses nor reorders queued operations
//! - **Recovery Integration**: every transmitted write is retained by a
//!   bounded acknowledgement tracker, enabling retransmission after reconnect
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              WireFlow                               │
//! │                                                                     │
//! │  producer threads                reactor worker threads             │
//! │  ┌──────────────┐                ┌──────────┐  ┌──────────┐         │
//! │  │ send         │                │ worker A │  │ worker B │         │
//! │  │ send_priority│                └────┬─────┘  └────┬─────┘         │
//! │  └──────┬───────┘                     │poll_outbound│               │
//! │         │                             ▼             ▼               │
//! │  ┌──────▼─────────────────────────────────────────────────┐         │
//! │  │                        Session                         │         │
//! │  │  ┌────────────┐  ┌─────────────┐  ┌─────────────────┐  │         │
//! │  │  │ PermitPool │  │ WriteQueue  │  │ worker affinity │  │         │
//! │  │  │ (bounded)  │  │ (deque+ctr) │  │ + pending ops   │  │         │
//! │  │  └────────────┘  └─────────────┘  └─────────────────┘  │         │
//! │  └──────────────────────────┬─────────────────────────────┘         │
//! │                             │ record / outstanding                  │
//! │                      ┌──────▼────────────┐                          │
//! │                      │ RetransmitBuffer  │                          │
//! │                      │ (bounded ack set) │                          │
//! │                      └───────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use wireflow::recovery::{RecoveryDescriptor, RetransmitBuffer};
//! use wireflow::session::{Session, WriteHandle};
//! use wireflow::worker::{RunQueueWorker, Worker};
//!
//! let worker = Arc::new(RunQueueWorker::new("worker-0"));
//! let session = Session::new(
//!     Arc::clone(&worker) as Arc<dyn Worker>,
//!     "127.0.0.1:4000".parse().unwrap(),
//!     "127.0.0.1:5000".parse().unwrap(),
//!     true, // accepted
//!     wireflow::DEFAULT_SEND_QUEUE_LIMIT,
//! );
//!
//! let recovery = Arc::new(RetransmitBuffer::new(128));
//! session.attach_outbound_recovery(recovery as Arc<dyn RecoveryDescriptor>);
//!
//! // Producer side
//! let size = session.send(Arc::new(WriteHandle::new("hello")));
//! assert_eq!(size, 1); // first write: register write-interest
//!
//! // Worker side
//! let handle = session.poll_outbound().unwrap();
//! assert_eq!(&handle.payload()[..], b"hello");
//! ```
//!
//! ## Module Overview
//!
//! - [`backpressure`]: message-thread classification and the send-permit pool
//! - [`session`]: the session, its write queue, and pending-write handles
//! - [`worker`]: the worker contract and a run-queue implementation
//! - [`recovery`]: acknowledgement tracking for retransmission
//!
//! ## What WireFlow Is Not
//!
//! The reactor event loop (readiness polling, socket syscalls), the protocol
//! encode/decode chain, and thread-pool sizing all live outside this crate.
//! Sessions consume the [`worker::Worker`] and
//! [`recovery::RecoveryDescriptor`] contracts; they never touch a socket.

pub mod backpressure;
pub mod recovery;
pub mod session;
pub mod worker;

// Re-export commonly used types for convenience
pub use backpressure::{in_message_scope, MessageScope, PermitPool};
pub use recovery::{RecoveryDescriptor, RetransmitBuffer};
pub use session::{Session, SessionError, WriteHandle, WriteQueue};
pub use worker::{RunQueueWorker, SessionId, SessionOp, Worker, WorkerOp};

/// Default bound on backpressure-subject writes outstanding per session
pub const DEFAULT_SEND_QUEUE_LIMIT: usize = 1024;

/// Default capacity of the unacknowledged-write tracker
pub const DEFAULT_RECOVERY_CAPACITY: usize = 4096;

/// Version of WireFlow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
