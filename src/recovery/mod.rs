//! Recovery Tracking Module
//!
//! Acknowledgement-based tracking of in-flight writes, enabling reliable
//! retransmission after a reconnect. The session records every handle it
//! dequeues for transmission with the attached [`RecoveryDescriptor`]; the
//! remote side acknowledges received messages, releasing them from the
//! tracker. On reconnect the retained set is replayed into the fresh
//! session's queue with `Session::resend`.
//!
//! The tracker is bounded on purpose: a `record` refusal closes the session
//! rather than letting the unacknowledged backlog grow without limit. A
//! forced reconnect-and-retransmit cycle is cheaper than unbounded memory.

pub mod descriptor;

// Re-export commonly used types
pub use descriptor::{RecoveryDescriptor, RetransmitBuffer};
